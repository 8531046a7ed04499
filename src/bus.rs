//! Cross-surface refresh signals.
//!
//! Every mounted map session subscribes to one [`SyncBus`]. A publisher names
//! the campaign and the topic that changed; subscribers ignore other
//! campaigns.

#[cfg(test)]
#[path = "bus_test.rs"]
mod bus_test;

use canvas::doc::CampaignId;
use tokio::sync::broadcast;
use tracing::debug;

const BUS_CAPACITY: usize = 64;

/// What changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topic {
    /// The active zone set of some map in the campaign.
    Zones,
    /// Links between story nodes.
    Links,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSignal {
    pub campaign_id: CampaignId,
    pub topic: Topic,
}

#[derive(Clone)]
pub struct SyncBus {
    tx: broadcast::Sender<SyncSignal>,
}

impl SyncBus {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BUS_CAPACITY);
        Self { tx }
    }

    /// Publish to every current subscriber. Returns how many received it.
    pub fn publish(&self, campaign_id: CampaignId, topic: Topic) -> usize {
        let delivered = self.tx.send(SyncSignal { campaign_id, topic }).unwrap_or(0);
        debug!(%campaign_id, ?topic, delivered, "sync signal published");
        delivered
    }

    /// Subscribe to signals for one campaign.
    #[must_use]
    pub fn subscribe(&self, campaign_id: CampaignId) -> Subscription {
        Subscription { campaign_id, rx: self.tx.subscribe() }
    }
}

impl Default for SyncBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Campaign-filtered receiver.
pub struct Subscription {
    campaign_id: CampaignId,
    rx: broadcast::Receiver<SyncSignal>,
}

impl Subscription {
    /// Wait for the next signal for this campaign. `None` once the bus is gone.
    ///
    /// A lagged receiver reports [`Topic::Zones`]: dropped signals become one
    /// zone reload.
    pub async fn recv(&mut self) -> Option<SyncSignal> {
        loop {
            match self.rx.recv().await {
                Ok(signal) if signal.campaign_id == self.campaign_id => return Some(signal),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(campaign_id = %self.campaign_id, skipped, "sync subscription lagged");
                    return Some(SyncSignal { campaign_id: self.campaign_id, topic: Topic::Zones });
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of [`Self::recv`]: the next pending signal for this campaign, if any.
    pub fn try_recv(&mut self) -> Option<SyncSignal> {
        loop {
            match self.rx.try_recv() {
                Ok(signal) if signal.campaign_id == self.campaign_id => return Some(signal),
                Ok(_) => {}
                Err(broadcast::error::TryRecvError::Lagged(_)) => {
                    return Some(SyncSignal { campaign_id: self.campaign_id, topic: Topic::Zones });
                }
                Err(_) => return None,
            }
        }
    }
}
