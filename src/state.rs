//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is handed to every map session and CLI command. It holds the
//! persistence collaborator, the cross-surface bus, and the trash service,
//! whose soft-delete capability latch must be shared by every session so one
//! missing-column error switches them all to hard delete.

#[cfg(test)]
#[path = "state_test.rs"]
mod state_test;

use std::sync::Arc;

use crate::bus::SyncBus;
use crate::config::Config;
use crate::services::trash::Trash;
use crate::services::zones::Zones;
use crate::store::Store;

/// Shared application state. Clone is cheap: every field is Arc-wrapped or Clone.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub bus: SyncBus,
    pub trash: Arc<Trash>,
    pub config: Config,
}

impl AppState {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, config: Config) -> Self {
        let bus = SyncBus::new();
        let trash = Arc::new(Trash::new(Arc::clone(&store), bus.clone(), config.soft_delete));
        Self { store, bus, trash, config }
    }

    #[must_use]
    pub fn zones(&self) -> Zones {
        Zones::new(Arc::clone(&self.store), self.bus.clone())
    }
}
