pub mod autosave;
pub mod scheduler;
pub mod trash;
pub mod zones;

use canvas::doc::{Zone, ZoneId};

use crate::store::{DocumentRow, MapRow, NodeRow};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// A message for the user, already rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserNotice {
    pub level: NoticeLevel,
    pub message: String,
}

impl UserNotice {
    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Info, message: message.into() }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Error, message: message.into() }
    }
}

/// Outcomes of background persistence, delivered to the owning session.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    Notice(UserNotice),
    MapSaved(MapRow),
    /// Canonical zone row after a save; replaces the local copy.
    ZoneSaved(Zone),
    NodeRenamed(NodeRow),
    /// A property save for this zone finished; its draft matches the store.
    ZoneSettled(ZoneId),
    DocumentSaved(DocumentRow),
    /// Local zone positions may have drifted from the store; reload them.
    ReloadZones,
}
