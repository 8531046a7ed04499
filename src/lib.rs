//! Campaign zone maps: persistence, autosave, trash, and cross-surface sync
//! around the pure [`canvas`] engine.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`session`] | [`session::MapSession`]: one mounted canvas wired to the services |
//! | [`services`] | Autosave engine and scheduler, zone spawning and links, trash |
//! | [`store`] | The [`store::Store`] collaborator, in-memory and Postgres backends |
//! | [`bus`] | Campaign-scoped refresh signals between open surfaces |
//! | [`state`] | [`state::AppState`] shared by sessions and the CLI |
//! | [`config`] | Environment-driven timing and soft-delete settings |
//! | [`error`] | [`error::SyncError`] and its user-facing messages |
//! | [`db`] | Postgres pool setup and migrations |

pub mod bus;
pub mod config;
pub mod db;
pub mod error;
pub mod services;
pub mod session;
pub mod state;
pub mod store;

#[cfg(test)]
mod test_helpers;
