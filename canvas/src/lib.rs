//! Map canvas engine for campaign zone maps.
//!
//! This crate is pure and synchronous: it never touches the network or a
//! clock. It owns the viewport transform, the zone geometry model, the gesture
//! state machine, and the derived connection graph. Input handlers return
//! [`engine::Action`]s; the host (the `zonemap` session) persists them and feeds
//! canonical rows back in.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`engine`] | [`engine::EngineCore`]: pointer/wheel handlers emitting actions |
//! | [`doc`] | Zone and link records plus the in-memory [`doc::ZoneStore`] |
//! | [`geometry`] | Geometry payload parsing, clamping, color codec, label sizing |
//! | [`camera`] | Viewport pan/zoom and client/stage conversions |
//! | [`input`] | Pointer buttons and the gesture state machine |
//! | [`hit`] | Hit-testing against zone markers |
//! | [`graph`] | Identity nodes, representative zones, connector lines |
//! | [`draft`] | Editable drafts and their dirty predicates |
//! | [`render`] | Display list ordering (lines beneath markers) |
//! | [`consts`] | Stage bounds, zoom limits, geometry defaults |

pub mod camera;
pub mod consts;
pub mod doc;
pub mod draft;
pub mod engine;
pub mod geometry;
pub mod graph;
pub mod hit;
pub mod input;
pub mod render;
