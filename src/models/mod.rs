//! Data models for csvbridge.
//!
//! Entity kinds, identifiers and records as the remote directory reports
//! them, plus the composite-name codec used by operating systems.

mod composite;
mod entity;

pub use composite::{CompositeName, compose, decompose};
pub use entity::{EntityId, EntityKind, EntityRecord};
