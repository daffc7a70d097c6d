//! Groupwork engine library.
//!
//! Group-owned master tasks are synchronized into per-member copies.
//! Scoring a copy passes through a manager approval gate and then applies
//! the task's shared completion policy to the master and sibling copies.

pub mod directory;
pub mod engine;
pub mod i18n;
pub mod notify;
pub mod tasks;

pub use engine::{Engine, EngineConfig};
