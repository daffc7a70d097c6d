//! Shared data model and wire definitions for Groupwork.

pub mod api;
pub mod approval;
pub mod group;
pub mod notification;
pub mod snapshot;
pub mod task;
