//! Groupwork HTTP server library.
//!
//! Exposes the router and server startup for use in tests and embedding.
//! Every task route acts on behalf of the user named in the `x-user-id`
//! header.

pub mod api;
pub mod config;
pub mod persist;
