//! Introspection API
//!
//! REST endpoints exposing discovery, vocabularies and controller counters.

pub mod rest;
pub mod server;

pub use rest::RestRouter;
pub use server::{ApiServer, ApiServerConfig};
