//! Domain layer - Core types and port definitions
//!
//! This module defines the core traits (ports) that discovery implementations
//! and backend adapters implement, following hexagonal architecture principles.

pub mod ports;

pub use ports::*;
