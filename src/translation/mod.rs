//! Translation Engine Module
//!
//! Bidirectional vocabularies between the unified replication states/modes and
//! each backend's native values:
//! - `map`: verified per-(backend, axis) maps
//! - `vocabulary`: built-in Ceph, Trident and PowerStore tables
//! - `engine`: lookup front-end used by the controller and adapters

pub mod engine;
pub mod error;
pub mod map;
pub mod vocabulary;

pub use engine::*;
pub use error::*;
pub use map::*;
pub use vocabulary::*;
