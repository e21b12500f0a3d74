//! Custom Resource Definitions for the replication operator
//!
//! - UnifiedVolumeReplication: backend-neutral replication intent

pub mod replication;

pub use replication::*;
