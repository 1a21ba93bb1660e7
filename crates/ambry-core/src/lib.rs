//! Ambry Core
//!
//! Ambient utilities shared by the Ambry crates: logging setup, profiling hooks and
//! the hash collections used for name lookups.

pub mod collections;
pub mod logging;
pub mod profiling;
