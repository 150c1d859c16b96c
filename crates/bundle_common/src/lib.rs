//! Shared foundational types for the bundle cache.
//!
//! This crate provides content hashing for stored artifacts, modification
//! timestamps for dependency tracking, and the path arithmetic that turns a
//! compiler's output location into a key of the host's file collection.

#![warn(missing_docs)]

pub mod hash;
pub mod paths;
pub mod time;

pub use hash::ContentHash;
pub use paths::{build_path, join_output};
pub use time::ModTime;
