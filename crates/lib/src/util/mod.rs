//! Shared utilities.
//!
//! Hashing for image ids and filesystem helpers used by builders and the output
//! writer.

pub mod fs;
pub mod hash;
