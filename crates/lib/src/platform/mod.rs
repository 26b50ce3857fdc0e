//! Host-specific defaults.

pub mod paths;
