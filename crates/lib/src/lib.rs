//! dbd-lib: dependency-ordered docker image builds for big-data clusters
//!
//! This crate provides the build engine behind `dbd`:
//! - `config`: the user-supplied build configuration
//! - `registry`: resolving component names to builders (plugins or the generic builder)
//! - `execute`: the dependency graph and the sequential build orchestrator
//! - `output`: merging per-component fragments into a deployment directory

pub mod assembly;
pub mod builder;
pub mod cache;
pub mod config;
pub mod consts;
pub mod execute;
pub mod fragment;
pub mod output;
pub mod placeholder;
pub mod platform;
pub mod registry;
pub mod resources;
pub mod util;
