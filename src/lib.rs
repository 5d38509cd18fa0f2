//! # clearcache
//!
//! Deletes cached files that have not been accessed within a retention window.
//!
//! This library provides the core functionality for the clearcache CLI tool:
//! the persisted path list, path resolution, and the expired-file cleaner.

pub mod cleaner;
pub mod commands;
pub mod config;
pub mod error;
pub mod resolver;

pub use error::{ClearCacheError, Result};
