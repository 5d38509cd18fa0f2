//! Configuration types and options for the application.
//!
//! This module contains the persisted path list and the options that control
//! a cleanup run.

pub mod run;
pub mod store;

pub use run::{DEFAULT_RETENTION_DAYS, RunOptions};
pub use store::{ConfigStore, Configuration};
