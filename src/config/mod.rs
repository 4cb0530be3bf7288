//! Pipeline Configuration Module
//!
//! ## Loading Order
//!
//! 1. `--config PATH` on the command line
//! 2. `pipeline.toml` in the current working directory
//! 3. Built-in defaults
//!
//! Command-line flags are applied on top of whichever source was used, and
//! the result is validated again.

mod pipeline_config;
pub mod defaults;
pub mod validation;

pub use pipeline_config::*;
