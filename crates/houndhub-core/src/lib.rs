//! # HoundHub Core
//!
//! Shared foundation for the HoundHub automation engine: the workspace-wide
//! error type, TOML configuration, and the delay-string parser used by both
//! the schedule calculator and the workflow enrollment manager.

pub mod config;
pub mod delay;
pub mod error;

pub use config::HoundHubConfig;
pub use delay::parse_delay;
pub use error::{HoundHubError, Result};
