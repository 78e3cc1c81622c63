//! Utility types.
//!
//! This module provides configuration and logging utilities used throughout
//! the registry.

pub mod config;
pub mod logging;

pub use config::{RegistryConfig, TieBreak};
pub use logging::{init_logging, LogLevel, LoggingConfig};
