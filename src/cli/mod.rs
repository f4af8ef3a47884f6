//! CLI-specific functionality for liftsync
//!
//! This module contains all CLI-related code including argument parsing
//! and configuration discovery.

pub mod args;
pub mod config;

pub use args::{Args, Commands};
pub use config::{ConfigDiscovery, ServiceConfig, StoreBackend, StoreConfig};
