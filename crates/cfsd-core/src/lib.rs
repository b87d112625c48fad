//! cfsd-core — shared types for the Cloud Foundry service discovery daemon.
//!
//! Holds the platform-side records read each refresh cycle (workloads,
//! orgs, spaces, runtime instances), the published scrape-target records
//! (`TargetGroup`, `Snapshot`), and the resolved daemon configuration.

pub mod config;
pub mod error;
pub mod types;

pub use config::{ApiConfig, ConfigOverrides, FileConfig, RefreshConfig, SdConfig};
pub use error::{ConfigError, ConfigResult};
pub use types::*;
