//! Cloud Foundry v2 platform implementation.

mod client;
mod model;

pub use client::{CfClient, CfClientConfig};
