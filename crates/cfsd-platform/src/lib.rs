//! cfsd-platform — access to the platform being discovered.
//!
//! The refresh engine only needs four capabilities from the platform:
//! list workloads, list orgs, list spaces, and fetch the running
//! instances of one workload. `PlatformApi` captures exactly that.
//!
//! # Implementations
//!
//! ```text
//! PlatformApi
//!   ├── CfClient        Cloud Foundry v2 REST API with UAA client credentials
//!   └── StaticPlatform  in-memory fixture with injectable failures and delays
//! ```

pub mod api;
pub mod cf;
pub mod error;
pub mod memory;

pub use api::PlatformApi;
pub use cf::{CfClient, CfClientConfig};
pub use error::{PlatformError, PlatformResult};
pub use memory::StaticPlatform;
