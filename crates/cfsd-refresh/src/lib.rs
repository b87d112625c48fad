//! cfsd-refresh — the refresh engine.
//!
//! Turns platform listings into a published scrape-target snapshot on a
//! timer, with at most one cycle in flight.
//!
//! # Architecture
//!
//! ```text
//! RefreshController
//!   ├── run()  → interval loop, first tick immediate
//!   └── tick() → single-flight gate (skip if a cycle holds it)
//!         │
//!         ▼
//! Refresher::run_cycle()            (bounded by cycle timeout)
//!   ├── list workloads / orgs / spaces   (concurrently)
//!   ├── LookupIndex::build()             space id → (space, org)
//!   ├── partition()                      running workloads → chunks
//!   ├── StatsCollector::collect()        ≤ max_workers workers
//!   │     └── per chunk: fetch instances → TargetGroup per workload
//!   └── SnapshotWriter::write()          temp file + rename
//! ```

pub mod collector;
pub mod controller;
pub mod cycle;
pub mod error;
pub mod index;
pub mod partition;
pub mod publish;
pub mod status;

pub use collector::StatsCollector;
pub use controller::{RefreshController, TickOutcome};
pub use cycle::{BuildStats, CycleReport, Refresher};
pub use error::{PublishError, PublishResult, RefreshError};
pub use index::LookupIndex;
pub use partition::{Chunk, chunk_size, partition, running_workloads};
pub use publish::SnapshotWriter;
pub use status::{CycleState, RefreshStatus};
