//! One refresh cycle: list, index, partition, collect, publish.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tracing::{info, warn};

use cfsd_core::{SdConfig, Snapshot};
use cfsd_platform::PlatformApi;

use crate::collector::StatsCollector;
use crate::error::PublishResult;
use crate::index::LookupIndex;
use crate::partition::{chunk_size, partition, running_workloads};
use crate::publish::SnapshotWriter;

/// Summary of a published cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub cycle: u64,
    /// Workloads in the listing, any state.
    pub workloads_listed: usize,
    pub running_workloads: usize,
    pub chunks: usize,
    pub workers: usize,
    pub target_groups: usize,
    pub targets: usize,
    pub bytes_written: usize,
    pub duration_ms: u64,
    /// Unix timestamp (seconds) when the snapshot was written.
    pub finished_at: u64,
}

/// Counts gathered while building a snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub workloads_listed: usize,
    pub running_workloads: usize,
    pub chunks: usize,
    pub workers: usize,
}

/// Builds and publishes snapshots from one platform.
pub struct Refresher<P> {
    platform: Arc<P>,
    collector: StatsCollector<P>,
    writer: SnapshotWriter,
}

impl<P: PlatformApi> Refresher<P> {
    /// `platform_address` is the value of the platform label on every group.
    pub fn new(
        platform: Arc<P>,
        platform_address: &str,
        output_file: impl Into<PathBuf>,
        max_workers: usize,
    ) -> Self {
        Self {
            collector: StatsCollector::new(platform.clone(), platform_address, max_workers),
            platform,
            writer: SnapshotWriter::new(output_file),
        }
    }

    pub fn from_config(platform: Arc<P>, config: &SdConfig) -> Self {
        Self::new(
            platform,
            &config.api.address,
            config.output_file.clone(),
            config.refresh.max_workers,
        )
    }

    /// Pull this cycle's listings and assemble the snapshot.
    ///
    /// A failed listing is logged and treated as empty.
    pub async fn build_snapshot(&self) -> (Snapshot, BuildStats) {
        let (workloads, org_units, sub_units) = tokio::join!(
            self.platform.list_workloads(),
            self.platform.list_org_units(),
            self.platform.list_sub_units(),
        );

        let workloads = workloads.unwrap_or_else(|e| {
            warn!(error = %e, "failed to list workloads");
            Vec::new()
        });
        let org_units = org_units.unwrap_or_else(|e| {
            warn!(error = %e, "failed to list orgs");
            Vec::new()
        });
        let sub_units = sub_units.unwrap_or_else(|e| {
            warn!(error = %e, "failed to list spaces");
            Vec::new()
        });

        let index = Arc::new(LookupIndex::build(&org_units, &sub_units));
        let workloads_listed = workloads.len();
        let running = running_workloads(workloads);
        let chunks = partition(&running);

        let stats = BuildStats {
            workloads_listed,
            running_workloads: running.len(),
            chunks: chunks.len(),
            workers: self.collector.worker_count(chunks.len()),
        };
        info!(
            running = stats.running_workloads,
            spaces = index.len(),
            chunk_size = chunk_size(running.len()),
            chunks = stats.chunks,
            workers = stats.workers,
            "found started workloads"
        );

        let groups = self.collector.collect(chunks, index).await;
        (Snapshot::new(groups), stats)
    }

    /// Build the snapshot and replace the artifact with it.
    pub async fn run_cycle(&self, cycle: u64) -> PublishResult<CycleReport> {
        let started = Instant::now();
        info!(cycle, "generating target list");

        let (snapshot, stats) = self.build_snapshot().await;
        let bytes_written = self.writer.write(&snapshot).await?;

        let report = CycleReport {
            cycle,
            workloads_listed: stats.workloads_listed,
            running_workloads: stats.running_workloads,
            chunks: stats.chunks,
            workers: stats.workers,
            target_groups: snapshot.len(),
            targets: snapshot.target_count(),
            bytes_written,
            duration_ms: started.elapsed().as_millis() as u64,
            finished_at: epoch_secs(),
        };
        info!(
            cycle,
            groups = report.target_groups,
            targets = report.targets,
            duration_ms = report.duration_ms,
            path = %self.writer.path().display(),
            "done generating target list"
        );
        Ok(report)
    }
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
