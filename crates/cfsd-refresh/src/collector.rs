//! Parallel stats collection.
//!
//! Chunks go into a shared queue drained by up to `max_workers` tasks.
//! Each worker fetches runtime instances for its chunk's workloads one
//! at a time, builds a `TargetGroup` per workload, and reports the whole
//! chunk in one message. Results land in per-chunk slots so the merged
//! list keeps chunk order regardless of which worker finishes first.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use cfsd_core::TargetGroup;
use cfsd_platform::PlatformApi;

use crate::index::LookupIndex;
use crate::partition::Chunk;

/// One worker's output for one chunk.
#[derive(Debug)]
struct ChunkResult {
    index: usize,
    groups: Vec<TargetGroup>,
}

/// Fans chunks out to stats workers and merges their results.
pub struct StatsCollector<P> {
    platform: Arc<P>,
    platform_address: Arc<str>,
    max_workers: usize,
}

impl<P: PlatformApi> StatsCollector<P> {
    pub fn new(platform: Arc<P>, platform_address: &str, max_workers: usize) -> Self {
        Self {
            platform,
            platform_address: Arc::from(platform_address),
            max_workers: max_workers.max(1),
        }
    }

    /// Number of workers that will run for `chunks` chunks.
    pub fn worker_count(&self, chunks: usize) -> usize {
        chunks.min(self.max_workers)
    }

    /// Collect target groups for every chunk.
    ///
    /// Waits for one result per chunk with no deadline of its own; the
    /// caller bounds the wait. Dropping the returned future aborts all
    /// workers.
    pub async fn collect(&self, chunks: Vec<Chunk>, index: Arc<LookupIndex>) -> Vec<TargetGroup> {
        let chunk_count = chunks.len();
        if chunk_count == 0 {
            return Vec::new();
        }

        let workers = self.worker_count(chunk_count);
        let queue = Arc::new(Mutex::new(VecDeque::from(chunks)));
        let (tx, mut rx) = mpsc::channel::<ChunkResult>(chunk_count);
        let mut tasks = JoinSet::new();

        for worker in 0..workers {
            let queue = queue.clone();
            let tx = tx.clone();
            let platform = self.platform.clone();
            let index = index.clone();
            let address = self.platform_address.clone();

            tasks.spawn(async move {
                loop {
                    let next = queue.lock().await.pop_front();
                    let Some(chunk) = next else { break };

                    let groups = collect_chunk(platform.as_ref(), &chunk, &index, &address).await;
                    debug!(worker, chunk = chunk.index, groups = groups.len(), "chunk collected");

                    if tx.send(ChunkResult { index: chunk.index, groups }).await.is_err() {
                        break;
                    }
                }
            });
        }
        drop(tx);

        let mut slots: Vec<Option<Vec<TargetGroup>>> = (0..chunk_count).map(|_| None).collect();
        for _ in 0..chunk_count {
            match rx.recv().await {
                Some(result) => match slots.get_mut(result.index) {
                    Some(slot) => *slot = Some(result.groups),
                    None => warn!(chunk = result.index, "result for unknown chunk dropped"),
                },
                // Every worker has exited; only possible if one panicked.
                None => break,
            }
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "stats worker failed");
            }
        }

        let missing = slots.iter().filter(|s| s.is_none()).count();
        if missing > 0 {
            error!(missing, chunks = chunk_count, "stats chunks lost; snapshot is partial");
        }

        slots.into_iter().flatten().flatten().collect()
    }
}

/// Build the target groups for one chunk, in chunk order.
///
/// A failed instance fetch still yields a group, with no targets.
async fn collect_chunk<P: PlatformApi>(
    platform: &P,
    chunk: &Chunk,
    index: &LookupIndex,
    platform_address: &str,
) -> Vec<TargetGroup> {
    let mut groups = Vec::with_capacity(chunk.workloads.len());

    for workload in &chunk.workloads {
        let instances = match platform.fetch_runtime_instances(&workload.id).await {
            Ok(instances) => instances,
            Err(e) => {
                warn!(workload = %workload.name, id = %workload.id, error = %e, "failed to fetch runtime instances");
                Vec::new()
            }
        };

        let (space, org) = index.resolve(&workload.sub_unit_id);
        groups.push(TargetGroup::for_workload(
            workload,
            &instances,
            platform_address,
            space,
            org,
        ));
    }

    groups
}
