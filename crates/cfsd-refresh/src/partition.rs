//! Workload partitioning.
//!
//! Keeps only started workloads and splits them into contiguous chunks,
//! one per stats worker. Chunk size is fixed for small deployments and
//! scales with the workload count for large ones, so the chunk count
//! stays around nine or ten.

use cfsd_core::Workload;

/// Chunk size used below [`LARGE_DEPLOYMENT_THRESHOLD`] running workloads.
pub const SMALL_CHUNK_SIZE: usize = 100;

/// Running-workload count at which chunk size starts scaling.
pub const LARGE_DEPLOYMENT_THRESHOLD: usize = 1000;

/// Divisor applied to large deployments.
pub const TARGET_PARALLELISM: usize = 9;

/// A contiguous slice of running workloads handled by one worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Position of this chunk in the partition.
    pub index: usize,
    pub workloads: Vec<Workload>,
}

impl Chunk {
    pub fn len(&self) -> usize {
        self.workloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workloads.is_empty()
    }
}

/// Chunk size for a given number of running workloads.
pub fn chunk_size(running: usize) -> usize {
    if running < LARGE_DEPLOYMENT_THRESHOLD {
        SMALL_CHUNK_SIZE
    } else {
        running / TARGET_PARALLELISM
    }
}

/// Drop every workload that is not started, keeping listing order.
pub fn running_workloads(workloads: Vec<Workload>) -> Vec<Workload> {
    workloads.into_iter().filter(Workload::is_running).collect()
}

/// Split running workloads into chunks.
///
/// The chunks cover the input exactly once, in order. No input yields
/// no chunks.
pub fn partition(running: &[Workload]) -> Vec<Chunk> {
    if running.is_empty() {
        return Vec::new();
    }

    running
        .chunks(chunk_size(running.len()))
        .enumerate()
        .map(|(index, slice)| Chunk {
            index,
            workloads: slice.to_vec(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cfsd_core::WorkloadState;

    fn workloads(n: usize) -> Vec<Workload> {
        (0..n)
            .map(|i| Workload::new(&format!("app-{i}"), &format!("app{i}"), WorkloadState::Started, "s"))
            .collect()
    }

    fn rejoin(chunks: &[Chunk]) -> Vec<Workload> {
        chunks.iter().flat_map(|c| c.workloads.clone()).collect()
    }

    #[test]
    fn chunk_size_boundary() {
        assert_eq!(chunk_size(0), SMALL_CHUNK_SIZE);
        assert_eq!(chunk_size(999), 100);
        assert_eq!(chunk_size(1000), 1000 / 9);
        assert_eq!(chunk_size(1000), 111);
        assert_eq!(chunk_size(9000), 1000);
    }

    #[test]
    fn filters_non_running() {
        let listing = vec![
            Workload::new("a", "a", WorkloadState::Started, "s"),
            Workload::new("b", "b", WorkloadState::Stopped, "s"),
            Workload::new("c", "c", WorkloadState::Unknown, "s"),
            Workload::new("d", "d", WorkloadState::Started, "s"),
        ];
        let running = running_workloads(listing);
        let ids: Vec<&str> = running.iter().map(|w| w.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "d"]);
    }

    #[test]
    fn zero_workloads_zero_chunks() {
        assert!(partition(&[]).is_empty());
    }

    #[test]
    fn small_deployment_uses_fixed_chunks() {
        let input = workloads(250);
        let chunks = partition(&input);
        let sizes: Vec<usize> = chunks.iter().map(Chunk::len).collect();
        assert_eq!(sizes, vec![100, 100, 50]);
    }

    #[test]
    fn large_deployment_keeps_chunk_count_near_ten() {
        for n in [1000, 1001, 4321, 10_000, 99_999] {
            let chunks = partition(&workloads(n));
            assert!(
                (9..=10).contains(&chunks.len()),
                "{n} workloads gave {} chunks",
                chunks.len()
            );
        }
    }

    #[test]
    fn chunks_are_indexed_in_order() {
        let chunks = partition(&workloads(320));
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
            assert!(!chunk.is_empty());
        }
    }

    #[test]
    fn partition_is_total_and_ordered() {
        for n in [0, 1, 99, 100, 101, 999, 1000, 1001, 2500, 12_345] {
            let input = workloads(n);
            let chunks = partition(&input);
            assert_eq!(rejoin(&chunks), input, "partition of {n} lost or reordered items");
        }
    }
}
