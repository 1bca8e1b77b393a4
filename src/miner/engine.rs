// src/miner/engine.rs
//! Hashing engine implementation
//!
//! Owns the pool of worker threads that search the nonce space for a given
//! job. The engine partitions the nonce space into disjoint contiguous
//! ranges so no two workers ever test the same (header, nonce) pair, and
//! coordinates cooperative cancellation through shared atomic flags.

use crate::miner::algorithm::Algorithm;
use crate::miner::worker::Worker;
use crossbeam_channel::{Receiver, Sender, unbounded};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::SystemTime;

/// Upper bound of the searchable nonce space, exclusive
///
/// Workers cover the half-open interval `[0, MAX_NONCE)`.
pub const MAX_NONCE: u64 = u64::MAX;

/// Represents a mining job received from the node
///
/// Immutable once issued: a newer job supersedes it, nothing mutates it.
/// The supervisor owns the active job and shares read-only snapshots with
/// the engine's workers.
#[derive(Debug, Clone)]
pub struct MiningJob {
    /// Unique identifier for the job, opaque and unique per issuance
    pub job_id: String,
    /// Block height the job builds on, monotonically increasing
    pub height: u64,
    /// Hash of the previous block
    pub prev_block_hash: [u8; 32],
    /// Merkle root committing to the block's transactions
    pub merkle_root: [u8; 32],
    /// Difficulty target, big-endian; a digest below it solves the job
    pub target: [u8; 32],
    /// Header timestamp supplied by the node, in milliseconds
    pub timestamp: u64,
    /// Expected gross block reward in sompi
    pub reward_sompi: u64,
    /// When this client received the job
    pub issued_at: SystemTime,
}

impl MiningJob {
    /// Assembles the header bytes workers hash with each candidate nonce
    ///
    /// The nonce itself is embedded by the hash algorithm, so the blob is
    /// fixed for the lifetime of the job.
    pub fn header_blob(&self) -> Vec<u8> {
        let mut blob = Vec::with_capacity(72);
        blob.extend_from_slice(&self.prev_block_hash);
        blob.extend_from_slice(&self.merkle_root);
        blob.extend_from_slice(&self.timestamp.to_le_bytes());
        blob
    }
}

/// Half-open nonce interval `[start, end)` assigned to one worker
///
/// Ranges for the same job are pairwise disjoint and together cover the
/// whole nonce space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NonceRange {
    /// First nonce the worker tests
    pub start: u64,
    /// One past the last nonce the worker tests
    pub end: u64,
}

/// A candidate block solution found by a worker
///
/// Handed to the supervisor immediately; discarded there if its `job_id`
/// no longer matches the active job.
#[derive(Debug, Clone)]
pub struct Solution {
    /// Job this solution was found for
    pub job_id: String,
    /// Header bytes the digest was computed over (without the nonce)
    pub header: Vec<u8>,
    /// Nonce that produced the winning digest
    pub nonce: u64,
    /// The digest meeting the job's target
    pub digest: [u8; 32],
}

/// Outcome reported by a worker back to the engine's consumer
#[derive(Debug, Clone)]
pub enum WorkerReport {
    /// A digest meeting the target was found
    Solved(Solution),
    /// The job-version marker moved; the worker abandoned its range
    Stale {
        /// Index of the reporting worker
        worker_id: usize,
    },
    /// The worker swept its whole range without a hit
    Exhausted {
        /// Index of the reporting worker
        worker_id: usize,
    },
}

/// Partitions `[0, MAX_NONCE)` into `worker_count` disjoint contiguous ranges
///
/// The remainder of the division is spread one nonce at a time over the
/// leading ranges, so the union is always the full space.
pub fn partition_nonce_space(worker_count: usize) -> Vec<NonceRange> {
    let count = worker_count.max(1) as u64;
    let base = MAX_NONCE / count;
    let remainder = MAX_NONCE % count;

    let mut ranges = Vec::with_capacity(worker_count.max(1));
    let mut start = 0u64;
    for i in 0..count {
        let len = if i < remainder { base + 1 } else { base };
        ranges.push(NonceRange {
            start,
            end: start + len,
        });
        start += len;
    }
    ranges
}

/// Control handle for one engine run
///
/// Dropping the handle cancels the run; workers observe the flag at their
/// staleness-check cadence and wind down on their own.
pub struct EngineHandle {
    reports: Receiver<WorkerReport>,
    cancel: Arc<AtomicBool>,
    worker_count: usize,
}

impl EngineHandle {
    /// Channel on which worker reports arrive
    pub fn reports(&self) -> &Receiver<WorkerReport> {
        &self.reports
    }

    /// Number of workers started for this run
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Requests cooperative cancellation of all workers
    pub fn stop(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.cancel.store(true, Ordering::SeqCst);
    }
}

/// Coordinates hashing runs across worker threads
///
/// One engine instance is reused across jobs; each [`HashingEngine::start`]
/// call captures the current job-version marker so workers can detect when
/// the supervisor has moved on.
pub struct HashingEngine {
    /// Hash algorithm shared by all workers
    algorithm: Arc<dyn Algorithm>,
    /// Iterations between checks of the job-version marker
    staleness_check_interval: u64,
    /// Shared job-version marker, bumped by the supervisor per new job
    job_version: Arc<AtomicU64>,
    /// Optional feed of completed-hash counts for telemetry
    hash_counter: Option<Sender<u64>>,
}

impl HashingEngine {
    /// Creates a new engine
    ///
    /// # Arguments
    /// * `algorithm` - The hash algorithm workers will drive
    /// * `staleness_check_interval` - Iterations between marker checks
    pub fn new(algorithm: Arc<dyn Algorithm>, staleness_check_interval: u64) -> Self {
        HashingEngine {
            algorithm,
            staleness_check_interval: staleness_check_interval.max(1),
            job_version: Arc::new(AtomicU64::new(0)),
            hash_counter: None,
        }
    }

    /// Attaches a telemetry feed receiving completed-hash counts
    pub fn with_hash_counter(mut self, counter: Sender<u64>) -> Self {
        self.hash_counter = Some(counter);
        self
    }

    /// Shared job-version marker
    ///
    /// Written only by the supervisor; workers read it at a bounded cadence
    /// to detect superseded jobs.
    pub fn job_version(&self) -> Arc<AtomicU64> {
        self.job_version.clone()
    }

    /// Starts a hashing run for `job` across `worker_count` workers
    ///
    /// Workers race over disjoint nonce ranges until one finds a solution,
    /// the job goes stale, their range is exhausted, or the run is
    /// cancelled. Threads are detached; the returned handle only carries
    /// the report channel and the cancellation flag.
    pub fn start(&self, job: Arc<MiningJob>, worker_count: usize) -> EngineHandle {
        let worker_count = worker_count.max(1);
        let started_version = self.job_version.load(Ordering::SeqCst);
        let (report_tx, report_rx) = unbounded();
        let cancel = Arc::new(AtomicBool::new(false));
        let solution_found = Arc::new(AtomicBool::new(false));

        for (id, range) in partition_nonce_space(worker_count).into_iter().enumerate() {
            let worker = Worker {
                id,
                algorithm: self.algorithm.clone(),
                job: job.clone(),
                range,
                started_version,
                job_version: self.job_version.clone(),
                solution_found: solution_found.clone(),
                cancel: cancel.clone(),
                reports: report_tx.clone(),
                check_interval: self.staleness_check_interval,
                hash_counter: self.hash_counter.clone(),
            };
            std::thread::spawn(move || worker.run());
        }

        EngineHandle {
            reports: report_rx,
            cancel,
            worker_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::miner::algorithm::keccak::Keccak256Algo;
    use std::time::Duration;

    fn test_job(target: [u8; 32]) -> Arc<MiningJob> {
        Arc::new(MiningJob {
            job_id: "job-1".into(),
            height: 100,
            prev_block_hash: [1u8; 32],
            merkle_root: [2u8; 32],
            target,
            timestamp: 1_700_000_000_000,
            reward_sompi: 50_000_000_000,
            issued_at: SystemTime::now(),
        })
    }

    fn test_engine(interval: u64) -> HashingEngine {
        HashingEngine::new(Arc::new(Keccak256Algo::new()), interval)
    }

    #[test]
    fn partition_covers_space_and_is_disjoint() {
        for count in [1usize, 2, 3, 4, 7, 16, 33] {
            let ranges = partition_nonce_space(count);
            assert_eq!(ranges.len(), count);
            assert_eq!(ranges[0].start, 0);
            assert_eq!(ranges[count - 1].end, MAX_NONCE);
            for pair in ranges.windows(2) {
                // Contiguous and non-overlapping
                assert_eq!(pair[0].end, pair[1].start);
                assert!(pair[0].start < pair[0].end);
            }
        }
    }

    #[test]
    fn partition_handles_zero_workers() {
        let ranges = partition_nonce_space(0);
        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0], NonceRange { start: 0, end: MAX_NONCE });
    }

    #[test]
    fn open_target_yields_a_valid_solution() {
        let engine = test_engine(100);
        let job = test_job([0xff; 32]);
        let handle = engine.start(job.clone(), 2);

        let report = handle
            .reports()
            .recv_timeout(Duration::from_secs(5))
            .expect("expected a report");
        match report {
            WorkerReport::Solved(solution) => {
                assert_eq!(solution.job_id, job.job_id);
                assert_eq!(solution.header, job.header_blob());
                assert!(solution.digest.as_slice() < job.target.as_slice());
                // The digest must be reproducible from (header, nonce)
                let algo = Keccak256Algo::new();
                use crate::miner::algorithm::Algorithm as _;
                assert_eq!(
                    algo.hash(&solution.header, solution.nonce).unwrap(),
                    solution.digest
                );
            }
            other => panic!("expected a solution, got {:?}", other),
        }
        handle.stop();
    }

    #[test]
    fn version_bump_stales_every_worker() {
        // Impossible target keeps all four workers busy until the bump
        let engine = test_engine(50);
        let version = engine.job_version();
        let handle = engine.start(test_job([0u8; 32]), 4);

        std::thread::sleep(Duration::from_millis(20));
        version.fetch_add(1, Ordering::SeqCst);

        let mut stale = 0;
        while stale < 4 {
            match handle.reports().recv_timeout(Duration::from_secs(5)) {
                Ok(WorkerReport::Stale { .. }) => stale += 1,
                Ok(other) => panic!("expected stale reports, got {:?}", other),
                Err(e) => panic!("workers did not stale out in time: {}", e),
            }
        }
    }

    #[test]
    fn dropping_handle_cancels_quietly() {
        let engine = test_engine(50);
        let handle = engine.start(test_job([0u8; 32]), 2);
        let reports = handle.reports().clone();
        drop(handle);

        // Cancelled workers wind down without reporting
        assert!(reports.recv_timeout(Duration::from_millis(500)).is_err());
    }
}
