// src/miner/worker.rs
//! Worker search loop
//!
//! Each worker owns one disjoint nonce range for one job. It embeds
//! candidate nonces, hashes, and compares against the target, checking the
//! shared job-version marker and cancellation flags at a bounded cadence so
//! job switches take effect within one staleness-check interval.

use crate::miner::algorithm::{Algorithm, digest_meets_target};
use crate::miner::engine::{MiningJob, NonceRange, Solution, WorkerReport};
use crossbeam_channel::Sender;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// One worker's share of a hashing run
///
/// Constructed by the engine; the fields are the only data shared across
/// workers, all written before the thread starts except the atomics.
pub(crate) struct Worker {
    pub(crate) id: usize,
    pub(crate) algorithm: Arc<dyn Algorithm>,
    pub(crate) job: Arc<MiningJob>,
    pub(crate) range: NonceRange,
    pub(crate) started_version: u64,
    pub(crate) job_version: Arc<AtomicU64>,
    pub(crate) solution_found: Arc<AtomicBool>,
    pub(crate) cancel: Arc<AtomicBool>,
    pub(crate) reports: Sender<WorkerReport>,
    pub(crate) check_interval: u64,
    pub(crate) hash_counter: Option<Sender<u64>>,
}

impl Worker {
    /// Sweeps the assigned range until a solution, staleness, cancellation,
    /// or exhaustion ends the run
    pub(crate) fn run(self) {
        let header = self.job.header_blob();
        let mut since_check: u64 = 0;

        for nonce in self.range.start..self.range.end {
            if since_check >= self.check_interval {
                self.flush_hash_count(since_check);
                since_check = 0;

                if self.job_version.load(Ordering::Relaxed) != self.started_version {
                    let _ = self.reports.send(WorkerReport::Stale { worker_id: self.id });
                    return;
                }
                // A peer found a solution or the run was cancelled; nothing
                // left to report for this range
                if self.cancel.load(Ordering::Relaxed) || self.solution_found.load(Ordering::Relaxed)
                {
                    return;
                }
            }
            since_check += 1;

            match self.algorithm.hash(&header, nonce) {
                Ok(digest) => {
                    if digest_meets_target(&digest, &self.job.target) {
                        // Report immediately, even between check boundaries.
                        // The flag stops peers; the supervisor alone decides
                        // whether this solution is still current.
                        self.solution_found.store(true, Ordering::SeqCst);
                        self.flush_hash_count(since_check);
                        let _ = self.reports.send(WorkerReport::Solved(Solution {
                            job_id: self.job.job_id.clone(),
                            header: header.clone(),
                            nonce,
                            digest,
                        }));
                        return;
                    }
                }
                Err(e) => log::error!("Hashing failed: {}", e),
            }
        }

        self.flush_hash_count(since_check);
        let _ = self.reports.send(WorkerReport::Exhausted { worker_id: self.id });
    }

    fn flush_hash_count(&self, count: u64) {
        if count == 0 {
            return;
        }
        if let Some(counter) = &self.hash_counter {
            let _ = counter.send(count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::miner::algorithm::keccak::Keccak256Algo;
    use crossbeam_channel::unbounded;
    use std::time::SystemTime;

    fn test_job(target: [u8; 32]) -> Arc<MiningJob> {
        Arc::new(MiningJob {
            job_id: "job-w".into(),
            height: 7,
            prev_block_hash: [3u8; 32],
            merkle_root: [4u8; 32],
            target,
            timestamp: 1_700_000_000_000,
            reward_sompi: 0,
            issued_at: SystemTime::now(),
        })
    }

    fn test_worker(
        job: Arc<MiningJob>,
        range: NonceRange,
        job_version: Arc<AtomicU64>,
        started_version: u64,
        solution_found: Arc<AtomicBool>,
        reports: Sender<WorkerReport>,
    ) -> Worker {
        Worker {
            id: 0,
            algorithm: Arc::new(Keccak256Algo::new()),
            job,
            range,
            started_version,
            job_version,
            solution_found,
            cancel: Arc::new(AtomicBool::new(false)),
            reports,
            check_interval: 10,
            hash_counter: None,
        }
    }

    #[test]
    fn exhausted_range_is_reported() {
        let (tx, rx) = unbounded();
        let worker = test_worker(
            test_job([0u8; 32]),
            NonceRange { start: 0, end: 500 },
            Arc::new(AtomicU64::new(0)),
            0,
            Arc::new(AtomicBool::new(false)),
            tx,
        );
        worker.run();
        assert!(matches!(
            rx.try_recv(),
            Ok(WorkerReport::Exhausted { worker_id: 0 })
        ));
    }

    #[test]
    fn stale_marker_aborts_the_range() {
        let (tx, rx) = unbounded();
        // Marker already differs from the version the worker started with
        let worker = test_worker(
            test_job([0u8; 32]),
            NonceRange { start: 0, end: 1_000_000 },
            Arc::new(AtomicU64::new(5)),
            4,
            Arc::new(AtomicBool::new(false)),
            tx,
        );
        worker.run();
        assert!(matches!(rx.try_recv(), Ok(WorkerReport::Stale { .. })));
    }

    #[test]
    fn peer_solution_stops_worker_without_report() {
        let (tx, rx) = unbounded();
        let worker = test_worker(
            test_job([0u8; 32]),
            NonceRange { start: 0, end: 1_000_000 },
            Arc::new(AtomicU64::new(0)),
            0,
            Arc::new(AtomicBool::new(true)),
            tx,
        );
        worker.run();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn own_solution_is_reported_even_after_peer_found() {
        let (tx, rx) = unbounded();
        // Open target: the very first nonce solves before the first
        // check boundary, despite the peer flag being set
        let worker = test_worker(
            test_job([0xff; 32]),
            NonceRange { start: 0, end: 1_000_000 },
            Arc::new(AtomicU64::new(0)),
            0,
            Arc::new(AtomicBool::new(true)),
            tx,
        );
        worker.run();
        assert!(matches!(rx.try_recv(), Ok(WorkerReport::Solved(_))));
    }

    #[test]
    fn hash_counts_flow_to_counter() {
        let (tx, _rx) = unbounded();
        let (count_tx, count_rx) = unbounded();
        let mut worker = test_worker(
            test_job([0u8; 32]),
            NonceRange { start: 0, end: 100 },
            Arc::new(AtomicU64::new(0)),
            0,
            Arc::new(AtomicBool::new(false)),
            tx,
        );
        worker.hash_counter = Some(count_tx);
        worker.run();
        let total: u64 = count_rx.try_iter().sum();
        assert_eq!(total, 100);
    }
}
