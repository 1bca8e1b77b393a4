// src/stats/reporter.rs
use crate::miner::supervisor::JobSnapshot;
use crate::rewards::ledger::{RewardLedger, SOMPI_PER_KAS};
use arc_swap::ArcSwap;
use crossbeam_channel::{Receiver, Sender};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use sysinfo::{Components, System};

/// Statistics related to mining performance
#[derive(Debug, Clone, Default)]
pub struct MiningStats {
    /// Total number of hashes computed
    pub hashes_total: u64,
    /// Number of solutions accepted by the node
    pub solutions_accepted: u64,
    /// Number of solutions rejected by the node
    pub solutions_rejected: u64,
    /// Average hashrate over 1 minute (hashes per second)
    pub avg_hashrate_1m: f64,
    /// Average hashrate over 15 minutes (hashes per second)
    pub avg_hashrate_15m: f64,
    /// Seconds since the reporter started
    pub uptime_secs: u64,
}

/// Statistics related to hardware performance
#[derive(Debug, Clone)]
pub struct HardwareStats {
    /// Current CPU usage percentage (0-100)
    pub cpu_usage: f32,
    /// Memory currently used by the process (in bytes)
    pub memory_used: u64,
    /// Current CPU temperature in Celsius
    pub temperature: f32,
}

/// Collects and reports mining and hardware statistics
pub struct StatsReporter {
    /// Atomic counters for mining statistics
    stats: Arc<MiningStatsAtomic>,
    /// System information collector
    system: System,
    /// Hardware component information collector
    components: Components,
    /// Interval at which stats are reported
    report_interval: Duration,
    /// Reward ledger to include in reports, when attached
    ledger: Option<Arc<RewardLedger>>,
    /// Supervisor snapshot to include in reports, when attached
    job_snapshot: Option<Arc<ArcSwap<JobSnapshot>>>,
}

/// Atomic version of MiningStats for thread-safe operations
struct MiningStatsAtomic {
    hashes: AtomicU64,
    accepted: AtomicU64,
    rejected: AtomicU64,
    start_time: Instant,
}

impl Clone for StatsReporter {
    fn clone(&self) -> Self {
        StatsReporter {
            stats: self.stats.clone(),
            system: System::new_all(),
            components: Components::new_with_refreshed_list(),
            report_interval: self.report_interval,
            ledger: self.ledger.clone(),
            job_snapshot: self.job_snapshot.clone(),
        }
    }
}

impl StatsReporter {
    /// Creates a new StatsReporter with the specified reporting interval
    ///
    /// # Arguments
    /// * `report_interval` - How often to log statistics
    pub fn new(report_interval: Duration) -> Self {
        StatsReporter {
            stats: Arc::new(MiningStatsAtomic {
                hashes: AtomicU64::new(0),
                accepted: AtomicU64::new(0),
                rejected: AtomicU64::new(0),
                start_time: Instant::now(),
            }),
            system: System::new_all(),
            components: Components::new_with_refreshed_list(),
            report_interval,
            ledger: None,
            job_snapshot: None,
        }
    }

    /// Attaches reward and job snapshots to the periodic report
    pub fn with_context(
        mut self,
        ledger: Arc<RewardLedger>,
        job_snapshot: Arc<ArcSwap<JobSnapshot>>,
    ) -> Self {
        self.ledger = Some(ledger);
        self.job_snapshot = Some(job_snapshot);
        self
    }

    /// Creates and returns a channel sender for submission results
    ///
    /// The returned sender can be used to report accepted/rejected solutions.
    /// The reporter will automatically listen for these events on a background thread.
    pub fn submission_sender(&self) -> Sender<SubmissionResult> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.start_submission_listener(rx);
        tx
    }

    /// Creates and returns a channel sender for hash counts
    ///
    /// The returned sender can be used to report completed hashes.
    /// The reporter will automatically listen for these events on a background thread.
    pub fn hash_sender(&self) -> Sender<u64> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.start_hashrate_listener(rx);
        tx
    }

    /// Gets the current mining statistics
    ///
    /// # Returns
    /// A snapshot of the current mining statistics
    pub fn get_stats(&self) -> MiningStats {
        let total_seconds = self.stats.start_time.elapsed().as_secs() as f64;
        let hashes = self.stats.hashes.load(Ordering::Relaxed);

        MiningStats {
            hashes_total: hashes,
            solutions_accepted: self.stats.accepted.load(Ordering::Relaxed),
            solutions_rejected: self.stats.rejected.load(Ordering::Relaxed),
            avg_hashrate_1m: hashes as f64 / total_seconds.max(60.0) * 60.0,
            avg_hashrate_15m: hashes as f64 / total_seconds.max(900.0) * 900.0,
            uptime_secs: total_seconds as u64,
        }
    }

    /// Gets the current hardware statistics
    ///
    /// This refreshes system information before returning the stats.
    ///
    /// # Returns
    /// A snapshot of the current hardware statistics
    pub fn get_hardware_stats(&mut self) -> HardwareStats {
        self.system.refresh_cpu_all();
        self.system.refresh_memory();
        self.components.refresh(true);

        let cpu_usage = self
            .system
            .cpus()
            .iter()
            .map(|c| c.cpu_usage())
            .sum::<f32>()
            / self.system.cpus().len() as f32;

        let temperature = self
            .components
            .iter()
            .find(|c| c.label().contains("CPU"))
            .and_then(|c| c.temperature())
            .unwrap_or(0.0);

        HardwareStats {
            cpu_usage,
            memory_used: self.system.used_memory(),
            temperature,
        }
    }

    /// Starts the periodic reporting of statistics
    ///
    /// This spawns a background thread that logs stats at the configured interval.
    pub fn start_reporting(&self) {
        let mut reporter = self.clone();

        std::thread::spawn(move || {
            loop {
                std::thread::sleep(reporter.report_interval);
                let mining_stats = reporter.get_stats();
                let hw_stats = reporter.get_hardware_stats();

                log::info!(
                    "Hashrate: {:.2} H/s | Accepted/Rejected: {}/{} | Uptime: {}s | CPU: {:.1}% | Temp: {:.1}°C",
                    mining_stats.avg_hashrate_1m,
                    mining_stats.solutions_accepted,
                    mining_stats.solutions_rejected,
                    mining_stats.uptime_secs,
                    hw_stats.cpu_usage,
                    hw_stats.temperature
                );

                if let Some(snapshot) = &reporter.job_snapshot {
                    let view = snapshot.load();
                    log::info!(
                        "State: {} | Job: {} | Height: {}",
                        view.state,
                        view.job_id.as_deref().unwrap_or("-"),
                        view.height.map_or_else(|| "-".into(), |h| h.to_string())
                    );
                }

                if let Some(ledger) = &reporter.ledger {
                    let state = ledger.state();
                    log::info!(
                        "Rewards: gross {:.8} KAS | dev fee {:.8} | owner {:.8}{} | user net {:.8}{}",
                        state.cumulative_gross as f64 / SOMPI_PER_KAS as f64,
                        state.cumulative_dev_fee as f64 / SOMPI_PER_KAS as f64,
                        state.cumulative_owner_allocation as f64 / SOMPI_PER_KAS as f64,
                        if state.owner_target_exhausted { " (target met)" } else { "" },
                        state.cumulative_user_net as f64 / SOMPI_PER_KAS as f64,
                        if state.stale_price_events > 0 { " [stale price seen]" } else { "" }
                    );
                }
            }
        });
    }

    /// Starts a listener for submission results on a background thread
    fn start_submission_listener(&self, receiver: Receiver<SubmissionResult>) {
        let stats = self.stats.clone();

        std::thread::spawn(move || {
            for result in receiver {
                match result {
                    SubmissionResult::Accepted => stats.accepted.fetch_add(1, Ordering::Relaxed),
                    SubmissionResult::Rejected => stats.rejected.fetch_add(1, Ordering::Relaxed),
                };
            }
        });
    }

    /// Starts a listener for hash counts on a background thread
    fn start_hashrate_listener(&self, receiver: Receiver<u64>) {
        let stats = self.stats.clone();

        std::thread::spawn(move || {
            for count in receiver {
                stats.hashes.fetch_add(count, Ordering::Relaxed);
            }
        });
    }
}

/// Result of submitting a solution to the node
#[derive(Debug, Clone, Copy)]
pub enum SubmissionResult {
    /// The solution was accepted as a valid block
    Accepted,
    /// The solution was rejected by the node
    Rejected,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wait_until(reporter: &StatsReporter, check: impl Fn(&MiningStats) -> bool) -> MiningStats {
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            let stats = reporter.get_stats();
            if check(&stats) {
                return stats;
            }
            assert!(Instant::now() < deadline, "stats never converged");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn hash_counts_accumulate() {
        let reporter = StatsReporter::new(Duration::from_secs(60));
        let sender = reporter.hash_sender();
        sender.send(100).unwrap();
        sender.send(23).unwrap();

        let stats = wait_until(&reporter, |s| s.hashes_total == 123);
        assert_eq!(stats.hashes_total, 123);
    }

    #[test]
    fn submission_results_are_tallied() {
        let reporter = StatsReporter::new(Duration::from_secs(60));
        let sender = reporter.submission_sender();
        sender.send(SubmissionResult::Accepted).unwrap();
        sender.send(SubmissionResult::Accepted).unwrap();
        sender.send(SubmissionResult::Rejected).unwrap();

        let stats = wait_until(&reporter, |s| {
            s.solutions_accepted == 2 && s.solutions_rejected == 1
        });
        assert_eq!(stats.solutions_accepted, 2);
        assert_eq!(stats.solutions_rejected, 1);
    }
}
