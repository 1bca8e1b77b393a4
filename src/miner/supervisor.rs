// src/miner/supervisor.rs
//! Job lifecycle supervisor
//!
//! Owns the current job and the job-version marker, drives the node
//! connection, and coordinates hashing-engine runs. The supervisor is the
//! sole decision point for retry versus escalate versus fatal halt, and the
//! only place a solution's staleness is judged.

use crate::miner::engine::{EngineHandle, HashingEngine, MiningJob, Solution, WorkerReport};
use crate::network::{NodeConnector, SubmitOutcome};
use crate::rewards::ledger::{RewardLedger, SOMPI_PER_KAS};
use crate::stats::reporter::SubmissionResult;
use crate::utils::error::MinerError;
use arc_swap::ArcSwap;
use crossbeam_channel::{Sender, TryRecvError};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime};

/// Tuning knobs for the supervisor loop
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Number of hashing workers per job
    pub worker_count: usize,
    /// Delay before re-asking the node after a recoverable failure
    pub retry_delay: Duration,
    /// Cadence of chain-height polls while hashing
    pub difficulty_poll_interval: Duration,
    /// Bounded retries for transient submission failures
    pub submit_retry_limit: u32,
    /// Consecutive failed connection attempts tolerated before halting
    pub max_connect_attempts: u32,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        SupervisorConfig {
            worker_count: num_cpus::get(),
            retry_delay: Duration::from_secs(10),
            difficulty_poll_interval: Duration::from_secs(5),
            submit_retry_limit: 3,
            max_connect_attempts: 5,
        }
    }
}

/// Supervisor lifecycle states
///
/// The supervisor runs until externally cancelled; there is no terminal
/// state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    /// No usable node connection
    Disconnected,
    /// Connected, waiting for a job
    AwaitingJob,
    /// Workers are searching the active job's nonce space
    Hashing,
    /// A solution is being submitted to the node
    Submitting,
    /// Waiting out a retry delay after a recoverable failure
    Backoff,
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SupervisorState::Disconnected => write!(f, "disconnected"),
            SupervisorState::AwaitingJob => write!(f, "awaiting-job"),
            SupervisorState::Hashing => write!(f, "hashing"),
            SupervisorState::Submitting => write!(f, "submitting"),
            SupervisorState::Backoff => write!(f, "backoff"),
        }
    }
}

/// Read-only view of the supervisor for telemetry
///
/// Published through an [`ArcSwap`] so consumers never block the mining
/// path.
#[derive(Debug, Clone)]
pub struct JobSnapshot {
    /// Current lifecycle state
    pub state: SupervisorState,
    /// Active job identifier, when one exists
    pub job_id: Option<String>,
    /// Active job height, when one exists
    pub height: Option<u64>,
    /// When the active job was received
    pub issued_at: Option<SystemTime>,
}

impl Default for JobSnapshot {
    fn default() -> Self {
        JobSnapshot {
            state: SupervisorState::Disconnected,
            job_id: None,
            height: None,
            issued_at: None,
        }
    }
}

/// Owns the job lifecycle and the hashing engine
///
/// Generic over the node boundary so tests can drive the state machine
/// with an in-memory connector.
pub struct JobSupervisor<C: NodeConnector> {
    connector: C,
    engine: HashingEngine,
    ledger: Arc<RewardLedger>,
    job_version: Arc<AtomicU64>,
    current_job: Option<Arc<MiningJob>>,
    snapshot: Arc<ArcSwap<JobSnapshot>>,
    submissions: Option<Sender<SubmissionResult>>,
    config: SupervisorConfig,
    shutdown: Arc<AtomicBool>,
}

/// Internal step of the run loop; carries per-state data the public
/// [`SupervisorState`] labels deliberately do not
enum Step {
    Disconnected,
    AwaitingJob,
    Hashing(EngineHandle),
    Submitting(Solution),
    Backoff,
}

impl<C: NodeConnector> JobSupervisor<C> {
    /// Creates a supervisor wiring the connector, engine and ledger together
    pub fn new(
        connector: C,
        engine: HashingEngine,
        ledger: Arc<RewardLedger>,
        config: SupervisorConfig,
    ) -> Self {
        let job_version = engine.job_version();
        JobSupervisor {
            connector,
            engine,
            ledger,
            job_version,
            current_job: None,
            snapshot: Arc::new(ArcSwap::from_pointee(JobSnapshot::default())),
            submissions: None,
            config,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Attaches a feed of submission outcomes for the stats reporter
    pub fn with_submission_feed(mut self, feed: Sender<SubmissionResult>) -> Self {
        self.submissions = Some(feed);
        self
    }

    /// Telemetry handle to the published state snapshot
    pub fn job_snapshot(&self) -> Arc<ArcSwap<JobSnapshot>> {
        self.snapshot.clone()
    }

    /// Flag that stops the run loop at its next turn
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    /// Drives the state machine until shut down or a fatal error
    ///
    /// Recoverable failures loop back through `Backoff`/`Disconnected`;
    /// only an exhausted connection budget or a protocol-level defect
    /// escapes as `Err`.
    pub async fn run(&mut self) -> Result<(), MinerError> {
        let mut step = Step::Disconnected;
        let mut connect_failures: u32 = 0;

        while !self.shutdown.load(Ordering::Relaxed) {
            step = match step {
                Step::Disconnected => self.connect(&mut connect_failures).await?,
                Step::AwaitingJob => self.await_job().await?,
                Step::Hashing(handle) => self.hash(handle).await?,
                Step::Submitting(solution) => self.submit(solution).await?,
                Step::Backoff => self.backoff().await,
            };
        }

        log::info!("Supervisor shutting down");
        self.publish(SupervisorState::Disconnected);
        Ok(())
    }

    async fn connect(&mut self, failures: &mut u32) -> Result<Step, MinerError> {
        self.publish(SupervisorState::Disconnected);
        match self.connector.connect().await {
            Ok(info) => {
                *failures = 0;
                log::info!(
                    "Connected to node at height {} (synced: {})",
                    info.height,
                    info.is_synced
                );
                Ok(Step::AwaitingJob)
            }
            Err(e) => {
                *failures += 1;
                if *failures >= self.config.max_connect_attempts {
                    log::error!("Giving up after {} connection attempts", failures);
                    return Err(MinerError::ConnectionError(format!(
                        "Node unreachable after {} attempts: {}",
                        failures, e
                    )));
                }
                log::warn!(
                    "Connection attempt {}/{} failed: {}",
                    failures,
                    self.config.max_connect_attempts,
                    e
                );
                tokio::time::sleep(self.config.retry_delay).await;
                Ok(Step::Disconnected)
            }
        }
    }

    async fn await_job(&mut self) -> Result<Step, MinerError> {
        self.publish(SupervisorState::AwaitingJob);
        match self.connector.fetch_job().await {
            Ok(job) => {
                let job = Arc::new(job);
                // Bumping the marker supersedes any straggling workers
                self.job_version.fetch_add(1, Ordering::SeqCst);
                self.current_job = Some(job.clone());
                self.publish(SupervisorState::Hashing);
                log::info!(
                    "Starting job {} at height {} across {} workers",
                    job.job_id,
                    job.height,
                    self.config.worker_count
                );
                let handle = self.engine.start(job, self.config.worker_count);
                Ok(Step::Hashing(handle))
            }
            Err(MinerError::JobUnavailable(reason)) => {
                log::warn!("No job available: {}", reason);
                Ok(Step::Backoff)
            }
            Err(MinerError::ConnectionError(reason)) => {
                log::warn!("Lost node connection while fetching job: {}", reason);
                Ok(Step::Disconnected)
            }
            Err(e) => Err(e),
        }
    }

    async fn hash(&mut self, handle: EngineHandle) -> Result<Step, MinerError> {
        let mut finished_workers = 0usize;
        let mut last_poll = Instant::now();

        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                handle.stop();
                return Ok(Step::AwaitingJob);
            }

            match handle.reports().try_recv() {
                Ok(WorkerReport::Solved(solution)) => {
                    if self.is_current(&solution) {
                        handle.stop();
                        return Ok(Step::Submitting(solution));
                    }
                    // Expected race under job transitions, not an error
                    log::info!(
                        "Discarding stale solution for superseded job {}",
                        solution.job_id
                    );
                }
                Ok(WorkerReport::Stale { worker_id }) => {
                    log::debug!("Worker {} abandoned a stale job", worker_id);
                    finished_workers += 1;
                    if finished_workers == handle.worker_count() {
                        return Ok(Step::AwaitingJob);
                    }
                }
                Ok(WorkerReport::Exhausted { worker_id }) => {
                    log::debug!("Worker {} exhausted its nonce range", worker_id);
                    finished_workers += 1;
                    if finished_workers == handle.worker_count() {
                        log::info!("Nonce space exhausted without a solution");
                        return Ok(Step::AwaitingJob);
                    }
                }
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => return Ok(Step::AwaitingJob),
            }

            if last_poll.elapsed() >= self.config.difficulty_poll_interval {
                last_poll = Instant::now();
                let active_height = self.current_job.as_ref().map(|j| j.height).unwrap_or(0);
                match self.connector.chain_height().await {
                    Ok(height) if height > active_height => {
                        log::info!(
                            "Chain advanced to {} past active job at {}, restarting",
                            height,
                            active_height
                        );
                        // Cancel in-flight hashing rather than letting it
                        // run to exhaustion
                        self.job_version.fetch_add(1, Ordering::SeqCst);
                        handle.stop();
                        return Ok(Step::AwaitingJob);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        log::warn!("Lost node connection while hashing: {}", e);
                        handle.stop();
                        return Ok(Step::Disconnected);
                    }
                }
            }

            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }

    async fn submit(&mut self, solution: Solution) -> Result<Step, MinerError> {
        self.publish(SupervisorState::Submitting);
        let gross = self
            .current_job
            .as_ref()
            .map(|job| job.reward_sompi)
            .unwrap_or(0);

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.connector.submit_solution(&solution).await {
                Ok(SubmitOutcome::Accepted) => {
                    let state = self.ledger.record_reward(gross, &solution.job_id);
                    self.report_submission(SubmissionResult::Accepted);
                    log::info!(
                        "Block accepted for job {} (nonce {}): gross {:.8} KAS, user net now {:.8} KAS",
                        solution.job_id,
                        solution.nonce,
                        gross as f64 / SOMPI_PER_KAS as f64,
                        state.cumulative_user_net as f64 / SOMPI_PER_KAS as f64
                    );
                    if let Some(event) = self.ledger.events().last() {
                        for payout in self.ledger.payouts(event) {
                            log::debug!(
                                "Payout {:?}: {:.8} KAS to {}",
                                payout.kind,
                                payout.amount_sompi as f64 / SOMPI_PER_KAS as f64,
                                payout.address
                            );
                        }
                    }
                    return Ok(Step::AwaitingJob);
                }
                Ok(SubmitOutcome::Rejected { reason }) => {
                    // The nonce is spent either way; no retry, no reward
                    self.report_submission(SubmissionResult::Rejected);
                    log::warn!("Solution for job {} rejected: {}", solution.job_id, reason);
                    return Ok(Step::AwaitingJob);
                }
                Err(MinerError::SubmitError(reason)) => {
                    if attempt < self.config.submit_retry_limit {
                        log::warn!(
                            "Submission attempt {}/{} failed: {}",
                            attempt,
                            self.config.submit_retry_limit,
                            reason
                        );
                        tokio::time::sleep(Duration::from_secs(1)).await;
                        continue;
                    }
                    log::error!(
                        "Submission for job {} failed after {} attempts: {}",
                        solution.job_id,
                        attempt,
                        reason
                    );
                    return Ok(Step::AwaitingJob);
                }
                Err(MinerError::ConnectionError(reason)) => {
                    log::warn!("Lost node connection while submitting: {}", reason);
                    return Ok(Step::Disconnected);
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn backoff(&mut self) -> Step {
        self.publish(SupervisorState::Backoff);
        tokio::time::sleep(self.config.retry_delay).await;
        Step::AwaitingJob
    }

    /// Stale-solution discard rule: only a solution for the active job may
    /// be submitted
    fn is_current(&self, solution: &Solution) -> bool {
        self.current_job
            .as_ref()
            .map(|job| job.job_id == solution.job_id)
            .unwrap_or(false)
    }

    fn report_submission(&self, result: SubmissionResult) {
        if let Some(feed) = &self.submissions {
            let _ = feed.send(result);
        }
    }

    fn publish(&self, state: SupervisorState) {
        let job = self.current_job.as_ref();
        self.snapshot.store(Arc::new(JobSnapshot {
            state,
            job_id: job.map(|j| j.job_id.clone()),
            height: job.map(|j| j.height),
            issued_at: job.map(|j| j.issued_at),
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::miner::algorithm::keccak::Keccak256Algo;
    use crate::network::NodeInfo;
    use crate::rewards::ledger::RewardConfig;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    /// Scripted in-memory node for driving the state machine
    struct MockConnector {
        connect_results: Mutex<VecDeque<Result<NodeInfo, MinerError>>>,
        jobs: Mutex<VecDeque<Result<MiningJob, MinerError>>>,
        submit_results: Mutex<VecDeque<Result<SubmitOutcome, MinerError>>>,
        submitted: Arc<Mutex<Vec<Solution>>>,
        fetch_calls: Arc<AtomicUsize>,
        height: u64,
    }

    impl MockConnector {
        fn new() -> Self {
            MockConnector {
                connect_results: Mutex::new(VecDeque::new()),
                jobs: Mutex::new(VecDeque::new()),
                submit_results: Mutex::new(VecDeque::new()),
                submitted: Arc::new(Mutex::new(Vec::new())),
                fetch_calls: Arc::new(AtomicUsize::new(0)),
                height: 1,
            }
        }
    }

    impl NodeConnector for MockConnector {
        async fn connect(&mut self) -> Result<NodeInfo, MinerError> {
            self.connect_results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(NodeInfo {
                    height: self.height,
                    is_synced: true,
                }))
        }

        async fn fetch_job(&mut self) -> Result<MiningJob, MinerError> {
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            self.jobs
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(MinerError::JobUnavailable("script exhausted".into())))
        }

        async fn submit_solution(
            &mut self,
            solution: &Solution,
        ) -> Result<SubmitOutcome, MinerError> {
            self.submitted.lock().unwrap().push(solution.clone());
            self.submit_results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(SubmitOutcome::Accepted))
        }

        async fn chain_height(&mut self) -> Result<u64, MinerError> {
            Ok(self.height)
        }
    }

    fn open_job(id: &str, reward: u64) -> MiningJob {
        MiningJob {
            job_id: id.into(),
            height: 1,
            prev_block_hash: [5u8; 32],
            merkle_root: [6u8; 32],
            target: [0xff; 32],
            timestamp: 1_700_000_000_000,
            reward_sompi: reward,
            issued_at: SystemTime::now(),
        }
    }

    fn test_ledger() -> Arc<RewardLedger> {
        Arc::new(RewardLedger::new(RewardConfig {
            dev_fee_bps: 1000,
            dev_fee_address: "kaspa:dev".into(),
            owner_address: "kaspa:owner".into(),
            user_address: "kaspa:user".into(),
            owner_target_usd: 50_000,
            price_stale_after: Duration::from_secs(300),
        }))
    }

    fn fast_config() -> SupervisorConfig {
        SupervisorConfig {
            worker_count: 1,
            retry_delay: Duration::from_millis(10),
            difficulty_poll_interval: Duration::from_secs(60),
            submit_retry_limit: 3,
            max_connect_attempts: 3,
        }
    }

    fn supervisor_for(mock: MockConnector) -> JobSupervisor<MockConnector> {
        let engine = HashingEngine::new(Arc::new(Keccak256Algo::new()), 100);
        JobSupervisor::new(mock, engine, test_ledger(), fast_config())
    }

    async fn run_briefly(mut supervisor: JobSupervisor<MockConnector>) {
        let shutdown = supervisor.shutdown_handle();
        let runner = tokio::spawn(async move { supervisor.run().await });
        tokio::time::sleep(Duration::from_millis(400)).await;
        shutdown.store(true, Ordering::SeqCst);
        runner.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn accepted_solution_records_exactly_one_reward() {
        let mock = MockConnector::new();
        mock.jobs
            .lock()
            .unwrap()
            .push_back(Ok(open_job("job-1", 1000)));
        let submitted = mock.submitted.clone();

        let supervisor = supervisor_for(mock);
        let ledger = supervisor.ledger.clone();
        run_briefly(supervisor).await;

        assert_eq!(submitted.lock().unwrap().len(), 1);
        let state = ledger.state();
        assert_eq!(state.cumulative_gross, 1000);
        assert_eq!(ledger.events().len(), 1);
    }

    #[tokio::test]
    async fn rejected_solution_leaves_ledger_unchanged() {
        let mock = MockConnector::new();
        mock.jobs
            .lock()
            .unwrap()
            .push_back(Ok(open_job("job-1", 1000)));
        mock.submit_results
            .lock()
            .unwrap()
            .push_back(Ok(SubmitOutcome::Rejected {
                reason: "block hash above target".into(),
            }));
        let submitted = mock.submitted.clone();
        let fetch_calls = mock.fetch_calls.clone();

        let supervisor = supervisor_for(mock);
        let ledger = supervisor.ledger.clone();
        run_briefly(supervisor).await;

        // One attempt, no reward event, and the supervisor went back for
        // another job afterwards
        assert_eq!(submitted.lock().unwrap().len(), 1);
        assert_eq!(ledger.state().cumulative_gross, 0);
        assert!(ledger.events().is_empty());
        assert!(fetch_calls.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn transient_submit_errors_are_retried_then_dropped() {
        let mock = MockConnector::new();
        mock.jobs
            .lock()
            .unwrap()
            .push_back(Ok(open_job("job-1", 1000)));
        {
            let mut results = mock.submit_results.lock().unwrap();
            results.push_back(Err(MinerError::SubmitError("timeout".into())));
            results.push_back(Err(MinerError::SubmitError("timeout".into())));
            results.push_back(Err(MinerError::SubmitError("timeout".into())));
        }
        let submitted = mock.submitted.clone();

        let mut supervisor = supervisor_for(mock);
        supervisor.config.submit_retry_limit = 3;
        let ledger = supervisor.ledger.clone();

        let shutdown = supervisor.shutdown_handle();
        let runner = tokio::spawn(async move { supervisor.run().await });
        tokio::time::sleep(Duration::from_millis(3_500)).await;
        shutdown.store(true, Ordering::SeqCst);
        runner.await.unwrap().unwrap();

        // Bounded retries, then the submission is logged as failed with no
        // reward event
        assert_eq!(submitted.lock().unwrap().len(), 3);
        assert!(ledger.events().is_empty());
    }

    #[tokio::test]
    async fn stale_solution_is_never_submitted() {
        let mock = MockConnector::new();
        let mut supervisor = supervisor_for(mock);
        supervisor.current_job = Some(Arc::new(open_job("job-current", 1000)));

        let stale = Solution {
            job_id: "job-old".into(),
            header: vec![0u8; 72],
            nonce: 9,
            digest: [0u8; 32],
        };
        assert!(!supervisor.is_current(&stale));

        let current = Solution {
            job_id: "job-current".into(),
            header: vec![0u8; 72],
            nonce: 9,
            digest: [0u8; 32],
        };
        assert!(supervisor.is_current(&current));
    }

    #[tokio::test]
    async fn job_unavailable_backs_off_and_recovers() {
        let mock = MockConnector::new();
        {
            let mut jobs = mock.jobs.lock().unwrap();
            jobs.push_back(Err(MinerError::JobUnavailable("template not ready".into())));
            jobs.push_back(Ok(open_job("job-2", 500)));
        }
        let submitted = mock.submitted.clone();

        let supervisor = supervisor_for(mock);
        let ledger = supervisor.ledger.clone();
        run_briefly(supervisor).await;

        assert_eq!(submitted.lock().unwrap().len(), 1);
        assert_eq!(ledger.state().cumulative_gross, 500);
    }

    #[tokio::test]
    async fn reconnects_after_transient_connection_failures() {
        let mock = MockConnector::new();
        {
            let mut connects = mock.connect_results.lock().unwrap();
            connects.push_back(Err(MinerError::ConnectionError("refused".into())));
            connects.push_back(Err(MinerError::ConnectionError("refused".into())));
        }
        mock.jobs
            .lock()
            .unwrap()
            .push_back(Ok(open_job("job-1", 100)));
        let submitted = mock.submitted.clone();

        let supervisor = supervisor_for(mock);
        run_briefly(supervisor).await;

        assert_eq!(submitted.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn halts_after_connection_budget_is_spent() {
        let mock = MockConnector::new();
        {
            let mut connects = mock.connect_results.lock().unwrap();
            for _ in 0..3 {
                connects.push_back(Err(MinerError::ConnectionError("refused".into())));
            }
        }

        let mut supervisor = supervisor_for(mock);
        assert!(matches!(
            supervisor.run().await,
            Err(MinerError::ConnectionError(_))
        ));
    }

    #[tokio::test]
    async fn snapshot_reflects_active_job() {
        let mock = MockConnector::new();
        mock.jobs
            .lock()
            .unwrap()
            .push_back(Ok(open_job("job-snap", 100)));

        let supervisor = supervisor_for(mock);
        let snapshot = supervisor.job_snapshot();
        run_briefly(supervisor).await;

        let view = snapshot.load();
        assert_eq!(view.job_id.as_deref(), Some("job-snap"));
        assert_eq!(view.height, Some(1));
    }
}
