//! Workers: the parallel execution units.
//!
//! Each worker owns exactly one session and one random source, and loops:
//! pick an operation, run it, time it, record the outcome, pause briefly.
//! Where the operation comes from is the only difference between the two
//! modes, so it is factored out as an [`OpSource`] with exactly two
//! implementations — template-driven ([`TemplateSource`]) and synthetic
//! ([`SyntheticSource`]) — composed into the worker, never inherited.
//!
//! Cancellation is cooperative: [`StopHandle::stop`] flips a shared flag that
//! the loop polls once per iteration. An in-flight call is never interrupted;
//! the worker simply does not start another one.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::session::GraphClient;
use crate::stats::StatsCollector;
use crate::synthetic::SyntheticProfile;
use crate::workload::params::ParamMap;
use crate::workload::{OpKind, WorkloadSpec};

/// Shared running flag for one worker. `stop` requests termination; the
/// worker also lowers the flag itself when its loop exits (fail-fast, broken
/// session, tripped breaker).
#[derive(Debug, Clone)]
pub struct StopHandle {
    running: Arc<AtomicBool>,
}

impl StopHandle {
    fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// Randomized bounded exponential backoff applied after each failure in
/// normal (non-fail-fast) mode. Doubles per consecutive failure up to `cap`,
/// jittered into `[delay/2, delay]`; a success resets the sequence.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub cap: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(500),
            cap: Duration::from_secs(30),
        }
    }
}

#[derive(Debug)]
struct Backoff {
    policy: BackoffPolicy,
    consecutive: u32,
}

impl Backoff {
    fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            consecutive: 0,
        }
    }

    fn reset(&mut self) {
        self.consecutive = 0;
    }

    fn consecutive(&self) -> u32 {
        self.consecutive
    }

    fn next(&mut self, rng: &mut impl Rng) -> Duration {
        self.consecutive = self.consecutive.saturating_add(1);
        let exp = self.consecutive.saturating_sub(1).min(16);
        let delay = self
            .policy
            .base
            .saturating_mul(1u32 << exp)
            .min(self.policy.cap);
        let jittered = delay.mul_f64(rng.gen_range(0.5..=1.0));
        jittered.max(Duration::from_millis(1))
    }
}

/// Everything a worker shares with the engine.
#[derive(Clone)]
pub struct WorkerContext {
    pub worker_id: usize,
    pub stats: Arc<StatsCollector>,
    pub stop: StopHandle,
    /// Inter-iteration delay keeping a worker from hammering the database.
    pub pause: Duration,
    pub fail_fast: bool,
    /// Consecutive-failure circuit breaker; `None` retries forever.
    pub max_consecutive_failures: Option<u32>,
    pub backoff: BackoffPolicy,
}

impl WorkerContext {
    pub fn new(worker_id: usize, stats: Arc<StatsCollector>) -> Self {
        Self {
            worker_id,
            stats,
            stop: StopHandle::new(),
            pause: Duration::from_millis(1),
            fail_fast: false,
            max_consecutive_failures: None,
            backoff: BackoffPolicy::default(),
        }
    }
}

/// One selected, fully-parameterized operation ready to execute.
#[derive(Debug, Clone)]
pub struct PreparedOp {
    pub id: String,
    pub kind: OpKind,
    pub text: String,
    pub params: ParamMap,
}

/// Where a worker's next operation comes from. Exactly two implementations
/// exist; the choice is made once at startup and never changes mid-run.
pub trait OpSource: Send {
    fn next_op(&mut self, rng: &mut StdRng) -> PreparedOp;
}

/// Weighted selection from a validated workload spec.
pub struct TemplateSource {
    spec: Arc<WorkloadSpec>,
}

impl TemplateSource {
    pub fn new(spec: Arc<WorkloadSpec>) -> Self {
        Self { spec }
    }
}

impl OpSource for TemplateSource {
    fn next_op(&mut self, rng: &mut StdRng) -> PreparedOp {
        let template = self.spec.select_weighted(rng);
        let params = template.generate_params(rng);
        PreparedOp {
            id: template.id.clone(),
            kind: template.kind,
            text: template.text.clone(),
            params,
        }
    }
}

/// Write-ratio coin flip plus synthetic data synthesis.
pub struct SyntheticSource {
    profile: SyntheticProfile,
}

impl SyntheticSource {
    pub fn new(profile: SyntheticProfile) -> Self {
        Self { profile }
    }
}

impl OpSource for SyntheticSource {
    fn next_op(&mut self, rng: &mut StdRng) -> PreparedOp {
        let op = self.profile.next_op(rng);
        PreparedOp {
            id: op.id.to_owned(),
            kind: op.kind,
            text: op.text,
            params: op.params,
        }
    }
}

/// The polymorphic worker capability the engine drives.
#[async_trait]
pub trait Worker: Send {
    /// Run until stopped. Consumes failures; never panics on them.
    async fn run(&mut self);

    fn handle(&self) -> StopHandle;

    fn stop(&self) {
        self.handle().stop();
    }

    fn is_running(&self) -> bool {
        self.handle().is_running()
    }
}

/// The one worker implementation, generic over its operation source.
pub struct LoadWorker<S> {
    ctx: WorkerContext,
    client: Arc<dyn GraphClient>,
    source: S,
    rng: StdRng,
}

/// Workload-spec mode worker.
pub type TemplateWorker = LoadWorker<TemplateSource>;
/// Programmatic-generation mode worker.
pub type SyntheticWorker = LoadWorker<SyntheticSource>;

impl<S: OpSource> LoadWorker<S> {
    pub fn new(ctx: WorkerContext, client: Arc<dyn GraphClient>, source: S) -> Self {
        Self {
            ctx,
            client,
            source,
            rng: StdRng::from_entropy(),
        }
    }
}

#[async_trait]
impl<S: OpSource> Worker for LoadWorker<S> {
    async fn run(&mut self) {
        let worker_id = self.ctx.worker_id;
        let mut session = match self.client.open_session().await {
            Ok(session) => session,
            Err(err) => {
                error!(worker_id, %err, "could not open session; worker exiting");
                self.ctx.stats.record_error(None);
                self.ctx.stop.stop();
                return;
            }
        };

        let mut backoff = Backoff::new(self.ctx.backoff);

        while self.ctx.stop.is_running() {
            let op = self.source.next_op(&mut self.rng);
            let started = Instant::now();

            match session.run(&op.text, &op.params).await {
                Ok(_) => {
                    self.ctx
                        .stats
                        .record_operation(&op.id, op.kind, started.elapsed());
                    backoff.reset();
                }
                Err(err) => {
                    self.ctx.stats.record_error(Some(&op.id));
                    warn!(worker_id, op = %op.id, %err, "operation failed");

                    if self.ctx.fail_fast {
                        info!(worker_id, "fail-fast: worker ending after first failure");
                        break;
                    }

                    let delay = backoff.next(&mut self.rng);
                    if let Some(limit) = self.ctx.max_consecutive_failures {
                        if backoff.consecutive() >= limit {
                            error!(
                                worker_id,
                                failures = backoff.consecutive(),
                                "circuit breaker tripped; worker ending"
                            );
                            break;
                        }
                    }
                    tokio::time::sleep(delay).await;
                    continue;
                }
            }

            tokio::time::sleep(self.ctx.pause).await;
        }

        self.ctx.stop.stop();
    }

    fn handle(&self) -> StopHandle {
        self.ctx.stop.clone()
    }
}
