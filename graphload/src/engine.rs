//! The engine: run configuration, lifecycle, and the reporting loop.
//!
//! A run moves through `NotStarted → Running → Draining → Stopped` exactly
//! once. `Running → Draining` is triggered by expiry of the configured
//! duration or by an [`EngineHandle::stop`] call; `Stopped` is terminal and
//! reached only after the reporting loop is cancelled, every worker has been
//! joined (within a bounded grace period), and the single unconditional
//! final summary has been emitted.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use typed_builder::TypedBuilder;

use crate::error::EngineError;
use crate::report::{FinalReport, Reporter, ScheduledReport};
use crate::session::GraphClient;
use crate::stats::StatsCollector;
use crate::synthetic::SyntheticProfile;
use crate::worker::{
    BackoffPolicy, LoadWorker, StopHandle, SyntheticSource, TemplateSource, Worker, WorkerContext,
};
use crate::workload::WorkloadSpec;

/// How long workers get to finish their current iteration at shutdown.
const WORKER_GRACE: Duration = Duration::from_secs(30);
/// The reporting loop only sleeps between ticks, so its bound is tighter.
const REPORTER_GRACE: Duration = Duration::from_secs(5);

/// Run parameters. Defaults mirror a modest smoke-test run; validation is a
/// single pass that reports every violation at once.
#[derive(Debug, Clone, TypedBuilder)]
pub struct RunConfig {
    /// Worker count, bounded to `[1, 100]`.
    #[builder(default = 4)]
    pub threads: usize,
    pub duration: Duration,
    #[builder(default = Duration::from_secs(10))]
    pub report_interval: Duration,
    /// Inter-iteration delay per worker.
    #[builder(default = Duration::from_millis(1))]
    pub pause: Duration,
    #[builder(default = false)]
    pub fail_fast: bool,
    /// Enables per-query counters and latency reservoirs.
    #[builder(default = false)]
    pub verbose_stats: bool,
    #[builder(default = 1000)]
    pub reservoir_capacity: usize,
    /// Consecutive-failure circuit breaker; `None` keeps retrying forever.
    #[builder(default, setter(strip_option))]
    pub max_consecutive_failures: Option<u32>,
    #[builder(default)]
    pub backoff: BackoffPolicy,
    /// Used only when no workload spec is supplied.
    #[builder(default)]
    pub synthetic: SyntheticProfile,
}

impl RunConfig {
    /// Check every bound and return all violations together.
    pub fn validate(&self, has_workload: bool) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        if !(1..=100).contains(&self.threads) {
            errors.push(format!(
                "threads must be between 1 and 100, got {}",
                self.threads
            ));
        }
        if self.duration < Duration::from_secs(1) {
            errors.push(format!(
                "duration must be at least 1 second, got {:?}",
                self.duration
            ));
        }
        if self.report_interval < Duration::from_secs(1) {
            errors.push(format!(
                "report interval must be at least 1 second, got {:?}",
                self.report_interval
            ));
        }
        if self.reservoir_capacity == 0 {
            errors.push("reservoir capacity must be at least 1".to_owned());
        }
        if !has_workload {
            let s = &self.synthetic;
            if !(0.0..=1.0).contains(&s.write_ratio) {
                errors.push(format!(
                    "write ratio must be between 0.0 and 1.0, got {}",
                    s.write_ratio
                ));
            }
            if s.batch_size == 0 {
                errors.push("batch size must be at least 1".to_owned());
            }
            if s.property_size_bytes == 0 {
                errors.push("property size must be at least 1 byte".to_owned());
            }
            if s.node_labels.is_empty() {
                errors.push("at least one node label is required".to_owned());
            }
            if s.relationship_types.is_empty() {
                errors.push("at least one relationship type is required".to_owned());
            }
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Lifecycle of one engine. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    NotStarted,
    Running,
    Draining,
    Stopped,
}

/// Cloneable handle for requesting a stop from outside the run (a signal
/// handler, a test harness). Idempotent; stopping an already-draining run is
/// a no-op.
#[derive(Clone)]
pub struct EngineHandle {
    stop_tx: Arc<watch::Sender<bool>>,
}

impl EngineHandle {
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }
}

/// The workload engine: spawns workers, drives the reporting loop, and owns
/// the run lifecycle.
#[derive(TypedBuilder)]
pub struct Engine {
    client: Arc<dyn GraphClient>,
    reporter: Arc<dyn Reporter>,
    config: RunConfig,
    /// Template mode when present, synthetic mode when absent. Chosen once.
    #[builder(default, setter(strip_option))]
    workload: Option<Arc<WorkloadSpec>>,
    #[builder(default = RunState::NotStarted, setter(skip))]
    state: RunState,
    #[builder(default = stop_channel(), setter(skip))]
    stop: (Arc<watch::Sender<bool>>, watch::Receiver<bool>),
}

fn stop_channel() -> (Arc<watch::Sender<bool>>, watch::Receiver<bool>) {
    let (tx, rx) = watch::channel(false);
    (Arc::new(tx), rx)
}

impl Engine {
    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn stop_handle(&self) -> EngineHandle {
        EngineHandle {
            stop_tx: Arc::clone(&self.stop.0),
        }
    }

    /// Execute one full run and return the final whole-run summary.
    ///
    /// Per-operation failures never surface here; they are counted, logged,
    /// and reflected in the summary's error count. The run itself succeeds
    /// unless the configuration is invalid or the engine already ran.
    pub async fn run(&mut self) -> Result<FinalReport, EngineError> {
        if self.state != RunState::NotStarted {
            return Err(EngineError::AlreadyStarted);
        }
        self.config
            .validate(self.workload.is_some())
            .map_err(EngineError::Config)?;

        match &self.workload {
            Some(spec) => info!(
                workload = %spec.name,
                queries = spec.templates().len(),
                threads = self.config.threads,
                "starting workload-spec run"
            ),
            None => info!(
                write_ratio = self.config.synthetic.write_ratio,
                threads = self.config.threads,
                "starting synthetic run"
            ),
        }

        let started = Instant::now();
        let stats = Arc::new(StatsCollector::new(
            self.config.verbose_stats,
            self.config.reservoir_capacity,
        ));
        self.state = RunState::Running;

        let (reporter_stop_tx, reporter_stop_rx) = watch::channel(false);
        let mut reporter_task = tokio::spawn(reporting_loop(
            Arc::clone(&stats),
            Arc::clone(&self.reporter),
            self.config.report_interval,
            reporter_stop_rx,
        ));

        let mut stop_handles: Vec<StopHandle> = Vec::with_capacity(self.config.threads);
        let mut worker_tasks = Vec::with_capacity(self.config.threads);
        for worker_id in 0..self.config.threads {
            let mut worker = self.spawn_worker(worker_id, Arc::clone(&stats));
            stop_handles.push(worker.handle());
            worker_tasks.push(tokio::spawn(async move { worker.run().await }));
        }

        let mut stop_rx = self.stop.1.clone();
        tokio::select! {
            _ = tokio::time::sleep(self.config.duration) => {
                info!("run duration elapsed");
            }
            _ = stop_rx.wait_for(|stopped| *stopped) => {
                info!("external stop received");
            }
        }

        self.state = RunState::Draining;

        // The reporting loop is cancelled before workers are joined so a
        // scheduled tick never races the final summary.
        let _ = reporter_stop_tx.send(true);
        if tokio::time::timeout(REPORTER_GRACE, &mut reporter_task)
            .await
            .is_err()
        {
            warn!("reporting loop missed its shutdown bound; aborting it");
            reporter_task.abort();
        }

        for handle in &stop_handles {
            handle.stop();
        }
        let deadline = Instant::now() + WORKER_GRACE;
        for (worker_id, mut task) in worker_tasks.into_iter().enumerate() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match tokio::time::timeout(remaining, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => warn!(worker_id, %err, "worker task failed to join"),
                Err(_) => {
                    warn!(worker_id, "worker missed the drain grace period; aborting it");
                    task.abort();
                }
            }
        }

        let final_report = FinalReport::from_snapshot(&stats.snapshot(), started.elapsed());
        if let Err(err) = self.reporter.finished(&final_report).await {
            warn!(%err, "reporting sink rejected the final summary");
        }

        self.state = RunState::Stopped;
        info!(
            total_ops = final_report.total_ops,
            errors = final_report.errors,
            "run complete"
        );
        Ok(final_report)
    }

    fn spawn_worker(&self, worker_id: usize, stats: Arc<StatsCollector>) -> Box<dyn Worker> {
        let mut ctx = WorkerContext::new(worker_id, stats);
        ctx.pause = self.config.pause;
        ctx.fail_fast = self.config.fail_fast;
        ctx.max_consecutive_failures = self.config.max_consecutive_failures;
        ctx.backoff = self.config.backoff;

        match &self.workload {
            Some(spec) => Box::new(LoadWorker::new(
                ctx,
                Arc::clone(&self.client),
                TemplateSource::new(Arc::clone(spec)),
            )),
            None => Box::new(LoadWorker::new(
                ctx,
                Arc::clone(&self.client),
                SyntheticSource::new(self.config.synthetic.clone()),
            )),
        }
    }
}

/// Periodic delta reporting, on its own cadence, fully independent of worker
/// scheduling. Reads snapshots only; never blocks a writer.
async fn reporting_loop(
    stats: Arc<StatsCollector>,
    reporter: Arc<dyn Reporter>,
    interval: Duration,
    mut stop_rx: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut previous = stats.snapshot();
    let mut last_emit = Instant::now();

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let current = stats.snapshot();
                // A tick under 1s since the last emitted one is skipped and
                // the baseline kept, so the next delta covers the full span.
                if let Some(report) = ScheduledReport::delta(&previous, &current, last_emit.elapsed()) {
                    if let Err(err) = reporter.scheduled(&report).await {
                        warn!(%err, "reporting sink rejected a scheduled report");
                    }
                    previous = current;
                    last_emit = Instant::now();
                }
            }
            _ = stop_rx.changed() => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> RunConfig {
        RunConfig::builder()
            .duration(Duration::from_secs(5))
            .build()
    }

    #[test]
    fn default_config_is_valid() {
        assert!(base_config().validate(false).is_ok());
        assert!(base_config().validate(true).is_ok());
    }

    #[test]
    fn validation_collects_every_violation() {
        let mut config = base_config();
        config.threads = 0;
        config.duration = Duration::from_millis(200);
        config.report_interval = Duration::ZERO;
        config.synthetic.write_ratio = 1.5;
        config.synthetic.batch_size = 0;
        let errors = config.validate(false).unwrap_err();
        assert_eq!(errors.len(), 5, "{errors:?}");
    }

    #[test]
    fn thread_bounds_are_enforced_on_both_ends() {
        let mut config = base_config();
        config.threads = 101;
        assert!(config.validate(false).is_err());
        config.threads = 100;
        assert!(config.validate(false).is_ok());
        config.threads = 1;
        assert!(config.validate(false).is_ok());
    }

    #[test]
    fn synthetic_bounds_are_ignored_in_workload_mode() {
        let mut config = base_config();
        config.synthetic.write_ratio = 7.0;
        assert!(config.validate(true).is_ok());
        assert!(config.validate(false).is_err());
    }
}
