//! End-to-end runs of the engine against an in-memory fake driver.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use graphload::workload::params::ParamMap;
use graphload::workload::validate::validate;
use graphload::workload::{QueryDef, WorkloadDef};
use graphload::{
    Engine, EngineError, ExecutionError, FinalReport, GraphClient, GraphSession, OpKind,
    QuerySummary, Reporter, RunConfig, RunState, ScheduledReport,
};

struct InstantSession {
    ops: Arc<AtomicU64>,
    fail: bool,
}

#[async_trait]
impl GraphSession for InstantSession {
    async fn run(
        &mut self,
        _text: &str,
        _params: &ParamMap,
    ) -> Result<QuerySummary, ExecutionError> {
        if self.fail {
            return Err(ExecutionError::Query("synthetic failure".into()));
        }
        self.ops.fetch_add(1, Ordering::Relaxed);
        Ok(QuerySummary { records: 1 })
    }
}

struct InstantClient {
    ops: Arc<AtomicU64>,
    fail: bool,
}

impl InstantClient {
    fn ok() -> Self {
        Self {
            ops: Arc::new(AtomicU64::new(0)),
            fail: false,
        }
    }

    fn failing() -> Self {
        Self {
            ops: Arc::new(AtomicU64::new(0)),
            fail: true,
        }
    }
}

#[async_trait]
impl GraphClient for InstantClient {
    async fn open_session(&self) -> Result<Box<dyn GraphSession>, ExecutionError> {
        Ok(Box::new(InstantSession {
            ops: Arc::clone(&self.ops),
            fail: self.fail,
        }))
    }
}

#[derive(Default)]
struct CollectingReporter {
    scheduled: Mutex<Vec<ScheduledReport>>,
    finished: Mutex<Vec<FinalReport>>,
}

#[async_trait]
impl Reporter for CollectingReporter {
    async fn scheduled(
        &self,
        report: &ScheduledReport,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.scheduled.lock().unwrap().push(report.clone());
        Ok(())
    }

    async fn finished(
        &self,
        report: &FinalReport,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.finished.lock().unwrap().push(report.clone());
        Ok(())
    }
}

fn mixed_workload() -> WorkloadDef {
    WorkloadDef {
        name: "mix".into(),
        description: String::new(),
        queries: vec![
            QueryDef {
                id: "light_read".into(),
                text: "MATCH (n:Person) RETURN n LIMIT 1".into(),
                weight: 30.0,
                kind: OpKind::Read,
                params: BTreeMap::new(),
            },
            QueryDef {
                id: "heavy_write".into(),
                text: "CREATE (n:Person {id: $id}) RETURN id(n)".into(),
                weight: 70.0,
                kind: OpKind::Write,
                params: BTreeMap::from([("id".into(), "random:uuid".into())]),
            },
        ],
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn weighted_template_run_reports_and_respects_the_mix() {
    let spec = Arc::new(validate(&mixed_workload()).unwrap());
    let reporter = Arc::new(CollectingReporter::default());
    let mut engine = Engine::builder()
        .client(Arc::new(InstantClient::ok()) as Arc<dyn GraphClient>)
        .reporter(Arc::clone(&reporter) as Arc<dyn Reporter>)
        .config(
            RunConfig::builder()
                .threads(4)
                .duration(Duration::from_secs(3))
                .report_interval(Duration::from_secs(1))
                .pause(Duration::from_micros(50))
                .verbose_stats(true)
                .build(),
        )
        .workload(spec)
        .build();

    let report = engine.run().await.unwrap();
    assert_eq!(engine.state(), RunState::Stopped);
    assert!(report.total_ops > 1_000, "got {} ops", report.total_ops);
    assert_eq!(report.errors, 0);

    let per_query = report.per_query.as_ref().unwrap();
    let light = per_query["light_read"].count;
    let heavy = per_query["heavy_write"].count;
    assert_eq!(light + heavy, report.total_ops);
    assert_eq!(report.reads, light);
    assert_eq!(report.writes, heavy);

    let heavy_share = heavy as f64 / report.total_ops as f64;
    assert!(
        (heavy_share - 0.70).abs() < 0.05,
        "heavy share {heavy_share}"
    );

    assert!(
        !reporter.scheduled.lock().unwrap().is_empty(),
        "expected at least one scheduled report over a 3s run"
    );
    let finished = reporter.finished.lock().unwrap();
    assert_eq!(finished.len(), 1, "exactly one final report");
    assert_eq!(finished[0], report);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn external_stop_drains_a_long_run_early() {
    let client = InstantClient::ok();
    let ops = Arc::clone(&client.ops);
    let mut engine = Engine::builder()
        .client(Arc::new(client) as Arc<dyn GraphClient>)
        .reporter(Arc::new(CollectingReporter::default()) as Arc<dyn Reporter>)
        .config(
            RunConfig::builder()
                .threads(2)
                .duration(Duration::from_secs(60))
                .build(),
        )
        .build();
    let handle = engine.stop_handle();

    let task = tokio::spawn(async move {
        let result = engine.run().await;
        (engine, result)
    });

    while ops.load(Ordering::Relaxed) < 100 {
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    handle.stop();

    let (mut engine, result) = tokio::time::timeout(Duration::from_secs(10), task)
        .await
        .expect("stop request drains the run well before the 60s duration")
        .unwrap();
    let report = result.unwrap();
    assert_eq!(engine.state(), RunState::Stopped);
    assert!(report.total_ops >= 100);

    // The lifecycle is single-use.
    assert!(matches!(
        engine.run().await,
        Err(EngineError::AlreadyStarted)
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn fail_fast_ends_each_worker_after_one_failure() {
    let mut engine = Engine::builder()
        .client(Arc::new(InstantClient::failing()) as Arc<dyn GraphClient>)
        .reporter(Arc::new(CollectingReporter::default()) as Arc<dyn Reporter>)
        .config(
            RunConfig::builder()
                .threads(3)
                .duration(Duration::from_secs(1))
                .fail_fast(true)
                .build(),
        )
        .build();

    let report = engine.run().await.unwrap();
    assert_eq!(report.total_ops, 0);
    assert_eq!(report.errors, 3);
}

#[tokio::test]
async fn invalid_configuration_is_rejected_before_any_work() {
    let client = InstantClient::ok();
    let ops = Arc::clone(&client.ops);
    let mut engine = Engine::builder()
        .client(Arc::new(client) as Arc<dyn GraphClient>)
        .reporter(Arc::new(CollectingReporter::default()) as Arc<dyn Reporter>)
        .config(
            RunConfig::builder()
                .threads(0)
                .duration(Duration::ZERO)
                .build(),
        )
        .build();

    match engine.run().await {
        Err(EngineError::Config(errors)) => assert_eq!(errors.len(), 2, "{errors:?}"),
        other => panic!("expected a config error, got {other:?}"),
    }
    assert_eq!(engine.state(), RunState::NotStarted);
    assert_eq!(ops.load(Ordering::Relaxed), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn synthetic_mode_runs_without_a_workload_spec() {
    let mut engine = Engine::builder()
        .client(Arc::new(InstantClient::ok()) as Arc<dyn GraphClient>)
        .reporter(Arc::new(CollectingReporter::default()) as Arc<dyn Reporter>)
        .config(
            RunConfig::builder()
                .threads(2)
                .duration(Duration::from_secs(1))
                .verbose_stats(true)
                .build(),
        )
        .build();

    let report = engine.run().await.unwrap();
    assert!(report.total_ops > 0);
    assert_eq!(report.writes + report.reads, report.total_ops);

    let known = [
        "create_node",
        "create_relationship",
        "read_nodes",
        "read_relationships",
    ];
    for id in report.per_query.as_ref().unwrap().keys() {
        assert!(known.contains(&id.as_str()), "unexpected op id {id}");
    }
}
