use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use graphload::workload::params::ParamMap;
use graphload::workload::validate::validate;
use graphload::workload::{QueryDef, WorkloadDef};
use graphload::{
    Engine, ExecutionError, GraphClient, GraphSession, OpKind, QuerySummary, RunConfig,
    report::StdoutReporter,
};

// Stands in for a real driver wrapper. A production embedder would hold a
// Bolt or HTTP client here and drain the result stream in `run`.
struct FakeSession;

#[async_trait]
impl GraphSession for FakeSession {
    async fn run(&mut self, _text: &str, _params: &ParamMap) -> Result<QuerySummary, ExecutionError> {
        // Pretend the database took a moment
        tokio::time::sleep(Duration::from_micros(300)).await;
        Ok(QuerySummary { records: 1 })
    }
}

struct FakeClient;

#[async_trait]
impl GraphClient for FakeClient {
    async fn open_session(&self) -> Result<Box<dyn GraphSession>, ExecutionError> {
        Ok(Box::new(FakeSession))
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().init();

    let def = WorkloadDef {
        name: "social-smoke".into(),
        description: "Mostly follows, some profile reads".into(),
        queries: vec![
            QueryDef {
                id: "follow".into(),
                text: "MATCH (a:User {id: $a}), (b:User {id: $b}) \
                       CREATE (a)-[:FOLLOWS {since: $since}]->(b)"
                    .into(),
                weight: 70.0,
                kind: OpKind::Write,
                params: BTreeMap::from([
                    ("a".into(), "random:int:1:100000".into()),
                    ("b".into(), "random:int:1:100000".into()),
                    ("since".into(), "random:long:1500000000:1700000000".into()),
                ]),
            },
            QueryDef {
                id: "profile".into(),
                text: "MATCH (u:User {id: $id}) RETURN u".into(),
                weight: 30.0,
                kind: OpKind::Read,
                params: BTreeMap::from([("id".into(), "random:int:1:100000".into())]),
            },
        ],
    };
    let spec = validate(&def).expect("workload is well formed");

    let mut engine = Engine::builder()
        .client(Arc::new(FakeClient) as Arc<dyn GraphClient>)
        .reporter(Arc::new(StdoutReporter) as Arc<dyn graphload::Reporter>)
        .config(
            RunConfig::builder()
                .threads(8)
                .duration(Duration::from_secs(15))
                .report_interval(Duration::from_secs(5))
                .verbose_stats(true)
                .build(),
        )
        .workload(Arc::new(spec))
        .build();

    let report = engine.run().await.expect("run completes");
    println!(
        "\n{} ops in {:.1}s",
        report.total_ops, report.elapsed_secs
    );
}
