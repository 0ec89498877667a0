//! Graphload — a concurrent load-generation engine for graph databases.
//!
//! Graphload drives a graph database with either a declarative workload of
//! weighted, parameterized query templates or a self-contained synthetic
//! traffic mix, and measures what happens: throughput, write/read split,
//! latency averages and reservoir-sampled percentiles, errors.
//!
//! The library is deliberately a library: it owns no connection pool, no
//! config-file format, and no output format. You plug in a driver behind
//! [`GraphClient`]/[`GraphSession`] and a sink behind [`Reporter`], and the
//! engine does the rest.
//!
//! # Architecture
//!
//! The main building blocks are:
//!
//! - [`WorkloadSpec`]: a validated, immutable set of weighted query templates
//!   with a precomputed index for O(log n) weighted selection.
//! - [`GraphClient`] / [`GraphSession`]: the driver boundary. The engine opens
//!   one session per worker and runs every operation through it.
//! - [`Engine`]: spawns the workers, drives the reporting loop, and owns the
//!   run lifecycle (`NotStarted → Running → Draining → Stopped`).
//! - [`StatsCollector`]: lock-free global counters plus optional per-query
//!   breakdowns with bounded latency reservoirs.
//! - [`Reporter`]: consumes periodic [`ScheduledReport`]s and the single
//!   final [`FinalReport`] and sends them somewhere (stdout, file, service).
//!
//! # Example
//!
//! Running a synthetic mix against an in-memory fake:
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use async_trait::async_trait;
//! use graphload::{
//!     Engine, ExecutionError, GraphClient, GraphSession, QuerySummary, RunConfig,
//!     report::StdoutReporter, workload::params::ParamMap,
//! };
//!
//! struct FakeSession;
//!
//! #[async_trait]
//! impl GraphSession for FakeSession {
//!     async fn run(&mut self, _text: &str, _params: &ParamMap)
//!         -> Result<QuerySummary, ExecutionError>
//!     {
//!         Ok(QuerySummary { records: 1 })
//!     }
//! }
//!
//! struct FakeClient;
//!
//! #[async_trait]
//! impl GraphClient for FakeClient {
//!     async fn open_session(&self) -> Result<Box<dyn GraphSession>, ExecutionError> {
//!         Ok(Box::new(FakeSession))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut engine = Engine::builder()
//!         .client(Arc::new(FakeClient))
//!         .reporter(Arc::new(StdoutReporter))
//!         .config(
//!             RunConfig::builder()
//!                 .threads(2)
//!                 .duration(Duration::from_secs(1))
//!                 .build(),
//!         )
//!         .build();
//!
//!     let report = engine.run().await.unwrap();
//!     assert!(report.total_ops > 0);
//! }
//! ```
//!
//! For template mode, build a [`workload::WorkloadDef`], run it through
//! [`workload::validate::validate`], and hand the resulting spec to the
//! engine builder via `.workload(Arc::new(spec))`.
//!
//! # Feature flags
//!
//! - `macros`: re-exports the small procedural macro used on report records.
//!   (Enabled by default)
//! - `builtins`: provides [`report::StdoutReporter`] and
//!   [`report::JsonLinesReporter`] for quick experiments and demos.
//!   (Enabled by default)

/// The engine, run configuration, and lifecycle
pub mod engine;
/// Validation, execution, and engine error types
pub mod error;
/// Report records and the reporting sink boundary
pub mod report;
/// The driver boundary: sessions and clients
pub mod session;
/// Thread-safe statistics and reservoir sampling
pub mod stats;
/// Programmatic traffic generation for spec-less runs
pub mod synthetic;
/// Workers and retry/backoff behavior
pub mod worker;
/// Workload definitions, parameter generators, and validation
pub mod workload;

pub use engine::{Engine, EngineHandle, RunConfig, RunState};
pub use error::{EngineError, ExecutionError, ValidationError, ValidationReport};
pub use report::{FinalReport, Reporter, ScheduledReport};
pub use session::{GraphClient, GraphSession, QuerySummary};
pub use stats::StatsCollector;
pub use synthetic::SyntheticProfile;
pub use worker::{BackoffPolicy, Worker};
pub use workload::{OpKind, WorkloadSpec};

#[cfg(feature = "macros")]
/// Procedural macros to reduce boilerplate
pub mod macros {
    pub use graphload_macros::*;
}
