//! Reporting records and the sink boundary.
//!
//! The engine never formats output. It produces [`ScheduledReport`] and
//! [`FinalReport`] records and hands them to a [`Reporter`], which is free to
//! print, serialize, or ship them wherever it likes. Two small builtins are
//! provided behind the `builtins` feature for quick experiments; anything
//! fancier (CSV files, dashboards) belongs in the embedder.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use graphload_macros::record;

use crate::stats::{QuerySnapshot, StatsSnapshot};

/// Minimum spacing between two scheduled reports. Ticks that fire closer
/// together than this are skipped outright; rates computed over near-zero
/// intervals are noise.
pub const MIN_REPORT_SPACING: Duration = Duration::from_secs(1);

/// Per-query breakdown attached to reports when verbose stats are on.
/// Percentiles are estimated from a bounded reservoir sample and are
/// approximate by design.
#[record]
pub struct QueryBreakdown {
    pub count: u64,
    pub writes: u64,
    pub reads: u64,
    pub errors: u64,
    pub avg_latency_ms: f64,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
}

impl From<&QuerySnapshot> for QueryBreakdown {
    fn from(snapshot: &QuerySnapshot) -> Self {
        Self {
            count: snapshot.count,
            writes: snapshot.writes,
            reads: snapshot.reads,
            errors: snapshot.errors,
            avg_latency_ms: snapshot.avg_latency_ms(),
            p50_ms: snapshot.percentile_ms(50.0),
            p95_ms: snapshot.percentile_ms(95.0),
            p99_ms: snapshot.percentile_ms(99.0),
        }
    }
}

/// One periodic progress record: cumulative totals plus rates computed from
/// the delta against the previous tick.
#[record]
pub struct ScheduledReport {
    pub timestamp: DateTime<Utc>,
    pub total_ops: u64,
    pub writes_per_sec: f64,
    pub reads_per_sec: f64,
    pub avg_latency_ms: f64,
    pub error_count: u64,
    pub per_query: Option<BTreeMap<String, QueryBreakdown>>,
}

impl ScheduledReport {
    /// Build the delta record between two snapshots. Returns `None` when the
    /// elapsed time is under [`MIN_REPORT_SPACING`]; the caller skips that
    /// tick instead of dividing by a near-zero interval.
    pub fn delta(
        previous: &StatsSnapshot,
        current: &StatsSnapshot,
        elapsed: Duration,
    ) -> Option<Self> {
        if elapsed < MIN_REPORT_SPACING {
            return None;
        }
        let secs = elapsed.as_secs_f64();
        Some(Self {
            timestamp: Utc::now(),
            total_ops: current.total_ops,
            writes_per_sec: current.writes.saturating_sub(previous.writes) as f64 / secs,
            reads_per_sec: current.reads.saturating_sub(previous.reads) as f64 / secs,
            avg_latency_ms: current.avg_latency_ms(),
            error_count: current.errors,
            per_query: current.per_query.as_ref().map(breakdowns),
        })
    }
}

/// The single, unconditional whole-run summary emitted at shutdown.
#[record]
pub struct FinalReport {
    pub finished_at: DateTime<Utc>,
    pub elapsed_secs: f64,
    pub total_ops: u64,
    pub writes: u64,
    pub reads: u64,
    pub errors: u64,
    pub avg_latency_ms: f64,
    pub per_query: Option<BTreeMap<String, QueryBreakdown>>,
}

impl FinalReport {
    pub fn from_snapshot(snapshot: &StatsSnapshot, elapsed: Duration) -> Self {
        Self {
            finished_at: Utc::now(),
            elapsed_secs: elapsed.as_secs_f64(),
            total_ops: snapshot.total_ops,
            writes: snapshot.writes,
            reads: snapshot.reads,
            errors: snapshot.errors,
            avg_latency_ms: snapshot.avg_latency_ms(),
            per_query: snapshot.per_query.as_ref().map(breakdowns),
        }
    }
}

fn breakdowns(per_query: &BTreeMap<String, QuerySnapshot>) -> BTreeMap<String, QueryBreakdown> {
    per_query
        .iter()
        .map(|(id, snapshot)| (id.clone(), QueryBreakdown::from(snapshot)))
        .collect()
}

/// Consumes report records and performs the side effects: displaying them,
/// appending to a file, posting to a service. The I/O boundary of the crate.
#[async_trait]
pub trait Reporter: Send + Sync {
    async fn scheduled(
        &self,
        report: &ScheduledReport,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    async fn finished(
        &self,
        report: &FinalReport,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

#[cfg(feature = "builtins")]
pub use builtins::*;

#[cfg(feature = "builtins")]
mod builtins {
    use super::*;

    /// Prints one human-readable line per tick and a short block at the end.
    pub struct StdoutReporter;

    #[async_trait]
    impl Reporter for StdoutReporter {
        async fn scheduled(
            &self,
            report: &ScheduledReport,
        ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            println!(
                "[{}] Operations: {} | Write/sec: {:.0} | Read/sec: {:.0} | Avg Response: {:.1}ms | Errors: {}",
                report.timestamp.format("%Y-%m-%d %H:%M:%S"),
                report.total_ops,
                report.writes_per_sec,
                report.reads_per_sec,
                report.avg_latency_ms,
                report.error_count,
            );
            if let Some(per_query) = &report.per_query {
                for (id, q) in per_query {
                    println!(
                        "    {id}: count={}, avg={:.1}ms, p50={:.1}ms, p95={:.1}ms, p99={:.1}ms, errors={}",
                        q.count, q.avg_latency_ms, q.p50_ms, q.p95_ms, q.p99_ms, q.errors,
                    );
                }
            }
            Ok(())
        }

        async fn finished(
            &self,
            report: &FinalReport,
        ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            println!("\nFinal Statistics:");
            println!("  Total Operations: {}", report.total_ops);
            println!("  Total Writes: {}", report.writes);
            println!("  Total Reads: {}", report.reads);
            println!("  Total Errors: {}", report.errors);
            println!("  Average Response Time: {:.1}ms", report.avg_latency_ms);
            if let Some(per_query) = &report.per_query {
                println!("  Per-Query:");
                for (id, q) in per_query {
                    println!(
                        "    {id}: count={} (writes: {}, reads: {}), avg={:.1}ms, p50={:.1}ms, p95={:.1}ms, p99={:.1}ms, errors={}",
                        q.count,
                        q.writes,
                        q.reads,
                        q.avg_latency_ms,
                        q.p50_ms,
                        q.p95_ms,
                        q.p99_ms,
                        q.errors,
                    );
                }
            }
            Ok(())
        }
    }

    /// Emits each record as one JSON object per line, suitable for piping
    /// into log collectors.
    pub struct JsonLinesReporter;

    #[async_trait]
    impl Reporter for JsonLinesReporter {
        async fn scheduled(
            &self,
            report: &ScheduledReport,
        ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            println!("{}", serde_json::to_string(report)?);
            Ok(())
        }

        async fn finished(
            &self,
            report: &FinalReport,
        ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            println!("{}", serde_json::to_string(report)?);
            Ok(())
        }
    }
}
