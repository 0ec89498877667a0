//! Thread-safe statistics collection.
//!
//! The collector is the single piece of state every worker mutates
//! concurrently. The global counters are lock-free atomics; per-query state
//! (enabled only in verbose mode) lives behind a read-mostly map where each
//! query id owns its own mutex-guarded latency [`Reservoir`]. Workers hitting
//! different ids never contend with each other.

pub mod reservoir;

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use crate::stats::reservoir::{Reservoir, percentile};
use crate::workload::OpKind;

/// Global and optional per-query counters, shared by all workers.
pub struct StatsCollector {
    total_ops: AtomicU64,
    writes: AtomicU64,
    reads: AtomicU64,
    errors: AtomicU64,
    total_latency_us: AtomicU64,
    /// Present only in verbose mode; absent means per-query tracking is off.
    per_query: Option<RwLock<HashMap<String, Arc<QueryStats>>>>,
    reservoir_capacity: usize,
}

impl StatsCollector {
    pub fn new(verbose: bool, reservoir_capacity: usize) -> Self {
        Self {
            total_ops: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            reads: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            total_latency_us: AtomicU64::new(0),
            per_query: verbose.then(|| RwLock::new(HashMap::new())),
            reservoir_capacity,
        }
    }

    /// Record one successful operation.
    pub fn record_operation(&self, id: &str, kind: OpKind, latency: Duration) {
        let latency_us = latency.as_micros() as u64;
        self.total_ops.fetch_add(1, Ordering::Relaxed);
        if kind.is_write() {
            self.writes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.reads.fetch_add(1, Ordering::Relaxed);
        }
        self.total_latency_us.fetch_add(latency_us, Ordering::Relaxed);

        if let Some(stats) = self.query_stats(id) {
            stats.record(kind, latency_us);
        }
    }

    /// Record one failed operation. `id` is absent for failures outside any
    /// particular operation (e.g. a session that could not be opened).
    pub fn record_error(&self, id: Option<&str>) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        if let Some(stats) = id.and_then(|id| self.query_stats(id)) {
            stats.errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn total_ops(&self) -> u64 {
        self.total_ops.load(Ordering::Relaxed)
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    /// Point-in-time copy of all counters and reservoirs. Percentile queries
    /// run against the snapshot, never against live state.
    pub fn snapshot(&self) -> StatsSnapshot {
        let per_query = self.per_query.as_ref().map(|map| {
            let map = map.read().expect("per-query stats lock poisoned");
            map.iter()
                .map(|(id, stats)| (id.clone(), stats.snapshot()))
                .collect()
        });

        StatsSnapshot {
            total_ops: self.total_ops.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            reads: self.reads.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            total_latency_us: self.total_latency_us.load(Ordering::Relaxed),
            per_query,
        }
    }

    /// Get-or-create the per-query entry, taking the write lock only on the
    /// first observation of a new id.
    fn query_stats(&self, id: &str) -> Option<Arc<QueryStats>> {
        let map = self.per_query.as_ref()?;
        if let Some(stats) = map
            .read()
            .expect("per-query stats lock poisoned")
            .get(id)
        {
            return Some(Arc::clone(stats));
        }
        let mut map = map.write().expect("per-query stats lock poisoned");
        Some(Arc::clone(map.entry(id.to_owned()).or_insert_with(|| {
            Arc::new(QueryStats::new(self.reservoir_capacity))
        })))
    }
}

/// Counters for one query id. The reservoir mutex is private to this id;
/// workers recording different ids never serialize on it.
pub struct QueryStats {
    count: AtomicU64,
    writes: AtomicU64,
    reads: AtomicU64,
    errors: AtomicU64,
    total_latency_us: AtomicU64,
    reservoir: Mutex<Reservoir>,
}

impl QueryStats {
    fn new(reservoir_capacity: usize) -> Self {
        Self {
            count: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            reads: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            total_latency_us: AtomicU64::new(0),
            reservoir: Mutex::new(Reservoir::new(reservoir_capacity)),
        }
    }

    fn record(&self, kind: OpKind, latency_us: u64) {
        self.count.fetch_add(1, Ordering::Relaxed);
        if kind.is_write() {
            self.writes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.reads.fetch_add(1, Ordering::Relaxed);
        }
        self.total_latency_us.fetch_add(latency_us, Ordering::Relaxed);
        self.reservoir
            .lock()
            .expect("reservoir lock poisoned")
            .record(latency_us, &mut rand::thread_rng());
    }

    fn snapshot(&self) -> QuerySnapshot {
        QuerySnapshot {
            count: self.count.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            reads: self.reads.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            total_latency_us: self.total_latency_us.load(Ordering::Relaxed),
            latencies_us: self
                .reservoir
                .lock()
                .expect("reservoir lock poisoned")
                .sample()
                .to_vec(),
        }
    }
}

/// Frozen copy of the collector at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsSnapshot {
    pub total_ops: u64,
    pub writes: u64,
    pub reads: u64,
    pub errors: u64,
    pub total_latency_us: u64,
    pub per_query: Option<BTreeMap<String, QuerySnapshot>>,
}

impl StatsSnapshot {
    pub fn avg_latency_ms(&self) -> f64 {
        if self.total_ops == 0 {
            return 0.0;
        }
        self.total_latency_us as f64 / self.total_ops as f64 / 1_000.0
    }
}

/// Frozen per-query counters plus the latency sample at snapshot time.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySnapshot {
    pub count: u64,
    pub writes: u64,
    pub reads: u64,
    pub errors: u64,
    pub total_latency_us: u64,
    pub latencies_us: Vec<u64>,
}

impl QuerySnapshot {
    pub fn avg_latency_ms(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.total_latency_us as f64 / self.count as f64 / 1_000.0
    }

    /// Approximate p-th percentile latency in milliseconds, estimated from
    /// the reservoir sample.
    pub fn percentile_ms(&self, p: f64) -> f64 {
        percentile(&self.latencies_us, p) as f64 / 1_000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn concurrent_increments_lose_nothing() {
        let stats = Arc::new(StatsCollector::new(false, 1000));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let stats = Arc::clone(&stats);
            handles.push(thread::spawn(move || {
                for _ in 0..10_000 {
                    stats.record_operation("op", OpKind::Write, Duration::from_millis(1));
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(stats.total_ops(), 80_000);
        assert_eq!(stats.snapshot().writes, 80_000);
    }

    #[test]
    fn per_query_tracking_is_off_unless_verbose() {
        let stats = StatsCollector::new(false, 1000);
        stats.record_operation("a", OpKind::Read, Duration::from_millis(5));
        assert!(stats.snapshot().per_query.is_none());
    }

    #[test]
    fn verbose_mode_splits_counters_by_id() {
        let stats = StatsCollector::new(true, 1000);
        stats.record_operation("a", OpKind::Read, Duration::from_millis(2));
        stats.record_operation("a", OpKind::Read, Duration::from_millis(4));
        stats.record_operation("b", OpKind::Write, Duration::from_millis(6));
        stats.record_error(Some("b"));

        let snapshot = stats.snapshot();
        let per_query = snapshot.per_query.unwrap();
        assert_eq!(per_query["a"].count, 2);
        assert_eq!(per_query["a"].reads, 2);
        assert_eq!(per_query["b"].writes, 1);
        assert_eq!(per_query["b"].errors, 1);
        assert!((per_query["a"].avg_latency_ms() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn total_count_equals_sum_of_per_query_counts() {
        let stats = StatsCollector::new(true, 1000);
        for i in 0..250u64 {
            let id = if i % 3 == 0 { "x" } else { "y" };
            stats.record_operation(id, OpKind::Read, Duration::from_micros(i));
        }
        let snapshot = stats.snapshot();
        let sum: u64 = snapshot
            .per_query
            .as_ref()
            .unwrap()
            .values()
            .map(|q| q.count)
            .sum();
        assert_eq!(snapshot.total_ops, sum);
    }

    #[test]
    fn error_without_id_still_counts_globally() {
        let stats = StatsCollector::new(true, 1000);
        stats.record_error(None);
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.errors, 1);
        assert!(snapshot.per_query.unwrap().is_empty());
    }

    #[test]
    fn snapshot_percentiles_come_from_a_copy() {
        let stats = StatsCollector::new(true, 1000);
        for ms in [3u64, 1, 5, 2, 4] {
            stats.record_operation("q", OpKind::Read, Duration::from_millis(ms));
        }
        let snapshot = stats.snapshot();
        let q = &snapshot.per_query.as_ref().unwrap()["q"];
        assert!((q.percentile_ms(50.0) - 3.0).abs() < 1e-9);
        // Live reservoir is untouched by the percentile query.
        let again = stats.snapshot();
        assert_eq!(again.per_query.unwrap()["q"].latencies_us, q.latencies_us);
    }
}
