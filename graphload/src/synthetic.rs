//! Synthetic operation synthesis for programmatic mode.
//!
//! When no workload spec is supplied, workers fall back to generating their
//! own traffic: a write-ratio coin flip picks write vs read, a second fair
//! coin picks node vs relationship, and property payloads are padded out to a
//! configured byte size so writes carry realistic weight.

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::workload::OpKind;
use crate::workload::params::{ParamMap, ParamValue};

/// Tuning for synthetic-mode traffic. All fields have workable defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyntheticProfile {
    /// Probability in `[0, 1]` that an iteration performs a write.
    pub write_ratio: f64,
    /// `LIMIT` applied to synthetic read queries.
    pub batch_size: usize,
    pub node_labels: Vec<String>,
    pub relationship_types: Vec<String>,
    /// Approximate size of the padding property attached to created entities.
    pub property_size_bytes: usize,
}

impl Default for SyntheticProfile {
    fn default() -> Self {
        Self {
            write_ratio: 0.7,
            batch_size: 100,
            node_labels: ["Person", "Product", "Order"]
                .map(String::from)
                .to_vec(),
            relationship_types: ["KNOWS", "PURCHASED", "CONTAINS"]
                .map(String::from)
                .to_vec(),
            property_size_bytes: 1024,
        }
    }
}

/// One fully-materialized synthetic operation, ready to run on a session.
#[derive(Debug, Clone)]
pub struct SyntheticOp {
    /// Stable id used for per-operation statistics (`create_node`, ...).
    pub id: &'static str,
    pub kind: OpKind,
    pub text: String,
    pub params: ParamMap,
}

impl SyntheticProfile {
    /// Roll the dice and materialize the next operation.
    pub fn next_op(&self, rng: &mut impl Rng) -> SyntheticOp {
        let write = rng.gen_bool(self.write_ratio.clamp(0.0, 1.0));
        match (write, rng.gen_bool(0.5)) {
            (true, true) => self.create_node(rng),
            (true, false) => self.create_relationship(rng),
            (false, true) => self.read_nodes(rng),
            (false, false) => self.read_relationships(rng),
        }
    }

    fn create_node(&self, rng: &mut impl Rng) -> SyntheticOp {
        let label = pick(&self.node_labels, rng);
        SyntheticOp {
            id: "create_node",
            kind: OpKind::Write,
            text: format!(
                "CREATE (n:{label} {{id: $id, name: $name, ts: $ts, value: $value, payload: $payload}}) RETURN id(n)"
            ),
            params: self.entity_params(rng),
        }
    }

    fn create_relationship(&self, rng: &mut impl Rng) -> SyntheticOp {
        let rel = pick(&self.relationship_types, rng);
        SyntheticOp {
            id: "create_relationship",
            kind: OpKind::Write,
            text: format!(
                "MATCH (a), (b) WHERE id(a) <> id(b) WITH a, b LIMIT 1 \
                 CREATE (a)-[r:{rel} {{ts: $ts, value: $value}}]->(b) RETURN id(r)"
            ),
            params: [
                ("ts".to_owned(), ParamValue::Int(now_millis())),
                ("value".to_owned(), ParamValue::Float(rng.r#gen::<f64>() * 1000.0)),
            ]
            .into_iter()
            .collect(),
        }
    }

    fn read_nodes(&self, rng: &mut impl Rng) -> SyntheticOp {
        let label = pick(&self.node_labels, rng);
        SyntheticOp {
            id: "read_nodes",
            kind: OpKind::Read,
            text: format!("MATCH (n:{label}) RETURN n LIMIT {}", self.batch_size),
            params: ParamMap::new(),
        }
    }

    fn read_relationships(&self, rng: &mut impl Rng) -> SyntheticOp {
        let rel = pick(&self.relationship_types, rng);
        SyntheticOp {
            id: "read_relationships",
            kind: OpKind::Read,
            text: format!(
                "MATCH ()-[r:{rel}]->() RETURN r LIMIT {}",
                self.batch_size
            ),
            params: ParamMap::new(),
        }
    }

    fn entity_params(&self, rng: &mut impl Rng) -> ParamMap {
        // Rough allowance for the scalar properties before padding.
        let padding = self.property_size_bytes.saturating_sub(200);
        [
            ("id".to_owned(), ParamValue::Int(rng.r#gen::<i64>())),
            (
                "name".to_owned(),
                ParamValue::Str(format!("Entity_{}", rng.gen_range(0..100_000))),
            ),
            ("ts".to_owned(), ParamValue::Int(now_millis())),
            (
                "value".to_owned(),
                ParamValue::Float(rng.r#gen::<f64>() * 1000.0),
            ),
            ("payload".to_owned(), ParamValue::Str("x".repeat(padding))),
        ]
        .into_iter()
        .collect()
    }
}

fn pick<'a>(choices: &'a [String], rng: &mut impl Rng) -> &'a str {
    choices
        .choose(rng)
        .map(String::as_str)
        .expect("synthetic profile validated to be non-empty")
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn write_ratio_steers_the_mix() {
        let profile = SyntheticProfile {
            write_ratio: 0.7,
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(11);
        let writes = (0..10_000)
            .filter(|_| profile.next_op(&mut rng).kind.is_write())
            .count();
        let ratio = writes as f64 / 10_000.0;
        assert!((ratio - 0.7).abs() < 0.05, "write ratio {ratio}");
    }

    #[test]
    fn extreme_ratios_produce_pure_streams() {
        let mut rng = StdRng::seed_from_u64(3);
        let all_writes = SyntheticProfile {
            write_ratio: 1.0,
            ..Default::default()
        };
        let all_reads = SyntheticProfile {
            write_ratio: 0.0,
            ..Default::default()
        };
        for _ in 0..500 {
            assert!(all_writes.next_op(&mut rng).kind.is_write());
            assert!(!all_reads.next_op(&mut rng).kind.is_write());
        }
    }

    #[test]
    fn reads_honor_the_batch_size() {
        let profile = SyntheticProfile {
            write_ratio: 0.0,
            batch_size: 42,
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(8);
        let op = profile.next_op(&mut rng);
        assert!(op.text.ends_with("LIMIT 42"), "{}", op.text);
    }

    #[test]
    fn created_nodes_carry_a_sized_payload() {
        let profile = SyntheticProfile {
            write_ratio: 1.0,
            property_size_bytes: 1000,
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(21);
        loop {
            let op = profile.next_op(&mut rng);
            if op.id == "create_node" {
                match &op.params["payload"] {
                    ParamValue::Str(s) => assert_eq!(s.len(), 800),
                    other => panic!("expected string payload, got {other:?}"),
                }
                break;
            }
        }
    }
}
