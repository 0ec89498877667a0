//! Workload description: weighted, parameterized query templates.
//!
//! A [`WorkloadSpec`] is built exactly once, through
//! [`validate`](crate::workload::validate::validate), from a raw
//! [`WorkloadDef`] supplied by the embedder (typically deserialized from a
//! config file by an outer layer — this crate owns no file format). After
//! construction it is immutable: the cumulative-weight index used for
//! selection is computed eagerly and never changes.

pub mod params;
pub mod validate;

use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::workload::params::{GeneratorSpec, ParamMap};

/// Whether an operation mutates the database. Drives the write/read split in
/// the statistics, nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum OpKind {
    #[default]
    Read,
    Write,
}

impl OpKind {
    pub fn is_write(self) -> bool {
        matches!(self, OpKind::Write)
    }
}

/// Raw, unvalidated workload definition as supplied by the embedder.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkloadDef {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub queries: Vec<QueryDef>,
}

/// One raw query entry within a [`WorkloadDef`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryDef {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default)]
    pub kind: OpKind,
    /// Parameter name → generator grammar (`random:int:1:100`, literal, ...).
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

fn default_weight() -> f64 {
    1.0
}

/// A validated query template. Immutable.
#[derive(Debug, Clone)]
pub struct QueryTemplate {
    pub id: String,
    pub text: String,
    pub weight: f64,
    pub kind: OpKind,
    pub params: BTreeMap<String, GeneratorSpec>,
}

impl QueryTemplate {
    /// Synthesize one value per declared parameter.
    pub fn generate_params(&self, rng: &mut impl Rng) -> ParamMap {
        self.params
            .iter()
            .map(|(name, spec)| (name.clone(), spec.generate(rng)))
            .collect()
    }
}

/// A validated, immutable workload with a precomputed cumulative-weight index
/// for O(log n) weighted selection.
#[derive(Debug, Clone)]
pub struct WorkloadSpec {
    pub name: String,
    pub description: String,
    templates: Vec<QueryTemplate>,
    cumulative: Vec<f64>,
    total_weight: f64,
}

impl WorkloadSpec {
    /// Build from already-validated templates. Only `validate` calls this;
    /// the invariants (non-empty, unique ids, positive weights) hold here.
    pub(crate) fn from_validated(
        name: String,
        description: String,
        templates: Vec<QueryTemplate>,
    ) -> Self {
        debug_assert!(!templates.is_empty());
        let mut cumulative = Vec::with_capacity(templates.len());
        let mut total_weight = 0.0;
        for template in &templates {
            total_weight += template.weight;
            cumulative.push(total_weight);
        }
        Self {
            name,
            description,
            templates,
            cumulative,
            total_weight,
        }
    }

    pub fn templates(&self) -> &[QueryTemplate] {
        &self.templates
    }

    pub fn total_weight(&self) -> f64 {
        self.total_weight
    }

    /// Weighted random selection: draw `u` uniformly in `[0, total_weight)`
    /// and binary-search for the leftmost template whose cumulative weight is
    /// `>= u`. Ties resolve to the earliest-declared template.
    ///
    /// # Panics
    ///
    /// Panics if the spec holds no templates. That state is unreachable for
    /// specs built through validation; hitting it is a defect, not a
    /// recoverable condition.
    pub fn select_weighted(&self, rng: &mut impl Rng) -> &QueryTemplate {
        assert!(
            !self.templates.is_empty(),
            "defect: weighted selection on an empty workload"
        );
        let u = rng.r#gen::<f64>() * self.total_weight;

        let (mut lo, mut hi) = (0, self.cumulative.len() - 1);
        while lo < hi {
            let mid = (lo + hi) / 2;
            if self.cumulative[mid] < u {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        &self.templates[lo]
    }
}
