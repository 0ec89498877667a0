//! Workload validation.
//!
//! Runs once, before any worker starts. Every problem found in the pass is
//! collected into a single [`ValidationReport`] — the caller sees all of them
//! at once instead of fixing one, re-running, and finding the next.

use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{ValidationError, ValidationReport};
use crate::workload::params::GeneratorSpec;
use crate::workload::{QueryTemplate, WorkloadDef, WorkloadSpec};

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$([A-Za-z_][A-Za-z0-9_]*)").expect("placeholder regex"));

/// Validate a raw workload definition and, if clean, build the immutable
/// [`WorkloadSpec`] with its cumulative-weight index.
pub fn validate(def: &WorkloadDef) -> Result<WorkloadSpec, ValidationReport> {
    let mut report = ValidationReport::default();

    if def.name.trim().is_empty() {
        report.warn("workload has no name");
    }
    if def.queries.is_empty() {
        report.error(ValidationError::EmptyWorkload);
        return Err(report);
    }

    let mut seen_ids: HashSet<&str> = HashSet::new();
    let mut total_weight = 0.0;
    let mut templates = Vec::with_capacity(def.queries.len());

    for (index, query) in def.queries.iter().enumerate() {
        // Positional fallback so later errors can still name the entry.
        let id = if query.id.trim().is_empty() {
            report.error(ValidationError::MissingId(format!("query[{index}]")));
            format!("query[{index}]")
        } else {
            query.id.clone()
        };

        if !query.id.trim().is_empty() && !seen_ids.insert(query.id.as_str()) {
            report.error(ValidationError::DuplicateId(query.id.clone()));
        }

        if query.text.trim().is_empty() {
            report.error(ValidationError::EmptyQueryText(id.clone()));
        }

        if query.weight <= 0.0 || !query.weight.is_finite() {
            report.error(ValidationError::NonPositiveWeight {
                id: id.clone(),
                weight: query.weight,
            });
        } else {
            total_weight += query.weight;
        }

        let mut params = BTreeMap::new();
        for (name, grammar) in &query.params {
            match GeneratorSpec::parse(grammar) {
                Ok(spec) => {
                    params.insert(name.clone(), spec);
                }
                Err(message) => report.error(ValidationError::BadGenerator {
                    id: id.clone(),
                    param: name.clone(),
                    message,
                }),
            }
            if !references_placeholder(&query.text, name) {
                report.warn(format!(
                    "query `{id}`: parameter `${name}` is declared but never used"
                ));
            }
        }

        for placeholder in placeholders(&query.text) {
            if !query.params.contains_key(placeholder) {
                report.error(ValidationError::UndeclaredParameter {
                    id: id.clone(),
                    param: placeholder.to_owned(),
                });
            }
        }

        templates.push(QueryTemplate {
            id,
            text: query.text.clone(),
            weight: query.weight,
            kind: query.kind,
            params,
        });
    }

    if total_weight <= 0.0 {
        report.error(ValidationError::NonPositiveTotalWeight);
    }

    if !report.is_ok() {
        return Err(report);
    }

    Ok(WorkloadSpec::from_validated(
        def.name.clone(),
        def.description.clone(),
        templates,
    ))
}

fn placeholders(text: &str) -> impl Iterator<Item = &str> {
    PLACEHOLDER
        .captures_iter(text)
        .map(|c| c.get(1).expect("capture group").as_str())
}

fn references_placeholder(text: &str, name: &str) -> bool {
    placeholders(text).any(|p| p == name)
}
