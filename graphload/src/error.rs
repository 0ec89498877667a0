use std::fmt;

use thiserror::Error;

/// A single problem found while validating a workload definition.
///
/// Validation never stops at the first problem; every error found in one pass
/// is collected into a [`ValidationReport`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("workload must contain at least one query")]
    EmptyWorkload,
    #[error("query `{0}` is missing a non-empty id")]
    MissingId(String),
    #[error("query `{0}` has empty query text")]
    EmptyQueryText(String),
    #[error("duplicate query id `{0}`")]
    DuplicateId(String),
    #[error("query `{id}`: weight must be positive, got {weight}")]
    NonPositiveWeight { id: String, weight: f64 },
    #[error("total weight of all queries must be positive")]
    NonPositiveTotalWeight,
    #[error("query `{id}`: query text references `${param}` but no such parameter is declared")]
    UndeclaredParameter { id: String, param: String },
    #[error("query `{id}`, parameter `{param}`: {message}")]
    BadGenerator {
        id: String,
        param: String,
        message: String,
    },
}

/// Outcome of validating a workload definition: every error found, plus
/// non-fatal warnings (e.g. a parameter that is declared but never used).
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub(crate) fn error(&mut self, err: ValidationError) {
        self.errors.push(err);
    }

    pub(crate) fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "workload validation failed:")?;
        for err in &self.errors {
            writeln!(f, "  - {err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationReport {}

/// A per-operation failure at the session boundary.
///
/// These are recorded and logged by the worker that hit them and never
/// propagate to other workers or to the reporting loop.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("failed to open session: {0}")]
    Session(String),
    #[error("query failed: {0}")]
    Query(String),
    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("connection lost: {0}")]
    Connection(String),
}

/// Errors surfaced by [`Engine::run`](crate::engine::Engine::run) itself,
/// as opposed to per-operation failures which are counted and absorbed.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid run configuration:\n{}", .0.iter().map(|e| format!("  - {e}")).collect::<Vec<_>>().join("\n"))]
    Config(Vec<String>),
    #[error("engine has already run; create a new engine for another run")]
    AlreadyStarted,
}
