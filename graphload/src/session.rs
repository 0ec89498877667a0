//! The abstract query-execution capability.
//!
//! The engine is written entirely against these traits and never against a
//! concrete driver. An embedder wraps whatever graph-database client it uses
//! (Bolt, HTTP, an in-process store) in a [`GraphClient`] and hands it in.
//!
//! Sessions are not safe for concurrent multi-caller use: each worker opens
//! exactly one session at startup, keeps it for its whole life, and never
//! shares it.

use async_trait::async_trait;

use crate::error::ExecutionError;
use crate::workload::params::ParamMap;

/// Outcome of one executed query, after the result stream has been fully
/// consumed by the session implementation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuerySummary {
    /// Records drained from the result stream.
    pub records: u64,
}

/// One live session against the database. `&mut self` because a session
/// handles one in-flight call at a time.
#[async_trait]
pub trait GraphSession: Send {
    /// Run a query with the given parameters and consume its result stream
    /// to completion before returning.
    async fn run(&mut self, text: &str, params: &ParamMap) -> Result<QuerySummary, ExecutionError>;
}

/// Factory for sessions. Shared by all workers; each worker calls
/// `open_session` once and owns the result exclusively.
#[async_trait]
pub trait GraphClient: Send + Sync {
    async fn open_session(&self) -> Result<Box<dyn GraphSession>, ExecutionError>;
}
