//! Introspector interface
//!
//! Populates the IR from a live database through a dialect-specific
//! strategy. Drivers stay external: the core borrows a [`SchemaClient`]
//! from the collaborator's pool, issues catalog queries through it, and
//! releases it when the future resolves. Every await is a suspension
//! point where cancellation is observed.

pub mod mysql;
pub mod postgres;
pub mod sqlite;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use thiserror::Error;

use crate::diagnostics::Diagnostic;
use crate::error::SyncError;
use crate::ir::{Schema, Table};

/// The fixed introspection step sequence. Dialects that cannot serve a
/// step report it as skipped; skipped steps do not appear in count
/// totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IntrospectStep {
    Tables,
    Columns,
    Constraints,
    Indexes,
    Checks,
    Enums,
    Partitions,
    Extensions,
    Functions,
    Triggers,
    Collations,
    ForeignServers,
    ForeignTables,
    Types,
}

impl IntrospectStep {
    /// All steps, in emission order.
    pub const ALL: [IntrospectStep; 14] = [
        Self::Tables,
        Self::Columns,
        Self::Constraints,
        Self::Indexes,
        Self::Checks,
        Self::Enums,
        Self::Partitions,
        Self::Extensions,
        Self::Functions,
        Self::Triggers,
        Self::Collations,
        Self::ForeignServers,
        Self::ForeignTables,
        Self::Types,
    ];

    /// Stable progress key for this step.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Tables => "tables",
            Self::Columns => "columns",
            Self::Constraints => "constraints",
            Self::Indexes => "indexes",
            Self::Checks => "checks",
            Self::Enums => "enums",
            Self::Partitions => "partitions",
            Self::Extensions => "extensions",
            Self::Functions => "functions",
            Self::Triggers => "triggers",
            Self::Collations => "collations",
            Self::ForeignServers => "foreign_servers",
            Self::ForeignTables => "foreign_tables",
            Self::Types => "types",
        }
    }
}

/// Terminal state of one introspection step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    /// The step ran; `count` objects were surfaced.
    Completed { count: usize },
    /// The dialect does not support this step. Not an error.
    Skipped,
}

/// Callback surface for progress reporting. Invoked synchronously
/// between suspension points, in step order.
pub trait ProgressSink: Send {
    fn step_finished(&mut self, step: IntrospectStep, status: StepStatus);
}

/// Sink that discards all events.
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn step_finished(&mut self, _step: IntrospectStep, _status: StepStatus) {}
}

/// Sink that records events for assertions.
#[derive(Default)]
pub struct CollectingProgress {
    pub events: Vec<(IntrospectStep, StepStatus)>,
}

impl ProgressSink for CollectingProgress {
    fn step_finished(&mut self, step: IntrospectStep, status: StepStatus) {
        self.events.push((step, status));
    }
}

/// Driver-side failures, as surfaced by the external client collaborator.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("query failed: {0}")]
    Query(String),
}

/// One result row, column values as text the way catalog queries return
/// them. Missing and NULL columns both read as `None`.
#[derive(Debug, Clone, Default)]
pub struct Row {
    values: HashMap<String, Option<String>>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: &str, value: impl Into<String>) -> Self {
        self.values.insert(column.to_string(), Some(value.into()));
        self
    }

    pub fn with_null(mut self, column: &str) -> Self {
        self.values.insert(column.to_string(), None);
        self
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.values.get(column).and_then(|v| v.as_deref())
    }

    pub fn require(&self, column: &str) -> Result<&str, ClientError> {
        self.get(column)
            .ok_or_else(|| ClientError::Query(format!("missing column '{column}' in result row")))
    }

    pub fn get_bool(&self, column: &str) -> bool {
        matches!(self.get(column), Some("t") | Some("true") | Some("YES") | Some("1"))
    }

    pub fn get_i64(&self, column: &str) -> Option<i64> {
        self.get(column).and_then(|v| v.parse().ok())
    }

    pub fn get_u32(&self, column: &str) -> Option<u32> {
        self.get(column).and_then(|v| v.parse().ok())
    }
}

/// Borrowed database client. The pool, transactions-by-default, and
/// credential handling live with the driver collaborator.
#[async_trait]
pub trait SchemaClient: Send + Sync {
    /// Cheap liveness check (`SELECT 1` or protocol ping).
    async fn ping(&self) -> Result<(), ClientError>;

    /// Run a catalog query and return all rows.
    async fn query(&self, sql: &str) -> Result<Vec<Row>, ClientError>;

    /// Run a statement for its side effect; returns affected-row count.
    async fn execute(&self, sql: &str) -> Result<u64, ClientError>;

    /// Whether this client is pooled. Cursor iteration requires pooling.
    fn is_pooled(&self) -> bool {
        false
    }
}

/// Cooperative cancellation flag, observed at every suspension point.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Abort with a structured error when cancellation was requested.
    pub fn check(&self, at: &str) -> Result<(), SyncError> {
        if self.is_cancelled() {
            Err(SyncError::Cancelled(at.to_string()))
        } else {
            Ok(())
        }
    }
}

/// Everything a full introspection produces: the IR, soft diagnostics
/// for per-object failures, and per-step object counts (skipped steps
/// excluded).
#[derive(Debug)]
pub struct IntrospectOutcome {
    pub schema: Schema,
    pub diagnostics: Vec<Diagnostic>,
    pub counts: BTreeMap<&'static str, usize>,
}

/// Dialect-specific introspection strategy.
///
/// Connection failures are fatal and surface as
/// [`SyncError::Connectivity`]; per-object errors are attached to the
/// outcome's diagnostics and do not abort the run.
#[async_trait]
pub trait Introspector: Send + Sync {
    /// Verify the connection is usable.
    async fn test_connection(&self, client: &dyn SchemaClient) -> Result<(), SyncError>;

    /// Engine version string.
    async fn database_version(&self, client: &dyn SchemaClient) -> Result<String, SyncError>;

    /// Logical namespaces visible to the connection.
    async fn list_schemas(&self, client: &dyn SchemaClient) -> Result<Vec<String>, SyncError>;

    /// Table names in one namespace.
    async fn list_tables(
        &self,
        client: &dyn SchemaClient,
        namespace: &str,
    ) -> Result<Vec<String>, SyncError>;

    /// Full IR for a single table.
    async fn introspect_table(
        &self,
        client: &dyn SchemaClient,
        namespace: &str,
        table: &str,
    ) -> Result<Table, SyncError>;

    /// Full-schema introspection with step-by-step progress events.
    async fn introspect(
        &self,
        client: &dyn SchemaClient,
        namespace: &str,
        progress: &mut dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<IntrospectOutcome, SyncError>;
}

/// Map a fatal client error into the sync taxonomy for a given step.
pub(crate) fn fatal_step_error(step: IntrospectStep, err: ClientError) -> SyncError {
    match err {
        ClientError::Connection(message) => SyncError::Connectivity(message),
        ClientError::Query(message) => SyncError::Introspection {
            step: step.key().to_string(),
            message,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_order_and_keys() {
        let keys: Vec<&str> = IntrospectStep::ALL.iter().map(|s| s.key()).collect();
        assert_eq!(
            keys,
            vec![
                "tables",
                "columns",
                "constraints",
                "indexes",
                "checks",
                "enums",
                "partitions",
                "extensions",
                "functions",
                "triggers",
                "collations",
                "foreign_servers",
                "foreign_tables",
                "types",
            ]
        );
    }

    #[test]
    fn test_row_accessors() {
        let row = Row::new()
            .with("table_name", "users")
            .with("is_nullable", "YES")
            .with("ordinal", "3")
            .with_null("comment");

        assert_eq!(row.get("table_name"), Some("users"));
        assert!(row.get_bool("is_nullable"));
        assert_eq!(row.get_i64("ordinal"), Some(3));
        assert_eq!(row.get("comment"), None);
        assert_eq!(row.get("absent"), None);
        assert!(row.require("absent").is_err());
    }

    #[test]
    fn test_cancel_token() {
        let token = CancelToken::new();
        assert!(token.check("tables").is_ok());
        token.cancel();
        let err = token.check("tables").unwrap_err();
        assert!(matches!(err, SyncError::Cancelled(_)));
        assert_eq!(err.to_string(), "operation cancelled during 'tables'");
    }
}
