//! relq-core: schema synchronization and dialect validation for
//! PostgreSQL-family engines
//!
//! This library maintains a declarative, version-controlled representation
//! of a database schema on disk. It introspects a live database into a
//! dialect-agnostic IR, diffs IR snapshots with rename tracking, validates
//! schemas against per-dialect feature matrices, and emits a deterministic
//! schema source file plus companion files. Drivers, the query DSL, and
//! the CLI are external collaborators; the seams they plug into are
//! [`introspect::SchemaClient`], [`sync::SyncController`], and the
//! [`diff::Change`] stream.

pub mod codegen;
pub mod config;
pub mod cursor;
pub mod diagnostics;
pub mod dialect;
pub mod diff;
pub mod error;
pub mod ignore;
pub mod introspect;
pub mod ir;
pub mod normalize;
pub mod page;
pub mod schema_dsl;
pub mod snapshot;
pub mod source;
pub mod sync;
pub mod validate;

// Re-export commonly used types
pub use config::Config;
pub use diagnostics::{Diagnostic, DiagnosticCode, Severity};
pub use dialect::Dialect;
pub use diff::{Change, ChangeAction, ObjectType, compare_schemas};
pub use error::SyncError;
pub use ir::Schema;
pub use snapshot::SnapshotStore;
pub use sync::SyncController;
pub use validate::ValidationReport;
