//! SQLite-family dialects: SQLite, Turso
//!
//! The embedded profile: no enums, composites, sequences, stored
//! functions, or partitioning; types collapse to affinities. Turso shares
//! the whole profile.

use std::collections::HashMap;
use std::sync::Arc;

use crate::diagnostics::DiagnosticCode;
use crate::dialect::{
    BlockedFeatures, Dialect, DialectAdapter, DialectFeatures, DialectProfile, TypeMapping, emit,
};
use crate::diff::Change;
use crate::ir::IndexMethod;

pub fn profile(dialect: Dialect) -> DialectProfile {
    debug_assert!(dialect.is_sqlite_family());

    let mut type_map: HashMap<&'static str, TypeMapping> = HashMap::new();
    for spelling in ["numeric", "decimal", "timestamp", "timestamptz", "uuid", "money"] {
        type_map.insert(
            spelling,
            TypeMapping::warning(
                "affinity",
                DiagnosticCode::SqliteW001,
                "stored under SQLite type affinity; precision and range are not enforced",
            ),
        );
    }

    let mut index_methods = HashMap::new();
    for method in [
        IndexMethod::Hash,
        IndexMethod::Gin,
        IndexMethod::Gist,
        IndexMethod::Brin,
        IndexMethod::Spgist,
    ] {
        index_methods.insert(method, DiagnosticCode::SqliteW001);
    }

    DialectProfile {
        dialect,
        features: DialectFeatures {
            supports_enums: false,
            supports_table_partitioning: false,
            supports_stored_procedures: false,
            supports_triggers: true,
            supports_foreign_tables: false,
            supports_composite_types: false,
            supports_returning: true,
            supports_lateral: false,
            supports_distinct_on: false,
            supports_for_update_skip_locked: false,
            supports_cursors: false,
            max_tables_per_database: None,
            max_columns_per_table: Some(2000),
        },
        type_map,
        blocked: BlockedFeatures {
            stored_functions: Some(DiagnosticCode::SqliteE001),
            enums: Some(DiagnosticCode::SqliteE002),
            composite_types: Some(DiagnosticCode::SqliteE003),
            sequences: Some(DiagnosticCode::SqliteE004),
            partitioning: Some(DiagnosticCode::SqliteE005),
            extensions: Some(DiagnosticCode::SqliteE006),
            arrays: Some(DiagnosticCode::SqliteE007),
            domains: Some(DiagnosticCode::SqliteE008),
            exclude_constraints: Some(DiagnosticCode::SqliteE009),
            index_methods,
            ..BlockedFeatures::default()
        },
    }
}

pub struct SqliteAdapter {
    dialect: Dialect,
    profile: DialectProfile,
}

impl SqliteAdapter {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            profile: profile(dialect),
        }
    }
}

impl DialectAdapter for SqliteAdapter {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn profile(&self) -> &DialectProfile {
        &self.profile
    }

    fn render_change(&self, change: &Change) -> Option<String> {
        emit::render_sqlite_change(change)
    }
}

pub fn adapter(dialect: Dialect) -> Arc<dyn DialectAdapter> {
    Arc::new(SqliteAdapter::new(dialect))
}
