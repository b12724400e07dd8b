//! MySQL-family dialects: MySQL, MariaDB, PlanetScale
//!
//! One profile parameterized by engine. Arrays, composite types, domains,
//! and partial indexes do not exist; named enum types degrade to inline
//! column enums. PlanetScale additionally rejects foreign keys.

use std::collections::HashMap;
use std::sync::Arc;

use crate::diagnostics::DiagnosticCode;
use crate::dialect::{
    BlockedFeatures, Dialect, DialectAdapter, DialectFeatures, DialectProfile, TypeMapping, emit,
};
use crate::diff::Change;
use crate::ir::IndexMethod;

pub fn profile(dialect: Dialect) -> DialectProfile {
    debug_assert!(dialect.is_mysql_family());

    let mut type_map: HashMap<&'static str, TypeMapping> = HashMap::new();
    type_map.insert(
        "uuid",
        TypeMapping::behavioral(
            "character",
            DiagnosticCode::MysqlW002,
            "stored as char(36); no native uuid type before MySQL 8 functions",
        ),
    );
    type_map.insert(
        "jsonb",
        TypeMapping::behavioral(
            "json",
            DiagnosticCode::MysqlW002,
            "mapped to json; binary storage is an InnoDB implementation detail",
        ),
    );
    type_map.insert(
        "tsvector",
        TypeMapping::unsupported("fulltext", DiagnosticCode::MysqlE006, Some("a FULLTEXT index")),
    );

    let mut index_methods = HashMap::new();
    index_methods.insert(IndexMethod::Gin, DiagnosticCode::MysqlE004);
    index_methods.insert(IndexMethod::Gist, DiagnosticCode::MysqlE004);
    index_methods.insert(IndexMethod::Brin, DiagnosticCode::MysqlE004);
    index_methods.insert(IndexMethod::Spgist, DiagnosticCode::MysqlE004);

    let foreign_keys = if dialect == Dialect::PlanetScale {
        Some(DiagnosticCode::PscaleE001)
    } else {
        None
    };

    DialectProfile {
        dialect,
        features: DialectFeatures {
            supports_enums: true, // inline column enums only
            supports_table_partitioning: true,
            supports_stored_procedures: true,
            supports_triggers: true,
            supports_foreign_tables: false,
            supports_composite_types: false,
            supports_returning: dialect == Dialect::MariaDb,
            supports_lateral: true,
            supports_distinct_on: false,
            supports_for_update_skip_locked: true,
            supports_cursors: true,
            max_tables_per_database: None,
            max_columns_per_table: Some(4096),
        },
        type_map,
        blocked: BlockedFeatures {
            foreign_keys,
            exclude_constraints: Some(DiagnosticCode::MysqlE005),
            arrays: Some(DiagnosticCode::MysqlE001),
            domains: Some(DiagnosticCode::MysqlE003),
            composite_types: Some(DiagnosticCode::MysqlE002),
            partial_indexes: Some(DiagnosticCode::MysqlE004),
            index_methods,
            ..BlockedFeatures::default()
        },
    }
}

pub struct MysqlAdapter {
    dialect: Dialect,
    profile: DialectProfile,
}

impl MysqlAdapter {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            profile: profile(dialect),
        }
    }
}

impl DialectAdapter for MysqlAdapter {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn profile(&self) -> &DialectProfile {
        &self.profile
    }

    fn render_change(&self, change: &Change) -> Option<String> {
        emit::render_mysql_change(change)
    }
}

pub fn adapter(dialect: Dialect) -> Arc<dyn DialectAdapter> {
    Arc::new(MysqlAdapter::new(dialect))
}
