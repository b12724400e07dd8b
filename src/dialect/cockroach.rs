//! CockroachDB dialect
//!
//! Postgres-compatible on the wire, but `money` is absent, EXCLUDE
//! constraints and triggers are rejected, and `serial`/`hash` have
//! behavioral differences worth surfacing before a push.

use std::collections::HashMap;
use std::sync::Arc;

use crate::diagnostics::DiagnosticCode;
use crate::dialect::{
    BlockedFeatures, Dialect, DialectAdapter, DialectFeatures, DialectProfile, TypeMapping,
};
use crate::ir::IndexMethod;

pub fn profile() -> DialectProfile {
    let mut type_map: HashMap<&'static str, TypeMapping> = HashMap::new();
    type_map.insert(
        "money",
        TypeMapping::unsupported(
            "numeric",
            DiagnosticCode::CrdbE001,
            Some("numeric({ precision: 19, scale: 4 })"),
        ),
    );
    type_map.insert(
        "serial",
        TypeMapping::behavioral(
            "numeric",
            DiagnosticCode::CrdbW001,
            "serial is backed by unique_rowid(), not a sequence; values are not dense",
        ),
    );
    type_map.insert(
        "bigserial",
        TypeMapping::behavioral(
            "numeric",
            DiagnosticCode::CrdbW001,
            "bigserial is backed by unique_rowid(), not a sequence; values are not dense",
        ),
    );
    type_map.insert(
        "smallserial",
        TypeMapping::behavioral(
            "numeric",
            DiagnosticCode::CrdbW001,
            "smallserial is backed by unique_rowid(), not a sequence; values are not dense",
        ),
    );

    let mut index_methods = HashMap::new();
    index_methods.insert(IndexMethod::Hash, DiagnosticCode::CrdbW002);
    index_methods.insert(IndexMethod::Brin, DiagnosticCode::CrdbW002);
    index_methods.insert(IndexMethod::Spgist, DiagnosticCode::CrdbW002);

    DialectProfile {
        dialect: Dialect::CockroachDb,
        features: DialectFeatures {
            supports_triggers: false,
            supports_foreign_tables: false,
            ..DialectFeatures::postgres()
        },
        type_map,
        blocked: BlockedFeatures {
            exclude_constraints: Some(DiagnosticCode::CrdbE002),
            triggers: Some(DiagnosticCode::CrdbE003),
            index_methods,
            ..BlockedFeatures::default()
        },
    }
}

pub struct CockroachAdapter {
    profile: DialectProfile,
}

impl CockroachAdapter {
    pub fn new() -> Self {
        Self { profile: profile() }
    }
}

impl Default for CockroachAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl DialectAdapter for CockroachAdapter {
    fn dialect(&self) -> Dialect {
        Dialect::CockroachDb
    }

    fn profile(&self) -> &DialectProfile {
        &self.profile
    }
}

pub fn adapter() -> Arc<dyn DialectAdapter> {
    Arc::new(CockroachAdapter::new())
}
