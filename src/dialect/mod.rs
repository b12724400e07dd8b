//! Dialect registry and feature matrices
//!
//! Centralizes per-dialect knowledge — capability flags, type mappings,
//! blocked features, diagnostic catalogs, and DDL rendering — so the rest
//! of the core stays dialect-agnostic.

pub mod cockroach;
pub mod dsql;
pub mod emit;
pub mod guard;
pub mod mysql;
pub mod nile;
pub mod postgres;
pub mod registry;
pub mod sqlite;
pub mod xata;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use strum_macros::{EnumIter, EnumString, IntoStaticStr};

use crate::diagnostics::DiagnosticCode;
use crate::diff::Change;
use crate::ir::IndexMethod;

/// Supported database engines.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    EnumIter,
    EnumString,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Postgres,
    #[strum(serialize = "cockroachdb")]
    #[serde(rename = "cockroachdb")]
    CockroachDb,
    #[strum(serialize = "dsql")]
    #[serde(rename = "dsql")]
    AuroraDsql,
    Nile,
    Xata,
    MySql,
    #[strum(serialize = "mariadb")]
    #[serde(rename = "mariadb")]
    MariaDb,
    #[strum(serialize = "planetscale")]
    #[serde(rename = "planetscale")]
    PlanetScale,
    Sqlite,
    Turso,
}

impl Dialect {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }

    /// The PostgreSQL-compatible engines share introspection queries and
    /// DDL rendering.
    pub fn is_postgres_family(&self) -> bool {
        matches!(
            self,
            Self::Postgres | Self::CockroachDb | Self::AuroraDsql | Self::Nile | Self::Xata
        )
    }

    pub fn is_mysql_family(&self) -> bool {
        matches!(self, Self::MySql | Self::MariaDb | Self::PlanetScale)
    }

    pub fn is_sqlite_family(&self) -> bool {
        matches!(self, Self::Sqlite | Self::Turso)
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Boolean capability flags plus object-count limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialectFeatures {
    pub supports_enums: bool,
    pub supports_table_partitioning: bool,
    pub supports_stored_procedures: bool,
    pub supports_triggers: bool,
    pub supports_foreign_tables: bool,
    pub supports_composite_types: bool,
    pub supports_returning: bool,
    pub supports_lateral: bool,
    pub supports_distinct_on: bool,
    pub supports_for_update_skip_locked: bool,
    pub supports_cursors: bool,
    pub max_tables_per_database: Option<u32>,
    pub max_columns_per_table: Option<u32>,
}

impl DialectFeatures {
    /// Full PostgreSQL capability set; dialect modules restrict from here.
    pub const fn postgres() -> Self {
        Self {
            supports_enums: true,
            supports_table_partitioning: true,
            supports_stored_procedures: true,
            supports_triggers: true,
            supports_foreign_tables: true,
            supports_composite_types: true,
            supports_returning: true,
            supports_lateral: true,
            supports_distinct_on: true,
            supports_for_update_skip_locked: true,
            supports_cursors: true,
            max_tables_per_database: None,
            max_columns_per_table: None,
        }
    }
}

/// How a dialect treats a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TypeSupport {
    Supported,
    BehavioralDifference,
    Warning,
    Unsupported,
}

/// One entry in a dialect's type map.
#[derive(Debug, Clone, Copy)]
pub struct TypeMapping {
    pub status: TypeSupport,
    /// Coarse grouping: "numeric", "character", "datetime", "json", …
    pub category: &'static str,
    pub error_code: Option<DiagnosticCode>,
    pub alternative: Option<&'static str>,
    pub note: Option<&'static str>,
}

impl TypeMapping {
    pub const fn unsupported(category: &'static str, code: DiagnosticCode, alternative: Option<&'static str>) -> Self {
        Self {
            status: TypeSupport::Unsupported,
            category,
            error_code: Some(code),
            alternative,
            note: None,
        }
    }

    pub const fn behavioral(category: &'static str, code: DiagnosticCode, note: &'static str) -> Self {
        Self {
            status: TypeSupport::BehavioralDifference,
            category,
            error_code: Some(code),
            alternative: None,
            note: Some(note),
        }
    }

    pub const fn warning(category: &'static str, code: DiagnosticCode, note: &'static str) -> Self {
        Self {
            status: TypeSupport::Warning,
            category,
            error_code: Some(code),
            alternative: None,
            note: Some(note),
        }
    }
}

/// Schema features a dialect rejects outright. `Some(code)` means blocked,
/// carrying the diagnostic code the validator reports.
#[derive(Debug, Clone, Default)]
pub struct BlockedFeatures {
    pub foreign_keys: Option<DiagnosticCode>,
    pub exclude_constraints: Option<DiagnosticCode>,
    pub stored_functions: Option<DiagnosticCode>,
    pub plpgsql_functions: Option<DiagnosticCode>,
    pub triggers: Option<DiagnosticCode>,
    pub sequences: Option<DiagnosticCode>,
    pub arrays: Option<DiagnosticCode>,
    pub auto_increment: Option<DiagnosticCode>,
    pub partitioning: Option<DiagnosticCode>,
    pub enums: Option<DiagnosticCode>,
    pub domains: Option<DiagnosticCode>,
    pub composite_types: Option<DiagnosticCode>,
    pub extensions: Option<DiagnosticCode>,
    pub partial_indexes: Option<DiagnosticCode>,
    /// Index methods the dialect rejects, with their codes.
    pub index_methods: HashMap<IndexMethod, DiagnosticCode>,
}

/// Everything the core needs to know about one dialect.
#[derive(Debug, Clone)]
pub struct DialectProfile {
    pub dialect: Dialect,
    pub features: DialectFeatures,
    pub type_map: HashMap<&'static str, TypeMapping>,
    pub blocked: BlockedFeatures,
}

impl DialectProfile {
    /// Look up a type spelling in the dialect's type map.
    ///
    /// Canonicalization: lowercase, strip length/precision parameters,
    /// strip trailing `[]`, strip leading `_`. Tries the direct lowered
    /// spelling, then the parameter-stripped base, then the non-array
    /// base. `None` means the map has no opinion (treated as supported
    /// when the schema resolves the type).
    pub fn lookup_type(&self, raw: &str) -> Option<&TypeMapping> {
        let direct = raw.trim().to_lowercase();
        if let Some(m) = self.type_map.get(direct.as_str()) {
            return Some(m);
        }

        // parameter-stripped, array markers kept
        let mut base = direct.clone();
        if let Some(open) = base.find('(') {
            let close = base.rfind(')').unwrap_or(base.len() - 1);
            let tail = base[close + 1..].to_string();
            base.truncate(open);
            base.push_str(&tail);
        }
        let base = base.trim().to_string();
        if let Some(m) = self.type_map.get(base.as_str()) {
            return Some(m);
        }

        let non_array = crate::normalize::base_type(&base);
        self.type_map.get(non_array.as_str())
    }
}

/// Per-dialect behavior behind a uniform interface. Adapters are
/// registered in [`registry`] and constructed lazily.
pub trait DialectAdapter: Send + Sync {
    fn dialect(&self) -> Dialect;

    fn profile(&self) -> &DialectProfile;

    /// Translate a single change into DDL, `None` when the change has no
    /// SQL counterpart for this dialect (for example comment changes on
    /// engines without `COMMENT ON`).
    fn render_change(&self, change: &Change) -> Option<String> {
        emit::render_postgres_change(change)
    }

    /// Introspection steps this dialect cannot serve; the introspector
    /// reports them as skipped.
    fn skipped_introspection_steps(&self) -> Vec<crate::introspect::IntrospectStep> {
        let features = &self.profile().features;
        let mut skipped = Vec::new();
        if !features.supports_enums {
            skipped.push(crate::introspect::IntrospectStep::Enums);
        }
        if !features.supports_table_partitioning {
            skipped.push(crate::introspect::IntrospectStep::Partitions);
        }
        if !features.supports_stored_procedures {
            skipped.push(crate::introspect::IntrospectStep::Functions);
        }
        if !features.supports_triggers {
            skipped.push(crate::introspect::IntrospectStep::Triggers);
        }
        if !features.supports_foreign_tables {
            skipped.push(crate::introspect::IntrospectStep::ForeignServers);
            skipped.push(crate::introspect::IntrospectStep::ForeignTables);
        }
        if !features.supports_composite_types {
            skipped.push(crate::introspect::IntrospectStep::Types);
        }
        skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_dialect_parse_round_trip() {
        for dialect in Dialect::iter() {
            let s = dialect.as_str();
            let parsed: Dialect = s.parse().unwrap();
            assert_eq!(parsed, dialect, "{s}");
        }
        assert_eq!("cockroachdb".parse::<Dialect>().unwrap(), Dialect::CockroachDb);
        assert_eq!("POSTGRES".parse::<Dialect>().unwrap(), Dialect::Postgres);
        assert!("oracle".parse::<Dialect>().is_err());
    }

    #[test]
    fn test_family_partitions_are_disjoint() {
        for dialect in Dialect::iter() {
            let memberships = [
                dialect.is_postgres_family(),
                dialect.is_mysql_family(),
                dialect.is_sqlite_family(),
            ];
            assert_eq!(
                memberships.iter().filter(|m| **m).count(),
                1,
                "{dialect} must belong to exactly one family"
            );
        }
    }

    #[test]
    fn test_lookup_type_canonicalization() {
        let profile = cockroach::profile();

        // direct
        assert!(profile.lookup_type("money").is_some());
        // parameter-stripped
        assert!(profile.lookup_type("MONEY").is_some());
        // array form falls back to the base entry
        assert!(profile.lookup_type("money[]").is_some());
        assert!(profile.lookup_type("_money").is_some());
        // no opinion
        assert!(profile.lookup_type("text").is_none());
    }
}
