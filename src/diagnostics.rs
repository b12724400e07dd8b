//! Validation diagnostics and the stable diagnostic-code catalog
//!
//! Every dialect rule that blocks or warns about a schema feature is
//! identified by a stable code of the form `<PREFIX>_E<nnn>` (errors) or
//! `<PREFIX>_W<nnn>` (warnings). Codes never change meaning once
//! published; tooling and suppression lists key on them.

use serde::Serialize;
use std::fmt;
use strum::IntoEnumIterator;
use strum_macros::{EnumIter, EnumString, IntoStaticStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    /// Parse from config string. Case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "info" => Some(Self::Info),
            "warning" | "warn" => Some(Self::Warning),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What part of the schema a diagnostic is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticCategory {
    ColumnType,
    Constraint,
    Index,
    TableFeature,
    Function,
    Trigger,
    Sequence,
    Extension,
    Limit,
    Sql,
}

/// A single validation finding.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub category: DiagnosticCategory,
    /// The schema feature or type the finding is about, e.g. `money`,
    /// `EXCLUDE`, `gin`.
    pub feature: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<DiagnosticCode>,
    /// `schema.table[.column]` context pointing at the source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alternative: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docs_url: Option<String>,
}

impl Diagnostic {
    /// Build a diagnostic from a catalog code, filling severity, message,
    /// alternative, and docs URL from the catalog entry.
    pub fn from_code(code: DiagnosticCode, category: DiagnosticCategory, location: impl Into<String>, subject: &str) -> Self {
        Self {
            severity: code.severity(),
            category,
            feature: subject.to_string(),
            code: Some(code),
            location: Some(location.into()),
            message: code.message(subject),
            alternative: code.alternative().map(|s| s.to_string()),
            docs_url: Some(code.docs_url()),
        }
    }

    /// Build an uncoded diagnostic (per-object introspection errors,
    /// malformed ignore lines, and similar soft findings).
    pub fn uncoded(
        severity: Severity,
        category: DiagnosticCategory,
        location: Option<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            category,
            feature: String::new(),
            code: None,
            location,
            message: message.into(),
            alternative: None,
            docs_url: None,
        }
    }
}

/// Strongly-typed diagnostic code.
///
/// A flat enum covering all dialect catalogs. Match statements are
/// exhaustive: adding a code forces updates in `severity()`,
/// `message_template()`, and `alternative()`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIter, EnumString, IntoStaticStr,
)]
pub enum DiagnosticCode {
    // CockroachDB
    /// `money` columns are rejected.
    #[strum(serialize = "CRDB_E001")]
    CrdbE001,
    /// EXCLUDE constraints are rejected.
    #[strum(serialize = "CRDB_E002")]
    CrdbE002,
    /// Trigger definitions are rejected.
    #[strum(serialize = "CRDB_E003")]
    CrdbE003,
    /// `serial` maps to `unique_rowid()`, not a sequence.
    #[strum(serialize = "CRDB_W001")]
    CrdbW001,
    /// `hash` indexes become hash-sharded btree indexes.
    #[strum(serialize = "CRDB_W002")]
    CrdbW002,

    // Aurora DSQL
    /// Foreign keys are rejected.
    #[strum(serialize = "DSQL_E001")]
    DsqlE001,
    /// Triggers are rejected.
    #[strum(serialize = "DSQL_E002")]
    DsqlE002,
    /// Sequences are rejected.
    #[strum(serialize = "DSQL_E003")]
    DsqlE003,
    /// `serial`/auto-increment types are rejected.
    #[strum(serialize = "DSQL_E004")]
    DsqlE004,
    /// Extensions are rejected.
    #[strum(serialize = "DSQL_E005")]
    DsqlE005,
    /// Table partitioning is rejected.
    #[strum(serialize = "DSQL_E006")]
    DsqlE006,
    /// PL/pgSQL stored functions are rejected.
    #[strum(serialize = "DSQL_E007")]
    DsqlE007,
    /// Table-count limit per database.
    #[strum(serialize = "DSQL_W001")]
    DsqlW001,
    /// Column-count limit per table.
    #[strum(serialize = "DSQL_W002")]
    DsqlW002,

    // Nile
    /// Declarative partitioning conflicts with built-in tenant sharding.
    #[strum(serialize = "NILE_E001")]
    NileE001,
    /// Extension outside the allowlist.
    #[strum(serialize = "NILE_W001")]
    NileW001,

    // Xata
    /// EXCLUDE constraints are rejected on Xata branches.
    #[strum(serialize = "XATA_E001")]
    XataE001,
    /// File-backed columns behave differently across branches.
    #[strum(serialize = "XATA_W001")]
    XataW001,

    // MySQL / MariaDB
    /// Array columns are rejected.
    #[strum(serialize = "MYSQL_E001")]
    MysqlE001,
    /// Composite types are rejected.
    #[strum(serialize = "MYSQL_E002")]
    MysqlE002,
    /// Domains are rejected.
    #[strum(serialize = "MYSQL_E003")]
    MysqlE003,
    /// Partial indexes are rejected.
    #[strum(serialize = "MYSQL_E004")]
    MysqlE004,
    /// EXCLUDE constraints are rejected.
    #[strum(serialize = "MYSQL_E005")]
    MysqlE005,
    /// Postgres-only column types.
    #[strum(serialize = "MYSQL_E006")]
    MysqlE006,
    /// Named enum types become inline column enums.
    #[strum(serialize = "MYSQL_W001")]
    MysqlW001,
    /// Types that map onto different MySQL storage.
    #[strum(serialize = "MYSQL_W002")]
    MysqlW002,

    // PlanetScale
    /// Foreign keys are rejected unless FK support is enabled.
    #[strum(serialize = "PSCALE_E001")]
    PscaleE001,

    // SQLite / Turso
    /// Stored functions are rejected.
    #[strum(serialize = "SQLITE_E001")]
    SqliteE001,
    /// Named enum types are rejected.
    #[strum(serialize = "SQLITE_E002")]
    SqliteE002,
    /// Composite types are rejected.
    #[strum(serialize = "SQLITE_E003")]
    SqliteE003,
    /// Sequences are rejected.
    #[strum(serialize = "SQLITE_E004")]
    SqliteE004,
    /// Table partitioning is rejected.
    #[strum(serialize = "SQLITE_E005")]
    SqliteE005,
    /// Extensions are rejected.
    #[strum(serialize = "SQLITE_E006")]
    SqliteE006,
    /// Array columns are rejected.
    #[strum(serialize = "SQLITE_E007")]
    SqliteE007,
    /// Domains are rejected.
    #[strum(serialize = "SQLITE_E008")]
    SqliteE008,
    /// EXCLUDE constraints are rejected.
    #[strum(serialize = "SQLITE_E009")]
    SqliteE009,
    /// Type affinity flattens precise types.
    #[strum(serialize = "SQLITE_W001")]
    SqliteW001,
}

impl DiagnosticCode {
    /// Zero-allocation string representation.
    pub fn as_str(&self) -> &'static str {
        self.into()
    }

    /// `true` for `_W` codes, `false` for `_E` codes.
    pub fn is_warning(&self) -> bool {
        self.as_str().contains("_W")
    }

    pub fn severity(&self) -> Severity {
        if self.is_warning() {
            Severity::Warning
        } else {
            Severity::Error
        }
    }

    /// Message template; `{}` is replaced with the offending subject.
    pub fn message_template(&self) -> &'static str {
        match self {
            Self::CrdbE001 => "CockroachDB does not support the '{}' type",
            Self::CrdbE002 => "CockroachDB does not support EXCLUDE constraints ('{}')",
            Self::CrdbE003 => "CockroachDB does not support triggers ('{}')",
            Self::CrdbW001 => "CockroachDB implements '{}' with unique_rowid() instead of a sequence",
            Self::CrdbW002 => "CockroachDB turns '{}' indexes into hash-sharded btree indexes",
            Self::DsqlE001 => "Aurora DSQL does not support foreign key constraints ('{}')",
            Self::DsqlE002 => "Aurora DSQL does not support triggers ('{}')",
            Self::DsqlE003 => "Aurora DSQL does not support sequences ('{}')",
            Self::DsqlE004 => "Aurora DSQL does not support auto-increment type '{}'",
            Self::DsqlE005 => "Aurora DSQL does not support the '{}' extension",
            Self::DsqlE006 => "Aurora DSQL does not support table partitioning ('{}')",
            Self::DsqlE007 => "Aurora DSQL does not support PL/pgSQL functions ('{}')",
            Self::DsqlW001 => "schema declares {} tables, above the Aurora DSQL per-database limit",
            Self::DsqlW002 => "table '{}' exceeds the Aurora DSQL column-count limit",
            Self::NileE001 => "Nile manages tenant partitioning itself; declarative partitioning on '{}' is not supported",
            Self::NileW001 => "extension '{}' is not on the Nile allowlist",
            Self::XataE001 => "Xata does not support EXCLUDE constraints ('{}')",
            Self::XataW001 => "the '{}' type is stored per branch on Xata and does not replicate on branch copy",
            Self::MysqlE001 => "MySQL does not support array columns ('{}')",
            Self::MysqlE002 => "MySQL does not support composite types ('{}')",
            Self::MysqlE003 => "MySQL does not support domains ('{}')",
            Self::MysqlE004 => "MySQL does not support partial indexes ('{}')",
            Self::MysqlE005 => "MySQL does not support EXCLUDE constraints ('{}')",
            Self::MysqlE006 => "MySQL does not support the '{}' type",
            Self::MysqlW001 => "named enum type '{}' is emitted as an inline column ENUM on MySQL",
            Self::MysqlW002 => "the '{}' type maps to a different storage type on MySQL",
            Self::PscaleE001 => "PlanetScale rejects foreign key constraints ('{}') unless FK support is enabled",
            Self::SqliteE001 => "SQLite does not support stored functions ('{}')",
            Self::SqliteE002 => "SQLite does not support enum types ('{}')",
            Self::SqliteE003 => "SQLite does not support composite types ('{}')",
            Self::SqliteE004 => "SQLite does not support sequences ('{}')",
            Self::SqliteE005 => "SQLite does not support table partitioning ('{}')",
            Self::SqliteE006 => "SQLite does not support extensions ('{}')",
            Self::SqliteE007 => "SQLite does not support array columns ('{}')",
            Self::SqliteE008 => "SQLite does not support domains ('{}')",
            Self::SqliteE009 => "SQLite does not support EXCLUDE constraints ('{}')",
            Self::SqliteW001 => "SQLite stores '{}' with type affinity; precision is not enforced",
        }
    }

    /// Suggested replacement, when one exists.
    pub fn alternative(&self) -> Option<&'static str> {
        match self {
            Self::CrdbE001 => Some("numeric({ precision: 19, scale: 4 })"),
            Self::CrdbE002 => Some("unique index plus application-level range checks"),
            Self::CrdbE003 => Some("changefeeds or application-side hooks"),
            Self::DsqlE001 => Some("application-enforced references"),
            Self::DsqlE002 => Some("application-side hooks"),
            Self::DsqlE003 | Self::DsqlE004 => Some("uuid primary keys with gen_random_uuid()"),
            Self::DsqlE007 => Some("SQL-language functions"),
            Self::MysqlE001 => Some("a json column"),
            Self::MysqlE003 => Some("the base type plus a CHECK constraint"),
            Self::MysqlE004 => Some("a full index, or a generated column plus index"),
            Self::PscaleE001 => Some("application-side references, or enable foreign key support"),
            Self::SqliteE001 => Some("application-side logic"),
            Self::SqliteE002 => Some("text with a CHECK constraint"),
            Self::SqliteE004 => Some("INTEGER PRIMARY KEY AUTOINCREMENT"),
            Self::SqliteE007 => Some("a json text column"),
            Self::SqliteE008 => Some("the base type plus a CHECK constraint"),
            _ => None,
        }
    }

    /// Render the message for a concrete subject.
    pub fn message(&self, subject: &str) -> String {
        self.message_template().replacen("{}", subject, 1)
    }

    /// Dialect documentation anchor for this code.
    pub fn docs_url(&self) -> String {
        let code = self.as_str();
        let dialect = code.split('_').next().unwrap_or("core").to_lowercase();
        format!("https://relq.dev/docs/dialects/{dialect}#{code}")
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for DiagnosticCode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> serde::Deserialize<'de> for DiagnosticCode {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s: String = serde::Deserialize::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Aggregate counters returned with every validation report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiagnosticCounts {
    pub errors: usize,
    pub warnings: usize,
    pub info: usize,
}

impl DiagnosticCounts {
    pub fn tally(diagnostics: &[Diagnostic]) -> Self {
        let mut counts = Self::default();
        for d in diagnostics {
            match d.severity {
                Severity::Error => counts.errors += 1,
                Severity::Warning => counts.warnings += 1,
                Severity::Info => counts.info += 1,
            }
        }
        counts
    }
}

/// Iterator over every registered code, for docs generation and tests.
pub fn all_codes() -> impl Iterator<Item = DiagnosticCode> {
    DiagnosticCode::iter()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_round_trip() {
        for code in all_codes() {
            let s = code.as_str();
            let parsed: DiagnosticCode = s.parse().unwrap();
            assert_eq!(parsed, code);
        }
    }

    #[test]
    fn test_code_shape() {
        for code in all_codes() {
            let s = code.as_str();
            let (prefix, num) = s.split_once('_').unwrap();
            assert!(prefix.chars().all(|c| c.is_ascii_uppercase()), "{s}");
            assert!(num.starts_with('E') || num.starts_with('W'), "{s}");
            assert_eq!(num.len(), 4, "{s} should have a 3-digit number");
            assert!(num[1..].chars().all(|c| c.is_ascii_digit()), "{s}");
        }
    }

    #[test]
    fn test_severity_follows_letter() {
        assert_eq!(DiagnosticCode::CrdbE001.severity(), Severity::Error);
        assert_eq!(DiagnosticCode::CrdbW001.severity(), Severity::Warning);
        assert_eq!(DiagnosticCode::DsqlW002.severity(), Severity::Warning);
    }

    #[test]
    fn test_crdb_money_catalog_entry() {
        let code = DiagnosticCode::CrdbE001;
        assert_eq!(code.as_str(), "CRDB_E001");
        assert_eq!(
            code.alternative(),
            Some("numeric({ precision: 19, scale: 4 })")
        );
        assert!(code.message("money").contains("money"));
        assert_eq!(code.docs_url(), "https://relq.dev/docs/dialects/crdb#CRDB_E001");
    }

    #[test]
    fn test_diagnostic_from_code() {
        let d = Diagnostic::from_code(
            DiagnosticCode::CrdbE001,
            DiagnosticCategory::ColumnType,
            "public.orders.total",
            "money",
        );
        assert_eq!(d.severity, Severity::Error);
        assert_eq!(d.location.as_deref(), Some("public.orders.total"));
        assert!(d.alternative.is_some());
        assert!(d.docs_url.is_some());
    }

    #[test]
    fn test_counts_tally() {
        let diags = vec![
            Diagnostic::from_code(
                DiagnosticCode::CrdbE001,
                DiagnosticCategory::ColumnType,
                "public.t.a",
                "money",
            ),
            Diagnostic::from_code(
                DiagnosticCode::CrdbW001,
                DiagnosticCategory::ColumnType,
                "public.t.b",
                "serial",
            ),
            Diagnostic::uncoded(Severity::Info, DiagnosticCategory::Sql, None, "note"),
        ];
        let counts = DiagnosticCounts::tally(&diags);
        assert_eq!(counts.errors, 1);
        assert_eq!(counts.warnings, 1);
        assert_eq!(counts.info, 1);
    }

    #[test]
    fn test_severity_parse() {
        assert_eq!(Severity::parse("error"), Some(Severity::Error));
        assert_eq!(Severity::parse("WARNING"), Some(Severity::Warning));
        assert_eq!(Severity::parse("warn"), Some(Severity::Warning));
        assert_eq!(Severity::parse("garbage"), None);
    }
}
