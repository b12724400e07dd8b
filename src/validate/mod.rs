//! Per-dialect schema validation
//!
//! Given an IR (or a single table, or a raw SQL string) and a target
//! dialect, produce categorized diagnostics with aggregate counts.
//! Nothing here throws on findings — reports are data; only a missing
//! adapter is an error.

pub mod sql_scan;

use serde::Serialize;

use crate::diagnostics::{
    Diagnostic, DiagnosticCategory, DiagnosticCode, DiagnosticCounts, Severity,
};
use crate::dialect::{Dialect, DialectProfile, TypeSupport, registry};
use crate::error::SyncError;
use crate::ir::{Constraint, Schema, Table};
use crate::normalize;

/// The outcome of one validation run.
#[derive(Debug, Serialize)]
pub struct ValidationReport {
    pub dialect: Dialect,
    pub diagnostics: Vec<Diagnostic>,
    pub counts: DiagnosticCounts,
}

impl ValidationReport {
    fn new(dialect: Dialect, diagnostics: Vec<Diagnostic>) -> Self {
        let counts = DiagnosticCounts::tally(&diagnostics);
        Self {
            dialect,
            diagnostics,
            counts,
        }
    }

    pub fn has_errors(&self) -> bool {
        self.counts.errors > 0
    }

    /// Promote this report into a fatal error when it carries errors.
    pub fn into_result(self) -> Result<Self, SyncError> {
        if self.has_errors() {
            Err(SyncError::Validation {
                dialect: self.dialect,
                errors: self.counts.errors,
            })
        } else {
            Ok(self)
        }
    }
}

/// Validate a whole schema against a dialect.
pub fn validate_schema(schema: &Schema, dialect: Dialect) -> Result<ValidationReport, SyncError> {
    let adapter = registry::adapter(dialect)?;
    let profile = adapter.profile();
    let mut diagnostics = Vec::new();

    // Data-model invariants hold regardless of dialect.
    for violation in schema.verify() {
        diagnostics.push(Diagnostic::uncoded(
            Severity::Error,
            DiagnosticCategory::TableFeature,
            None,
            violation,
        ));
    }

    for table in schema.tables.values() {
        validate_table_into(table, schema, profile, &mut diagnostics);
    }

    // Schema-scoped objects.
    if let Some(code) = profile.blocked.enums {
        for e in &schema.enums {
            diagnostics.push(Diagnostic::from_code(
                code,
                DiagnosticCategory::ColumnType,
                format!("{}.{}", e.schema, e.name),
                &e.name,
            ));
        }
    } else if dialect.is_mysql_family() {
        // Named enum types survive only as inline column enums there.
        for e in &schema.enums {
            diagnostics.push(Diagnostic::from_code(
                DiagnosticCode::MysqlW001,
                DiagnosticCategory::ColumnType,
                format!("{}.{}", e.schema, e.name),
                &e.name,
            ));
        }
    }
    if let Some(code) = profile.blocked.domains {
        for d in &schema.domains {
            diagnostics.push(Diagnostic::from_code(
                code,
                DiagnosticCategory::ColumnType,
                format!("{}.{}", d.schema, d.name),
                &d.name,
            ));
        }
    }
    if let Some(code) = profile.blocked.composite_types {
        for c in &schema.composite_types {
            diagnostics.push(Diagnostic::from_code(
                code,
                DiagnosticCategory::ColumnType,
                format!("{}.{}", c.schema, c.name),
                &c.name,
            ));
        }
    }
    if let Some(code) = profile.blocked.sequences {
        for s in &schema.sequences {
            diagnostics.push(Diagnostic::from_code(
                code,
                DiagnosticCategory::Sequence,
                format!("{}.{}", s.schema, s.name),
                &s.name,
            ));
        }
    }
    for f in &schema.functions {
        if let Some(code) = profile.blocked.stored_functions {
            diagnostics.push(Diagnostic::from_code(
                code,
                DiagnosticCategory::Function,
                format!("{}.{}", f.schema, f.name),
                &f.name,
            ));
        } else if f.language.eq_ignore_ascii_case("plpgsql")
            && let Some(code) = profile.blocked.plpgsql_functions
        {
            diagnostics.push(Diagnostic::from_code(
                code,
                DiagnosticCategory::Function,
                format!("{}.{}", f.schema, f.name),
                &f.name,
            ));
        }
    }
    if let Some(code) = profile.blocked.triggers {
        for t in &schema.triggers {
            diagnostics.push(Diagnostic::from_code(
                code,
                DiagnosticCategory::Trigger,
                format!("{}.{}", t.table, t.name),
                &t.name,
            ));
        }
    }
    for x in &schema.extensions {
        if let Some(code) = profile.blocked.extensions {
            diagnostics.push(Diagnostic::from_code(
                code,
                DiagnosticCategory::Extension,
                x.name.clone(),
                &x.name,
            ));
        } else if dialect == Dialect::Nile
            && !crate::dialect::nile::EXTENSION_ALLOWLIST.contains(&x.name.as_str())
        {
            diagnostics.push(Diagnostic::from_code(
                DiagnosticCode::NileW001,
                DiagnosticCategory::Extension,
                x.name.clone(),
                &x.name,
            ));
        }
    }

    // Object-count limits.
    if let Some(max_tables) = profile.features.max_tables_per_database
        && schema.tables.len() > max_tables as usize
    {
        diagnostics.push(limit_diagnostic(
            dialect,
            LimitKind::Tables,
            &schema.tables.len().to_string(),
        ));
    }

    Ok(ValidationReport::new(dialect, diagnostics))
}

/// Validate one table against a dialect, without whole-schema context.
pub fn validate_table(
    table: &Table,
    schema: &Schema,
    dialect: Dialect,
) -> Result<ValidationReport, SyncError> {
    let adapter = registry::adapter(dialect)?;
    let mut diagnostics = Vec::new();
    validate_table_into(table, schema, adapter.profile(), &mut diagnostics);
    Ok(ValidationReport::new(dialect, diagnostics))
}

/// Validate a raw SQL string against a dialect.
pub fn validate_sql(sql: &str, dialect: Dialect) -> Result<ValidationReport, SyncError> {
    let adapter = registry::adapter(dialect)?;
    let diagnostics = sql_scan::scan(sql, adapter.profile());
    Ok(ValidationReport::new(dialect, diagnostics))
}

enum LimitKind {
    Tables,
    Columns,
}

fn limit_diagnostic(dialect: Dialect, kind: LimitKind, subject: &str) -> Diagnostic {
    let code = match (dialect, &kind) {
        (Dialect::AuroraDsql, LimitKind::Tables) => Some(DiagnosticCode::DsqlW001),
        (Dialect::AuroraDsql, LimitKind::Columns) => Some(DiagnosticCode::DsqlW002),
        _ => None,
    };
    match code {
        Some(code) => Diagnostic::from_code(code, DiagnosticCategory::Limit, subject.to_string(), subject),
        None => Diagnostic::uncoded(
            Severity::Warning,
            DiagnosticCategory::Limit,
            Some(subject.to_string()),
            match kind {
                LimitKind::Tables => format!("schema exceeds the {dialect} table-count limit"),
                LimitKind::Columns => format!("table '{subject}' exceeds the {dialect} column-count limit"),
            },
        ),
    }
}

fn validate_table_into(
    table: &Table,
    schema: &Schema,
    profile: &DialectProfile,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let table_loc = format!("{}.{}", table.schema, table.name);
    let dialect = profile.dialect;

    for column in &table.columns {
        let location = format!("{table_loc}.{}", column.name);

        // Named user types (enums, domains, composites) validate at the
        // schema level; the type map covers engine types.
        let is_user_type = !crate::ir::is_builtin_type(&normalize::base_type(&column.type_name));
        if let Some(mapping) = profile.lookup_type(&column.rendered_type()) {
            let category = DiagnosticCategory::ColumnType;
            let rendered = column.rendered_type();
            match mapping.status {
                TypeSupport::Supported => {}
                TypeSupport::Unsupported => {
                    let mut d = match mapping.error_code {
                        Some(code) => Diagnostic::from_code(code, category, location.clone(), &rendered),
                        None => Diagnostic::uncoded(
                            Severity::Error,
                            category,
                            Some(location.clone()),
                            format!("type '{rendered}' is not supported on {dialect}"),
                        ),
                    };
                    if d.alternative.is_none() {
                        d.alternative = mapping.alternative.map(|s| s.to_string());
                    }
                    diagnostics.push(d);
                }
                TypeSupport::BehavioralDifference | TypeSupport::Warning => {
                    let mut d = match mapping.error_code {
                        Some(code) => Diagnostic::from_code(code, category, location.clone(), &rendered),
                        None => Diagnostic::uncoded(
                            Severity::Warning,
                            category,
                            Some(location.clone()),
                            format!("type '{rendered}' behaves differently on {dialect}"),
                        ),
                    };
                    if let Some(note) = mapping.note {
                        d.message = format!("{} ({note})", d.message);
                    }
                    diagnostics.push(d);
                }
            }
        } else if is_user_type && !schema.resolves_type(&column.type_name) {
            diagnostics.push(Diagnostic::uncoded(
                Severity::Error,
                DiagnosticCategory::ColumnType,
                Some(location.clone()),
                format!("type '{}' does not resolve to any known type", column.type_name),
            ));
        }

        if column.is_array
            && let Some(code) = profile.blocked.arrays
        {
            diagnostics.push(Diagnostic::from_code(
                code,
                DiagnosticCategory::ColumnType,
                location.clone(),
                &column.name,
            ));
        }

        let base = normalize::base_type(&column.type_name);
        if matches!(base.as_str(), "serial" | "bigserial" | "smallserial")
            && let Some(code) = profile.blocked.auto_increment
            && profile.lookup_type(&base).is_none()
        {
            diagnostics.push(Diagnostic::from_code(
                code,
                DiagnosticCategory::ColumnType,
                location.clone(),
                &base,
            ));
        }
    }

    if let Some(max_columns) = profile.features.max_columns_per_table
        && table.columns.len() > max_columns as usize
    {
        diagnostics.push(limit_diagnostic(dialect, LimitKind::Columns, &table.name));
    }

    for constraint in &table.constraints {
        match constraint {
            Constraint::ForeignKey { name, .. } => {
                if let Some(code) = profile.blocked.foreign_keys {
                    diagnostics.push(Diagnostic::from_code(
                        code,
                        DiagnosticCategory::Constraint,
                        table_loc.clone(),
                        name.as_deref().unwrap_or("foreign key"),
                    ));
                }
            }
            Constraint::Exclude { name, .. } => {
                if let Some(code) = profile.blocked.exclude_constraints {
                    diagnostics.push(Diagnostic::from_code(
                        code,
                        DiagnosticCategory::Constraint,
                        table_loc.clone(),
                        name.as_deref().unwrap_or("exclude"),
                    ));
                }
            }
            _ => {}
        }
    }

    for index in &table.indexes {
        if let Some(code) = profile.blocked.index_methods.get(&index.method) {
            diagnostics.push(Diagnostic::from_code(
                *code,
                DiagnosticCategory::Index,
                format!("{table_loc}.{}", index.name),
                index.method.as_str(),
            ));
        }
        if index.is_partial()
            && let Some(code) = profile.blocked.partial_indexes
        {
            diagnostics.push(Diagnostic::from_code(
                code,
                DiagnosticCategory::Index,
                format!("{table_loc}.{}", index.name),
                &index.name,
            ));
        }
    }

    if table.partition.is_some()
        && let Some(code) = profile.blocked.partitioning
    {
        diagnostics.push(Diagnostic::from_code(
            code,
            DiagnosticCategory::TableFeature,
            table_loc.clone(),
            &table.name,
        ));
    }
}
