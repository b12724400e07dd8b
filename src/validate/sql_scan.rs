//! Raw-SQL validation scanning
//!
//! Parses a SQL string with the PostgreSQL parser and flags statements
//! the target dialect rejects: blocked DDL (triggers, sequences,
//! extensions, enum/domain/composite types), blocked constraint kinds,
//! blocked index methods, blocked column types, and PL/pgSQL constructs
//! inside function definitions.

use pg_query::NodeEnum;

use crate::diagnostics::{Diagnostic, DiagnosticCategory, Severity};
use crate::dialect::{DialectProfile, TypeSupport};
use crate::ir::IndexMethod;

/// PL/pgSQL body constructs worth flagging when the dialect restricts
/// procedural code.
const PLPGSQL_MARKERS: &[&str] = &["PERFORM ", "RAISE ", "EXECUTE ", "GET DIAGNOSTICS"];

/// Scan one SQL string and return diagnostics. Unparseable input yields
/// a single warning — the scanner is advisory, not a gate.
pub fn scan(sql: &str, profile: &DialectProfile) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    let parsed = match pg_query::parse(sql) {
        Ok(result) => result,
        Err(err) => {
            diagnostics.push(Diagnostic::uncoded(
                Severity::Warning,
                DiagnosticCategory::Sql,
                None,
                format!("statement could not be parsed: {err}"),
            ));
            return diagnostics;
        }
    };

    for raw in &parsed.protobuf.stmts {
        let Some(stmt) = raw.stmt.as_ref().and_then(|s| s.node.as_ref()) else {
            continue;
        };
        scan_statement(stmt, profile, &mut diagnostics);
    }

    diagnostics
}

fn scan_statement(node: &NodeEnum, profile: &DialectProfile, diagnostics: &mut Vec<Diagnostic>) {
    match node {
        NodeEnum::CreateStmt(create) => {
            let table = create
                .relation
                .as_ref()
                .map(|r| r.relname.clone())
                .unwrap_or_default();
            for elt in &create.table_elts {
                match elt.node.as_ref() {
                    Some(NodeEnum::ColumnDef(col)) => {
                        scan_column_type(col, &table, profile, diagnostics);
                    }
                    Some(NodeEnum::Constraint(con)) => {
                        scan_constraint(con, &table, profile, diagnostics);
                    }
                    _ => {}
                }
            }
            if create.partspec.is_some()
                && let Some(code) = profile.blocked.partitioning
            {
                diagnostics.push(Diagnostic::from_code(
                    code,
                    DiagnosticCategory::TableFeature,
                    table.clone(),
                    &table,
                ));
            }
        }
        NodeEnum::AlterTableStmt(alter) => {
            let table = alter
                .relation
                .as_ref()
                .map(|r| r.relname.clone())
                .unwrap_or_default();
            for cmd in &alter.cmds {
                if let Some(NodeEnum::AlterTableCmd(cmd)) = cmd.node.as_ref() {
                    if let Some(def) = &cmd.def {
                        match def.node.as_ref() {
                            Some(NodeEnum::ColumnDef(col)) => {
                                scan_column_type(col, &table, profile, diagnostics);
                            }
                            Some(NodeEnum::Constraint(con)) => {
                                scan_constraint(con, &table, profile, diagnostics);
                            }
                            _ => {}
                        }
                    }
                }
            }
        }
        NodeEnum::IndexStmt(idx) => {
            if let Some(method) = IndexMethod::parse(&idx.access_method)
                && let Some(code) = profile.blocked.index_methods.get(&method)
            {
                diagnostics.push(Diagnostic::from_code(
                    *code,
                    DiagnosticCategory::Index,
                    idx.idxname.clone(),
                    method.as_str(),
                ));
            }
            if idx.where_clause.is_some()
                && let Some(code) = profile.blocked.partial_indexes
            {
                diagnostics.push(Diagnostic::from_code(
                    code,
                    DiagnosticCategory::Index,
                    idx.idxname.clone(),
                    &idx.idxname,
                ));
            }
        }
        NodeEnum::CreateTrigStmt(trig) => {
            if let Some(code) = profile.blocked.triggers {
                diagnostics.push(Diagnostic::from_code(
                    code,
                    DiagnosticCategory::Trigger,
                    trig.trigname.clone(),
                    &trig.trigname,
                ));
            }
        }
        NodeEnum::CreateSeqStmt(seq) => {
            if let Some(code) = profile.blocked.sequences {
                let name = seq
                    .sequence
                    .as_ref()
                    .map(|r| r.relname.clone())
                    .unwrap_or_default();
                diagnostics.push(Diagnostic::from_code(
                    code,
                    DiagnosticCategory::Sequence,
                    name.clone(),
                    &name,
                ));
            }
        }
        NodeEnum::CreateExtensionStmt(ext) => {
            if let Some(code) = profile.blocked.extensions {
                diagnostics.push(Diagnostic::from_code(
                    code,
                    DiagnosticCategory::Extension,
                    ext.extname.clone(),
                    &ext.extname,
                ));
            }
        }
        NodeEnum::CreateEnumStmt(e) => {
            if let Some(code) = profile.blocked.enums {
                let name = type_name_last(&e.type_name);
                diagnostics.push(Diagnostic::from_code(
                    code,
                    DiagnosticCategory::ColumnType,
                    name.clone(),
                    &name,
                ));
            }
        }
        NodeEnum::CreateDomainStmt(d) => {
            if let Some(code) = profile.blocked.domains {
                let name = type_name_last(&d.domainname);
                diagnostics.push(Diagnostic::from_code(
                    code,
                    DiagnosticCategory::ColumnType,
                    name.clone(),
                    &name,
                ));
            }
        }
        NodeEnum::CompositeTypeStmt(c) => {
            if let Some(code) = profile.blocked.composite_types {
                let name = c
                    .typevar
                    .as_ref()
                    .map(|r| r.relname.clone())
                    .unwrap_or_default();
                diagnostics.push(Diagnostic::from_code(
                    code,
                    DiagnosticCategory::ColumnType,
                    name.clone(),
                    &name,
                ));
            }
        }
        NodeEnum::CreateFunctionStmt(f) => {
            let name = type_name_last(&f.funcname);
            let language = f
                .options
                .iter()
                .filter_map(|o| match o.node.as_ref() {
                    Some(NodeEnum::DefElem(d)) if d.defname == "language" => {
                        d.arg.as_ref().and_then(|a| match a.node.as_ref() {
                            Some(NodeEnum::String(s)) => Some(s.sval.clone()),
                            _ => None,
                        })
                    }
                    _ => None,
                })
                .next()
                .unwrap_or_default();

            if let Some(code) = profile.blocked.stored_functions {
                diagnostics.push(Diagnostic::from_code(
                    code,
                    DiagnosticCategory::Function,
                    name.clone(),
                    &name,
                ));
            } else if language.eq_ignore_ascii_case("plpgsql") {
                if let Some(code) = profile.blocked.plpgsql_functions {
                    diagnostics.push(Diagnostic::from_code(
                        code,
                        DiagnosticCategory::Function,
                        name.clone(),
                        &name,
                    ));
                } else {
                    scan_function_body(f, &name, diagnostics);
                }
            }
        }
        _ => {}
    }
}

/// Inside a PL/pgSQL body, point out dynamic-SQL and notice constructs.
/// Informational only — the body does not parse as plain SQL.
fn scan_function_body(
    f: &pg_query::protobuf::CreateFunctionStmt,
    name: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let body = f
        .options
        .iter()
        .filter_map(|o| match o.node.as_ref() {
            Some(NodeEnum::DefElem(d)) if d.defname == "as" => d.arg.as_ref(),
            _ => None,
        })
        .filter_map(|a| match a.node.as_ref() {
            Some(NodeEnum::List(list)) => list.items.first(),
            _ => None,
        })
        .filter_map(|n| match n.node.as_ref() {
            Some(NodeEnum::String(s)) => Some(s.sval.clone()),
            _ => None,
        })
        .next()
        .unwrap_or_default();

    let upper = body.to_uppercase();
    for marker in PLPGSQL_MARKERS {
        if upper.contains(marker) {
            diagnostics.push(Diagnostic::uncoded(
                Severity::Info,
                DiagnosticCategory::Function,
                Some(name.to_string()),
                format!(
                    "function '{name}' uses {} inside its body; review before syncing across dialects",
                    marker.trim()
                ),
            ));
        }
    }
}

fn scan_column_type(
    col: &pg_query::protobuf::ColumnDef,
    table: &str,
    profile: &DialectProfile,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let Some(type_name) = &col.type_name else {
        return;
    };
    let names: Vec<String> = type_name
        .names
        .iter()
        .filter_map(|n| match n.node.as_ref() {
            Some(NodeEnum::String(s)) => Some(s.sval.clone()),
            _ => None,
        })
        .filter(|s| s != "pg_catalog")
        .collect();
    let spelling = names.join(" ");
    let is_array = !type_name.array_bounds.is_empty();
    let location = format!("{table}.{}", col.colname);

    if is_array
        && let Some(code) = profile.blocked.arrays
    {
        diagnostics.push(Diagnostic::from_code(
            code,
            DiagnosticCategory::ColumnType,
            location.clone(),
            &col.colname,
        ));
    }

    if let Some(mapping) = profile.lookup_type(&spelling) {
        match mapping.status {
            TypeSupport::Supported => {}
            status => {
                let severity = if status == TypeSupport::Unsupported {
                    Severity::Error
                } else {
                    Severity::Warning
                };
                let mut d = match mapping.error_code {
                    Some(code) => Diagnostic::from_code(
                        code,
                        DiagnosticCategory::ColumnType,
                        location.clone(),
                        &spelling,
                    ),
                    None => Diagnostic::uncoded(
                        severity,
                        DiagnosticCategory::ColumnType,
                        Some(location.clone()),
                        format!("type '{spelling}' is restricted on this dialect"),
                    ),
                };
                if d.alternative.is_none() {
                    d.alternative = mapping.alternative.map(|s| s.to_string());
                }
                diagnostics.push(d);
            }
        }
    }
}

fn scan_constraint(
    con: &pg_query::protobuf::Constraint,
    table: &str,
    profile: &DialectProfile,
    diagnostics: &mut Vec<Diagnostic>,
) {
    use pg_query::protobuf::ConstrType;
    match con.contype() {
        ConstrType::ConstrForeign => {
            if let Some(code) = profile.blocked.foreign_keys {
                diagnostics.push(Diagnostic::from_code(
                    code,
                    DiagnosticCategory::Constraint,
                    table.to_string(),
                    if con.conname.is_empty() {
                        "foreign key"
                    } else {
                        &con.conname
                    },
                ));
            }
        }
        ConstrType::ConstrExclusion => {
            if let Some(code) = profile.blocked.exclude_constraints {
                diagnostics.push(Diagnostic::from_code(
                    code,
                    DiagnosticCategory::Constraint,
                    table.to_string(),
                    if con.conname.is_empty() {
                        "exclude"
                    } else {
                        &con.conname
                    },
                ));
            }
        }
        _ => {}
    }
}

fn type_name_last(names: &[pg_query::protobuf::Node]) -> String {
    names
        .iter()
        .filter_map(|n| match n.node.as_ref() {
            Some(NodeEnum::String(s)) => Some(s.sval.clone()),
            _ => None,
        })
        .next_back()
        .unwrap_or_default()
}
