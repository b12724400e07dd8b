//! Schema source generation
//!
//! Emits the declarative schema file (and companion files for functions,
//! triggers, and type stubs) from an IR. Output is a pure function of
//! the IR and the options: tables sort non-partition-children first and
//! then alphabetically, sections follow a fixed order, and token
//! assignment merges an existing file's tokens before generating fresh
//! ones.

pub mod tokens;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;

use inflector::Inflector;
use serde::Deserialize;

use crate::diff::check_expr;
use crate::ir::{Column, Constraint, Index, Schema, Table};
use crate::schema_dsl::Relation;
use self::tokens::TokenGenerator;

/// Options controlling emission. Deserializes from the `[codegen]`
/// section of `relq.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CodegenOptions {
    /// Attach camelCase developer-facing names to snake_case columns.
    pub camel_case: bool,
    /// Import path written at the top of every generated file.
    pub import_path: String,
    pub include_functions: bool,
    pub include_triggers: bool,
    pub include_domains: bool,
    pub include_tables: bool,
    pub include_views: bool,
    /// Per-column type overrides, keyed `"table.column"`.
    pub column_type_map: BTreeMap<String, String>,
    /// Import path for the generated type-stub companion.
    pub types_import_path: Option<String>,
}

impl Default for CodegenOptions {
    fn default() -> Self {
        Self {
            camel_case: false,
            import_path: "relq_core::schema_dsl::prelude".to_string(),
            include_functions: true,
            include_triggers: true,
            include_domains: true,
            include_tables: true,
            include_views: true,
            column_type_map: BTreeMap::new(),
            types_import_path: None,
        }
    }
}

/// Everything one codegen run produces. `schema` is the input IR with
/// tokens assigned; the sync controller snapshots it after writing the
/// sources.
#[derive(Debug)]
pub struct CodegenOutput {
    pub schema: Schema,
    pub source: String,
    pub functions_source: Option<String>,
    pub triggers_source: Option<String>,
    pub types_source: Option<String>,
    /// Name of the relations export actually used (fallback-renamed when
    /// a table claims `relations`).
    pub relations_export: String,
}

const HEADER: &str = "//! Generated by relq. Tokens track object identity across syncs; edit them only if you know why.\n";

/// Generate all sources from an IR.
///
/// Token assignment runs in two passes: tokens from `existing` (the
/// parsed current file, when one exists) merge onto matching names, then
/// the generator mints tokens for whatever is still bare.
pub fn generate(
    schema: &Schema,
    options: &CodegenOptions,
    existing: Option<&Schema>,
    generator: &mut TokenGenerator,
) -> CodegenOutput {
    let mut schema = schema.clone();
    if let Some(existing) = existing {
        crate::snapshot::copy_tokens(existing, &mut schema);
    }
    assign_missing_tokens(&mut schema, generator);

    let relations_export = relations_export_name(&schema);
    let source = render_schema_file(&schema, options, &relations_export);
    let functions_source = (options.include_functions && !schema.functions.is_empty())
        .then(|| render_functions_file(&schema, options));
    let triggers_source = (options.include_triggers && !schema.triggers.is_empty())
        .then(|| render_triggers_file(&schema, options));
    let types_source = (!schema.composite_types.is_empty() || !schema.enums.is_empty())
        .then(|| render_types_file(&schema));

    CodegenOutput {
        schema,
        source,
        functions_source,
        triggers_source,
        types_source,
        relations_export,
    }
}

fn assign_missing_tokens(schema: &mut Schema, generator: &mut TokenGenerator) {
    for table in schema.tables.values_mut() {
        if table.token.is_none() {
            table.token = Some(generator.next(tokens::kind::TABLE));
        }
        for column in &mut table.columns {
            if column.token.is_none() {
                column.token = Some(generator.next(tokens::kind::COLUMN));
            }
        }
        for index in &mut table.indexes {
            if index.token.is_none() {
                index.token = Some(generator.next(tokens::kind::INDEX));
            }
        }
    }
    for e in &mut schema.enums {
        if e.token.is_none() {
            e.token = Some(generator.next(tokens::kind::ENUM));
        }
    }
    for d in &mut schema.domains {
        if d.token.is_none() {
            d.token = Some(generator.next(tokens::kind::DOMAIN));
        }
    }
    for s in &mut schema.sequences {
        if s.token.is_none() {
            s.token = Some(generator.next(tokens::kind::SEQUENCE));
        }
    }
    for v in &mut schema.views {
        if v.token.is_none() {
            v.token = Some(generator.next(tokens::kind::VIEW));
        }
    }
    for f in &mut schema.functions {
        if f.token.is_none() {
            f.token = Some(generator.next(tokens::kind::FUNCTION));
        }
    }
    for t in &mut schema.triggers {
        if t.token.is_none() {
            t.token = Some(generator.next(tokens::kind::TRIGGER));
        }
    }
}

/// The conventional relations export, fallback-renamed while it collides
/// with an emitted table function: `relations`, `relq_relations`,
/// `relq_relations1`, `relq_relations2`, …
fn relations_export_name(schema: &Schema) -> String {
    let taken: BTreeSet<String> = schema.tables.keys().map(|n| fn_ident(n)).collect();
    if !taken.contains("relations") {
        return "relations".to_string();
    }
    if !taken.contains("relq_relations") {
        return "relq_relations".to_string();
    }
    let mut n = 1usize;
    loop {
        let candidate = format!("relq_relations{n}");
        if !taken.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Rust-identifier-safe rendering of an object name.
fn fn_ident(name: &str) -> String {
    let mut ident: String = name
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if ident.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        ident.insert(0, '_');
    }
    const KEYWORDS: &[&str] = &[
        "as", "break", "const", "continue", "crate", "dyn", "else", "enum", "extern", "false",
        "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move", "mut", "pub",
        "ref", "return", "self", "static", "struct", "super", "trait", "true", "type", "unsafe",
        "use", "where", "while", "async", "await",
    ];
    if KEYWORDS.contains(&ident.as_str()) {
        ident.push('_');
    }
    ident
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Sort key for table emission: non-partition-children first, then
/// alphabetically.
fn ordered_tables(schema: &Schema) -> Vec<&Table> {
    let children: BTreeSet<&str> = schema
        .tables
        .values()
        .filter_map(|t| t.partition.as_ref())
        .flat_map(|spec| spec.partitions.iter().map(|p| p.name.as_str()))
        .collect();

    let mut tables: Vec<&Table> = schema.tables.values().collect();
    tables.sort_by_key(|t| (children.contains(t.name.as_str()), t.name.clone()));
    tables
}

fn render_schema_file(schema: &Schema, options: &CodegenOptions, relations_export: &str) -> String {
    let mut out = String::new();
    out.push_str(HEADER);
    out.push('\n');
    let _ = writeln!(out, "use {}::*;", options.import_path);
    if let Some(types_path) = &options.types_import_path {
        let _ = writeln!(out, "#[allow(unused_imports)]\nuse {types_path}::*;");
    }

    for e in &schema.enums {
        out.push('\n');
        let values = e
            .values
            .iter()
            .map(|v| format!("\"{}\"", escape(v)))
            .collect::<Vec<_>>()
            .join(", ");
        let _ = writeln!(out, "pub fn {}() -> EnumDef {{", fn_ident(&e.name));
        let _ = write!(out, "    enum_def(\"{}\", &[{values}])", escape(&e.name));
        push_token(&mut out, e.token.as_ref());
        out.push_str("\n}\n");
    }

    if options.include_domains {
        for d in &schema.domains {
            out.push('\n');
            let _ = writeln!(out, "pub fn {}() -> DomainDef {{", fn_ident(&d.name));
            let _ = write!(
                out,
                "    domain(\"{}\", \"{}\")",
                escape(&d.name),
                escape(&d.base_type)
            );
            if d.not_null {
                out.push_str(".not_null()");
            }
            if let Some(default) = &d.default {
                let _ = write!(out, ".default_sql(\"{}\")", escape(default));
            }
            if let Some(check) = &d.check {
                let _ = write!(out, ".check(\"{}\")", escape(check));
            }
            push_token(&mut out, d.token.as_ref());
            out.push_str("\n}\n");
        }
    }

    for s in &schema.sequences {
        out.push('\n');
        let _ = writeln!(out, "pub fn {}() -> SequenceDef {{", fn_ident(&s.name));
        let _ = write!(out, "    sequence(\"{}\")", escape(&s.name));
        if let Some(increment) = s.increment.filter(|i| *i != 1) {
            let _ = write!(out, ".increment({increment})");
        }
        if let Some(start) = s.start.filter(|v| *v != 1) {
            let _ = write!(out, ".start({start})");
        }
        if s.cycle {
            out.push_str(".cycle()");
        }
        push_token(&mut out, s.token.as_ref());
        out.push_str("\n}\n");
    }

    if options.include_tables {
        for table in ordered_tables(schema) {
            out.push('\n');
            render_table(&mut out, table, options);
        }
    }

    if options.include_views {
        for v in &schema.views {
            out.push('\n');
            let _ = writeln!(out, "pub fn {}() -> ViewDef {{", fn_ident(&v.name));
            let _ = write!(
                out,
                "    view(\"{}\", \"{}\")",
                escape(&v.name),
                escape(&v.definition)
            );
            if v.materialized {
                out.push_str(".materialized()");
            }
            push_token(&mut out, v.token.as_ref());
            out.push_str("\n}\n");
        }
    }

    let relations = collect_relations(schema);
    if !relations.is_empty() {
        out.push('\n');
        let _ = writeln!(out, "pub fn {relations_export}() -> Vec<Relation> {{");
        out.push_str("    vec![\n");
        for rel in &relations {
            let _ = writeln!(out, "        relation(\"{}\")", escape(&rel.name));
            let _ = writeln!(
                out,
                "            .from(\"{}\", &[{}])",
                escape(&rel.table),
                quoted_list(&rel.columns)
            );
            let _ = write!(
                out,
                "            .to(\"{}\", &[{}])",
                escape(&rel.ref_table),
                quoted_list(&rel.ref_columns)
            );
            if let Some(action) = rel.on_delete {
                let _ = write!(out, "\n            .on_delete(\"{}\")", action.as_sql());
            }
            if let Some(action) = rel.on_update {
                let _ = write!(out, "\n            .on_update(\"{}\")", action.as_sql());
            }
            out.push_str(",\n");
        }
        out.push_str("    ]\n}\n");
    }

    out
}

fn push_token(out: &mut String, token: Option<&crate::ir::TrackingToken>) {
    if let Some(token) = token {
        let _ = write!(out, ".token(\"{token}\")");
    }
}

fn quoted_list(items: &[String]) -> String {
    items
        .iter()
        .map(|i| format!("\"{}\"", escape(i)))
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_table(out: &mut String, table: &Table, options: &CodegenOptions) {
    let _ = writeln!(out, "pub fn {}() -> TableDef {{", fn_ident(&table.name));
    let _ = write!(out, "    table(\"{}\")", escape(&table.name));
    if let Some(token) = &table.token {
        let _ = write!(out, "\n        .token(\"{token}\")");
    }

    // Enum-like CHECKs fold onto the column they constrain.
    let mut folded_checks: BTreeMap<String, (String, Vec<String>)> = BTreeMap::new();
    for constraint in &table.constraints {
        if let Constraint::Check {
            name: Some(name),
            expression,
            ..
        } = constraint
            && let Some((column, values)) = check_expr::extract_enum_values(expression)
            && table.get_column(&column).is_some()
        {
            folded_checks.insert(column, (name.clone(), values));
        }
    }

    for column in &table.columns {
        let _ = write!(out, "\n        .column(");
        render_column(out, table, column, folded_checks.get(&column.name), options);
        out.push(')');
    }

    for index in &table.indexes {
        if index.primary {
            continue;
        }
        let _ = write!(out, "\n        .index(");
        render_index(out, index);
        out.push(')');
    }

    for constraint in &table.constraints {
        match constraint {
            Constraint::Check {
                name, expression, ..
            } => {
                let folded = name
                    .as_ref()
                    .is_some_and(|n| folded_checks.values().any(|(fname, _)| fname == n));
                if !folded {
                    let _ = write!(
                        out,
                        "\n        .check(\"{}\", \"{}\")",
                        escape(name.as_deref().unwrap_or("check")),
                        escape(expression)
                    );
                }
            }
            Constraint::Exclude {
                name, definition, ..
            } => {
                let _ = write!(
                    out,
                    "\n        .exclude(\"{}\", \"{}\")",
                    escape(name.as_deref().unwrap_or("exclude")),
                    escape(definition)
                );
            }
            Constraint::Unique { name, columns, .. } if columns.len() > 1 => {
                let _ = write!(
                    out,
                    "\n        .unique(\"{}\", &[{}])",
                    escape(name.as_deref().unwrap_or("unique")),
                    quoted_list(columns)
                );
            }
            _ => {}
        }
    }

    if let Some(comment) = &table.comment {
        let _ = write!(out, "\n        .comment(\"{}\")", escape(comment));
    }

    if let Some(spec) = &table.partition {
        let method = match spec.partition_type {
            crate::ir::PartitionType::List => "list_partition",
            crate::ir::PartitionType::Range => "range_partition",
            crate::ir::PartitionType::Hash => "hash_partition",
        };
        let key = quoted_list(&spec.partition_key);
        let children = spec
            .partitions
            .iter()
            .map(|p| format!("(\"{}\", \"{}\")", escape(&p.name), escape(&p.bound)))
            .collect::<Vec<_>>()
            .join(", ");
        let _ = write!(out, "\n        .{method}(&[{key}], &[{children}])");
    }

    out.push_str("\n}\n");
}

fn render_column(
    out: &mut String,
    table: &Table,
    column: &Column,
    folded_check: Option<&(String, Vec<String>)>,
    options: &CodegenOptions,
) {
    let override_key = format!("{}.{}", table.name, column.name);
    let type_spec = options
        .column_type_map
        .get(&override_key)
        .cloned()
        .unwrap_or_else(|| column.rendered_type());

    let _ = write!(out, "col(\"{}\", \"{}\")", escape(&column.name), escape(&type_spec));

    if options.camel_case {
        let camel = column.name.to_camel_case();
        if camel != column.name {
            let _ = write!(out, ".dev_name(\"{}\")", escape(&camel));
        }
    }
    if column.primary_key {
        out.push_str(".primary_key()");
    } else if !column.nullable {
        out.push_str(".not_null()");
    }
    if column.unique {
        out.push_str(".unique()");
    }
    if let Some(default) = &column.default {
        let _ = write!(out, ".default_sql(\"{}\")", escape(default));
    }
    if column.is_generated
        && let Some(expr) = &column.generation_expression
    {
        let _ = write!(out, ".generated(\"{}\")", escape(&wrap_expression(expr)));
    }
    if let Some((name, values)) = folded_check {
        let values = values
            .iter()
            .map(|v| format!("\"{}\"", escape(v)))
            .collect::<Vec<_>>()
            .join(", ");
        let _ = write!(out, ".check(\"{}\", &[{values}])", escape(name));
    }
    if let Some(comment) = &column.comment {
        let _ = write!(out, ".comment(\"{}\")", escape(comment));
    }
    push_token(out, column.token.as_ref());
}

fn render_index(out: &mut String, index: &Index) {
    let _ = write!(
        out,
        "idx(\"{}\", &[{}])",
        escape(&index.name),
        quoted_list(&index.columns)
    );
    if index.unique {
        out.push_str(".unique()");
    }
    if index.method != crate::ir::IndexMethod::Btree {
        let _ = write!(out, ".method(\"{}\")", index.method.as_str());
    }
    if let Some(predicate) = &index.where_clause {
        let _ = write!(out, ".where_sql(\"{}\")", escape(predicate));
    }
    if !index.include.is_empty() {
        let _ = write!(out, ".include(&[{}])", quoted_list(&index.include));
    }
    push_token(out, index.token.as_ref());
}

/// Break long chained expressions at well-known call boundaries so
/// generated tsvector columns stay readable.
const WRAP_BOUNDARIES: &[&str] = &["setweight(", "to_tsvector(", "concat(", "coalesce("];
const WRAP_THRESHOLD: usize = 100;

fn wrap_expression(expr: &str) -> String {
    if expr.len() <= WRAP_THRESHOLD {
        return expr.to_string();
    }
    let mut wrapped = expr.to_string();
    for boundary in WRAP_BOUNDARIES {
        wrapped = wrapped.replace(&format!(" || {boundary}"), &format!(" ||\n  {boundary}"));
    }
    wrapped
}

// ---------------------------------------------------------------------------
// Relations
// ---------------------------------------------------------------------------

/// Collect foreign keys into relation records. Names derive from the
/// source column (trailing `_id` stripped) and deduplicate with an
/// incrementing numeric suffix.
fn collect_relations(schema: &Schema) -> Vec<Relation> {
    let mut relations = Vec::new();
    let mut used: BTreeMap<String, usize> = BTreeMap::new();

    for table in schema.tables.values() {
        for constraint in &table.constraints {
            let Constraint::ForeignKey {
                columns,
                ref_table,
                ref_columns,
                on_delete,
                on_update,
                ..
            } = constraint
            else {
                continue;
            };

            let source_column = columns.first().map(|c| c.as_str()).unwrap_or("ref");
            let base = source_column
                .strip_suffix("_id")
                .filter(|b| !b.is_empty())
                .unwrap_or(source_column);
            let count = used.entry(base.to_string()).or_insert(0);
            *count += 1;
            let name = if *count == 1 {
                base.to_string()
            } else {
                format!("{base}{count}")
            };

            relations.push(Relation {
                name,
                table: table.name.clone(),
                columns: columns.clone(),
                ref_table: ref_table.clone(),
                ref_columns: ref_columns.clone(),
                on_delete: *on_delete,
                on_update: *on_update,
            });
        }
    }

    relations
}

// ---------------------------------------------------------------------------
// Companion files
// ---------------------------------------------------------------------------

fn render_functions_file(schema: &Schema, options: &CodegenOptions) -> String {
    let mut out = String::new();
    out.push_str(HEADER);
    out.push('\n');
    let _ = writeln!(out, "use {}::*;", options.import_path);

    for f in &schema.functions {
        out.push('\n');
        let _ = writeln!(out, "pub fn {}() -> FunctionDef {{", fn_ident(&f.name));
        let _ = write!(
            out,
            "    function(\"{}\", \"{}\", \"{}\")",
            escape(&f.name),
            escape(&f.returns),
            escape(&f.language)
        );
        for arg in &f.arg_types {
            let _ = write!(out, ".arg(\"{}\")", escape(arg));
        }
        if let Some(body) = &f.body {
            let _ = write!(out, "\n        .body(\"{}\")", escape(body));
        }
        if let Some(volatility) = f.volatility {
            let value = match volatility {
                crate::ir::Volatility::Immutable => "immutable",
                crate::ir::Volatility::Stable => "stable",
                crate::ir::Volatility::Volatile => "volatile",
            };
            let _ = write!(out, ".volatility(\"{value}\")");
        }
        if f.security_definer {
            out.push_str(".security_definer()");
        }
        push_token(&mut out, f.token.as_ref());
        out.push_str("\n}\n");
    }
    out
}

fn render_triggers_file(schema: &Schema, options: &CodegenOptions) -> String {
    let mut out = String::new();
    out.push_str(HEADER);
    out.push('\n');
    let _ = writeln!(out, "use {}::*;", options.import_path);

    for t in &schema.triggers {
        out.push('\n');
        let _ = writeln!(
            out,
            "pub fn {}() -> TriggerDef {{",
            fn_ident(&format!("{}_{}", t.table, t.name))
        );
        let _ = write!(
            out,
            "    trigger(\"{}\", \"{}\")",
            escape(&t.name),
            escape(&t.table)
        );
        out.push_str(match t.timing {
            crate::ir::TriggerTiming::Before => ".before()",
            crate::ir::TriggerTiming::After => ".after()",
            crate::ir::TriggerTiming::InsteadOf => ".instead_of()",
        });
        let events = t
            .events
            .iter()
            .map(|e| format!("\"{}\"", e.as_sql()))
            .collect::<Vec<_>>()
            .join(", ");
        let _ = write!(out, ".on(&[{events}])");
        out.push_str(match t.for_each {
            crate::ir::TriggerForEach::Row => ".for_each_row()",
            crate::ir::TriggerForEach::Statement => ".for_each_statement()",
        });
        let _ = write!(out, ".execute(\"{}\")", escape(&t.function_name));
        push_token(&mut out, t.token.as_ref());
        out.push_str("\n}\n");
    }
    out
}

/// Rust stubs for user-defined types: one struct per composite type, one
/// enum per database enum.
fn render_types_file(schema: &Schema) -> String {
    let mut out = String::new();
    out.push_str(HEADER);

    for e in &schema.enums {
        out.push('\n');
        let _ = writeln!(out, "/// Values of the `{}` enum type.", e.name);
        let _ = writeln!(out, "#[derive(Debug, Clone, Copy, PartialEq, Eq)]");
        let _ = writeln!(out, "pub enum {} {{", e.name.to_class_case());
        for value in &e.values {
            let _ = writeln!(out, "    {},", value.to_class_case());
        }
        out.push_str("}\n");
    }

    for c in &schema.composite_types {
        out.push('\n');
        let _ = writeln!(out, "/// Stub for the `{}` composite type.", c.name);
        let _ = writeln!(out, "#[derive(Debug, Clone, Default)]");
        let _ = writeln!(out, "pub struct {} {{", c.name.to_class_case());
        for attr in &c.attributes {
            let _ = writeln!(
                out,
                "    pub {}: Option<{}>,",
                fn_ident(&attr.name),
                rust_type_for(&attr.type_name)
            );
        }
        out.push_str("}\n");
    }
    out
}

fn rust_type_for(sql_type: &str) -> &'static str {
    match crate::normalize::canonical_type(&crate::normalize::base_type(sql_type)).as_str() {
        "smallint" => "i16",
        "integer" => "i32",
        "bigint" => "i64",
        "real" => "f32",
        "double precision" => "f64",
        "boolean" => "bool",
        "bytea" => "Vec<u8>",
        _ => "String",
    }
}

#[cfg(test)]
mod tests;
