//! PostgreSQL-family introspection
//!
//! One adapter serves Postgres, CockroachDB, Aurora DSQL, Nile, and Xata:
//! the wire catalogs are compatible, and steps a derivative engine lacks
//! are skipped per its dialect profile rather than queried and failed.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::diagnostics::{Diagnostic, DiagnosticCategory, Severity};
use crate::dialect::{Dialect, registry};
use crate::diff::check_expr;
use crate::error::SyncError;
use crate::introspect::{
    CancelToken, ClientError, IntrospectOutcome, IntrospectStep, Introspector, ProgressSink, Row,
    SchemaClient, StepStatus, fatal_step_error,
};
use crate::ir::{
    Column, CompositeAttribute, CompositeType, Constraint, Domain, EnumType, Extension,
    ForeignKeyAction, Function, Index, IndexMethod, MatchMode, PartitionChild, PartitionSpec,
    PartitionType, Schema, Table, Trigger, TriggerEvent, TriggerForEach, TriggerTiming, Volatility,
};
use crate::normalize;

pub struct PostgresIntrospector {
    dialect: Dialect,
}

impl PostgresIntrospector {
    pub fn new(dialect: Dialect) -> Self {
        debug_assert!(dialect.is_postgres_family());
        Self { dialect }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }
}

fn lit(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

// ---------------------------------------------------------------------------
// Catalog queries
// ---------------------------------------------------------------------------

fn tables_sql(ns: &str) -> String {
    format!(
        "SELECT c.relname AS table_name, obj_description(c.oid, 'pg_class') AS comment \
         FROM pg_class c JOIN pg_namespace n ON n.oid = c.relnamespace \
         WHERE n.nspname = {} AND c.relkind IN ('r', 'p') \
         ORDER BY c.relname",
        lit(ns)
    )
}

fn columns_sql(ns: &str, table: Option<&str>) -> String {
    let table_filter = table
        .map(|t| format!(" AND table_name = {}", lit(t)))
        .unwrap_or_default();
    format!(
        "SELECT table_name, column_name, data_type, udt_name, is_nullable, column_default, \
                character_maximum_length, numeric_precision, numeric_scale, is_generated, \
                generation_expression, col_description(pc.oid, ordinal_position) AS comment \
         FROM information_schema.columns \
         JOIN pg_class pc ON pc.relname = table_name \
         WHERE table_schema = {}{} \
         ORDER BY table_name, ordinal_position",
        lit(ns),
        table_filter
    )
}

fn constraints_sql(ns: &str, table: Option<&str>) -> String {
    let table_filter = table
        .map(|t| format!(" AND rel.relname = {}", lit(t)))
        .unwrap_or_default();
    format!(
        "SELECT rel.relname AS table_name, con.conname AS constraint_name, con.contype AS kind, \
                array_to_string(ARRAY(SELECT attname FROM pg_attribute a JOIN unnest(con.conkey) k ON a.attnum = k WHERE a.attrelid = rel.oid), ',') AS columns, \
                ref.relname AS ref_table, \
                array_to_string(ARRAY(SELECT attname FROM pg_attribute a JOIN unnest(con.confkey) k ON a.attnum = k WHERE a.attrelid = ref.oid), ',') AS ref_columns, \
                con.confdeltype AS on_delete, con.confupdtype AS on_update, con.confmatchtype AS match_mode, \
                con.condeferrable AS deferrable, con.condeferred AS initially_deferred, \
                pg_get_constraintdef(con.oid) AS definition \
         FROM pg_constraint con \
         JOIN pg_class rel ON rel.oid = con.conrelid \
         LEFT JOIN pg_class ref ON ref.oid = con.confrelid \
         JOIN pg_namespace n ON n.oid = rel.relnamespace \
         WHERE n.nspname = {} AND con.contype <> 'c'{} \
         ORDER BY rel.relname, con.conname",
        lit(ns),
        table_filter
    )
}

fn indexes_sql(ns: &str, table: Option<&str>) -> String {
    let table_filter = table
        .map(|t| format!(" AND t.relname = {}", lit(t)))
        .unwrap_or_default();
    format!(
        "SELECT t.relname AS table_name, i.relname AS index_name, \
                array_to_string(ARRAY(SELECT pg_get_indexdef(ix.indexrelid, k + 1, true) FROM generate_subscripts(ix.indkey, 1) k WHERE k < ix.indnkeyatts), ',') AS columns, \
                array_to_string(ARRAY(SELECT pg_get_indexdef(ix.indexrelid, k + 1, true) FROM generate_subscripts(ix.indkey, 1) k WHERE k >= ix.indnkeyatts), ',') AS include, \
                ix.indisunique AS is_unique, ix.indisprimary AS is_primary, am.amname AS method, \
                pg_get_expr(ix.indpred, ix.indrelid) AS where_clause, \
                pg_get_indexdef(ix.indexrelid) AS definition, \
                obj_description(i.oid, 'pg_class') AS comment \
         FROM pg_index ix \
         JOIN pg_class i ON i.oid = ix.indexrelid \
         JOIN pg_class t ON t.oid = ix.indrelid \
         JOIN pg_am am ON am.oid = i.relam \
         JOIN pg_namespace n ON n.oid = t.relnamespace \
         WHERE n.nspname = {}{} \
         ORDER BY t.relname, i.relname",
        lit(ns),
        table_filter
    )
}

fn checks_sql(ns: &str, table: Option<&str>) -> String {
    let table_filter = table
        .map(|t| format!(" AND rel.relname = {}", lit(t)))
        .unwrap_or_default();
    format!(
        "SELECT rel.relname AS table_name, con.conname AS constraint_name, \
                pg_get_expr(con.conbin, con.conrelid) AS expression \
         FROM pg_constraint con \
         JOIN pg_class rel ON rel.oid = con.conrelid \
         JOIN pg_namespace n ON n.oid = rel.relnamespace \
         WHERE n.nspname = {} AND con.contype = 'c'{} \
         ORDER BY rel.relname, con.conname",
        lit(ns),
        table_filter
    )
}

fn enums_sql(ns: &str) -> String {
    format!(
        "SELECT t.typname AS name, n.nspname AS schema, \
                array_to_string(ARRAY(SELECT enumlabel FROM pg_enum e WHERE e.enumtypid = t.oid ORDER BY e.enumsortorder), ',') AS values \
         FROM pg_type t JOIN pg_namespace n ON n.oid = t.typnamespace \
         WHERE n.nspname = {} AND t.typtype = 'e' ORDER BY t.typname",
        lit(ns)
    )
}

fn domains_sql(ns: &str) -> String {
    format!(
        "SELECT t.typname AS name, format_type(t.typbasetype, t.typtypmod) AS base_type, \
                t.typnotnull AS not_null, t.typdefault AS default_expr, \
                pg_get_constraintdef(con.oid) AS check_clause \
         FROM pg_type t \
         JOIN pg_namespace n ON n.oid = t.typnamespace \
         LEFT JOIN pg_constraint con ON con.contypid = t.oid \
         WHERE n.nspname = {} AND t.typtype = 'd' ORDER BY t.typname",
        lit(ns)
    )
}

fn partitions_sql(ns: &str) -> String {
    format!(
        "SELECT c.relname AS table_name, pt.partstrat AS strategy, \
                array_to_string(ARRAY(SELECT a.attname FROM pg_attribute a JOIN unnest(pt.partattrs) k ON a.attnum = k WHERE a.attrelid = c.oid), ',') AS key_columns \
         FROM pg_partitioned_table pt \
         JOIN pg_class c ON c.oid = pt.partrelid \
         JOIN pg_namespace n ON n.oid = c.relnamespace \
         WHERE n.nspname = {} ORDER BY c.relname",
        lit(ns)
    )
}

fn partition_children_sql(ns: &str) -> String {
    format!(
        "SELECT parent.relname AS parent_table, child.relname AS child_table, \
                pg_get_expr(child.relpartbound, child.oid) AS bound \
         FROM pg_inherits i \
         JOIN pg_class parent ON parent.oid = i.inhparent \
         JOIN pg_class child ON child.oid = i.inhrelid \
         JOIN pg_namespace n ON n.oid = parent.relnamespace \
         WHERE n.nspname = {} ORDER BY parent.relname, child.relname",
        lit(ns)
    )
}

fn extensions_sql() -> String {
    "SELECT extname AS name, extversion AS version FROM pg_extension ORDER BY extname".to_string()
}

fn functions_sql(ns: &str) -> String {
    format!(
        "SELECT p.proname AS name, pg_get_function_result(p.oid) AS returns, l.lanname AS language, \
                pg_get_function_arguments(p.oid) AS args, p.prosrc AS body, \
                p.provolatile AS volatility, p.prosecdef AS security_definer \
         FROM pg_proc p \
         JOIN pg_language l ON l.oid = p.prolang \
         JOIN pg_namespace n ON n.oid = p.pronamespace \
         WHERE n.nspname = {} AND p.prokind = 'f' AND l.lanname NOT IN ('c', 'internal') \
         ORDER BY p.proname",
        lit(ns)
    )
}

fn triggers_sql(ns: &str) -> String {
    format!(
        "SELECT trigger_name AS name, event_object_table AS table_name, action_timing AS timing, \
                string_agg(event_manipulation, ',') AS events, action_orientation AS for_each, \
                action_statement AS action \
         FROM information_schema.triggers \
         WHERE trigger_schema = {} \
         GROUP BY trigger_name, event_object_table, action_timing, action_orientation, action_statement \
         ORDER BY event_object_table, trigger_name",
        lit(ns)
    )
}

fn collations_sql(ns: &str) -> String {
    format!(
        "SELECT collname AS name FROM pg_collation c \
         JOIN pg_namespace n ON n.oid = c.collnamespace WHERE n.nspname = {}",
        lit(ns)
    )
}

fn foreign_servers_sql() -> String {
    "SELECT srvname AS name FROM pg_foreign_server ORDER BY srvname".to_string()
}

fn foreign_tables_sql(ns: &str) -> String {
    format!(
        "SELECT c.relname AS name FROM pg_class c \
         JOIN pg_namespace n ON n.oid = c.relnamespace \
         WHERE n.nspname = {} AND c.relkind = 'f' ORDER BY c.relname",
        lit(ns)
    )
}

fn composite_types_sql(ns: &str) -> String {
    format!(
        "SELECT t.typname AS type_name, a.attname AS attr_name, \
                format_type(a.atttypid, a.atttypmod) AS attr_type, a.attnum AS ordinal \
         FROM pg_type t \
         JOIN pg_class c ON c.oid = t.typrelid AND c.relkind = 'c' \
         JOIN pg_attribute a ON a.attrelid = c.oid AND a.attnum > 0 \
         JOIN pg_namespace n ON n.oid = t.typnamespace \
         WHERE n.nspname = {} ORDER BY t.typname, a.attnum",
        lit(ns)
    )
}

fn views_sql(ns: &str) -> String {
    format!(
        "SELECT table_name AS name, view_definition AS definition \
         FROM information_schema.views WHERE table_schema = {} ORDER BY table_name",
        lit(ns)
    )
}

fn sequences_sql(ns: &str) -> String {
    format!(
        "SELECT sequence_name AS name, increment, start_value, minimum_value, maximum_value, \
                cycle_option \
         FROM information_schema.sequences WHERE sequence_schema = {} ORDER BY sequence_name",
        lit(ns)
    )
}

// ---------------------------------------------------------------------------
// Row conversion
// ---------------------------------------------------------------------------

fn column_from_row(row: &Row) -> Result<Column, ClientError> {
    let name = row.require("column_name")?.to_string();
    let data_type = row.require("data_type")?;
    let udt = row.get("udt_name").unwrap_or(data_type);

    let (type_name, is_array) = if data_type == "ARRAY" || udt.starts_with('_') {
        (normalize::base_type(udt), true)
    } else if data_type == "USER-DEFINED" {
        (udt.to_string(), false)
    } else {
        (data_type.to_lowercase(), false)
    };

    let base = normalize::base_type(&type_name);
    let mut column = Column::new(name, type_name);
    column.is_array = is_array;
    if is_array {
        column.array_dimensions = Some(1);
    }
    column.nullable = row.get_bool("is_nullable");
    column.default = row.get("column_default").map(|s| s.to_string());

    // information_schema reports precision for every numeric-ish type;
    // the IR only carries parameters where the type accepts them.
    if matches!(base.as_str(), "varchar" | "character varying" | "char" | "character" | "bpchar" | "bit" | "varbit") {
        column.max_length = row.get_u32("character_maximum_length");
    }
    if matches!(base.as_str(), "numeric" | "decimal") {
        column.precision = row.get_u32("numeric_precision");
        column.scale = row.get_u32("numeric_scale");
    }

    if matches!(row.get("is_generated"), Some("ALWAYS")) {
        column.is_generated = true;
        column.generation_expression = row.get("generation_expression").map(|s| s.to_string());
    }
    column.comment = row.get("comment").map(|s| s.to_string());
    Ok(column)
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn fk_action(code: &str) -> Option<ForeignKeyAction> {
    match code {
        "a" => Some(ForeignKeyAction::NoAction),
        "r" => Some(ForeignKeyAction::Restrict),
        "c" => Some(ForeignKeyAction::Cascade),
        "n" => Some(ForeignKeyAction::SetNull),
        "d" => Some(ForeignKeyAction::SetDefault),
        _ => None,
    }
}

fn constraint_from_row(row: &Row) -> Result<Option<(String, Constraint)>, ClientError> {
    let table = row.require("table_name")?.to_string();
    let name = Some(row.require("constraint_name")?.to_string());
    let columns = split_list(row.get("columns").unwrap_or(""));

    let constraint = match row.require("kind")? {
        "p" => Constraint::PrimaryKey {
            name,
            columns,
            token: None,
        },
        "u" => Constraint::Unique {
            name,
            columns,
            token: None,
        },
        "f" => Constraint::ForeignKey {
            name,
            columns,
            ref_table: row.require("ref_table")?.to_string(),
            ref_columns: split_list(row.get("ref_columns").unwrap_or("")),
            on_delete: row.get("on_delete").and_then(fk_action),
            on_update: row.get("on_update").and_then(fk_action),
            match_mode: match row.get("match_mode") {
                Some("f") => Some(MatchMode::Full),
                Some("p") => Some(MatchMode::Partial),
                Some("s") => Some(MatchMode::Simple),
                _ => None,
            },
            deferrable: row.get_bool("deferrable"),
            initially_deferred: row.get_bool("initially_deferred"),
            token: None,
        },
        "x" => Constraint::Exclude {
            name,
            columns,
            definition: row.get("definition").unwrap_or("").to_string(),
            token: None,
        },
        // 't' (constraint triggers) and anything newer: not modeled.
        _ => return Ok(None),
    };
    Ok(Some((table, constraint)))
}

fn index_from_row(row: &Row) -> Result<(String, Index), ClientError> {
    let table = row.require("table_name")?.to_string();
    let mut index = Index::new(
        row.require("index_name")?.to_string(),
        split_list(row.get("columns").unwrap_or("")),
    );
    index.unique = row.get_bool("is_unique");
    index.primary = row.get_bool("is_primary");
    index.method = row
        .get("method")
        .and_then(IndexMethod::parse)
        .unwrap_or(IndexMethod::Btree);
    index.where_clause = row.get("where_clause").map(|s| s.to_string());
    index.include = split_list(row.get("include").unwrap_or(""));
    index.definition = row.get("definition").map(|s| s.to_string());
    index.comment = row.get("comment").map(|s| s.to_string());
    Ok((table, index))
}

fn trigger_from_row(row: &Row) -> Result<Trigger, ClientError> {
    let timing = match row.require("timing")? {
        "BEFORE" => TriggerTiming::Before,
        "AFTER" => TriggerTiming::After,
        "INSTEAD OF" => TriggerTiming::InsteadOf,
        other => {
            return Err(ClientError::Query(format!("unknown trigger timing '{other}'")));
        }
    };
    let events = split_list(row.get("events").unwrap_or(""))
        .iter()
        .filter_map(|e| match e.as_str() {
            "INSERT" => Some(TriggerEvent::Insert),
            "UPDATE" => Some(TriggerEvent::Update),
            "DELETE" => Some(TriggerEvent::Delete),
            "TRUNCATE" => Some(TriggerEvent::Truncate),
            _ => None,
        })
        .collect();
    let for_each = match row.get("for_each") {
        Some("ROW") => TriggerForEach::Row,
        _ => TriggerForEach::Statement,
    };
    // `EXECUTE FUNCTION touch_updated_at()` — take the bare function name.
    let action = row.get("action").unwrap_or("");
    let function_name = action
        .rsplit_once("FUNCTION ")
        .map(|(_, f)| f.trim_end_matches(trailing_junk))
        .unwrap_or(action)
        .trim_end_matches("()")
        .to_string();

    Ok(Trigger {
        name: row.require("name")?.to_string(),
        table: row.require("table_name")?.to_string(),
        timing,
        events,
        for_each,
        function_name,
        token: None,
    })
}

fn trailing_junk(c: char) -> bool {
    c.is_whitespace() || c == ';'
}

// ---------------------------------------------------------------------------
// Introspector impl
// ---------------------------------------------------------------------------

#[async_trait]
impl Introspector for PostgresIntrospector {
    async fn test_connection(&self, client: &dyn SchemaClient) -> Result<(), SyncError> {
        client
            .ping()
            .await
            .map_err(|e| SyncError::Connectivity(e.to_string()))
    }

    async fn database_version(&self, client: &dyn SchemaClient) -> Result<String, SyncError> {
        let rows = client
            .query("SELECT version() AS version")
            .await
            .map_err(|e| fatal_step_error(IntrospectStep::Tables, e))?;
        Ok(rows
            .first()
            .and_then(|r| r.get("version"))
            .unwrap_or("unknown")
            .to_string())
    }

    async fn list_schemas(&self, client: &dyn SchemaClient) -> Result<Vec<String>, SyncError> {
        let sql = "SELECT nspname AS name FROM pg_namespace \
                   WHERE nspname NOT LIKE 'pg_%' AND nspname <> 'information_schema' \
                   ORDER BY nspname";
        let rows = client
            .query(sql)
            .await
            .map_err(|e| fatal_step_error(IntrospectStep::Tables, e))?;
        Ok(rows
            .iter()
            .filter_map(|r| r.get("name").map(|s| s.to_string()))
            .collect())
    }

    async fn list_tables(
        &self,
        client: &dyn SchemaClient,
        namespace: &str,
    ) -> Result<Vec<String>, SyncError> {
        let rows = client
            .query(&tables_sql(namespace))
            .await
            .map_err(|e| fatal_step_error(IntrospectStep::Tables, e))?;
        Ok(rows
            .iter()
            .filter_map(|r| r.get("table_name").map(|s| s.to_string()))
            .collect())
    }

    async fn introspect_table(
        &self,
        client: &dyn SchemaClient,
        namespace: &str,
        table: &str,
    ) -> Result<Table, SyncError> {
        let mut result = Table::new(table);
        result.schema = namespace.to_string();

        let rows = client
            .query(&columns_sql(namespace, Some(table)))
            .await
            .map_err(|e| fatal_step_error(IntrospectStep::Columns, e))?;
        for row in &rows {
            result
                .columns
                .push(column_from_row(row).map_err(|e| fatal_step_error(IntrospectStep::Columns, e))?);
        }

        let rows = client
            .query(&constraints_sql(namespace, Some(table)))
            .await
            .map_err(|e| fatal_step_error(IntrospectStep::Constraints, e))?;
        for row in &rows {
            if let Some((_, constraint)) =
                constraint_from_row(row).map_err(|e| fatal_step_error(IntrospectStep::Constraints, e))?
            {
                apply_constraint_flags(&mut result, &constraint);
                result.constraints.push(constraint);
            }
        }

        let rows = client
            .query(&indexes_sql(namespace, Some(table)))
            .await
            .map_err(|e| fatal_step_error(IntrospectStep::Indexes, e))?;
        for row in &rows {
            let (_, index) =
                index_from_row(row).map_err(|e| fatal_step_error(IntrospectStep::Indexes, e))?;
            result.indexes.push(index);
        }

        let rows = client
            .query(&checks_sql(namespace, Some(table)))
            .await
            .map_err(|e| fatal_step_error(IntrospectStep::Checks, e))?;
        for row in &rows {
            let expression = row
                .get("expression")
                .unwrap_or("")
                .to_string();
            result.constraints.push(Constraint::Check {
                name: row.get("constraint_name").map(|s| s.to_string()),
                columns: check_expr::referenced_columns(&expression),
                expression,
                token: None,
            });
        }

        Ok(result)
    }

    async fn introspect(
        &self,
        client: &dyn SchemaClient,
        namespace: &str,
        progress: &mut dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<IntrospectOutcome, SyncError> {
        let adapter = registry::adapter(self.dialect)?;
        let skipped: Vec<IntrospectStep> = adapter.skipped_introspection_steps();

        let mut schema = Schema::new();
        let mut diagnostics: Vec<Diagnostic> = Vec::new();
        let mut counts: BTreeMap<&'static str, usize> = BTreeMap::new();

        for step in IntrospectStep::ALL {
            cancel.check(step.key())?;

            if skipped.contains(&step) {
                debug!(step = step.key(), "introspection step skipped by dialect");
                progress.step_finished(step, StepStatus::Skipped);
                continue;
            }

            let count = self
                .run_step(step, client, namespace, &mut schema, &mut diagnostics)
                .await?;
            counts.insert(step.key(), count);
            progress.step_finished(step, StepStatus::Completed { count });
        }

        Ok(IntrospectOutcome {
            schema,
            diagnostics,
            counts,
        })
    }
}

fn apply_constraint_flags(table: &mut Table, constraint: &Constraint) {
    match constraint {
        Constraint::PrimaryKey { columns, .. } => {
            for col_name in columns {
                if let Some(col) = table.get_column_mut(col_name) {
                    col.primary_key = true;
                    col.nullable = false;
                }
            }
        }
        Constraint::Unique { columns, .. } if columns.len() == 1 => {
            if let Some(col) = table.get_column_mut(&columns[0]) {
                col.unique = true;
            }
        }
        _ => {}
    }
}

impl PostgresIntrospector {
    /// Run one introspection step, returning the number of surfaced
    /// objects. Per-object conversion failures degrade to warnings.
    async fn run_step(
        &self,
        step: IntrospectStep,
        client: &dyn SchemaClient,
        ns: &str,
        schema: &mut Schema,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<usize, SyncError> {
        let mut soft = |location: String, err: ClientError| {
            warn!(%location, error = %err, "object skipped during introspection");
            diagnostics.push(Diagnostic::uncoded(
                Severity::Warning,
                DiagnosticCategory::Sql,
                Some(location),
                err.to_string(),
            ));
        };

        match step {
            IntrospectStep::Tables => {
                let rows = run(client, step, &tables_sql(ns)).await?;
                for row in &rows {
                    let Ok(name) = row.require("table_name") else {
                        soft(format!("{ns}.<table>"), ClientError::Query("row without table_name".into()));
                        continue;
                    };
                    let mut table = Table::new(name);
                    table.schema = ns.to_string();
                    table.comment = row.get("comment").map(|s| s.to_string());
                    schema.insert_table(table);
                }
                // Views and sequences are pg_class relations too; they
                // surface with the tables step.
                let rows = run(client, step, &views_sql(ns)).await?;
                for row in &rows {
                    let Ok(name) = row.require("name") else { continue };
                    schema.views.push(crate::ir::View {
                        name: name.to_string(),
                        schema: ns.to_string(),
                        definition: row.get("definition").unwrap_or("").trim().to_string(),
                        materialized: false,
                        token: None,
                    });
                }
                let rows = run(client, step, &sequences_sql(ns)).await?;
                for row in &rows {
                    let Ok(name) = row.require("name") else { continue };
                    schema.sequences.push(crate::ir::Sequence {
                        name: name.to_string(),
                        schema: ns.to_string(),
                        increment: row.get_i64("increment"),
                        start: row.get_i64("start_value"),
                        min_value: row.get_i64("minimum_value"),
                        max_value: row.get_i64("maximum_value"),
                        cache: None,
                        cycle: row.get_bool("cycle_option"),
                        token: None,
                    });
                }
                Ok(schema.tables.len())
            }
            IntrospectStep::Columns => {
                let rows = run(client, step, &columns_sql(ns, None)).await?;
                let mut count = 0;
                for row in &rows {
                    let table_name = row.get("table_name").unwrap_or("");
                    match column_from_row(row) {
                        Ok(column) => match schema.get_table_mut(table_name) {
                            Some(table) => {
                                table.columns.push(column);
                                count += 1;
                            }
                            None => soft(
                                format!("{ns}.{table_name}"),
                                ClientError::Query("column references unknown table".into()),
                            ),
                        },
                        Err(err) => soft(format!("{ns}.{table_name}"), err),
                    }
                }
                Ok(count)
            }
            IntrospectStep::Constraints => {
                let rows = run(client, step, &constraints_sql(ns, None)).await?;
                let mut count = 0;
                for row in &rows {
                    match constraint_from_row(row) {
                        Ok(Some((table_name, constraint))) => {
                            match schema.get_table_mut(&table_name) {
                                Some(table) => {
                                    apply_constraint_flags(table, &constraint);
                                    table.constraints.push(constraint);
                                    count += 1;
                                }
                                None => soft(
                                    format!("{ns}.{table_name}"),
                                    ClientError::Query("constraint references unknown table".into()),
                                ),
                            }
                        }
                        Ok(None) => {}
                        Err(err) => soft(format!("{ns}.<constraint>"), err),
                    }
                }
                Ok(count)
            }
            IntrospectStep::Indexes => {
                let rows = run(client, step, &indexes_sql(ns, None)).await?;
                let mut count = 0;
                for row in &rows {
                    match index_from_row(row) {
                        Ok((table_name, index)) => match schema.get_table_mut(&table_name) {
                            Some(table) => {
                                table.indexes.push(index);
                                count += 1;
                            }
                            None => soft(
                                format!("{ns}.{table_name}"),
                                ClientError::Query("index references unknown table".into()),
                            ),
                        },
                        Err(err) => soft(format!("{ns}.<index>"), err),
                    }
                }
                Ok(count)
            }
            IntrospectStep::Checks => {
                let rows = run(client, step, &checks_sql(ns, None)).await?;
                let mut count = 0;
                for row in &rows {
                    let table_name = row.get("table_name").unwrap_or("").to_string();
                    let Some(expression) = row.get("expression") else {
                        soft(
                            format!("{ns}.{table_name}"),
                            ClientError::Query("check constraint without expression".into()),
                        );
                        continue;
                    };
                    match schema.get_table_mut(&table_name) {
                        Some(table) => {
                            table.constraints.push(Constraint::Check {
                                name: row.get("constraint_name").map(|s| s.to_string()),
                                columns: check_expr::referenced_columns(expression),
                                expression: expression.to_string(),
                                token: None,
                            });
                            count += 1;
                        }
                        None => soft(
                            format!("{ns}.{table_name}"),
                            ClientError::Query("check references unknown table".into()),
                        ),
                    }
                }
                Ok(count)
            }
            IntrospectStep::Enums => {
                let rows = run(client, step, &enums_sql(ns)).await?;
                for row in &rows {
                    let Ok(name) = row.require("name") else { continue };
                    schema.enums.push(EnumType {
                        name: name.to_string(),
                        schema: row.get("schema").unwrap_or(ns).to_string(),
                        values: split_list(row.get("values").unwrap_or("")),
                        token: None,
                    });
                }
                Ok(schema.enums.len())
            }
            IntrospectStep::Partitions => {
                let rows = run(client, step, &partitions_sql(ns)).await?;
                let mut count = 0;
                for row in &rows {
                    let table_name = row.get("table_name").unwrap_or("").to_string();
                    let partition_type = match row.get("strategy") {
                        Some("r") => PartitionType::Range,
                        Some("l") => PartitionType::List,
                        Some("h") => PartitionType::Hash,
                        other => {
                            soft(
                                format!("{ns}.{table_name}"),
                                ClientError::Query(format!("unknown partition strategy {other:?}")),
                            );
                            continue;
                        }
                    };
                    if let Some(table) = schema.get_table_mut(&table_name) {
                        table.partition = Some(PartitionSpec {
                            partition_type,
                            partition_key: split_list(row.get("key_columns").unwrap_or("")),
                            partitions: vec![],
                        });
                        count += 1;
                    }
                }
                let rows = run(client, step, &partition_children_sql(ns)).await?;
                for row in &rows {
                    let parent = row.get("parent_table").unwrap_or("").to_string();
                    let Some(child) = row.get("child_table") else { continue };
                    let child = PartitionChild {
                        name: child.to_string(),
                        bound: row.get("bound").unwrap_or("").to_string(),
                        bound_type: None,
                    };
                    if let Some(table) = schema.get_table_mut(&parent)
                        && let Some(spec) = &mut table.partition
                    {
                        spec.partitions.push(child);
                    }
                }
                Ok(count)
            }
            IntrospectStep::Extensions => {
                let rows = run(client, step, &extensions_sql()).await?;
                for row in &rows {
                    let Ok(name) = row.require("name") else { continue };
                    if name == "plpgsql" {
                        // Preinstalled in every database; not schema state.
                        continue;
                    }
                    schema.extensions.push(Extension {
                        name: name.to_string(),
                        version: row.get("version").map(|s| s.to_string()),
                        token: None,
                    });
                }
                Ok(schema.extensions.len())
            }
            IntrospectStep::Functions => {
                let rows = run(client, step, &functions_sql(ns)).await?;
                for row in &rows {
                    let Ok(name) = row.require("name") else { continue };
                    schema.functions.push(Function {
                        name: name.to_string(),
                        schema: ns.to_string(),
                        returns: row.get("returns").unwrap_or("void").to_string(),
                        language: row.get("language").unwrap_or("sql").to_string(),
                        arg_types: split_list(row.get("args").unwrap_or("")),
                        body: row.get("body").map(|s| s.to_string()),
                        volatility: match row.get("volatility") {
                            Some("i") => Some(Volatility::Immutable),
                            Some("s") => Some(Volatility::Stable),
                            Some("v") => Some(Volatility::Volatile),
                            _ => None,
                        },
                        security_definer: row.get_bool("security_definer"),
                        token: None,
                    });
                }
                Ok(schema.functions.len())
            }
            IntrospectStep::Triggers => {
                let rows = run(client, step, &triggers_sql(ns)).await?;
                for row in &rows {
                    match trigger_from_row(row) {
                        Ok(trigger) => schema.triggers.push(trigger),
                        Err(err) => soft(format!("{ns}.<trigger>"), err),
                    }
                }
                Ok(schema.triggers.len())
            }
            IntrospectStep::Collations => {
                let rows = run(client, step, &collations_sql(ns)).await?;
                Ok(rows.len())
            }
            IntrospectStep::ForeignServers => {
                let rows = run(client, step, &foreign_servers_sql()).await?;
                Ok(rows.len())
            }
            IntrospectStep::ForeignTables => {
                let rows = run(client, step, &foreign_tables_sql(ns)).await?;
                Ok(rows.len())
            }
            IntrospectStep::Types => {
                let rows = run(client, step, &composite_types_sql(ns)).await?;
                let mut grouped: BTreeMap<String, Vec<CompositeAttribute>> = BTreeMap::new();
                for row in &rows {
                    let Ok(type_name) = row.require("type_name") else { continue };
                    grouped
                        .entry(type_name.to_string())
                        .or_default()
                        .push(CompositeAttribute {
                            name: row.get("attr_name").unwrap_or("").to_string(),
                            type_name: row.get("attr_type").unwrap_or("text").to_string(),
                        });
                }
                let count = grouped.len();
                for (name, attributes) in grouped {
                    schema.composite_types.push(CompositeType {
                        name,
                        schema: ns.to_string(),
                        attributes,
                        token: None,
                    });
                }
                // Domains are user-defined types as well.
                let rows = run(client, step, &domains_sql(ns)).await?;
                for row in &rows {
                    let Ok(name) = row.require("name") else { continue };
                    schema.domains.push(Domain {
                        name: name.to_string(),
                        schema: ns.to_string(),
                        base_type: row.get("base_type").unwrap_or("text").to_string(),
                        not_null: row.get_bool("not_null"),
                        default: row.get("default_expr").map(|s| s.to_string()),
                        check: row
                            .get("check_clause")
                            .map(|s| s.trim_start_matches("CHECK ").trim().to_string()),
                        token: None,
                    });
                }
                Ok(count + schema.domains.len())
            }
        }
    }
}

async fn run(
    client: &dyn SchemaClient,
    step: IntrospectStep,
    sql: &str,
) -> Result<Vec<Row>, SyncError> {
    client
        .query(sql)
        .await
        .map_err(|e| fatal_step_error(step, e))
}
