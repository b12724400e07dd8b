//! MySQL-family introspection
//!
//! information_schema is the only catalog surface here. Steps with no
//! MySQL counterpart (enums as named types, extensions, composite types,
//! foreign servers) skip per the dialect profile.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tracing::debug;

use crate::diagnostics::Diagnostic;
use crate::dialect::{Dialect, registry};
use crate::error::SyncError;
use crate::introspect::{
    CancelToken, IntrospectOutcome, IntrospectStep, Introspector, ProgressSink, Row, SchemaClient,
    StepStatus, fatal_step_error,
};
use crate::ir::{
    Column, Constraint, Index, IndexMethod, Schema, Table, Trigger, TriggerEvent, TriggerForEach,
    TriggerTiming,
};

pub struct MysqlIntrospector {
    dialect: Dialect,
}

impl MysqlIntrospector {
    pub fn new(dialect: Dialect) -> Self {
        debug_assert!(dialect.is_mysql_family());
        Self { dialect }
    }
}

fn lit(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn tables_sql(ns: &str) -> String {
    format!(
        "SELECT table_name, table_comment AS comment FROM information_schema.tables \
         WHERE table_schema = {} AND table_type = 'BASE TABLE' ORDER BY table_name",
        lit(ns)
    )
}

fn columns_sql(ns: &str) -> String {
    format!(
        "SELECT table_name, column_name, data_type, is_nullable, column_default, \
                character_maximum_length, numeric_precision, numeric_scale, extra, \
                column_comment AS comment \
         FROM information_schema.columns WHERE table_schema = {} \
         ORDER BY table_name, ordinal_position",
        lit(ns)
    )
}

fn constraints_sql(ns: &str) -> String {
    format!(
        "SELECT tc.table_name, tc.constraint_name, tc.constraint_type, \
                group_concat(kcu.column_name ORDER BY kcu.ordinal_position) AS columns, \
                kcu.referenced_table_name AS ref_table, \
                group_concat(kcu.referenced_column_name ORDER BY kcu.ordinal_position) AS ref_columns \
         FROM information_schema.table_constraints tc \
         JOIN information_schema.key_column_usage kcu USING (constraint_schema, constraint_name, table_name) \
         WHERE tc.table_schema = {} \
         GROUP BY tc.table_name, tc.constraint_name, tc.constraint_type, kcu.referenced_table_name",
        lit(ns)
    )
}

fn indexes_sql(ns: &str) -> String {
    format!(
        "SELECT table_name, index_name, group_concat(column_name ORDER BY seq_in_index) AS columns, \
                MIN(non_unique) AS non_unique, index_type \
         FROM information_schema.statistics WHERE table_schema = {} \
         GROUP BY table_name, index_name, index_type ORDER BY table_name, index_name",
        lit(ns)
    )
}

fn checks_sql(ns: &str) -> String {
    format!(
        "SELECT cc.constraint_name, tc.table_name, cc.check_clause AS expression \
         FROM information_schema.check_constraints cc \
         JOIN information_schema.table_constraints tc USING (constraint_schema, constraint_name) \
         WHERE cc.constraint_schema = {}",
        lit(ns)
    )
}

fn triggers_sql(ns: &str) -> String {
    format!(
        "SELECT trigger_name AS name, event_object_table AS table_name, action_timing AS timing, \
                event_manipulation AS events, action_orientation AS for_each \
         FROM information_schema.triggers WHERE trigger_schema = {} \
         ORDER BY event_object_table, trigger_name",
        lit(ns)
    )
}

fn partitions_sql(ns: &str) -> String {
    format!(
        "SELECT table_name, partition_method, partition_expression, partition_name \
         FROM information_schema.partitions \
         WHERE table_schema = {} AND partition_name IS NOT NULL \
         ORDER BY table_name, partition_ordinal_position",
        lit(ns)
    )
}

fn column_from_row(row: &Row) -> Column {
    let mut column = Column::new(
        row.get("column_name").unwrap_or("").to_string(),
        row.get("data_type").unwrap_or("text").to_lowercase(),
    );
    column.nullable = row.get_bool("is_nullable");
    column.default = row.get("column_default").map(|s| s.to_string());
    let base = crate::normalize::base_type(&column.type_name);
    if matches!(base.as_str(), "varchar" | "char" | "binary" | "varbinary") {
        column.max_length = row.get_u32("character_maximum_length");
    }
    if matches!(base.as_str(), "decimal" | "numeric") {
        column.precision = row.get_u32("numeric_precision");
        column.scale = row.get_u32("numeric_scale");
    }
    if matches!(row.get("extra"), Some(extra) if extra.contains("auto_increment")) {
        column.default = Some("auto_increment".to_string());
    }
    column.comment = row
        .get("comment")
        .filter(|c| !c.is_empty())
        .map(|s| s.to_string());
    column
}

#[async_trait]
impl Introspector for MysqlIntrospector {
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
        let rows = client
            .query(
                "SELECT schema_name AS name FROM information_schema.schemata \
                 WHERE schema_name NOT IN ('mysql', 'sys', 'performance_schema', 'information_schema') \
                 ORDER BY schema_name",
            )
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
        let mut progress = crate::introspect::NullProgress;
        let cancel = CancelToken::new();
        let outcome = self
            .introspect(client, namespace, &mut progress, &cancel)
            .await?;
        outcome
            .schema
            .get_table(table)
            .cloned()
            .ok_or_else(|| SyncError::Introspection {
                step: "tables".to_string(),
                message: format!("table '{table}' not found in schema '{namespace}'"),
            })
    }

    async fn introspect(
        &self,
        client: &dyn SchemaClient,
        namespace: &str,
        progress: &mut dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<IntrospectOutcome, SyncError> {
        let adapter = registry::adapter(self.dialect)?;
        let skipped = adapter.skipped_introspection_steps();

        let mut schema = Schema::new();
        let diagnostics: Vec<Diagnostic> = Vec::new();
        let mut counts: BTreeMap<&'static str, usize> = BTreeMap::new();

        for step in IntrospectStep::ALL {
            cancel.check(step.key())?;

            // Steps with no information_schema counterpart skip even when
            // the profile is silent about them.
            let no_counterpart = matches!(
                step,
                IntrospectStep::Extensions | IntrospectStep::Collations
            );
            if skipped.contains(&step) || no_counterpart {
                debug!(step = step.key(), "introspection step skipped");
                progress.step_finished(step, StepStatus::Skipped);
                continue;
            }

            let count = self
                .run_step(step, client, namespace, &mut schema)
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

impl MysqlIntrospector {
    async fn run_step(
        &self,
        step: IntrospectStep,
        client: &dyn SchemaClient,
        ns: &str,
        schema: &mut Schema,
    ) -> Result<usize, SyncError> {
        let run = |sql: String| async move {
            client
                .query(&sql)
                .await
                .map_err(|e| fatal_step_error(step, e))
        };

        match step {
            IntrospectStep::Tables => {
                for row in &run(tables_sql(ns)).await? {
                    let Some(name) = row.get("table_name") else { continue };
                    let mut table = Table::new(name);
                    table.schema = ns.to_string();
                    table.comment = row
                        .get("comment")
                        .filter(|c| !c.is_empty())
                        .map(|s| s.to_string());
                    schema.insert_table(table);
                }
                Ok(schema.tables.len())
            }
            IntrospectStep::Columns => {
                let mut count = 0;
                for row in &run(columns_sql(ns)).await? {
                    let table_name = row.get("table_name").unwrap_or("");
                    if let Some(table) = schema.get_table_mut(table_name) {
                        table.columns.push(column_from_row(row));
                        count += 1;
                    }
                }
                Ok(count)
            }
            IntrospectStep::Constraints => {
                let mut count = 0;
                for row in &run(constraints_sql(ns)).await? {
                    let table_name = row.get("table_name").unwrap_or("").to_string();
                    let name = row.get("constraint_name").map(|s| s.to_string());
                    let columns: Vec<String> = row
                        .get("columns")
                        .unwrap_or("")
                        .split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect();
                    let constraint = match row.get("constraint_type") {
                        Some("PRIMARY KEY") => Constraint::PrimaryKey {
                            name,
                            columns,
                            token: None,
                        },
                        Some("UNIQUE") => Constraint::Unique {
                            name,
                            columns,
                            token: None,
                        },
                        Some("FOREIGN KEY") => Constraint::ForeignKey {
                            name,
                            columns,
                            ref_table: row.get("ref_table").unwrap_or("").to_string(),
                            ref_columns: row
                                .get("ref_columns")
                                .unwrap_or("")
                                .split(',')
                                .map(|s| s.trim().to_string())
                                .filter(|s| !s.is_empty())
                                .collect(),
                            on_delete: None,
                            on_update: None,
                            match_mode: None,
                            deferrable: false,
                            initially_deferred: false,
                            token: None,
                        },
                        _ => continue,
                    };
                    if let Some(table) = schema.get_table_mut(&table_name) {
                        if let Constraint::PrimaryKey { columns, .. } = &constraint {
                            for col_name in columns {
                                if let Some(col) = table.get_column_mut(col_name) {
                                    col.primary_key = true;
                                    col.nullable = false;
                                }
                            }
                        }
                        table.constraints.push(constraint);
                        count += 1;
                    }
                }
                Ok(count)
            }
            IntrospectStep::Indexes => {
                let mut count = 0;
                for row in &run(indexes_sql(ns)).await? {
                    let table_name = row.get("table_name").unwrap_or("").to_string();
                    let Some(index_name) = row.get("index_name") else { continue };
                    if index_name == "PRIMARY" {
                        continue;
                    }
                    let mut index = Index::new(
                        index_name.to_string(),
                        row.get("columns")
                            .unwrap_or("")
                            .split(',')
                            .map(|s| s.trim().to_string())
                            .filter(|s| !s.is_empty())
                            .collect(),
                    );
                    index.unique = row.get("non_unique") == Some("0");
                    index.method = match row.get("index_type") {
                        Some("HASH") => IndexMethod::Hash,
                        _ => IndexMethod::Btree,
                    };
                    if let Some(table) = schema.get_table_mut(&table_name) {
                        table.indexes.push(index);
                        count += 1;
                    }
                }
                Ok(count)
            }
            IntrospectStep::Checks => {
                let mut count = 0;
                for row in &run(checks_sql(ns)).await? {
                    let table_name = row.get("table_name").unwrap_or("").to_string();
                    let Some(expression) = row.get("expression") else { continue };
                    if let Some(table) = schema.get_table_mut(&table_name) {
                        table.constraints.push(Constraint::Check {
                            name: row.get("constraint_name").map(|s| s.to_string()),
                            columns: vec![],
                            expression: expression.to_string(),
                            token: None,
                        });
                        count += 1;
                    }
                }
                Ok(count)
            }
            IntrospectStep::Partitions => {
                // MySQL reports one row per partition; the IR keeps the
                // method plus child names, bounds are engine-internal.
                let mut count = 0;
                for row in &run(partitions_sql(ns)).await? {
                    let table_name = row.get("table_name").unwrap_or("").to_string();
                    let Some(partition_name) = row.get("partition_name") else { continue };
                    let partition_type = match row.get("partition_method") {
                        Some("RANGE" | "RANGE COLUMNS") => crate::ir::PartitionType::Range,
                        Some("LIST" | "LIST COLUMNS") => crate::ir::PartitionType::List,
                        Some("HASH" | "KEY" | "LINEAR HASH" | "LINEAR KEY") => {
                            crate::ir::PartitionType::Hash
                        }
                        _ => continue,
                    };
                    if let Some(table) = schema.get_table_mut(&table_name) {
                        let spec = table.partition.get_or_insert_with(|| crate::ir::PartitionSpec {
                            partition_type,
                            partition_key: row
                                .get("partition_expression")
                                .map(|e| vec![e.trim_matches('`').to_string()])
                                .unwrap_or_default(),
                            partitions: vec![],
                        });
                        spec.partitions.push(crate::ir::PartitionChild {
                            name: partition_name.to_string(),
                            bound: String::new(),
                            bound_type: None,
                        });
                        count += 1;
                    }
                }
                Ok(count)
            }
            IntrospectStep::Triggers => {
                for row in &run(triggers_sql(ns)).await? {
                    let timing = match row.get("timing") {
                        Some("BEFORE") => TriggerTiming::Before,
                        Some("AFTER") => TriggerTiming::After,
                        _ => continue,
                    };
                    let events = match row.get("events") {
                        Some("INSERT") => vec![TriggerEvent::Insert],
                        Some("UPDATE") => vec![TriggerEvent::Update],
                        Some("DELETE") => vec![TriggerEvent::Delete],
                        _ => vec![],
                    };
                    schema.triggers.push(Trigger {
                        name: row.get("name").unwrap_or("").to_string(),
                        table: row.get("table_name").unwrap_or("").to_string(),
                        timing,
                        events,
                        for_each: TriggerForEach::Row,
                        function_name: String::new(),
                        token: None,
                    });
                }
                Ok(schema.triggers.len())
            }
            // Functions exist (stored routines) but carry no IR mapping
            // the differ consumes on this family yet.
            IntrospectStep::Functions
            | IntrospectStep::Enums
            | IntrospectStep::Extensions
            | IntrospectStep::Collations
            | IntrospectStep::ForeignServers
            | IntrospectStep::ForeignTables
            | IntrospectStep::Types => Ok(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::introspect::{ClientError, CollectingProgress};

    struct MiniClient;

    #[async_trait]
    impl SchemaClient for MiniClient {
        async fn ping(&self) -> Result<(), ClientError> {
            Ok(())
        }

        async fn query(&self, sql: &str) -> Result<Vec<Row>, ClientError> {
            if sql.contains("table_type = 'BASE TABLE'") {
                return Ok(vec![Row::new().with("table_name", "orders").with("comment", "")]);
            }
            if sql.contains("information_schema.columns") {
                return Ok(vec![
                    Row::new()
                        .with("table_name", "orders")
                        .with("column_name", "id")
                        .with("data_type", "bigint")
                        .with("is_nullable", "NO")
                        .with("extra", "auto_increment"),
                ]);
            }
            Ok(vec![])
        }

        async fn execute(&self, _sql: &str) -> Result<u64, ClientError> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn test_mysql_introspection_skips_postgres_only_steps() {
        let introspector = MysqlIntrospector::new(Dialect::MySql);
        let mut progress = CollectingProgress::default();
        let cancel = CancelToken::new();

        let outcome = introspector
            .introspect(&MiniClient, "shop", &mut progress, &cancel)
            .await
            .unwrap();

        let orders = outcome.schema.get_table("orders").unwrap();
        assert_eq!(orders.columns[0].default.as_deref(), Some("auto_increment"));

        let skipped: Vec<&str> = progress
            .events
            .iter()
            .filter(|(_, s)| *s == StepStatus::Skipped)
            .map(|(step, _)| step.key())
            .collect();
        assert!(skipped.contains(&"extensions"));
        assert!(skipped.contains(&"collations"));
        assert!(skipped.contains(&"foreign_servers"));
        assert!(!outcome.counts.contains_key("extensions"));
    }
}
