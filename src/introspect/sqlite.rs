//! SQLite-family introspection
//!
//! Everything lives in `sqlite_master` plus the pragma table-valued
//! functions. Most of the step sequence has no SQLite counterpart and
//! reports as skipped.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tracing::debug;

use crate::dialect::{Dialect, registry};
use crate::error::SyncError;
use crate::introspect::{
    CancelToken, IntrospectOutcome, IntrospectStep, Introspector, ProgressSink, Row, SchemaClient,
    StepStatus, fatal_step_error,
};
use crate::ir::{Column, Constraint, Index, Schema, Table, Trigger, TriggerEvent, TriggerForEach, TriggerTiming};

pub struct SqliteIntrospector {
    dialect: Dialect,
}

impl SqliteIntrospector {
    pub fn new(dialect: Dialect) -> Self {
        debug_assert!(dialect.is_sqlite_family());
        Self { dialect }
    }
}

fn lit(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn tables_sql() -> &'static str {
    "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name"
}

fn table_info_sql(table: &str) -> String {
    format!("SELECT * FROM pragma_table_info({})", lit(table))
}

fn index_list_sql(table: &str) -> String {
    format!("SELECT * FROM pragma_index_list({})", lit(table))
}

fn index_info_sql(index: &str) -> String {
    format!("SELECT * FROM pragma_index_info({})", lit(index))
}

fn foreign_keys_sql(table: &str) -> String {
    format!("SELECT * FROM pragma_foreign_key_list({})", lit(table))
}

fn triggers_sql() -> &'static str {
    "SELECT name, tbl_name, sql FROM sqlite_master WHERE type = 'trigger' ORDER BY tbl_name, name"
}

#[async_trait]
impl Introspector for SqliteIntrospector {
    async fn test_connection(&self, client: &dyn SchemaClient) -> Result<(), SyncError> {
        client
            .ping()
            .await
            .map_err(|e| SyncError::Connectivity(e.to_string()))
    }

    async fn database_version(&self, client: &dyn SchemaClient) -> Result<String, SyncError> {
        let rows = client
            .query("SELECT sqlite_version() AS version")
            .await
            .map_err(|e| fatal_step_error(IntrospectStep::Tables, e))?;
        Ok(rows
            .first()
            .and_then(|r| r.get("version"))
            .unwrap_or("unknown")
            .to_string())
    }

    async fn list_schemas(&self, _client: &dyn SchemaClient) -> Result<Vec<String>, SyncError> {
        // A SQLite file is one namespace.
        Ok(vec!["main".to_string()])
    }

    async fn list_tables(
        &self,
        client: &dyn SchemaClient,
        _namespace: &str,
    ) -> Result<Vec<String>, SyncError> {
        let rows = client
            .query(tables_sql())
            .await
            .map_err(|e| fatal_step_error(IntrospectStep::Tables, e))?;
        Ok(rows
            .iter()
            .filter_map(|r| r.get("name").map(|s| s.to_string()))
            .collect())
    }

    async fn introspect_table(
        &self,
        client: &dyn SchemaClient,
        _namespace: &str,
        table: &str,
    ) -> Result<Table, SyncError> {
        let mut result = Table::new(table);
        result.schema = "main".to_string();
        self.fill_columns(client, &mut result).await?;
        self.fill_indexes(client, &mut result).await?;
        self.fill_foreign_keys(client, &mut result).await?;
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
        let skipped = adapter.skipped_introspection_steps();

        let mut schema = Schema::new();
        let mut counts: BTreeMap<&'static str, usize> = BTreeMap::new();

        for step in IntrospectStep::ALL {
            cancel.check(step.key())?;

            let no_counterpart = matches!(
                step,
                IntrospectStep::Checks
                    | IntrospectStep::Extensions
                    | IntrospectStep::Collations
                    | IntrospectStep::ForeignServers
                    | IntrospectStep::ForeignTables
            );
            if skipped.contains(&step) || no_counterpart {
                debug!(step = step.key(), "introspection step skipped");
                progress.step_finished(step, StepStatus::Skipped);
                continue;
            }

            let count = match step {
                IntrospectStep::Tables => {
                    let rows = client
                        .query(tables_sql())
                        .await
                        .map_err(|e| fatal_step_error(step, e))?;
                    for row in &rows {
                        let Some(name) = row.get("name") else { continue };
                        let mut table = Table::new(name);
                        table.schema = namespace.to_string();
                        schema.insert_table(table);
                    }
                    schema.tables.len()
                }
                IntrospectStep::Columns => {
                    let names: Vec<String> = schema.tables.keys().cloned().collect();
                    let mut count = 0;
                    for name in names {
                        let Some(mut table) = schema.remove_table(&name) else { continue };
                        self.fill_columns(client, &mut table).await?;
                        count += table.columns.len();
                        schema.insert_table(table);
                    }
                    count
                }
                IntrospectStep::Constraints => {
                    let names: Vec<String> = schema.tables.keys().cloned().collect();
                    let mut count = 0;
                    for name in names {
                        let Some(mut table) = schema.remove_table(&name) else { continue };
                        self.fill_foreign_keys(client, &mut table).await?;
                        count += table.constraints.len();
                        schema.insert_table(table);
                    }
                    count
                }
                IntrospectStep::Indexes => {
                    let names: Vec<String> = schema.tables.keys().cloned().collect();
                    let mut count = 0;
                    for name in names {
                        let Some(mut table) = schema.remove_table(&name) else { continue };
                        self.fill_indexes(client, &mut table).await?;
                        count += table.indexes.len();
                        schema.insert_table(table);
                    }
                    count
                }
                IntrospectStep::Triggers => {
                    let rows = client
                        .query(triggers_sql())
                        .await
                        .map_err(|e| fatal_step_error(step, e))?;
                    for row in &rows {
                        if let Some(trigger) = trigger_from_sql(
                            row.get("name").unwrap_or(""),
                            row.get("tbl_name").unwrap_or(""),
                            row.get("sql").unwrap_or(""),
                        ) {
                            schema.triggers.push(trigger);
                        }
                    }
                    schema.triggers.len()
                }
                _ => 0,
            };

            counts.insert(step.key(), count);
            progress.step_finished(step, StepStatus::Completed { count });
        }

        Ok(IntrospectOutcome {
            schema,
            diagnostics: Vec::new(),
            counts,
        })
    }
}

impl SqliteIntrospector {
    async fn fill_columns(
        &self,
        client: &dyn SchemaClient,
        table: &mut Table,
    ) -> Result<(), SyncError> {
        let rows = client
            .query(&table_info_sql(&table.name))
            .await
            .map_err(|e| fatal_step_error(IntrospectStep::Columns, e))?;
        let mut pk_columns = Vec::new();
        for row in &rows {
            let Some(name) = row.get("name") else { continue };
            let mut column = Column::new(name, row.get("type").unwrap_or("text").to_lowercase());
            column.nullable = row.get("notnull") != Some("1");
            column.default = row.get("dflt_value").map(|s| s.to_string());
            if row.get_i64("pk").unwrap_or(0) > 0 {
                column.primary_key = true;
                column.nullable = false;
                pk_columns.push(column.name.clone());
            }
            table.columns.push(column);
        }
        if !pk_columns.is_empty() {
            table.constraints.push(Constraint::PrimaryKey {
                name: None,
                columns: pk_columns,
                token: None,
            });
        }
        Ok(())
    }

    async fn fill_indexes(
        &self,
        client: &dyn SchemaClient,
        table: &mut Table,
    ) -> Result<(), SyncError> {
        let rows = client
            .query(&index_list_sql(&table.name))
            .await
            .map_err(|e| fatal_step_error(IntrospectStep::Indexes, e))?;
        for row in &rows {
            let Some(index_name) = row.get("name") else { continue };
            // Autoindexes back PK/UNIQUE column flags, not standalone objects.
            if index_name.starts_with("sqlite_autoindex") {
                continue;
            }
            let info = client
                .query(&index_info_sql(index_name))
                .await
                .map_err(|e| fatal_step_error(IntrospectStep::Indexes, e))?;
            let columns: Vec<String> = info
                .iter()
                .filter_map(|r| r.get("name").map(|s| s.to_string()))
                .collect();
            let mut index = Index::new(index_name.to_string(), columns);
            index.unique = row.get("unique") == Some("1");
            table.indexes.push(index);
        }
        Ok(())
    }

    async fn fill_foreign_keys(
        &self,
        client: &dyn SchemaClient,
        table: &mut Table,
    ) -> Result<(), SyncError> {
        let rows = client
            .query(&foreign_keys_sql(&table.name))
            .await
            .map_err(|e| fatal_step_error(IntrospectStep::Constraints, e))?;
        for row in &rows {
            let Some(ref_table) = row.get("table") else { continue };
            table.constraints.push(Constraint::ForeignKey {
                name: None,
                columns: row.get("from").map(|s| vec![s.to_string()]).unwrap_or_default(),
                ref_table: ref_table.to_string(),
                ref_columns: row.get("to").map(|s| vec![s.to_string()]).unwrap_or_default(),
                on_delete: None,
                on_update: None,
                match_mode: None,
                deferrable: false,
                initially_deferred: false,
                token: None,
            });
        }
        Ok(())
    }
}

/// Recover timing/event/target from a stored `CREATE TRIGGER` statement.
fn trigger_from_sql(name: &str, table: &str, sql: &str) -> Option<Trigger> {
    let upper = sql.to_uppercase();
    let timing = if upper.contains("INSTEAD OF") {
        TriggerTiming::InsteadOf
    } else if upper.contains("BEFORE") {
        TriggerTiming::Before
    } else {
        TriggerTiming::After
    };
    let mut events = Vec::new();
    for (keyword, event) in [
        ("INSERT", TriggerEvent::Insert),
        ("UPDATE", TriggerEvent::Update),
        ("DELETE", TriggerEvent::Delete),
    ] {
        if upper.contains(keyword) {
            events.push(event);
        }
    }
    if events.is_empty() {
        return None;
    }
    Some(Trigger {
        name: name.to_string(),
        table: table.to_string(),
        timing,
        events,
        for_each: TriggerForEach::Row,
        function_name: String::new(),
        token: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::introspect::{ClientError, CollectingProgress};

    struct FileClient;

    #[async_trait]
    impl SchemaClient for FileClient {
        async fn ping(&self) -> Result<(), ClientError> {
            Ok(())
        }

        async fn query(&self, sql: &str) -> Result<Vec<Row>, ClientError> {
            if sql.contains("type = 'table'") {
                return Ok(vec![Row::new().with("name", "notes")]);
            }
            if sql.contains("pragma_table_info") {
                return Ok(vec![
                    Row::new()
                        .with("name", "id")
                        .with("type", "INTEGER")
                        .with("notnull", "1")
                        .with("pk", "1"),
                    Row::new()
                        .with("name", "body")
                        .with("type", "TEXT")
                        .with("notnull", "0")
                        .with("pk", "0"),
                ]);
            }
            Ok(vec![])
        }

        async fn execute(&self, _sql: &str) -> Result<u64, ClientError> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn test_sqlite_introspection_basics() {
        let introspector = SqliteIntrospector::new(Dialect::Sqlite);
        let mut progress = CollectingProgress::default();
        let cancel = CancelToken::new();

        let outcome = introspector
            .introspect(&FileClient, "main", &mut progress, &cancel)
            .await
            .unwrap();

        let notes = outcome.schema.get_table("notes").unwrap();
        assert_eq!(notes.columns.len(), 2);
        assert!(notes.columns[0].primary_key);
        assert!(notes.primary_key().is_some());

        let skipped: Vec<&str> = progress
            .events
            .iter()
            .filter(|(_, s)| *s == StepStatus::Skipped)
            .map(|(step, _)| step.key())
            .collect();
        assert!(skipped.contains(&"enums"));
        assert!(skipped.contains(&"partitions"));
        assert!(skipped.contains(&"functions"));
        assert!(skipped.contains(&"extensions"));
    }

    #[test]
    fn test_trigger_recovery_from_sql() {
        let trigger = trigger_from_sql(
            "notes_touch",
            "notes",
            "CREATE TRIGGER notes_touch AFTER UPDATE ON notes BEGIN UPDATE notes SET ts = 1; END",
        )
        .unwrap();
        assert_eq!(trigger.timing, TriggerTiming::After);
        assert_eq!(trigger.events, vec![TriggerEvent::Update]);
    }
}
