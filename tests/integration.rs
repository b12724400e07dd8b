//! End-to-end sync flows against a scripted driver stand-in.
//!
//! These tests run the whole controller path: introspection, ignore
//! filtering, token carry-over, diffing, codegen, snapshot persistence.

use async_trait::async_trait;
use std::sync::Mutex;

use relq_core::config::Config;
use relq_core::diff::{ChangeAction, ObjectType};
use relq_core::introspect::{ClientError, NullProgress, Row, SchemaClient};
use relq_core::snapshot::SnapshotStore;
use relq_core::sync::SyncController;

/// Scripted catalog for a small shop database: one enum, a users table
/// with an ANY-form status check, and an optionally partitioned events
/// table.
struct ShopClient {
    partitioned_events: Mutex<bool>,
}

impl ShopClient {
    fn new() -> Self {
        Self {
            partitioned_events: Mutex::new(false),
        }
    }

    fn partition_events(&self) {
        *self.partitioned_events.lock().unwrap() = true;
    }
}

#[async_trait]
impl SchemaClient for ShopClient {
    async fn ping(&self) -> Result<(), ClientError> {
        Ok(())
    }

    async fn query(&self, sql: &str) -> Result<Vec<Row>, ClientError> {
        if sql.contains("relkind IN ('r', 'p')") {
            return Ok(vec![
                Row::new().with("table_name", "events"),
                Row::new().with("table_name", "users"),
            ]);
        }
        if sql.contains("information_schema.columns") {
            return Ok(vec![
                Row::new()
                    .with("table_name", "events")
                    .with("column_name", "id")
                    .with("data_type", "bigint")
                    .with("udt_name", "int8")
                    .with("is_nullable", "NO"),
                Row::new()
                    .with("table_name", "events")
                    .with("column_name", "ts")
                    .with("data_type", "timestamp with time zone")
                    .with("udt_name", "timestamptz")
                    .with("is_nullable", "NO"),
                Row::new()
                    .with("table_name", "users")
                    .with("column_name", "id")
                    .with("data_type", "uuid")
                    .with("udt_name", "uuid")
                    .with("is_nullable", "NO")
                    .with("column_default", "gen_random_uuid()"),
                Row::new()
                    .with("table_name", "users")
                    .with("column_name", "email")
                    .with("data_type", "text")
                    .with("udt_name", "text")
                    .with("is_nullable", "NO"),
                Row::new()
                    .with("table_name", "users")
                    .with("column_name", "status")
                    .with("data_type", "USER-DEFINED")
                    .with("udt_name", "user_status")
                    .with("is_nullable", "NO")
                    .with("column_default", "'active'::user_status"),
            ]);
        }
        if sql.contains("con.contype <> 'c'") {
            return Ok(vec![
                Row::new()
                    .with("table_name", "users")
                    .with("constraint_name", "users_pkey")
                    .with("kind", "p")
                    .with("columns", "id"),
                Row::new()
                    .with("table_name", "users")
                    .with("constraint_name", "users_email_key")
                    .with("kind", "u")
                    .with("columns", "email"),
            ]);
        }
        if sql.contains("con.contype = 'c'") {
            return Ok(vec![
                Row::new()
                    .with("table_name", "users")
                    .with("constraint_name", "users_status_check")
                    .with(
                        "expression",
                        "(status)::text = ANY (ARRAY['active'::text, 'disabled'::text])",
                    ),
            ]);
        }
        if sql.contains("typtype = 'e'") {
            return Ok(vec![
                Row::new()
                    .with("name", "user_status")
                    .with("schema", "public")
                    .with("values", "active,disabled"),
            ]);
        }
        if sql.contains("pg_partitioned_table") {
            if *self.partitioned_events.lock().unwrap() {
                return Ok(vec![
                    Row::new()
                        .with("table_name", "events")
                        .with("strategy", "r")
                        .with("key_columns", "ts"),
                ]);
            }
            return Ok(vec![]);
        }
        if sql.contains("pg_inherits") {
            if *self.partitioned_events.lock().unwrap() {
                return Ok(vec![
                    Row::new()
                        .with("parent_table", "events")
                        .with("child_table", "events_2024")
                        .with("bound", "FOR VALUES FROM ('2024-01-01') TO ('2025-01-01')"),
                    Row::new()
                        .with("parent_table", "events")
                        .with("child_table", "events_2025")
                        .with("bound", "FOR VALUES FROM ('2025-01-01') TO ('2026-01-01')"),
                ]);
            }
            return Ok(vec![]);
        }
        Ok(vec![])
    }

    async fn execute(&self, _sql: &str) -> Result<u64, ClientError> {
        Ok(0)
    }
}

fn controller(root: &std::path::Path) -> SyncController {
    SyncController::new(root, Config::default())
        .unwrap()
        .with_seeded_tokens(0)
}

#[tokio::test]
async fn test_pull_then_diff_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let client = ShopClient::new();
    let mut controller = controller(dir.path());

    controller.pull(&client, &mut NullProgress).await.unwrap();

    let changes = controller.diff(&client, &mut NullProgress).await.unwrap();
    assert!(changes.is_empty(), "{changes:?}");
}

#[tokio::test]
async fn test_check_constraint_any_form_matches_in_shorthand() {
    let dir = tempfile::tempdir().unwrap();
    let client = ShopClient::new();
    let mut controller = controller(dir.path());

    controller.pull(&client, &mut NullProgress).await.unwrap();

    // The generated file folds the ANY-form check into the IN shorthand.
    let source = std::fs::read_to_string(dir.path().join("src/db/schema.rs")).unwrap();
    assert!(
        source.contains(".check(\"users_status_check\", &[\"active\", \"disabled\"])"),
        "{source}"
    );

    // Force the diff to read the local side from the parsed file: the
    // IN-form expression must still compare equal to the remote's
    // ANY-form spelling.
    std::fs::remove_file(dir.path().join(".relq/snapshot.json")).unwrap();
    let changes = controller.diff(&client, &mut NullProgress).await.unwrap();
    let spurious: Vec<_> = changes
        .iter()
        .filter(|c| c.object_type == ObjectType::Constraint)
        .collect();
    assert!(spurious.is_empty(), "{spurious:?}");
}

#[tokio::test]
async fn test_partition_transition_emits_parent_and_children() {
    let dir = tempfile::tempdir().unwrap();
    let client = ShopClient::new();
    let mut controller = controller(dir.path());

    controller.pull(&client, &mut NullProgress).await.unwrap();
    client.partition_events();

    let changes = controller.diff(&client, &mut NullProgress).await.unwrap();
    let partition_changes: Vec<_> = changes
        .iter()
        .filter(|c| {
            matches!(
                c.object_type,
                ObjectType::Partition | ObjectType::PartitionChild
            )
        })
        .collect();

    assert_eq!(partition_changes.len(), 3, "{changes:?}");
    assert_eq!(partition_changes[0].action, ChangeAction::Create);
    assert_eq!(partition_changes[0].object_type, ObjectType::Partition);
    assert_eq!(partition_changes[0].object_name, "events");
    assert_eq!(partition_changes[1].object_name, "events_2024");
    assert_eq!(partition_changes[2].object_name, "events_2025");
}

#[tokio::test]
async fn test_tokens_stay_stable_across_pulls() {
    let dir = tempfile::tempdir().unwrap();
    let client = ShopClient::new();
    let mut controller = controller(dir.path());

    controller.pull(&client, &mut NullProgress).await.unwrap();
    let first = std::fs::read_to_string(dir.path().join("src/db/schema.rs")).unwrap();

    // Remove the snapshot so the second pull regenerates from scratch;
    // tokens must come back from the existing source file, not the
    // generator.
    std::fs::remove_file(dir.path().join(".relq/snapshot.json")).unwrap();
    let mut second_controller = SyncController::new(dir.path(), Config::default())
        .unwrap()
        .with_seeded_tokens(777);
    second_controller
        .pull(&client, &mut NullProgress)
        .await
        .unwrap();
    let second = std::fs::read_to_string(dir.path().join("src/db/schema.rs")).unwrap();

    assert_eq!(first, second, "token merge keeps the file byte-identical");
}

#[tokio::test]
async fn test_snapshot_store_reflects_last_pull() {
    let dir = tempfile::tempdir().unwrap();
    let client = ShopClient::new();
    let mut controller = controller(dir.path());

    controller.pull(&client, &mut NullProgress).await.unwrap();

    let store = SnapshotStore::new(dir.path());
    let snapshot = store.load_snapshot().unwrap().unwrap();
    assert!(snapshot.has_table("users"));
    assert!(snapshot.has_table("events"));
    assert_eq!(snapshot.enums.len(), 1);
    assert_eq!(snapshot.enums[0].name, "user_status");

    let source = std::fs::read_to_string(dir.path().join("src/db/schema.rs")).unwrap();
    assert_eq!(
        store.load_file_hash().unwrap().unwrap(),
        SnapshotStore::hash_file_content(&source)
    );
    assert!(store.head().unwrap().is_some());
}

#[tokio::test]
async fn test_push_after_remote_drift_renders_reverse_sql() {
    let dir = tempfile::tempdir().unwrap();
    let client = ShopClient::new();
    let mut controller = controller(dir.path());

    controller.pull(&client, &mut NullProgress).await.unwrap();

    // Remote gains partitioning that the local snapshot does not have;
    // push transforms remote back toward local, so the partition spec
    // shows up as a drop (no SQL counterpart, hence skipped).
    client.partition_events();
    let outcome = controller.push(&client, &mut NullProgress).await.unwrap();

    assert!(
        outcome
            .skipped
            .iter()
            .any(|c| c.object_type == ObjectType::Partition),
        "{outcome:?}"
    );
}
