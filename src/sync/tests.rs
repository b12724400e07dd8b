use super::*;
use crate::introspect::{ClientError, NullProgress, Row};
use async_trait::async_trait;
use std::sync::Mutex;

/// Driver stand-in serving a small configurable schema. Column rows are
/// (table, name, type, nullable); everything else is empty.
struct StubClient {
    tables: Vec<&'static str>,
    columns: Mutex<Vec<(&'static str, &'static str, &'static str, bool)>>,
}

impl StubClient {
    fn users() -> Self {
        Self {
            tables: vec!["users"],
            columns: Mutex::new(vec![
                ("users", "id", "uuid", false),
                ("users", "email", "text", false),
            ]),
        }
    }

    fn rename_email_to_address(&self) {
        let mut columns = self.columns.lock().unwrap();
        for column in columns.iter_mut() {
            if column.1 == "email" {
                column.1 = "email_address";
            }
        }
    }

    fn add_column(&self, table: &'static str, name: &'static str, type_name: &'static str) {
        self.columns.lock().unwrap().push((table, name, type_name, true));
    }
}

#[async_trait]
impl SchemaClient for StubClient {
    async fn ping(&self) -> Result<(), ClientError> {
        Ok(())
    }

    async fn query(&self, sql: &str) -> Result<Vec<Row>, ClientError> {
        if sql.contains("relkind IN ('r', 'p')") {
            return Ok(self
                .tables
                .iter()
                .map(|t| Row::new().with("table_name", *t))
                .collect());
        }
        if sql.contains("information_schema.columns") {
            return Ok(self
                .columns
                .lock()
                .unwrap()
                .iter()
                .map(|(table, name, type_name, nullable)| {
                    Row::new()
                        .with("table_name", *table)
                        .with("column_name", *name)
                        .with("data_type", *type_name)
                        .with("udt_name", *type_name)
                        .with("is_nullable", if *nullable { "YES" } else { "NO" })
                })
                .collect());
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
async fn test_pull_writes_source_snapshot_and_hash() {
    let dir = tempfile::tempdir().unwrap();
    let client = StubClient::users();
    let mut controller = controller(dir.path());

    controller.pull(&client, &mut NullProgress).await.unwrap();

    let source_path = dir.path().join("src/db/schema.rs");
    assert!(source_path.exists());
    let source = std::fs::read_to_string(&source_path).unwrap();
    assert!(source.contains("pub fn users() -> TableDef"));
    assert!(source.contains("col(\"email\", \"text\")"));

    let store = SnapshotStore::new(dir.path());
    assert!(store.is_initialized());
    let snapshot = store.load_snapshot().unwrap().unwrap();
    assert!(snapshot.has_table("users"));
    assert!(
        snapshot
            .get_table("users")
            .unwrap()
            .get_column("email")
            .unwrap()
            .token
            .is_some(),
        "snapshot carries assigned tokens"
    );

    let hash = store.load_file_hash().unwrap().unwrap();
    assert_eq!(hash, SnapshotStore::hash_file_content(&source));
}

#[tokio::test]
async fn test_second_pull_with_no_changes_leaves_source_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let client = StubClient::users();
    let mut controller = controller(dir.path());

    controller.pull(&client, &mut NullProgress).await.unwrap();

    // A hand-added marker survives a no-change pull because nothing is
    // rewritten.
    let source_path = dir.path().join("src/db/schema.rs");
    let mut source = std::fs::read_to_string(&source_path).unwrap();
    source.push_str("\n// local note\n");
    std::fs::write(&source_path, &source).unwrap();

    controller.pull(&client, &mut NullProgress).await.unwrap();
    let after = std::fs::read_to_string(&source_path).unwrap();
    assert!(after.ends_with("// local note\n"));
}

#[tokio::test]
async fn test_diff_reports_new_column() {
    let dir = tempfile::tempdir().unwrap();
    let client = StubClient::users();
    let mut controller = controller(dir.path());

    controller.pull(&client, &mut NullProgress).await.unwrap();

    client.add_column("users", "age", "integer");
    let changes = controller.diff(&client, &mut NullProgress).await.unwrap();

    assert_eq!(changes.len(), 1, "{changes:?}");
    assert_eq!(changes[0].action, crate::diff::ChangeAction::Create);
    assert_eq!(changes[0].object_type, crate::diff::ObjectType::Column);
    assert_eq!(changes[0].object_name, "age");
}

#[tokio::test]
async fn test_diff_is_empty_after_pull() {
    let dir = tempfile::tempdir().unwrap();
    let client = StubClient::users();
    let mut controller = controller(dir.path());

    controller.pull(&client, &mut NullProgress).await.unwrap();
    let changes = controller.diff(&client, &mut NullProgress).await.unwrap();
    assert!(changes.is_empty(), "{changes:?}");
}

#[tokio::test]
async fn test_rename_detected_when_source_file_carries_the_token() {
    let dir = tempfile::tempdir().unwrap();
    let client = StubClient::users();
    let mut controller = controller(dir.path());

    controller.pull(&client, &mut NullProgress).await.unwrap();

    // The rename is already reflected in the source file (pulled on
    // another machine); the snapshot still has the old name. The token
    // in the file lets the differ see one rename, not drop+create.
    let source_path = dir.path().join("src/db/schema.rs");
    let source = std::fs::read_to_string(&source_path).unwrap();
    std::fs::write(
        &source_path,
        source.replace("col(\"email\"", "col(\"email_address\""),
    )
    .unwrap();
    client.rename_email_to_address();

    let changes = controller.diff(&client, &mut NullProgress).await.unwrap();
    assert_eq!(changes.len(), 1, "{changes:?}");
    assert_eq!(changes[0].action, crate::diff::ChangeAction::Rename);
    assert_eq!(changes[0].object_type, crate::diff::ObjectType::Column);
    assert_eq!(changes[0].object_name, "email_address");
    assert_eq!(changes[0].parent_name.as_deref(), Some("users"));
}

#[tokio::test]
async fn test_companion_guard_blocks_inline_functions() {
    let dir = tempfile::tempdir().unwrap();
    let client = StubClient::users();
    let mut controller = controller(dir.path());

    controller.pull(&client, &mut NullProgress).await.unwrap();

    // Hand-move a function definition into the schema file.
    let source_path = dir.path().join("src/db/schema.rs");
    let mut source = std::fs::read_to_string(&source_path).unwrap();
    source.push_str(
        "\npub fn touch() -> FunctionDef {\n    function(\"touch\", \"trigger\", \"plpgsql\")\n}\n",
    );
    std::fs::write(&source_path, source).unwrap();
    client.add_column("users", "age", "integer");

    let err = controller.pull(&client, &mut NullProgress).await.unwrap_err();
    match &err {
        SyncError::Fatal { reason, hint } => {
            assert!(reason.contains("function or trigger definitions"));
            assert!(hint.as_deref().unwrap().contains("companion files"));
        }
        other => panic!("expected fatal error, got {other:?}"),
    }

    // With force set, the same pull goes through.
    let mut config = Config::default();
    config.sync.force = true;
    let mut forced = SyncController::new(dir.path(), config)
        .unwrap()
        .with_seeded_tokens(1);
    forced.pull(&client, &mut NullProgress).await.unwrap();
}

#[tokio::test]
async fn test_push_renders_sql_for_local_only_objects() {
    let dir = tempfile::tempdir().unwrap();
    let client = StubClient::users();
    let mut controller = controller(dir.path());

    controller.pull(&client, &mut NullProgress).await.unwrap();

    // Add a column locally by editing the source file; push should emit
    // the ALTER TABLE for it.
    let source_path = dir.path().join("src/db/schema.rs");
    let source = std::fs::read_to_string(&source_path).unwrap();
    let edited = source.replace(
        ".column(col(\"email\", \"text\")",
        ".column(col(\"nickname\", \"text\"))\n        .column(col(\"email\", \"text\")",
    );
    std::fs::write(&source_path, edited).unwrap();

    // Refresh the snapshot from the edited file by treating the file as
    // local truth: drop the snapshot so push reads the parsed source.
    std::fs::remove_file(dir.path().join(".relq/snapshot.json")).unwrap();

    let outcome = controller.push(&client, &mut NullProgress).await.unwrap();
    assert!(
        outcome
            .applied
            .iter()
            .any(|a| a.sql.contains("ADD COLUMN \"nickname\" text")),
        "{outcome:?}"
    );
}

#[tokio::test]
async fn test_sync_composes_pull_and_push() {
    let dir = tempfile::tempdir().unwrap();
    let client = StubClient::users();
    let mut controller = controller(dir.path());

    let outcome = controller
        .sync(&client, &mut NullProgress, true, true)
        .await
        .unwrap();
    assert!(outcome.pulled);
    let push = outcome.push.unwrap();
    assert!(push.applied.is_empty(), "fresh pull means nothing to push");

    let outcome = controller
        .sync(&client, &mut NullProgress, false, false)
        .await
        .unwrap();
    assert!(!outcome.pulled);
    assert!(outcome.push.is_none());
}

#[tokio::test]
async fn test_cancellation_propagates() {
    let dir = tempfile::tempdir().unwrap();
    let client = StubClient::users();
    let mut controller = controller(dir.path());
    controller.cancel.cancel();

    let err = controller.pull(&client, &mut NullProgress).await.unwrap_err();
    assert!(matches!(err, SyncError::Cancelled(_)));
    assert!(
        !dir.path().join("src/db/schema.rs").exists(),
        "nothing was written after cancellation"
    );
}

#[tokio::test]
async fn test_ignore_file_filters_before_codegen() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(".relqignore"), "column:users.email\n").unwrap();
    let client = StubClient::users();
    let mut controller = controller(dir.path());

    controller.pull(&client, &mut NullProgress).await.unwrap();

    let source = std::fs::read_to_string(dir.path().join("src/db/schema.rs")).unwrap();
    assert!(source.contains("col(\"id\""));
    assert!(!source.contains("col(\"email\""), "{source}");
}
