//! Sync controller
//!
//! End-to-end orchestration behind `pull`, `diff`, `push`, and `sync`.
//! Ordering within one sync is fixed: introspection completes before
//! validation, validation before diffing, diffing before codegen,
//! codegen before the snapshot save. The source file is written before
//! the snapshot, so an interrupted sync leaves a stale snapshot and a
//! valid source file — never the reverse.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::codegen::{self, CodegenOutput, tokens::TokenGenerator};
use crate::config::Config;
use crate::diff::{Change, compare_schemas};
use crate::dialect::{Dialect, registry};
use crate::error::SyncError;
use crate::ignore::IgnoreFile;
use crate::introspect::{
    CancelToken, Introspector, ProgressSink, SchemaClient, mysql::MysqlIntrospector,
    postgres::PostgresIntrospector, sqlite::SqliteIntrospector,
};
use crate::ir::Schema;
use crate::snapshot::{self, SnapshotStore};
use crate::source::parse_source;
use crate::validate;

/// One change translated to SQL for the external executor.
#[derive(Debug)]
pub struct AppliedChange {
    pub change: Change,
    pub sql: String,
}

/// What `push` hands back: SQL for every renderable change, plus the
/// changes this dialect has no SQL counterpart for.
#[derive(Debug, Default)]
pub struct PushOutcome {
    pub applied: Vec<AppliedChange>,
    pub skipped: Vec<Change>,
}

/// Composed result of `sync`.
#[derive(Debug)]
pub struct SyncOutcome {
    pub pulled: bool,
    pub push: Option<PushOutcome>,
}

pub struct SyncController {
    project_root: PathBuf,
    config: Config,
    dialect: Dialect,
    store: SnapshotStore,
    introspector: Box<dyn Introspector>,
    tokens: TokenGenerator,
    pub cancel: CancelToken,
}

impl SyncController {
    pub fn new(project_root: impl Into<PathBuf>, config: Config) -> Result<Self, SyncError> {
        let project_root = project_root.into();
        let dialect = config.dialect();
        // Resolving the adapter up front surfaces registry problems
        // before any I/O happens.
        registry::adapter(dialect)?;

        Ok(Self {
            store: SnapshotStore::new(&project_root),
            introspector: introspector_for(dialect),
            tokens: TokenGenerator::new(),
            cancel: CancelToken::new(),
            project_root,
            config,
            dialect,
        })
    }

    /// Test-only hook: seed the token generator for deterministic output.
    pub fn with_seeded_tokens(mut self, clock: u64) -> Self {
        self.tokens = TokenGenerator::seeded(clock);
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn schema_file_path(&self) -> PathBuf {
        self.project_root.join(&self.config.sync.schema_file)
    }

    /// Introspect the remote, apply ignore patterns, and carry tokens
    /// over from the parsed local source. The shared front half of
    /// pull/diff/push.
    async fn load_remote(
        &mut self,
        client: &dyn SchemaClient,
        progress: &mut dyn ProgressSink,
    ) -> Result<(Schema, Option<Schema>), SyncError> {
        self.introspector.test_connection(client).await?;

        let namespace = self.config.connection.namespace.clone();
        let outcome = self
            .introspector
            .introspect(client, &namespace, progress, &self.cancel)
            .await?;
        for diagnostic in &outcome.diagnostics {
            warn!(message = %diagnostic.message, location = ?diagnostic.location, "introspection diagnostic");
        }
        let mut remote = outcome.schema;

        match IgnoreFile::load(&self.project_root)? {
            Some(ignore) => {
                for diagnostic in &ignore.diagnostics {
                    warn!(message = %diagnostic.message, "ignore file");
                }
                ignore.apply(&mut remote);
            }
            None => debug!("no ignore file present"),
        }

        let parsed = self.parse_local_source()?;
        if let Some(parsed) = &parsed {
            snapshot::copy_tokens(parsed, &mut remote);
        }

        Ok((remote, parsed))
    }

    fn parse_local_source(&self) -> Result<Option<Schema>, SyncError> {
        let path = self.schema_file_path();
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&path)?;
        Ok(Some(parse_source(&text).schema))
    }

    /// The companion-file guard: function or trigger definitions inside
    /// the main schema file stop the sync unless `force` is set.
    fn check_companion_guard(&self) -> Result<(), SyncError> {
        let path = self.schema_file_path();
        if !path.exists() || self.config.sync.force {
            return Ok(());
        }
        let text = fs::read_to_string(&path)?;
        let parsed = parse_source(&text);
        if parsed.has_function_defs || parsed.has_trigger_defs {
            return Err(SyncError::Fatal {
                reason: format!(
                    "schema file '{}' contains function or trigger definitions",
                    self.config.sync.schema_file.display()
                ),
                hint: Some(
                    "move them to the companion files (functions.rs / triggers.rs) or set \
                     sync.force"
                        .to_string(),
                ),
            });
        }
        Ok(())
    }

    /// Pull the remote schema into the local source file and snapshot.
    pub async fn pull(
        &mut self,
        client: &dyn SchemaClient,
        progress: &mut dyn ProgressSink,
    ) -> Result<(), SyncError> {
        self.store.init_repository()?;

        let (remote, parsed) = self.load_remote(client, progress).await?;

        // Incremental case: nothing changed against the snapshot means
        // nothing to write.
        if let Some(local) = self.store.load_snapshot()?
            && self.schema_file_path().exists()
        {
            let changes = compare_schemas(&local, &remote);
            if changes.is_empty() {
                debug!("no schema changes; source file left untouched");
                self.write_types_stub(&remote)?;
                return Ok(());
            }
            debug!(count = changes.len(), "changes detected against snapshot");
        }

        self.check_companion_guard()?;

        let report = validate::validate_schema(&remote, self.dialect)?;
        for diagnostic in &report.diagnostics {
            warn!(
                code = ?diagnostic.code,
                severity = %diagnostic.severity,
                message = %diagnostic.message,
                "validation"
            );
        }

        let output = codegen::generate(&remote, &self.config.codegen, parsed.as_ref(), &mut self.tokens);
        self.write_sources(&output)?;

        // Snapshot write comes last; a crash in between leaves a stale
        // snapshot and a valid source file for the next pull.
        self.store.save_snapshot(&output.schema)?;
        self.store
            .save_file_hash(&SnapshotStore::hash_file_content(&output.source))?;
        Ok(())
    }

    /// Compute the change set without writing anything.
    pub async fn diff(
        &mut self,
        client: &dyn SchemaClient,
        progress: &mut dyn ProgressSink,
    ) -> Result<Vec<Change>, SyncError> {
        let (remote, parsed) = self.load_remote(client, progress).await?;

        let local = match self.store.load_snapshot()? {
            Some(snapshot) => snapshot,
            None => parsed.unwrap_or_default(),
        };
        Ok(compare_schemas(&local, &remote))
    }

    /// Translate local-vs-remote changes into SQL for the executor.
    /// Confirmation and execution belong to the CLI collaborator.
    pub async fn push(
        &mut self,
        client: &dyn SchemaClient,
        progress: &mut dyn ProgressSink,
    ) -> Result<PushOutcome, SyncError> {
        let (remote, parsed) = self.load_remote(client, progress).await?;

        let local = match self.store.load_snapshot()? {
            Some(snapshot) => snapshot,
            None => parsed.ok_or_else(|| SyncError::Fatal {
                reason: "nothing to push: no snapshot and no schema source file".to_string(),
                hint: Some("run pull first, or create the schema file".to_string()),
            })?,
        };

        let adapter = registry::adapter(self.dialect)?;
        let changes = compare_schemas(&remote, &local);

        let mut outcome = PushOutcome::default();
        for change in changes {
            match adapter.render_change(&change) {
                Some(sql) => outcome.applied.push(AppliedChange { change, sql }),
                None => outcome.skipped.push(change),
            }
        }
        Ok(outcome)
    }

    /// Sequential pull then push; either side can be suppressed.
    pub async fn sync(
        &mut self,
        client: &dyn SchemaClient,
        progress: &mut dyn ProgressSink,
        do_pull: bool,
        do_push: bool,
    ) -> Result<SyncOutcome, SyncError> {
        if do_pull {
            self.pull(client, progress).await?;
        }
        let push = if do_push {
            Some(self.push(client, progress).await?)
        } else {
            None
        };
        Ok(SyncOutcome {
            pulled: do_pull,
            push,
        })
    }

    fn write_sources(&self, output: &CodegenOutput) -> Result<(), SyncError> {
        write_file(&self.schema_file_path(), &output.source)?;
        if let Some(functions) = &output.functions_source {
            write_file(
                &self.project_root.join(&self.config.sync.functions_file),
                functions,
            )?;
        }
        if let Some(triggers) = &output.triggers_source {
            write_file(
                &self.project_root.join(&self.config.sync.triggers_file),
                triggers,
            )?;
        }
        if let Some(types) = &output.types_source {
            write_file(&self.project_root.join(&self.config.sync.types_file), types)?;
        }
        Ok(())
    }

    /// Refresh the type-stub companion on an otherwise-empty pull.
    fn write_types_stub(&self, schema: &Schema) -> Result<(), SyncError> {
        if schema.composite_types.is_empty() && schema.enums.is_empty() {
            return Ok(());
        }
        let output = codegen::generate(
            schema,
            &self.config.codegen,
            None,
            &mut TokenGenerator::seeded(0),
        );
        if let Some(types) = &output.types_source {
            write_file(&self.project_root.join(&self.config.sync.types_file), types)?;
        }
        Ok(())
    }
}

fn introspector_for(dialect: Dialect) -> Box<dyn Introspector> {
    if dialect.is_mysql_family() {
        Box::new(MysqlIntrospector::new(dialect))
    } else if dialect.is_sqlite_family() {
        Box::new(SqliteIntrospector::new(dialect))
    } else {
        Box::new(PostgresIntrospector::new(dialect))
    }
}

fn write_file(path: &Path, contents: &str) -> Result<(), SyncError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)?;
    Ok(())
}

#[cfg(test)]
mod tests;
