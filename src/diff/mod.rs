//! Schema differ
//!
//! Compares two IR snapshots and emits an ordered change set. Tracking
//! tokens distinguish renames from drop+create; attribute comparison goes
//! through [`crate::normalize`] so synonym spellings and rewritten
//! defaults do not produce spurious changes; CHECK expressions compare at
//! the AST level via [`check_expr`].

pub mod check_expr;

use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::ir::{
    Column, CompositeType, Constraint, Domain, EnumType, Extension, Function, Index,
    PartitionChild, PartitionSpec, Schema, Sequence, Table, TrackingToken, Trigger, View,
};
use crate::normalize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeAction {
    Create,
    Drop,
    Alter,
    Rename,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObjectType {
    Extension,
    Enum,
    Domain,
    CompositeType,
    Sequence,
    Table,
    Column,
    Index,
    Constraint,
    View,
    Function,
    Trigger,
    TableComment,
    ColumnComment,
    IndexComment,
    Partition,
    PartitionChild,
}

/// Object payload carried on a change for the side(s) that exist.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangeDetail {
    Table(Table),
    Column(Column),
    Index(Index),
    Constraint(Constraint),
    Enum(EnumType),
    Domain(Domain),
    CompositeType(CompositeType),
    Sequence(Sequence),
    View(View),
    Function(Function),
    Trigger(Trigger),
    Extension(Extension),
    Partition(PartitionSpec),
    PartitionChild(PartitionChild),
    Comment(String),
}

/// A single unit of schema mutation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Change {
    pub action: ChangeAction,
    pub object_type: ObjectType,
    pub object_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<ChangeDetail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<ChangeDetail>,
    /// Owning table for nested objects (columns, indexes, constraints,
    /// comments, partitions).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_name: Option<String>,
}

impl Change {
    fn new(action: ChangeAction, object_type: ObjectType, object_name: impl Into<String>) -> Self {
        Self {
            action,
            object_type,
            object_name: object_name.into(),
            before: None,
            after: None,
            parent_name: None,
        }
    }

    fn with_parent(mut self, parent: &str) -> Self {
        self.parent_name = Some(parent.to_string());
        self
    }

    fn with_before(mut self, detail: ChangeDetail) -> Self {
        self.before = Some(detail);
        self
    }

    fn with_after(mut self, detail: ChangeDetail) -> Self {
        self.after = Some(detail);
        self
    }
}

/// Compare two schemas and produce the ordered change set transforming
/// `before` into `after`.
///
/// Output ordering: table renames, then creates of prerequisites
/// (extensions, enums, domains, composite types, sequences), entity
/// alters, table creates, per-table nested changes (columns before
/// indexes before constraints), view/function/trigger creates and
/// alters, then drops in reverse dependency order.
pub fn compare_schemas(before: &Schema, after: &Schema) -> Vec<Change> {
    let mut changes = Vec::new();

    // Table rename detection by token: a dropped name and a created name
    // carrying the same token is one rename, and the pair then diffs as a
    // common table.
    let mut renamed: Vec<(&Table, &Table)> = Vec::new();
    let mut renamed_before: HashSet<&str> = HashSet::new();
    let mut renamed_after: HashSet<&str> = HashSet::new();
    {
        let before_by_token: HashMap<&TrackingToken, &Table> = before
            .tables
            .values()
            .filter_map(|t| t.token.as_ref().map(|tok| (tok, t)))
            .collect();
        for table in after.tables.values() {
            if before.has_table(&table.name) {
                continue;
            }
            if let Some(tok) = &table.token
                && let Some(old) = before_by_token.get(tok).copied()
                && !after.has_table(&old.name)
            {
                renamed.push((old, table));
                renamed_before.insert(old.name.as_str());
                renamed_after.insert(table.name.as_str());
            }
        }
    }

    for (old, new) in &renamed {
        changes.push(
            Change::new(ChangeAction::Rename, ObjectType::Table, &new.name)
                .with_before(ChangeDetail::Table((*old).clone()))
                .with_after(ChangeDetail::Table((*new).clone())),
        );
    }

    // Prerequisite creates.
    diff_extensions(before, after, &mut changes);
    diff_enums(before, after, &mut changes);
    diff_domains(before, after, &mut changes);
    diff_composites(before, after, &mut changes);
    diff_sequences(before, after, &mut changes);

    // Table creates (skip rename targets and partition children of newly
    // created parents — a new parent's definition carries its children).
    let created_child_names = created_partition_children(before, after);
    for table in after.tables.values() {
        if !before.has_table(&table.name)
            && !renamed_after.contains(table.name.as_str())
            && !created_child_names.contains(table.name.as_str())
        {
            changes.push(
                Change::new(ChangeAction::Create, ObjectType::Table, &table.name)
                    .with_after(ChangeDetail::Table(table.clone())),
            );
        }
    }

    // Nested diffs for tables present on both sides (including renames).
    for table in after.tables.values() {
        if let Some(old) = before.get_table(&table.name) {
            diff_table(old, table, &mut changes);
        }
    }
    for (old, new) in &renamed {
        diff_table(old, new, &mut changes);
    }

    // Views, functions, triggers. Pure drops are collected separately so
    // they can be emitted in reverse dependency order below.
    let mut late_drops = Vec::new();
    let mut view_drops = Vec::new();
    let mut function_drops = Vec::new();
    let mut trigger_drops = Vec::new();
    diff_views(before, after, &mut changes, &mut view_drops);
    diff_functions(before, after, &mut changes, &mut function_drops);
    diff_triggers(before, after, &mut changes, &mut trigger_drops);
    late_drops.extend(trigger_drops);
    late_drops.extend(function_drops);
    late_drops.extend(view_drops);
    changes.append(&mut late_drops);

    // Container drops, reverse dependency order.
    for table in before.tables.values() {
        if !after.has_table(&table.name) && !renamed_before.contains(table.name.as_str()) {
            changes.push(
                Change::new(ChangeAction::Drop, ObjectType::Table, &table.name)
                    .with_before(ChangeDetail::Table(table.clone())),
            );
        }
    }
    drop_missing(&before.sequences, &after.sequences, ObjectType::Sequence, &mut changes, |s| {
        (s.name.clone(), ChangeDetail::Sequence(s.clone()))
    });
    drop_missing(
        &before.composite_types,
        &after.composite_types,
        ObjectType::CompositeType,
        &mut changes,
        |c| (c.name.clone(), ChangeDetail::CompositeType(c.clone())),
    );
    drop_missing(&before.domains, &after.domains, ObjectType::Domain, &mut changes, |d| {
        (d.name.clone(), ChangeDetail::Domain(d.clone()))
    });
    drop_missing(&before.enums, &after.enums, ObjectType::Enum, &mut changes, |e| {
        (e.name.clone(), ChangeDetail::Enum(e.clone()))
    });
    drop_missing(
        &before.extensions,
        &after.extensions,
        ObjectType::Extension,
        &mut changes,
        |x| (x.name.clone(), ChangeDetail::Extension(x.clone())),
    );

    changes
}

/// Names of partition children that first appear inside a newly created
/// or newly partitioned parent; their CREATE is carried by the parent.
fn created_partition_children(before: &Schema, after: &Schema) -> HashSet<String> {
    let mut names = HashSet::new();
    for table in after.tables.values() {
        let Some(spec) = &table.partition else { continue };
        let was_partitioned = before
            .get_table(&table.name)
            .is_some_and(|t| t.partition.is_some());
        if !was_partitioned {
            for child in &spec.partitions {
                names.insert(child.name.clone());
            }
        }
    }
    names
}

fn drop_missing<T, F>(
    before: &[T],
    after: &[T],
    object_type: ObjectType,
    changes: &mut Vec<Change>,
    describe: F,
) where
    F: Fn(&T) -> (String, ChangeDetail),
{
    let after_names: HashSet<String> = after.iter().map(|x| describe(x).0).collect();
    for item in before {
        let (name, detail) = describe(item);
        if !after_names.contains(&name) {
            changes.push(Change::new(ChangeAction::Drop, object_type, name).with_before(detail));
        }
    }
}

// ---------------------------------------------------------------------------
// Top-level entity classes
// ---------------------------------------------------------------------------

fn diff_extensions(before: &Schema, after: &Schema, changes: &mut Vec<Change>) {
    let before_names: HashSet<&str> = before.extensions.iter().map(|x| x.name.as_str()).collect();
    for ext in &after.extensions {
        if !before_names.contains(ext.name.as_str()) {
            changes.push(
                Change::new(ChangeAction::Create, ObjectType::Extension, &ext.name)
                    .with_after(ChangeDetail::Extension(ext.clone())),
            );
        }
    }
}

fn diff_enums(before: &Schema, after: &Schema, changes: &mut Vec<Change>) {
    let before_by_name: HashMap<&str, &EnumType> =
        before.enums.iter().map(|e| (e.name.as_str(), e)).collect();
    for item in &after.enums {
        match before_by_name.get(item.name.as_str()) {
            None => changes.push(
                Change::new(ChangeAction::Create, ObjectType::Enum, &item.name)
                    .with_after(ChangeDetail::Enum(item.clone())),
            ),
            Some(old) if old.values != item.values => changes.push(
                Change::new(ChangeAction::Alter, ObjectType::Enum, &item.name)
                    .with_before(ChangeDetail::Enum((*old).clone()))
                    .with_after(ChangeDetail::Enum(item.clone())),
            ),
            _ => {}
        }
    }
}

fn diff_domains(before: &Schema, after: &Schema, changes: &mut Vec<Change>) {
    let before_by_name: HashMap<&str, &Domain> =
        before.domains.iter().map(|d| (d.name.as_str(), d)).collect();
    for item in &after.domains {
        match before_by_name.get(item.name.as_str()) {
            None => changes.push(
                Change::new(ChangeAction::Create, ObjectType::Domain, &item.name)
                    .with_after(ChangeDetail::Domain(item.clone())),
            ),
            Some(old) if !domains_equal(old, item) => changes.push(
                Change::new(ChangeAction::Alter, ObjectType::Domain, &item.name)
                    .with_before(ChangeDetail::Domain((*old).clone()))
                    .with_after(ChangeDetail::Domain(item.clone())),
            ),
            _ => {}
        }
    }
}

fn domains_equal(a: &Domain, b: &Domain) -> bool {
    normalize::types_equivalent(&a.base_type, &b.base_type)
        && a.not_null == b.not_null
        && normalize::defaults_equivalent(a.default.as_deref(), b.default.as_deref())
        && match (&a.check, &b.check) {
            (None, None) => true,
            (Some(x), Some(y)) => check_expr::checks_equal(x, y),
            _ => false,
        }
}

fn diff_composites(before: &Schema, after: &Schema, changes: &mut Vec<Change>) {
    let before_by_name: HashMap<&str, &CompositeType> = before
        .composite_types
        .iter()
        .map(|c| (c.name.as_str(), c))
        .collect();
    for item in &after.composite_types {
        match before_by_name.get(item.name.as_str()) {
            None => changes.push(
                Change::new(ChangeAction::Create, ObjectType::CompositeType, &item.name)
                    .with_after(ChangeDetail::CompositeType(item.clone())),
            ),
            Some(old) if old.attributes != item.attributes => changes.push(
                Change::new(ChangeAction::Alter, ObjectType::CompositeType, &item.name)
                    .with_before(ChangeDetail::CompositeType((*old).clone()))
                    .with_after(ChangeDetail::CompositeType(item.clone())),
            ),
            _ => {}
        }
    }
}

fn diff_sequences(before: &Schema, after: &Schema, changes: &mut Vec<Change>) {
    let before_by_name: HashMap<&str, &Sequence> = before
        .sequences
        .iter()
        .map(|s| (s.name.as_str(), s))
        .collect();
    for item in &after.sequences {
        match before_by_name.get(item.name.as_str()) {
            None => changes.push(
                Change::new(ChangeAction::Create, ObjectType::Sequence, &item.name)
                    .with_after(ChangeDetail::Sequence(item.clone())),
            ),
            Some(old) if !sequences_equal(old, item) => changes.push(
                Change::new(ChangeAction::Alter, ObjectType::Sequence, &item.name)
                    .with_before(ChangeDetail::Sequence((*old).clone()))
                    .with_after(ChangeDetail::Sequence(item.clone())),
            ),
            _ => {}
        }
    }
}

fn sequences_equal(a: &Sequence, b: &Sequence) -> bool {
    a.increment.unwrap_or(1) == b.increment.unwrap_or(1)
        && a.start.unwrap_or(1) == b.start.unwrap_or(1)
        && a.min_value == b.min_value
        && a.max_value == b.max_value
        && a.cache.unwrap_or(1) == b.cache.unwrap_or(1)
        && a.cycle == b.cycle
}

fn diff_views(before: &Schema, after: &Schema, changes: &mut Vec<Change>, drops: &mut Vec<Change>) {
    let before_by_name: HashMap<&str, &View> =
        before.views.iter().map(|v| (v.name.as_str(), v)).collect();
    let after_names: HashSet<&str> = after.views.iter().map(|v| v.name.as_str()).collect();

    for item in &after.views {
        match before_by_name.get(item.name.as_str()) {
            None => changes.push(
                Change::new(ChangeAction::Create, ObjectType::View, &item.name)
                    .with_after(ChangeDetail::View(item.clone())),
            ),
            Some(old) if !sql_text_equal(&old.definition, &item.definition) => changes.push(
                Change::new(ChangeAction::Alter, ObjectType::View, &item.name)
                    .with_before(ChangeDetail::View((*old).clone()))
                    .with_after(ChangeDetail::View(item.clone())),
            ),
            _ => {}
        }
    }
    for item in &before.views {
        if !after_names.contains(item.name.as_str()) {
            drops.push(
                Change::new(ChangeAction::Drop, ObjectType::View, &item.name)
                    .with_before(ChangeDetail::View(item.clone())),
            );
        }
    }
}

fn diff_functions(
    before: &Schema,
    after: &Schema,
    changes: &mut Vec<Change>,
    drops: &mut Vec<Change>,
) {
    let before_by_name: HashMap<&str, &Function> = before
        .functions
        .iter()
        .map(|f| (f.name.as_str(), f))
        .collect();
    let after_names: HashSet<&str> = after.functions.iter().map(|f| f.name.as_str()).collect();

    for item in &after.functions {
        match before_by_name.get(item.name.as_str()) {
            None => changes.push(
                Change::new(ChangeAction::Create, ObjectType::Function, &item.name)
                    .with_after(ChangeDetail::Function(item.clone())),
            ),
            Some(old) if !functions_equal(old, item) => changes.push(
                Change::new(ChangeAction::Alter, ObjectType::Function, &item.name)
                    .with_before(ChangeDetail::Function((*old).clone()))
                    .with_after(ChangeDetail::Function(item.clone())),
            ),
            _ => {}
        }
    }
    for item in &before.functions {
        if !after_names.contains(item.name.as_str()) {
            drops.push(
                Change::new(ChangeAction::Drop, ObjectType::Function, &item.name)
                    .with_before(ChangeDetail::Function(item.clone())),
            );
        }
    }
}

/// Return type plus parser-based body equivalence. A missing body on the
/// before side skips the body check — read-only snapshots omit bodies.
fn functions_equal(a: &Function, b: &Function) -> bool {
    if !normalize::types_equivalent(&a.returns, &b.returns) {
        return false;
    }
    match (&a.body, &b.body) {
        (None, _) => true,
        (Some(_), None) => true,
        (Some(x), Some(y)) => sql_text_equal(x, y),
    }
}

/// SQL body equivalence: parse-and-deparse when the parser accepts both
/// sides, comment-stripped whitespace-collapsed comparison otherwise.
fn sql_text_equal(a: &str, b: &str) -> bool {
    if let (Ok(pa), Ok(pb)) = (pg_query::parse(a), pg_query::parse(b))
        && let (Ok(da), Ok(db)) = (pg_query::deparse(&pa.protobuf), pg_query::deparse(&pb.protobuf))
    {
        return da == db;
    }
    strip_sql_comments(a) == strip_sql_comments(b)
}

/// Remove `--` and `/* */` comments and collapse whitespace.
fn strip_sql_comments(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let bytes = sql.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'-' && i + 1 < bytes.len() && bytes[i + 1] == b'-' {
            while i < bytes.len() && bytes[i] != b'\n' {
                i += 1;
            }
        } else if bytes[i] == b'/' && i + 1 < bytes.len() && bytes[i + 1] == b'*' {
            i += 2;
            while i + 1 < bytes.len() && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
                i += 1;
            }
            i = (i + 2).min(bytes.len());
        } else if bytes[i] == b'\'' {
            // keep string literals verbatim
            out.push('\'');
            i += 1;
            while i < bytes.len() {
                out.push(bytes[i] as char);
                if bytes[i] == b'\'' {
                    i += 1;
                    break;
                }
                i += 1;
            }
        } else {
            out.push(bytes[i] as char);
            i += 1;
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Triggers are keyed by `table.name`; any attribute change forces a
/// DROP+CREATE pair — triggers are not altered in place.
fn diff_triggers(
    before: &Schema,
    after: &Schema,
    changes: &mut Vec<Change>,
    drops: &mut Vec<Change>,
) {
    let before_by_key: BTreeMap<String, &Trigger> =
        before.triggers.iter().map(|t| (t.key(), t)).collect();
    let after_keys: HashSet<String> = after.triggers.iter().map(|t| t.key()).collect();

    for item in &after.triggers {
        match before_by_key.get(&item.key()) {
            None => changes.push(
                Change::new(ChangeAction::Create, ObjectType::Trigger, &item.name)
                    .with_parent(&item.table)
                    .with_after(ChangeDetail::Trigger(item.clone())),
            ),
            Some(old) if !triggers_equal(old, item) => {
                changes.push(
                    Change::new(ChangeAction::Drop, ObjectType::Trigger, &item.name)
                        .with_parent(&item.table)
                        .with_before(ChangeDetail::Trigger((*old).clone())),
                );
                changes.push(
                    Change::new(ChangeAction::Create, ObjectType::Trigger, &item.name)
                        .with_parent(&item.table)
                        .with_after(ChangeDetail::Trigger(item.clone())),
                );
            }
            _ => {}
        }
    }
    for item in &before.triggers {
        if !after_keys.contains(&item.key()) {
            drops.push(
                Change::new(ChangeAction::Drop, ObjectType::Trigger, &item.name)
                    .with_parent(&item.table)
                    .with_before(ChangeDetail::Trigger(item.clone())),
            );
        }
    }
}

fn triggers_equal(a: &Trigger, b: &Trigger) -> bool {
    let mut ea = a.events.clone();
    let mut eb = b.events.clone();
    ea.sort();
    eb.sort();
    a.timing == b.timing && ea == eb && a.for_each == b.for_each && a.function_name == b.function_name
}

// ---------------------------------------------------------------------------
// Per-table recursion
// ---------------------------------------------------------------------------

/// Nested diff for one table: columns, then indexes, then constraints,
/// then comments, then partition transitions.
fn diff_table(before: &Table, after: &Table, changes: &mut Vec<Change>) {
    diff_columns(before, after, changes);
    diff_indexes(before, after, changes);
    diff_constraints(before, after, changes);
    diff_comments(before, after, changes);
    diff_partition(before, after, changes);
}

fn diff_columns(before: &Table, after: &Table, changes: &mut Vec<Change>) {
    let parent = after.name.as_str();

    let before_by_token: HashMap<&TrackingToken, &Column> = before
        .columns
        .iter()
        .filter_map(|c| c.token.as_ref().map(|t| (t, c)))
        .collect();

    let mut matched_before: HashSet<&str> = HashSet::new();
    let mut matched_after: HashSet<&str> = HashSet::new();

    // (a) token-to-token matches: rename when names differ, alter when
    // attributes differ. Declaration order keeps output deterministic.
    for new_col in &after.columns {
        let Some(token) = &new_col.token else { continue };
        if let Some(old_col) = before_by_token.get(token) {
            matched_before.insert(old_col.name.as_str());
            matched_after.insert(new_col.name.as_str());
            if old_col.name != new_col.name {
                changes.push(
                    Change::new(ChangeAction::Rename, ObjectType::Column, &new_col.name)
                        .with_parent(parent)
                        .with_before(ChangeDetail::Column((*old_col).clone()))
                        .with_after(ChangeDetail::Column((*new_col).clone())),
                );
            } else if !columns_equal(old_col, new_col) {
                changes.push(
                    Change::new(ChangeAction::Alter, ObjectType::Column, &new_col.name)
                        .with_parent(parent)
                        .with_before(ChangeDetail::Column((*old_col).clone()))
                        .with_after(ChangeDetail::Column((*new_col).clone())),
                );
            }
        }
    }

    // (b) remaining columns pair by name.
    for new_col in &after.columns {
        if matched_after.contains(new_col.name.as_str()) {
            continue;
        }
        match before.get_column(&new_col.name) {
            Some(old_col) if !matched_before.contains(old_col.name.as_str()) => {
                matched_before.insert(old_col.name.as_str());
                if !columns_equal(old_col, new_col) {
                    changes.push(
                        Change::new(ChangeAction::Alter, ObjectType::Column, &new_col.name)
                            .with_parent(parent)
                            .with_before(ChangeDetail::Column(old_col.clone()))
                            .with_after(ChangeDetail::Column(new_col.clone())),
                    );
                }
            }
            _ => changes.push(
                Change::new(ChangeAction::Create, ObjectType::Column, &new_col.name)
                    .with_parent(parent)
                    .with_after(ChangeDetail::Column(new_col.clone())),
            ),
        }
    }

    for old_col in &before.columns {
        if !matched_before.contains(old_col.name.as_str()) {
            changes.push(
                Change::new(ChangeAction::Drop, ObjectType::Column, &old_col.name)
                    .with_parent(parent)
                    .with_before(ChangeDetail::Column(old_col.clone())),
            );
        }
    }
}

/// Attribute equality modulo dialect synonyms and default rewriting.
/// Comments are compared separately as first-class changes.
fn columns_equal(a: &Column, b: &Column) -> bool {
    normalize::types_equivalent(&a.type_name, &b.type_name)
        && a.is_array == b.is_array
        && a.max_length == b.max_length
        && a.precision == b.precision
        && a.scale == b.scale
        && a.nullable == b.nullable
        && normalize::defaults_equivalent(a.default.as_deref(), b.default.as_deref())
        && a.primary_key == b.primary_key
        && a.unique == b.unique
        && a.is_generated == b.is_generated
        && generation_equal(a, b)
}

fn generation_equal(a: &Column, b: &Column) -> bool {
    match (&a.generation_expression, &b.generation_expression) {
        (None, None) => true,
        (Some(x), Some(y)) => check_expr::checks_equal(x, y),
        _ => false,
    }
}

fn diff_indexes(before: &Table, after: &Table, changes: &mut Vec<Change>) {
    let parent = after.name.as_str();

    // Primary indexes are owned by the primary-key constraint and never
    // surface as independent changes.
    let before_idx: Vec<&Index> = before.indexes.iter().filter(|i| !i.primary).collect();
    let after_idx: Vec<&Index> = after.indexes.iter().filter(|i| !i.primary).collect();

    let before_by_token: HashMap<&TrackingToken, &Index> = before_idx
        .iter()
        .filter_map(|i| i.token.as_ref().map(|t| (t, *i)))
        .collect();

    let mut matched_before: HashSet<&str> = HashSet::new();
    let mut matched_after: HashSet<&str> = HashSet::new();

    for new_idx in &after_idx {
        if let Some(token) = &new_idx.token
            && let Some(old_idx) = before_by_token.get(token)
        {
            matched_before.insert(old_idx.name.as_str());
            matched_after.insert(new_idx.name.as_str());
            if old_idx.name != new_idx.name {
                changes.push(
                    Change::new(ChangeAction::Rename, ObjectType::Index, &new_idx.name)
                        .with_parent(parent)
                        .with_before(ChangeDetail::Index((*old_idx).clone()))
                        .with_after(ChangeDetail::Index((*new_idx).clone())),
                );
            } else if !indexes_equal(old_idx, new_idx) {
                changes.push(
                    Change::new(ChangeAction::Alter, ObjectType::Index, &new_idx.name)
                        .with_parent(parent)
                        .with_before(ChangeDetail::Index((*old_idx).clone()))
                        .with_after(ChangeDetail::Index((*new_idx).clone())),
                );
            }
        }
    }

    for new_idx in &after_idx {
        if matched_after.contains(new_idx.name.as_str()) {
            continue;
        }
        match before_idx
            .iter()
            .find(|i| i.name == new_idx.name && !matched_before.contains(i.name.as_str()))
        {
            Some(old_idx) => {
                matched_before.insert(old_idx.name.as_str());
                if !indexes_equal(old_idx, new_idx) {
                    changes.push(
                        Change::new(ChangeAction::Alter, ObjectType::Index, &new_idx.name)
                            .with_parent(parent)
                            .with_before(ChangeDetail::Index((*old_idx).clone()))
                            .with_after(ChangeDetail::Index((*new_idx).clone())),
                    );
                }
            }
            None => changes.push(
                Change::new(ChangeAction::Create, ObjectType::Index, &new_idx.name)
                    .with_parent(parent)
                    .with_after(ChangeDetail::Index((*new_idx).clone())),
            ),
        }
    }

    for old_idx in &before_idx {
        if !matched_before.contains(old_idx.name.as_str())
            && !after_idx.iter().any(|i| i.name == old_idx.name)
        {
            changes.push(
                Change::new(ChangeAction::Drop, ObjectType::Index, &old_idx.name)
                    .with_parent(parent)
                    .with_before(ChangeDetail::Index((*old_idx).clone())),
            );
        }
    }
}

/// Columns, uniqueness, method, predicate, and INCLUDE list.
fn indexes_equal(a: &Index, b: &Index) -> bool {
    a.columns == b.columns
        && a.unique == b.unique
        && a.method == b.method
        && a.include == b.include
        && match (&a.where_clause, &b.where_clause) {
            (None, None) => true,
            (Some(x), Some(y)) => check_expr::checks_equal(x, y),
            _ => false,
        }
}

fn diff_constraints(before: &Table, after: &Table, changes: &mut Vec<Change>) {
    let parent = after.name.as_str();

    // Non-CHECK constraints diff by name; single-column UNIQUE is a
    // column flag and never a standalone change.
    let named = |cs: &[Constraint]| -> BTreeMap<String, Constraint> {
        cs.iter()
            .filter(|c| !c.is_check() && !c.is_single_column_unique())
            .filter_map(|c| c.name().map(|n| (n.to_string(), c.clone())))
            .collect()
    };
    let before_named = named(&before.constraints);
    let after_named = named(&after.constraints);

    for (name, new_c) in &after_named {
        match before_named.get(name) {
            None => changes.push(
                Change::new(ChangeAction::Create, ObjectType::Constraint, name)
                    .with_parent(parent)
                    .with_after(ChangeDetail::Constraint(new_c.clone())),
            ),
            Some(old_c) if !constraints_equal(old_c, new_c) => changes.push(
                Change::new(ChangeAction::Alter, ObjectType::Constraint, name)
                    .with_parent(parent)
                    .with_before(ChangeDetail::Constraint(old_c.clone()))
                    .with_after(ChangeDetail::Constraint(new_c.clone())),
            ),
            _ => {}
        }
    }
    for (name, old_c) in &before_named {
        if !after_named.contains_key(name) {
            changes.push(
                Change::new(ChangeAction::Drop, ObjectType::Constraint, name)
                    .with_parent(parent)
                    .with_before(ChangeDetail::Constraint(old_c.clone())),
            );
        }
    }

    // CHECK constraints match by the column they constrain.
    let check_key = |c: &Constraint, table: &Table| -> Option<String> {
        if let Constraint::Check { name, expression, .. } = c {
            check_expr::constrained_column(expression, name.as_deref(), &table.name)
                .or_else(|| name.clone())
        } else {
            None
        }
    };

    let before_checks: BTreeMap<String, &Constraint> = before
        .constraints
        .iter()
        .filter(|c| c.is_check())
        .filter_map(|c| check_key(c, before).map(|k| (k, c)))
        .collect();
    let after_checks: BTreeMap<String, &Constraint> = after
        .constraints
        .iter()
        .filter(|c| c.is_check())
        .filter_map(|c| check_key(c, after).map(|k| (k, c)))
        .collect();

    for (key, new_c) in &after_checks {
        let name = new_c.name().unwrap_or(key).to_string();
        match before_checks.get(key) {
            None => changes.push(
                Change::new(ChangeAction::Create, ObjectType::Constraint, name)
                    .with_parent(parent)
                    .with_after(ChangeDetail::Constraint((*new_c).clone())),
            ),
            Some(old_c) => {
                let (Constraint::Check { expression: old_e, .. }, Constraint::Check { expression: new_e, .. }) =
                    (old_c, new_c)
                else {
                    continue;
                };
                if !check_expr::checks_equal(old_e, new_e) {
                    changes.push(
                        Change::new(ChangeAction::Alter, ObjectType::Constraint, name)
                            .with_parent(parent)
                            .with_before(ChangeDetail::Constraint((*old_c).clone()))
                            .with_after(ChangeDetail::Constraint((*new_c).clone())),
                    );
                }
            }
        }
    }
    for (key, old_c) in &before_checks {
        if !after_checks.contains_key(key) {
            let name = old_c.name().unwrap_or(key).to_string();
            changes.push(
                Change::new(ChangeAction::Drop, ObjectType::Constraint, name)
                    .with_parent(parent)
                    .with_before(ChangeDetail::Constraint((*old_c).clone())),
            );
        }
    }
}

fn constraints_equal(a: &Constraint, b: &Constraint) -> bool {
    match (a, b) {
        (
            Constraint::PrimaryKey { columns: ca, .. },
            Constraint::PrimaryKey { columns: cb, .. },
        ) => ca == cb,
        (Constraint::Unique { columns: ca, .. }, Constraint::Unique { columns: cb, .. }) => {
            ca == cb
        }
        (
            Constraint::ForeignKey {
                columns: ca,
                ref_table: ta,
                ref_columns: ra,
                on_delete: da,
                on_update: ua,
                match_mode: ma,
                deferrable: fa,
                initially_deferred: ia,
                ..
            },
            Constraint::ForeignKey {
                columns: cb,
                ref_table: tb,
                ref_columns: rb,
                on_delete: db,
                on_update: ub,
                match_mode: mb,
                deferrable: fb,
                initially_deferred: ib,
                ..
            },
        ) => ca == cb && ta == tb && ra == rb && da == db && ua == ub && ma == mb && fa == fb && ia == ib,
        (
            Constraint::Check { expression: ea, .. },
            Constraint::Check { expression: eb, .. },
        ) => check_expr::checks_equal(ea, eb),
        (
            Constraint::Exclude { definition: da, .. },
            Constraint::Exclude { definition: db, .. },
        ) => sql_text_equal(da, db),
        _ => false,
    }
}

/// Table, column, and index comments are first-class change objects.
fn diff_comments(before: &Table, after: &Table, changes: &mut Vec<Change>) {
    let parent = after.name.as_str();

    push_comment_change(
        ObjectType::TableComment,
        &after.name,
        None,
        before.comment.as_deref(),
        after.comment.as_deref(),
        changes,
    );

    for new_col in &after.columns {
        if let Some(old_col) = before.get_column(&new_col.name) {
            push_comment_change(
                ObjectType::ColumnComment,
                &new_col.name,
                Some(parent),
                old_col.comment.as_deref(),
                new_col.comment.as_deref(),
                changes,
            );
        }
    }

    for new_idx in &after.indexes {
        if let Some(old_idx) = before.get_index(&new_idx.name) {
            push_comment_change(
                ObjectType::IndexComment,
                &new_idx.name,
                Some(parent),
                old_idx.comment.as_deref(),
                new_idx.comment.as_deref(),
                changes,
            );
        }
    }
}

fn push_comment_change(
    object_type: ObjectType,
    name: &str,
    parent: Option<&str>,
    old: Option<&str>,
    new: Option<&str>,
    changes: &mut Vec<Change>,
) {
    let change = match (old, new) {
        (None, Some(text)) => Change::new(ChangeAction::Create, object_type, name)
            .with_after(ChangeDetail::Comment(text.to_string())),
        (Some(text), None) => Change::new(ChangeAction::Drop, object_type, name)
            .with_before(ChangeDetail::Comment(text.to_string())),
        (Some(a), Some(b)) if a != b => Change::new(ChangeAction::Alter, object_type, name)
            .with_before(ChangeDetail::Comment(a.to_string()))
            .with_after(ChangeDetail::Comment(b.to_string())),
        _ => return,
    };
    match parent {
        Some(p) => changes.push(change.with_parent(p)),
        None => changes.push(change),
    }
}

/// Partition transitions: attach/detach of the whole spec, key or type
/// changes within a partitioned table, and child-set changes.
fn diff_partition(before: &Table, after: &Table, changes: &mut Vec<Change>) {
    let parent = after.name.as_str();

    match (&before.partition, &after.partition) {
        (None, None) => {}
        (None, Some(spec)) => {
            changes.push(
                Change::new(ChangeAction::Create, ObjectType::Partition, parent)
                    .with_after(ChangeDetail::Partition(spec.clone())),
            );
            for child in &spec.partitions {
                changes.push(
                    Change::new(ChangeAction::Create, ObjectType::PartitionChild, &child.name)
                        .with_parent(parent)
                        .with_after(ChangeDetail::PartitionChild(child.clone())),
                );
            }
        }
        (Some(spec), None) => {
            changes.push(
                Change::new(ChangeAction::Drop, ObjectType::Partition, parent)
                    .with_before(ChangeDetail::Partition(spec.clone())),
            );
        }
        (Some(old), Some(new)) => {
            if old.partition_type != new.partition_type || old.partition_key != new.partition_key {
                changes.push(
                    Change::new(ChangeAction::Alter, ObjectType::Partition, parent)
                        .with_before(ChangeDetail::Partition(old.clone()))
                        .with_after(ChangeDetail::Partition(new.clone())),
                );
            }
            let old_names: HashSet<&str> = old.partitions.iter().map(|p| p.name.as_str()).collect();
            let new_names: HashSet<&str> = new.partitions.iter().map(|p| p.name.as_str()).collect();
            for child in &new.partitions {
                if !old_names.contains(child.name.as_str()) {
                    changes.push(
                        Change::new(ChangeAction::Create, ObjectType::PartitionChild, &child.name)
                            .with_parent(parent)
                            .with_after(ChangeDetail::PartitionChild(child.clone())),
                    );
                }
            }
            for child in &old.partitions {
                if !new_names.contains(child.name.as_str()) {
                    changes.push(
                        Change::new(ChangeAction::Drop, ObjectType::PartitionChild, &child.name)
                            .with_parent(parent)
                            .with_before(ChangeDetail::PartitionChild(child.clone())),
                    );
                }
            }
        }
    }
}
