//! Schema intermediate representation
//!
//! The IR is a normalized, dialect-agnostic model of a database schema.
//! It is populated by the introspector or the source-file reader, compared
//! by the differ, and rendered by codegen. Serialization mirrors the
//! on-disk snapshot layout, so every field here round-trips through
//! `.relq/snapshot.json`.

pub mod builder;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Opaque identity token attached to schema objects for rename tracking.
///
/// Conventionally a one-letter kind prefix followed by 5 base-36
/// characters (`c00a1b`). Assigned at first codegen, immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackingToken(pub String);

impl TrackingToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Kind prefix character, if present.
    pub fn kind(&self) -> Option<char> {
        self.0.chars().next()
    }

    /// Check the conventional shape: one ASCII letter + 5 base-36 chars.
    pub fn is_well_formed(&self) -> bool {
        let mut chars = self.0.chars();
        let prefix_ok = chars.next().is_some_and(|c| c.is_ascii_lowercase());
        let rest: Vec<char> = chars.collect();
        prefix_ok && rest.len() == 5 && rest.iter().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase())
    }
}

impl fmt::Display for TrackingToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Root container for a single introspected or parsed schema.
///
/// Tables are keyed by name in a sorted map so iteration order is
/// deterministic regardless of insertion order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    #[serde(default)]
    pub tables: BTreeMap<String, Table>,
    #[serde(default)]
    pub enums: Vec<EnumType>,
    #[serde(default)]
    pub domains: Vec<Domain>,
    #[serde(default)]
    pub composite_types: Vec<CompositeType>,
    #[serde(default)]
    pub sequences: Vec<Sequence>,
    #[serde(default)]
    pub views: Vec<View>,
    #[serde(default)]
    pub functions: Vec<Function>,
    #[serde(default)]
    pub triggers: Vec<Trigger>,
    #[serde(default)]
    pub extensions: Vec<Extension>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    pub fn get_table_mut(&mut self, name: &str) -> Option<&mut Table> {
        self.tables.get_mut(name)
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn insert_table(&mut self, table: Table) {
        self.tables.insert(table.name.clone(), table);
    }

    pub fn remove_table(&mut self, name: &str) -> Option<Table> {
        self.tables.remove(name)
    }

    pub fn get_enum(&self, name: &str) -> Option<&EnumType> {
        self.enums.iter().find(|e| e.name == name)
    }

    pub fn get_function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn get_trigger(&self, table: &str, name: &str) -> Option<&Trigger> {
        self.triggers
            .iter()
            .find(|t| t.table == table && t.name == name)
    }

    /// True if `type_name` resolves to a built-in, an enum, a domain, a
    /// composite type, or a type declared by an installed extension.
    pub fn resolves_type(&self, type_name: &str) -> bool {
        let base = crate::normalize::base_type(type_name);
        is_builtin_type(&base)
            || self.enums.iter().any(|e| e.name == base)
            || self.domains.iter().any(|d| d.name == base)
            || self.composite_types.iter().any(|c| c.name == base)
            || self
                .extensions
                .iter()
                .any(|x| extension_declared_types(&x.name).contains(&base.as_str()))
    }

    /// Check the data-model invariants from the design contract. Returns
    /// one human-readable violation per problem; empty means consistent.
    pub fn verify(&self) -> Vec<String> {
        let mut violations = Vec::new();

        for table in self.tables.values() {
            violations.extend(table.verify(self));
        }

        violations
    }
}

/// Default logical namespace for objects without an explicit schema.
pub const DEFAULT_NAMESPACE: &str = "public";

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub name: String,
    #[serde(default = "default_namespace")]
    pub schema: String,
    #[serde(default)]
    pub columns: Vec<Column>,
    #[serde(default)]
    pub indexes: Vec<Index>,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition: Option<PartitionSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<TrackingToken>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: default_namespace(),
            columns: vec![],
            indexes: vec![],
            constraints: vec![],
            partition: None,
            comment: None,
            token: None,
        }
    }

    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn get_column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    pub fn get_index(&self, name: &str) -> Option<&Index> {
        self.indexes.iter().find(|i| i.name == name)
    }

    /// The primary-key constraint, if declared at table level.
    pub fn primary_key(&self) -> Option<&Constraint> {
        self.constraints
            .iter()
            .find(|c| matches!(c, Constraint::PrimaryKey { .. }))
    }

    /// Columns forming the primary key, from the table-level constraint or
    /// column-level flags.
    pub fn primary_key_columns(&self) -> Vec<&str> {
        if let Some(Constraint::PrimaryKey { columns, .. }) = self.primary_key() {
            return columns.iter().map(|c| c.as_str()).collect();
        }
        self.columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| c.name.as_str())
            .collect()
    }

    pub fn is_partitioned(&self) -> bool {
        self.partition.is_some()
    }

    /// True if this table is a partition child of some parent in `schema`.
    pub fn is_partition_child_of<'a>(&self, schema: &'a Schema) -> Option<&'a str> {
        for parent in schema.tables.values() {
            if let Some(spec) = &parent.partition
                && spec.partitions.iter().any(|p| p.name == self.name)
            {
                return Some(parent.name.as_str());
            }
        }
        None
    }

    /// Invariant checks for a single table against its containing schema.
    fn verify(&self, schema: &Schema) -> Vec<String> {
        let mut violations = Vec::new();

        // Column names unique within the table.
        let mut seen = std::collections::HashSet::new();
        for col in &self.columns {
            if !seen.insert(col.name.as_str()) {
                violations.push(format!(
                    "table '{}' declares column '{}' more than once",
                    self.name, col.name
                ));
            }
        }

        // At most one primary-key constraint.
        let pk_count = self
            .constraints
            .iter()
            .filter(|c| matches!(c, Constraint::PrimaryKey { .. }))
            .count();
        if pk_count > 1 {
            violations.push(format!(
                "table '{}' has {} primary key constraints",
                self.name, pk_count
            ));
        }

        // Every constraint column references an existing column.
        for constraint in &self.constraints {
            for col in constraint.columns() {
                if self.get_column(col).is_none() {
                    violations.push(format!(
                        "constraint '{}' on '{}' references missing column '{}'",
                        constraint.name().unwrap_or("<unnamed>"),
                        self.name,
                        col
                    ));
                }
            }
        }

        for col in &self.columns {
            // Primary-key columns are non-nullable.
            let in_pk = col.primary_key
                || self
                    .primary_key()
                    .is_some_and(|pk| pk.columns().iter().any(|c| *c == col.name));
            if in_pk && col.nullable {
                violations.push(format!(
                    "primary key column '{}.{}' is nullable",
                    self.name, col.name
                ));
            }

            // length only for character/bit types; precision/scale only for
            // numeric/time types.
            if col.max_length.is_some() && !accepts_length(&col.type_name) {
                violations.push(format!(
                    "column '{}.{}' of type '{}' carries a length parameter",
                    self.name, col.name, col.type_name
                ));
            }
            if (col.precision.is_some() || col.scale.is_some()) && !accepts_precision(&col.type_name)
            {
                violations.push(format!(
                    "column '{}.{}' of type '{}' carries precision/scale",
                    self.name, col.name, col.type_name
                ));
            }

            // Every type reference resolves.
            if !schema.resolves_type(&col.type_name) {
                violations.push(format!(
                    "column '{}.{}' references unknown type '{}'",
                    self.name, col.name, col.type_name
                ));
            }
        }

        violations
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub name: String,
    /// Developer-facing name after the configured case-style transform.
    /// Absent until codegen assigns it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dev_name: Option<String>,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<u32>,
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    pub primary_key: bool,
    pub unique: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_array: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub array_dimensions: Option<u8>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_generated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_expression: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<TrackingToken>,
}

impl Column {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dev_name: None,
            type_name: type_name.into(),
            max_length: None,
            precision: None,
            scale: None,
            nullable: true,
            default: None,
            primary_key: false,
            unique: false,
            is_array: false,
            array_dimensions: None,
            is_generated: false,
            generation_expression: None,
            comment: None,
            token: None,
        }
    }

    /// Rendered type including parameters and array suffix, e.g.
    /// `varchar(120)`, `numeric(10,2)`, `text[]`.
    pub fn rendered_type(&self) -> String {
        let mut out = self.type_name.clone();
        if let Some(len) = self.max_length {
            out.push_str(&format!("({len})"));
        } else if let Some(p) = self.precision {
            match self.scale {
                Some(s) => out.push_str(&format!("({p},{s})")),
                None => out.push_str(&format!("({p})")),
            }
        }
        if self.is_array {
            for _ in 0..self.array_dimensions.unwrap_or(1) {
                out.push_str("[]");
            }
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexMethod {
    Btree,
    Hash,
    Gin,
    Gist,
    Brin,
    Spgist,
}

impl IndexMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Btree => "btree",
            Self::Hash => "hash",
            Self::Gin => "gin",
            Self::Gist => "gist",
            Self::Brin => "brin",
            Self::Spgist => "spgist",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "btree" => Some(Self::Btree),
            "hash" => Some(Self::Hash),
            "gin" => Some(Self::Gin),
            "gist" => Some(Self::Gist),
            "brin" => Some(Self::Brin),
            "spgist" | "spgist " | "sp-gist" => Some(Self::Spgist),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Index {
    pub name: String,
    /// Ordered column names or expression texts.
    pub columns: Vec<String>,
    pub unique: bool,
    #[serde(rename = "type", default = "default_index_method")]
    pub method: IndexMethod,
    /// Full CREATE INDEX definition when the introspector surfaces one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
    /// Partial-index predicate, raw SQL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub where_clause: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator_class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub primary: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<TrackingToken>,
}

fn default_index_method() -> IndexMethod {
    IndexMethod::Btree
}

impl Index {
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
            unique: false,
            method: IndexMethod::Btree,
            definition: None,
            where_clause: None,
            include: vec![],
            operator_class: None,
            comment: None,
            primary: false,
            token: None,
        }
    }

    pub fn is_partial(&self) -> bool {
        self.where_clause.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ForeignKeyAction {
    NoAction,
    Restrict,
    Cascade,
    SetNull,
    SetDefault,
}

impl ForeignKeyAction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::NoAction => "NO ACTION",
            Self::Restrict => "RESTRICT",
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchMode {
    Simple,
    Full,
    Partial,
}

/// Table constraints as a tagged sum. The discriminant doubles as the
/// serialized `type` field in the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Constraint {
    PrimaryKey {
        name: Option<String>,
        columns: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token: Option<TrackingToken>,
    },
    Unique {
        name: Option<String>,
        columns: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token: Option<TrackingToken>,
    },
    Check {
        name: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        columns: Vec<String>,
        expression: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token: Option<TrackingToken>,
    },
    ForeignKey {
        name: Option<String>,
        columns: Vec<String>,
        ref_table: String,
        ref_columns: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        on_delete: Option<ForeignKeyAction>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        on_update: Option<ForeignKeyAction>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        match_mode: Option<MatchMode>,
        #[serde(default, skip_serializing_if = "is_false")]
        deferrable: bool,
        #[serde(default, skip_serializing_if = "is_false")]
        initially_deferred: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token: Option<TrackingToken>,
    },
    Exclude {
        name: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        columns: Vec<String>,
        definition: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token: Option<TrackingToken>,
    },
}

fn is_false(v: &bool) -> bool {
    !*v
}

impl Constraint {
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::PrimaryKey { name, .. }
            | Self::Unique { name, .. }
            | Self::Check { name, .. }
            | Self::ForeignKey { name, .. }
            | Self::Exclude { name, .. } => name.as_deref(),
        }
    }

    pub fn columns(&self) -> &[String] {
        match self {
            Self::PrimaryKey { columns, .. }
            | Self::Unique { columns, .. }
            | Self::Check { columns, .. }
            | Self::ForeignKey { columns, .. }
            | Self::Exclude { columns, .. } => columns,
        }
    }

    pub fn token(&self) -> Option<&TrackingToken> {
        match self {
            Self::PrimaryKey { token, .. }
            | Self::Unique { token, .. }
            | Self::Check { token, .. }
            | Self::ForeignKey { token, .. }
            | Self::Exclude { token, .. } => token.as_ref(),
        }
    }

    pub fn is_check(&self) -> bool {
        matches!(self, Self::Check { .. })
    }

    /// Single-column UNIQUE constraints are expressed as a column flag in
    /// the generated source, so the differ filters them out.
    pub fn is_single_column_unique(&self) -> bool {
        matches!(self, Self::Unique { columns, .. } if columns.len() == 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PartitionType {
    List,
    Range,
    Hash,
}

impl PartitionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::List => "LIST",
            Self::Range => "RANGE",
            Self::Hash => "HASH",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionChild {
    pub name: String,
    /// Raw bound clause, e.g. `FOR VALUES FROM ('2024-01-01') TO ('2025-01-01')`.
    pub bound: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bound_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionSpec {
    pub partition_type: PartitionType,
    /// Ordered partition-key columns.
    pub partition_key: Vec<String>,
    #[serde(default)]
    pub partitions: Vec<PartitionChild>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnumType {
    pub name: String,
    #[serde(default = "default_namespace")]
    pub schema: String,
    pub values: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<TrackingToken>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Domain {
    pub name: String,
    #[serde(default = "default_namespace")]
    pub schema: String,
    pub base_type: String,
    #[serde(default)]
    pub not_null: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<TrackingToken>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeAttribute {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeType {
    pub name: String,
    #[serde(default = "default_namespace")]
    pub schema: String,
    pub attributes: Vec<CompositeAttribute>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<TrackingToken>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sequence {
    pub name: String,
    #[serde(default = "default_namespace")]
    pub schema: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub increment: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_value: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<i64>,
    #[serde(default)]
    pub cycle: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<TrackingToken>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct View {
    pub name: String,
    #[serde(default = "default_namespace")]
    pub schema: String,
    /// SELECT body as reported by the engine.
    pub definition: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub materialized: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<TrackingToken>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Volatility {
    Immutable,
    Stable,
    Volatile,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Function {
    pub name: String,
    #[serde(default = "default_namespace")]
    pub schema: String,
    pub returns: String,
    pub language: String,
    #[serde(default)]
    pub arg_types: Vec<String>,
    /// Absent on read-only snapshots; the differ skips body comparison
    /// when the before side has no body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volatility: Option<Volatility>,
    #[serde(default)]
    pub security_definer: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<TrackingToken>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriggerTiming {
    Before,
    After,
    InsteadOf,
}

impl TriggerTiming {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Before => "BEFORE",
            Self::After => "AFTER",
            Self::InsteadOf => "INSTEAD OF",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TriggerEvent {
    Insert,
    Update,
    Delete,
    Truncate,
}

impl TriggerEvent {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Truncate => "TRUNCATE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TriggerForEach {
    Row,
    Statement,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trigger {
    pub name: String,
    pub table: String,
    pub timing: TriggerTiming,
    pub events: Vec<TriggerEvent>,
    pub for_each: TriggerForEach,
    pub function_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<TrackingToken>,
}

impl Trigger {
    /// Diff key: triggers are identified by `table.name`.
    pub fn key(&self) -> String {
        format!("{}.{}", self.table, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Extension {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<TrackingToken>,
}

// ---------------------------------------------------------------------------
// Built-in type knowledge
// ---------------------------------------------------------------------------

/// Types that accept a `(length)` parameter.
fn accepts_length(type_name: &str) -> bool {
    matches!(
        crate::normalize::base_type(type_name).as_str(),
        "varchar" | "character varying" | "char" | "character" | "bpchar" | "bit" | "bit varying" | "varbit"
    )
}

/// Types that accept `(precision[, scale])`.
fn accepts_precision(type_name: &str) -> bool {
    matches!(
        crate::normalize::base_type(type_name).as_str(),
        "numeric"
            | "decimal"
            | "time"
            | "timetz"
            | "timestamp"
            | "timestamptz"
            | "timestamp with time zone"
            | "timestamp without time zone"
            | "time with time zone"
            | "time without time zone"
            | "interval"
            | "float"
    )
}

/// PostgreSQL-family built-in type names, post-normalization.
pub fn is_builtin_type(base: &str) -> bool {
    const BUILTINS: &[&str] = &[
        "smallint", "int2", "integer", "int", "int4", "bigint", "int8", "smallserial", "serial",
        "bigserial", "numeric", "decimal", "real", "float4", "double precision", "float8", "float",
        "money", "character varying", "varchar", "character", "char", "bpchar", "text", "bytea",
        "timestamp", "timestamp without time zone", "timestamptz", "timestamp with time zone",
        "date", "time", "time without time zone", "timetz", "time with time zone", "interval",
        "boolean", "bool", "point", "line", "lseg", "box", "path", "polygon", "circle", "cidr",
        "inet", "macaddr", "macaddr8", "bit", "bit varying", "varbit", "tsvector", "tsquery",
        "uuid", "xml", "json", "jsonb", "jsonpath", "oid", "regclass", "regproc", "regtype",
        "int4range", "int8range", "numrange", "tsrange", "tstzrange", "daterange", "int4multirange",
        "int8multirange", "nummultirange", "tsmultirange", "tstzmultirange", "datemultirange",
        "name", "void", "trigger", "record", "anyelement", "anyarray", "unknown",
        // adjacent-dialect spellings surfaced by introspection
        "tinyint", "mediumint", "datetime", "year", "blob", "longtext", "mediumtext", "tinytext",
        "enum", "set", "binary", "varbinary",
    ];
    BUILTINS.contains(&base)
}

/// Types contributed by well-known extensions.
fn extension_declared_types(extension: &str) -> &'static [&'static str] {
    match extension {
        "citext" => &["citext"],
        "hstore" => &["hstore"],
        "ltree" => &["ltree", "lquery", "ltxtquery"],
        "pgvector" | "vector" => &["vector", "halfvec", "sparsevec"],
        "postgis" => &["geometry", "geography", "box2d", "box3d"],
        "pg_trgm" => &[],
        "pgcrypto" => &[],
        "uuid-ossp" => &[],
        "cube" => &["cube"],
        "isn" => &["isbn", "issn", "ean13", "upc"],
        _ => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::builder::SchemaBuilder;

    #[test]
    fn test_token_shape() {
        assert!(TrackingToken::new("c00a1b").is_well_formed());
        assert!(TrackingToken::new("t9zz00").is_well_formed());
        assert!(!TrackingToken::new("c00a1").is_well_formed(), "too short");
        assert!(!TrackingToken::new("C00a1b").is_well_formed(), "uppercase prefix");
        assert!(!TrackingToken::new("c00a1bQ").is_well_formed(), "too long");
        assert_eq!(TrackingToken::new("c00a1b").kind(), Some('c'));
    }

    #[test]
    fn test_verify_clean_schema() {
        let schema = SchemaBuilder::new()
            .table("users", |t| {
                t.column("id", "uuid", false)
                    .primary_key(&["id"])
                    .column("email", "text", false);
            })
            .build();

        assert!(schema.verify().is_empty());
    }

    #[test]
    fn test_verify_nullable_pk_column() {
        let mut schema = SchemaBuilder::new()
            .table("users", |t| {
                t.column("id", "uuid", true).primary_key(&["id"]);
            })
            .build();

        let violations = schema.verify();
        assert_eq!(violations.len(), 1);
        assert!(violations[0].contains("nullable"));

        schema.get_table_mut("users").unwrap().columns[0].nullable = false;
        assert!(schema.verify().is_empty());
    }

    #[test]
    fn test_verify_duplicate_column_names() {
        let mut schema = Schema::new();
        let mut table = Table::new("users");
        table.columns.push(Column::new("id", "uuid"));
        table.columns.push(Column::new("id", "text"));
        schema.insert_table(table);

        let violations = schema.verify();
        assert!(violations.iter().any(|v| v.contains("more than once")));
    }

    #[test]
    fn test_verify_constraint_missing_column() {
        let mut schema = Schema::new();
        let mut table = Table::new("users");
        table.columns.push(Column::new("id", "uuid"));
        table.constraints.push(Constraint::Unique {
            name: Some("users_email_key".to_string()),
            columns: vec!["email".to_string()],
            token: None,
        });
        schema.insert_table(table);

        let violations = schema.verify();
        assert!(violations.iter().any(|v| v.contains("missing column 'email'")));
    }

    #[test]
    fn test_verify_length_on_numeric_type() {
        let mut schema = Schema::new();
        let mut table = Table::new("users");
        let mut col = Column::new("age", "integer");
        col.max_length = Some(10);
        col.nullable = false;
        table.columns.push(col);
        schema.insert_table(table);

        let violations = schema.verify();
        assert!(violations.iter().any(|v| v.contains("length parameter")));
    }

    #[test]
    fn test_type_resolution_enum_and_extension() {
        let mut schema = SchemaBuilder::new()
            .enum_type("order_status", &["pending", "shipped"])
            .build();
        schema.extensions.push(Extension {
            name: "citext".to_string(),
            version: None,
            token: None,
        });

        assert!(schema.resolves_type("order_status"));
        assert!(schema.resolves_type("order_status[]"));
        assert!(schema.resolves_type("citext"));
        assert!(schema.resolves_type("varchar(100)"));
        assert!(!schema.resolves_type("no_such_type"));
    }

    #[test]
    fn test_partition_child_lookup() {
        let schema = SchemaBuilder::new()
            .table("events", |t| {
                t.column("id", "bigint", false)
                    .column("ts", "timestamptz", false)
                    .range_partition(&["ts"], &[("events_2024", "FOR VALUES FROM ('2024-01-01') TO ('2025-01-01')")]);
            })
            .table("events_2024", |t| {
                t.column("id", "bigint", false);
            })
            .build();

        let child = schema.get_table("events_2024").unwrap();
        assert_eq!(child.is_partition_child_of(&schema), Some("events"));
        let parent = schema.get_table("events").unwrap();
        assert!(parent.is_partitioned());
        assert_eq!(parent.is_partition_child_of(&schema), None);
    }

    #[test]
    fn test_rendered_type() {
        let mut col = Column::new("title", "varchar");
        col.max_length = Some(120);
        assert_eq!(col.rendered_type(), "varchar(120)");

        let mut col = Column::new("price", "numeric");
        col.precision = Some(10);
        col.scale = Some(2);
        assert_eq!(col.rendered_type(), "numeric(10,2)");

        let mut col = Column::new("tags", "text");
        col.is_array = true;
        assert_eq!(col.rendered_type(), "text[]");

        let mut col = Column::new("grid", "integer");
        col.is_array = true;
        col.array_dimensions = Some(2);
        assert_eq!(col.rendered_type(), "integer[][]");
    }

    #[test]
    fn test_primary_key_columns_from_flags() {
        let mut table = Table::new("users");
        let mut id = Column::new("id", "uuid");
        id.primary_key = true;
        id.nullable = false;
        table.columns.push(id);
        table.columns.push(Column::new("email", "text"));

        assert_eq!(table.primary_key_columns(), vec!["id"]);
    }

    #[test]
    fn test_snapshot_serde_round_trip() {
        let schema = SchemaBuilder::new()
            .enum_type("status", &["a", "b"])
            .table("users", |t| {
                t.column("id", "uuid", false)
                    .primary_key(&["id"])
                    .column_full("email", "text", false, Some("''::text"), |c| {
                        c.unique = true;
                        c.comment = Some("login identity".to_string());
                        c.token = Some(TrackingToken::new("c00a1b"));
                    })
                    .index("users_email_key", &["email"], true);
            })
            .build();

        let json = serde_json::to_string_pretty(&schema).unwrap();
        let back: Schema = serde_json::from_str(&json).unwrap();

        let users = back.get_table("users").unwrap();
        let email = users.get_column("email").unwrap();
        assert_eq!(email.default.as_deref(), Some("''::text"));
        assert!(email.unique);
        assert_eq!(email.comment.as_deref(), Some("login identity"));
        assert_eq!(email.token.as_ref().unwrap().as_str(), "c00a1b");
        assert_eq!(back.enums[0].values, vec!["a", "b"]);

        // Snapshot field spellings are part of the on-disk contract.
        assert!(json.contains("\"primaryKey\""));
        assert!(json.contains("\"type\": \"uuid\""));
    }

    #[test]
    fn test_constraint_serde_tagging() {
        let c = Constraint::ForeignKey {
            name: Some("orders_user_id_fk".to_string()),
            columns: vec!["user_id".to_string()],
            ref_table: "users".to_string(),
            ref_columns: vec!["id".to_string()],
            on_delete: Some(ForeignKeyAction::Cascade),
            on_update: None,
            match_mode: None,
            deferrable: false,
            initially_deferred: false,
            token: None,
        };
        let json = serde_json::to_string(&c).unwrap();
        assert!(json.contains("\"type\":\"FOREIGN_KEY\""));
        assert!(json.contains("\"CASCADE\""));

        let back: Constraint = serde_json::from_str(&json).unwrap();
        assert_eq!(back.name(), Some("orders_user_id_fk"));
    }
}
