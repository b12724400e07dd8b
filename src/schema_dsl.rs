//! Declarative schema surface for generated source files
//!
//! The generated schema file is plain Rust calling these builders; each
//! `pub fn` there returns one schema object. The reader reconstructs IR
//! from the file text, and these types make the same file a valid,
//! loadable description for programmatic callers.
//!
//! ```rust
//! use relq_core::schema_dsl::prelude::*;
//!
//! pub fn users() -> TableDef {
//!     table("users")
//!         .column(col("id", "uuid").primary_key())
//!         .column(col("email", "text").not_null().unique())
//!         .index(idx("users_email_key", &["email"]).unique())
//! }
//! ```

use crate::ir::{
    Column, Constraint, Domain, EnumType, ForeignKeyAction, Function, Index, PartitionChild,
    PartitionSpec, PartitionType, Table, TrackingToken, Trigger, TriggerEvent, TriggerForEach,
    TriggerTiming, View, Volatility,
};
use crate::normalize;

pub mod prelude {
    pub use super::{
        ColumnAccessor, ColumnSpec, DomainDef, EnumDef, FunctionDef, IndexSpec, Relation,
        SequenceDef, TableDef, TriggerDef, ViewDef, col, domain, enum_def, function, idx, relation,
        sequence, table, trigger, view,
    };
}

/// Start a table definition.
pub fn table(name: &str) -> TableDef {
    TableDef {
        table: Table::new(name),
    }
}

#[derive(Debug, Clone)]
pub struct TableDef {
    table: Table,
}

impl TableDef {
    pub fn token(mut self, token: &str) -> Self {
        self.table.token = Some(TrackingToken::new(token));
        self
    }

    pub fn column(mut self, column: ColumnSpec) -> Self {
        let (mut column, inline_check) = column.into_parts();
        if let Some((name, values)) = inline_check {
            let quoted: Vec<String> = values.iter().map(|v| format!("'{v}'")).collect();
            self.table.constraints.push(Constraint::Check {
                name: Some(name),
                columns: vec![column.name.clone()],
                expression: format!("{} IN ({})", column.name, quoted.join(", ")),
                token: None,
            });
        }
        if column.primary_key {
            column.nullable = false;
        }
        self.table.columns.push(column);
        self
    }

    pub fn index(mut self, index: IndexSpec) -> Self {
        self.table.indexes.push(index.index);
        self
    }

    pub fn check(mut self, name: &str, expression: &str) -> Self {
        self.table.constraints.push(Constraint::Check {
            name: Some(name.to_string()),
            columns: vec![],
            expression: expression.to_string(),
            token: None,
        });
        self
    }

    /// Multi-column unique constraint; single-column uniqueness is a
    /// column flag.
    pub fn unique(mut self, name: &str, columns: &[&str]) -> Self {
        self.table.constraints.push(Constraint::Unique {
            name: Some(name.to_string()),
            columns: columns.iter().map(|s| s.to_string()).collect(),
            token: None,
        });
        self
    }

    pub fn exclude(mut self, name: &str, definition: &str) -> Self {
        self.table.constraints.push(Constraint::Exclude {
            name: Some(name.to_string()),
            columns: vec![],
            definition: definition.to_string(),
            token: None,
        });
        self
    }

    pub fn comment(mut self, text: &str) -> Self {
        self.table.comment = Some(text.to_string());
        self
    }

    pub fn list_partition(self, key: &[&str], children: &[(&str, &str)]) -> Self {
        self.partitioned(PartitionType::List, key, children)
    }

    pub fn range_partition(self, key: &[&str], children: &[(&str, &str)]) -> Self {
        self.partitioned(PartitionType::Range, key, children)
    }

    pub fn hash_partition(self, key: &[&str], children: &[(&str, &str)]) -> Self {
        self.partitioned(PartitionType::Hash, key, children)
    }

    fn partitioned(
        mut self,
        partition_type: PartitionType,
        key: &[&str],
        children: &[(&str, &str)],
    ) -> Self {
        self.table.partition = Some(PartitionSpec {
            partition_type,
            partition_key: key.iter().map(|s| s.to_string()).collect(),
            partitions: children
                .iter()
                .map(|(name, bound)| PartitionChild {
                    name: name.to_string(),
                    bound: bound.to_string(),
                    bound_type: None,
                })
                .collect(),
        });
        self
    }

    /// The primary key constraint, derived from column flags when the
    /// definition carries no explicit one.
    pub fn build(mut self) -> Table {
        let flagged: Vec<String> = self
            .table
            .columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| c.name.clone())
            .collect();
        if !flagged.is_empty() && self.table.primary_key().is_none() {
            self.table.constraints.insert(
                0,
                Constraint::PrimaryKey {
                    name: Some(format!("{}_pkey", self.table.name)),
                    columns: flagged,
                    token: None,
                },
            );
        }
        self.table
    }
}

impl From<TableDef> for Table {
    fn from(def: TableDef) -> Self {
        def.build()
    }
}

/// Start a column definition. The type string carries parameters and
/// array suffix: `"varchar(120)"`, `"numeric(10,2)"`, `"text[]"`.
pub fn col(name: &str, type_spec: &str) -> ColumnSpec {
    let is_array = normalize::is_array_spelling(type_spec);
    let base = normalize::base_type(type_spec);
    let mut column = Column::new(name, base.clone());
    column.is_array = is_array;
    if is_array {
        column.array_dimensions = Some(type_spec.matches("[]").count().max(1) as u8);
    }

    // Pull parameters back out of the rendered spelling.
    if let Some(open) = type_spec.find('(')
        && let Some(close) = type_spec.find(')')
    {
        let params: Vec<u32> = type_spec[open + 1..close]
            .split(',')
            .filter_map(|p| p.trim().parse().ok())
            .collect();
        if matches!(
            base.as_str(),
            "varchar"
                | "character varying"
                | "char"
                | "character"
                | "bpchar"
                | "bit"
                | "bit varying"
                | "varbit"
                | "binary"
                | "varbinary"
        ) {
            column.max_length = params.first().copied();
        } else {
            column.precision = params.first().copied();
            column.scale = params.get(1).copied();
        }
    }

    ColumnSpec {
        column,
        inline_check: None,
    }
}

#[derive(Debug, Clone)]
pub struct ColumnSpec {
    column: Column,
    inline_check: Option<(String, Vec<String>)>,
}

impl ColumnSpec {
    pub fn not_null(mut self) -> Self {
        self.column.nullable = false;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.column.primary_key = true;
        self.column.nullable = false;
        self
    }

    pub fn unique(mut self) -> Self {
        self.column.unique = true;
        self
    }

    pub fn default_sql(mut self, expression: &str) -> Self {
        self.column.default = Some(expression.to_string());
        self
    }

    pub fn generated(mut self, expression: &str) -> Self {
        self.column.is_generated = true;
        self.column.generation_expression = Some(expression.to_string());
        self
    }

    pub fn dev_name(mut self, name: &str) -> Self {
        self.column.dev_name = Some(name.to_string());
        self
    }

    pub fn comment(mut self, text: &str) -> Self {
        self.column.comment = Some(text.to_string());
        self
    }

    /// Enum-like check shorthand: `col IN ('a', 'b', …)`.
    pub fn check(mut self, name: &str, values: &[&str]) -> Self {
        self.inline_check = Some((
            name.to_string(),
            values.iter().map(|v| v.to_string()).collect(),
        ));
        self
    }

    pub fn token(mut self, token: &str) -> Self {
        self.column.token = Some(TrackingToken::new(token));
        self
    }

    fn into_parts(self) -> (Column, Option<(String, Vec<String>)>) {
        (self.column, self.inline_check)
    }
}

/// Start an index definition.
pub fn idx(name: &str, columns: &[&str]) -> IndexSpec {
    IndexSpec {
        index: Index::new(name, columns.iter().map(|s| s.to_string()).collect()),
    }
}

#[derive(Debug, Clone)]
pub struct IndexSpec {
    index: Index,
}

impl IndexSpec {
    pub fn unique(mut self) -> Self {
        self.index.unique = true;
        self
    }

    pub fn method(mut self, method: &str) -> Self {
        if let Some(parsed) = crate::ir::IndexMethod::parse(method) {
            self.index.method = parsed;
        }
        self
    }

    pub fn where_sql(mut self, predicate: &str) -> Self {
        self.index.where_clause = Some(predicate.to_string());
        self
    }

    pub fn include(mut self, columns: &[&str]) -> Self {
        self.index.include = columns.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn token(mut self, token: &str) -> Self {
        self.index.token = Some(TrackingToken::new(token));
        self
    }
}

pub fn enum_def(name: &str, values: &[&str]) -> EnumDef {
    EnumDef {
        inner: EnumType {
            name: name.to_string(),
            schema: "public".to_string(),
            values: values.iter().map(|v| v.to_string()).collect(),
            token: None,
        },
    }
}

#[derive(Debug, Clone)]
pub struct EnumDef {
    inner: EnumType,
}

impl EnumDef {
    pub fn token(mut self, token: &str) -> Self {
        self.inner.token = Some(TrackingToken::new(token));
        self
    }

    pub fn build(self) -> EnumType {
        self.inner
    }
}

pub fn domain(name: &str, base_type: &str) -> DomainDef {
    DomainDef {
        inner: Domain {
            name: name.to_string(),
            schema: "public".to_string(),
            base_type: base_type.to_string(),
            not_null: false,
            default: None,
            check: None,
            token: None,
        },
    }
}

#[derive(Debug, Clone)]
pub struct DomainDef {
    inner: Domain,
}

impl DomainDef {
    pub fn not_null(mut self) -> Self {
        self.inner.not_null = true;
        self
    }

    pub fn default_sql(mut self, expression: &str) -> Self {
        self.inner.default = Some(expression.to_string());
        self
    }

    pub fn check(mut self, expression: &str) -> Self {
        self.inner.check = Some(expression.to_string());
        self
    }

    pub fn token(mut self, token: &str) -> Self {
        self.inner.token = Some(TrackingToken::new(token));
        self
    }

    pub fn build(self) -> Domain {
        self.inner
    }
}

pub fn sequence(name: &str) -> SequenceDef {
    SequenceDef {
        inner: crate::ir::Sequence {
            name: name.to_string(),
            schema: "public".to_string(),
            increment: Some(1),
            start: Some(1),
            min_value: None,
            max_value: None,
            cache: Some(1),
            cycle: false,
            token: None,
        },
    }
}

#[derive(Debug, Clone)]
pub struct SequenceDef {
    inner: crate::ir::Sequence,
}

impl SequenceDef {
    pub fn increment(mut self, by: i64) -> Self {
        self.inner.increment = Some(by);
        self
    }

    pub fn start(mut self, at: i64) -> Self {
        self.inner.start = Some(at);
        self
    }

    pub fn cycle(mut self) -> Self {
        self.inner.cycle = true;
        self
    }

    pub fn token(mut self, token: &str) -> Self {
        self.inner.token = Some(TrackingToken::new(token));
        self
    }

    pub fn build(self) -> crate::ir::Sequence {
        self.inner
    }
}

pub fn view(name: &str, definition: &str) -> ViewDef {
    ViewDef {
        inner: View {
            name: name.to_string(),
            schema: "public".to_string(),
            definition: definition.to_string(),
            materialized: false,
            token: None,
        },
    }
}

#[derive(Debug, Clone)]
pub struct ViewDef {
    inner: View,
}

impl ViewDef {
    pub fn materialized(mut self) -> Self {
        self.inner.materialized = true;
        self
    }

    pub fn token(mut self, token: &str) -> Self {
        self.inner.token = Some(TrackingToken::new(token));
        self
    }

    pub fn build(self) -> View {
        self.inner
    }
}

/// Typed handle to one column of one table, produced once per table
/// schema. The query layer consumes these instead of resolving
/// `table.column` strings at call time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnAccessor {
    pub table_name: String,
    pub alias: Option<String>,
    pub column_name: String,
    /// Database-side spelling; differs from `column_name` when a
    /// camelCase developer name is in effect.
    pub sql_column_name: String,
}

impl ColumnAccessor {
    /// Qualified SQL reference, honoring the alias when set.
    pub fn qualified(&self) -> String {
        let table = self.alias.as_deref().unwrap_or(&self.table_name);
        format!("{table}.{}", self.sql_column_name)
    }
}

impl Table {
    /// Accessors for every column, optionally under a table alias.
    pub fn column_refs(&self, alias: Option<&str>) -> Vec<ColumnAccessor> {
        self.columns
            .iter()
            .map(|column| ColumnAccessor {
                table_name: self.name.clone(),
                alias: alias.map(|a| a.to_string()),
                column_name: column
                    .dev_name
                    .clone()
                    .unwrap_or_else(|| column.name.clone()),
                sql_column_name: column.name.clone(),
            })
            .collect()
    }
}

/// Start a function definition (companion file surface).
pub fn function(name: &str, returns: &str, language: &str) -> FunctionDef {
    FunctionDef {
        inner: Function {
            name: name.to_string(),
            schema: "public".to_string(),
            returns: returns.to_string(),
            language: language.to_string(),
            arg_types: vec![],
            body: None,
            volatility: None,
            security_definer: false,
            token: None,
        },
    }
}

#[derive(Debug, Clone)]
pub struct FunctionDef {
    inner: Function,
}

impl FunctionDef {
    pub fn arg(mut self, type_name: &str) -> Self {
        self.inner.arg_types.push(type_name.to_string());
        self
    }

    pub fn body(mut self, sql: &str) -> Self {
        self.inner.body = Some(sql.to_string());
        self
    }

    pub fn volatility(mut self, value: &str) -> Self {
        self.inner.volatility = match value.to_lowercase().as_str() {
            "immutable" => Some(Volatility::Immutable),
            "stable" => Some(Volatility::Stable),
            "volatile" => Some(Volatility::Volatile),
            _ => None,
        };
        self
    }

    pub fn security_definer(mut self) -> Self {
        self.inner.security_definer = true;
        self
    }

    pub fn token(mut self, token: &str) -> Self {
        self.inner.token = Some(TrackingToken::new(token));
        self
    }

    pub fn build(self) -> Function {
        self.inner
    }
}

/// Start a trigger definition (companion file surface).
pub fn trigger(name: &str, table: &str) -> TriggerDef {
    TriggerDef {
        inner: Trigger {
            name: name.to_string(),
            table: table.to_string(),
            timing: TriggerTiming::Before,
            events: vec![],
            for_each: TriggerForEach::Row,
            function_name: String::new(),
            token: None,
        },
    }
}

#[derive(Debug, Clone)]
pub struct TriggerDef {
    inner: Trigger,
}

impl TriggerDef {
    pub fn before(mut self) -> Self {
        self.inner.timing = TriggerTiming::Before;
        self
    }

    pub fn after(mut self) -> Self {
        self.inner.timing = TriggerTiming::After;
        self
    }

    pub fn instead_of(mut self) -> Self {
        self.inner.timing = TriggerTiming::InsteadOf;
        self
    }

    pub fn on(mut self, events: &[&str]) -> Self {
        self.inner.events = events
            .iter()
            .filter_map(|e| match e.to_uppercase().as_str() {
                "INSERT" => Some(TriggerEvent::Insert),
                "UPDATE" => Some(TriggerEvent::Update),
                "DELETE" => Some(TriggerEvent::Delete),
                "TRUNCATE" => Some(TriggerEvent::Truncate),
                _ => None,
            })
            .collect();
        self
    }

    pub fn for_each_row(mut self) -> Self {
        self.inner.for_each = TriggerForEach::Row;
        self
    }

    pub fn for_each_statement(mut self) -> Self {
        self.inner.for_each = TriggerForEach::Statement;
        self
    }

    pub fn execute(mut self, function_name: &str) -> Self {
        self.inner.function_name = function_name.to_string();
        self
    }

    pub fn token(mut self, token: &str) -> Self {
        self.inner.token = Some(TrackingToken::new(token));
        self
    }

    pub fn build(self) -> Trigger {
        self.inner
    }
}

/// One foreign-key edge for the relations block.
pub fn relation(name: &str) -> Relation {
    Relation {
        name: name.to_string(),
        table: String::new(),
        columns: vec![],
        ref_table: String::new(),
        ref_columns: vec![],
        on_delete: None,
        on_update: None,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Relation {
    pub name: String,
    pub table: String,
    pub columns: Vec<String>,
    pub ref_table: String,
    pub ref_columns: Vec<String>,
    pub on_delete: Option<ForeignKeyAction>,
    pub on_update: Option<ForeignKeyAction>,
}

impl Relation {
    pub fn from(mut self, table: &str, columns: &[&str]) -> Self {
        self.table = table.to_string();
        self.columns = columns.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn to(mut self, table: &str, columns: &[&str]) -> Self {
        self.ref_table = table.to_string();
        self.ref_columns = columns.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn on_delete(mut self, action: &str) -> Self {
        self.on_delete = parse_action(action);
        self
    }

    pub fn on_update(mut self, action: &str) -> Self {
        self.on_update = parse_action(action);
        self
    }
}

fn parse_action(action: &str) -> Option<ForeignKeyAction> {
    match action.to_uppercase().as_str() {
        "NO ACTION" => Some(ForeignKeyAction::NoAction),
        "RESTRICT" => Some(ForeignKeyAction::Restrict),
        "CASCADE" => Some(ForeignKeyAction::Cascade),
        "SET NULL" => Some(ForeignKeyAction::SetNull),
        "SET DEFAULT" => Some(ForeignKeyAction::SetDefault),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_builder_round_trip() {
        let users = table("users")
            .token("t00001")
            .column(col("id", "uuid").primary_key().token("c00001"))
            .column(col("email", "text").not_null().unique())
            .index(idx("users_email_key", &["email"]).unique())
            .build();

        assert_eq!(users.name, "users");
        assert_eq!(users.token.as_ref().unwrap().as_str(), "t00001");
        assert_eq!(users.columns.len(), 2);
        assert!(users.columns[0].primary_key);
        assert!(!users.columns[0].nullable);
        assert!(users.primary_key().is_some(), "PK constraint derived from flags");
        assert!(users.indexes[0].unique);
    }

    #[test]
    fn test_col_type_parsing() {
        let (c, _) = col("title", "varchar(120)").into_parts();
        assert_eq!(c.type_name, "varchar");
        assert_eq!(c.max_length, Some(120));

        let (c, _) = col("price", "numeric(10,2)").into_parts();
        assert_eq!(c.precision, Some(10));
        assert_eq!(c.scale, Some(2));

        let (c, _) = col("tags", "text[]").into_parts();
        assert!(c.is_array);
        assert_eq!(c.type_name, "text");
    }

    #[test]
    fn test_check_shorthand_becomes_constraint() {
        let orders = table("orders")
            .column(col("status", "text").not_null().check("orders_status_check", &["open", "closed"]))
            .build();

        let check = orders
            .constraints
            .iter()
            .find(|c| c.is_check())
            .expect("check constraint");
        if let Constraint::Check { expression, columns, .. } = check {
            assert_eq!(expression, "status IN ('open', 'closed')");
            assert_eq!(columns, &vec!["status".to_string()]);
        }
    }

    #[test]
    fn test_column_accessors() {
        let users = table("users")
            .column(col("id", "uuid").primary_key())
            .column(col("created_at", "timestamptz").dev_name("createdAt"))
            .build();

        let refs = users.column_refs(None);
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].qualified(), "users.id");
        assert_eq!(refs[1].column_name, "createdAt");
        assert_eq!(refs[1].sql_column_name, "created_at");

        let aliased = users.column_refs(Some("u"));
        assert_eq!(aliased[0].qualified(), "u.id");
    }

    #[test]
    fn test_relation_builder() {
        let rel = relation("orders_user_id")
            .from("orders", &["user_id"])
            .to("users", &["id"])
            .on_delete("CASCADE");
        assert_eq!(rel.table, "orders");
        assert_eq!(rel.on_delete, Some(ForeignKeyAction::Cascade));
    }
}
