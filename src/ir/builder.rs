//! Test harness for building schema state
//!
//! Fluent API for constructing `Schema` values in tests. Both the differ
//! and validator test suites depend on this.
//!
//! # Example
//!
//! ```rust
//! use relq_core::ir::builder::SchemaBuilder;
//!
//! let schema = SchemaBuilder::new()
//!     .enum_type("status", &["active", "disabled"])
//!     .table("orders", |t| {
//!         t.column("id", "bigint", false)
//!          .primary_key(&["id"])
//!          .column("status", "status", false)
//!          .index("idx_status", &["status"], false);
//!     })
//!     .build();
//! ```

use crate::ir::{
    Column, CompositeAttribute, CompositeType, Constraint, Domain, EnumType, Extension,
    ForeignKeyAction, Function, Index, PartitionChild, PartitionSpec, PartitionType, Schema,
    Sequence, Table, TrackingToken, Trigger, TriggerEvent, TriggerForEach, TriggerTiming, View,
};

/// Builder for constructing a `Schema` in tests.
pub struct SchemaBuilder {
    schema: Schema,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self {
            schema: Schema::new(),
        }
    }

    /// Add a table. The closure receives a `TableBuilder` to configure
    /// columns, indexes, and constraints.
    pub fn table(mut self, name: &str, f: impl FnOnce(&mut TableBuilder)) -> Self {
        let mut builder = TableBuilder::new(name);
        f(&mut builder);
        self.schema.insert_table(builder.build());
        self
    }

    pub fn enum_type(mut self, name: &str, values: &[&str]) -> Self {
        self.schema.enums.push(EnumType {
            name: name.to_string(),
            schema: "public".to_string(),
            values: values.iter().map(|s| s.to_string()).collect(),
            token: None,
        });
        self
    }

    pub fn domain(mut self, name: &str, base_type: &str, check: Option<&str>) -> Self {
        self.schema.domains.push(Domain {
            name: name.to_string(),
            schema: "public".to_string(),
            base_type: base_type.to_string(),
            not_null: false,
            default: None,
            check: check.map(|s| s.to_string()),
            token: None,
        });
        self
    }

    pub fn composite(mut self, name: &str, attributes: &[(&str, &str)]) -> Self {
        self.schema.composite_types.push(CompositeType {
            name: name.to_string(),
            schema: "public".to_string(),
            attributes: attributes
                .iter()
                .map(|(n, t)| CompositeAttribute {
                    name: n.to_string(),
                    type_name: t.to_string(),
                })
                .collect(),
            token: None,
        });
        self
    }

    pub fn sequence(mut self, name: &str) -> Self {
        self.schema.sequences.push(Sequence {
            name: name.to_string(),
            schema: "public".to_string(),
            increment: Some(1),
            start: Some(1),
            min_value: None,
            max_value: None,
            cache: Some(1),
            cycle: false,
            token: None,
        });
        self
    }

    pub fn view(mut self, name: &str, definition: &str) -> Self {
        self.schema.views.push(View {
            name: name.to_string(),
            schema: "public".to_string(),
            definition: definition.to_string(),
            materialized: false,
            token: None,
        });
        self
    }

    pub fn function(mut self, name: &str, returns: &str, language: &str, body: &str) -> Self {
        self.schema.functions.push(Function {
            name: name.to_string(),
            schema: "public".to_string(),
            returns: returns.to_string(),
            language: language.to_string(),
            arg_types: vec![],
            body: Some(body.to_string()),
            volatility: None,
            security_definer: false,
            token: None,
        });
        self
    }

    pub fn trigger(
        mut self,
        name: &str,
        table: &str,
        timing: TriggerTiming,
        events: &[TriggerEvent],
        function_name: &str,
    ) -> Self {
        self.schema.triggers.push(Trigger {
            name: name.to_string(),
            table: table.to_string(),
            timing,
            events: events.to_vec(),
            for_each: TriggerForEach::Row,
            function_name: function_name.to_string(),
            token: None,
        });
        self
    }

    pub fn extension(mut self, name: &str) -> Self {
        self.schema.extensions.push(Extension {
            name: name.to_string(),
            version: None,
            token: None,
        });
        self
    }

    /// Mutate the schema in place for cases the fluent surface doesn't cover.
    pub fn with(mut self, f: impl FnOnce(&mut Schema)) -> Self {
        f(&mut self.schema);
        self
    }

    pub fn build(self) -> Schema {
        self.schema
    }
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for constructing a `Table` in tests.
pub struct TableBuilder {
    table: Table,
}

impl TableBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            table: Table::new(name),
        }
    }

    /// Add a column without a default value.
    pub fn column(&mut self, name: &str, type_name: &str, nullable: bool) -> &mut Self {
        let mut col = Column::new(name, type_name);
        col.nullable = nullable;
        self.table.columns.push(col);
        self
    }

    /// Add a column with a default and arbitrary extra configuration.
    pub fn column_full(
        &mut self,
        name: &str,
        type_name: &str,
        nullable: bool,
        default: Option<&str>,
        f: impl FnOnce(&mut Column),
    ) -> &mut Self {
        let mut col = Column::new(name, type_name);
        col.nullable = nullable;
        col.default = default.map(|s| s.to_string());
        f(&mut col);
        self.table.columns.push(col);
        self
    }

    /// Attach a tracking token to the most recently added column.
    pub fn token(&mut self, token: &str) -> &mut Self {
        if let Some(col) = self.table.columns.last_mut() {
            col.token = Some(TrackingToken::new(token));
        }
        self
    }

    /// Attach a tracking token to the table itself.
    pub fn table_token(&mut self, token: &str) -> &mut Self {
        self.table.token = Some(TrackingToken::new(token));
        self
    }

    /// Add a table-level primary key and mark its columns non-nullable.
    pub fn primary_key(&mut self, columns: &[&str]) -> &mut Self {
        for name in columns {
            if let Some(col) = self.table.get_column_mut(name) {
                col.primary_key = true;
                col.nullable = false;
            }
        }
        self.table.constraints.push(Constraint::PrimaryKey {
            name: Some(format!("{}_pkey", self.table.name)),
            columns: columns.iter().map(|s| s.to_string()).collect(),
            token: None,
        });
        self
    }

    pub fn index(&mut self, name: &str, columns: &[&str], unique: bool) -> &mut Self {
        let mut idx = Index::new(name, columns.iter().map(|s| s.to_string()).collect());
        idx.unique = unique;
        self.table.indexes.push(idx);
        self
    }

    /// Attach a tracking token to the most recently added index.
    pub fn index_token(&mut self, token: &str) -> &mut Self {
        if let Some(idx) = self.table.indexes.last_mut() {
            idx.token = Some(TrackingToken::new(token));
        }
        self
    }

    pub fn unique(&mut self, name: &str, columns: &[&str]) -> &mut Self {
        self.table.constraints.push(Constraint::Unique {
            name: Some(name.to_string()),
            columns: columns.iter().map(|s| s.to_string()).collect(),
            token: None,
        });
        self
    }

    pub fn check(&mut self, name: &str, expression: &str) -> &mut Self {
        self.table.constraints.push(Constraint::Check {
            name: Some(name.to_string()),
            columns: vec![],
            expression: expression.to_string(),
            token: None,
        });
        self
    }

    pub fn fk(
        &mut self,
        name: &str,
        columns: &[&str],
        ref_table: &str,
        ref_columns: &[&str],
    ) -> &mut Self {
        self.table.constraints.push(Constraint::ForeignKey {
            name: Some(name.to_string()),
            columns: columns.iter().map(|s| s.to_string()).collect(),
            ref_table: ref_table.to_string(),
            ref_columns: ref_columns.iter().map(|s| s.to_string()).collect(),
            on_delete: Some(ForeignKeyAction::NoAction),
            on_update: None,
            match_mode: None,
            deferrable: false,
            initially_deferred: false,
            token: None,
        });
        self
    }

    pub fn exclude(&mut self, name: &str, definition: &str) -> &mut Self {
        self.table.constraints.push(Constraint::Exclude {
            name: Some(name.to_string()),
            columns: vec![],
            definition: definition.to_string(),
            token: None,
        });
        self
    }

    pub fn comment(&mut self, comment: &str) -> &mut Self {
        self.table.comment = Some(comment.to_string());
        self
    }

    pub fn range_partition(&mut self, key: &[&str], children: &[(&str, &str)]) -> &mut Self {
        self.partitioned(PartitionType::Range, key, children)
    }

    pub fn list_partition(&mut self, key: &[&str], children: &[(&str, &str)]) -> &mut Self {
        self.partitioned(PartitionType::List, key, children)
    }

    pub fn hash_partition(&mut self, key: &[&str], children: &[(&str, &str)]) -> &mut Self {
        self.partitioned(PartitionType::Hash, key, children)
    }

    fn partitioned(
        &mut self,
        partition_type: PartitionType,
        key: &[&str],
        children: &[(&str, &str)],
    ) -> &mut Self {
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

    pub fn build(self) -> Table {
        self.table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_basic() {
        let schema = SchemaBuilder::new()
            .table("users", |t| {
                t.column("id", "uuid", false).primary_key(&["id"]);
            })
            .build();

        assert!(schema.has_table("users"));
        let users = schema.get_table("users").unwrap();
        assert_eq!(users.columns.len(), 1);
        assert!(users.columns[0].primary_key);
        assert!(!users.columns[0].nullable);
        assert!(users.primary_key().is_some());
    }

    #[test]
    fn test_builder_complex() {
        let schema = SchemaBuilder::new()
            .table("customers", |t| {
                t.column("id", "bigint", false).primary_key(&["id"]);
            })
            .table("orders", |t| {
                t.column("id", "bigint", false)
                    .primary_key(&["id"])
                    .column("customer_id", "bigint", false)
                    .column("status", "text", true)
                    .fk("orders_customer_id_fk", &["customer_id"], "customers", &["id"])
                    .index("idx_orders_status", &["status"], false)
                    .check("orders_status_check", "status IN ('open', 'closed')");
            })
            .build();

        let orders = schema.get_table("orders").unwrap();
        assert_eq!(orders.columns.len(), 3);
        assert_eq!(orders.indexes.len(), 1);
        assert_eq!(orders.constraints.len(), 3); // PK + FK + CHECK
    }

    #[test]
    fn test_builder_token_helpers() {
        let schema = SchemaBuilder::new()
            .table("users", |t| {
                t.table_token("tk3x9a")
                    .column("id", "uuid", false)
                    .token("c00a1b")
                    .index("users_id_idx", &["id"], false)
                    .index_token("i00a1c");
            })
            .build();

        let users = schema.get_table("users").unwrap();
        assert_eq!(users.token.as_ref().unwrap().as_str(), "tk3x9a");
        assert_eq!(users.columns[0].token.as_ref().unwrap().as_str(), "c00a1b");
        assert_eq!(users.indexes[0].token.as_ref().unwrap().as_str(), "i00a1c");
    }
}
