//! DDL rendering for change sets
//!
//! Translates differ output into executable statements. The core never
//! runs these; `push` hands them to the external executor. Rendering
//! returning `None` marks a change the dialect has no SQL counterpart
//! for — the sync controller reports those as skipped.

use crate::diff::{Change, ChangeAction, ChangeDetail, ObjectType};
use crate::ir::{Column, Constraint, Index, Table};

/// Double-quote an identifier, PostgreSQL/SQLite style.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Backtick-quote an identifier, MySQL style.
fn quote_ident_mysql(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

fn column_ddl(col: &Column, quote: fn(&str) -> String) -> String {
    let mut sql = format!("{} {}", quote(&col.name), col.rendered_type());
    if !col.nullable {
        sql.push_str(" NOT NULL");
    }
    if let Some(default) = &col.default {
        sql.push_str(&format!(" DEFAULT {default}"));
    }
    if col.is_generated
        && let Some(expr) = &col.generation_expression
    {
        sql.push_str(&format!(" GENERATED ALWAYS AS ({expr}) STORED"));
    }
    if col.unique {
        sql.push_str(" UNIQUE");
    }
    sql
}

fn constraint_ddl(constraint: &Constraint, quote: fn(&str) -> String) -> String {
    let named = |name: &Option<String>| {
        name.as_ref()
            .map(|n| format!("CONSTRAINT {} ", quote(n)))
            .unwrap_or_default()
    };
    let cols = |columns: &[String]| {
        columns
            .iter()
            .map(|c| quote(c))
            .collect::<Vec<_>>()
            .join(", ")
    };

    match constraint {
        Constraint::PrimaryKey { name, columns, .. } => {
            format!("{}PRIMARY KEY ({})", named(name), cols(columns))
        }
        Constraint::Unique { name, columns, .. } => {
            format!("{}UNIQUE ({})", named(name), cols(columns))
        }
        Constraint::Check {
            name, expression, ..
        } => format!("{}CHECK ({expression})", named(name)),
        Constraint::ForeignKey {
            name,
            columns,
            ref_table,
            ref_columns,
            on_delete,
            on_update,
            deferrable,
            initially_deferred,
            ..
        } => {
            let mut sql = format!(
                "{}FOREIGN KEY ({}) REFERENCES {} ({})",
                named(name),
                cols(columns),
                quote(ref_table),
                cols(ref_columns)
            );
            if let Some(action) = on_delete {
                sql.push_str(&format!(" ON DELETE {}", action.as_sql()));
            }
            if let Some(action) = on_update {
                sql.push_str(&format!(" ON UPDATE {}", action.as_sql()));
            }
            if *deferrable {
                sql.push_str(" DEFERRABLE");
            }
            if *initially_deferred {
                sql.push_str(" INITIALLY DEFERRED");
            }
            sql
        }
        Constraint::Exclude {
            name, definition, ..
        } => format!("{}{definition}", named(name)),
    }
}

fn create_table_ddl(table: &Table, quote: fn(&str) -> String) -> String {
    let mut parts: Vec<String> = table
        .columns
        .iter()
        .map(|c| format!("  {}", column_ddl(c, quote)))
        .collect();

    // Column-level flags already cover single-column UNIQUE; table-level
    // constraints carry the rest. Inline pk flags defer to the table-level
    // constraint when present.
    for constraint in &table.constraints {
        if constraint.is_single_column_unique() {
            continue;
        }
        parts.push(format!("  {}", constraint_ddl(constraint, quote)));
    }

    let mut sql = format!(
        "CREATE TABLE {} (\n{}\n)",
        quote(&table.name),
        parts.join(",\n")
    );

    if let Some(spec) = &table.partition {
        let key = spec
            .partition_key
            .iter()
            .map(|c| quote(c))
            .collect::<Vec<_>>()
            .join(", ");
        sql.push_str(&format!(" PARTITION BY {} ({})", spec.partition_type.as_str(), key));
    }
    sql.push(';');
    sql
}

fn create_index_ddl(index: &Index, table: &str, quote: fn(&str) -> String) -> String {
    let unique = if index.unique { "UNIQUE " } else { "" };
    let columns = index
        .columns
        .iter()
        .map(|c| {
            // Expression entries carry their own parentheses or calls.
            if c.chars().all(|ch| ch.is_alphanumeric() || ch == '_') {
                quote(c)
            } else {
                format!("({c})")
            }
        })
        .collect::<Vec<_>>()
        .join(", ");

    let mut sql = format!(
        "CREATE {unique}INDEX {} ON {}",
        quote(&index.name),
        quote(table)
    );
    if index.method != crate::ir::IndexMethod::Btree {
        sql.push_str(&format!(" USING {}", index.method.as_str()));
    }
    sql.push_str(&format!(" ({columns})"));
    if !index.include.is_empty() {
        let include = index
            .include
            .iter()
            .map(|c| quote(c))
            .collect::<Vec<_>>()
            .join(", ");
        sql.push_str(&format!(" INCLUDE ({include})"));
    }
    if let Some(predicate) = &index.where_clause {
        sql.push_str(&format!(" WHERE {predicate}"));
    }
    sql.push(';');
    sql
}

fn quote_literal(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

/// PostgreSQL-family rendering. Every change the differ can emit has a
/// counterpart except whole-partition transitions, which require a table
/// rewrite the executor must plan itself.
pub fn render_postgres_change(change: &Change) -> Option<String> {
    let q = quote_ident;
    let parent = change.parent_name.as_deref().unwrap_or("");

    let sql = match (change.action, change.object_type) {
        (ChangeAction::Create, ObjectType::Extension) => {
            format!("CREATE EXTENSION IF NOT EXISTS {};", q(&change.object_name))
        }
        (ChangeAction::Drop, ObjectType::Extension) => {
            format!("DROP EXTENSION IF EXISTS {};", q(&change.object_name))
        }
        (ChangeAction::Create, ObjectType::Enum) => {
            let Some(ChangeDetail::Enum(e)) = &change.after else {
                return None;
            };
            let values = e
                .values
                .iter()
                .map(|v| quote_literal(v))
                .collect::<Vec<_>>()
                .join(", ");
            format!("CREATE TYPE {} AS ENUM ({});", q(&e.name), values)
        }
        (ChangeAction::Alter, ObjectType::Enum) => {
            // Appended values alter in place; anything else needs a rebuild.
            let (Some(ChangeDetail::Enum(old)), Some(ChangeDetail::Enum(new))) =
                (&change.before, &change.after)
            else {
                return None;
            };
            if new.values.len() > old.values.len() && new.values[..old.values.len()] == old.values[..] {
                let added = &new.values[old.values.len()..];
                return Some(
                    added
                        .iter()
                        .map(|v| {
                            format!("ALTER TYPE {} ADD VALUE {};", q(&new.name), quote_literal(v))
                        })
                        .collect::<Vec<_>>()
                        .join("\n"),
                );
            }
            return None;
        }
        (ChangeAction::Drop, ObjectType::Enum) => {
            format!("DROP TYPE IF EXISTS {};", q(&change.object_name))
        }
        (ChangeAction::Create, ObjectType::Domain) => {
            let Some(ChangeDetail::Domain(d)) = &change.after else {
                return None;
            };
            let mut sql = format!("CREATE DOMAIN {} AS {}", q(&d.name), d.base_type);
            if d.not_null {
                sql.push_str(" NOT NULL");
            }
            if let Some(default) = &d.default {
                sql.push_str(&format!(" DEFAULT {default}"));
            }
            if let Some(check) = &d.check {
                sql.push_str(&format!(" CHECK ({check})"));
            }
            sql.push(';');
            sql
        }
        (ChangeAction::Drop, ObjectType::Domain) => {
            format!("DROP DOMAIN IF EXISTS {};", q(&change.object_name))
        }
        (ChangeAction::Create, ObjectType::CompositeType) => {
            let Some(ChangeDetail::CompositeType(c)) = &change.after else {
                return None;
            };
            let attrs = c
                .attributes
                .iter()
                .map(|a| format!("{} {}", q(&a.name), a.type_name))
                .collect::<Vec<_>>()
                .join(", ");
            format!("CREATE TYPE {} AS ({});", q(&c.name), attrs)
        }
        (ChangeAction::Drop, ObjectType::CompositeType) => {
            format!("DROP TYPE IF EXISTS {};", q(&change.object_name))
        }
        (ChangeAction::Create, ObjectType::Sequence) => {
            let Some(ChangeDetail::Sequence(s)) = &change.after else {
                return None;
            };
            let mut sql = format!("CREATE SEQUENCE {}", q(&s.name));
            if let Some(increment) = s.increment {
                sql.push_str(&format!(" INCREMENT BY {increment}"));
            }
            if let Some(start) = s.start {
                sql.push_str(&format!(" START WITH {start}"));
            }
            if s.cycle {
                sql.push_str(" CYCLE");
            }
            sql.push(';');
            sql
        }
        (ChangeAction::Drop, ObjectType::Sequence) => {
            format!("DROP SEQUENCE IF EXISTS {};", q(&change.object_name))
        }
        (ChangeAction::Create, ObjectType::Table) => {
            let Some(ChangeDetail::Table(t)) = &change.after else {
                return None;
            };
            create_table_ddl(t, q)
        }
        (ChangeAction::Drop, ObjectType::Table) => {
            format!("DROP TABLE IF EXISTS {};", q(&change.object_name))
        }
        (ChangeAction::Rename, ObjectType::Table) => {
            let Some(ChangeDetail::Table(old)) = &change.before else {
                return None;
            };
            format!(
                "ALTER TABLE {} RENAME TO {};",
                q(&old.name),
                q(&change.object_name)
            )
        }
        (ChangeAction::Create, ObjectType::Column) => {
            let Some(ChangeDetail::Column(col)) = &change.after else {
                return None;
            };
            format!(
                "ALTER TABLE {} ADD COLUMN {};",
                q(parent),
                column_ddl(col, q)
            )
        }
        (ChangeAction::Drop, ObjectType::Column) => {
            format!(
                "ALTER TABLE {} DROP COLUMN {};",
                q(parent),
                q(&change.object_name)
            )
        }
        (ChangeAction::Rename, ObjectType::Column) => {
            let Some(ChangeDetail::Column(old)) = &change.before else {
                return None;
            };
            format!(
                "ALTER TABLE {} RENAME COLUMN {} TO {};",
                q(parent),
                q(&old.name),
                q(&change.object_name)
            )
        }
        (ChangeAction::Alter, ObjectType::Column) => {
            let (Some(ChangeDetail::Column(old)), Some(ChangeDetail::Column(new))) =
                (&change.before, &change.after)
            else {
                return None;
            };
            let mut statements = Vec::new();
            let table = q(parent);
            let name = q(&new.name);
            if !crate::normalize::types_equivalent(&old.type_name, &new.type_name)
                || old.max_length != new.max_length
                || old.precision != new.precision
                || old.scale != new.scale
            {
                statements.push(format!(
                    "ALTER TABLE {table} ALTER COLUMN {name} TYPE {} USING {name}::{};",
                    new.rendered_type(),
                    new.rendered_type()
                ));
            }
            if old.nullable != new.nullable {
                let verb = if new.nullable { "DROP" } else { "SET" };
                statements.push(format!(
                    "ALTER TABLE {table} ALTER COLUMN {name} {verb} NOT NULL;"
                ));
            }
            if !crate::normalize::defaults_equivalent(old.default.as_deref(), new.default.as_deref())
            {
                match &new.default {
                    Some(default) => statements.push(format!(
                        "ALTER TABLE {table} ALTER COLUMN {name} SET DEFAULT {default};"
                    )),
                    None => statements.push(format!(
                        "ALTER TABLE {table} ALTER COLUMN {name} DROP DEFAULT;"
                    )),
                }
            }
            if statements.is_empty() {
                return None;
            }
            statements.join("\n")
        }
        (ChangeAction::Create, ObjectType::Index) => {
            let Some(ChangeDetail::Index(idx)) = &change.after else {
                return None;
            };
            create_index_ddl(idx, parent, q)
        }
        (ChangeAction::Drop, ObjectType::Index) => {
            format!("DROP INDEX IF EXISTS {};", q(&change.object_name))
        }
        (ChangeAction::Rename, ObjectType::Index) => {
            let Some(ChangeDetail::Index(old)) = &change.before else {
                return None;
            };
            format!(
                "ALTER INDEX {} RENAME TO {};",
                q(&old.name),
                q(&change.object_name)
            )
        }
        (ChangeAction::Alter, ObjectType::Index) => {
            // Indexes rebuild: drop the old definition, create the new one.
            let (Some(ChangeDetail::Index(old)), Some(ChangeDetail::Index(new))) =
                (&change.before, &change.after)
            else {
                return None;
            };
            format!(
                "DROP INDEX IF EXISTS {};\n{}",
                q(&old.name),
                create_index_ddl(new, parent, q)
            )
        }
        (ChangeAction::Create, ObjectType::Constraint) => {
            let Some(ChangeDetail::Constraint(c)) = &change.after else {
                return None;
            };
            format!(
                "ALTER TABLE {} ADD {};",
                q(parent),
                constraint_ddl(c, q)
            )
        }
        (ChangeAction::Drop, ObjectType::Constraint) => {
            format!(
                "ALTER TABLE {} DROP CONSTRAINT {};",
                q(parent),
                q(&change.object_name)
            )
        }
        (ChangeAction::Alter, ObjectType::Constraint) => {
            let Some(ChangeDetail::Constraint(new)) = &change.after else {
                return None;
            };
            format!(
                "ALTER TABLE {} DROP CONSTRAINT {};\nALTER TABLE {} ADD {};",
                q(parent),
                q(&change.object_name),
                q(parent),
                constraint_ddl(new, q)
            )
        }
        (ChangeAction::Create, ObjectType::View) => {
            let Some(ChangeDetail::View(v)) = &change.after else {
                return None;
            };
            let kind = if v.materialized { "MATERIALIZED VIEW" } else { "VIEW" };
            format!("CREATE {kind} {} AS {};", q(&v.name), v.definition.trim_end_matches(';'))
        }
        (ChangeAction::Alter, ObjectType::View) => {
            let Some(ChangeDetail::View(v)) = &change.after else {
                return None;
            };
            let kind = if v.materialized { "MATERIALIZED VIEW" } else { "VIEW" };
            format!(
                "DROP {kind} IF EXISTS {};\nCREATE {kind} {} AS {};",
                q(&v.name),
                q(&v.name),
                v.definition.trim_end_matches(';')
            )
        }
        (ChangeAction::Drop, ObjectType::View) => {
            format!("DROP VIEW IF EXISTS {};", q(&change.object_name))
        }
        (ChangeAction::Create | ChangeAction::Alter, ObjectType::Function) => {
            let Some(ChangeDetail::Function(f)) = &change.after else {
                return None;
            };
            let body = f.body.as_deref()?;
            let args = f.arg_types.join(", ");
            format!(
                "CREATE OR REPLACE FUNCTION {}({}) RETURNS {} LANGUAGE {} AS $$\n{}\n$$;",
                q(&f.name),
                args,
                f.returns,
                f.language,
                body
            )
        }
        (ChangeAction::Drop, ObjectType::Function) => {
            format!("DROP FUNCTION IF EXISTS {};", q(&change.object_name))
        }
        (ChangeAction::Create, ObjectType::Trigger) => {
            let Some(ChangeDetail::Trigger(t)) = &change.after else {
                return None;
            };
            let events = t
                .events
                .iter()
                .map(|e| e.as_sql())
                .collect::<Vec<_>>()
                .join(" OR ");
            let for_each = match t.for_each {
                crate::ir::TriggerForEach::Row => "ROW",
                crate::ir::TriggerForEach::Statement => "STATEMENT",
            };
            format!(
                "CREATE TRIGGER {} {} {} ON {} FOR EACH {} EXECUTE FUNCTION {}();",
                q(&t.name),
                t.timing.as_sql(),
                events,
                q(&t.table),
                for_each,
                q(&t.function_name)
            )
        }
        (ChangeAction::Drop, ObjectType::Trigger) => {
            format!(
                "DROP TRIGGER IF EXISTS {} ON {};",
                q(&change.object_name),
                q(parent)
            )
        }
        (_, ObjectType::TableComment) => {
            let comment = match &change.after {
                Some(ChangeDetail::Comment(text)) => quote_literal(text),
                _ => "NULL".to_string(),
            };
            format!("COMMENT ON TABLE {} IS {};", q(&change.object_name), comment)
        }
        (_, ObjectType::ColumnComment) => {
            let comment = match &change.after {
                Some(ChangeDetail::Comment(text)) => quote_literal(text),
                _ => "NULL".to_string(),
            };
            format!(
                "COMMENT ON COLUMN {}.{} IS {};",
                q(parent),
                q(&change.object_name),
                comment
            )
        }
        (_, ObjectType::IndexComment) => {
            let comment = match &change.after {
                Some(ChangeDetail::Comment(text)) => quote_literal(text),
                _ => "NULL".to_string(),
            };
            format!("COMMENT ON INDEX {} IS {};", q(&change.object_name), comment)
        }
        (ChangeAction::Create, ObjectType::PartitionChild) => {
            let Some(ChangeDetail::PartitionChild(child)) = &change.after else {
                return None;
            };
            format!(
                "CREATE TABLE {} PARTITION OF {} {};",
                q(&child.name),
                q(parent),
                child.bound
            )
        }
        (ChangeAction::Drop, ObjectType::PartitionChild) => {
            format!(
                "ALTER TABLE {} DETACH PARTITION {};\nDROP TABLE IF EXISTS {};",
                q(parent),
                q(&change.object_name),
                q(&change.object_name)
            )
        }
        // Whole-partition transitions rewrite the table; no direct DDL.
        (_, ObjectType::Partition) => return None,
        _ => return None,
    };

    Some(sql)
}

/// MySQL-family rendering: backtick quoting, no COMMENT ON, no
/// extensions/domains/composites, RENAME COLUMN via ALTER.
pub fn render_mysql_change(change: &Change) -> Option<String> {
    let q = quote_ident_mysql;
    let parent = change.parent_name.as_deref().unwrap_or("");

    match (change.action, change.object_type) {
        (
            _,
            ObjectType::Extension
            | ObjectType::Domain
            | ObjectType::CompositeType
            | ObjectType::Enum
            | ObjectType::Partition
            | ObjectType::TableComment
            | ObjectType::ColumnComment
            | ObjectType::IndexComment,
        ) => None,
        (ChangeAction::Create, ObjectType::Table) => {
            let Some(ChangeDetail::Table(t)) = &change.after else {
                return None;
            };
            Some(create_table_ddl(t, q))
        }
        (ChangeAction::Drop, ObjectType::Table) => {
            Some(format!("DROP TABLE IF EXISTS {};", q(&change.object_name)))
        }
        (ChangeAction::Rename, ObjectType::Table) => {
            let Some(ChangeDetail::Table(old)) = &change.before else {
                return None;
            };
            Some(format!(
                "RENAME TABLE {} TO {};",
                q(&old.name),
                q(&change.object_name)
            ))
        }
        (ChangeAction::Create, ObjectType::Column) => {
            let Some(ChangeDetail::Column(col)) = &change.after else {
                return None;
            };
            Some(format!(
                "ALTER TABLE {} ADD COLUMN {};",
                q(parent),
                column_ddl(col, q)
            ))
        }
        (ChangeAction::Drop, ObjectType::Column) => Some(format!(
            "ALTER TABLE {} DROP COLUMN {};",
            q(parent),
            q(&change.object_name)
        )),
        (ChangeAction::Rename, ObjectType::Column) => {
            let Some(ChangeDetail::Column(old)) = &change.before else {
                return None;
            };
            Some(format!(
                "ALTER TABLE {} RENAME COLUMN {} TO {};",
                q(parent),
                q(&old.name),
                q(&change.object_name)
            ))
        }
        (ChangeAction::Alter, ObjectType::Column) => {
            let Some(ChangeDetail::Column(new)) = &change.after else {
                return None;
            };
            Some(format!(
                "ALTER TABLE {} MODIFY COLUMN {};",
                q(parent),
                column_ddl(new, q)
            ))
        }
        (ChangeAction::Create, ObjectType::Index) => {
            let Some(ChangeDetail::Index(idx)) = &change.after else {
                return None;
            };
            Some(create_index_ddl(idx, parent, q))
        }
        (ChangeAction::Drop, ObjectType::Index) => Some(format!(
            "DROP INDEX {} ON {};",
            q(&change.object_name),
            q(parent)
        )),
        (ChangeAction::Create, ObjectType::Constraint) => {
            let Some(ChangeDetail::Constraint(c)) = &change.after else {
                return None;
            };
            Some(format!("ALTER TABLE {} ADD {};", q(parent), constraint_ddl(c, q)))
        }
        (ChangeAction::Drop, ObjectType::Constraint) => Some(format!(
            "ALTER TABLE {} DROP CONSTRAINT {};",
            q(parent),
            q(&change.object_name)
        )),
        (ChangeAction::Create | ChangeAction::Alter, ObjectType::View) => {
            let Some(ChangeDetail::View(v)) = &change.after else {
                return None;
            };
            Some(format!(
                "CREATE OR REPLACE VIEW {} AS {};",
                q(&v.name),
                v.definition.trim_end_matches(';')
            ))
        }
        (ChangeAction::Drop, ObjectType::View) => {
            Some(format!("DROP VIEW IF EXISTS {};", q(&change.object_name)))
        }
        _ => render_postgres_change(change),
    }
}

/// SQLite-family rendering: additive column changes only; in-place
/// column alters need a table rebuild the executor must plan.
pub fn render_sqlite_change(change: &Change) -> Option<String> {
    let q = quote_ident;
    let parent = change.parent_name.as_deref().unwrap_or("");

    match (change.action, change.object_type) {
        (
            _,
            ObjectType::Extension
            | ObjectType::Domain
            | ObjectType::CompositeType
            | ObjectType::Enum
            | ObjectType::Sequence
            | ObjectType::Function
            | ObjectType::Partition
            | ObjectType::PartitionChild
            | ObjectType::TableComment
            | ObjectType::ColumnComment
            | ObjectType::IndexComment,
        ) => None,
        (ChangeAction::Alter, ObjectType::Column | ObjectType::Constraint) => None,
        (ChangeAction::Create, ObjectType::Constraint) => None,
        (ChangeAction::Drop, ObjectType::Constraint) => None,
        (ChangeAction::Rename, ObjectType::Index) => None,
        (ChangeAction::Drop, ObjectType::Column) => Some(format!(
            "ALTER TABLE {} DROP COLUMN {};",
            q(parent),
            q(&change.object_name)
        )),
        _ => render_postgres_change(change),
    }
}
