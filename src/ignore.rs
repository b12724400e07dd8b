//! `.relqignore` handling
//!
//! A plain-text file of glob patterns by object kind, applied to the
//! introspected IR before diffing or codegen. Kinds: `table:`,
//! `column:table.col`, `index:table:idx`, `constraint:`, `enum:`,
//! `domain:`, `composite:`, `function:`. `#` starts a comment; malformed
//! lines degrade to warnings rather than failing the sync.

use std::path::Path;

use crate::diagnostics::{Diagnostic, DiagnosticCategory, Severity};
use crate::ir::Schema;

pub const FILE_NAME: &str = ".relqignore";

/// Single-`*` wildcard match, anchored at both ends.
fn wildcard_match(pattern: &str, value: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == value;
    }

    let mut remainder = value;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        match remainder.find(part) {
            Some(pos) => {
                // The first part must anchor at the start.
                if i == 0 && pos != 0 {
                    return false;
                }
                remainder = &remainder[pos + part.len()..];
            }
            None => return false,
        }
    }
    // The last part must anchor at the end.
    parts.last().is_some_and(|last| last.is_empty() || value.ends_with(last))
}

#[derive(Debug, Clone)]
enum IgnoreRule {
    Table(String),
    Column { table: String, column: String },
    Index { table: String, index: String },
    Constraint(String),
    Enum(String),
    Domain(String),
    Composite(String),
    Function(String),
}

/// Parsed ignore file: rules plus warnings for lines that did not parse.
#[derive(Debug, Default)]
pub struct IgnoreFile {
    rules: Vec<IgnoreRule>,
    pub diagnostics: Vec<Diagnostic>,
}

impl IgnoreFile {
    pub fn parse(text: &str) -> Self {
        let mut file = Self::default();

        for (line_no, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((kind, pattern)) = line.split_once(':') else {
                file.warn(line_no + 1, raw, "missing 'kind:' prefix");
                continue;
            };
            let pattern = pattern.trim();
            if pattern.is_empty() {
                file.warn(line_no + 1, raw, "empty pattern");
                continue;
            }

            let rule = match kind.trim() {
                "table" => IgnoreRule::Table(pattern.to_string()),
                "column" => match pattern.split_once('.') {
                    Some((table, column)) if !column.is_empty() => IgnoreRule::Column {
                        table: table.to_string(),
                        column: column.to_string(),
                    },
                    _ => {
                        file.warn(line_no + 1, raw, "column patterns use 'table.column'");
                        continue;
                    }
                },
                "index" => match pattern.split_once(':') {
                    Some((table, index)) if !index.is_empty() => IgnoreRule::Index {
                        table: table.to_string(),
                        index: index.to_string(),
                    },
                    _ => {
                        file.warn(line_no + 1, raw, "index patterns use 'table:index'");
                        continue;
                    }
                },
                "constraint" => IgnoreRule::Constraint(pattern.to_string()),
                "enum" => IgnoreRule::Enum(pattern.to_string()),
                "domain" => IgnoreRule::Domain(pattern.to_string()),
                "composite" => IgnoreRule::Composite(pattern.to_string()),
                "function" => IgnoreRule::Function(pattern.to_string()),
                other => {
                    file.warn(line_no + 1, raw, &format!("unknown kind '{other}'"));
                    continue;
                }
            };
            file.rules.push(rule);
        }

        file
    }

    /// Read and parse the ignore file at the project root; `None` when
    /// the file does not exist.
    pub fn load(project_root: &Path) -> std::io::Result<Option<Self>> {
        let path = project_root.join(FILE_NAME);
        if !path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(path)?;
        Ok(Some(Self::parse(&text)))
    }

    fn warn(&mut self, line: usize, raw: &str, reason: &str) {
        self.diagnostics.push(Diagnostic::uncoded(
            Severity::Warning,
            DiagnosticCategory::Sql,
            Some(format!("{FILE_NAME}:{line}")),
            format!("ignored malformed line '{}': {reason}", raw.trim()),
        ));
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Strip everything the patterns match from the IR.
    pub fn apply(&self, schema: &mut Schema) {
        if self.rules.is_empty() {
            return;
        }

        let ignored_tables: Vec<String> = schema
            .tables
            .keys()
            .filter(|name| self.matches_table(name))
            .cloned()
            .collect();
        for name in ignored_tables {
            schema.remove_table(&name);
        }

        for table in schema.tables.values_mut() {
            let table_name = table.name.clone();
            table
                .columns
                .retain(|c| !self.matches_column(&table_name, &c.name));
            table
                .indexes
                .retain(|i| !self.matches_index(&table_name, &i.name));
            table.constraints.retain(|c| {
                !c.name().is_some_and(|n| self.matches_constraint(n))
                    && !c.columns().iter().any(|col| self.matches_column(&table_name, col))
            });
        }

        schema.enums.retain(|e| !self.matches_kind(&e.name, kind_enum));
        schema.domains.retain(|d| !self.matches_kind(&d.name, kind_domain));
        schema
            .composite_types
            .retain(|c| !self.matches_kind(&c.name, kind_composite));
        schema
            .functions
            .retain(|f| !self.matches_kind(&f.name, kind_function));
        // Triggers on ignored tables or ignored functions go with them.
        let table_names: Vec<String> = schema.tables.keys().cloned().collect();
        schema.triggers.retain(|t| {
            table_names.contains(&t.table) && !self.matches_kind(&t.function_name, kind_function)
        });
    }

    fn matches_table(&self, name: &str) -> bool {
        self.rules.iter().any(|r| match r {
            IgnoreRule::Table(pattern) => wildcard_match(pattern, name),
            _ => false,
        })
    }

    fn matches_column(&self, table: &str, column: &str) -> bool {
        self.rules.iter().any(|r| match r {
            IgnoreRule::Column {
                table: table_pattern,
                column: column_pattern,
            } => wildcard_match(table_pattern, table) && wildcard_match(column_pattern, column),
            _ => false,
        })
    }

    fn matches_index(&self, table: &str, index: &str) -> bool {
        self.rules.iter().any(|r| match r {
            IgnoreRule::Index {
                table: table_pattern,
                index: index_pattern,
            } => wildcard_match(table_pattern, table) && wildcard_match(index_pattern, index),
            _ => false,
        })
    }

    fn matches_constraint(&self, name: &str) -> bool {
        self.rules.iter().any(|r| match r {
            IgnoreRule::Constraint(pattern) => wildcard_match(pattern, name),
            _ => false,
        })
    }

    fn matches_kind(&self, name: &str, extract: fn(&IgnoreRule) -> Option<&str>) -> bool {
        self.rules
            .iter()
            .any(|r| extract(r).is_some_and(|pattern| wildcard_match(pattern, name)))
    }
}

fn kind_enum(rule: &IgnoreRule) -> Option<&str> {
    match rule {
        IgnoreRule::Enum(p) => Some(p),
        _ => None,
    }
}

fn kind_domain(rule: &IgnoreRule) -> Option<&str> {
    match rule {
        IgnoreRule::Domain(p) => Some(p),
        _ => None,
    }
}

fn kind_composite(rule: &IgnoreRule) -> Option<&str> {
    match rule {
        IgnoreRule::Composite(p) => Some(p),
        _ => None,
    }
}

fn kind_function(rule: &IgnoreRule) -> Option<&str> {
    match rule {
        IgnoreRule::Function(p) => Some(p),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::builder::SchemaBuilder;

    #[test]
    fn test_wildcard_match() {
        assert!(wildcard_match("users", "users"));
        assert!(wildcard_match("users_*", "users_archive"));
        assert!(wildcard_match("*_tmp", "orders_tmp"));
        assert!(wildcard_match("*", "anything"));
        assert!(wildcard_match("a*c", "abc"));
        assert!(wildcard_match("a*c", "ac"));
        assert!(!wildcard_match("users_*", "users"));
        assert!(!wildcard_match("a*c", "acb"));
        assert!(!wildcard_match("users", "users_archive"));
    }

    #[test]
    fn test_parse_and_apply() {
        let text = "\
# scratch objects
table:tmp_*
column:users.legacy_*
index:users:users_old_*
enum:unused_status
function:debug_*
";
        let ignore = IgnoreFile::parse(text);
        assert!(ignore.diagnostics.is_empty());

        let mut schema = SchemaBuilder::new()
            .enum_type("unused_status", &["a"])
            .enum_type("status", &["b"])
            .function("debug_dump", "void", "sql", "SELECT 1")
            .function("touch", "trigger", "plpgsql", "BEGIN RETURN NEW; END")
            .table("users", |t| {
                t.column("id", "uuid", false)
                    .column("legacy_flags", "integer", true)
                    .index("users_old_email_idx", &["id"], false)
                    .index("users_id_idx", &["id"], false);
            })
            .table("tmp_import", |t| {
                t.column("id", "bigint", false);
            })
            .build();

        ignore.apply(&mut schema);

        assert!(!schema.has_table("tmp_import"));
        let users = schema.get_table("users").unwrap();
        assert!(users.get_column("legacy_flags").is_none());
        assert!(users.get_column("id").is_some());
        assert!(users.get_index("users_old_email_idx").is_none());
        assert!(users.get_index("users_id_idx").is_some());
        assert_eq!(schema.enums.len(), 1);
        assert_eq!(schema.enums[0].name, "status");
        assert_eq!(schema.functions.len(), 1);
        assert_eq!(schema.functions[0].name, "touch");
    }

    #[test]
    fn test_malformed_lines_warn_but_do_not_fail() {
        let text = "\
table:ok_*
not a rule
column:missing_dot
widget:users
";
        let ignore = IgnoreFile::parse(text);
        assert_eq!(ignore.diagnostics.len(), 3, "{:?}", ignore.diagnostics);
        assert!(!ignore.is_empty());
        for d in &ignore.diagnostics {
            assert_eq!(d.severity, Severity::Warning);
            assert!(d.location.as_deref().unwrap().starts_with(".relqignore:"));
        }
    }

    #[test]
    fn test_dropping_table_drops_its_triggers() {
        let text = "table:audit_*\n";
        let ignore = IgnoreFile::parse(text);

        let mut schema = SchemaBuilder::new()
            .table("audit_log", |t| {
                t.column("id", "bigint", false);
            })
            .table("users", |t| {
                t.column("id", "uuid", false);
            })
            .trigger(
                "audit_touch",
                "audit_log",
                crate::ir::TriggerTiming::After,
                &[crate::ir::TriggerEvent::Insert],
                "log_audit",
            )
            .build();

        ignore.apply(&mut schema);
        assert!(schema.triggers.is_empty());
        assert!(schema.has_table("users"));
    }

    #[test]
    fn test_constraint_referencing_ignored_column_is_dropped() {
        let text = "column:orders.discount\n";
        let ignore = IgnoreFile::parse(text);

        let mut schema = SchemaBuilder::new()
            .table("orders", |t| {
                t.column("id", "bigint", false)
                    .column("discount", "numeric", true)
                    .unique("orders_discount_key", &["discount"]);
            })
            .build();

        ignore.apply(&mut schema);
        let orders = schema.get_table("orders").unwrap();
        assert!(orders.get_column("discount").is_none());
        assert!(orders.constraints.is_empty());
    }
}
