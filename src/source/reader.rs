//! Schema source reader
//!
//! Reconstructs a partial IR from the generated schema file, well enough
//! to drive the differ and to recover tracking tokens — including after
//! hand edits. The reader is deliberately tolerant: lines it cannot
//! match are skipped, and whatever is missing gets filled from the live
//! introspection result when a concrete diff is needed.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::ir::{Constraint, ForeignKeyAction, Schema, Table};
use crate::schema_dsl::{self, Relation};

/// What one file parse recovered.
#[derive(Debug, Default)]
pub struct ParsedSource {
    pub schema: Schema,
    /// Foreign-key edges from the relations block, also folded into the
    /// schema's table constraints.
    pub relations: Vec<Relation>,
    /// Function definitions found in this file (expected only in the
    /// companion file; their presence in the main schema file is a sync
    /// guard condition).
    pub has_function_defs: bool,
    /// Same for trigger definitions.
    pub has_trigger_defs: bool,
}

static FN_HEADER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^pub fn ([A-Za-z_][A-Za-z0-9_]*)\(\) -> ([A-Za-z]+)").unwrap());
static STR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#""((?:[^"\\]|\\.)*)""#).unwrap());
static TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"\.token\("([a-z0-9]+)"\)"#).unwrap());
static CALL_2STR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\s*(table|enum_def|domain|sequence|view|function|trigger|relation)\(\s*"((?:[^"\\]|\\.)*)"(?:\s*,\s*"((?:[^"\\]|\\.)*)")?"#).unwrap()
});
static COLUMN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\.column\(col\("((?:[^"\\]|\\.)*)",\s*"((?:[^"\\]|\\.)*)"\)(.*)\)\s*$"#).unwrap()
});
static INDEX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\.index\(idx\("((?:[^"\\]|\\.)*)",\s*&\[([^\]]*)\]\)(.*)\)\s*$"#).unwrap()
});
static CHECK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\s*\.check\("((?:[^"\\]|\\.)*)",\s*"((?:[^"\\]|\\.)*)"\)\s*$"#).unwrap()
});
static UNIQUE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\s*\.unique\("((?:[^"\\]|\\.)*)",\s*&\[([^\]]*)\]\)\s*$"#).unwrap()
});
static EXCLUDE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\s*\.exclude\("((?:[^"\\]|\\.)*)",\s*"((?:[^"\\]|\\.)*)"\)\s*$"#).unwrap()
});
static COMMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^\s*\.comment\("((?:[^"\\]|\\.)*)"\)\s*$"#).unwrap());
static TABLE_TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^\s*\.token\("([a-z0-9]+)"\)\s*$"#).unwrap());
static PARTITION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\s*\.(list|range|hash)_partition\(&\[([^\]]*)\],\s*&\[(.*)\]\)\s*$"#).unwrap()
});
static PARTITION_CHILD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\(\s*"((?:[^"\\]|\\.)*)",\s*"((?:[^"\\]|\\.)*)"\s*\)"#).unwrap()
});
static DEFAULT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\.default_sql\("((?:[^"\\]|\\.)*)"\)"#).unwrap());
static DEV_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\.dev_name\("((?:[^"\\]|\\.)*)"\)"#).unwrap());
static GENERATED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\.generated\("((?:[^"\\]|\\.)*)"\)"#).unwrap());
static INLINE_CHECK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\.check\("((?:[^"\\]|\\.)*)",\s*&\[([^\]]*)\]\)"#).unwrap()
});
static METHOD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\.method\("([a-z]+)"\)"#).unwrap());
static WHERE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\.where_sql\("((?:[^"\\]|\\.)*)"\)"#).unwrap());
static INCLUDE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\.include\(&\[([^\]]*)\]\)"#).unwrap());
static FROM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\.from\("((?:[^"\\]|\\.)*)",\s*&\[([^\]]*)\]\)"#).unwrap()
});
static TO_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\.to\("((?:[^"\\]|\\.)*)",\s*&\[([^\]]*)\]\)"#).unwrap()
});
static ON_DELETE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\.on_delete\("((?:[^"\\]|\\.)*)"\)"#).unwrap());
static ON_UPDATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\.on_update\("((?:[^"\\]|\\.)*)"\)"#).unwrap());
static LIST_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"&\[([^\]]*)\]").unwrap());
static COMMENT_INLINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\.comment\("((?:[^"\\]|\\.)*)"\)"#).unwrap());

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn string_list(raw: &str) -> Vec<String> {
    STR_RE
        .captures_iter(raw)
        .map(|c| unescape(&c[1]))
        .collect()
}

/// Parse one generated source file.
pub fn parse_source(text: &str) -> ParsedSource {
    let mut parsed = ParsedSource::default();
    let lines: Vec<&str> = text.lines().collect();
    let mut i = 0;

    while i < lines.len() {
        let Some(header) = FN_HEADER_RE.captures(lines[i]) else {
            i += 1;
            continue;
        };
        let return_type = header[2].to_string();

        // Collect the block body up to the closing brace at column 0.
        let mut body = Vec::new();
        i += 1;
        while i < lines.len() && lines[i] != "}" {
            body.push(lines[i]);
            i += 1;
        }
        i += 1;

        match return_type.as_str() {
            "TableDef" => {
                if let Some(table) = parse_table_block(&body) {
                    parsed.schema.insert_table(table);
                }
            }
            "EnumDef" => parse_enum_block(&body, &mut parsed.schema),
            "DomainDef" => parse_domain_block(&body, &mut parsed.schema),
            "SequenceDef" => parse_sequence_block(&body, &mut parsed.schema),
            "ViewDef" => parse_view_block(&body, &mut parsed.schema),
            "FunctionDef" => {
                parsed.has_function_defs = true;
                parse_function_block(&body, &mut parsed.schema);
            }
            "TriggerDef" => {
                parsed.has_trigger_defs = true;
                parse_trigger_block(&body, &mut parsed.schema);
            }
            // `pub fn relations() -> Vec<Relation>` captures as "Vec".
            "Vec" => parse_relations_block(&body, &mut parsed),
            _ => {}
        }
    }

    fold_relations(&mut parsed);
    parsed
}

fn parse_table_block(body: &[&str]) -> Option<Table> {
    let first = body.first()?;
    let call = CALL_2STR_RE.captures(first)?;
    if &call[1] != "table" {
        return None;
    }
    let mut def = schema_dsl::table(&unescape(&call[2]));
    if let Some(token) = TOKEN_RE.captures(first) {
        def = def.token(&token[1]);
    }

    for line in &body[1..] {
        if let Some(caps) = COLUMN_RE.captures(line) {
            let mut col = schema_dsl::col(&unescape(&caps[1]), &unescape(&caps[2]));
            let chain = &caps[3];
            if chain.contains(".primary_key()") {
                col = col.primary_key();
            }
            if chain.contains(".not_null()") {
                col = col.not_null();
            }
            if chain.contains(".unique()") {
                col = col.unique();
            }
            if let Some(c) = DEFAULT_RE.captures(chain) {
                col = col.default_sql(&unescape(&c[1]));
            }
            if let Some(c) = DEV_NAME_RE.captures(chain) {
                col = col.dev_name(&unescape(&c[1]));
            }
            if let Some(c) = GENERATED_RE.captures(chain) {
                col = col.generated(&unescape(&c[1]));
            }
            if let Some(c) = INLINE_CHECK_RE.captures(chain) {
                let values = string_list(&c[2]);
                let refs: Vec<&str> = values.iter().map(|v| v.as_str()).collect();
                col = col.check(&unescape(&c[1]), &refs);
            }
            if let Some(c) = COMMENT_INLINE_RE.captures(chain) {
                col = col.comment(&unescape(&c[1]));
            }
            if let Some(c) = TOKEN_RE.captures(chain) {
                col = col.token(&c[1]);
            }
            def = def.column(col);
        } else if let Some(caps) = INDEX_RE.captures(line) {
            let mut idx = {
                let columns = string_list(&caps[2]);
                let refs: Vec<&str> = columns.iter().map(|c| c.as_str()).collect();
                schema_dsl::idx(&unescape(&caps[1]), &refs)
            };
            let chain = &caps[3];
            if chain.contains(".unique()") {
                idx = idx.unique();
            }
            if let Some(c) = METHOD_RE.captures(chain) {
                idx = idx.method(&c[1]);
            }
            if let Some(c) = WHERE_RE.captures(chain) {
                idx = idx.where_sql(&unescape(&c[1]));
            }
            if let Some(c) = INCLUDE_RE.captures(chain) {
                let include = string_list(&c[1]);
                let refs: Vec<&str> = include.iter().map(|c| c.as_str()).collect();
                idx = idx.include(&refs);
            }
            if let Some(c) = TOKEN_RE.captures(chain) {
                idx = idx.token(&c[1]);
            }
            def = def.index(idx);
        } else if let Some(caps) = CHECK_RE.captures(line) {
            def = def.check(&unescape(&caps[1]), &unescape(&caps[2]));
        } else if let Some(caps) = UNIQUE_RE.captures(line) {
            let columns = string_list(&caps[2]);
            let refs: Vec<&str> = columns.iter().map(|c| c.as_str()).collect();
            def = def.unique(&unescape(&caps[1]), &refs);
        } else if let Some(caps) = EXCLUDE_RE.captures(line) {
            def = def.exclude(&unescape(&caps[1]), &unescape(&caps[2]));
        } else if let Some(caps) = COMMENT_RE.captures(line) {
            def = def.comment(&unescape(&caps[1]));
        } else if let Some(caps) = TABLE_TOKEN_RE.captures(line) {
            def = def.token(&caps[1]);
        } else if let Some(caps) = PARTITION_RE.captures(line) {
            let key = string_list(&caps[2]);
            let key_refs: Vec<&str> = key.iter().map(|k| k.as_str()).collect();
            let children: Vec<(String, String)> = PARTITION_CHILD_RE
                .captures_iter(&caps[3])
                .map(|c| (unescape(&c[1]), unescape(&c[2])))
                .collect();
            let child_refs: Vec<(&str, &str)> = children
                .iter()
                .map(|(n, b)| (n.as_str(), b.as_str()))
                .collect();
            def = match &caps[1] {
                "list" => def.list_partition(&key_refs, &child_refs),
                "hash" => def.hash_partition(&key_refs, &child_refs),
                _ => def.range_partition(&key_refs, &child_refs),
            };
        }
        // Unmatched lines are tolerated; the live side fills the gaps.
    }

    Some(def.build())
}

fn parse_enum_block(body: &[&str], schema: &mut Schema) {
    let Some(first) = body.first() else { return };
    let Some(call) = CALL_2STR_RE.captures(first) else {
        return;
    };
    if &call[1] != "enum_def" {
        return;
    }
    let name = unescape(&call[2]);
    let values = LIST_RE
        .captures(first)
        .map(|c| string_list(&c[1]))
        .unwrap_or_default();
    let refs: Vec<&str> = values.iter().map(|v| v.as_str()).collect();
    let mut def = schema_dsl::enum_def(&name, &refs);
    if let Some(token) = TOKEN_RE.captures(first) {
        def = def.token(&token[1]);
    }
    schema.enums.push(def.build());
}

fn parse_domain_block(body: &[&str], schema: &mut Schema) {
    let Some(first) = body.first() else { return };
    let Some(call) = CALL_2STR_RE.captures(first) else {
        return;
    };
    if &call[1] != "domain" {
        return;
    }
    let mut def = schema_dsl::domain(
        &unescape(&call[2]),
        &call.get(3).map(|m| unescape(m.as_str())).unwrap_or_default(),
    );
    if first.contains(".not_null()") {
        def = def.not_null();
    }
    if let Some(c) = DEFAULT_RE.captures(first) {
        def = def.default_sql(&unescape(&c[1]));
    }
    if let Some(c) = Regex::new(r#"\.check\("((?:[^"\\]|\\.)*)"\)"#)
        .ok()
        .and_then(|re| re.captures(first))
    {
        def = def.check(&unescape(&c[1]));
    }
    if let Some(c) = TOKEN_RE.captures(first) {
        def = def.token(&c[1]);
    }
    schema.domains.push(def.build());
}

fn parse_sequence_block(body: &[&str], schema: &mut Schema) {
    let Some(first) = body.first() else { return };
    let Some(call) = CALL_2STR_RE.captures(first) else {
        return;
    };
    if &call[1] != "sequence" {
        return;
    }
    let mut def = schema_dsl::sequence(&unescape(&call[2]));
    if let Some(c) = Regex::new(r"\.increment\((-?\d+)\)")
        .ok()
        .and_then(|re| re.captures(first))
        && let Ok(v) = c[1].parse()
    {
        def = def.increment(v);
    }
    if let Some(c) = Regex::new(r"\.start\((-?\d+)\)")
        .ok()
        .and_then(|re| re.captures(first))
        && let Ok(v) = c[1].parse()
    {
        def = def.start(v);
    }
    if first.contains(".cycle()") {
        def = def.cycle();
    }
    if let Some(c) = TOKEN_RE.captures(first) {
        def = def.token(&c[1]);
    }
    schema.sequences.push(def.build());
}

fn parse_view_block(body: &[&str], schema: &mut Schema) {
    let Some(first) = body.first() else { return };
    let Some(call) = CALL_2STR_RE.captures(first) else {
        return;
    };
    if &call[1] != "view" {
        return;
    }
    let mut def = schema_dsl::view(
        &unescape(&call[2]),
        &call.get(3).map(|m| unescape(m.as_str())).unwrap_or_default(),
    );
    if first.contains(".materialized()") {
        def = def.materialized();
    }
    if let Some(c) = TOKEN_RE.captures(first) {
        def = def.token(&c[1]);
    }
    schema.views.push(def.build());
}

fn parse_function_block(body: &[&str], schema: &mut Schema) {
    let text = body.join("\n");
    let Some(call) = CALL_2STR_RE.captures(&text) else {
        return;
    };
    if &call[1] != "function" {
        return;
    }
    let strings = string_list(&text);
    if strings.len() < 3 {
        return;
    }
    let mut def = schema_dsl::function(&strings[0], &strings[1], &strings[2]);
    if let Some(c) = Regex::new(r#"\.body\("((?:[^"\\]|\\.)*)"\)"#)
        .ok()
        .and_then(|re| re.captures(&text))
    {
        def = def.body(&unescape(&c[1]));
    }
    if let Some(c) = TOKEN_RE.captures(&text) {
        def = def.token(&c[1]);
    }
    schema.functions.push(def.build());
}

fn parse_trigger_block(body: &[&str], schema: &mut Schema) {
    let text = body.join("\n");
    let Some(call) = CALL_2STR_RE.captures(&text) else {
        return;
    };
    if &call[1] != "trigger" {
        return;
    }
    let name = unescape(&call[2]);
    let table = call.get(3).map(|m| unescape(m.as_str())).unwrap_or_default();
    let mut def = schema_dsl::trigger(&name, &table);
    if text.contains(".after()") {
        def = def.after();
    } else if text.contains(".instead_of()") {
        def = def.instead_of();
    } else {
        def = def.before();
    }
    if let Some(c) = Regex::new(r#"\.on\(&\[([^\]]*)\]\)"#)
        .ok()
        .and_then(|re| re.captures(&text))
    {
        let events = string_list(&c[1]);
        let refs: Vec<&str> = events.iter().map(|e| e.as_str()).collect();
        def = def.on(&refs);
    }
    if text.contains(".for_each_statement()") {
        def = def.for_each_statement();
    }
    if let Some(c) = Regex::new(r#"\.execute\("((?:[^"\\]|\\.)*)"\)"#)
        .ok()
        .and_then(|re| re.captures(&text))
    {
        def = def.execute(&unescape(&c[1]));
    }
    if let Some(c) = TOKEN_RE.captures(&text) {
        def = def.token(&c[1]);
    }
    schema.triggers.push(def.build());
}

fn parse_relations_block(body: &[&str], parsed: &mut ParsedSource) {
    let text = body.join("\n");
    // Entries are `relation("name")` through the trailing comma.
    for entry in text.split("relation(\"").skip(1) {
        let Some(name_end) = entry.find('"') else { continue };
        let name = entry[..name_end].to_string();
        let mut rel = schema_dsl::relation(&name);
        if let Some(c) = FROM_RE.captures(entry) {
            let columns = string_list(&c[2]);
            let refs: Vec<&str> = columns.iter().map(|c| c.as_str()).collect();
            rel = rel.from(&unescape(&c[1]), &refs);
        }
        if let Some(c) = TO_RE.captures(entry) {
            let columns = string_list(&c[2]);
            let refs: Vec<&str> = columns.iter().map(|c| c.as_str()).collect();
            rel = rel.to(&unescape(&c[1]), &refs);
        }
        if let Some(c) = ON_DELETE_RE.captures(entry) {
            rel = rel.on_delete(&c[1]);
        }
        if let Some(c) = ON_UPDATE_RE.captures(entry) {
            rel = rel.on_update(&c[1]);
        }
        if !rel.table.is_empty() {
            parsed.relations.push(rel);
        }
    }
}

/// Fold parsed relations back into FK constraints on their tables.
fn fold_relations(parsed: &mut ParsedSource) {
    for rel in &parsed.relations {
        let Some(table) = parsed.schema.get_table_mut(&rel.table) else {
            continue;
        };
        table.constraints.push(Constraint::ForeignKey {
            name: Some(format!("{}_{}_fk", rel.table, rel.columns.join("_"))),
            columns: rel.columns.clone(),
            ref_table: rel.ref_table.clone(),
            ref_columns: rel.ref_columns.clone(),
            on_delete: rel.on_delete.or(Some(ForeignKeyAction::NoAction)),
            on_update: rel.on_update,
            match_mode: None,
            deferrable: false,
            initially_deferred: false,
            token: None,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"//! Generated by relq. Tokens track object identity across syncs; edit them only if you know why.

use relq_core::schema_dsl::prelude::*;

pub fn user_role() -> EnumDef {
    enum_def("user_role", &["admin", "member"]).token("e0063z")
}

pub fn users() -> TableDef {
    table("users")
        .token("t00c7y")
        .column(col("id", "uuid").primary_key().default_sql("gen_random_uuid()").token("c00ibx"))
        .column(col("email", "text").not_null().unique().token("c00ofw"))
        .column(col("role", "user_role").not_null().default_sql("'member'").token("c00ujv"))
        .index(idx("users_email_key", &["email"]).unique().token("i010nu"))
}

pub fn orders() -> TableDef {
    table("orders")
        .token("t016my")
        .column(col("id", "bigint").primary_key().token("c01cl2"))
        .column(col("user_id", "uuid").not_null().token("c01ij6"))
        .column(col("status", "text").not_null().check("orders_status_check", &["open", "closed"]).token("c01oha"))
        .index(idx("orders_status_idx", &["status"]).token("i01ufe"))
}

pub fn relations() -> Vec<Relation> {
    vec![
        relation("user")
            .from("orders", &["user_id"])
            .to("users", &["id"])
            .on_delete("CASCADE"),
    ]
}
"#;

    #[test]
    fn test_reads_tables_columns_tokens() {
        let parsed = parse_source(SAMPLE);
        assert_eq!(parsed.schema.tables.len(), 2);

        let users = parsed.schema.get_table("users").unwrap();
        assert_eq!(users.token.as_ref().unwrap().as_str(), "t00c7y");
        assert_eq!(users.columns.len(), 3);

        let id = users.get_column("id").unwrap();
        assert!(id.primary_key);
        assert!(!id.nullable);
        assert_eq!(id.default.as_deref(), Some("gen_random_uuid()"));
        assert_eq!(id.token.as_ref().unwrap().as_str(), "c00ibx");

        let email = users.get_column("email").unwrap();
        assert!(email.unique);
        assert!(!email.nullable);

        assert_eq!(users.indexes.len(), 1);
        assert!(users.indexes[0].unique);
        assert_eq!(users.indexes[0].columns, vec!["email"]);
    }

    #[test]
    fn test_reads_enums() {
        let parsed = parse_source(SAMPLE);
        assert_eq!(parsed.schema.enums.len(), 1);
        let role = &parsed.schema.enums[0];
        assert_eq!(role.name, "user_role");
        assert_eq!(role.values, vec!["admin", "member"]);
        assert_eq!(role.token.as_ref().unwrap().as_str(), "e0063z");
    }

    #[test]
    fn test_inline_check_shorthand_recovered() {
        let parsed = parse_source(SAMPLE);
        let orders = parsed.schema.get_table("orders").unwrap();
        let check = orders
            .constraints
            .iter()
            .find(|c| c.is_check())
            .expect("folded check recovered");
        if let Constraint::Check { expression, .. } = check {
            assert_eq!(expression, "status IN ('open', 'closed')");
        }
    }

    #[test]
    fn test_relations_fold_into_foreign_keys() {
        let parsed = parse_source(SAMPLE);
        assert_eq!(parsed.relations.len(), 1);
        assert_eq!(parsed.relations[0].name, "user");

        let orders = parsed.schema.get_table("orders").unwrap();
        let fk = orders
            .constraints
            .iter()
            .find_map(|c| match c {
                Constraint::ForeignKey {
                    ref_table,
                    on_delete,
                    ..
                } => Some((ref_table.clone(), *on_delete)),
                _ => None,
            })
            .expect("foreign key from relations block");
        assert_eq!(fk.0, "users");
        assert_eq!(fk.1, Some(ForeignKeyAction::Cascade));
    }

    #[test]
    fn test_hand_edited_garbage_is_tolerated() {
        let mangled = SAMPLE.replace(
            ".column(col(\"email\", \"text\").not_null().unique().token(\"c00ofw\"))",
            "// email moved elsewhere, ask @dba",
        );
        let parsed = parse_source(&mangled);
        let users = parsed.schema.get_table("users").unwrap();
        assert_eq!(users.columns.len(), 2, "unparseable line skipped");
        assert!(users.get_column("email").is_none());
        assert!(users.get_column("id").is_some());
    }

    #[test]
    fn test_partition_declaration_recovered() {
        let source = r#"
pub fn events() -> TableDef {
    table("events")
        .column(col("id", "bigint").not_null())
        .column(col("ts", "timestamptz").not_null())
        .range_partition(&["ts"], &[("events_2024", "FOR VALUES FROM ('2024-01-01') TO ('2025-01-01')")])
}
"#;
        let parsed = parse_source(source);
        let events = parsed.schema.get_table("events").unwrap();
        let spec = events.partition.as_ref().expect("partition spec");
        assert_eq!(spec.partition_key, vec!["ts"]);
        assert_eq!(spec.partitions.len(), 1);
        assert_eq!(spec.partitions[0].name, "events_2024");
        assert!(spec.partitions[0].bound.contains("2024-01-01"));
    }

    #[test]
    fn test_function_defs_flagged() {
        let source = r#"
pub fn touch() -> FunctionDef {
    function("touch", "trigger", "plpgsql")
        .body("BEGIN NEW.updated_at := now(); RETURN NEW; END")
}
"#;
        let parsed = parse_source(source);
        assert!(parsed.has_function_defs);
        assert!(!parsed.has_trigger_defs);
        assert_eq!(parsed.schema.functions.len(), 1);
        assert_eq!(parsed.schema.functions[0].name, "touch");
    }

    #[test]
    fn test_empty_input() {
        let parsed = parse_source("");
        assert!(parsed.schema.tables.is_empty());
        assert!(!parsed.has_function_defs);
    }
}
