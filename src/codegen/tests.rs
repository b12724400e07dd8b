use super::*;
use crate::ir::TrackingToken;
use crate::ir::builder::SchemaBuilder;
use crate::source::parse_source;

fn users_schema() -> Schema {
    SchemaBuilder::new()
        .enum_type("status", &["active", "disabled"])
        .table("users", |t| {
            t.column("id", "uuid", false)
                .primary_key(&["id"])
                .column_full("email", "text", false, None, |c| c.unique = true)
                .index("users_email_key", &["email"], true);
        })
        .build()
}

#[test]
fn test_generated_source_shape() {
    let schema = users_schema();
    let mut generator = TokenGenerator::seeded(0);
    let output = generate(&schema, &CodegenOptions::default(), None, &mut generator);

    insta::assert_snapshot!(output.source, @r###"
    //! Generated by relq. Tokens track object identity across syncs; edit them only if you know why.

    use relq_core::schema_dsl::prelude::*;

    pub fn status() -> EnumDef {
        enum_def("status", &["active", "disabled"]).token("e00ujv")
    }

    pub fn users() -> TableDef {
        table("users")
            .token("t0063z")
            .column(col("id", "uuid").primary_key().token("c00c7y"))
            .column(col("email", "text").not_null().unique().token("c00ibx"))
            .index(idx("users_email_key", &["email"]).unique().token("i00ofw"))
    }
    "###);
}

#[test]
fn test_output_is_deterministic() {
    let schema = users_schema();
    let first = generate(
        &schema,
        &CodegenOptions::default(),
        None,
        &mut TokenGenerator::seeded(9),
    );
    let second = generate(
        &schema,
        &CodegenOptions::default(),
        None,
        &mut TokenGenerator::seeded(9),
    );
    assert_eq!(first.source, second.source);
}

#[test]
fn test_insertion_order_does_not_change_output() {
    let forward = SchemaBuilder::new()
        .table("alpha", |t| {
            t.column("id", "uuid", false);
        })
        .table("beta", |t| {
            t.column("id", "uuid", false);
        })
        .build();
    let reversed = SchemaBuilder::new()
        .table("beta", |t| {
            t.column("id", "uuid", false);
        })
        .table("alpha", |t| {
            t.column("id", "uuid", false);
        })
        .build();

    let a = generate(&forward, &CodegenOptions::default(), None, &mut TokenGenerator::seeded(3));
    let b = generate(&reversed, &CodegenOptions::default(), None, &mut TokenGenerator::seeded(3));
    assert_eq!(a.source, b.source);
}

#[test]
fn test_partition_children_emit_after_parents() {
    let schema = SchemaBuilder::new()
        .table("aa_child", |t| {
            t.column("id", "bigint", false);
        })
        .table("events", |t| {
            t.column("id", "bigint", false)
                .column("ts", "timestamptz", false)
                .range_partition(&["ts"], &[("aa_child", "FOR VALUES FROM ('a') TO ('b')")]);
        })
        .build();

    let output = generate(
        &schema,
        &CodegenOptions::default(),
        None,
        &mut TokenGenerator::seeded(0),
    );
    let events_pos = output.source.find("pub fn events()").unwrap();
    let child_pos = output.source.find("pub fn aa_child()").unwrap();
    assert!(
        events_pos < child_pos,
        "partition children sort after regular tables despite the name"
    );
}

#[test]
fn test_existing_tokens_merge_and_fresh_ones_generate() {
    let mut existing = users_schema();
    existing.get_table_mut("users").unwrap().token = Some(TrackingToken::new("tkeepa"));
    existing
        .get_table_mut("users")
        .unwrap()
        .get_column_mut("email")
        .unwrap()
        .token = Some(TrackingToken::new("ckeepb"));

    let fresh = users_schema();
    let output = generate(
        &fresh,
        &CodegenOptions::default(),
        Some(&existing),
        &mut TokenGenerator::seeded(100),
    );

    let users = output.schema.get_table("users").unwrap();
    assert_eq!(users.token.as_ref().unwrap().as_str(), "tkeepa");
    assert_eq!(
        users.get_column("email").unwrap().token.as_ref().unwrap().as_str(),
        "ckeepb"
    );

    // Objects absent from the existing file get fresh well-formed tokens.
    let id_token = users.get_column("id").unwrap().token.as_ref().unwrap();
    assert!(id_token.is_well_formed());
    assert_ne!(id_token.as_str(), "ckeepb");
    assert!(output.source.contains("tkeepa"));
}

#[test]
fn test_relations_dedup_with_numeric_suffix() {
    let schema = SchemaBuilder::new()
        .table("users", |t| {
            t.column("id", "uuid", false).primary_key(&["id"]);
        })
        .table("orders", |t| {
            t.column("id", "bigint", false)
                .column("user_id", "uuid", false)
                .fk("orders_user_id_fk", &["user_id"], "users", &["id"]);
        })
        .table("invoices", |t| {
            t.column("id", "bigint", false)
                .column("user_id", "uuid", false)
                .fk("invoices_user_id_fk", &["user_id"], "users", &["id"]);
        })
        .build();

    let output = generate(
        &schema,
        &CodegenOptions::default(),
        None,
        &mut TokenGenerator::seeded(0),
    );
    assert!(output.source.contains("relation(\"user\")"));
    assert!(output.source.contains("relation(\"user2\")"));
    assert_eq!(output.relations_export, "relations");
}

#[test]
fn test_relations_export_fallback_renaming() {
    let schema = SchemaBuilder::new()
        .table("relations", |t| {
            t.column("id", "bigint", false)
                .column("owner_id", "bigint", false)
                .fk("relations_owner_fk", &["owner_id"], "relations", &["id"]);
        })
        .build();

    let output = generate(
        &schema,
        &CodegenOptions::default(),
        None,
        &mut TokenGenerator::seeded(0),
    );
    assert_eq!(output.relations_export, "relq_relations");
    assert!(output.source.contains("pub fn relq_relations() -> Vec<Relation>"));
}

#[test]
fn test_camel_case_dev_names() {
    let schema = SchemaBuilder::new()
        .table("users", |t| {
            t.column("created_at", "timestamptz", false).column("id", "uuid", false);
        })
        .build();

    let options = CodegenOptions {
        camel_case: true,
        ..CodegenOptions::default()
    };
    let output = generate(&schema, &options, None, &mut TokenGenerator::seeded(0));
    assert!(output.source.contains(".dev_name(\"createdAt\")"));
    assert!(
        !output.source.contains(".dev_name(\"id\")"),
        "identical names carry no dev_name"
    );
}

#[test]
fn test_column_type_override() {
    let schema = SchemaBuilder::new()
        .table("events", |t| {
            t.column("payload", "jsonb", true);
        })
        .build();

    let mut options = CodegenOptions::default();
    options
        .column_type_map
        .insert("events.payload".to_string(), "json".to_string());
    let output = generate(&schema, &options, None, &mut TokenGenerator::seeded(0));
    assert!(output.source.contains("col(\"payload\", \"json\")"));
}

#[test]
fn test_include_flags_gate_sections() {
    let schema = SchemaBuilder::new()
        .domain("email_addr", "text", None)
        .function("touch", "trigger", "plpgsql", "BEGIN RETURN NEW; END")
        .trigger(
            "users_touch",
            "users",
            crate::ir::TriggerTiming::Before,
            &[crate::ir::TriggerEvent::Update],
            "touch",
        )
        .table("users", |t| {
            t.column("id", "uuid", false);
        })
        .build();

    let all = generate(
        &schema,
        &CodegenOptions::default(),
        None,
        &mut TokenGenerator::seeded(0),
    );
    assert!(all.functions_source.is_some());
    assert!(all.triggers_source.is_some());
    assert!(all.source.contains("DomainDef"));

    let trimmed_options = CodegenOptions {
        include_functions: false,
        include_triggers: false,
        include_domains: false,
        ..CodegenOptions::default()
    };
    let trimmed = generate(&schema, &trimmed_options, None, &mut TokenGenerator::seeded(0));
    assert!(trimmed.functions_source.is_none());
    assert!(trimmed.triggers_source.is_none());
    assert!(!trimmed.source.contains("DomainDef"));
}

#[test]
fn test_companion_files_content() {
    let schema = SchemaBuilder::new()
        .composite("address", &[("street", "text"), ("zip", "integer")])
        .function("touch", "trigger", "plpgsql", "BEGIN RETURN NEW; END")
        .trigger(
            "users_touch",
            "users",
            crate::ir::TriggerTiming::Before,
            &[crate::ir::TriggerEvent::Update],
            "touch",
        )
        .build();

    let output = generate(
        &schema,
        &CodegenOptions::default(),
        None,
        &mut TokenGenerator::seeded(0),
    );

    let functions = output.functions_source.unwrap();
    assert!(functions.contains("pub fn touch() -> FunctionDef"));
    assert!(functions.contains("function(\"touch\", \"trigger\", \"plpgsql\")"));

    let triggers = output.triggers_source.unwrap();
    assert!(triggers.contains("trigger(\"users_touch\", \"users\")"));
    assert!(triggers.contains(".before()"));
    assert!(triggers.contains(".on(&[\"UPDATE\"])"));
    assert!(triggers.contains(".execute(\"touch\")"));

    let types = output.types_source.unwrap();
    assert!(types.contains("pub struct Address {"));
    assert!(types.contains("pub street: Option<String>,"));
    assert!(types.contains("pub zip: Option<i32>,"));
}

#[test]
fn test_enum_like_check_folds_onto_column() {
    let schema = SchemaBuilder::new()
        .table("orders", |t| {
            t.column("status", "text", false)
                .check("orders_status_check", "status IN ('open', 'closed')");
        })
        .build();

    let output = generate(
        &schema,
        &CodegenOptions::default(),
        None,
        &mut TokenGenerator::seeded(0),
    );
    assert!(
        output
            .source
            .contains(".check(\"orders_status_check\", &[\"closed\", \"open\"])")
            || output
                .source
                .contains(".check(\"orders_status_check\", &[\"open\", \"closed\"])"),
        "{}",
        output.source
    );
    assert!(
        !output.source.contains(".check(\"orders_status_check\", \"status IN"),
        "folded check must not also emit at table level"
    );
}

#[test]
fn test_round_trip_through_reader() {
    let schema = SchemaBuilder::new()
        .enum_type("status", &["active", "disabled"])
        .table("users", |t| {
            t.column("id", "uuid", false)
                .primary_key(&["id"])
                .column_full("email", "text", false, Some("''::text"), |c| c.unique = true)
                .column_full("age", "integer", true, None, |_| {})
                .index("users_email_key", &["email"], true);
        })
        .table("orders", |t| {
            t.column("id", "bigint", false)
                .primary_key(&["id"])
                .column("user_id", "uuid", false)
                .fk("orders_user_id_fk", &["user_id"], "users", &["id"]);
        })
        .build();

    let output = generate(
        &schema,
        &CodegenOptions::default(),
        None,
        &mut TokenGenerator::seeded(0),
    );
    let parsed = parse_source(&output.source);

    assert_eq!(parsed.schema.tables.len(), 2);
    assert_eq!(parsed.schema.enums.len(), 1);
    assert_eq!(parsed.schema.enums[0].values, vec!["active", "disabled"]);

    let users = parsed.schema.get_table("users").unwrap();
    let original = output.schema.get_table("users").unwrap();
    assert_eq!(users.token, original.token);
    assert_eq!(users.columns.len(), original.columns.len());
    for (parsed_col, original_col) in users.columns.iter().zip(&original.columns) {
        assert_eq!(parsed_col.name, original_col.name);
        assert_eq!(parsed_col.type_name, original_col.type_name);
        assert_eq!(parsed_col.nullable, original_col.nullable);
        assert_eq!(parsed_col.primary_key, original_col.primary_key);
        assert_eq!(parsed_col.unique, original_col.unique);
        assert_eq!(parsed_col.default, original_col.default);
        assert_eq!(parsed_col.token, original_col.token);
    }
    assert_eq!(users.indexes.len(), 1);
    assert_eq!(users.indexes[0].token, original.indexes[0].token);

    // The relations block reconstructs the foreign key.
    let orders = parsed.schema.get_table("orders").unwrap();
    assert!(
        orders
            .constraints
            .iter()
            .any(|c| matches!(c, crate::ir::Constraint::ForeignKey { ref_table, .. } if ref_table == "users"))
    );

    // A second pull with the parsed file as the existing source keeps
    // every token stable.
    let regenerated = generate(
        &schema,
        &CodegenOptions::default(),
        Some(&parsed.schema),
        &mut TokenGenerator::seeded(999),
    );
    assert_eq!(regenerated.source, output.source);
}
