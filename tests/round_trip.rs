use pgmodel::model::{Column, DbModel, ForeignKey, Table};
use pgmodel::{ParseError, ParseOptions, generate, parse, parse_with, validate};
use pretty_assertions::assert_eq;

const SHOP: &str = r#"
-- storefront schema
CREATE SCHEMA IF NOT EXISTS sales;
CREATE TYPE sales.order_state AS ENUM ('new', 'paid', 'it''s shipped');

CREATE TABLE sales.orders (
    id uuid NOT NULL,
    customer_id uuid NOT NULL,
    state sales.order_state DEFAULT 'new',
    total numeric(12, 2) DEFAULT 0 NOT NULL,
    note text,
    PRIMARY KEY (id),
    CONSTRAINT "Orders → Customer" FOREIGN KEY (customer_id) REFERENCES public.customers (id) ON DELETE CASCADE,
    CONSTRAINT orders_parent FOREIGN KEY (id) REFERENCES sales.orders (id) ON UPDATE SET NULL
);

CREATE TABLE customers (
    id uuid NOT NULL,
    email character varying(200) NOT NULL,
    "Display ""Name""" text,
    PRIMARY KEY (id),
    UNIQUE (email)
);

COMMENT ON TABLE customers IS 'People who buy';
COMMENT ON COLUMN sales.orders.note IS 'Free text; may contain ''quotes''';
"#;

/// Name-keyed projection of a model, free of generated ids and ordering.
fn shape(model: &DbModel) -> Vec<String> {
    let schema_name = |id: &str| {
        model
            .schema(id)
            .map(|s| s.name.clone())
            .unwrap_or_default()
    };
    let mut lines: Vec<String> = model.schemas.iter().map(|s| format!("schema {}", s.name)).collect();
    for t in &model.types {
        lines.push(format!("type {}.{} {:?}", schema_name(&t.schema_id), t.name, t.values));
    }
    for table in &model.tables {
        let qualified = format!("{}.{}", schema_name(&table.schema_id), table.name);
        lines.push(format!("table {} {:?}", qualified, table.comment));
        for c in &table.columns {
            lines.push(format!(
                "column {}.{} {} null={} pk={} unique={} default={:?} comment={:?}",
                qualified, c.name, c.typ, c.nullable, c.is_primary_key, c.is_unique, c.default_value, c.comment
            ));
        }
        for fk in &table.foreign_keys {
            let target = model.table(&fk.to_table_id);
            lines.push(format!(
                "fk {} {} {} -> {} {} {:?} {:?}",
                qualified,
                fk.name,
                table.column(&fk.from_column_id).map(|c| c.name.as_str()).unwrap_or("?"),
                target.map(|t| t.name.as_str()).unwrap_or("?"),
                target
                    .and_then(|t| t.column(&fk.to_column_id))
                    .map(|c| c.name.as_str())
                    .unwrap_or("?"),
                fk.on_delete,
                fk.on_update,
            ));
        }
    }
    lines.sort();
    lines
}

#[test]
fn test_round_trip_preserves_structure() {
    let model = parse(SHOP).unwrap();
    let again = parse(&generate(&model)).unwrap();
    assert_eq!(shape(&again), shape(&model));
}

#[test]
fn test_generation_is_idempotent() {
    let first = generate(&parse(SHOP).unwrap());
    let second = generate(&parse(&first).unwrap());
    assert_eq!(second, first);
}

#[test]
fn test_canonical_output() {
    let sql = generate(&parse(SHOP).unwrap());
    let expected = r#"CREATE SCHEMA IF NOT EXISTS "sales";

CREATE TYPE "sales"."order_state" AS ENUM ('new', 'paid', 'it''s shipped');

CREATE TABLE "public"."customers" (
  "id" uuid NOT NULL,
  "email" character varying(200) NOT NULL,
  "Display ""Name""" text,
  PRIMARY KEY ("id"),
  UNIQUE ("email")
);
COMMENT ON TABLE "public"."customers" IS 'People who buy';

CREATE TABLE "sales"."orders" (
  "id" uuid NOT NULL,
  "customer_id" uuid NOT NULL,
  "state" sales.order_state DEFAULT 'new',
  "total" numeric(12, 2) NOT NULL DEFAULT 0,
  "note" text,
  PRIMARY KEY ("id"),
  CONSTRAINT "orders_customer" FOREIGN KEY ("customer_id") REFERENCES "public"."customers" ("id") ON DELETE CASCADE,
  CONSTRAINT "orders_parent" FOREIGN KEY ("id") REFERENCES "sales"."orders" ("id") ON UPDATE SET NULL
);
COMMENT ON COLUMN "sales"."orders"."note" IS 'Free text; may contain ''quotes''';"#;
    assert_eq!(sql, expected);
}

#[test]
fn test_idempotent_without_implicit_id() {
    let options = ParseOptions {
        infer_id_primary_key: false,
        ..ParseOptions::default()
    };
    let sql = "CREATE TABLE t (id int, v text UNIQUE);";
    let first = generate(&parse_with(sql, &options).unwrap());
    let second = generate(&parse_with(&first, &options).unwrap());
    assert_eq!(second, first);
    assert!(!first.contains("PRIMARY KEY"));
}

#[test]
fn test_primary_key_warning_iff_no_primary_key() {
    let options = ParseOptions {
        infer_id_primary_key: false,
        ..ParseOptions::default()
    };
    let model = parse_with(
        "CREATE TABLE keyed (a int PRIMARY KEY); CREATE TABLE loose (id int, b int);",
        &options,
    )
    .unwrap();
    let issues = validate(&model);
    for table in &model.tables {
        let warned = issues
            .iter()
            .any(|i| i.message == format!("table \"{}\" has no primary key", table.name));
        assert_eq!(warned, !table.has_primary_key(), "{}", table.name);
    }
}

#[test]
fn test_foreign_key_errors_follow_resolution() {
    let mut model = parse(SHOP).unwrap();
    assert!(!validate(&model).iter().any(|i| i.is_error()));

    let orders = model.tables.iter_mut().find(|t| t.name == "orders").unwrap();
    orders.foreign_keys[0].to_table_id = "gone".to_string();
    let issues = validate(&model);
    assert_eq!(issues.iter().filter(|i| i.is_error()).count(), 1);
}

#[test]
fn test_type_mismatch_is_an_error() {
    let mut model = DbModel::new();
    let schema = model.schemas[0].id.clone();
    let mut a = Table::new(schema.clone(), "a");
    a.columns.push(Column::new("ref", " BIGINT"));
    let mut b = Table::new(schema, "b");
    b.columns.push(Column::new("key", "bigint"));
    let fk = ForeignKey {
        id: "f".into(),
        name: "a_b".into(),
        from_column_id: a.columns[0].id.clone(),
        to_table_id: b.id.clone(),
        to_column_id: b.columns[0].id.clone(),
        on_delete: None,
        on_update: None,
        start_cardinality: None,
        end_cardinality: None,
    };
    a.foreign_keys.push(fk);
    model.tables = vec![a.clone(), b.clone()];
    assert!(!validate(&model).iter().any(|i| i.is_error()));

    b.columns[0].typ = "integer".into();
    model.tables = vec![a, b];
    let errors: Vec<_> = validate(&model).into_iter().filter(|i| i.is_error()).collect();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].message.contains("public.a.ref"));
    assert!(errors[0].message.contains("public.b.key"));
}

#[test]
fn test_reference_error_names_constraint_and_target() {
    let err = parse("CREATE TABLE t (a int, CONSTRAINT fk_x FOREIGN KEY (a) REFERENCES missing_table(b));")
        .unwrap_err();
    match &err {
        ParseError::Reference { constraint, target } => {
            assert_eq!(constraint, "fk_x");
            assert!(target.ends_with("missing_table.b"), "{}", target);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_parse_failure_is_all_or_nothing() {
    let err = parse("CREATE TABLE ok (id int);\nCREATE TABLE bad id int;").unwrap_err();
    assert_eq!(err.line(), Some(2));
}

#[test]
fn test_hand_built_model_is_a_fixed_point() {
    let mut model = DbModel::new();
    let schema = model.schemas[0].id.clone();
    let mut a = Table::new(schema, "a");
    a.columns.push(Column::new("id", "bigint"));
    a.columns[0].is_primary_key = true;
    a.columns.push(Column::new("ref", " BIGINT "));
    a.columns[1].default_value = Some(" 0 ".into());
    a.comment = Some(String::new());
    model.tables.push(a);

    let first = generate(&model);
    assert!(first.contains("  \"ref\" BIGINT DEFAULT 0,\n"), "{}", first);
    let second = generate(&parse(&first).unwrap());
    assert_eq!(second, first);
}

#[test]
fn test_empty_comment_round_trips() {
    let model = parse("CREATE TABLE t (id int, a text); COMMENT ON TABLE t IS ''; COMMENT ON COLUMN t.a IS '';").unwrap();
    let again = parse(&generate(&model)).unwrap();
    assert_eq!(shape(&again), shape(&model));
}
