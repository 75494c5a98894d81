//! Canonical PostgreSQL DDL for a model.
//!
//! Output is deterministic: schemas sort by name, tables by name within
//! their schema, and statements are separated by one blank line. Parsing
//! the output and generating again yields the same text.

use crate::model::{Column, CustomType, DEFAULT_SCHEMA, DbModel, ForeignKey, Schema, Table, TypeKind, short_fallback};
use crate::naming::{ensure_unique, sanitize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// `"ident"` with embedded quotes doubled.
pub fn quote_ident(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

/// `'literal'` with embedded quotes doubled.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn qualify(schema: &str, name: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(name))
}

/// Generate the SQL script for `model`.
pub fn generate_sql(model: &DbModel) -> String {
    let schema_names: HashMap<&str, &str> = model
        .schemas
        .iter()
        .map(|s| (s.id.as_str(), s.name.as_str()))
        .collect();
    let tables_by_id: HashMap<&str, &Table> =
        model.tables.iter().map(|t| (t.id.as_str(), t)).collect();

    let mut schemas: Vec<&Schema> = model.schemas.iter().collect();
    schemas.sort_by(|a, b| a.name.cmp(&b.name));

    let mut statements: Vec<String> = Vec::new();

    for schema in &schemas {
        if schema.name != DEFAULT_SCHEMA {
            statements.push(format!(
                "CREATE SCHEMA IF NOT EXISTS {};",
                quote_ident(&schema.name)
            ));
        }
    }

    for schema in &schemas {
        for custom in model.types.iter().filter(|t| t.schema_id == schema.id) {
            if let Some(statement) = type_statement(&schema.name, custom) {
                statements.push(statement);
            }
        }
    }

    for schema in &schemas {
        let mut tables: Vec<&Table> = model
            .tables
            .iter()
            .filter(|t| t.schema_id == schema.id)
            .collect();
        tables.sort_by(|a, b| a.name.cmp(&b.name));

        for table in tables {
            statements.push(table_statement(table, &schema.name, &tables_by_id, &schema_names));
        }
    }

    let orphans = model
        .tables
        .iter()
        .filter(|t| !schema_names.contains_key(t.schema_id.as_str()))
        .count();
    if orphans > 0 {
        warn!(tables = orphans, "skipping tables whose schema is not in the model");
    }
    debug!(statements = statements.len(), "generated sql");

    statements.join("\n\n")
}

fn type_statement(schema: &str, custom: &CustomType) -> Option<String> {
    match custom.kind {
        TypeKind::Enum => {
            if custom.values.is_empty() {
                warn!(name = %custom.name, "skipping enum type without values");
                return None;
            }
            let values: Vec<String> = custom.values.iter().map(|v| quote_literal(v)).collect();
            Some(format!(
                "CREATE TYPE {} AS ENUM ({});",
                qualify(schema, &custom.name),
                values.join(", ")
            ))
        }
    }
}

fn column_definition(column: &Column) -> String {
    let mut parts = vec![quote_ident(&column.name), column.typ.trim().to_string()];
    if !column.nullable || column.is_primary_key {
        parts.push("NOT NULL".to_string());
    }
    if let Some(default) = column.default_value.as_deref().map(str::trim) {
        if !default.is_empty() {
            parts.push(format!("DEFAULT {}", default));
        }
    }
    parts.join(" ")
}

/// `None` when either endpoint no longer resolves.
fn foreign_key_clause(
    fk: &ForeignKey,
    name: &str,
    table: &Table,
    tables_by_id: &HashMap<&str, &Table>,
    schema_names: &HashMap<&str, &str>,
) -> Option<String> {
    let from = table.column(&fk.from_column_id)?;
    let target = tables_by_id.get(fk.to_table_id.as_str())?;
    let to = target.column(&fk.to_column_id)?;
    let target_schema = schema_names
        .get(target.schema_id.as_str())
        .copied()
        .unwrap_or(DEFAULT_SCHEMA);

    let mut clause = format!(
        "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
        quote_ident(name),
        quote_ident(&from.name),
        qualify(target_schema, &target.name),
        quote_ident(&to.name)
    );
    if let Some(action) = fk.on_delete {
        clause.push_str(" ON DELETE ");
        clause.push_str(action.as_sql());
    }
    if let Some(action) = fk.on_update {
        clause.push_str(" ON UPDATE ");
        clause.push_str(action.as_sql());
    }
    Some(clause)
}

fn table_statement(
    table: &Table,
    schema: &str,
    tables_by_id: &HashMap<&str, &Table>,
    schema_names: &HashMap<&str, &str>,
) -> String {
    let mut definitions: Vec<String> = table.columns.iter().map(column_definition).collect();

    let primary: Vec<String> = table
        .columns
        .iter()
        .filter(|c| c.is_primary_key)
        .map(|c| quote_ident(&c.name))
        .collect();
    if !primary.is_empty() {
        definitions.push(format!("PRIMARY KEY ({})", primary.join(", ")));
    }

    for column in table.columns.iter().filter(|c| c.is_unique && !c.is_primary_key) {
        definitions.push(format!("UNIQUE ({})", quote_ident(&column.name)));
    }

    let mut used: HashSet<String> = HashSet::new();
    for fk in &table.foreign_keys {
        let name = ensure_unique(&sanitize(&fk.name, &short_fallback(&fk.id)), &used);
        match foreign_key_clause(fk, &name, table, tables_by_id, schema_names) {
            Some(clause) => {
                used.insert(name);
                definitions.push(clause);
            }
            None => warn!(table = %table.name, constraint = %fk.name, "skipping unresolved foreign key"),
        }
    }

    let qualified = qualify(schema, &table.name);
    let mut out = format!(
        "CREATE TABLE {} (\n  {}\n);",
        qualified,
        definitions.join(",\n  ")
    );

    if let Some(comment) = table.comment.as_deref().filter(|c| !c.is_empty()) {
        out.push_str(&format!(
            "\nCOMMENT ON TABLE {} IS {};",
            qualified,
            quote_literal(comment)
        ));
    }
    for column in &table.columns {
        if let Some(comment) = column.comment.as_deref().filter(|c| !c.is_empty()) {
            out.push_str(&format!(
                "\nCOMMENT ON COLUMN {}.{} IS {};",
                qualified,
                quote_ident(&column.name),
                quote_literal(comment)
            ));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FkAction;

    fn public_id(model: &DbModel) -> String {
        model.schemas[0].id.clone()
    }

    #[test]
    fn test_quoting() {
        assert_eq!(quote_ident(r#"my "table""#), r#""my ""table""""#);
        assert_eq!(quote_literal("it's"), "'it''s'");
    }

    #[test]
    fn test_generate_simple_table() {
        let mut model = DbModel::new();
        let mut users = Table::new(public_id(&model), "users");
        let mut id = Column::new("id", "uuid");
        id.is_primary_key = true;
        id.is_unique = true;
        id.nullable = false;
        let mut email = Column::new("email", "text");
        email.is_unique = true;
        email.default_value = Some("  'none'  ".to_string());
        email.comment = Some("Contact's address".to_string());
        users.columns = vec![id, email];
        users.comment = Some("People".to_string());
        model.tables.push(users);

        let sql = generate_sql(&model);
        assert_eq!(
            sql,
            "CREATE TABLE \"public\".\"users\" (\n  \
             \"id\" uuid NOT NULL,\n  \
             \"email\" text DEFAULT 'none',\n  \
             PRIMARY KEY (\"id\"),\n  \
             UNIQUE (\"email\")\n);\n\
             COMMENT ON TABLE \"public\".\"users\" IS 'People';\n\
             COMMENT ON COLUMN \"public\".\"users\".\"email\" IS 'Contact''s address';"
        );
    }

    #[test]
    fn test_schema_type_and_table_order() {
        let mut model = DbModel::new();
        let public = public_id(&model);
        let zeta = Schema { id: "z".into(), name: "zeta".into() };
        let alpha = Schema { id: "a".into(), name: "alpha".into() };
        model.schemas.push(zeta);
        model.schemas.push(alpha);
        model.types.push(CustomType {
            id: "t1".into(),
            schema_id: "z".into(),
            name: "mood".into(),
            kind: TypeKind::Enum,
            values: vec!["happy".into(), "sad".into()],
        });
        model.types.push(CustomType {
            id: "t2".into(),
            schema_id: "a".into(),
            name: "level".into(),
            kind: TypeKind::Enum,
            values: vec!["low".into()],
        });
        model.tables.push(Table::new(public.clone(), "b"));
        model.tables.push(Table::new(public, "a"));
        model.tables.push(Table::new("a", "c"));

        let sql = generate_sql(&model);
        let heads: Vec<&str> = sql
            .split("\n\n")
            .map(|s| s.lines().next().unwrap_or_default())
            .collect();
        assert_eq!(
            heads,
            vec![
                "CREATE SCHEMA IF NOT EXISTS \"alpha\";",
                "CREATE SCHEMA IF NOT EXISTS \"zeta\";",
                "CREATE TYPE \"alpha\".\"level\" AS ENUM ('low');",
                "CREATE TYPE \"zeta\".\"mood\" AS ENUM ('happy', 'sad');",
                "CREATE TABLE \"alpha\".\"c\" (",
                "CREATE TABLE \"public\".\"a\" (",
                "CREATE TABLE \"public\".\"b\" (",
            ]
        );
    }

    #[test]
    fn test_foreign_key_clause() {
        let mut model = DbModel::new();
        let public = public_id(&model);
        let mut customers = Table::new(public.clone(), "customers");
        customers.columns.push(Column::new("id", "uuid"));
        let mut orders = Table::new(public, "orders");
        orders.columns.push(Column::new("customer_id", "uuid"));
        let actions = [
            ("Orders Customer", Some(FkAction::Cascade), Some(FkAction::NoAction)),
            ("", None, None),
        ];
        for (name, on_delete, on_update) in actions {
            orders.foreign_keys.push(ForeignKey {
                id: "0123456789".into(),
                name: name.into(),
                from_column_id: orders.columns[0].id.clone(),
                to_table_id: customers.id.clone(),
                to_column_id: customers.columns[0].id.clone(),
                on_delete,
                on_update,
                start_cardinality: None,
                end_cardinality: None,
            });
        }
        model.tables = vec![orders, customers];

        let sql = generate_sql(&model);
        assert!(sql.contains(
            "CONSTRAINT \"orders_customer\" FOREIGN KEY (\"customer_id\") REFERENCES \"public\".\"customers\" (\"id\") ON DELETE CASCADE ON UPDATE NO ACTION"
        ));
        assert!(sql.contains(
            "CONSTRAINT \"fk_01234567\" FOREIGN KEY (\"customer_id\") REFERENCES \"public\".\"customers\" (\"id\")\n);"
        ));
    }

    #[test]
    fn test_unresolved_foreign_key_is_skipped() {
        let mut model = DbModel::new();
        let mut t = Table::new(public_id(&model), "t");
        t.columns.push(Column::new("a", "int"));
        t.foreign_keys.push(ForeignKey {
            id: "x".into(),
            name: "dangling".into(),
            from_column_id: t.columns[0].id.clone(),
            to_table_id: "nowhere".into(),
            to_column_id: "nothing".into(),
            on_delete: None,
            on_update: None,
            start_cardinality: None,
            end_cardinality: None,
        });
        model.tables.push(t);

        let sql = generate_sql(&model);
        assert_eq!(sql, "CREATE TABLE \"public\".\"t\" (\n  \"a\" int\n);");
    }

    #[test]
    fn test_empty_model() {
        assert_eq!(generate_sql(&DbModel::new()), "");
    }

    #[test]
    fn test_primary_key_is_always_not_null() {
        let mut model = DbModel::new();
        let mut t = Table::new(public_id(&model), "t");
        let mut a = Column::new("a", "int");
        a.is_primary_key = true;
        t.columns.push(a);
        model.tables.push(t);
        assert!(generate_sql(&model).contains("\"a\" int NOT NULL"));
    }
}
