//! Structural and referential checks over a finished model.
//!
//! Validation never fails: every defect found is returned as an [`Issue`],
//! in model order. `error` issues are advisory; nothing here blocks parsing
//! or generation.

use crate::model::{DbModel, FkAction, MODEL_VERSION, Table, short_fallback};
use crate::naming::sanitize;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueLevel {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub level: IssueLevel,
    pub message: String,
}

impl Issue {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: IssueLevel::Error,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: IssueLevel::Warning,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == IssueLevel::Error
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.level {
            IssueLevel::Error => write!(f, "error: {}", self.message),
            IssueLevel::Warning => write!(f, "warning: {}", self.message),
        }
    }
}

pub fn has_errors(issues: &[Issue]) -> bool {
    issues.iter().any(Issue::is_error)
}

const ROOT: &str = "model";

/// `kind "name"`, or `kind #n` (1-based) when the name is blank or unknown.
fn label(kind: &str, name: Option<&str>, index: usize) -> String {
    match name.map(str::trim) {
        Some(name) if !name.is_empty() => format!("{} \"{}\"", kind, name),
        _ => format!("{} #{}", kind, index + 1),
    }
}

fn child(parent: &str, segment: &str) -> String {
    format!("{} / {}", parent, segment)
}

/// Check a typed model.
pub fn validate(model: &DbModel) -> Vec<Issue> {
    let mut issues = Vec::new();
    structure(model, &mut issues);
    references(model, &mut issues);
    issues
}

/// Model invariants the type system does not already enforce.
fn structure(model: &DbModel, issues: &mut Vec<Issue>) {
    if model.version != MODEL_VERSION {
        issues.push(Issue::error(format!(
            "{}: unsupported version {} (expected {})",
            ROOT, model.version, MODEL_VERSION
        )));
    }

    let schema_ids: HashSet<&str> = model.schemas.iter().map(|s| s.id.as_str()).collect();

    let mut schema_names: HashSet<&str> = HashSet::new();
    for (i, schema) in model.schemas.iter().enumerate() {
        let path = label("schema", Some(&schema.name), i);
        if schema.id.is_empty() {
            issues.push(Issue::error(format!("{}: id must not be empty", path)));
        }
        if schema.name.trim().is_empty() {
            issues.push(Issue::error(format!("{}: name must not be empty", path)));
        } else if !schema_names.insert(schema.name.as_str()) {
            issues.push(Issue::error(format!("{}: duplicate schema name", path)));
        }
    }

    for (i, custom) in model.types.iter().enumerate() {
        let path = label("type", Some(&custom.name), i);
        if custom.name.trim().is_empty() {
            issues.push(Issue::error(format!("{}: name must not be empty", path)));
        }
        if !schema_ids.contains(custom.schema_id.as_str()) {
            issues.push(Issue::error(format!("{}: schemaId does not reference a schema", path)));
        }
        if custom.values.is_empty() {
            issues.push(Issue::error(format!("{}: enum needs at least one value", path)));
        }
    }

    let mut table_ids: HashSet<&str> = HashSet::new();
    let mut table_names: HashSet<(&str, &str)> = HashSet::new();
    for (i, table) in model.tables.iter().enumerate() {
        let path = label("table", Some(&table.name), i);
        if table.id.is_empty() {
            issues.push(Issue::error(format!("{}: id must not be empty", path)));
        } else if !table_ids.insert(table.id.as_str()) {
            issues.push(Issue::error(format!("{}: duplicate table id", path)));
        }
        if table.name.trim().is_empty() {
            issues.push(Issue::error(format!("{}: name must not be empty", path)));
        } else if !table_names.insert((table.schema_id.as_str(), table.name.as_str())) {
            issues.push(Issue::error(format!("{}: duplicate table name in its schema", path)));
        }
        if !schema_ids.contains(table.schema_id.as_str()) {
            issues.push(Issue::error(format!("{}: schemaId does not reference a schema", path)));
        }
        table_structure(table, &path, issues);
    }
}

fn table_structure(table: &Table, path: &str, issues: &mut Vec<Issue>) {
    let mut column_ids: HashSet<&str> = HashSet::new();
    for (i, column) in table.columns.iter().enumerate() {
        let path = child(path, &label("column", Some(&column.name), i));
        if column.id.is_empty() {
            issues.push(Issue::error(format!("{}: id must not be empty", path)));
        } else if !column_ids.insert(column.id.as_str()) {
            issues.push(Issue::error(format!("{}: duplicate column id", path)));
        }
        if column.name.trim().is_empty() {
            issues.push(Issue::error(format!("{}: name must not be empty", path)));
        }
        if column.typ.trim().is_empty() {
            issues.push(Issue::error(format!("{}: type must not be empty", path)));
        }
        if column.is_primary_key && (!column.is_unique || column.nullable) {
            issues.push(Issue::error(format!(
                "{}: primary key column must be unique and not null",
                path
            )));
        }
    }

    let mut names: HashSet<String> = HashSet::new();
    for (i, fk) in table.foreign_keys.iter().enumerate() {
        let path = child(path, &label("foreign key", Some(&fk.name), i));
        if fk.id.is_empty() {
            issues.push(Issue::error(format!("{}: id must not be empty", path)));
        }
        let sanitized = sanitize(&fk.name, &short_fallback(&fk.id));
        if !names.insert(sanitized.clone()) {
            issues.push(Issue::error(format!(
                "{}: name collides with another constraint as \"{}\"",
                path, sanitized
            )));
        }
    }
}

/// Primary keys and foreign-key endpoints.
fn references(model: &DbModel, issues: &mut Vec<Issue>) {
    let tables_by_id: HashMap<&str, &Table> =
        model.tables.iter().map(|t| (t.id.as_str(), t)).collect();
    let qualified = |table: &Table, column: &str| match model.schema(&table.schema_id) {
        Some(schema) => format!("{}.{}.{}", schema.name, table.name, column),
        None => format!("{}.{}", table.name, column),
    };

    for table in &model.tables {
        if table.columns.is_empty() {
            issues.push(Issue::warning(format!("table \"{}\" has no columns", table.name)));
        }
        if !table.has_primary_key() {
            issues.push(Issue::warning(format!("table \"{}\" has no primary key", table.name)));
        }

        for fk in &table.foreign_keys {
            let from = table.column(&fk.from_column_id);
            if from.is_none() {
                issues.push(Issue::warning(format!(
                    "constraint \"{}\" references a missing column in \"{}\"",
                    fk.name, table.name
                )));
            }

            let Some(&target) = tables_by_id.get(fk.to_table_id.as_str()) else {
                issues.push(Issue::error(format!(
                    "constraint \"{}\" references a missing table (id: {})",
                    fk.name, fk.to_table_id
                )));
                continue;
            };
            let Some(to) = target.column(&fk.to_column_id) else {
                issues.push(Issue::error(format!(
                    "constraint \"{}\" references a missing column in \"{}\"",
                    fk.name, target.name
                )));
                continue;
            };

            if let Some(from) = from {
                if from.typ.trim().to_lowercase() != to.typ.trim().to_lowercase() {
                    issues.push(Issue::error(format!(
                        "constraint \"{}\": type of {} ({}) differs from {} ({})",
                        fk.name,
                        qualified(table, &from.name),
                        from.typ,
                        qualified(target, &to.name),
                        to.typ
                    )));
                }
            }
        }
    }
}

/// Check an untyped JSON document: its shape first, then, if the shape is
/// sound, everything [`validate`] checks.
pub fn validate_document(value: &Value) -> Vec<Issue> {
    let mut shape = Shape { issues: Vec::new() };
    shape.model(value);
    if !shape.issues.is_empty() {
        return shape.issues;
    }

    match serde_json::from_value::<DbModel>(value.clone()) {
        Ok(model) => validate(&model),
        Err(e) => vec![Issue::error(format!("{}: {}", ROOT, e))],
    }
}

/// Walks raw JSON against the persisted model layout.
struct Shape {
    issues: Vec<Issue>,
}

impl Shape {
    fn fail(&mut self, path: &str, message: String) {
        self.issues.push(Issue::error(format!("{}: {}", path, message)));
    }

    fn object<'v>(&mut self, value: &'v Value, path: &str) -> Option<&'v Map<String, Value>> {
        let object = value.as_object();
        if object.is_none() {
            self.fail(path, "expected an object".to_string());
        }
        object
    }

    fn string(&mut self, object: &Map<String, Value>, key: &str, path: &str) {
        match object.get(key) {
            Some(Value::String(_)) => {}
            Some(_) => self.fail(path, format!("{} must be a string", key)),
            None => self.fail(path, format!("missing field {}", key)),
        }
    }

    fn optional_string(&mut self, object: &Map<String, Value>, key: &str, path: &str) {
        match object.get(key) {
            None | Some(Value::Null) | Some(Value::String(_)) => {}
            Some(_) => self.fail(path, format!("{} must be a string", key)),
        }
    }

    fn optional_bool(&mut self, object: &Map<String, Value>, key: &str, path: &str) {
        match object.get(key) {
            None | Some(Value::Bool(_)) => {}
            Some(_) => self.fail(path, format!("{} must be a boolean", key)),
        }
    }

    fn array<'v>(
        &mut self,
        object: &'v Map<String, Value>,
        key: &str,
        path: &str,
        required: bool,
    ) -> &'v [Value] {
        match object.get(key) {
            Some(Value::Array(items)) => items,
            None if !required => &[],
            None => {
                self.fail(path, format!("missing field {}", key));
                &[]
            }
            Some(_) => {
                self.fail(path, format!("{} must be an array", key));
                &[]
            }
        }
    }

    fn action(&mut self, object: &Map<String, Value>, key: &str, path: &str) {
        match object.get(key) {
            None | Some(Value::Null) => {}
            Some(Value::String(s)) if FkAction::ALL.iter().any(|a| a.as_sql() == s) => {}
            Some(other) => self.fail(path, format!("{} is not a referential action: {}", key, other)),
        }
    }

    fn model(&mut self, value: &Value) {
        let Some(root) = self.object(value, ROOT) else {
            return;
        };
        match root.get("version") {
            Some(v) if v.is_u64() => {}
            Some(_) => self.fail(ROOT, "version must be a non-negative integer".to_string()),
            None => self.fail(ROOT, "missing field version".to_string()),
        }

        for (i, schema) in self.array(root, "schemas", ROOT, true).iter().enumerate() {
            let path = label("schema", name_of(schema), i);
            if let Some(object) = self.object(schema, &path) {
                self.string(object, "id", &path);
                self.string(object, "name", &path);
            }
        }

        for (i, custom) in self.array(root, "types", ROOT, false).iter().enumerate() {
            let path = label("type", name_of(custom), i);
            let Some(object) = self.object(custom, &path) else {
                continue;
            };
            for key in ["id", "schemaId", "name"] {
                self.string(object, key, &path);
            }
            if object.get("kind").and_then(Value::as_str) != Some("enum") {
                self.fail(&path, "kind must be \"enum\"".to_string());
            }
            for (j, v) in self.array(object, "values", &path, true).iter().enumerate() {
                if !v.is_string() {
                    self.fail(&path, format!("value #{} must be a string", j + 1));
                }
            }
        }

        for (i, table) in self.array(root, "tables", ROOT, false).iter().enumerate() {
            let path = label("table", name_of(table), i);
            if let Some(object) = self.object(table, &path) {
                self.table(object, &path);
            }
        }
    }

    fn table(&mut self, object: &Map<String, Value>, path: &str) {
        for key in ["id", "schemaId", "name"] {
            self.string(object, key, path);
        }
        self.optional_string(object, "comment", path);

        match object.get("position") {
            None | Some(Value::Null) => {}
            Some(Value::Object(p)) if p.get("x").is_some_and(Value::is_number)
                && p.get("y").is_some_and(Value::is_number) => {}
            Some(_) => self.fail(path, "position must have numeric x and y".to_string()),
        }

        for (i, column) in self.array(object, "columns", path, false).iter().enumerate() {
            let path = child(path, &label("column", name_of(column), i));
            let Some(column) = self.object(column, &path) else {
                continue;
            };
            for key in ["id", "name", "type"] {
                self.string(column, key, &path);
            }
            for key in ["nullable", "isPrimaryKey", "isUnique"] {
                self.optional_bool(column, key, &path);
            }
            self.optional_string(column, "defaultValue", &path);
            self.optional_string(column, "comment", &path);
        }

        for (i, fk) in self.array(object, "foreignKeys", path, false).iter().enumerate() {
            let path = child(path, &label("foreign key", name_of(fk), i));
            let Some(fk) = self.object(fk, &path) else {
                continue;
            };
            for key in ["id", "name", "fromColumnId", "toTableId", "toColumnId"] {
                self.string(fk, key, &path);
            }
            self.action(fk, "onDelete", &path);
            self.action(fk, "onUpdate", &path);
            self.optional_string(fk, "startCardinality", &path);
            self.optional_string(fk, "endCardinality", &path);
        }
    }
}

fn name_of(value: &Value) -> Option<&str> {
    value.get("name").and_then(Value::as_str)
}
