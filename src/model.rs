//! Relational model shared by the parser, validator and generator.
//!
//! Field names follow the persisted `.pgjson` layout (camelCase), so a model
//! round-trips through [`crate::document`] without any mapping layer.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::id::new_id;
use crate::naming::{ensure_unique, sanitize};

/// Current persisted model version.
pub const MODEL_VERSION: u32 = 1;

/// Name of the schema every model starts with.
pub const DEFAULT_SCHEMA: &str = "public";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub typ: String,
    #[serde(default = "default_true")]
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(default)]
    pub is_primary_key: bool,
    #[serde(default)]
    pub is_unique: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

fn default_true() -> bool {
    true
}

impl Column {
    pub fn new(name: impl Into<String>, typ: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            name: name.into(),
            typ: typ.into(),
            nullable: true,
            default_value: None,
            is_primary_key: false,
            is_unique: false,
            comment: None,
        }
    }

    /// Primary key or explicitly unique.
    pub fn is_key(&self) -> bool {
        self.is_primary_key || self.is_unique
    }
}

/// Referential action for `ON DELETE` / `ON UPDATE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FkAction {
    #[serde(rename = "NO ACTION")]
    NoAction,
    #[serde(rename = "RESTRICT")]
    Restrict,
    #[serde(rename = "CASCADE")]
    Cascade,
    #[serde(rename = "SET NULL")]
    SetNull,
    #[serde(rename = "SET DEFAULT")]
    SetDefault,
}

impl FkAction {
    pub const ALL: [FkAction; 5] = [
        FkAction::NoAction,
        FkAction::Restrict,
        FkAction::Cascade,
        FkAction::SetNull,
        FkAction::SetDefault,
    ];

    pub fn as_sql(self) -> &'static str {
        match self {
            FkAction::NoAction => "NO ACTION",
            FkAction::Restrict => "RESTRICT",
            FkAction::Cascade => "CASCADE",
            FkAction::SetNull => "SET NULL",
            FkAction::SetDefault => "SET DEFAULT",
        }
    }

    /// Keyword sequence spelling this action, upper case.
    pub fn keywords(self) -> &'static [&'static str] {
        match self {
            FkAction::NoAction => &["NO", "ACTION"],
            FkAction::Restrict => &["RESTRICT"],
            FkAction::Cascade => &["CASCADE"],
            FkAction::SetNull => &["SET", "NULL"],
            FkAction::SetDefault => &["SET", "DEFAULT"],
        }
    }
}

/// Crow's-foot endpoint kind.
///
/// Older documents carry richer labels (`one_or_many`, `zero_or_many`, ...);
/// those collapse to `Many`, anything else to `One`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Cardinality {
    One,
    Many,
}

impl From<String> for Cardinality {
    fn from(label: String) -> Self {
        Cardinality::from_label(&label)
    }
}

impl Cardinality {
    pub fn from_label(label: &str) -> Self {
        match label {
            "many" | "one_or_many" | "zero_or_many" => Cardinality::Many,
            _ => Cardinality::One,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeignKey {
    pub id: String,
    pub name: String,
    pub from_column_id: String,
    pub to_table_id: String,
    pub to_column_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_delete: Option<FkAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_update: Option<FkAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_cardinality: Option<Cardinality>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_cardinality: Option<Cardinality>,
}

/// Canvas coordinates; owned by the diagram editor, carried through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TablePosition {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub id: String,
    pub schema_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default)]
    pub columns: Vec<Column>,
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<TablePosition>,
}

impl Table {
    pub fn new(schema_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            schema_id: schema_id.into(),
            name: name.into(),
            comment: None,
            columns: Vec::new(),
            foreign_keys: Vec::new(),
            position: None,
        }
    }

    pub fn column(&self, id: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.id == id)
    }

    pub fn column_by_name(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_primary_key(&self) -> bool {
        self.columns.iter().any(|c| c.is_primary_key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeKind {
    Enum,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomType {
    pub id: String,
    pub schema_id: String,
    pub name: String,
    pub kind: TypeKind,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbModel {
    pub version: u32,
    pub schemas: Vec<Schema>,
    #[serde(default)]
    pub tables: Vec<Table>,
    #[serde(default)]
    pub types: Vec<CustomType>,
}

impl Default for DbModel {
    fn default() -> Self {
        Self::new()
    }
}

impl DbModel {
    /// Fresh model holding only the `public` schema.
    pub fn new() -> Self {
        Self {
            version: MODEL_VERSION,
            schemas: vec![Schema {
                id: new_id(),
                name: DEFAULT_SCHEMA.to_string(),
            }],
            tables: Vec::new(),
            types: Vec::new(),
        }
    }

    pub fn schema(&self, id: &str) -> Option<&Schema> {
        self.schemas.iter().find(|s| s.id == id)
    }

    pub fn schema_by_name(&self, name: &str) -> Option<&Schema> {
        self.schemas.iter().find(|s| s.name == name)
    }

    pub fn table(&self, id: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.id == id)
    }

    /// Copy of this model with every table's foreign-key names sanitized and
    /// de-duplicated, in array order.
    pub fn normalized(&self) -> DbModel {
        let tables = self
            .tables
            .iter()
            .map(|table| {
                let mut used: HashSet<String> = HashSet::new();
                let foreign_keys = table
                    .foreign_keys
                    .iter()
                    .map(|fk| {
                        let name = ensure_unique(&sanitize(&fk.name, &short_fallback(&fk.id)), &used);
                        used.insert(name.clone());
                        ForeignKey {
                            name,
                            ..fk.clone()
                        }
                    })
                    .collect();
                Table {
                    foreign_keys,
                    ..table.clone()
                }
            })
            .collect();

        DbModel {
            version: MODEL_VERSION,
            tables,
            ..self.clone()
        }
    }
}

/// `fk_` plus the first eight characters of an id.
pub(crate) fn short_fallback(id: &str) -> String {
    let short: String = id.chars().take(8).collect();
    format!("fk_{}", short)
}
