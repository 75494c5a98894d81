//! `.pgjson` persistence: one pretty-printed model per file.

use crate::model::{DbModel, MODEL_VERSION};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Conventional file extension for persisted models.
pub const EXTENSION: &str = "pgjson";

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid model document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported model version {0}")]
    UnsupportedVersion(u32),
}

/// Deserialize a model, rejecting unknown versions. Foreign-key names are
/// normalized on the way in.
pub fn from_json(text: &str) -> Result<DbModel, DocumentError> {
    let model: DbModel = serde_json::from_str(text)?;
    if model.version != MODEL_VERSION {
        return Err(DocumentError::UnsupportedVersion(model.version));
    }
    Ok(model.normalized())
}

pub fn to_json(model: &DbModel) -> Result<String, DocumentError> {
    Ok(serde_json::to_string_pretty(model)?)
}

pub fn load(path: impl AsRef<Path>) -> Result<DbModel, DocumentError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    let model = from_json(&text)?;
    debug!(path = %path.display(), tables = model.tables.len(), "model loaded");
    Ok(model)
}

pub fn save(path: impl AsRef<Path>, model: &DbModel) -> Result<(), DocumentError> {
    let path = path.as_ref();
    let mut text = to_json(model)?;
    text.push('\n');
    fs::write(path, text)?;
    debug!(path = %path.display(), "model saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::parse_sql;

    #[test]
    fn test_json_round_trip() {
        let model = parse_sql(
            "CREATE SCHEMA app; CREATE TABLE app.t (id int, note text DEFAULT 'x'); COMMENT ON TABLE app.t IS 'T';",
        )
        .unwrap();
        let text = to_json(&model).unwrap();
        assert!(text.contains("\"schemaId\""));
        assert!(text.contains("\n  "));
        assert_eq!(from_json(&text).unwrap(), model);
    }

    #[test]
    fn test_rejects_other_versions() {
        let err = from_json(r#"{"version": 2, "schemas": []}"#).unwrap_err();
        assert!(matches!(err, DocumentError::UnsupportedVersion(2)));
        assert!(matches!(from_json("{"), Err(DocumentError::Json(_))));
    }

    #[test]
    fn test_load_normalizes_foreign_key_names() {
        let text = r#"{
            "version": 1,
            "schemas": [{"id": "s", "name": "public"}],
            "tables": [{
                "id": "t", "schemaId": "s", "name": "t",
                "columns": [{"id": "c", "name": "a", "type": "int"}],
                "foreignKeys": [
                    {"id": "f1", "name": "Self Ref", "fromColumnId": "c", "toTableId": "t", "toColumnId": "c",
                     "startCardinality": "zero_or_many"},
                    {"id": "f2", "name": "self ref", "fromColumnId": "c", "toTableId": "t", "toColumnId": "c"}
                ]
            }]
        }"#;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.pgjson");
        fs::write(&path, text).unwrap();

        let model = load(&path).unwrap();
        let fks = &model.tables[0].foreign_keys;
        assert_eq!(fks[0].name, "self_ref");
        assert_eq!(fks[1].name, "self_ref_2");
        assert_eq!(fks[0].start_cardinality, Some(crate::model::Cardinality::Many));
        assert!(model.tables[0].columns[0].nullable);
    }

    #[test]
    fn test_save_then_load() {
        let model = DbModel::new();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(format!("empty.{}", EXTENSION));
        save(&path, &model).unwrap();
        assert_eq!(load(&path).unwrap(), model);
        assert!(matches!(load(dir.path().join("missing.pgjson")), Err(DocumentError::Io(_))));
    }
}
