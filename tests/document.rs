use pgmodel::{document, generate, parse, validator};
use pretty_assertions::assert_eq;

#[test]
fn test_saved_document_regenerates_same_sql() {
    let model = parse(
        "CREATE SCHEMA crm;
         CREATE TYPE crm.tier AS ENUM ('gold', 'silver');
         CREATE TABLE crm.accounts (id bigint, tier crm.tier DEFAULT 'silver', parent_id bigint,
           CONSTRAINT parent FOREIGN KEY (parent_id) REFERENCES crm.accounts (id) ON DELETE SET NULL);
         COMMENT ON COLUMN crm.accounts.tier IS 'Billing tier';",
    )
    .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("crm.pgjson");
    document::save(&path, &model).unwrap();
    let loaded = document::load(&path).unwrap();

    assert_eq!(loaded, model);
    assert_eq!(generate(&loaded), generate(&model));
}

#[test]
fn test_raw_document_validation() {
    let model = parse("CREATE TABLE t (a int);").unwrap();
    let value = serde_json::to_value(&model).unwrap();
    let issues = validator::validate_document(&value);
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].to_string(), "warning: table \"t\" has no primary key");

    let mut broken = value;
    broken["tables"][0]["columns"][0]["nullable"] = serde_json::json!("no");
    let issues = validator::validate_document(&broken);
    assert_eq!(
        issues[0].to_string(),
        "error: table \"t\" / column \"a\": nullable must be a boolean"
    );
}
