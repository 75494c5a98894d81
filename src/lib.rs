pub mod cardinality;
pub mod document;
pub mod generator;
pub mod id;
pub mod model;
pub mod naming;
pub mod sql;
pub mod validator;

use wasm_bindgen::prelude::*;

pub use model::DbModel;
pub use sql::{ParseError, ParseMode, ParseOptions};
pub use validator::{Issue, IssueLevel};

/// Parse SQL DDL into a model.
pub fn parse(sql: &str) -> Result<DbModel, ParseError> {
    sql::parse_sql(sql)
}

pub fn parse_with(sql: &str, options: &ParseOptions) -> Result<DbModel, ParseError> {
    sql::parse_sql_with(sql, options)
}

/// Canonical DDL for a model.
pub fn generate(model: &DbModel) -> String {
    generator::generate_sql(model)
}

pub fn validate(model: &DbModel) -> Vec<Issue> {
    validator::validate(model)
}

/// Initialize panic hook for better error messages in WASM
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();
}

fn js_error(message: impl std::fmt::Display) -> JsValue {
    js_sys::Error::new(&message.to_string()).into()
}

/// Parse SQL into a model document (JSON text).
#[wasm_bindgen(js_name = "parseSql")]
pub fn parse_sql_json(sql: &str, strict: Option<bool>) -> Result<String, JsValue> {
    let options = if strict.unwrap_or(false) {
        ParseOptions::strict()
    } else {
        ParseOptions::default()
    };
    let model = parse_with(sql, &options).map_err(js_error)?;
    document::to_json(&model).map_err(js_error)
}

/// Generate SQL from a model document (JSON text).
#[wasm_bindgen(js_name = "generateSql")]
pub fn generate_sql_json(model: &str) -> Result<String, JsValue> {
    let model = document::from_json(model).map_err(js_error)?;
    Ok(generate(&model))
}

/// Validate a model document (JSON text); returns the issues as JSON.
#[wasm_bindgen(js_name = "validateModel")]
pub fn validate_model_json(model: &str) -> Result<String, JsValue> {
    let value: serde_json::Value = serde_json::from_str(model).map_err(js_error)?;
    let issues = validator::validate_document(&value);
    serde_json::to_string(&issues).map_err(js_error)
}
