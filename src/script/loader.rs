//! Document loader: fetch a script from disk or HTTP(S), apply document-time
//! token substitution to the raw text, parse by extension, and validate.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::ScriptError;
use crate::tokens::{self, TokenStyle};

use super::schema;

/// Load a script document and return the normalized, schema-validated root
/// node. A top-level array is rewritten into its `group.Sync` equivalent.
pub async fn load_script(
    source: &str,
    tokens: &HashMap<String, String>,
) -> Result<Value, ScriptError> {
    let parsed = load_raw(source, tokens).await?;
    let normalized = normalize(parsed);
    schema::validate(&normalized)?;
    Ok(normalized)
}

/// Load and parse a document without normalization or schema validation.
/// Used for auxiliary files such as a group's `contexts` list.
pub async fn load_raw(
    source: &str,
    tokens: &HashMap<String, String>,
) -> Result<Value, ScriptError> {
    tracing::debug!("reading {}", source);
    let raw = fetch(source).await?;
    let substituted = tokens::substitute(&raw, tokens, TokenStyle::Document, true)?;
    parse(source, &substituted)
}

async fn fetch(source: &str) -> Result<String, ScriptError> {
    if source.starts_with("ftp://") {
        return Err(ScriptError::UnsupportedScheme(source.to_string()));
    }
    if source.starts_with("http://") || source.starts_with("https://") {
        let response = reqwest::get(source).await.map_err(|e| ScriptError::ReadFailed {
            path: source.to_string(),
            reason: e.to_string(),
        })?;
        let response = response.error_for_status().map_err(|e| ScriptError::ReadFailed {
            path: source.to_string(),
            reason: e.to_string(),
        })?;
        return response.text().await.map_err(|e| ScriptError::ReadFailed {
            path: source.to_string(),
            reason: e.to_string(),
        });
    }
    tokio::fs::read_to_string(source)
        .await
        .map_err(|e| ScriptError::ReadFailed {
            path: source.to_string(),
            reason: e.to_string(),
        })
}

fn parse(source: &str, text: &str) -> Result<Value, ScriptError> {
    match extension(source) {
        Some("json") => serde_json::from_str(text)
            .map_err(|e| ScriptError::InvalidScript(format!("JSON in `{}`: {}", source, e))),
        Some("yaml") | Some("yml") => {
            let value: Value = serde_yaml::from_str(text)
                .map_err(|e| ScriptError::InvalidScript(format!("YAML in `{}`: {}", source, e)))?;
            if value.is_null() {
                return Err(ScriptError::InvalidScript(format!(
                    "empty YAML in `{}`",
                    source
                )));
            }
            Ok(value)
        }
        other => Err(ScriptError::InvalidScriptName(
            other.unwrap_or("<none>").to_string(),
        )),
    }
}

/// File extension of a path or URL, with any query string stripped.
fn extension(source: &str) -> Option<&str> {
    let path = source.split(['?', '#']).next().unwrap_or(source);
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => Some(ext),
        _ => None,
    }
}

/// A top-level array of actor nodes is shorthand for one synchronous group.
fn normalize(value: Value) -> Value {
    match value {
        Value::Array(acts) => serde_json::json!({
            "actor": "group.Sync",
            "options": {"acts": acts}
        }),
        other => other,
    }
}
