//! Shared helpers: truthiness parsing, scalar stringification, value diffs.

use std::collections::{BTreeMap, HashMap};

use serde_json::{Map, Value};

use crate::error::ActorError;

const FALSE_WORDS: [&str; 4] = ["no", "false", "f", "0"];
const TRUE_WORDS: [&str; 4] = ["yes", "true", "t", "1"];

/// Loose truthiness: any value other than the known false words is true.
pub fn str2bool(value: &Value) -> bool {
    let string = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    !FALSE_WORDS.contains(&string.to_lowercase().as_str())
}

/// Strict truthiness: only the known true/false words convert.
pub fn str2bool_strict(value: &Value) -> Result<bool, ActorError> {
    let string = match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    };
    let lower = string.to_lowercase();
    if TRUE_WORDS.contains(&lower.as_str()) {
        Ok(true)
    } else if FALSE_WORDS.contains(&lower.as_str()) {
        Ok(false)
    } else {
        Err(ActorError::InvalidOptions(format!(
            "expected one of {:?} or {:?} but got: {}",
            TRUE_WORDS, FALSE_WORDS, string
        )))
    }
}

/// Render a scalar JSON value as the string a token would substitute to.
/// Objects and arrays have no string form and return `None`.
pub fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Null => None,
        Value::Object(_) | Value::Array(_) => None,
    }
}

/// Flatten a JSON mapping into a token map, keeping only scalar values.
/// Non-scalar values are skipped with a warning, matching the substituter's
/// allowed value types.
pub fn scalar_token_map(map: &Map<String, Value>) -> HashMap<String, String> {
    let mut tokens = HashMap::new();
    for (key, value) in map {
        match value_to_string(value) {
            Some(s) => {
                tokens.insert(key.clone(), s);
            }
            None => {
                tracing::warn!("token {}={} is not a scalar, skipping", key, value);
            }
        }
    }
    tokens
}

/// Order-insensitive structural comparison. Returns a short textual diff when
/// the two values differ, `None` when they are equivalent.
pub fn diff_values(have: &Value, want: &Value) -> Option<String> {
    let have_c = canonicalize(have);
    let want_c = canonicalize(want);
    if have_c == want_c {
        return None;
    }
    let have_s = serde_json::to_string_pretty(&have_c).unwrap_or_else(|_| have_c.to_string());
    let want_s = serde_json::to_string_pretty(&want_c).unwrap_or_else(|_| want_c.to_string());
    let mut out = String::new();
    for line in have_s.lines() {
        out.push_str("- ");
        out.push_str(line);
        out.push('\n');
    }
    for line in want_s.lines() {
        out.push_str("+ ");
        out.push_str(line);
        out.push('\n');
    }
    Some(out)
}

/// Re-order maps and arrays into a predictable shape so two values built in
/// different orders compare equal.
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> = map
                .iter()
                .map(|(k, v)| (k.clone(), canonicalize(v)))
                .collect();
            let mut out = Map::new();
            for (k, v) in sorted {
                out.insert(k, v);
            }
            Value::Object(out)
        }
        Value::Array(items) => {
            let mut sorted: Vec<Value> = items.iter().map(canonicalize).collect();
            sorted.sort_by_key(|v| v.to_string());
            Value::Array(sorted)
        }
        other => other.clone(),
    }
}
