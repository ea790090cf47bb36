//! The per-node actor schema every script document must conform to.

use std::sync::OnceLock;

use jsonschema::{Draft, JSONSchema};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::ScriptError;

/// One actor node, parsed from a script document.
#[derive(Debug, Clone, Deserialize)]
pub struct ActorSpec {
    /// Identifier resolved through the actor registry, e.g. `misc.Sleep`.
    pub actor: String,
    /// Human description. Defaults per actor class when absent.
    #[serde(default)]
    pub desc: Option<String>,
    /// Actor-specific options.
    #[serde(default)]
    pub options: Map<String, Value>,
    /// Boolean-or-string gate; falsy values skip execution.
    #[serde(default)]
    pub condition: Option<Value>,
    /// Boolean-or-string; truthy downgrades recoverable failures to warnings.
    #[serde(default)]
    pub warn_on_failure: Option<Value>,
    /// Deadline in seconds. `0` disables.
    #[serde(default)]
    pub timeout: Option<Value>,
}

impl ActorSpec {
    /// Parse a schema-validated node value.
    pub fn from_value(value: &Value) -> Result<ActorSpec, ScriptError> {
        serde_json::from_value(value.clone())
            .map_err(|e| ScriptError::SchemaInvalid(e.to_string()))
    }
}

const NODE_SCHEMA: &str = r#"{
    "type": "object",
    "required": ["actor"],
    "additionalProperties": false,
    "properties": {
        "actor": {"type": "string"},
        "desc": {"type": "string"},
        "options": {"type": "object"},
        "condition": {"type": ["boolean", "string"]},
        "warn_on_failure": {"type": ["boolean", "string"]},
        "timeout": {"type": ["integer", "number", "string"]}
    }
}"#;

fn node_schema() -> &'static JSONSchema {
    static SCHEMA: OnceLock<JSONSchema> = OnceLock::new();
    SCHEMA.get_or_init(|| {
        let schema: Value =
            serde_json::from_str(NODE_SCHEMA).expect("node schema must be valid JSON");
        JSONSchema::options()
            .with_draft(Draft::Draft7)
            .compile(&schema)
            .expect("node schema must compile")
    })
}

/// Validate one actor node against the schema.
pub fn validate_node(value: &Value) -> Result<(), ScriptError> {
    node_schema().validate(value).map_err(|errors| {
        let details: Vec<String> = errors.map(|e| e.to_string()).collect();
        ScriptError::SchemaInvalid(details.join("; "))
    })
}

/// Validate a whole document root: either a single actor node or an array
/// of them (the `group.Sync` shorthand).
pub fn validate(value: &Value) -> Result<(), ScriptError> {
    match value {
        Value::Array(items) => {
            for item in items {
                validate_node(item)?;
            }
            Ok(())
        }
        _ => validate_node(value),
    }
}
