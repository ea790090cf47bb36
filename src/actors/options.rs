//! Option validation. Every actor declares its options as a list of
//! [`OptionSpec`]s; validation fills defaults, rejects unknown keys, checks
//! required options, and type-checks each value.

use jsonschema::{Draft, JSONSchema};
use serde_json::{Map, Value};

use crate::error::ActorError;
use crate::utils;

/// Accepted value shape for one option.
#[derive(Debug, Clone, Copy)]
pub enum OptionType {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
    /// Accepts either a string or a number; used where a token substitution
    /// may turn a numeric value into text (e.g. sleep durations).
    StringOrNumber,
    /// Accepts an array or a path string pointing at one.
    ArrayOrString,
    /// Self-validating: the value must be one of the listed strings.
    Enum(&'static [&'static str]),
    /// Self-validating: the value must be a mapping conforming to the
    /// embedded draft-7 JSON Schema.
    Schema(&'static str),
}

impl OptionType {
    fn name(&self) -> &'static str {
        match self {
            OptionType::String => "string",
            OptionType::Integer => "integer",
            OptionType::Number => "number",
            OptionType::Boolean => "boolean",
            OptionType::Object => "object",
            OptionType::Array => "array",
            OptionType::StringOrNumber => "string or number",
            OptionType::ArrayOrString => "array or string",
            OptionType::Enum(_) => "enumerated string",
            OptionType::Schema(_) => "schema-validated object",
        }
    }
}

/// Default behavior for one option: either user input is required, or the
/// declared value fills in when absent.
#[derive(Debug, Clone)]
pub enum OptionDefault {
    Required,
    Value(Value),
}

/// One declared option: name, accepted type, default, and the doc string
/// surfaced by `--explain`.
#[derive(Debug, Clone)]
pub struct OptionSpec {
    pub name: &'static str,
    pub ty: OptionType,
    pub default: OptionDefault,
    pub help: &'static str,
}

impl OptionSpec {
    pub fn required(name: &'static str, ty: OptionType, help: &'static str) -> Self {
        OptionSpec {
            name,
            ty,
            default: OptionDefault::Required,
            help,
        }
    }

    pub fn optional(name: &'static str, ty: OptionType, default: Value, help: &'static str) -> Self {
        OptionSpec {
            name,
            ty,
            default: OptionDefault::Value(default),
            help,
        }
    }
}

/// Validate `options` in place against the declared specs.
///
/// 1. Absent optional options are filled with their defaults.
/// 2. Unknown keys are rejected.
/// 3. Required options must be present with a non-null value.
/// 4. Each value is checked against its declared type; boolean options
///    coerce the usual true/false words.
pub fn validate_options(
    specs: &[OptionSpec],
    options: &mut Map<String, Value>,
) -> Result<(), ActorError> {
    let mut errors: Vec<String> = Vec::new();

    for spec in specs {
        if !options.contains_key(spec.name) {
            match &spec.default {
                OptionDefault::Value(default) => {
                    options.insert(spec.name.to_string(), default.clone());
                }
                OptionDefault::Required => {
                    errors.push(format!(
                        "option \"{}\" is required: {}",
                        spec.name, spec.help
                    ));
                }
            }
        }
    }

    for (key, value) in options.iter_mut() {
        let Some(spec) = specs.iter().find(|s| s.name == key) else {
            errors.push(format!("option \"{}\" is not expected", key));
            continue;
        };
        if value.is_null() {
            if matches!(spec.default, OptionDefault::Required) {
                errors.push(format!(
                    "option \"{}\" is required: {}",
                    spec.name, spec.help
                ));
            }
            continue;
        }
        if let Err(message) = check_type(spec, value) {
            errors.push(message);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        for e in &errors {
            tracing::error!("{}", e);
        }
        Err(ActorError::InvalidOptions(format!(
            "found {} issue(s) with passed options: {}",
            errors.len(),
            errors.join("; ")
        )))
    }
}

fn check_type(spec: &OptionSpec, value: &mut Value) -> Result<(), String> {
    // The "undefined" sentinel marks an option the actor must not manage
    // (see the ensure-state reconcile loop); it is valid for any type.
    if value.as_str() == Some("undefined") {
        return Ok(());
    }
    let mismatch = format!(
        "option \"{}\" has to be {} and is {}",
        spec.name,
        spec.ty.name(),
        value_kind(value)
    );
    match spec.ty {
        OptionType::String => value.is_string().then_some(()).ok_or(mismatch),
        OptionType::Integer => value.as_i64().map(|_| ()).ok_or(mismatch),
        OptionType::Number => value.is_number().then_some(()).ok_or(mismatch),
        OptionType::Boolean => {
            if value.is_boolean() {
                return Ok(());
            }
            // Token substitution turns booleans into text; coerce them back.
            match utils::str2bool_strict(value) {
                Ok(coerced) => {
                    *value = Value::Bool(coerced);
                    Ok(())
                }
                Err(_) => Err(mismatch),
            }
        }
        OptionType::Object => value.is_object().then_some(()).ok_or(mismatch),
        OptionType::Array => value.is_array().then_some(()).ok_or(mismatch),
        OptionType::StringOrNumber => (value.is_string() || value.is_number())
            .then_some(())
            .ok_or(mismatch),
        OptionType::ArrayOrString => (value.is_array() || value.is_string())
            .then_some(())
            .ok_or(mismatch),
        OptionType::Enum(valid) => match value.as_str() {
            Some(s) if valid.contains(&s) => Ok(()),
            _ => Err(format!(
                "option \"{}\": {} not valid, use one of: {}",
                spec.name,
                value,
                valid.join(", ")
            )),
        },
        OptionType::Schema(schema_text) => check_schema(spec.name, schema_text, value),
    }
}

fn check_schema(name: &str, schema_text: &str, value: &Value) -> Result<(), String> {
    let schema: Value = serde_json::from_str(schema_text)
        .map_err(|e| format!("option \"{}\" has an invalid embedded schema: {}", name, e))?;
    let compiled = JSONSchema::options()
        .with_draft(Draft::Draft7)
        .compile(&schema)
        .map_err(|e| format!("option \"{}\" has an invalid embedded schema: {}", name, e))?;
    compiled.validate(value).map_err(|errors| {
        let details: Vec<String> = errors.map(|e| e.to_string()).collect();
        format!(
            "option \"{}\" does not match its schema: {}",
            name,
            details.join("; ")
        )
    })
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
