//! Load-time errors raised while reading and validating a script document.

use thiserror::Error;

/// Errors raised before any actor is built: fetching, parsing, token
/// substitution, and schema validation of a script document. All of these
/// are fatal: a script that fails to load never executes.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("error reading script {path}: {reason}")]
    ReadFailed { path: String, reason: String },
    #[error("invalid script: {0}")]
    InvalidScript(String),
    #[error("invalid script extension: {0}")]
    InvalidScriptName(String),
    #[error("unsupported scheme for script source: {0}")]
    UnsupportedScheme(String),
    #[error("unresolved tokens in script: {}", .0.join(", "))]
    MissingTokens(Vec<String>),
    #[error("script does not match the actor schema: {0}")]
    SchemaInvalid(String),
}
