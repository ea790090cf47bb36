//! [`ActorCore`]: the shared construction pipeline and per-actor state.
//!
//! Construction applies instantiation-time (`{NAME}`) substitution to the
//! description, condition and options, renders the class's default
//! description template, and validates options, all before anything runs.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::config::EngineConfig;
use crate::error::{ActorError, ScriptError};
use crate::tokens::{self, TokenStyle};
use crate::utils;

use super::options::{self, OptionSpec};
use super::{ActorInit, OrgNode};

static NULL: Value = Value::Null;

pub struct ActorCore {
    kind: String,
    desc: String,
    options: Map<String, Value>,
    dry: bool,
    warn_on_failure: bool,
    condition: Value,
    timeout: f64,
    context: HashMap<String, String>,
    tokens: HashMap<String, String>,
    config: Arc<EngineConfig>,
}

impl ActorCore {
    /// Build the shared state for one actor instance.
    ///
    /// `strict_context` controls whether a `{NAME}` left unresolved by the
    /// incoming context is fatal. Groups and macros pass `false`: their
    /// children close the gap. `default_timeout` overrides the engine-wide
    /// default for classes with their own (groups disable it with 0).
    pub fn new(
        kind: &str,
        desc_template: &str,
        specs: &[OptionSpec],
        init: &ActorInit,
        strict_context: bool,
        default_timeout: Option<f64>,
    ) -> Result<ActorCore, ActorError> {
        // Default description first: the class template renders with the
        // actor's own (raw) option values plus the {actor} placeholder.
        let desc_raw = init
            .spec
            .desc
            .clone()
            .unwrap_or_else(|| desc_template.to_string());
        let mut desc_tokens: HashMap<String, String> = init
            .spec
            .options
            .iter()
            .filter_map(|(k, v)| utils::value_to_string(v).map(|s| (k.clone(), s)))
            .collect();
        desc_tokens.insert("actor".to_string(), kind.to_string());
        let desc = tokens::substitute(&desc_raw, &desc_tokens, TokenStyle::Context, false)
            .map_err(context_error)?;
        let desc = tokens::substitute(&desc, &init.context, TokenStyle::Context, strict_context)
            .map_err(context_error)?;

        let condition = match &init.spec.condition {
            None => Value::Bool(true),
            Some(Value::String(s)) => Value::String(
                tokens::substitute(s, &init.context, TokenStyle::Context, strict_context)
                    .map_err(context_error)?,
            ),
            Some(other) => other.clone(),
        };

        let substituted = tokens::substitute_value(
            &Value::Object(init.spec.options.clone()),
            &init.context,
            TokenStyle::Context,
            strict_context,
        )
        .map_err(context_error)?;
        let mut options = match substituted {
            Value::Object(map) => map,
            _ => Map::new(),
        };

        let warn_on_failure = init
            .spec
            .warn_on_failure
            .as_ref()
            .map(utils::str2bool)
            .unwrap_or(false);

        let timeout = match &init.spec.timeout {
            Some(value) => parse_timeout(value)?,
            None => default_timeout.unwrap_or(init.config.default_timeout),
        };

        options::validate_options(specs, &mut options)?;

        let core = ActorCore {
            kind: kind.to_string(),
            desc,
            options,
            dry: init.dry,
            warn_on_failure,
            condition,
            timeout,
            context: init.context.clone(),
            tokens: init.tokens.clone(),
            config: Arc::clone(&init.config),
        };
        core.debug(&format!(
            "initialized (warn_on_failure={}, strict_context={})",
            warn_on_failure, strict_context
        ));
        Ok(core)
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn desc(&self) -> &str {
        &self.desc
    }

    pub fn dry(&self) -> bool {
        self.dry
    }

    pub fn warn_on_failure(&self) -> bool {
        self.warn_on_failure
    }

    pub fn condition(&self) -> &Value {
        &self.condition
    }

    pub fn timeout(&self) -> f64 {
        self.timeout
    }

    pub fn context(&self) -> &HashMap<String, String> {
        &self.context
    }

    pub fn tokens(&self) -> &HashMap<String, String> {
        &self.tokens
    }

    pub fn config(&self) -> &Arc<EngineConfig> {
        &self.config
    }

    /// Value of one resolved option; `Null` when absent.
    pub fn option(&self, name: &str) -> &Value {
        self.options.get(name).unwrap_or(&NULL)
    }

    pub fn option_str(&self, name: &str) -> Option<&str> {
        self.option(name).as_str()
    }

    pub fn options(&self) -> &Map<String, Value> {
        &self.options
    }

    pub fn org_node(&self) -> OrgNode {
        OrgNode {
            kind: self.kind.clone(),
            desc: self.desc.clone(),
            options: self.options.clone(),
            context: self.context.clone(),
        }
    }

    /// Evaluate the condition gate. Only the known false words (and false /
    /// zero values) skip execution.
    pub fn check_condition(&self) -> bool {
        let check = utils::str2bool(&self.condition);
        self.debug(&format!(
            "condition {} evaluates to {}",
            self.condition, check
        ));
        check
    }

    /// Guard one side-effecting operation. The message is rendered by the
    /// caller before this runs, so a broken message surfaces on the dry
    /// pass too. Dry mode logs the message and skips the operation.
    pub async fn dry_guard<F, Fut>(&self, message: String, op: F) -> Result<(), ActorError>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<(), ActorError>> + Send,
    {
        if self.dry {
            self.warn(&message);
            return Ok(());
        }
        op().await
    }

    fn log_prefix(&self) -> String {
        if self.dry {
            format!("[DRY: {}]", self.desc)
        } else {
            format!("[{}]", self.desc)
        }
    }

    pub fn debug(&self, message: &str) {
        tracing::debug!("{} {}", self.log_prefix(), message);
    }

    pub fn info(&self, message: &str) {
        tracing::info!("{} {}", self.log_prefix(), message);
    }

    pub fn warn(&self, message: &str) {
        tracing::warn!("{} {}", self.log_prefix(), message);
    }

    pub fn error(&self, message: &str) {
        tracing::error!("{} {}", self.log_prefix(), message);
    }
}

/// An unresolved `{NAME}` under strict context is a missing contextual
/// token, not a generic script failure.
fn context_error(err: ScriptError) -> ActorError {
    match err {
        ScriptError::MissingTokens(names) => ActorError::MissingContext(names),
        other => other.into(),
    }
}

fn parse_timeout(value: &Value) -> Result<f64, ActorError> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse::<f64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| {
        ActorError::InvalidOptions(format!("timeout must be a number of seconds, got {}", value))
    })
}
