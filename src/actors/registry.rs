//! Actor registry: maps identifier strings to constructors. Populated at
//! process start; resolution tries the built-in namespace, then the
//! application namespace, then the bare identifier.

use std::collections::HashMap;
use std::fmt::Write as _;

use crate::error::ActorError;

use super::options::{OptionDefault, OptionSpec};
use super::{ActorInit, BuildFuture};

/// Namespace prefixes tried in order during resolution. First match wins.
const NAMESPACE_PREFIXES: &[&str] = &["kingpin.actors.", "actors.", ""];

pub type ActorFactory = Box<dyn Fn(ActorInit) -> BuildFuture + Send + Sync>;

/// One registered actor class: its constructor plus the metadata that
/// drives `--explain`.
pub struct ActorEntry {
    pub factory: ActorFactory,
    pub summary: &'static str,
    pub desc_template: &'static str,
    pub option_specs: fn() -> Vec<OptionSpec>,
}

pub struct ActorRegistry {
    entries: HashMap<String, ActorEntry>,
}

impl ActorRegistry {
    pub fn empty() -> Self {
        ActorRegistry {
            entries: HashMap::new(),
        }
    }

    /// Registry preloaded with the built-in actors.
    pub fn with_builtins() -> Self {
        let mut registry = ActorRegistry::empty();
        registry.register("kingpin.actors.group.Sync", super::group::sync_entry());
        registry.register("kingpin.actors.group.Async", super::group::async_entry());
        registry.register("kingpin.actors.misc.Note", super::misc::note_entry());
        registry.register("kingpin.actors.misc.Sleep", super::misc::sleep_entry());
        registry.register("kingpin.actors.misc.Macro", super::macros::entry());
        registry.register(
            "kingpin.actors.misc.GenericHttp",
            super::misc::generic_http_entry(),
        );
        registry
    }

    /// Register a constructor under its fully qualified identifier.
    /// Idempotent: a second registration of the same identifier is a no-op.
    pub fn register(&mut self, id: &str, entry: ActorEntry) {
        self.entries.entry(id.to_string()).or_insert(entry);
    }

    /// Resolve an identifier through the namespace prefixes.
    pub fn resolve(&self, name: &str) -> Result<&ActorEntry, ActorError> {
        for prefix in NAMESPACE_PREFIXES {
            let qualified = format!("{}{}", prefix, name);
            if let Some(entry) = self.entries.get(&qualified) {
                return Ok(entry);
            }
            tracing::debug!("no actor registered as \"{}\"", qualified);
        }
        Err(ActorError::InvalidActor(name.to_string()))
    }

    /// Human-readable documentation for one actor: summary, default
    /// description, and the option table.
    pub fn explain(&self, name: &str) -> Result<String, ActorError> {
        let entry = self.resolve(name)?;
        let mut out = String::new();
        let _ = writeln!(out, "{}", name);
        let _ = writeln!(out, "  {}", entry.summary);
        let _ = writeln!(out, "  default description: {}", entry.desc_template);
        let specs = (entry.option_specs)();
        if specs.is_empty() {
            let _ = writeln!(out, "  options: none");
            return Ok(out);
        }
        let _ = writeln!(out, "  options:");
        for spec in specs {
            let default = match &spec.default {
                OptionDefault::Required => "required".to_string(),
                OptionDefault::Value(v) => format!("default: {}", v),
            };
            let _ = writeln!(out, "    {} ({}): {}", spec.name, default, spec.help);
        }
        Ok(out)
    }

    pub fn registered_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.entries.keys().cloned().collect();
        ids.sort();
        ids
    }
}
