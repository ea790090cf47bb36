//! Group actors: compose children synchronously, asynchronously, or with
//! bounded concurrency, optionally fanned out over a list of contexts.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Semaphore;

use crate::error::ActorError;
use crate::script::{loader, schema, ActorSpec};
use crate::utils;

use super::base::ActorCore;
use super::options::{OptionSpec, OptionType};
use super::registry::ActorEntry;
use super::{Actor, ActorInit, ActorRef, OrgNode};

fn group_option_specs() -> Vec<OptionSpec> {
    vec![
        OptionSpec::required("acts", OptionType::Array, "Array of actor definitions."),
        OptionSpec::optional(
            "contexts",
            OptionType::ArrayOrString,
            json!([]),
            "List of context mappings, or the path of a file containing one.",
        ),
    ]
}

fn async_option_specs() -> Vec<OptionSpec> {
    let mut specs = group_option_specs();
    specs.push(OptionSpec::optional(
        "concurrency",
        OptionType::Integer,
        json!(0),
        "Maximum children in flight at once. 0 means unbounded.",
    ));
    specs
}

/// Resolve the `contexts` option into a list of token maps. Absent or empty
/// means one empty context. A string is the path of a file holding the
/// list; the file goes through document-time substitution against the
/// group's inherited token set.
async fn resolve_contexts(
    core: &ActorCore,
) -> Result<Vec<HashMap<String, String>>, ActorError> {
    let raw = match core.option("contexts") {
        Value::String(path) => loader::load_raw(path, core.tokens()).await?,
        other => other.clone(),
    };
    let items = raw.as_array().cloned().unwrap_or_default();
    if items.is_empty() {
        return Ok(vec![HashMap::new()]);
    }
    let mut contexts = Vec::with_capacity(items.len());
    for item in &items {
        let map = item.as_object().ok_or_else(|| {
            ActorError::InvalidOptions(format!("context entries must be mappings, got {}", item))
        })?;
        let mut context = HashMap::new();
        for (key, value) in map {
            let string = utils::value_to_string(value).ok_or_else(|| {
                ActorError::InvalidOptions(format!(
                    "context value for \"{}\" must be a scalar, got {}",
                    key, value
                ))
            })?;
            context.insert(key.clone(), string);
        }
        contexts.push(context);
    }
    Ok(contexts)
}

/// Build every child instance up front: one copy of `acts` per context, in
/// context order. Any construction error aborts the whole tree build.
///
/// Children are built from the raw act specs, not the group's substituted
/// options: each child's strings go through exactly one contextual pass,
/// against the merged context, so a fan-out element can override a token
/// name the group inherited.
async fn build_children(core: &ActorCore, init: &ActorInit) -> Result<Vec<ActorRef>, ActorError> {
    let contexts = resolve_contexts(core).await?;
    let acts = init
        .spec
        .options
        .get("acts")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut children = Vec::with_capacity(contexts.len() * acts.len());
    for context in &contexts {
        for act in &acts {
            schema::validate_node(act).map_err(ActorError::from)?;
            let spec = ActorSpec::from_value(act)?;
            let mut merged = core.context().clone();
            merged.extend(context.clone());
            let child = super::build(ActorInit {
                spec,
                dry: core.dry(),
                context: merged,
                tokens: core.tokens().clone(),
                config: Arc::clone(&init.config),
                registry: Arc::clone(&init.registry),
            })
            .await?;
            children.push(child);
        }
    }
    Ok(children)
}

fn group_orgchart(core: &ActorCore, children: &[ActorRef]) -> Vec<OrgNode> {
    let mut nodes = vec![core.org_node()];
    for child in children {
        nodes.extend(child.orgchart());
    }
    nodes
}

/// Runs its children one at a time, in declaration order.
pub struct Sync {
    core: ActorCore,
    children: Vec<ActorRef>,
}

impl Sync {
    const DESC: &'static str = "Synchronous group";
    const SUMMARY: &'static str = "Runs child actors one at a time, in order.";

    async fn build(init: ActorInit) -> Result<ActorRef, ActorError> {
        let core = ActorCore::new(
            "group.Sync",
            Self::DESC,
            &group_option_specs(),
            &init,
            false,
            Some(0.0),
        )?;
        let children = build_children(&core, &init).await?;
        Ok(Arc::new(Sync { core, children }))
    }
}

#[async_trait]
impl Actor for Sync {
    fn core(&self) -> &ActorCore {
        &self.core
    }

    fn orgchart(&self) -> Vec<OrgNode> {
        group_orgchart(&self.core, &self.children)
    }

    async fn execute(&self) -> Result<(), ActorError> {
        self.core
            .info(&format!("beginning {} actions", self.children.len()));

        if !self.core.dry() {
            for child in &self.children {
                if let Err(e) = super::run(child).await {
                    self.core
                        .error(&format!("act \"{}\" failed", child.core().desc()));
                    return Err(e);
                }
            }
            return Ok(());
        }

        // Dry pass: keep going past recoverable failures so the operator
        // sees every problem in one rehearsal. Fatal failures still stop
        // the walk.
        let mut failed = 0;
        for child in &self.children {
            match super::run(child).await {
                Ok(()) => {}
                Err(e) if e.is_recoverable() => {
                    failed += 1;
                    self.core
                        .error(&format!("act \"{}\" failed", child.core().desc()));
                }
                Err(e) => {
                    self.core
                        .error(&format!("act \"{}\" failed", child.core().desc()));
                    return Err(e);
                }
            }
        }
        if failed > 0 {
            return Err(ActorError::GroupFailed {
                failed,
                total: self.children.len(),
                fatal: false,
            });
        }
        Ok(())
    }
}

pub fn sync_entry() -> ActorEntry {
    ActorEntry {
        factory: Box::new(|init| Box::pin(Sync::build(init))),
        summary: Sync::SUMMARY,
        desc_template: Sync::DESC,
        option_specs: group_option_specs,
    }
}

/// Dispatches all children at once, optionally bounded by `concurrency`.
pub struct Async {
    core: ActorCore,
    children: Vec<ActorRef>,
    concurrency: usize,
}

impl Async {
    const DESC: &'static str = "Asynchronous group";
    const SUMMARY: &'static str =
        "Runs child actors concurrently, optionally bounded by a concurrency limit.";

    async fn build(init: ActorInit) -> Result<ActorRef, ActorError> {
        let core = ActorCore::new(
            "group.Async",
            Self::DESC,
            &async_option_specs(),
            &init,
            false,
            Some(0.0),
        )?;
        let concurrency = core.option("concurrency").as_u64().unwrap_or(0) as usize;
        let children = build_children(&core, &init).await?;
        Ok(Arc::new(Async {
            core,
            children,
            concurrency,
        }))
    }
}

#[async_trait]
impl Actor for Async {
    fn core(&self) -> &ActorCore {
        &self.core
    }

    fn orgchart(&self) -> Vec<OrgNode> {
        group_orgchart(&self.core, &self.children)
    }

    async fn execute(&self) -> Result<(), ActorError> {
        self.core
            .info(&format!("beginning {} actions", self.children.len()));

        let semaphore = (self.concurrency > 0)
            .then(|| Arc::new(Semaphore::new(self.concurrency)));

        let mut tasks = Vec::with_capacity(self.children.len());
        for child in &self.children {
            let child = Arc::clone(child);
            let semaphore = semaphore.clone();
            tasks.push(tokio::spawn(async move {
                let _permit = match &semaphore {
                    Some(s) => Some(Arc::clone(s).acquire_owned().await.map_err(|e| {
                        ActorError::Fatal(format!("concurrency semaphore closed: {}", e))
                    })?),
                    None => None,
                };
                super::run(&child).await
            }));
        }

        // Wait for every launched child, even after a failure. Siblings are
        // never cancelled.
        let mut failed = 0;
        let mut fatal = false;
        for task in futures::future::join_all(tasks).await {
            match super::flatten_join(task) {
                Ok(()) => {}
                Err(e) => {
                    failed += 1;
                    fatal = fatal || !e.is_recoverable();
                }
            }
        }

        if failed > 0 {
            self.core.error("failures detected in group");
            return Err(ActorError::GroupFailed {
                failed,
                total: self.children.len(),
                fatal,
            });
        }
        Ok(())
    }
}

pub fn async_entry() -> ActorEntry {
    ActorEntry {
        factory: Box::new(|init| Box::pin(Async::build(init))),
        summary: Async::SUMMARY,
        desc_template: Async::DESC,
        option_specs: async_option_specs,
    }
}
