//! The actor model: one trait, a shared core, and the lifecycle wrapper
//! every execution goes through.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::task::JoinError;

use crate::config::EngineConfig;
use crate::error::ActorError;
use crate::script::ActorSpec;

pub mod base;
pub mod ensurable;
pub mod group;
pub mod macros;
pub mod misc;
pub mod options;
pub mod registry;

pub use base::ActorCore;
pub use registry::ActorRegistry;

/// A unit of work with a validated option schema and a dry/real execution
/// body. Implementations provide only the body; condition checking, the
/// timeout shield, dry propagation and failure normalization live in
/// [`run`].
#[async_trait]
pub trait Actor: Send + Sync {
    fn core(&self) -> &ActorCore;

    /// The execution body. Runs under the lifecycle wrapper; never call
    /// this directly from composing actors; use [`run`].
    async fn execute(&self) -> Result<(), ActorError>;

    /// Flattened view of this actor and everything it composes. Groups and
    /// macros append their children.
    fn orgchart(&self) -> Vec<OrgNode> {
        vec![self.core().org_node()]
    }
}

pub type ActorRef = Arc<dyn Actor>;

/// Structural identity of one built actor, used to compare trees.
#[derive(Debug, Clone, PartialEq)]
pub struct OrgNode {
    pub kind: String,
    pub desc: String,
    pub options: Map<String, Value>,
    pub context: HashMap<String, String>,
}

/// Everything a constructor needs to build one actor instance.
pub struct ActorInit {
    pub spec: ActorSpec,
    pub dry: bool,
    /// Contextual tokens (`{NAME}`) inherited from the enclosing group.
    pub context: HashMap<String, String>,
    /// Document tokens (`%NAME%`) handed down for sub-document loading.
    pub tokens: HashMap<String, String>,
    pub config: Arc<EngineConfig>,
    pub registry: Arc<ActorRegistry>,
}

pub type BuildFuture = Pin<Box<dyn Future<Output = Result<ActorRef, ActorError>> + Send>>;

/// Resolve the node's actor identifier and build the instance. The whole
/// tree is built this way before anything executes, so configuration errors
/// surface before the first side effect.
pub fn build(init: ActorInit) -> BuildFuture {
    Box::pin(async move {
        tracing::debug!(
            actor = %init.spec.actor,
            desc = init.spec.desc.as_deref().unwrap_or(""),
            dry = init.dry,
            "building actor"
        );
        let registry = Arc::clone(&init.registry);
        let entry = registry.resolve(&init.spec.actor)?;
        (entry.factory)(init).await
    })
}

/// Execute one actor through its full lifecycle:
///
/// 1. A falsy `condition` skips the body and succeeds.
/// 2. The body runs as a spawned task under the actor's deadline. On expiry
///    the task is left running detached and the caller gets a recoverable
///    [`ActorError::ActorTimedOut`] immediately. In-flight side effects
///    are never interrupted mid-call.
/// 3. Recoverable failures become logged warnings when `warn_on_failure`
///    is set; fatal failures always propagate.
pub async fn run(actor: &ActorRef) -> Result<(), ActorError> {
    let core = actor.core();

    if !core.check_condition() {
        core.warn(&format!(
            "Skipping execution. Condition: {}",
            core.condition()
        ));
        return Ok(());
    }

    core.debug("beginning");
    let start = Instant::now();
    let handle = {
        let actor = Arc::clone(actor);
        tokio::spawn(async move { actor.execute().await })
    };

    let timeout = core.timeout();
    let result = if timeout > 0.0 {
        match tokio::time::timeout(Duration::from_secs_f64(timeout), handle).await {
            Ok(joined) => flatten_join(joined),
            Err(_) => {
                // Dropping the join handle detaches the body; it runs to
                // completion in the background.
                core.error(&format!("execution exceeded deadline: {}s", timeout));
                Err(ActorError::ActorTimedOut { timeout })
            }
        }
    } else {
        flatten_join(handle.await)
    };
    core.debug(&format!(
        "execution time: {:.2}s",
        start.elapsed().as_secs_f64()
    ));

    match result {
        Ok(()) => {
            core.debug("finished successfully");
            Ok(())
        }
        Err(e) if e.is_recoverable() && core.warn_on_failure() => {
            core.warn(&e.to_string());
            core.warn("Continuing execution even though a failure was detected (warn_on_failure=true)");
            Ok(())
        }
        Err(e) => {
            core.error(&e.to_string());
            Err(e)
        }
    }
}

/// Normalize a joined task result. A panicking body is an unexpected
/// failure from third-party actor code and surfaces as recoverable with
/// the diagnostic attached.
pub(crate) fn flatten_join(
    joined: Result<Result<(), ActorError>, JoinError>,
) -> Result<(), ActorError> {
    match joined {
        Ok(result) => result,
        Err(e) if e.is_panic() => Err(ActorError::Recoverable(format!(
            "actor body panicked: {}",
            e
        ))),
        Err(e) => Err(ActorError::Fatal(format!("actor task failed: {}", e))),
    }
}
