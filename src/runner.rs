//! The top-level run sequence: build the tree, rehearse it dry, then run
//! it for real. Exit status maps to the shell convention.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::actors::{self, ActorInit, ActorRef, ActorRegistry};
use crate::config::EngineConfig;
use crate::error::{ActorError, ScriptError};
use crate::script::{loader, schema, ActorSpec};

/// How much of the run sequence to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Rehearsal then real pass.
    Full,
    /// Rehearsal only.
    DryOnly,
    /// Construct the tree and stop.
    BuildOnly,
}

pub struct Runner {
    config: Arc<EngineConfig>,
    registry: Arc<ActorRegistry>,
}

impl Runner {
    pub fn new(config: EngineConfig, registry: ActorRegistry) -> Self {
        Runner {
            config: Arc::new(config),
            registry: Arc::new(registry),
        }
    }

    /// Load a script document and run it. Returns the process exit code:
    /// zero only when every requested pass succeeded.
    pub async fn execute_script(&self, source: &str, mode: RunMode) -> i32 {
        let node = match loader::load_script(source, &self.config.tokens).await {
            Ok(node) => node,
            Err(e) => {
                tracing::error!("invalid script detected: {}", e);
                return 1;
            }
        };
        self.execute_node(node, mode).await
    }

    /// Run an already-parsed root node through the full sequence.
    pub async fn execute_node(&self, node: Value, mode: RunMode) -> i32 {
        if let Err(e) = schema::validate(&node) {
            tracing::error!("invalid script detected: {}", e);
            return 1;
        }

        // Build with dry=true: the whole tree is instantiated before
        // anything executes, so configuration errors surface here.
        let rehearsal_actor = match self.build(&node, true).await {
            Ok(actor) => actor,
            Err(e) => {
                tracing::error!("invalid actor configuration detected: {}", e);
                return 1;
            }
        };
        if mode == RunMode::BuildOnly {
            tracing::info!("build OK: {} actors", rehearsal_actor.orgchart().len());
            return 0;
        }

        if self.config.skip_dry {
            tracing::warn!("skipping rehearsal (SKIP_DRY is set)");
        } else {
            tracing::info!("rehearsing... break a leg!");
            if let Err(e) = actors::run(&rehearsal_actor).await {
                tracing::error!("dry run failed: {}", e);
                return 1;
            }
            tracing::info!("rehearsal OK!");
        }
        if mode == RunMode::DryOnly {
            return 0;
        }

        tracing::info!("performing!");
        let actor = match self.build(&node, false).await {
            Ok(actor) => actor,
            Err(e) => {
                tracing::error!("invalid actor configuration detected: {}", e);
                return 1;
            }
        };
        match actors::run(&actor).await {
            Ok(()) => 0,
            Err(e) => {
                tracing::error!("run failed: {}", e);
                1
            }
        }
    }

    /// Instantiate the root actor tree from a validated node.
    pub async fn build(&self, node: &Value, dry: bool) -> Result<ActorRef, ActorError> {
        let spec = ActorSpec::from_value(node)?;
        actors::build(ActorInit {
            spec,
            dry,
            context: HashMap::new(),
            tokens: self.config.tokens.clone(),
            config: Arc::clone(&self.config),
            registry: Arc::clone(&self.registry),
        })
        .await
    }

    /// Load without running; surfaces script errors to the caller.
    pub async fn load(&self, source: &str) -> Result<Value, ScriptError> {
        loader::load_script(source, &self.config.tokens).await
    }

    pub fn registry(&self) -> &ActorRegistry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn runner() -> Runner {
        Runner::new(EngineConfig::default(), ActorRegistry::with_builtins())
    }

    fn script_file(contents: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn test_successful_script_exits_zero() {
        let file =
            script_file(r#"{"actor": "misc.Note", "options": {"message": "hello"}}"#);
        let code = runner()
            .execute_script(file.path().to_str().unwrap(), RunMode::Full)
            .await;
        assert_eq!(code, 0);
    }

    #[tokio::test]
    async fn test_missing_token_exits_one() {
        let file =
            script_file(r#"{"actor": "misc.Note", "options": {"message": "hi %NAME%"}}"#);
        let code = runner()
            .execute_script(file.path().to_str().unwrap(), RunMode::Full)
            .await;
        assert_eq!(code, 1);
    }

    #[tokio::test]
    async fn test_unknown_actor_exits_one() {
        let code = runner()
            .execute_node(json!({"actor": "misc.Nope"}), RunMode::Full)
            .await;
        assert_eq!(code, 1);
    }

    #[tokio::test]
    async fn test_build_only_does_not_execute() {
        // A sleep that would take noticeable time; build-only must return
        // immediately.
        let start = std::time::Instant::now();
        let code = runner()
            .execute_node(
                json!({"actor": "misc.Sleep", "options": {"sleep": 5}}),
                RunMode::BuildOnly,
            )
            .await;
        assert_eq!(code, 0);
        assert!(start.elapsed().as_secs_f64() < 1.0);
    }

    #[tokio::test]
    async fn test_dry_only_does_not_sleep() {
        let start = std::time::Instant::now();
        let code = runner()
            .execute_node(
                json!({"actor": "misc.Sleep", "options": {"sleep": 5}}),
                RunMode::DryOnly,
            )
            .await;
        assert_eq!(code, 0);
        assert!(start.elapsed().as_secs_f64() < 1.0);
    }

    #[tokio::test]
    async fn test_schema_violation_exits_one() {
        let code = runner()
            .execute_node(json!({"desc": "no actor"}), RunMode::Full)
            .await;
        assert_eq!(code, 1);
    }

    #[tokio::test]
    async fn test_identical_input_builds_identical_trees() {
        let node = json!({
            "actor": "group.Sync",
            "options": {
                "acts": [
                    {"actor": "misc.Note", "options": {"message": "hi {R}"}}
                ],
                "contexts": [{"R": "a"}, {"R": "b"}]
            }
        });
        let runner = runner();
        let first = runner.build(&node, true).await.unwrap();
        let second = runner.build(&node, true).await.unwrap();
        assert_eq!(first.orgchart(), second.orgchart());

        // The real tree has the same structure as the rehearsal tree.
        let real = runner.build(&node, false).await.unwrap();
        assert_eq!(first.orgchart(), real.orgchart());
    }
}
