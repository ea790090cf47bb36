//! The macro actor: loads another script document and runs it as a single
//! child, with its own token set.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::error::ActorError;
use crate::script::{loader, ActorSpec};
use crate::utils;

use super::base::ActorCore;
use super::options::{OptionSpec, OptionType};
use super::registry::ActorEntry;
use super::{Actor, ActorInit, ActorRef, OrgNode};

/// Parses another script, instantiates it, and executes it as one child.
///
/// Tokens do not propagate across macro boundaries: the sub-document's
/// document-time substitution sees the ambient token set merged with this
/// actor's explicit `tokens` option, never the contextual tokens of an
/// enclosing group. This keeps token names reusable between documents at
/// the cost of spelling out every token a sub-document needs.
pub struct Macro {
    core: ActorCore,
    child: ActorRef,
}

impl Macro {
    const DESC: &'static str = "Macro: {macro}";
    const SUMMARY: &'static str = "Loads and runs another script as a single child actor.";

    fn option_specs() -> Vec<OptionSpec> {
        vec![
            OptionSpec::required(
                "macro",
                OptionType::String,
                "Path to a script: http(s) URL, absolute or relative file path.",
            ),
            OptionSpec::optional(
                "tokens",
                OptionType::Object,
                json!({}),
                "Tokens to substitute within the loaded script.",
            ),
        ]
    }

    async fn build(init: ActorInit) -> Result<ActorRef, ActorError> {
        let core = ActorCore::new(
            "misc.Macro",
            Self::DESC,
            &Self::option_specs(),
            &init,
            false,
            Some(0.0),
        )?;

        let target = core.option_str("macro").unwrap_or("").to_string();
        if target.starts_with("ftp://") {
            return Err(ActorError::Fatal(format!(
                "macro cannot fetch ftp sources: {}",
                target
            )));
        }
        core.info(&format!("preparing actors from {}", target));

        // Explicit tokens win over the inherited ambient set.
        let mut tokens = core.tokens().clone();
        if let Some(explicit) = core.option("tokens").as_object() {
            tokens.extend(utils::scalar_token_map(explicit));
        }

        let node = loader::load_script(&target, &tokens).await?;
        let spec = ActorSpec::from_value(&node)?;
        let child = super::build(ActorInit {
            spec,
            dry: core.dry(),
            context: core.context().clone(),
            tokens,
            config: Arc::clone(&init.config),
            registry: Arc::clone(&init.registry),
        })
        .await?;

        Ok(Arc::new(Macro { core, child }))
    }
}

#[async_trait]
impl Actor for Macro {
    fn core(&self) -> &ActorCore {
        &self.core
    }

    fn orgchart(&self) -> Vec<OrgNode> {
        let mut nodes = vec![self.core.org_node()];
        nodes.extend(self.child.orgchart());
        nodes
    }

    async fn execute(&self) -> Result<(), ActorError> {
        // The child carries the same dry flag; just run it.
        super::run(&self.child).await
    }
}

pub fn entry() -> ActorEntry {
    ActorEntry {
        factory: Box::new(|init| Box::pin(Macro::build(init))),
        summary: Macro::SUMMARY,
        desc_template: Macro::DESC,
        option_specs: Macro::option_specs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actors;
    use crate::config::EngineConfig;
    use crate::error::ScriptError;
    use serde_json::Value;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn init(node: Value, dry: bool) -> ActorInit {
        ActorInit {
            spec: ActorSpec::from_value(&node).unwrap(),
            dry,
            context: HashMap::new(),
            tokens: HashMap::new(),
            config: Arc::new(EngineConfig::default()),
            registry: Arc::new(actors::ActorRegistry::with_builtins()),
        }
    }

    fn script_file(contents: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn test_macro_builds_and_runs_sub_script() {
        let file = script_file(r#"{"actor": "misc.Note", "options": {"message": "from %WHO%"}}"#);
        let actor = Macro::build(init(
            json!({
                "actor": "misc.Macro",
                "options": {
                    "macro": file.path().to_str().unwrap(),
                    "tokens": {"WHO": "inner"}
                }
            }),
            false,
        ))
        .await
        .unwrap();
        actors::run(&actor).await.unwrap();
        let chart = actor.orgchart();
        assert_eq!(chart.len(), 2);
        assert_eq!(chart[1].options.get("message"), Some(&json!("from inner")));
    }

    #[tokio::test]
    async fn test_macro_array_sub_script_becomes_sync_group() {
        let file = script_file(
            r#"[{"actor": "misc.Note", "options": {"message": "a"}},
                {"actor": "misc.Note", "options": {"message": "b"}}]"#,
        );
        let actor = Macro::build(init(
            json!({
                "actor": "misc.Macro",
                "options": {"macro": file.path().to_str().unwrap()}
            }),
            false,
        ))
        .await
        .unwrap();
        let chart = actor.orgchart();
        assert_eq!(chart[1].kind, "group.Sync");
        assert_eq!(chart.len(), 4);
    }

    #[tokio::test]
    async fn test_group_context_does_not_reach_sub_script() {
        // The sub-document references %R%, bound only as a contextual token
        // in the enclosing group. Document-time substitution must not see it.
        let file = script_file(r#"{"actor": "misc.Note", "options": {"message": "%R%"}}"#);
        let mut macro_init = init(
            json!({
                "actor": "misc.Macro",
                "options": {"macro": file.path().to_str().unwrap()}
            }),
            false,
        );
        macro_init.context.insert("R".to_string(), "x".to_string());
        let err = Macro::build(macro_init).await.err().unwrap();
        match err {
            ActorError::Script(ScriptError::MissingTokens(names)) => {
                assert_eq!(names, vec!["R".to_string()]);
            }
            other => panic!("expected MissingTokens, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_macro_context_still_applies_to_own_desc() {
        let file = script_file(r#"{"actor": "misc.Note", "options": {"message": "hi"}}"#);
        let mut macro_init = init(
            json!({
                "actor": "misc.Macro",
                "desc": "stage {STAGE}",
                "options": {"macro": file.path().to_str().unwrap()}
            }),
            false,
        );
        macro_init
            .context
            .insert("STAGE".to_string(), "one".to_string());
        let actor = Macro::build(macro_init).await.unwrap();
        assert_eq!(actor.core().desc(), "stage one");
    }

    #[tokio::test]
    async fn test_ftp_target_rejected() {
        let result = Macro::build(init(
            json!({
                "actor": "misc.Macro",
                "options": {"macro": "ftp://host/script.json"}
            }),
            false,
        ))
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_sub_script_schema_errors_are_fatal() {
        let file = script_file(r#"{"desc": "missing actor key"}"#);
        let result = Macro::build(init(
            json!({
                "actor": "misc.Macro",
                "options": {"macro": file.path().to_str().unwrap()}
            }),
            false,
        ))
        .await;
        let err = result.err().unwrap();
        assert!(!err.is_recoverable());
    }
}
