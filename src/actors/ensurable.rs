//! Ensure-state composition: a reconcile loop over named properties for
//! actors whose job is to make an external resource match a declared state.
//!
//! A concrete actor implements [`Ensurable`] by providing a getter and a
//! setter per managed property (plus `get_state`/`set_state` for resource
//! existence); the [`reconcile`] loop supplies the order of operations,
//! dry-mode reporting, and the default comparison.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::ActorError;
use crate::utils;

use super::options::{OptionSpec, OptionType};
use super::Actor;

/// Desired or observed existence of the managed resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceState {
    Present,
    Absent,
}

impl ResourceState {
    pub fn from_option(value: &Value) -> Result<ResourceState, ActorError> {
        match value.as_str() {
            Some("present") => Ok(ResourceState::Present),
            Some("absent") => Ok(ResourceState::Absent),
            _ => Err(ActorError::InvalidOptions(format!(
                "state must be \"present\" or \"absent\", got {}",
                value
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceState::Present => "present",
            ResourceState::Absent => "absent",
        }
    }
}

/// The implied `state` option every ensurable actor carries.
pub fn state_option_spec() -> OptionSpec {
    OptionSpec::optional(
        "state",
        OptionType::Enum(&["present", "absent"]),
        json!("present"),
        "Desired state of the resource: present or absent.",
    )
}

/// Managed property names: every declared option except `state` and the
/// ones the actor marks unmanaged (immutable identifiers like `name` or
/// `region`).
pub fn managed_properties(specs: &[OptionSpec], unmanaged: &[&str]) -> Vec<&'static str> {
    specs
        .iter()
        .map(|s| s.name)
        .filter(|name| *name != "state" && !unmanaged.contains(name))
        .collect()
}

/// An actor that reconciles an external resource toward its declared
/// options via per-property get/compare/set.
#[async_trait]
pub trait Ensurable: Actor {
    /// Property names to reconcile, in declaration order.
    fn properties(&self) -> Vec<&'static str>;

    /// One-shot read of any shared remote state before reconciliation.
    async fn precache(&self) -> Result<(), ActorError> {
        Ok(())
    }

    async fn get_state(&self) -> Result<ResourceState, ActorError>;

    async fn set_state(&self, want: ResourceState) -> Result<(), ActorError>;

    /// Current remote value of one property.
    async fn get_property(&self, name: &str) -> Result<Value, ActorError>;

    /// Push the declared value of one property to the resource.
    async fn set_property(&self, name: &str) -> Result<(), ActorError>;

    /// Whether the remote value already matches the declared one. The
    /// default is structural equality against the option value.
    async fn compare_property(&self, name: &str, have: &Value) -> Result<bool, ActorError> {
        Ok(utils::diff_values(have, self.core().option(name)).is_none())
    }
}

/// The execution body for ensurable actors: reconcile existence first, then
/// each managed property in order. Dry mode reports the diff instead of
/// calling the setter.
pub async fn reconcile<A: Ensurable + ?Sized>(actor: &A) -> Result<(), ActorError> {
    let core = actor.core();
    actor.precache().await?;

    let want = ResourceState::from_option(core.option("state"))?;
    let have = actor.get_state().await?;
    if want != have {
        if core.dry() {
            core.warn(&format!("Would have set state to {}", want.as_str()));
        } else {
            core.debug(&format!("state is {}, setting to {}", have.as_str(), want.as_str()));
            actor.set_state(want).await?;
        }
    } else {
        core.debug("state matches");
    }
    if want == ResourceState::Absent {
        return Ok(());
    }

    for name in actor.properties() {
        let declared = core.option(name);
        // A property the user never supplied, or supplied as the
        // "undefined" sentinel, is left unmanaged.
        if declared.is_null() || declared == &json!("undefined") {
            core.debug(&format!("option \"{}\" is unmanaged, skipping", name));
            continue;
        }
        let have = actor.get_property(name).await?;
        if actor.compare_property(name, &have).await? {
            core.debug(&format!("option \"{}\" matches", name));
            continue;
        }
        if core.dry() {
            let diff = utils::diff_values(&have, declared).unwrap_or_default();
            core.warn(&format!("Would have updated \"{}\":\n{}", name, diff));
        } else {
            core.debug(&format!("option \"{}\" does not match, calling setter", name));
            actor.set_property(name).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actors::base::ActorCore;
    use crate::actors::registry::ActorRegistry;
    use crate::actors::ActorInit;
    use crate::config::EngineConfig;
    use crate::script::ActorSpec;
    use serde_json::Map;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::Mutex;

    /// In-memory resource that records every setter call.
    struct FakeResource {
        core: ActorCore,
        remote: Mutex<Option<Map<String, Value>>>,
        set_calls: AtomicUsize,
    }

    impl FakeResource {
        fn option_specs() -> Vec<OptionSpec> {
            vec![
                OptionSpec::required("name", OptionType::String, "Resource name."),
                OptionSpec::optional(
                    "owner",
                    OptionType::String,
                    json!("undefined"),
                    "Owner of the resource.",
                ),
                OptionSpec::optional(
                    "size",
                    OptionType::Integer,
                    json!("undefined"),
                    "Resource size.",
                ),
                state_option_spec(),
            ]
        }

        fn build(node: Value, dry: bool, remote: Option<Map<String, Value>>) -> Arc<FakeResource> {
            let init = ActorInit {
                spec: ActorSpec::from_value(&node).unwrap(),
                dry,
                context: HashMap::new(),
                tokens: HashMap::new(),
                config: Arc::new(EngineConfig::default()),
                registry: Arc::new(ActorRegistry::empty()),
            };
            let core = ActorCore::new(
                "test.FakeResource",
                "Resource {name}",
                &Self::option_specs(),
                &init,
                true,
                None,
            )
            .unwrap();
            Arc::new(FakeResource {
                core,
                remote: Mutex::new(remote),
                set_calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Actor for FakeResource {
        fn core(&self) -> &ActorCore {
            &self.core
        }

        async fn execute(&self) -> Result<(), ActorError> {
            reconcile(self).await
        }
    }

    #[async_trait]
    impl Ensurable for FakeResource {
        fn properties(&self) -> Vec<&'static str> {
            managed_properties(&Self::option_specs(), &["name"])
        }

        async fn get_state(&self) -> Result<ResourceState, ActorError> {
            Ok(match *self.remote.lock().await {
                Some(_) => ResourceState::Present,
                None => ResourceState::Absent,
            })
        }

        async fn set_state(&self, want: ResourceState) -> Result<(), ActorError> {
            self.set_calls.fetch_add(1, Ordering::SeqCst);
            let mut remote = self.remote.lock().await;
            *remote = match want {
                ResourceState::Present => Some(Map::new()),
                ResourceState::Absent => None,
            };
            Ok(())
        }

        async fn get_property(&self, name: &str) -> Result<Value, ActorError> {
            let remote = self.remote.lock().await;
            Ok(remote
                .as_ref()
                .and_then(|m| m.get(name))
                .cloned()
                .unwrap_or(Value::Null))
        }

        async fn set_property(&self, name: &str) -> Result<(), ActorError> {
            self.set_calls.fetch_add(1, Ordering::SeqCst);
            let declared = self.core.option(name).clone();
            let mut remote = self.remote.lock().await;
            if let Some(map) = remote.as_mut() {
                map.insert(name.to_string(), declared);
            }
            Ok(())
        }
    }

    fn matching_remote() -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("owner".to_string(), json!("ops"));
        map.insert("size".to_string(), json!(4));
        map
    }

    #[tokio::test]
    async fn test_matching_state_performs_no_sets() {
        let actor = FakeResource::build(
            json!({
                "actor": "test.FakeResource",
                "options": {"name": "db", "owner": "ops", "size": 4}
            }),
            false,
            Some(matching_remote()),
        );
        reconcile(actor.as_ref()).await.unwrap();
        assert_eq!(actor.set_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_drifted_property_is_set() {
        let actor = FakeResource::build(
            json!({
                "actor": "test.FakeResource",
                "options": {"name": "db", "owner": "newteam", "size": 4}
            }),
            false,
            Some(matching_remote()),
        );
        reconcile(actor.as_ref()).await.unwrap();
        assert_eq!(actor.set_calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            actor.get_property("owner").await.unwrap(),
            json!("newteam")
        );
    }

    #[tokio::test]
    async fn test_absent_resource_is_created_then_filled() {
        let actor = FakeResource::build(
            json!({
                "actor": "test.FakeResource",
                "options": {"name": "db", "owner": "ops", "size": 2}
            }),
            false,
            None,
        );
        reconcile(actor.as_ref()).await.unwrap();
        // One create plus two property sets.
        assert_eq!(actor.set_calls.load(Ordering::SeqCst), 3);
        assert_eq!(actor.get_state().await.unwrap(), ResourceState::Present);
    }

    #[tokio::test]
    async fn test_absent_state_deletes_and_skips_properties() {
        let actor = FakeResource::build(
            json!({
                "actor": "test.FakeResource",
                "options": {"name": "db", "owner": "ops", "state": "absent"}
            }),
            false,
            Some(matching_remote()),
        );
        reconcile(actor.as_ref()).await.unwrap();
        assert_eq!(actor.set_calls.load(Ordering::SeqCst), 1);
        assert_eq!(actor.get_state().await.unwrap(), ResourceState::Absent);
    }

    #[tokio::test]
    async fn test_undefined_sentinel_skips_property() {
        // owner defaults to "undefined": not managed unless supplied.
        let actor = FakeResource::build(
            json!({
                "actor": "test.FakeResource",
                "options": {"name": "db", "size": 4}
            }),
            false,
            Some(matching_remote()),
        );
        reconcile(actor.as_ref()).await.unwrap();
        assert_eq!(actor.set_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_dry_mode_reports_but_never_sets() {
        let actor = FakeResource::build(
            json!({
                "actor": "test.FakeResource",
                "options": {"name": "db", "owner": "newteam", "size": 9}
            }),
            true,
            Some(matching_remote()),
        );
        reconcile(actor.as_ref()).await.unwrap();
        assert_eq!(actor.set_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_managed_properties_excludes_state_and_unmanaged() {
        let props = managed_properties(&FakeResource::option_specs(), &["name"]);
        assert_eq!(props, vec!["owner", "size"]);
    }
}
