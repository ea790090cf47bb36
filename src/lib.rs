pub mod actors;
pub mod config;
pub mod error;
pub mod runner;
pub mod script;
pub mod tokens;
pub mod utils;

pub use crate::actors::ensurable::{
    managed_properties,
    reconcile,
    state_option_spec,
    Ensurable,
    ResourceState,
};
pub use crate::actors::options::{OptionDefault, OptionSpec, OptionType};
pub use crate::actors::registry::{ActorEntry, ActorFactory};
pub use crate::actors::{
    build,
    run,
    Actor,
    ActorCore,
    ActorInit,
    ActorRef,
    ActorRegistry,
    BuildFuture,
    OrgNode,
};
pub use crate::config::EngineConfig;
pub use crate::error::{ActorError, FailureKind, ScriptError};
pub use crate::runner::{RunMode, Runner};
pub use crate::script::ActorSpec;
pub use crate::tokens::TokenStyle;
