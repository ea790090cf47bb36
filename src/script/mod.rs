//! Script documents: loading, token substitution, and schema validation.

pub mod loader;
pub mod schema;

pub use loader::{load_raw, load_script};
pub use schema::ActorSpec;
