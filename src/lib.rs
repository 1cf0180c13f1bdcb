/*! Network-calculus models of time-sensitive networks

Descriptions in the physical (XML) or output-port (JSON) format are
lowered to a [definition::NetworkDefinition] and built into an immutable
[model::Network] by a [builder::ModelBuilder]. Analysis engines consume
the result through [model::NetworkView].
*/

pub mod unit;
pub mod curve;
pub mod topology;
pub mod model;
pub mod definition;
pub mod description;
pub mod convert;
pub mod validate;
pub mod builder;
pub mod generate;
pub mod engine;
pub mod config;
pub mod error;

pub use builder::{BuildStage, ModelBuilder};
pub use config::BuildConfig;
pub use error::{FlowIssue, ModelError, ModelWarning};
pub use model::{Flow, FlowId, Network, NetworkView, Server, ServerId};
