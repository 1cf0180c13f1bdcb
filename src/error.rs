/*! Error kinds raised while building a network model

Node- and topology-level errors abort the whole build; no partial model
is handed to the caller. Flow-level errors only drop the offending flow:
they are collected as [FlowIssue]s on the finished model. Non-fatal
policy decisions (e.g., truncating mismatched segment arrays) are
recorded as [ModelWarning]s.
*/

use std::path::PathBuf;

use derive_more::Display;
use thiserror::Error;

use crate::builder::BuildStage;
use crate::curve::CurveKind;
use crate::unit::UnitError;

/// Error type returned when a description cannot be turned into a model.
#[derive(Debug, Error)]
pub enum ModelError {
    /// A magnitude/unit token could not be interpreted.
    #[error("cannot parse {field} of {owner}: {source}")]
    UnitParse {
        owner: String,
        field: String,
        #[source]
        source: UnitError,
    },

    /// No usable segment is left to build a curve from.
    #[error("the {kind} curve of {owner} has no segment")]
    CurveDefinition { owner: String, kind: CurveKind },

    /// Neither the entity nor the network defaults define a curve.
    #[error("no {kind} curve is defined for {owner}")]
    MissingCurve { owner: String, kind: CurveKind },

    /// One of the two parallel arrays of a curve is missing or empty.
    #[error("{owner} defines no {field}")]
    MissingSegmentArray { owner: String, field: String },

    /// Parallel arrays of unequal length (only raised in strict mode).
    #[error("{owner} defines {first_len} {first_field} but {rates_len} rates")]
    SegmentLengthMismatch {
        owner: String,
        first_field: String,
        first_len: usize,
        rates_len: usize,
    },

    /// The adjacency matrix does not match the declared servers.
    #[error(
        "the adjacency matrix describes {adjacency} servers but {declared} servers are declared"
    )]
    NodeCountMismatch { declared: usize, adjacency: usize },

    /// A row of the adjacency matrix has the wrong length.
    #[error("row {row} of the adjacency matrix has {len} entries, expected {expected}")]
    MalformedAdjacency {
        row: usize,
        len: usize,
        expected: usize,
    },

    /// A second turn between an ordered pair of nodes was requested.
    #[error("the turn {from} -> {to} is defined more than once")]
    DuplicateTurn { from: String, to: String },

    /// More than one turn object exists between an ordered pair of nodes.
    #[error("{count} distinct turns lead from {from} to {to}")]
    AmbiguousPath {
        from: String,
        to: String,
        count: usize,
    },

    #[error("there is no turn from {from} to {to}")]
    NoSuchTurn { from: String, to: String },

    #[error("unknown node \"{name}\"")]
    UnknownNode { name: String },

    #[error("flow {flow} refers to undefined server {server}")]
    UnknownServer { flow: String, server: String },

    /// A flow path could not be resolved; the flow is dropped.
    #[error("the path of flow {flow} cannot be resolved at hop {hop}: {source}")]
    UnresolvedPath {
        flow: String,
        hop: usize,
        #[source]
        source: Box<ModelError>,
    },

    #[error("flow {flow} has an empty path")]
    EmptyPath { flow: String },

    #[error("flow {flow} traverses server {server} more than once")]
    RepeatedServer { flow: String, server: String },

    #[error("capacity of server {server} must be positive, found {capacity}")]
    InvalidCapacity { server: String, capacity: f64 },

    #[error("{which} packet length of flow {flow} must not be negative, found {length}")]
    InvalidPacketLength {
        flow: String,
        which: &'static str,
        length: f64,
    },

    #[error("flow {flow} uses the {curve} arrival curve; only leaky-bucket is supported")]
    UnsupportedArrivalCurve { flow: String, curve: String },

    #[error("<{element}> {name} lacks the required attribute \"{attribute}\"")]
    MissingAttribute {
        element: String,
        name: String,
        attribute: String,
    },

    #[error("malformed description: {reason}")]
    MalformedDescription { reason: String },

    /// Programmer error: the model was already handed out.
    #[error("the model is frozen and cannot be modified")]
    ModelFrozen,

    #[error("build step requires stage {expected}, but the builder is at stage {found}")]
    StageOrder {
        expected: BuildStage,
        found: BuildStage,
    },

    #[error("all {declared} declared flows were dropped")]
    NoSurvivingFlows { declared: usize },

    #[error("cannot tell the format of {path:?}; expected a .json or .xml file")]
    UnsupportedFormat { path: PathBuf },

    #[error("cannot read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid output-port description: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid physical description: {0}")]
    Xml(#[from] quick_xml::Error),
}

impl ModelError {
    /// Attach the owning entity and field to a unit parsing failure.
    pub(crate) fn unit(owner: &str, field: &str, source: UnitError) -> Self {
        ModelError::UnitParse {
            owner: owner.to_string(),
            field: field.to_string(),
            source,
        }
    }

    /// Whether the error only concerns a single flow (which is then
    /// dropped) rather than the whole model.
    pub fn is_flow_level(&self) -> bool {
        matches!(
            self,
            ModelError::UnresolvedPath { .. }
                | ModelError::EmptyPath { .. }
                | ModelError::RepeatedServer { .. }
                | ModelError::InvalidPacketLength { .. }
        )
    }
}

/// A flow that was dropped during construction, and why.
#[derive(Debug, Error)]
#[error("flow #{index} ({name}) dropped: {error}")]
pub struct FlowIssue {
    /// Position of the flow in the description.
    pub index: usize,
    pub name: String,
    pub error: ModelError,
}

/// A non-fatal policy decision taken while building or converting a model.
#[derive(Debug, Clone, PartialEq, Display)]
pub enum ModelWarning {
    #[display(
        fmt = "{}: {} {} vs. {} rates, kept the first {}",
        owner,
        first_len,
        first_field,
        rates_len,
        kept
    )]
    TruncatedSegments {
        owner: String,
        first_field: String,
        first_len: usize,
        rates_len: usize,
        kept: usize,
    },
    #[display(fmt = "node {} is defined more than once, kept the first definition", name)]
    DuplicateNode { name: String },
    #[display(fmt = "unknown technology token {}", token)]
    UnknownTechnology { token: String },
    #[display(fmt = "{}: {}", entity, detail)]
    LossyConversion { entity: String, detail: String },
}
