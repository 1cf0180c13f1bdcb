/*! Typed, unit-normalized entity definitions

Both description formats are first lowered to a [NetworkDefinition]: every
quantity is already in canonical units (seconds, bits, bits per second)
and every optional field is explicit. The
[ModelBuilder][crate::builder::ModelBuilder] consumes definitions only,
so a generated network and a parsed one follow the same construction path.
*/

use serde::{Deserialize, Serialize};

use crate::error::FlowIssue;
use crate::model::Multiplexing;

/// The two parallel arrays describing a curve, in canonical units.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CurveArrays {
    /// Latencies (service curves) or bursts (arrival curves).
    pub first: Vec<f64>,
    pub rates: Vec<f64>,
}

impl CurveArrays {
    pub fn new(first: Vec<f64>, rates: Vec<f64>) -> Self {
        CurveArrays { first, rates }
    }

    pub fn single(first: f64, rate: f64) -> Self {
        CurveArrays::new(vec![first], vec![rate])
    }
}

/// Network-wide values that apply where an entity leaves a field out.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NetworkDefaults {
    pub service_curve: Option<CurveArrays>,
    pub arrival_curve: Option<CurveArrays>,
    pub capacity: Option<f64>,
    pub max_packet_length: Option<f64>,
    pub min_packet_length: Option<f64>,
    pub multiplexing: Multiplexing,
}

/// A reference to a server from a flow path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerRef {
    Index(usize),
    Name(String),
}

impl std::fmt::Display for ServerRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerRef::Index(i) => write!(f, "#{}", i),
            ServerRef::Name(n) => f.write_str(n),
        }
    }
}

impl From<usize> for ServerRef {
    fn from(i: usize) -> Self {
        ServerRef::Index(i)
    }
}

impl From<&str> for ServerRef {
    fn from(n: &str) -> Self {
        ServerRef::Name(n.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerDefinition {
    pub name: String,
    pub service_curve: Option<CurveArrays>,
    pub capacity: Option<f64>,
    pub multiplexing: Option<Multiplexing>,
}

/// One named path of a (possibly multicast) flow.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetPath {
    pub name: String,
    pub path: Vec<ServerRef>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlowDefinition {
    pub name: String,
    pub arrival_curve: Option<CurveArrays>,
    /// One entry per destination, in declaration order.
    pub targets: Vec<TargetPath>,
    pub max_packet_length: Option<f64>,
    pub min_packet_length: Option<f64>,
}

impl FlowDefinition {
    pub fn is_multicast(&self) -> bool {
        self.targets.len() > 1
    }
}

#[derive(Debug, Default)]
pub struct NetworkDefinition {
    pub name: String,
    pub defaults: NetworkDefaults,
    pub servers: Vec<ServerDefinition>,
    /// `None` if turns are to be derived from the flow paths.
    pub adjacency: Option<Vec<Vec<u8>>>,
    pub flows: Vec<FlowDefinition>,
    /// Flows that could not even be lowered (e.g., a malformed unit).
    pub rejected_flows: Vec<FlowIssue>,
    pub packetizer: bool,
    pub analysis_options: Vec<String>,
}
