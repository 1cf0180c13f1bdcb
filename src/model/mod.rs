/*! The canonical network model handed to analysis engines

A [Network] is produced by the [ModelBuilder][crate::builder::ModelBuilder]
and is immutable afterwards: all fields are private and only exposed
through accessors.
*/

use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::curve::{ArrivalCurve, Segment, ServiceCurve};
use crate::engine::AnalysisEngine;
use crate::error::{FlowIssue, ModelWarning};
use crate::topology::{TopologyGraph, Turn};

/// Index of a server; equal to its row in the adjacency matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
#[display(fmt = "#{}", _0)]
pub struct ServerId(pub usize);

/// Index of a (unicast) flow in the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
#[display(fmt = "#{}", _0)]
pub struct FlowId(pub usize);

/// How a server serves the packets of different flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display)]
#[serde(rename_all = "UPPERCASE")]
pub enum Multiplexing {
    #[display(fmt = "FIFO")]
    Fifo,
    #[display(fmt = "ARBITRARY")]
    Arbitrary,
    /// Left to the engine configuration.
    #[default]
    #[display(fmt = "UNSET")]
    Unset,
}

/// An output port, i.e., a server in the network-calculus sense.
#[derive(Debug, Clone, PartialEq)]
pub struct Server {
    pub(crate) id: ServerId,
    pub(crate) name: String,
    pub(crate) service_curve: ServiceCurve,
    pub(crate) capacity: f64,
    pub(crate) shaper: ArrivalCurve,
    pub(crate) multiplexing: Multiplexing,
}

impl Server {
    pub fn id(&self) -> ServerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn service_curve(&self) -> &ServiceCurve {
        &self.service_curve
    }

    /// Output capacity in bits per second.
    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    /// The maximum-service curve derived from the capacity and the
    /// largest packet crossing the server.
    pub fn shaper(&self) -> &ArrivalCurve {
        &self.shaper
    }

    pub fn multiplexing(&self) -> Multiplexing {
        self.multiplexing
    }
}

/// A unicast flow following a fixed path of servers.
#[derive(Debug, Clone, PartialEq)]
pub struct Flow {
    pub(crate) id: FlowId,
    pub(crate) name: String,
    pub(crate) arrival_curve: ArrivalCurve,
    pub(crate) path: Vec<ServerId>,
    pub(crate) turns: Vec<Turn>,
    pub(crate) max_packet_length: Option<f64>,
    pub(crate) min_packet_length: Option<f64>,
    pub(crate) derived_from: Option<String>,
    pub(crate) path_name: String,
}

impl Flow {
    pub fn id(&self) -> FlowId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arrival_curve(&self) -> &ArrivalCurve {
        &self.arrival_curve
    }

    pub fn path(&self) -> &[ServerId] {
        &self.path
    }

    /// The turns between consecutive servers of the path; empty for
    /// single-hop flows.
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn is_single_hop(&self) -> bool {
        self.path.len() == 1
    }

    pub fn first_server(&self) -> ServerId {
        // paths are non-empty by construction
        self.path[0]
    }

    pub fn traverses(&self, server: ServerId) -> bool {
        self.path.contains(&server)
    }

    pub fn max_packet_length(&self) -> Option<f64> {
        self.max_packet_length
    }

    pub fn min_packet_length(&self) -> Option<f64> {
        self.min_packet_length
    }

    /// Name of the multicast flow this unicast flow was split from.
    pub fn derived_from(&self) -> Option<&str> {
        self.derived_from.as_deref()
    }

    /// Name of the target path of the source flow that this flow follows.
    pub fn path_name(&self) -> &str {
        &self.path_name
    }
}

/// The read-only accessors that engine adapters consume.
#[auto_impl::auto_impl(&, Box, Rc)]
pub trait NetworkView {
    fn servers(&self) -> &[Server];

    fn flows(&self) -> &[Flow];

    fn adjacency(&self) -> Vec<Vec<u8>>;
}

/// A fully built network model.
#[derive(Debug)]
pub struct Network {
    pub(crate) name: String,
    pub(crate) servers: Vec<Server>,
    pub(crate) flows: Vec<Flow>,
    pub(crate) graph: TopologyGraph,
    pub(crate) feed_forward: bool,
    pub(crate) packetizer: bool,
    pub(crate) analysis_options: Vec<String>,
    pub(crate) warnings: Vec<ModelWarning>,
    pub(crate) rejected_flows: Vec<FlowIssue>,
}

impl Network {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn servers(&self) -> &[Server] {
        &self.servers
    }

    pub fn flows(&self) -> &[Flow] {
        &self.flows
    }

    /// See [TopologyGraph::adjacency_matrix].
    pub fn adjacency(&self) -> Vec<Vec<u8>> {
        self.graph.adjacency_matrix()
    }

    pub fn server(&self, id: ServerId) -> Option<&Server> {
        self.servers.get(id.0)
    }

    pub fn flow(&self, id: FlowId) -> Option<&Flow> {
        self.flows.get(id.0)
    }

    pub fn server_by_name(&self, name: &str) -> Option<&Server> {
        self.servers.iter().find(|s| s.name == name)
    }

    pub fn flow_by_name(&self, name: &str) -> Option<&Flow> {
        self.flows.iter().find(|f| f.name == name)
    }

    /// All flows whose path includes `server`.
    pub fn flows_through(&self, server: ServerId) -> impl Iterator<Item = &Flow> + '_ {
        self.flows.iter().filter(move |f| f.traverses(server))
    }

    pub fn graph(&self) -> &TopologyGraph {
        &self.graph
    }

    /// Whether the server graph is free of directed cycles, as required
    /// by feed-forward-only engines.
    pub fn is_feed_forward(&self) -> bool {
        self.feed_forward
    }

    pub fn packetizer(&self) -> bool {
        self.packetizer
    }

    pub fn analysis_options(&self) -> &[String] {
        &self.analysis_options
    }

    pub fn warnings(&self) -> &[ModelWarning] {
        &self.warnings
    }

    /// Flows that were dropped during construction.
    pub fn rejected_flows(&self) -> &[FlowIssue] {
        &self.rejected_flows
    }

    /// Per server, the long-term arrival rate of all traversing flows
    /// relative to the service rate (both taken from the first segment).
    pub fn utilization(&self) -> Vec<f64> {
        self.servers
            .iter()
            .map(|s| {
                let load: f64 = self
                    .flows_through(s.id)
                    .map(|f| f.arrival_curve.first().rate())
                    .sum();
                load / s.service_curve.first().rate()
            })
            .collect()
    }

    /// Whether `engine` can analyze this network at all.
    pub fn supports(&self, engine: impl AnalysisEngine) -> bool {
        self.feed_forward || !engine.requires_feed_forward()
    }
}

impl NetworkView for Network {
    fn servers(&self) -> &[Server] {
        Network::servers(self)
    }

    fn flows(&self) -> &[Flow] {
        Network::flows(self)
    }

    fn adjacency(&self) -> Vec<Vec<u8>> {
        Network::adjacency(self)
    }
}

#[cfg(test)]
mod tests;
