/*! Staged construction of a [Network] from a [NetworkDefinition]

A [ModelBuilder] walks through the stages of [BuildStage] in order:

1. [ModelBuilder::load_nodes] declares the servers,
2. [ModelBuilder::load_topology] installs the turns of an explicit
   adjacency matrix (or defers them to the flow paths),
3. [ModelBuilder::load_curves] builds service curves and capacities,
4. [ModelBuilder::load_flows] splits multicast flows and resolves paths,
5. [ModelBuilder::validate] derives shapers and the feed-forward flag,
6. [ModelBuilder::finish] hands out the immutable [Network].

Calling a stage out of order yields [ModelError::StageOrder]; calling
anything after [ModelBuilder::finish] yields [ModelError::ModelFrozen].
A builder that returned an error must not be reused.

The convenience constructors ([ModelBuilder::build],
[ModelBuilder::from_output_port_json], [ModelBuilder::from_physical_xml],
[ModelBuilder::from_path]) run all stages at once.
*/

use std::path::Path;

use derive_more::Display;

use crate::config::BuildConfig;
use crate::convert::{physical_to_output_port, Conversion};
use crate::curve::{derive_shaper, ArrivalCurve, Curve, CurveKind, ServiceCurve};
use crate::definition::{
    FlowDefinition, NetworkDefaults, NetworkDefinition, ServerDefinition, ServerRef, TargetPath,
};
use crate::description::{OutputPortDescription, PhysicalDescription};
use crate::error::{FlowIssue, ModelError, ModelWarning};
use crate::model::{Flow, FlowId, Network, Server, ServerId};
use crate::topology::{TopologyGraph, Turn};
use crate::validate;

/// The progress of a [ModelBuilder].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display)]
pub enum BuildStage {
    #[display(fmt = "EMPTY")]
    Empty,
    #[display(fmt = "NODES_LOADED")]
    NodesLoaded,
    #[display(fmt = "TOPOLOGY_LOADED")]
    TopologyLoaded,
    #[display(fmt = "CURVES_LOADED")]
    CurvesLoaded,
    #[display(fmt = "FLOWS_LOADED")]
    FlowsLoaded,
    #[display(fmt = "VALIDATED")]
    Validated,
    #[display(fmt = "BUILT")]
    Built,
}

/// Builds one [Network]. Every builder owns all of its intermediate
/// state, so independent builds may run concurrently.
#[derive(Debug)]
pub struct ModelBuilder {
    config: BuildConfig,
    stage: BuildStage,
    name: String,
    defaults: NetworkDefaults,
    declared_servers: Vec<ServerDefinition>,
    servers: Vec<Server>,
    graph: TopologyGraph,
    /// Without an adjacency matrix, turns come from the flow paths.
    derive_turns: bool,
    flows: Vec<Flow>,
    declared_flows: usize,
    feed_forward: bool,
    packetizer: bool,
    analysis_options: Vec<String>,
    warnings: Vec<ModelWarning>,
    rejected_flows: Vec<FlowIssue>,
}

impl Default for ModelBuilder {
    fn default() -> Self {
        ModelBuilder::new(BuildConfig::default())
    }
}

impl ModelBuilder {
    pub fn new(config: BuildConfig) -> Self {
        ModelBuilder {
            config,
            stage: BuildStage::Empty,
            name: String::new(),
            defaults: NetworkDefaults::default(),
            declared_servers: Vec::new(),
            servers: Vec::new(),
            graph: TopologyGraph::new(),
            derive_turns: false,
            flows: Vec::new(),
            declared_flows: 0,
            feed_forward: true,
            packetizer: false,
            analysis_options: Vec::new(),
            warnings: Vec::new(),
            rejected_flows: Vec::new(),
        }
    }

    pub fn stage(&self) -> BuildStage {
        self.stage
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    fn expect_stage(&self, expected: BuildStage) -> Result<(), ModelError> {
        if self.stage == BuildStage::Built {
            Err(ModelError::ModelFrozen)
        } else if self.stage != expected {
            Err(ModelError::StageOrder {
                expected,
                found: self.stage,
            })
        } else {
            Ok(())
        }
    }

    fn enter(&mut self, stage: BuildStage) {
        log::debug!("network {}: {} -> {}", self.name, self.stage, stage);
        self.stage = stage;
    }

    /// Record warnings and dropped flows from an earlier step, e.g., the
    /// lowering or conversion of a description. Dropped flows count as
    /// declared flows.
    pub fn absorb(
        &mut self,
        warnings: Vec<ModelWarning>,
        rejected_flows: Vec<FlowIssue>,
    ) -> Result<(), ModelError> {
        if self.stage == BuildStage::Built {
            return Err(ModelError::ModelFrozen);
        }
        self.declared_flows += rejected_flows.len();
        self.warnings.extend(warnings);
        self.rejected_flows.extend(rejected_flows);
        Ok(())
    }

    /// Declare the network and its servers. Server names must be unique.
    pub fn load_nodes(
        &mut self,
        name: &str,
        defaults: NetworkDefaults,
        servers: Vec<ServerDefinition>,
    ) -> Result<(), ModelError> {
        self.expect_stage(BuildStage::Empty)?;
        self.name = name.to_string();
        for server in &servers {
            if self.graph.find_node(&server.name).is_some() {
                return Err(ModelError::MalformedDescription {
                    reason: format!("server {} is declared more than once", server.name),
                });
            }
            self.graph.add_node(&server.name);
        }
        self.defaults = defaults;
        self.declared_servers = servers;
        self.enter(BuildStage::NodesLoaded);
        Ok(())
    }

    /// Install the turns of an explicit adjacency matrix, or, given
    /// `None`, derive them from the flow paths later on.
    pub fn load_topology(&mut self, adjacency: Option<Vec<Vec<u8>>>) -> Result<(), ModelError> {
        self.expect_stage(BuildStage::NodesLoaded)?;
        match adjacency {
            Some(matrix) => {
                validate::adjacency_shape(&matrix, self.declared_servers.len())?;
                for (i, row) in matrix.iter().enumerate() {
                    for (j, _) in row.iter().enumerate().filter(|(_, v)| **v != 0) {
                        let from = &self.declared_servers[i].name;
                        self.graph.add_turn(from, &self.declared_servers[j].name)?;
                    }
                }
            }
            None => self.derive_turns = true,
        }
        self.enter(BuildStage::TopologyLoaded);
        Ok(())
    }

    /// Build the service curve, capacity and multiplexing of every server.
    pub fn load_curves(&mut self) -> Result<(), ModelError> {
        self.expect_stage(BuildStage::TopologyLoaded)?;
        let mut servers = Vec::with_capacity(self.declared_servers.len());
        for (i, def) in self.declared_servers.iter().enumerate() {
            let owner = format!("server {}", def.name);
            let arrays = def
                .service_curve
                .as_ref()
                .or(self.defaults.service_curve.as_ref())
                .ok_or_else(|| ModelError::MissingCurve {
                    owner: owner.clone(),
                    kind: CurveKind::Service,
                })?;
            let service_curve: ServiceCurve = Curve::from_arrays(
                &owner,
                &arrays.first,
                &arrays.rates,
                &self.config,
                &mut self.warnings,
            )?;
            let capacity = def
                .capacity
                .or(self.defaults.capacity)
                .unwrap_or_else(|| service_curve.max_rate());
            let capacity = validate::capacity(&def.name, capacity)?;
            servers.push(Server {
                id: ServerId(i),
                name: def.name.clone(),
                service_curve,
                capacity,
                // replaced once the traversing flows are known
                shaper: derive_shaper(0.0, capacity),
                multiplexing: def.multiplexing.unwrap_or(self.defaults.multiplexing),
            });
        }
        self.servers = servers;
        self.enter(BuildStage::CurvesLoaded);
        Ok(())
    }

    /// Split every flow into one unicast flow per target and resolve the
    /// paths. A flow that cannot be built is dropped and recorded; only
    /// an ambiguous turn aborts the build.
    pub fn load_flows(&mut self, flows: Vec<FlowDefinition>) -> Result<(), ModelError> {
        self.expect_stage(BuildStage::CurvesLoaded)?;
        for (index, def) in flows.iter().enumerate() {
            let shared = match self.flow_attributes(def) {
                Ok(attrs) => attrs,
                Err(error) => {
                    self.declared_flows += 1;
                    self.reject(index, &def.name, error);
                    continue;
                }
            };
            for target in &def.targets {
                self.declared_flows += 1;
                let name = unicast_name(def, target);
                match self.unicast(def, &name, target, &shared) {
                    Ok(flow) => self.flows.push(flow),
                    Err(error @ ModelError::AmbiguousPath { .. }) => return Err(error),
                    Err(error) => self.reject(index, &name, error),
                }
            }
        }
        log::debug!(
            "network {}: {} unicast flows, {} dropped",
            self.name,
            self.flows.len(),
            self.rejected_flows.len()
        );
        self.enter(BuildStage::FlowsLoaded);
        Ok(())
    }

    fn reject(&mut self, index: usize, name: &str, error: ModelError) {
        log::warn!("dropping flow {}: {}", name, error);
        self.rejected_flows.push(FlowIssue {
            index,
            name: name.to_string(),
            error,
        });
    }

    /// Everything the unicast flows of `def` share.
    fn flow_attributes(&mut self, def: &FlowDefinition) -> Result<FlowShared, ModelError> {
        let owner = format!("flow {}", def.name);
        if def.targets.is_empty() {
            return Err(ModelError::EmptyPath {
                flow: def.name.clone(),
            });
        }
        let arrays = def
            .arrival_curve
            .as_ref()
            .or(self.defaults.arrival_curve.as_ref())
            .ok_or_else(|| ModelError::MissingCurve {
                owner: owner.clone(),
                kind: CurveKind::Arrival,
            })?;
        let arrival_curve: ArrivalCurve = Curve::from_arrays(
            &owner,
            &arrays.first,
            &arrays.rates,
            &self.config,
            &mut self.warnings,
        )?;
        // undeclared packet lengths fall back to the extreme bursts
        let bursts = || arrival_curve.segments().iter().map(|s| s.burst);
        let max_packet_length = validate::packet_length(
            &def.name,
            "maximum",
            def.max_packet_length
                .or(self.defaults.max_packet_length)
                .or_else(|| bursts().reduce(f64::max)),
        )?;
        let min_packet_length = validate::packet_length(
            &def.name,
            "minimum",
            def.min_packet_length
                .or(self.defaults.min_packet_length)
                .or_else(|| bursts().reduce(f64::min)),
        )?;
        Ok(FlowShared {
            arrival_curve,
            max_packet_length,
            min_packet_length,
        })
    }

    fn unicast(
        &mut self,
        def: &FlowDefinition,
        name: &str,
        target: &TargetPath,
        shared: &FlowShared,
    ) -> Result<Flow, ModelError> {
        let path = target
            .path
            .iter()
            .enumerate()
            .map(|(hop, server)| {
                self.server_index(server).ok_or_else(|| ModelError::UnresolvedPath {
                    flow: name.to_string(),
                    hop,
                    source: Box::new(ModelError::UnknownServer {
                        flow: name.to_string(),
                        server: server.to_string(),
                    }),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        validate::path_shape(name, &path, self.graph.node_names())?;

        // a single-hop flow needs no turn
        let mut turns = Vec::with_capacity(path.len() - 1);
        for (hop, pair) in path.windows(2).enumerate() {
            turns.push(self.turn(name, hop + 1, pair[0], pair[1])?);
        }

        Ok(Flow {
            id: FlowId(self.flows.len()),
            name: name.to_string(),
            arrival_curve: shared.arrival_curve.clone(),
            path: path.into_iter().map(ServerId).collect(),
            turns,
            max_packet_length: shared.max_packet_length,
            min_packet_length: shared.min_packet_length,
            derived_from: def.is_multicast().then(|| def.name.clone()),
            path_name: target.name.clone(),
        })
    }

    fn server_index(&self, server: &ServerRef) -> Option<usize> {
        match server {
            ServerRef::Index(i) if *i < self.servers.len() => Some(*i),
            ServerRef::Index(_) => None,
            ServerRef::Name(name) => self.graph.find_node(name).map(|n| n.0),
        }
    }

    fn turn(&mut self, flow: &str, hop: usize, from: usize, to: usize) -> Result<Turn, ModelError> {
        let (from, to) = (self.servers[from].name.clone(), self.servers[to].name.clone());
        let turn = if self.derive_turns {
            self.graph.ensure_turn(&from, &to)
        } else {
            self.graph.resolve_turn(&from, &to)
        };
        turn.map_err(|error| match error {
            ModelError::AmbiguousPath { .. } => error,
            source => ModelError::UnresolvedPath {
                flow: flow.to_string(),
                hop,
                source: Box::new(source),
            },
        })
    }

    /// Derive the shapers and the feed-forward flag, and check that
    /// enough flows survived.
    pub fn validate(&mut self) -> Result<(), ModelError> {
        self.expect_stage(BuildStage::FlowsLoaded)?;
        for server in self.servers.iter_mut() {
            let burst = self
                .flows
                .iter()
                .filter(|f| f.traverses(server.id))
                .filter_map(|f| f.max_packet_length)
                .fold(0.0, f64::max);
            server.shaper = derive_shaper(burst, server.capacity);
        }
        self.feed_forward = !self.graph.has_cycle();
        if !self.feed_forward {
            log::info!("network {} has cyclic dependencies", self.name);
        }
        validate::surviving_flows(&self.config, self.declared_flows, self.flows.len())?;
        self.enter(BuildStage::Validated);
        Ok(())
    }

    /// Hand out the finished model. The builder is frozen afterwards.
    pub fn finish(&mut self) -> Result<Network, ModelError> {
        self.expect_stage(BuildStage::Validated)?;
        self.enter(BuildStage::Built);
        let network = Network {
            name: std::mem::take(&mut self.name),
            servers: std::mem::take(&mut self.servers),
            flows: std::mem::take(&mut self.flows),
            graph: std::mem::take(&mut self.graph),
            feed_forward: self.feed_forward,
            packetizer: self.packetizer,
            analysis_options: std::mem::take(&mut self.analysis_options),
            warnings: std::mem::take(&mut self.warnings),
            rejected_flows: std::mem::take(&mut self.rejected_flows),
        };
        log::info!(
            "built network {}: {} servers, {} flows ({} dropped, {} warnings)",
            network.name,
            network.servers.len(),
            network.flows.len(),
            network.rejected_flows.len(),
            network.warnings.len()
        );
        Ok(network)
    }

    /// Run all stages on `def`.
    pub fn build(mut self, def: NetworkDefinition) -> Result<Network, ModelError> {
        self.absorb(Vec::new(), def.rejected_flows)?;
        self.packetizer = def.packetizer;
        self.analysis_options = def.analysis_options;
        self.load_nodes(&def.name, def.defaults, def.servers)?;
        self.load_topology(def.adjacency)?;
        self.load_curves()?;
        self.load_flows(def.flows)?;
        self.validate()?;
        self.finish()
    }

    pub fn from_output_port(
        desc: &OutputPortDescription,
        config: BuildConfig,
    ) -> Result<Network, ModelError> {
        ModelBuilder::new(config).build(desc.to_definition()?)
    }

    pub fn from_output_port_json(text: &str, config: BuildConfig) -> Result<Network, ModelError> {
        ModelBuilder::from_output_port(&OutputPortDescription::from_json(text)?, config)
    }

    pub fn from_physical(
        doc: &PhysicalDescription,
        config: BuildConfig,
    ) -> Result<Network, ModelError> {
        let Conversion {
            description,
            warnings,
            rejected_flows,
        } = physical_to_output_port(doc)?;
        let mut builder = ModelBuilder::new(config);
        builder.absorb(warnings, rejected_flows)?;
        builder.build(description.to_definition()?)
    }

    pub fn from_physical_xml(text: &str, config: BuildConfig) -> Result<Network, ModelError> {
        ModelBuilder::from_physical(&PhysicalDescription::from_xml(text)?, config)
    }

    /// Read a description file, telling the format by its extension.
    pub fn from_path(path: impl AsRef<Path>, config: BuildConfig) -> Result<Network, ModelError> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        let read = || {
            std::fs::read_to_string(path).map_err(|source| ModelError::Io {
                path: path.to_path_buf(),
                source,
            })
        };
        match extension.as_deref() {
            Some("json") => ModelBuilder::from_output_port_json(&read()?, config),
            Some("xml") => ModelBuilder::from_physical_xml(&read()?, config),
            _ => Err(ModelError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }
}

/// Attributes shared by the unicast flows of one declared flow.
struct FlowShared {
    arrival_curve: ArrivalCurve,
    max_packet_length: Option<f64>,
    min_packet_length: Option<f64>,
}

/// Unicast flows split from a multicast flow are named after the flow
/// and the target path.
fn unicast_name(def: &FlowDefinition, target: &TargetPath) -> String {
    if def.is_multicast() {
        format!("{}_{}", def.name, target.name)
    } else {
        def.name.clone()
    }
}
