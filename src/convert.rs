/*! Conversion between the physical and the output-port formats

Physical to output-port is always well defined: every (node, used output
port) pair of a node that offers service becomes one abstract server,
and links dictate the adjacency between those servers.

Output-port to physical has no canonical inverse. Stations and switches
are synthesized with deterministic names (`src-{flow}`, `sink-{flow}`,
and one switch per physical node recorded on the servers, or per server
otherwise). The result is equivalent for analysis purposes only; only
the first segment of every curve can be expressed.
*/

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::definition::ServerRef;
use crate::description::output_port::{
    ArrivalCurveEntry, FlowEntry, MulticastEntry, NetworkSection, ServerEntry, ServiceCurveEntry,
    WrittenUnits,
};
use crate::description::physical::{
    Link, NodeKind, PhysicalFlow, PhysicalNetwork, PhysicalNode, ServiceAttributes, Target,
    BARE_DATA_UNIT, BARE_RATE_UNIT, BARE_TIME_UNIT, DEFAULT_INPUT_PORT, DEFAULT_OUTPUT_PORT,
    LEAKY_BUCKET,
};
use crate::description::{OutputPortDescription, PhysicalDescription, Technology};
use crate::error::{FlowIssue, ModelError, ModelWarning};
use crate::topology::TopologyGraph;
use crate::unit::{Quantity, UnitKind};

/// A converted description together with what the conversion gave up.
#[derive(Debug)]
pub struct Conversion<T> {
    pub description: T,
    pub warnings: Vec<ModelWarning>,
    /// Flows that could not be expressed in the target format.
    pub rejected_flows: Vec<FlowIssue>,
}

impl<T> Conversion<T> {
    fn new(description: T) -> Self {
        Conversion {
            description,
            warnings: Vec::new(),
            rejected_flows: Vec::new(),
        }
    }

    fn warn(&mut self, warning: ModelWarning) {
        log::warn!("{}", warning);
        self.warnings.push(warning);
    }

    fn reject(&mut self, index: usize, name: &str, error: ModelError) {
        log::warn!("dropping flow {}: {}", name, error);
        self.rejected_flows.push(FlowIssue {
            index,
            name: name.to_string(),
            error,
        });
    }
}

fn physical_units() -> WrittenUnits {
    WrittenUnits {
        time_unit: Some(BARE_TIME_UNIT.to_string()),
        data_unit: Some(BARE_DATA_UNIT.to_string()),
        rate_unit: Some(BARE_RATE_UNIT.to_string()),
    }
}

fn text(value: &str) -> Quantity {
    Quantity::Text(value.to_string())
}

fn string_map(attrs: &[(String, String)]) -> Map<String, Value> {
    attrs
        .iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect()
}

/// The output-port servers of one physical node: (port, server index).
type PortTable = HashMap<String, Vec<(Option<String>, usize)>>;

/// Lower a physical description to the output-port abstraction.
pub fn physical_to_output_port(
    doc: &PhysicalDescription,
) -> Result<Conversion<OutputPortDescription>, ModelError> {
    let mut conv = Conversion::new(OutputPortDescription::default());

    // stations first, then switches; later duplicates are ignored
    let mut nodes: Vec<&PhysicalNode> = Vec::new();
    for kind in [NodeKind::Station, NodeKind::Switch] {
        for node in doc.nodes.iter().filter(|n| n.kind == kind) {
            if nodes.iter().any(|n| n.name == node.name) {
                conv.warn(ModelWarning::DuplicateNode {
                    name: node.name.clone(),
                });
            } else {
                nodes.push(node);
            }
        }
    }

    let mut graph = TopologyGraph::new();
    for node in &nodes {
        graph.add_node(&node.name);
    }
    for link in &doc.links {
        graph.add_turn(&link.from, &link.to)?;
    }

    // servers, in node order then port order of first use
    let mut servers: Vec<ServerEntry> = Vec::new();
    let mut ports = PortTable::new();
    for node in nodes.iter().filter(|n| n.service.service_rate.is_some()) {
        let mut used: Vec<&str> = Vec::new();
        for link in doc.links_from(&node.name) {
            if !used.contains(&link.from_port.as_str()) {
                used.push(&link.from_port);
            }
        }
        let entries = ports.entry(node.name.clone()).or_default();
        if used.is_empty() {
            entries.push((None, servers.len()));
            servers.push(port_server(node, None, &node.service)?);
        }
        for port in used {
            let service = doc
                .links_from(&node.name)
                .find(|l| l.from_port == port)
                .map_or_else(|| node.service.clone(), |l| l.service.over(&node.service));
            entries.push((Some(port.to_string()), servers.len()));
            servers.push(port_server(node, Some(port), &service)?);
        }
    }
    let server_at = |node: &str, port: &str| -> Option<usize> {
        ports
            .get(node)?
            .iter()
            .find(|(p, _)| p.as_deref() == Some(port))
            .map(|(_, i)| *i)
    };

    let n = servers.len();
    let mut adjacency = vec![vec![0u8; n]; n];
    for link in &doc.links {
        if let (Some(from), Some(dest)) =
            (server_at(&link.from, &link.from_port), ports.get(&link.to))
        {
            for (_, to) in dest {
                adjacency[from][*to] = 1;
            }
        }
    }

    let mut flows = Vec::new();
    for (index, flow) in doc.flows.iter().enumerate() {
        match physical_flow(flow, doc, &graph, &server_at, &servers) {
            Ok(entry) => flows.push(entry),
            Err(error) => conv.reject(index, &flow.name, error),
        }
    }

    let net = &doc.network;
    for token in net.technology.unknown_tokens() {
        conv.warn(ModelWarning::UnknownTechnology {
            token: token.clone(),
        });
    }
    conv.description = OutputPortDescription {
        network: NetworkSection {
            name: net.name.clone().unwrap_or_else(|| "Network".to_string()),
            units: physical_units(),
            capacity: net.transmission_capacity.as_deref().map(text),
            max_packet_length: net.max_packet_size.as_deref().map(text),
            min_packet_length: net.min_packet_size.as_deref().map(text),
            multiplexing: Some(net.technology.multiplexing()),
            packetizer: Some(net.technology.packetizer()),
            analysis_option: net.technology.analysis_options(),
            extra: string_map(&net.extra),
            ..NetworkSection::default()
        },
        adjacency_matrix: Some(adjacency),
        flows,
        servers,
    };
    Ok(conv)
}

fn port_server(
    node: &PhysicalNode,
    port: Option<&str>,
    service: &ServiceAttributes,
) -> Result<ServerEntry, ModelError> {
    let latency = service
        .service_latency
        .as_deref()
        .ok_or_else(|| ModelError::MissingAttribute {
            element: node.kind.to_string(),
            name: node.name.clone(),
            attribute: "service-latency".to_string(),
        })?;
    let rate = service.service_rate.as_deref().unwrap_or_default();
    let mut extra = string_map(&node.extra);
    extra.insert("physical_node".to_string(), Value::String(node.name.clone()));
    extra.insert(
        "port".to_string(),
        port.map_or(Value::Null, |p| Value::String(p.to_string())),
    );
    Ok(ServerEntry {
        name: port.map_or_else(|| node.name.clone(), |p| format!("{}-{}", node.name, p)),
        service_curve: Some(ServiceCurveEntry {
            latencies: vec![text(latency)],
            rates: vec![text(rate)],
        }),
        capacity: service.transmission_capacity.as_deref().map(text),
        extra,
        ..ServerEntry::default()
    })
}

fn physical_flow(
    flow: &PhysicalFlow,
    doc: &PhysicalDescription,
    graph: &TopologyGraph,
    server_at: &impl Fn(&str, &str) -> Option<usize>,
    servers: &[ServerEntry],
) -> Result<FlowEntry, ModelError> {
    if flow.arrival_curve != LEAKY_BUCKET {
        return Err(ModelError::UnsupportedArrivalCurve {
            flow: flow.name.clone(),
            curve: flow.arrival_curve.clone(),
        });
    }
    let missing = |attribute: &str| ModelError::MissingAttribute {
        element: "flow".to_string(),
        name: flow.name.clone(),
        attribute: attribute.to_string(),
    };
    let burst = flow.lb_burst.as_deref().ok_or_else(|| missing("lb-burst"))?;
    let rate = flow.lb_rate.as_deref().ok_or_else(|| missing("lb-rate"))?;
    if flow.targets.is_empty() {
        return Err(ModelError::EmptyPath {
            flow: flow.name.clone(),
        });
    }

    let mut paths = Vec::with_capacity(flow.targets.len());
    for target in &flow.targets {
        let mut path = Vec::new();
        let mut prev = flow.source.as_str();
        for (hop, node) in target.path.iter().enumerate() {
            let unresolved = |source| ModelError::UnresolvedPath {
                flow: flow.name.clone(),
                hop,
                source: Box::new(source),
            };
            graph.resolve_turn(prev, node).map_err(unresolved)?;
            let port = doc
                .links_from(prev)
                .find(|l| &l.to == node)
                .map(|l| l.from_port.as_str())
                .unwrap_or(DEFAULT_OUTPUT_PORT);
            if let Some(server) = server_at(prev, port) {
                path.push(ServerRef::Name(servers[server].name.clone()));
            }
            prev = node;
        }
        paths.push((target.name.clone(), path));
    }

    let mut paths = paths.into_iter();
    let (path_name, path) = paths.next().unwrap_or_default();
    Ok(FlowEntry {
        name: flow.name.clone(),
        path,
        path_name: Some(path_name),
        multicast: paths
            .map(|(name, path)| MulticastEntry {
                name: Some(name),
                path,
            })
            .collect(),
        arrival_curve: Some(ArrivalCurveEntry {
            bursts: vec![text(burst)],
            rates: vec![text(rate)],
        }),
        max_packet_length: flow.max_packet_size.as_deref().map(text),
        min_packet_length: flow.min_packet_size.as_deref().map(text),
        extra: string_map(&flow.extra),
        ..FlowEntry::default()
    })
}

/// Render a description quantity so that it keeps its meaning outside
/// of the document whose `units` apply to bare numbers. Bare numbers
/// always get a suffix: a physical document would read them in
/// [BARE_TIME_UNIT], [BARE_DATA_UNIT] and [BARE_RATE_UNIT].
fn written(quantity: &Quantity, units: &WrittenUnits, kind: UnitKind) -> String {
    let bare = match quantity {
        Quantity::Number(x) => Some(*x),
        Quantity::Text(text) => text.trim().parse::<f64>().ok(),
    };
    let unit = units
        .for_kind(kind)
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| kind.base_symbol());
    match bare {
        Some(x) => format!("{}{}", x, unit),
        None => quantity.to_string(),
    }
}

fn json_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Keep the first link between two nodes.
fn add_link(links: &mut Vec<Link>, link: Link, warnings: &mut Vec<ModelWarning>) {
    match links.iter().find(|l| l.from == link.from && l.to == link.to) {
        Some(existing) if existing.from_port != link.from_port => {
            let warning = ModelWarning::LossyConversion {
                entity: format!("link {} -> {}", link.from, link.to),
                detail: format!(
                    "port {} merged into port {}",
                    link.from_port, existing.from_port
                ),
            };
            log::warn!("{}", warning);
            warnings.push(warning);
        }
        Some(_) => (),
        None => links.push(link),
    }
}

/// Where a server is placed in the synthesized physical network.
struct Placement {
    node: String,
    port: String,
    service: ServiceAttributes,
}

/// Synthesize a physical description from an output-port one.
pub fn output_port_to_physical(
    desc: &OutputPortDescription,
) -> Result<Conversion<PhysicalDescription>, ModelError> {
    let mut conv = Conversion::new(PhysicalDescription::default());
    let net = &desc.network;

    let mut placements = Vec::with_capacity(desc.servers.len());
    for server in &desc.servers {
        let units = server.units.within(&net.units);
        let curve = server
            .service_curve
            .as_ref()
            .or(net.service_curve.as_ref())
            .ok_or_else(|| ModelError::MissingCurve {
                owner: format!("server {}", server.name),
                kind: crate::curve::CurveKind::Service,
            })?;
        let (latency, rate) = match (curve.latencies.first(), curve.rates.first()) {
            (Some(l), Some(r)) => (l, r),
            (None, _) => {
                return Err(ModelError::MissingSegmentArray {
                    owner: format!("server {}", server.name),
                    field: "latencies".to_string(),
                })
            }
            (_, None) => {
                return Err(ModelError::MissingSegmentArray {
                    owner: format!("server {}", server.name),
                    field: "rates".to_string(),
                })
            }
        };
        if curve.latencies.len() > 1 || curve.rates.len() > 1 {
            conv.warn(ModelWarning::LossyConversion {
                entity: format!("server {}", server.name),
                detail: "only the first service curve segment is kept".to_string(),
            });
        }
        placements.push(Placement {
            node: server
                .extra
                .get("physical_node")
                .and_then(Value::as_str)
                .unwrap_or(&server.name)
                .to_string(),
            port: server
                .extra
                .get("port")
                .and_then(Value::as_str)
                .unwrap_or(DEFAULT_OUTPUT_PORT)
                .to_string(),
            service: ServiceAttributes {
                service_latency: Some(written(latency, &units, UnitKind::Time)),
                service_rate: Some(written(rate, &units, UnitKind::Rate)),
                transmission_capacity: server
                    .capacity
                    .as_ref()
                    .map(|c| written(c, &units, UnitKind::Rate)),
            },
        });
    }

    let resolve = |r: &ServerRef| match r {
        ServerRef::Index(i) if *i < desc.servers.len() => Some(*i),
        ServerRef::Index(_) => None,
        ServerRef::Name(name) => desc.servers.iter().position(|s| &s.name == name),
    };

    let mut links: Vec<Link> = Vec::new();
    let mut stations = Vec::new();
    let mut flows = Vec::new();
    for (index, flow) in desc.flows.iter().enumerate() {
        let units = flow.units.within(&net.units);
        let owner = format!("flow {}", flow.name);
        let curve = match flow.arrival_curve.as_ref().or(net.arrival_curve.as_ref()) {
            Some(c) => c,
            None => {
                let kind = crate::curve::CurveKind::Arrival;
                conv.reject(index, &flow.name, ModelError::MissingCurve { owner, kind });
                continue;
            }
        };
        let (burst, rate) = match (curve.bursts.first(), curve.rates.first()) {
            (Some(b), Some(r)) => (b, r),
            _ => {
                let field = if curve.bursts.is_empty() { "bursts" } else { "rates" };
                let error = ModelError::MissingSegmentArray {
                    owner,
                    field: field.to_string(),
                };
                conv.reject(index, &flow.name, error);
                continue;
            }
        };
        if curve.bursts.len() > 1 || curve.rates.len() > 1 {
            conv.warn(ModelWarning::LossyConversion {
                entity: owner.clone(),
                detail: "only the first arrival curve segment is kept".to_string(),
            });
        }

        let targets = flow.targets();
        let mut resolved = Vec::with_capacity(targets.len());
        let mut failure = None;
        for target in &targets {
            if target.path.is_empty() {
                failure = Some(ModelError::EmptyPath {
                    flow: flow.name.clone(),
                });
            } else if let Some(r) = target.path.iter().find(|r| resolve(r).is_none()) {
                failure = Some(ModelError::UnknownServer {
                    flow: flow.name.clone(),
                    server: r.to_string(),
                });
            } else {
                let path: Vec<usize> = target.path.iter().filter_map(resolve).collect();
                resolved.push((target.name.clone(), path));
            }
        }
        if let Some(error) = failure {
            conv.reject(index, &flow.name, error);
            continue;
        }

        let source = format!("src-{}", flow.name);
        stations.push(source.clone());
        let mut phy_targets = Vec::with_capacity(resolved.len());
        for (name, path) in &resolved {
            let sink = if resolved.len() == 1 {
                format!("sink-{}", flow.name)
            } else {
                format!("sink-{}-{}", flow.name, name)
            };
            stations.push(sink.clone());
            let (first, last) = (&placements[path[0]], &placements[path[path.len() - 1]]);
            add_link(
                &mut links,
                Link::new(&source, DEFAULT_OUTPUT_PORT, &first.node, DEFAULT_INPUT_PORT),
                &mut conv.warnings,
            );
            add_link(
                &mut links,
                Link::new(&last.node, &last.port, &sink, DEFAULT_INPUT_PORT),
                &mut conv.warnings,
            );
            let mut nodes: Vec<String> = path.iter().map(|s| placements[*s].node.clone()).collect();
            nodes.push(sink);
            phy_targets.push(Target {
                name: name.clone(),
                path: nodes,
            });
        }

        flows.push(PhysicalFlow {
            name: flow.name.clone(),
            source,
            arrival_curve: LEAKY_BUCKET.to_string(),
            lb_burst: Some(written(burst, &units, UnitKind::Data)),
            lb_rate: Some(written(rate, &units, UnitKind::Rate)),
            max_packet_size: flow
                .max_packet_length
                .as_ref()
                .map(|q| written(q, &units, UnitKind::Data)),
            min_packet_size: flow
                .min_packet_length
                .as_ref()
                .map(|q| written(q, &units, UnitKind::Data)),
            targets: phy_targets,
            extra: Vec::new(),
        });
    }

    if let Some(matrix) = &desc.adjacency_matrix {
        crate::validate::adjacency_shape(matrix, desc.servers.len())?;
        for (r, row) in matrix.iter().enumerate() {
            for (c, _) in row.iter().enumerate().filter(|(_, v)| **v != 0) {
                let (from, to) = (&placements[r], &placements[c]);
                add_link(
                    &mut links,
                    Link::new(&from.node, &from.port, &to.node, DEFAULT_INPUT_PORT),
                    &mut conv.warnings,
                );
            }
        }
    }

    // one switch per physical node, carrying the service of its first
    // server; other ports override it on their links
    let mut switches: Vec<PhysicalNode> = Vec::new();
    for p in &placements {
        if !switches.iter().any(|s| s.name == p.node) {
            switches.push(PhysicalNode {
                kind: NodeKind::Switch,
                name: p.node.clone(),
                service: p.service.clone(),
                extra: Vec::new(),
            });
        }
    }
    for link in links.iter_mut() {
        let placed = placements
            .iter()
            .find(|p| p.node == link.from && p.port == link.from_port);
        let base = switches.iter().find(|s| s.name == link.from);
        if let (Some(placed), Some(base)) = (placed, base) {
            if placed.service != base.service {
                link.service = placed.service.clone();
            }
        }
    }

    let technology = Technology::from_options(
        net.packetizer.unwrap_or(false),
        net.multiplexing.unwrap_or_default(),
        &net.analysis_option,
    );
    let doc = &mut conv.description;
    doc.network = PhysicalNetwork {
        name: Some(net.name.clone()),
        technology,
        max_packet_size: net
            .max_packet_length
            .as_ref()
            .map(|q| written(q, &net.units, UnitKind::Data)),
        min_packet_size: net
            .min_packet_length
            .as_ref()
            .map(|q| written(q, &net.units, UnitKind::Data)),
        transmission_capacity: net
            .capacity
            .as_ref()
            .map(|q| written(q, &net.units, UnitKind::Rate)),
        extra: net
            .extra
            .iter()
            .map(|(k, v)| (k.clone(), json_string(v)))
            .collect(),
    };
    doc.nodes = stations
        .into_iter()
        .map(|name| PhysicalNode {
            kind: NodeKind::Station,
            name,
            service: ServiceAttributes::default(),
            extra: Vec::new(),
        })
        .chain(switches)
        .collect();
    doc.links = links;
    doc.flows = flows;
    Ok(conv)
}

#[cfg(test)]
mod tests {
    use assert_approx_eq::assert_approx_eq;

    use super::*;
    use crate::builder::ModelBuilder;
    use crate::config::BuildConfig;
    use crate::tests::{adjacency, DEMO_ADJACENCY, DEMO_JSON, DEMO_SERVERS, DEMO_XML};

    fn demo_output_port() -> Conversion<OutputPortDescription> {
        physical_to_output_port(&PhysicalDescription::from_xml(DEMO_XML).unwrap()).unwrap()
    }

    #[test]
    fn output_ports_become_servers() {
        let conv = demo_output_port();
        let desc = &conv.description;
        let names: Vec<&str> = desc.servers.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, DEMO_SERVERS);
        assert_eq!(desc.adjacency_matrix, Some(adjacency(&DEMO_ADJACENCY)));
        assert_eq!(desc.servers[1].extra["physical_node"], "s1");
        assert_eq!(desc.servers[1].extra["port"], "o0");
        assert!(conv.warnings.is_empty());
        assert!(conv.rejected_flows.is_empty());
    }

    #[test]
    fn link_attributes_override_the_node() {
        let desc = demo_output_port().description;
        let latency = |i: usize| desc.servers[i].service_curve.as_ref().unwrap().latencies[0].clone();
        assert_eq!(latency(1), Quantity::from("4us"));
        assert_eq!(latency(2), Quantity::from("8us"));
        assert_eq!(desc.servers[2].capacity, Some(Quantity::from("1Gbps")));
    }

    #[test]
    fn targets_become_multicast_paths() {
        let desc = demo_output_port().description;
        let f0 = &desc.flows[0];
        assert_eq!(f0.path, vec![ServerRef::from("s0-o0"), ServerRef::from("s1-o0")]);
        assert_eq!(f0.path_name.as_deref(), Some("p0"));
        assert_eq!(f0.multicast.len(), 1);
        assert_eq!(f0.multicast[0].path, vec![ServerRef::from("s0-o0"), ServerRef::from("s1-o1")]);
        assert_eq!(desc.flows[2].path, vec![ServerRef::from("s1-o0")]);
        assert_eq!(desc.flows[2].extra["priority"], "3");

        let net = &desc.network;
        assert_eq!(net.multiplexing, Some(crate::model::Multiplexing::Fifo));
        assert_eq!(net.analysis_option, vec!["IS".to_string()]);
        assert_eq!(net.max_packet_length, Some(Quantity::from("12kb")));
    }

    #[test]
    fn broken_physical_paths_reject_the_flow() {
        let doc = PhysicalDescription::from_xml(
            r#"<elements>
                <network name="n" technology="FIFO+SPQ"/>
                <station name="a"/>
                <switch name="s" service-latency="1us" service-rate="1Gbps"/>
                <station name="b"/>
                <link from="a" to="s"/>
                <link from="s" to="b"/>
                <flow name="ok" source="a" lb-burst="1kb" lb-rate="1Mbps">
                    <target><path node="s"/><path node="b"/></target>
                </flow>
                <flow name="jump" source="a" lb-burst="1kb" lb-rate="1Mbps">
                    <target><path node="b"/></target>
                </flow>
                <flow name="curvy" source="a" arrival-curve="sigma-rho" lb-burst="1kb" lb-rate="1Mbps">
                    <target><path node="s"/></target>
                </flow>
            </elements>"#,
        )
        .unwrap();
        let conv = physical_to_output_port(&doc).unwrap();
        assert_eq!(conv.description.flows.len(), 1);
        assert_eq!(conv.rejected_flows.len(), 2);
        assert!(matches!(
            conv.rejected_flows[0].error,
            ModelError::UnresolvedPath { hop: 0, .. }
        ));
        assert!(matches!(
            conv.rejected_flows[1].error,
            ModelError::UnsupportedArrivalCurve { .. }
        ));
        assert_eq!(
            conv.warnings,
            vec![ModelWarning::UnknownTechnology {
                token: "SPQ".to_string()
            }]
        );
        // servers are named after node and port
        assert_eq!(conv.description.servers[0].name, "s-o0");
    }

    #[test]
    fn duplicate_links_are_fatal() {
        let doc = PhysicalDescription::from_xml(
            r#"<elements>
                <network name="n"/>
                <switch name="a" service-latency="0" service-rate="1"/>
                <switch name="b" service-latency="0" service-rate="1"/>
                <link from="a" to="b" fromPort="o0"/>
                <link from="a" to="b" fromPort="o1"/>
            </elements>"#,
        )
        .unwrap();
        assert!(matches!(
            physical_to_output_port(&doc),
            Err(ModelError::DuplicateTurn { .. })
        ));
    }

    #[test]
    fn unused_nodes_and_duplicates() {
        let doc = PhysicalDescription::from_xml(
            r#"<elements>
                <network name="n"/>
                <switch name="lonely" service-latency="1us" service-rate="1Gbps"/>
                <switch name="lonely" service-latency="9us" service-rate="1Mbps"/>
            </elements>"#,
        )
        .unwrap();
        let conv = physical_to_output_port(&doc).unwrap();
        assert_eq!(conv.description.servers.len(), 1);
        assert_eq!(conv.description.servers[0].name, "lonely");
        assert_eq!(conv.description.servers[0].extra["port"], Value::Null);
        assert!(matches!(conv.warnings[0], ModelWarning::DuplicateNode { .. }));
    }

    #[test]
    fn synthesized_physical_network() {
        let desc = OutputPortDescription::from_json(DEMO_JSON).unwrap();
        let conv = output_port_to_physical(&desc).unwrap();
        let doc = &conv.description;

        let stations: Vec<&str> = doc
            .nodes
            .iter()
            .filter(|n| n.kind == NodeKind::Station)
            .map(|n| n.name.as_str())
            .collect();
        assert_eq!(
            stations,
            vec!["src-f0", "sink-f0-p0", "sink-f0-p1", "src-f1", "sink-f1", "src-f2", "sink-f2"]
        );
        let s0 = doc.node("s0-o0").unwrap();
        assert_eq!(s0.kind, NodeKind::Switch);
        assert_eq!(s0.service.service_latency.as_deref(), Some("2us"));
        assert_eq!(s0.service.service_rate.as_deref(), Some("1000Mbps"));
        assert_eq!(s0.service.transmission_capacity.as_deref(), Some("1000Mbps"));
        assert_eq!(doc.node("s1-o1").unwrap().service.service_latency.as_deref(), Some("8us"));

        assert_eq!(doc.flows[0].targets[1].path, vec!["s0-o0", "s1-o1", "sink-f0-p1"]);
        assert_eq!(doc.flows[0].lb_burst.as_deref(), Some("1kb"));
        assert_eq!(doc.flows[1].lb_burst.as_deref(), Some("2kb"));
        assert_eq!(doc.network.technology.to_string(), "FIFO");

        // the second segment of s1-o1 cannot be expressed
        assert_eq!(conv.warnings.len(), 1);
        assert!(conv.rejected_flows.is_empty());
    }

    #[test]
    fn bare_physical_numbers_use_physical_units() {
        let doc = PhysicalDescription::from_xml(
            r#"<elements>
                <network name="n" maximum-packet-size="1500"/>
                <station name="a"/>
                <switch name="s" service-latency="2" service-rate="1000000"/>
                <station name="b"/>
                <link from="a" to="s"/>
                <link from="s" to="b"/>
                <flow name="f" source="a" lb-burst="100" lb-rate="1000">
                    <target><path node="s"/><path node="b"/></target>
                </flow>
            </elements>"#,
        )
        .unwrap();
        let desc = physical_to_output_port(&doc).unwrap().description;
        assert_eq!(desc.network.units.time_unit.as_deref(), Some("ms"));

        let net = ModelBuilder::from_physical(&doc, BuildConfig::default()).unwrap();
        let service = net.servers()[0].service_curve().first();
        assert_approx_eq!(service.latency, 0.002);
        assert_approx_eq!(service.rate, 1e6);
        let arrival = net.flows()[0].arrival_curve().first();
        assert_approx_eq!(arrival.burst, 800.0);
        assert_approx_eq!(arrival.rate, 1000.0);
        assert_approx_eq!(net.flows()[0].max_packet_length().unwrap(), 12000.0);
    }

    #[test]
    fn synthesized_attributes_carry_units() {
        let desc = OutputPortDescription::from_json(
            r#"{
                "network": {"name": "bare"},
                "servers": [{"name": "s", "service_curve": {"latencies": [0.000002], "rates": ["1e9"]}}],
                "flows": [{"name": "f", "path": ["s"], "arrival_curve": {"bursts": [100], "rates": [1000]}}]
            }"#,
        )
        .unwrap();
        let doc = output_port_to_physical(&desc).unwrap().description;
        let s = doc.node("s").unwrap();
        assert_eq!(s.service.service_latency.as_deref(), Some("0.000002s"));
        assert_eq!(s.service.service_rate.as_deref(), Some("1000000000bps"));
        assert_eq!(doc.flows[0].lb_burst.as_deref(), Some("100b"));

        let net = ModelBuilder::from_physical(&doc, BuildConfig::default()).unwrap();
        assert_approx_eq!(net.servers()[0].service_curve().first().latency, 2e-6);
        assert_approx_eq!(net.flows()[0].arrival_curve().first().burst, 100.0);
    }

    #[test]
    fn reverse_conversion_preserves_behavior() {
        let desc = OutputPortDescription::from_json(DEMO_JSON).unwrap();
        let physical = output_port_to_physical(&desc).unwrap().description;
        let text = physical.to_xml().unwrap();
        let back = physical_to_output_port(&PhysicalDescription::from_xml(&text).unwrap())
            .unwrap()
            .description;
        assert_eq!(back.servers.len(), 3);
        assert_eq!(back.adjacency_matrix, Some(adjacency(&DEMO_ADJACENCY)));
        assert_eq!(back.flows.len(), 3);
        assert_eq!(back.flows[0].multicast.len(), 1);

        let def = back.to_definition().unwrap();
        let s0 = def.servers[0].service_curve.as_ref().unwrap();
        assert_approx_eq!(s0.first[0], 2e-6);
        assert_approx_eq!(s0.rates[0], 1e9);
        assert_approx_eq!(def.flows[0].arrival_curve.as_ref().unwrap().first[0], 1000.0);
    }
}
