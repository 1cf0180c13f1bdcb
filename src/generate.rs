/*! Synthetic benchmark networks

All generators produce an [OutputPortDescription] in canonical units in
which every server and every flow share the same parameters. Feed the
result to [ModelBuilder::from_output_port][crate::builder::ModelBuilder::from_output_port]
to obtain a model.
*/

use itertools::Itertools;

use crate::definition::ServerRef;
use crate::description::output_port::{
    ArrivalCurveEntry, FlowEntry, NetworkSection, ServerEntry, ServiceCurveEntry, WrittenUnits,
};
use crate::description::OutputPortDescription;
use crate::model::Multiplexing;
use crate::unit::Quantity;

/// The parameters shared by all flows and servers of a generated network.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeneratorParams {
    /// Flow burst in bits.
    pub burst: f64,
    /// Flow arrival rate in bits per second.
    pub arrival_rate: f64,
    /// Flow packet length in bits.
    pub packet_length: f64,
    /// Service latency in seconds.
    pub latency: f64,
    /// Service rate in bits per second.
    pub service_rate: f64,
    /// Output capacity in bits per second.
    pub capacity: f64,
}

impl Default for GeneratorParams {
    fn default() -> Self {
        GeneratorParams {
            burst: 1e3,
            arrival_rate: 1e6,
            packet_length: 1e3,
            latency: 1e-5,
            service_rate: 1e8,
            capacity: 1e8,
        }
    }
}

impl GeneratorParams {
    fn server(&self, index: usize, service_rate: f64) -> ServerEntry {
        ServerEntry {
            name: format!("s_{}", index),
            service_curve: Some(ServiceCurveEntry {
                latencies: vec![Quantity::Number(self.latency)],
                rates: vec![Quantity::Number(service_rate)],
            }),
            capacity: Some(Quantity::Number(self.capacity)),
            ..ServerEntry::default()
        }
    }

    fn flow(&self, index: usize, path: impl IntoIterator<Item = usize>) -> FlowEntry {
        FlowEntry {
            name: format!("fl_{}", index),
            path: path.into_iter().map(ServerRef::Index).collect(),
            arrival_curve: Some(ArrivalCurveEntry {
                bursts: vec![Quantity::Number(self.burst)],
                rates: vec![Quantity::Number(self.arrival_rate)],
            }),
            max_packet_length: Some(Quantity::Number(self.packet_length)),
            ..FlowEntry::default()
        }
    }
}

fn description(
    name: String,
    adjacency: Vec<Vec<u8>>,
    servers: Vec<ServerEntry>,
    flows: Vec<FlowEntry>,
) -> OutputPortDescription {
    OutputPortDescription {
        network: NetworkSection {
            name,
            units: WrittenUnits::canonical(),
            multiplexing: Some(Multiplexing::Fifo),
            ..NetworkSection::default()
        },
        adjacency_matrix: Some(adjacency),
        flows,
        servers,
    }
}

/// `size` servers in a chain. Flow 0 crosses the whole chain; flow `i`
/// crosses servers `i - 1` and `i`.
pub fn interleaved_tandem(size: usize, params: &GeneratorParams) -> OutputPortDescription {
    let mut adjacency = vec![vec![0; size]; size];
    for i in 1..size {
        adjacency[i - 1][i] = 1;
    }
    let servers = (0..size)
        .map(|i| params.server(i, params.service_rate))
        .collect();
    let flows = (0..size)
        .map(|i| match i {
            0 => params.flow(0, 0..size),
            i => params.flow(i, [i - 1, i]),
        })
        .collect();
    description(format!("interleave-{}", size), adjacency, servers, flows)
}

/// `size` servers in a cycle. Flow `i` starts at server `i` and crosses
/// every server once.
pub fn ring(size: usize, params: &GeneratorParams) -> OutputPortDescription {
    let mut adjacency = vec![vec![0; size]; size];
    if size > 1 {
        for i in 0..size {
            adjacency[i][(i + 1) % size] = 1;
        }
    }
    let servers = (0..size)
        .map(|i| params.server(i, params.service_rate))
        .collect();
    let flows = (0..size)
        .map(|i| params.flow(i, (0..size).map(|hop| (i + hop) % size)))
        .collect();
    description(format!("ring-{}", size), adjacency, servers, flows)
}

/// Pairs of servers where both servers of one level feed both servers
/// of the next; both servers of the last level feed a single sink
/// server. An even `size` is rounded up to the next odd one.
///
/// There is one flow per choice of upper or lower server at every
/// level, all ending at the sink, whose service rate is doubled.
pub fn mesh(size: usize, params: &GeneratorParams) -> OutputPortDescription {
    let size = if size % 2 == 0 { size + 1 } else { size };
    let levels = size / 2;
    let sink = size - 1;

    let mut adjacency = vec![vec![0; size]; size];
    if size > 1 {
        for level in 0..levels - 1 {
            let (here, next) = (2 * level..2 * level + 2, 2 * level + 2..2 * level + 4);
            for (from, to) in here.cartesian_product(next) {
                adjacency[from][to] = 1;
            }
        }
        adjacency[sink - 2][sink] = 1;
        adjacency[sink - 1][sink] = 1;
    }

    let servers = (0..size)
        .map(|i| match i {
            i if i == sink => params.server(i, 2.0 * params.service_rate),
            i => params.server(i, params.service_rate),
        })
        .collect();
    // bit `level` of the flow index (most significant first) selects the
    // lower server of that level
    let flows = (0..1usize << levels)
        .map(|index| {
            let path = (0..levels)
                .map(|level| 2 * level + ((index >> (levels - 1 - level)) & 1))
                .chain(std::iter::once(sink));
            params.flow(index, path)
        })
        .collect();
    description(format!("mesh-{}", size), adjacency, servers, flows)
}
