/*! The JSON output-port description format

```json
{
    "network": {"name": "demo", "time_unit": "us", "capacity": "1Gbps"},
    "servers": [{"name": "s0-o0", "service_curve": {"latencies": [2], "rates": ["1Gbps"]}}],
    "flows": [{"name": "f0", "path": ["s0-o0"], "arrival_curve": {"bursts": ["1kb"], "rates": ["10Mbps"]}}],
    "adjacency_matrix": [[0]]
}
```
*/

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::definition::{
    CurveArrays, FlowDefinition, NetworkDefaults, NetworkDefinition, ServerDefinition, ServerRef,
    TargetPath,
};
use crate::error::{FlowIssue, ModelError};
use crate::model::{Multiplexing, Network};
use crate::unit::{Quantity, UnitKind, UnitValue};

/// Units in which the bare numbers of an entity are written.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WrittenUnits {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_unit: Option<String>,
}

impl WrittenUnits {
    /// The units a JSON document produced by this crate declares.
    pub fn canonical() -> Self {
        WrittenUnits {
            time_unit: Some(UnitKind::Time.base_symbol().to_string()),
            data_unit: Some(UnitKind::Data.base_symbol().to_string()),
            rate_unit: Some(UnitKind::Rate.base_symbol().to_string()),
        }
    }

    pub fn for_kind(&self, kind: UnitKind) -> Option<&str> {
        match kind {
            UnitKind::Time => self.time_unit.as_deref(),
            UnitKind::Data => self.data_unit.as_deref(),
            UnitKind::Rate => self.rate_unit.as_deref(),
            UnitKind::Count => None,
        }
    }

    /// Entity-level units override the enclosing ones field by field.
    pub fn within(&self, outer: &WrittenUnits) -> WrittenUnits {
        WrittenUnits {
            time_unit: self.time_unit.clone().or_else(|| outer.time_unit.clone()),
            data_unit: self.data_unit.clone().or_else(|| outer.data_unit.clone()),
            rate_unit: self.rate_unit.clone().or_else(|| outer.rate_unit.clone()),
        }
    }

    fn normalize(
        &self,
        owner: &str,
        field: &str,
        quantity: &Quantity,
        kind: UnitKind,
    ) -> Result<f64, ModelError> {
        UnitValue::parse_in(quantity, kind, self.for_kind(kind))
            .map(|v| v.magnitude)
            .map_err(|e| ModelError::unit(owner, field, e))
    }

    fn normalize_all(
        &self,
        owner: &str,
        field: &str,
        quantities: &[Quantity],
        kind: UnitKind,
    ) -> Result<Vec<f64>, ModelError> {
        quantities
            .iter()
            .map(|q| self.normalize(owner, field, q, kind))
            .collect()
    }

    fn normalize_opt(
        &self,
        owner: &str,
        field: &str,
        quantity: Option<&Quantity>,
        kind: UnitKind,
    ) -> Result<Option<f64>, ModelError> {
        quantity
            .map(|q| self.normalize(owner, field, q, kind))
            .transpose()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ServiceCurveEntry {
    #[serde(default)]
    pub latencies: Vec<Quantity>,
    #[serde(default)]
    pub rates: Vec<Quantity>,
}

impl ServiceCurveEntry {
    fn to_arrays(&self, owner: &str, units: &WrittenUnits) -> Result<CurveArrays, ModelError> {
        Ok(CurveArrays::new(
            units.normalize_all(owner, "service_curve.latencies", &self.latencies, UnitKind::Time)?,
            units.normalize_all(owner, "service_curve.rates", &self.rates, UnitKind::Rate)?,
        ))
    }

    fn canonical(arrays: (Vec<f64>, Vec<f64>)) -> Self {
        ServiceCurveEntry {
            latencies: arrays.0.into_iter().map(Quantity::Number).collect(),
            rates: arrays.1.into_iter().map(Quantity::Number).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ArrivalCurveEntry {
    #[serde(default)]
    pub bursts: Vec<Quantity>,
    #[serde(default)]
    pub rates: Vec<Quantity>,
}

impl ArrivalCurveEntry {
    fn to_arrays(&self, owner: &str, units: &WrittenUnits) -> Result<CurveArrays, ModelError> {
        Ok(CurveArrays::new(
            units.normalize_all(owner, "arrival_curve.bursts", &self.bursts, UnitKind::Data)?,
            units.normalize_all(owner, "arrival_curve.rates", &self.rates, UnitKind::Rate)?,
        ))
    }

    fn canonical(arrays: (Vec<f64>, Vec<f64>)) -> Self {
        ArrivalCurveEntry {
            bursts: arrays.0.into_iter().map(Quantity::Number).collect(),
            rates: arrays.1.into_iter().map(Quantity::Number).collect(),
        }
    }
}

/// The `network` object: name, written units and network-wide defaults.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NetworkSection {
    pub name: String,
    #[serde(flatten)]
    pub units: WrittenUnits,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<Quantity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_packet_length: Option<Quantity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_packet_length: Option<Quantity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_curve: Option<ServiceCurveEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arrival_curve: Option<ArrivalCurveEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiplexing: Option<Multiplexing>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packetizer: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub analysis_option: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ServerEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_curve: Option<ServiceCurveEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<Quantity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiplexing: Option<Multiplexing>,
    #[serde(flatten)]
    pub units: WrittenUnits,
    /// E.g., `physical_node` and `port` of a converted physical network.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// An additional target of a multicast flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MulticastEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub path: Vec<ServerRef>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FlowEntry {
    pub name: String,
    #[serde(default)]
    pub path: Vec<ServerRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub multicast: Vec<MulticastEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arrival_curve: Option<ArrivalCurveEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_packet_length: Option<Quantity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_packet_length: Option<Quantity>,
    #[serde(flatten)]
    pub units: WrittenUnits,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FlowEntry {
    /// All target paths in declaration order: the main path first, then
    /// the multicast ones.
    pub fn targets(&self) -> Vec<TargetPath> {
        let main = TargetPath {
            name: self.path_name.clone().unwrap_or_else(|| "p0".to_string()),
            path: self.path.clone(),
        };
        let extra = self.multicast.iter().enumerate().map(|(i, m)| TargetPath {
            name: m.name.clone().unwrap_or_else(|| format!("p{}", i + 1)),
            path: m.path.clone(),
        });
        std::iter::once(main).chain(extra).collect()
    }

    fn to_definition(&self, outer: &WrittenUnits) -> Result<FlowDefinition, ModelError> {
        let units = self.units.within(outer);
        let owner = format!("flow {}", self.name);
        let arrival_curve = self
            .arrival_curve
            .as_ref()
            .map(|c| c.to_arrays(&owner, &units))
            .transpose()?;
        Ok(FlowDefinition {
            name: self.name.clone(),
            arrival_curve,
            targets: self.targets(),
            max_packet_length: units.normalize_opt(
                &owner,
                "max_packet_length",
                self.max_packet_length.as_ref(),
                UnitKind::Data,
            )?,
            min_packet_length: units.normalize_opt(
                &owner,
                "min_packet_length",
                self.min_packet_length.as_ref(),
                UnitKind::Data,
            )?,
        })
    }
}

/// A complete output-port description.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OutputPortDescription {
    pub network: NetworkSection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adjacency_matrix: Option<Vec<Vec<u8>>>,
    #[serde(default)]
    pub flows: Vec<FlowEntry>,
    #[serde(default)]
    pub servers: Vec<ServerEntry>,
}

impl OutputPortDescription {
    pub fn from_json(text: &str) -> Result<Self, ModelError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Serialize with four-space indentation.
    pub fn to_json_pretty(&self) -> Result<String, ModelError> {
        let mut out = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
        self.serialize(&mut serializer)?;
        String::from_utf8(out).map_err(|e| ModelError::MalformedDescription {
            reason: e.to_string(),
        })
    }

    /// Lower the description to canonical units.
    ///
    /// Server-level and network-level failures are returned as errors;
    /// a flow that cannot be lowered is recorded in
    /// [NetworkDefinition::rejected_flows] instead.
    pub fn to_definition(&self) -> Result<NetworkDefinition, ModelError> {
        let net = &self.network;
        let units = &net.units;
        let owner = format!("network {}", net.name);

        let defaults = NetworkDefaults {
            service_curve: net
                .service_curve
                .as_ref()
                .map(|c| c.to_arrays(&owner, units))
                .transpose()?,
            arrival_curve: net
                .arrival_curve
                .as_ref()
                .map(|c| c.to_arrays(&owner, units))
                .transpose()?,
            capacity: units.normalize_opt(
                &owner,
                "capacity",
                net.capacity.as_ref(),
                UnitKind::Rate,
            )?,
            max_packet_length: units.normalize_opt(
                &owner,
                "max_packet_length",
                net.max_packet_length.as_ref(),
                UnitKind::Data,
            )?,
            min_packet_length: units.normalize_opt(
                &owner,
                "min_packet_length",
                net.min_packet_length.as_ref(),
                UnitKind::Data,
            )?,
            multiplexing: net.multiplexing.unwrap_or_default(),
        };

        let servers = self
            .servers
            .iter()
            .map(|s| {
                let owner = format!("server {}", s.name);
                let units = s.units.within(units);
                Ok(ServerDefinition {
                    name: s.name.clone(),
                    service_curve: s
                        .service_curve
                        .as_ref()
                        .map(|c| c.to_arrays(&owner, &units))
                        .transpose()?,
                    capacity: units.normalize_opt(
                        &owner,
                        "capacity",
                        s.capacity.as_ref(),
                        UnitKind::Rate,
                    )?,
                    multiplexing: s.multiplexing,
                })
            })
            .collect::<Result<Vec<_>, ModelError>>()?;

        let mut flows = Vec::with_capacity(self.flows.len());
        let mut rejected_flows = Vec::new();
        for (index, flow) in self.flows.iter().enumerate() {
            match flow.to_definition(units) {
                Ok(def) => flows.push(def),
                Err(error) => {
                    log::warn!("dropping flow {}: {}", flow.name, error);
                    rejected_flows.push(FlowIssue {
                        index,
                        name: flow.name.clone(),
                        error,
                    })
                }
            }
        }

        Ok(NetworkDefinition {
            name: net.name.clone(),
            defaults,
            servers,
            adjacency: self.adjacency_matrix.clone(),
            flows,
            rejected_flows,
            packetizer: net.packetizer.unwrap_or(false),
            analysis_options: net.analysis_option.clone(),
        })
    }

    /// Describe a built model in canonical units.
    ///
    /// Unicast flows split from the same multicast flow are written as
    /// separate flows.
    pub fn from_network(network: &Network) -> Self {
        let multiplexing = |m: Multiplexing| match m {
            Multiplexing::Unset => None,
            m => Some(m),
        };
        let servers = network
            .servers()
            .iter()
            .map(|s| ServerEntry {
                name: s.name().to_string(),
                service_curve: Some(ServiceCurveEntry::canonical(s.service_curve().to_arrays())),
                capacity: Some(Quantity::Number(s.capacity())),
                multiplexing: multiplexing(s.multiplexing()),
                ..ServerEntry::default()
            })
            .collect();
        let flows = network
            .flows()
            .iter()
            .map(|f| FlowEntry {
                name: f.name().to_string(),
                path: f
                    .path()
                    .iter()
                    .map(|id| ServerRef::Index(id.0))
                    .collect(),
                arrival_curve: Some(ArrivalCurveEntry::canonical(f.arrival_curve().to_arrays())),
                max_packet_length: f.max_packet_length().map(Quantity::Number),
                min_packet_length: f.min_packet_length().map(Quantity::Number),
                ..FlowEntry::default()
            })
            .collect();
        OutputPortDescription {
            network: NetworkSection {
                name: network.name().to_string(),
                units: WrittenUnits::canonical(),
                packetizer: Some(network.packetizer()),
                analysis_option: network.analysis_options().to_vec(),
                ..NetworkSection::default()
            },
            adjacency_matrix: Some(network.adjacency()),
            flows,
            servers,
        }
    }
}
