/*! The contract between built models and external analysis engines

No engine is implemented in this crate. An engine adapter consumes a
[NetworkView] (the servers, flows and adjacency of a built
[Network][crate::model::Network]), a flow of interest and an
[AnalysisConfig], and reports a delay bound.
*/

use std::time::Duration;

use auto_impl::auto_impl;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{FlowId, Multiplexing, Network, NetworkView, Server, ServerId};

/// Which multiplexing discipline the engine should assume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MultiplexingPolicy {
    /// Every server is FIFO.
    GlobalFifo,
    /// Every server is blind multiplexing.
    GlobalArbitrary,
    /// As declared per server.
    #[default]
    PerServer,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub multiplexing: MultiplexingPolicy,
    /// Whether to apply the maximum-service shaper of each server.
    pub use_shaper: bool,
}

impl AnalysisConfig {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// The discipline to assume at `server`. Servers that declare none
    /// are treated as arbitrary multiplexing.
    pub fn multiplexing_at(&self, server: &Server) -> Multiplexing {
        match (self.multiplexing, server.multiplexing()) {
            (MultiplexingPolicy::GlobalFifo, _) => Multiplexing::Fifo,
            (MultiplexingPolicy::GlobalArbitrary, _) => Multiplexing::Arbitrary,
            (MultiplexingPolicy::PerServer, Multiplexing::Unset) => Multiplexing::Arbitrary,
            (MultiplexingPolicy::PerServer, m) => m,
        }
    }
}

/// Local bounds at one server of the analyzed path.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerBound {
    pub server: ServerId,
    /// Delay bound in seconds.
    pub delay: f64,
    /// Backlog bound in bits, if the engine computes one.
    pub backlog: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineReport {
    /// End-to-end delay bound in seconds.
    pub total_delay: f64,
    /// Some engines only report the total.
    pub per_server: Option<Vec<ServerBound>>,
    pub execution_time: Duration,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{engine} cannot analyze network {network}: {reason}")]
    Unsupported {
        engine: String,
        network: String,
        reason: String,
    },

    #[error("no flow {0} in the model")]
    UnknownFlow(FlowId),

    #[error("{engine} failed: {message}")]
    Failed { engine: String, message: String },
}

/// An external delay-bound analysis.
#[auto_impl(&, Box, Rc)]
pub trait AnalysisEngine {
    fn name(&self) -> &str;

    /// Engines that cannot handle cyclic dependencies return `true`.
    fn requires_feed_forward(&self) -> bool {
        false
    }

    fn analyze(
        &self,
        network: &dyn NetworkView,
        flow: FlowId,
        config: &AnalysisConfig,
    ) -> Result<EngineReport, EngineError>;
}

/// Check that `engine` can handle `network` and that `flow` exists, then
/// run the analysis.
pub fn analyze_flow(
    engine: impl AnalysisEngine,
    network: &Network,
    flow: FlowId,
    config: &AnalysisConfig,
) -> Result<EngineReport, EngineError> {
    if !network.supports(&engine) {
        return Err(EngineError::Unsupported {
            engine: engine.name().to_string(),
            network: network.name().to_string(),
            reason: "the network has cyclic dependencies".to_string(),
        });
    }
    let name = network
        .flow(flow)
        .map(|f| f.name().to_string())
        .ok_or(EngineError::UnknownFlow(flow))?;
    log::debug!("analyzing flow {} with {}", name, engine.name());
    let report = engine.analyze(network, flow, config)?;
    log::info!(
        "{}: flow {} delay bound {}s ({:?})",
        engine.name(),
        name,
        report.total_delay,
        report.execution_time
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use assert_approx_eq::assert_approx_eq;

    use super::*;
    use crate::builder::ModelBuilder;
    use crate::config::BuildConfig;
    use crate::generate::{ring, GeneratorParams};
    use crate::tests::DEMO_JSON;

    /// Sums the per-server latency and the burst of the flow drained at
    /// the service rate. Not a sound bound, but it exercises the view.
    struct LatencySum;

    impl AnalysisEngine for LatencySum {
        fn name(&self) -> &str {
            "latency-sum"
        }

        fn requires_feed_forward(&self) -> bool {
            true
        }

        fn analyze(
            &self,
            network: &dyn NetworkView,
            flow: FlowId,
            config: &AnalysisConfig,
        ) -> Result<EngineReport, EngineError> {
            let start = Instant::now();
            let flow = network
                .flows()
                .get(flow.0)
                .ok_or(EngineError::UnknownFlow(flow))?;
            let burst = flow.arrival_curve().first().burst;
            let per_server: Vec<ServerBound> = flow
                .path()
                .iter()
                .map(|id| {
                    let server = &network.servers()[id.0];
                    let service = server.service_curve().first();
                    let mut delay = service.latency + burst / service.rate;
                    if config.multiplexing_at(server) == Multiplexing::Arbitrary {
                        delay *= 2.0;
                    }
                    ServerBound {
                        server: *id,
                        delay,
                        backlog: None,
                    }
                })
                .collect();
            Ok(EngineReport {
                total_delay: per_server.iter().map(|b| b.delay).sum(),
                per_server: Some(per_server),
                execution_time: start.elapsed(),
            })
        }
    }

    #[test]
    fn engines_see_the_built_model() {
        let net = ModelBuilder::from_output_port_json(DEMO_JSON, BuildConfig::default()).unwrap();
        let f2 = net.flow_by_name("f2").unwrap().id();
        let report = analyze_flow(LatencySum, &net, f2, &AnalysisConfig::default()).unwrap();
        // 4us + 500b at 1Gbps, FIFO as declared
        assert_approx_eq!(report.total_delay, 4.5e-6, 1e-12);
        assert_eq!(report.per_server.unwrap().len(), 1);

        let arbitrary = AnalysisConfig {
            multiplexing: MultiplexingPolicy::GlobalArbitrary,
            use_shaper: false,
        };
        let report = analyze_flow(&LatencySum, &net, f2, &arbitrary).unwrap();
        assert_approx_eq!(report.total_delay, 9e-6, 1e-12);

        let boxed: Box<dyn AnalysisEngine> = Box::new(LatencySum);
        assert!(matches!(
            analyze_flow(boxed, &net, FlowId(99), &arbitrary),
            Err(EngineError::UnknownFlow(FlowId(99)))
        ));
    }

    #[test]
    fn cyclic_networks_need_capable_engines() {
        let desc = ring(4, &GeneratorParams::default());
        let net = ModelBuilder::from_output_port(&desc, BuildConfig::default()).unwrap();
        assert!(!net.is_feed_forward());
        assert!(!net.supports(LatencySum));
        assert!(matches!(
            analyze_flow(LatencySum, &net, FlowId(0), &AnalysisConfig::default()),
            Err(EngineError::Unsupported { .. })
        ));
    }

    #[test]
    fn analysis_config_from_json() {
        let config = AnalysisConfig::from_json(r#"{"multiplexing": "global_fifo"}"#).unwrap();
        assert_eq!(config.multiplexing, MultiplexingPolicy::GlobalFifo);
        assert!(!config.use_shaper);
        assert_eq!(
            AnalysisConfig::from_json("{}").unwrap(),
            AnalysisConfig::default()
        );
    }
}
