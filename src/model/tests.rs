use std::rc::Rc;

use assert_approx_eq::assert_approx_eq;

use crate::builder::ModelBuilder;
use crate::config::BuildConfig;
use crate::engine::{AnalysisConfig, AnalysisEngine, EngineError, EngineReport};
use crate::model::{FlowId, Multiplexing, Network, NetworkView, ServerId};
use crate::tests::{DEMO_ADJACENCY, DEMO_JSON};

fn demo() -> Network {
    ModelBuilder::from_output_port_json(DEMO_JSON, BuildConfig::default()).unwrap()
}

struct Capability {
    feed_forward_only: bool,
}

impl AnalysisEngine for Capability {
    fn name(&self) -> &str {
        "capability"
    }

    fn requires_feed_forward(&self) -> bool {
        self.feed_forward_only
    }

    fn analyze(
        &self,
        _network: &dyn NetworkView,
        flow: FlowId,
        _config: &AnalysisConfig,
    ) -> Result<EngineReport, EngineError> {
        Err(EngineError::UnknownFlow(flow))
    }
}

#[test]
fn lookups() {
    let net = demo();
    assert_eq!(net.server_by_name("s1-o1").map(|s| s.id()), Some(ServerId(2)));
    assert_eq!(net.server(ServerId(3)), None);
    assert_eq!(net.flow(FlowId(3)).map(|f| f.name()), Some("f2"));
    assert!(net.flow_by_name("f0").is_none());

    let through: Vec<&str> = net.flows_through(ServerId(0)).map(|f| f.name()).collect();
    assert_eq!(through, vec!["f0_p0", "f0_p1", "f1"]);
    assert!(net.flows()[1].traverses(ServerId(2)));
    assert!(!net.flows()[1].traverses(ServerId(1)));
    assert_eq!(net.flows()[1].path_name(), "p1");
}

#[test]
fn ids_match_positions() {
    let net = demo();
    for (i, server) in net.servers().iter().enumerate() {
        assert_eq!(server.id(), ServerId(i));
    }
    for (i, flow) in net.flows().iter().enumerate() {
        assert_eq!(flow.id(), FlowId(i));
    }
    assert_eq!(ServerId(2).to_string(), "#2");
    assert_eq!(Multiplexing::Fifo.to_string(), "FIFO");
}

#[test]
fn utilization_per_server() {
    let net = demo();
    let u = net.utilization();
    assert_eq!(u.len(), 3);
    // both copies of f0 (10Mbps) and f1 (20Mbps) on 1Gbps
    assert_approx_eq!(u[0], 0.04);
    // f0 (10Mbps) and f2 (5Mbps)
    assert_approx_eq!(u[1], 0.015);
}

#[test]
fn engine_capabilities() {
    let net = demo();
    assert!(net.is_feed_forward());
    assert!(net.supports(Capability {
        feed_forward_only: true
    }));
    let boxed: Box<dyn AnalysisEngine> = Box::new(Capability {
        feed_forward_only: false,
    });
    assert!(net.supports(&boxed));
    assert!(net.supports(boxed));
}

#[test]
fn views_are_shared() {
    let net = Rc::new(demo());
    let view: Box<dyn NetworkView> = Box::new(Rc::clone(&net));
    assert_eq!(view.servers().len(), 3);
    assert_eq!(view.flows().len(), 4);
    assert_eq!(view.adjacency(), crate::tests::adjacency(&DEMO_ADJACENCY));
}
