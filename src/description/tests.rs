use assert_approx_eq::assert_approx_eq;

use crate::definition::ServerRef;
use crate::description::physical::{NodeKind, DEFAULT_INPUT_PORT};
use crate::description::{OutputPortDescription, PhysicalDescription, TechFlag, Technology};
use crate::error::ModelError;
use crate::model::Multiplexing;
use crate::tests::{DEMO_JSON, DEMO_XML};
use crate::unit::UnitError;

#[test]
fn technology_tokens() {
    let tech = Technology::parse("FIFO+IS+WEIRD+PK");
    assert!(tech.contains(TechFlag::Fifo));
    assert!(tech.packetizer());
    assert_eq!(tech.multiplexing(), Multiplexing::Fifo);
    assert_eq!(tech.analysis_options(), vec!["IS".to_string()]);
    assert_eq!(tech.unknown_tokens(), &["WEIRD".to_string()]);
    assert_eq!(tech.to_string(), "FIFO+PK+IS+WEIRD");
    assert_eq!(Technology::parse("").multiplexing(), Multiplexing::Arbitrary);
}

#[test]
fn technology_enforcement() {
    let mut tech = Technology::parse("FIFO+MOH");
    tech.enforce(&[TechFlag::InputShaper, TechFlag::Ceil], &[TechFlag::Moh]);
    assert_eq!(tech.to_string(), "FIFO+IS+CEIL");
    let round = Technology::from_options(true, Multiplexing::Arbitrary, &tech.analysis_options());
    assert_eq!(round.to_string(), "PK+IS+CEIL");
}

#[test]
fn output_port_units_are_normalized() {
    let desc = OutputPortDescription::from_json(DEMO_JSON).unwrap();
    assert_eq!(desc.servers.len(), 3);
    assert_eq!(desc.flows[1].path, vec![ServerRef::Index(0), ServerRef::Index(2)]);

    let def = desc.to_definition().unwrap();
    assert!(def.rejected_flows.is_empty());
    assert_eq!(def.defaults.multiplexing, Multiplexing::Fifo);
    assert_approx_eq!(def.defaults.max_packet_length.unwrap(), 12_000.0);

    let s0 = &def.servers[0];
    assert_eq!(s0.name, "s0-o0");
    let curve = s0.service_curve.as_ref().unwrap();
    assert_approx_eq!(curve.first[0], 2e-6);
    assert_approx_eq!(curve.rates[0], 1e9);
    assert_approx_eq!(s0.capacity.unwrap(), 1e9);
    assert_eq!(def.servers[1].capacity, None);

    // explicit units and written units mix within one array
    let s2 = def.servers[2].service_curve.as_ref().unwrap();
    assert_approx_eq!(s2.first[0], 8e-6);
    assert_approx_eq!(s2.first[1], 4e-5);
    assert_approx_eq!(s2.rates[1], 1e8);

    let f0 = &def.flows[0];
    assert_eq!(f0.targets.len(), 2);
    assert_eq!(f0.targets[0].name, "p0");
    assert_eq!(f0.targets[1].name, "p1");
    assert_approx_eq!(f0.arrival_curve.as_ref().unwrap().first[0], 1000.0);
    assert_approx_eq!(f0.max_packet_length.unwrap(), 1000.0);
    assert_approx_eq!(def.flows[1].arrival_curve.as_ref().unwrap().rates[0], 2e7);
}

#[test]
fn bad_flow_units_only_reject_the_flow() {
    let text = r#"{
        "network": {"name": "n"},
        "servers": [{"name": "a", "service_curve": {"latencies": [0], "rates": [1]}}],
        "flows": [
            {"name": "ok", "path": ["a"], "arrival_curve": {"bursts": [1], "rates": [1]}},
            {"name": "bad", "path": ["a"], "arrival_curve": {"bursts": ["1 furlong"], "rates": [1]}}
        ]
    }"#;
    let def = OutputPortDescription::from_json(text)
        .unwrap()
        .to_definition()
        .unwrap();
    assert_eq!(def.flows.len(), 1);
    assert_eq!(def.rejected_flows.len(), 1);
    let issue = &def.rejected_flows[0];
    assert_eq!((issue.index, issue.name.as_str()), (1, "bad"));
    assert!(matches!(
        issue.error,
        ModelError::UnitParse {
            source: UnitError::UnknownUnit { .. },
            ..
        }
    ));
}

#[test]
fn bad_server_units_abort() {
    let text = r#"{
        "network": {"name": "n"},
        "servers": [{"name": "a", "service_curve": {"latencies": ["1 parsec"], "rates": [1]}}]
    }"#;
    let err = OutputPortDescription::from_json(text)
        .unwrap()
        .to_definition()
        .unwrap_err();
    assert!(err.to_string().contains("server a"), "{}", err);
}

#[test]
fn unknown_json_fields_survive() {
    let text = r#"{"network": {"name": "n", "author": "me"}, "servers": [], "flows": []}"#;
    let desc = OutputPortDescription::from_json(text).unwrap();
    assert_eq!(desc.network.extra["author"], "me");
    let again = OutputPortDescription::from_json(&desc.to_json_pretty().unwrap()).unwrap();
    assert_eq!(again, desc);
}

#[test]
fn pretty_json_uses_four_spaces() {
    let desc = OutputPortDescription::from_json(DEMO_JSON).unwrap();
    let text = desc.to_json_pretty().unwrap();
    assert!(text.starts_with("{\n    \"network\": {\n        \"name\": \"demo\""), "{}", text);
}

#[test]
fn physical_document() {
    let doc = PhysicalDescription::from_xml(DEMO_XML).unwrap();
    assert_eq!(doc.root, "elements");
    assert_eq!(doc.network.name.as_deref(), Some("demo"));
    assert!(doc.network.technology.contains(TechFlag::InputShaper));
    assert_eq!(doc.network.max_packet_size.as_deref(), Some("12kb"));

    assert_eq!(doc.nodes.len(), 5);
    assert_eq!(doc.nodes[3].kind, NodeKind::Switch);
    assert_eq!(doc.nodes[3].service.service_rate.as_deref(), Some("1Gbps"));

    assert_eq!(doc.links.len(), 4);
    assert_eq!(doc.links[0].from_port, "o0");
    assert_eq!(doc.links[0].to_port, DEFAULT_INPUT_PORT);
    assert_eq!(doc.links[1].name.as_deref(), Some("core"));
    assert_eq!(doc.links[3].service.service_latency.as_deref(), Some("8us"));
    assert_eq!(doc.links_from("s1").count(), 2);

    assert_eq!(doc.flows.len(), 3);
    let f0 = &doc.flows[0];
    assert_eq!(f0.targets.len(), 2);
    assert_eq!(f0.targets[0].name, "p0");
    assert_eq!(f0.targets[1].path, vec!["s0", "s1", "sinkB"]);
    let f2 = &doc.flows[2];
    assert_eq!(f2.targets[0].name, "direct");
    assert_eq!(f2.extra, vec![("priority".to_string(), "3".to_string())]);
}

#[test]
fn physical_document_survives_rewriting() {
    let doc = PhysicalDescription::from_xml(DEMO_XML).unwrap();
    let text = doc.to_xml().unwrap();
    assert!(text.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
    assert_eq!(PhysicalDescription::from_xml(&text).unwrap(), doc);
}

#[test]
fn physical_defaults() {
    let doc = PhysicalDescription::from_xml(
        r#"<elements>
            <network name="n"/>
            <station name="a"/>
            <flow source="a"><target><path node="a"/></target></flow>
            <flow source="a"/>
        </elements>"#,
    )
    .unwrap();
    assert_eq!(doc.network.technology.to_string(), "FIFO");
    assert_eq!(doc.flows[0].name, "fl0");
    assert_eq!(doc.flows[1].name, "fl1");
    assert_eq!(doc.flows[0].arrival_curve, "leaky-bucket");
    assert!(doc.flows[1].targets.is_empty());
}

#[test]
fn physical_required_attributes() {
    let err = PhysicalDescription::from_xml(
        r#"<elements><network name="n"/><link from="a"/></elements>"#,
    )
    .unwrap_err();
    assert!(matches!(
        err,
        ModelError::MissingAttribute { ref attribute, .. } if attribute == "to"
    ));
    let err = PhysicalDescription::from_xml(
        r#"<elements><network name="n"/><flow name="f"><target/></flow></elements>"#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("source"), "{}", err);
    let err = PhysicalDescription::from_xml(r#"<elements><station name="a"/></elements>"#)
        .unwrap_err();
    assert!(matches!(err, ModelError::MalformedDescription { .. }));
}

#[test]
fn built_models_describe_themselves() {
    use crate::builder::ModelBuilder;
    use crate::config::BuildConfig;
    use crate::curve::Bound;

    let net = ModelBuilder::from_output_port_json(DEMO_JSON, BuildConfig::default()).unwrap();
    let desc = OutputPortDescription::from_network(&net);
    assert_eq!(desc.flows.len(), net.flows().len());
    assert_eq!(desc.flows[0].name, "f0_p0");

    let again = ModelBuilder::from_output_port(&desc, BuildConfig::default()).unwrap();
    assert_eq!(again.adjacency(), net.adjacency());
    for (a, b) in again.flows().iter().zip(net.flows()) {
        assert_eq!(a.name(), b.name());
        assert_eq!(a.path(), b.path());
        assert_approx_eq!(a.arrival_curve().evaluate(1e-3), b.arrival_curve().evaluate(1e-3));
    }
    for (a, b) in again.servers().iter().zip(net.servers()) {
        assert_approx_eq!(a.capacity(), b.capacity());
        assert_approx_eq!(a.service_curve().evaluate(1e-3), b.service_curve().evaluate(1e-3));
    }
}
