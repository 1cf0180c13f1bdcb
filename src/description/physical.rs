/*! The XML physical description format

```xml
<elements>
    <network name="demo" technology="FIFO+IS"/>
    <station name="src"/>
    <switch name="s0" service-latency="2us" service-rate="1Gbps" transmission-capacity="1Gbps"/>
    <link from="src" to="s0" fromPort="o0" toPort="i0"/>
    <flow name="f0" source="src" arrival-curve="leaky-bucket" lb-burst="1kb" lb-rate="10Mbps">
        <target name="p0">
            <path node="s0"/>
        </target>
    </flow>
</elements>
```

Attribute values are kept as written; units are only interpreted when
the description is converted to an output-port one. A bare number is
read in milliseconds, bytes or bits per second, depending on the
attribute. Attributes that are
not recognized are preserved in `extra` lists and written back.
*/

use std::io::Cursor;

use derive_more::Display;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};

use crate::description::Technology;
use crate::error::ModelError;

pub type Attributes = Vec<(String, String)>;

pub const DEFAULT_OUTPUT_PORT: &str = "o0";
pub const DEFAULT_INPUT_PORT: &str = "i0";
pub const LEAKY_BUCKET: &str = "leaky-bucket";

/// Units of attribute values written without one.
pub const BARE_TIME_UNIT: &str = "ms";
pub const BARE_DATA_UNIT: &str = "B";
pub const BARE_RATE_UNIT: &str = "bps";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum NodeKind {
    #[display(fmt = "station")]
    Station,
    #[display(fmt = "switch")]
    Switch,
}

/// Service parameters of a node, or of one of its output links.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ServiceAttributes {
    pub service_latency: Option<String>,
    pub service_rate: Option<String>,
    pub transmission_capacity: Option<String>,
}

impl ServiceAttributes {
    fn take(attrs: &mut Attributes) -> Self {
        ServiceAttributes {
            service_latency: take(attrs, "service-latency"),
            service_rate: take(attrs, "service-rate"),
            transmission_capacity: take(attrs, "transmission-capacity"),
        }
    }

    /// Values set here take precedence over the ones of `base`.
    pub fn over(&self, base: &ServiceAttributes) -> ServiceAttributes {
        ServiceAttributes {
            service_latency: self
                .service_latency
                .clone()
                .or_else(|| base.service_latency.clone()),
            service_rate: self.service_rate.clone().or_else(|| base.service_rate.clone()),
            transmission_capacity: self
                .transmission_capacity
                .clone()
                .or_else(|| base.transmission_capacity.clone()),
        }
    }

    fn push_to(&self, elem: &mut BytesStart) {
        push_opt(elem, "service-latency", &self.service_latency);
        push_opt(elem, "service-rate", &self.service_rate);
        push_opt(elem, "transmission-capacity", &self.transmission_capacity);
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PhysicalNetwork {
    pub name: Option<String>,
    pub technology: Technology,
    pub max_packet_size: Option<String>,
    pub min_packet_size: Option<String>,
    pub transmission_capacity: Option<String>,
    pub extra: Attributes,
}

/// A station (end system) or a switch.
#[derive(Debug, Clone, PartialEq)]
pub struct PhysicalNode {
    pub kind: NodeKind,
    pub name: String,
    pub service: ServiceAttributes,
    pub extra: Attributes,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub name: Option<String>,
    pub from: String,
    pub from_port: String,
    pub to: String,
    pub to_port: String,
    /// Per-link overrides of the service of `from` at `from_port`.
    pub service: ServiceAttributes,
    pub extra: Attributes,
}

impl Link {
    pub fn new(from: &str, from_port: &str, to: &str, to_port: &str) -> Self {
        Link {
            name: None,
            from: from.to_string(),
            from_port: from_port.to_string(),
            to: to.to_string(),
            to_port: to_port.to_string(),
            service: ServiceAttributes::default(),
            extra: Attributes::new(),
        }
    }
}

/// One destination of a flow: the nodes visited after the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub name: String,
    pub path: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhysicalFlow {
    pub name: String,
    pub source: String,
    pub arrival_curve: String,
    pub lb_burst: Option<String>,
    pub lb_rate: Option<String>,
    pub max_packet_size: Option<String>,
    pub min_packet_size: Option<String>,
    pub targets: Vec<Target>,
    pub extra: Attributes,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhysicalDescription {
    /// Name of the document element.
    pub root: String,
    pub network: PhysicalNetwork,
    pub nodes: Vec<PhysicalNode>,
    pub links: Vec<Link>,
    pub flows: Vec<PhysicalFlow>,
}

impl Default for PhysicalDescription {
    fn default() -> Self {
        PhysicalDescription {
            root: "elements".to_string(),
            network: PhysicalNetwork::default(),
            nodes: Vec::new(),
            links: Vec::new(),
            flows: Vec::new(),
        }
    }
}

fn take(attrs: &mut Attributes, key: &str) -> Option<String> {
    let pos = attrs.iter().position(|(k, _)| k == key)?;
    Some(attrs.remove(pos).1)
}

fn push_opt(elem: &mut BytesStart, key: &str, value: &Option<String>) {
    if let Some(v) = value {
        elem.push_attribute((key, v.as_str()));
    }
}

fn push_all(elem: &mut BytesStart, attrs: &Attributes) {
    for (k, v) in attrs {
        elem.push_attribute((k.as_str(), v.as_str()));
    }
}

fn attributes(e: &BytesStart) -> Result<Attributes, ModelError> {
    e.attributes()
        .map(|attr| {
            let attr = attr.map_err(quick_xml::Error::from)?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.unescape_value()?.into_owned();
            Ok((key, value))
        })
        .collect()
}

fn missing(element: &str, name: &str, attribute: &str) -> ModelError {
    ModelError::MissingAttribute {
        element: element.to_string(),
        name: name.to_string(),
        attribute: attribute.to_string(),
    }
}

fn malformed(reason: impl Into<String>) -> ModelError {
    ModelError::MalformedDescription {
        reason: reason.into(),
    }
}

/// Accumulates elements while walking the event stream.
#[derive(Default)]
struct DocumentBuilder {
    root: Option<String>,
    network: Option<PhysicalNetwork>,
    nodes: Vec<PhysicalNode>,
    links: Vec<Link>,
    flows: Vec<PhysicalFlow>,
    flow: Option<PhysicalFlow>,
    target: Option<Target>,
}

impl DocumentBuilder {
    /// Handle an opening (or self-closing) tag found at `depth`, where the
    /// document element is at depth 0.
    fn open(&mut self, e: &BytesStart, depth: usize, empty: bool) -> Result<(), ModelError> {
        let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
        if depth == 0 {
            self.root = Some(tag);
            return Ok(());
        }
        let mut attrs = attributes(e)?;
        match (depth, tag.as_str()) {
            (1, "network") => self.network(attrs),
            (1, "station") => self.node(NodeKind::Station, attrs),
            (1, "switch") => self.node(NodeKind::Switch, attrs),
            (1, "link") => self.link(attrs),
            (1, "flow") => {
                self.flow = Some(self.flow_attributes(attrs)?);
                if empty {
                    self.close_flow();
                }
                Ok(())
            }
            (2, "target") if self.flow.is_some() => {
                let index = self.flow.as_ref().map_or(0, |f| f.targets.len());
                let name = take(&mut attrs, "name").unwrap_or_else(|| format!("p{}", index));
                self.target = Some(Target {
                    name,
                    path: Vec::new(),
                });
                if empty {
                    self.close_target();
                }
                Ok(())
            }
            (3, "path") => match self.target.as_mut() {
                Some(target) => {
                    let node = take(&mut attrs, "node").ok_or_else(|| {
                        missing("path", &format!("{}/{}", target.name, target.path.len()), "node")
                    })?;
                    target.path.push(node);
                    Ok(())
                }
                None => Ok(()),
            },
            _ => {
                log::debug!("ignoring <{}> at depth {}", tag, depth);
                Ok(())
            }
        }
    }

    fn close(&mut self, tag: &[u8]) {
        match tag {
            b"target" => self.close_target(),
            b"flow" => self.close_flow(),
            _ => (),
        }
    }

    fn close_target(&mut self) {
        if let (Some(target), Some(flow)) = (self.target.take(), self.flow.as_mut()) {
            flow.targets.push(target);
        }
    }

    fn close_flow(&mut self) {
        if let Some(flow) = self.flow.take() {
            self.flows.push(flow);
        }
    }

    fn network(&mut self, mut attrs: Attributes) -> Result<(), ModelError> {
        if self.network.is_some() {
            return Err(malformed("more than one <network> element"));
        }
        let technology = take(&mut attrs, "technology").unwrap_or_else(|| "FIFO".to_string());
        self.network = Some(PhysicalNetwork {
            name: take(&mut attrs, "name"),
            technology: Technology::parse(&technology),
            max_packet_size: take(&mut attrs, "maximum-packet-size"),
            min_packet_size: take(&mut attrs, "minimum-packet-size"),
            transmission_capacity: take(&mut attrs, "transmission-capacity"),
            extra: attrs,
        });
        Ok(())
    }

    fn node(&mut self, kind: NodeKind, mut attrs: Attributes) -> Result<(), ModelError> {
        let name = take(&mut attrs, "name")
            .ok_or_else(|| missing(&kind.to_string(), &format!("#{}", self.nodes.len()), "name"))?;
        self.nodes.push(PhysicalNode {
            kind,
            name,
            service: ServiceAttributes::take(&mut attrs),
            extra: attrs,
        });
        Ok(())
    }

    fn link(&mut self, mut attrs: Attributes) -> Result<(), ModelError> {
        let name = take(&mut attrs, "name");
        let label = name
            .clone()
            .unwrap_or_else(|| format!("#{}", self.links.len()));
        let from = take(&mut attrs, "from").ok_or_else(|| missing("link", &label, "from"))?;
        let to = take(&mut attrs, "to").ok_or_else(|| missing("link", &label, "to"))?;
        self.links.push(Link {
            name,
            from,
            from_port: take(&mut attrs, "fromPort").unwrap_or_else(|| DEFAULT_OUTPUT_PORT.into()),
            to,
            to_port: take(&mut attrs, "toPort").unwrap_or_else(|| DEFAULT_INPUT_PORT.into()),
            service: ServiceAttributes::take(&mut attrs),
            extra: attrs,
        });
        Ok(())
    }

    fn flow_attributes(&self, mut attrs: Attributes) -> Result<PhysicalFlow, ModelError> {
        let name = take(&mut attrs, "name").unwrap_or_else(|| format!("fl{}", self.flows.len()));
        let source = take(&mut attrs, "source").ok_or_else(|| missing("flow", &name, "source"))?;
        Ok(PhysicalFlow {
            source,
            arrival_curve: take(&mut attrs, "arrival-curve").unwrap_or_else(|| LEAKY_BUCKET.into()),
            lb_burst: take(&mut attrs, "lb-burst"),
            lb_rate: take(&mut attrs, "lb-rate"),
            max_packet_size: take(&mut attrs, "maximum-packet-size"),
            min_packet_size: take(&mut attrs, "minimum-packet-size"),
            targets: Vec::new(),
            extra: attrs,
            name,
        })
    }

    fn finish(self) -> Result<PhysicalDescription, ModelError> {
        let root = self
            .root
            .ok_or_else(|| malformed("the document has no element"))?;
        let network = self
            .network
            .ok_or_else(|| malformed("no <network> element"))?;
        Ok(PhysicalDescription {
            root,
            network,
            nodes: self.nodes,
            links: self.links,
            flows: self.flows,
        })
    }
}

impl PhysicalDescription {
    /// Parse a complete XML document.
    pub fn from_xml(text: &str) -> Result<Self, ModelError> {
        let mut reader = Reader::from_str(text);
        reader.trim_text(true);
        let mut doc = DocumentBuilder::default();
        let mut depth = 0;
        loop {
            match reader.read_event()? {
                Event::Start(e) => {
                    doc.open(&e, depth, false)?;
                    depth += 1;
                }
                Event::Empty(e) => doc.open(&e, depth, true)?,
                Event::End(e) => {
                    depth = depth.saturating_sub(1);
                    doc.close(e.name().as_ref());
                }
                Event::Eof => break,
                _ => (),
            }
        }
        doc.finish()
    }

    pub fn node(&self, name: &str) -> Option<&PhysicalNode> {
        self.nodes.iter().find(|n| n.name == name)
    }

    /// Links leaving `node`, in document order.
    pub fn links_from<'a>(&'a self, node: &'a str) -> impl Iterator<Item = &'a Link> + 'a {
        self.links.iter().filter(move |l| l.from == node)
    }

    /// Serialize as an indented XML document.
    pub fn to_xml(&self) -> Result<String, ModelError> {
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 4);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        writer.write_event(Event::Start(BytesStart::new(self.root.as_str())))?;

        let net = &self.network;
        let mut elem = BytesStart::new("network");
        push_opt(&mut elem, "name", &net.name);
        elem.push_attribute(("technology", net.technology.to_string().as_str()));
        push_opt(&mut elem, "maximum-packet-size", &net.max_packet_size);
        push_opt(&mut elem, "minimum-packet-size", &net.min_packet_size);
        push_opt(&mut elem, "transmission-capacity", &net.transmission_capacity);
        push_all(&mut elem, &net.extra);
        writer.write_event(Event::Empty(elem))?;

        for node in &self.nodes {
            let tag = node.kind.to_string();
            let mut elem = BytesStart::new(tag.as_str());
            elem.push_attribute(("name", node.name.as_str()));
            node.service.push_to(&mut elem);
            push_all(&mut elem, &node.extra);
            writer.write_event(Event::Empty(elem))?;
        }

        for link in &self.links {
            let mut elem = BytesStart::new("link");
            push_opt(&mut elem, "name", &link.name);
            elem.push_attribute(("from", link.from.as_str()));
            elem.push_attribute(("to", link.to.as_str()));
            elem.push_attribute(("fromPort", link.from_port.as_str()));
            elem.push_attribute(("toPort", link.to_port.as_str()));
            link.service.push_to(&mut elem);
            push_all(&mut elem, &link.extra);
            writer.write_event(Event::Empty(elem))?;
        }

        for flow in &self.flows {
            let mut elem = BytesStart::new("flow");
            elem.push_attribute(("name", flow.name.as_str()));
            elem.push_attribute(("source", flow.source.as_str()));
            elem.push_attribute(("arrival-curve", flow.arrival_curve.as_str()));
            push_opt(&mut elem, "lb-burst", &flow.lb_burst);
            push_opt(&mut elem, "lb-rate", &flow.lb_rate);
            push_opt(&mut elem, "maximum-packet-size", &flow.max_packet_size);
            push_opt(&mut elem, "minimum-packet-size", &flow.min_packet_size);
            push_all(&mut elem, &flow.extra);
            writer.write_event(Event::Start(elem))?;
            for target in &flow.targets {
                let mut elem = BytesStart::new("target");
                elem.push_attribute(("name", target.name.as_str()));
                writer.write_event(Event::Start(elem))?;
                for node in &target.path {
                    let mut step = BytesStart::new("path");
                    step.push_attribute(("node", node.as_str()));
                    writer.write_event(Event::Empty(step))?;
                }
                writer.write_event(Event::End(BytesEnd::new("target")))?;
            }
            writer.write_event(Event::End(BytesEnd::new("flow")))?;
        }

        writer.write_event(Event::End(BytesEnd::new(self.root.as_str())))?;
        String::from_utf8(writer.into_inner().into_inner()).map_err(|e| malformed(e.to_string()))
    }
}
