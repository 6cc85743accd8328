// SPDX-License-Identifier: MIT OR Apache-2.0
//! JSON graph files: parsing, instantiation and canonical serialization.
//!
//! ```json
//! {
//!   "header": { "contentType": "pipeline" },
//!   "nodes": [ { "id": 1, "name": "sum", "class": "Float/Add", "inputs": ["2", {}], "meta_pos": "[0, 0]" } ],
//!   "links": [ { "src": 1, "dst": "sink", "srcp": 0, "dstp": "value" } ]
//! }
//! ```

use crate::error::{GraphError, Result};
use crate::factory::NodeFactory;
use crate::graph::NodeGraph;
use crate::node::{Node, NodeId};
use crate::port::PortRef;
use crate::value::Any;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Graph file header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphHeader {
    /// Kind of graph stored in the file
    #[serde(rename = "contentType")]
    pub content_type: String,
}

impl GraphHeader {
    /// Create a header
    pub fn new(content_type: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into(),
        }
    }
}

/// Reference to a node, by numeric id or by name
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeRef {
    /// Numeric node id
    Id(i64),
    /// Node name
    Name(String),
}

/// Reference to a port, by index or by name
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PortSelector {
    /// 0-based port index
    Index(usize),
    /// Port name
    Name(String),
}

impl PortSelector {
    fn parts(&self) -> (Option<usize>, Option<&str>) {
        match self {
            Self::Index(index) => (Some(*index), None),
            Self::Name(name) => (None, Some(name)),
        }
    }
}

/// A node entry of a graph file
#[derive(Debug, Clone, PartialEq)]
pub struct NodeDescription {
    /// Numeric id, unique within the graph
    pub id: Option<i64>,
    /// Name, unique within the graph
    pub name: Option<String>,
    /// Full class name in the node factory
    pub class: String,
    /// Literal default values, aligned with the node's inputs
    pub default_inputs: Vec<Option<String>>,
    /// Editor placement
    pub position: Option<[f32; 2]>,
}

impl NodeDescription {
    fn label(&self) -> String {
        match (&self.name, self.id) {
            (Some(name), _) => format!("'{name}'"),
            (None, Some(id)) => format!("#{id}"),
            (None, None) => "<anonymous>".to_string(),
        }
    }
}

/// A link entry of a graph file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkDescription {
    /// Source node
    pub src: NodeRef,
    /// Destination node
    pub dst: NodeRef,
    /// Output port on the source node
    pub srcp: PortSelector,
    /// Input port on the destination node
    pub dstp: PortSelector,
}

/// Identity and placement of a node being serialized
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeMetadata {
    /// Numeric id
    pub id: Option<i64>,
    /// Display name; links refer to the node by name when present
    pub name: Option<String>,
    /// Editor placement
    pub position: [f32; 2],
}

#[derive(Serialize, Deserialize)]
struct RawDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    header: Option<GraphHeader>,
    nodes: Vec<RawNode>,
    links: Vec<LinkDescription>,
}

#[derive(Serialize, Deserialize)]
struct RawNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    class: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    inputs: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    meta_pos: Option<String>,
}

/// Parsed graph file with id and name lookup tables
#[derive(Debug, Clone, Default)]
pub struct GraphParser {
    header: Option<GraphHeader>,
    nodes: Vec<NodeDescription>,
    links: Vec<LinkDescription>,
    ids: HashMap<i64, usize>,
    names: HashMap<String, usize>,
}

impl GraphParser {
    /// Parse a graph file.
    ///
    /// Syntax and schema errors are `InvalidArgument` and report the 1-based
    /// line and column. Duplicate node ids or names are `InvalidArgument`.
    pub fn parse(json: &str) -> Result<Self> {
        let document: RawDocument = serde_json::from_str(json).map_err(|error| {
            let kind = match error.classify() {
                serde_json::error::Category::Data => "invalid graph description",
                _ => "malformed graph JSON",
            };
            GraphError::invalid_argument(format!(
                "{kind} at line {}, column {}: {error}",
                error.line(),
                error.column()
            ))
        })?;

        let mut nodes = Vec::with_capacity(document.nodes.len());
        for (index, raw) in document.nodes.into_iter().enumerate() {
            nodes.push(Self::describe_node(index, raw)?);
        }

        let mut parser = Self {
            header: document.header,
            nodes,
            links: document.links,
            ids: HashMap::new(),
            names: HashMap::new(),
        };
        parser.build_lookup()?;
        tracing::debug!(
            "Parsed graph with {} nodes and {} links",
            parser.nodes.len(),
            parser.links.len()
        );
        Ok(parser)
    }

    /// File header, if present
    pub fn header(&self) -> Option<&GraphHeader> {
        self.header.as_ref()
    }

    /// Node entries, in file order
    pub fn nodes(&self) -> &[NodeDescription] {
        &self.nodes
    }

    /// Link entries, in file order
    pub fn links(&self) -> &[LinkDescription] {
        &self.links
    }

    /// Index of a node entry by id or name; the id wins when both are given
    pub fn find_node(&self, id: Option<i64>, name: Option<&str>) -> Result<usize> {
        match (id, name) {
            (Some(id), _) => self
                .ids
                .get(&id)
                .copied()
                .ok_or_else(|| GraphError::out_of_range(format!("no node with id {id}"))),
            (None, Some(name)) => self
                .names
                .get(name)
                .copied()
                .ok_or_else(|| GraphError::out_of_range(format!("no node named '{name}'"))),
            (None, None) => Err(GraphError::invalid_argument(
                "a node must be selected by id or by name",
            )),
        }
    }

    /// Index of the node entry `reference` points at
    pub fn find_node_ref(&self, reference: &NodeRef) -> Result<usize> {
        match reference {
            NodeRef::Id(id) => self.find_node(Some(*id), None),
            NodeRef::Name(name) => self.find_node(None, Some(name)),
        }
    }

    /// Index of an input port of `node` by index or name
    pub fn find_input_port(node: &dyn Node, index: Option<usize>, name: Option<&str>) -> Result<usize> {
        let ports = node.ports();
        match (index, name) {
            (Some(index), _) if index < ports.input_count() => Ok(index),
            (Some(index), _) => Err(GraphError::out_of_range(format!("no input port {index}"))),
            (None, Some(name)) => ports
                .find_input(name)
                .ok_or_else(|| GraphError::out_of_range(format!("no input port named '{name}'"))),
            (None, None) => Err(GraphError::invalid_argument(
                "an input port must be selected by index or by name",
            )),
        }
    }

    /// Index of an output port of `node` by index or name
    pub fn find_output_port(node: &dyn Node, index: Option<usize>, name: Option<&str>) -> Result<usize> {
        let ports = node.ports();
        match (index, name) {
            (Some(index), _) if index < ports.output_count() => Ok(index),
            (Some(index), _) => Err(GraphError::out_of_range(format!("no output port {index}"))),
            (None, Some(name)) => ports
                .find_output(name)
                .ok_or_else(|| GraphError::out_of_range(format!("no output port named '{name}'"))),
            (None, None) => Err(GraphError::invalid_argument(
                "an output port must be selected by index or by name",
            )),
        }
    }

    /// Create every described node in `graph`, apply default literals and
    /// establish every link.
    ///
    /// Returns the created node IDs, aligned with [`nodes`](Self::nodes). On
    /// failure the nodes created so far are removed again.
    pub fn instantiate(&self, factory: &NodeFactory, graph: &mut NodeGraph) -> Result<Vec<NodeId>> {
        let mut created = Vec::with_capacity(self.nodes.len());
        let result = self.instantiate_into(factory, graph, &mut created);
        if result.is_err() {
            for node_id in created.drain(..) {
                graph.remove_node(node_id);
            }
        }
        result.map(|()| created)
    }

    fn instantiate_into(
        &self,
        factory: &NodeFactory,
        graph: &mut NodeGraph,
        created: &mut Vec<NodeId>,
    ) -> Result<()> {
        for description in &self.nodes {
            let node = factory.create(&description.class)?;
            created.push(graph.add_node(node));
        }

        for (description, node_id) in self.nodes.iter().zip(created.iter().copied()) {
            for (index, literal) in description.default_inputs.iter().enumerate() {
                let Some(literal) = literal else {
                    continue;
                };
                graph
                    .set_input_convert(PortRef::new(node_id, index), Any::new(literal.clone()))
                    .map_err(|error| {
                        GraphError::invalid_argument(format!(
                            "node {} input {index}: {error}",
                            description.label()
                        ))
                    })?;
            }
        }

        for link in &self.links {
            let (source, destination) = self.resolve_link(link, graph, created)?;
            if !graph.link(source, destination)? {
                return Err(GraphError::invalid_argument(format!(
                    "link {link:?} was rejected: destination already linked or types incompatible"
                )));
            }
        }
        Ok(())
    }

    fn resolve_link(
        &self,
        link: &LinkDescription,
        graph: &NodeGraph,
        created: &[NodeId],
    ) -> Result<(PortRef, PortRef)> {
        let unresolved = |error: GraphError| {
            GraphError::invalid_argument(format!("cannot resolve link {link:?}: {error}"))
        };

        let source = created[self.find_node_ref(&link.src).map_err(unresolved)?];
        let destination = created[self.find_node_ref(&link.dst).map_err(unresolved)?];

        let source_node = graph
            .node(source)
            .ok_or_else(|| unresolved(GraphError::out_of_range("source node vanished")))?;
        let (index, name) = link.srcp.parts();
        let source_port = Self::find_output_port(source_node, index, name).map_err(unresolved)?;

        let destination_node = graph
            .node(destination)
            .ok_or_else(|| unresolved(GraphError::out_of_range("destination node vanished")))?;
        let (index, name) = link.dstp.parts();
        let destination_port =
            Self::find_input_port(destination_node, index, name).map_err(unresolved)?;

        Ok((
            PortRef::new(source, source_port),
            PortRef::new(destination, destination_port),
        ))
    }

    /// Serialize `nodes` of `graph` to canonical, pretty-printed JSON.
    ///
    /// Links are emitted from the input side; links from nodes outside
    /// `nodes` are skipped. Unlinked inputs holding a value are written as
    /// literal defaults when the value can be stringified.
    pub fn serialize(
        graph: &NodeGraph,
        nodes: &[(NodeId, NodeMetadata)],
        class_name: impl Fn(&dyn Node) -> Result<String>,
        header: Option<&GraphHeader>,
    ) -> Result<String> {
        let mut next_id = nodes
            .iter()
            .filter_map(|(_, metadata)| metadata.id)
            .max()
            .map_or(0, |id| id + 1);

        // Reference used for every node in emitted links
        let mut references: HashMap<NodeId, NodeRef> = HashMap::new();
        let mut identities = Vec::with_capacity(nodes.len());
        for (node_id, metadata) in nodes {
            let (reference, id) = match (&metadata.name, metadata.id) {
                (Some(name), id) => (NodeRef::Name(name.clone()), id),
                (None, Some(id)) => (NodeRef::Id(id), Some(id)),
                (None, None) => {
                    next_id += 1;
                    (NodeRef::Id(next_id - 1), Some(next_id - 1))
                }
            };
            references.insert(*node_id, reference);
            identities.push(id);
        }

        let mut raw_nodes = Vec::with_capacity(nodes.len());
        let mut raw_links = Vec::new();
        for ((node_id, metadata), id) in nodes.iter().zip(identities) {
            let node = graph
                .node(*node_id)
                .ok_or_else(|| GraphError::out_of_range(format!("Node not found: {node_id:?}")))?;
            let destination = references[node_id].clone();

            let mut inputs = Vec::with_capacity(node.ports().input_count());
            for (index, input) in node.ports().inputs().iter().enumerate() {
                match input.link() {
                    Some(source) => {
                        if let Some(src) = references.get(&source.node) {
                            raw_links.push(LinkDescription {
                                src: src.clone(),
                                dst: destination.clone(),
                                srcp: PortSelector::Index(source.index),
                                dstp: PortSelector::Index(index),
                            });
                        } else {
                            tracing::debug!("Skipping link from unserialized node {:?}", source.node);
                        }
                        inputs.push(None);
                    }
                    None if input.is_set() => {
                        inputs.push(graph.converters().to_string(input.value()).ok());
                    }
                    None => inputs.push(None),
                }
            }
            while inputs.last().is_some_and(Option::is_none) {
                inputs.pop();
            }

            raw_nodes.push(RawNode {
                id,
                name: metadata.name.clone(),
                class: class_name(node)?,
                inputs: inputs
                    .into_iter()
                    .map(|slot| match slot {
                        Some(literal) => Value::String(literal),
                        None => Value::Object(serde_json::Map::new()),
                    })
                    .collect(),
                meta_pos: Some(format!("[{}, {}]", metadata.position[0], metadata.position[1])),
            });
        }

        raw_nodes.sort_by(|a, b| a.name.cmp(&b.name));
        raw_nodes.sort_by(|a, b| a.id.cmp(&b.id));
        raw_links.sort_by(|a, b| (&a.dst, &a.dstp).cmp(&(&b.dst, &b.dstp)));
        raw_links.sort_by(|a, b| (&a.src, &a.srcp).cmp(&(&b.src, &b.srcp)));

        let document = RawDocument {
            header: header.cloned(),
            nodes: raw_nodes,
            links: raw_links,
        };
        serde_json::to_string_pretty(&document)
            .map_err(|error| GraphError::invalid_state(format!("cannot write graph JSON: {error}")))
    }

    fn describe_node(index: usize, raw: RawNode) -> Result<NodeDescription> {
        if raw.id.is_none() && raw.name.is_none() {
            return Err(GraphError::invalid_argument(format!(
                "node {index} ({}) needs an id or a name",
                raw.class
            )));
        }
        if raw.class.is_empty() {
            return Err(GraphError::invalid_argument(format!(
                "node {index} has an empty class name"
            )));
        }

        let default_inputs = raw
            .inputs
            .into_iter()
            .enumerate()
            .map(|(slot, value)| match value {
                Value::String(literal) => Ok(Some(literal)),
                Value::Null => Ok(None),
                Value::Object(map) if map.is_empty() => Ok(None),
                Value::Number(number) => Ok(Some(number.to_string())),
                Value::Bool(flag) => Ok(Some(flag.to_string())),
                other => Err(GraphError::invalid_argument(format!(
                    "node {index} input {slot}: unsupported literal {other}"
                ))),
            })
            .collect::<Result<Vec<_>>>()?;

        let position = raw
            .meta_pos
            .as_deref()
            .map(|text| parse_position(index, text))
            .transpose()?;

        Ok(NodeDescription {
            id: raw.id,
            name: raw.name,
            class: raw.class,
            default_inputs,
            position,
        })
    }

    fn build_lookup(&mut self) -> Result<()> {
        for (index, node) in self.nodes.iter().enumerate() {
            if let Some(id) = node.id {
                if self.ids.insert(id, index).is_some() {
                    return Err(GraphError::invalid_argument(format!("duplicate node id {id}")));
                }
            }
            if let Some(name) = &node.name {
                if self.names.insert(name.clone(), index).is_some() {
                    return Err(GraphError::invalid_argument(format!(
                        "duplicate node name '{name}'"
                    )));
                }
            }
        }
        Ok(())
    }
}

fn parse_position(index: usize, text: &str) -> Result<[f32; 2]> {
    let malformed =
        || GraphError::invalid_argument(format!("node {index}: malformed meta_pos '{text}'"));
    let body = text
        .trim()
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .ok_or_else(malformed)?;
    let mut coordinates = body.split(',').map(|part| part.trim().parse::<f32>());
    match (coordinates.next(), coordinates.next(), coordinates.next()) {
        (Some(Ok(x)), Some(Ok(y)), None) => Ok([x, y]),
        _ => Err(malformed()),
    }
}
