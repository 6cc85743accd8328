// SPDX-License-Identifier: MIT OR Apache-2.0
//! Engine-wide state shared by every graph an application builds.

use crate::convert::ConverterRegistry;
use crate::error::Result;
use crate::factory::NodeFactory;
use crate::graph::NodeGraph;
use crate::node::NodeId;
use crate::nodes::register_builtin_nodes;
use crate::parser::{GraphHeader, GraphParser, NodeMetadata};
use crate::value::DynamicTuple;
use std::sync::Arc;

/// Owns the node factory, the converter registry and the environment.
///
/// Created once at startup and passed to whatever loads or builds graphs.
#[derive(Debug)]
pub struct EngineContext {
    factory: NodeFactory,
    converters: Arc<ConverterRegistry>,
    environment: DynamicTuple,
}

impl EngineContext {
    /// Context with the built-in converters and an empty factory
    pub fn new() -> Self {
        Self {
            factory: NodeFactory::new(),
            converters: Arc::new(ConverterRegistry::with_builtins()),
            environment: DynamicTuple::new(),
        }
    }

    /// Context with the built-in converters and node classes
    pub fn with_builtin_nodes() -> Self {
        let mut context = Self::new();
        register_builtin_nodes(&mut context.factory);
        context
    }

    /// Create an empty graph sharing this context's converters
    pub fn new_graph(&self) -> NodeGraph {
        NodeGraph::new(Arc::clone(&self.converters))
    }

    /// Parse a graph file and instantiate it in a new graph.
    ///
    /// The returned node IDs are aligned with the parser's node entries.
    pub fn load_graph(&self, json: &str) -> Result<(GraphParser, NodeGraph, Vec<NodeId>)> {
        let parser = GraphParser::parse(json)?;
        let mut graph = self.new_graph();
        let nodes = parser.instantiate(&self.factory, &mut graph)?;
        tracing::info!("Loaded graph with {} nodes", nodes.len());
        Ok((parser, graph, nodes))
    }

    /// Serialize `nodes` of `graph`, naming classes through the factory
    pub fn save_graph(
        &self,
        graph: &NodeGraph,
        nodes: &[(NodeId, NodeMetadata)],
        header: Option<&GraphHeader>,
    ) -> Result<String> {
        GraphParser::serialize(
            graph,
            nodes,
            |node| self.factory.full_name_of(node).map(str::to_string),
            header,
        )
    }

    /// Values shared with nodes, one per type
    pub fn environment(&self) -> &DynamicTuple {
        &self.environment
    }

    /// Mutable environment
    pub fn environment_mut(&mut self) -> &mut DynamicTuple {
        &mut self.environment
    }

    /// The node factory
    pub fn factory(&self) -> &NodeFactory {
        &self.factory
    }

    /// The node factory, for registering classes
    pub fn factory_mut(&mut self) -> &mut NodeFactory {
        &mut self.factory
    }

    /// The converter registry
    pub fn converters(&self) -> &Arc<ConverterRegistry> {
        &self.converters
    }

    /// Mutable converter registry, for registering conversions before any
    /// graph shares it.
    ///
    /// Returns `None` once a graph holds a reference.
    pub fn converters_mut(&mut self) -> Option<&mut ConverterRegistry> {
        Arc::get_mut(&mut self.converters)
    }
}

impl Default for EngineContext {
    fn default() -> Self {
        Self::new()
    }
}
