// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph data structure owning node instances and the links between them.
//!
//! [`NodeGraph`] is an arena: nodes are owned by the graph, links are pairs of
//! [`PortRef`]s recorded on both ends. Setting an input or updating a node
//! runs the whole notify cascade before returning, using an explicit work
//! stack instead of recursion.

use crate::convert::ConverterRegistry;
use crate::error::{GraphError, Result};
use crate::node::{Node, NodeId};
use crate::port::{InputPort, OutputPort, PortRef};
use crate::value::Any;
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

/// A value travelling along a link
struct Delivery {
    target: PortRef,
    value: Any,
}

/// Arena of nodes and links
pub struct NodeGraph {
    nodes: IndexMap<NodeId, Box<dyn Node>>,
    converters: Arc<ConverterRegistry>,
}

impl NodeGraph {
    /// Create an empty graph using `converters` for mismatched links
    pub fn new(converters: Arc<ConverterRegistry>) -> Self {
        Self {
            nodes: IndexMap::new(),
            converters,
        }
    }

    /// Converter registry used by this graph
    pub fn converters(&self) -> &ConverterRegistry {
        &self.converters
    }

    /// Add a boxed node to the graph
    pub fn add_node(&mut self, node: Box<dyn Node>) -> NodeId {
        let id = NodeId::new();
        self.nodes.insert(id, node);
        id
    }

    /// Add a node to the graph
    pub fn insert<T: Node>(&mut self, node: T) -> NodeId {
        self.add_node(Box::new(node))
    }

    /// Remove a node, unlinking every link that touches it
    pub fn remove_node(&mut self, node_id: NodeId) -> Option<Box<dyn Node>> {
        let mut node = self.nodes.shift_remove(&node_id)?;

        for (index, input) in node.ports_mut().inputs_mut().iter_mut().enumerate() {
            let Some(source) = input.detach() else {
                continue;
            };
            if let Some(upstream) = self.nodes.get_mut(&source.node) {
                if let Ok(output) = upstream.ports_mut().output_port_mut(source.index) {
                    output.detach(PortRef::new(node_id, index));
                }
            }
        }

        for output in node.ports_mut().outputs_mut() {
            for destination in output.detach_all() {
                if let Some(downstream) = self.nodes.get_mut(&destination.node) {
                    if let Ok(input) = downstream.ports_mut().input_port_mut(destination.index) {
                        input.detach();
                    }
                }
            }
        }

        tracing::debug!("Removed node {:?}", node_id);
        Some(node)
    }

    /// Get a node by ID
    pub fn node(&self, node_id: NodeId) -> Option<&dyn Node> {
        self.nodes.get(&node_id).map(|node| node.as_ref())
    }

    /// Get a mutable node by ID
    pub fn node_mut(&mut self, node_id: NodeId) -> Option<&mut dyn Node> {
        self.nodes.get_mut(&node_id).map(|node| node.as_mut())
    }

    /// Get a node by ID as its concrete class
    pub fn get<T: Node>(&self, node_id: NodeId) -> Option<&T> {
        self.node(node_id)?.downcast_ref::<T>()
    }

    /// Whether the node exists
    pub fn contains(&self, node_id: NodeId) -> bool {
        self.nodes.contains_key(&node_id)
    }

    /// All node IDs, in insertion order
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// All nodes, in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &dyn Node)> {
        self.nodes.iter().map(|(id, node)| (*id, node.as_ref()))
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Input port behind `port`
    pub fn input_port(&self, port: PortRef) -> Result<&InputPort> {
        self.require(port.node)?.ports().input_port(port.index)
    }

    /// Output port behind `port`
    pub fn output_port(&self, port: PortRef) -> Result<&OutputPort> {
        self.require(port.node)?.ports().output_port(port.index)
    }

    /// Link output `source` to input `destination`.
    ///
    /// Returns `Ok(false)` without touching either port when the input is
    /// already linked or the port types are incompatible. Unknown nodes or
    /// ports are `OutOfRange`.
    pub fn link(&mut self, source: PortRef, destination: PortRef) -> Result<bool> {
        let source_type = self.output_port(source)?.port_type();
        let input = self.input_port(destination)?;
        if input.is_linked() {
            return Ok(false);
        }
        if !self.converters.can_link(source_type, input.port_type()) {
            tracing::debug!(
                "Rejected link {} -> {}: incompatible types",
                source_type,
                input.port_type()
            );
            return Ok(false);
        }

        self.require_mut(destination.node)?
            .ports_mut()
            .input_port_mut(destination.index)?
            .attach(source);
        self.require_mut(source.node)?
            .ports_mut()
            .output_port_mut(source.index)?
            .attach(destination);
        tracing::debug!("Linked {:?} -> {:?}", source, destination);
        Ok(true)
    }

    /// Unlink input `destination` from its upstream output.
    ///
    /// Returns `Ok(false)` if the input was not linked.
    pub fn unlink(&mut self, destination: PortRef) -> Result<bool> {
        let Some(source) = self
            .require_mut(destination.node)?
            .ports_mut()
            .input_port_mut(destination.index)?
            .detach()
        else {
            return Ok(false);
        };
        if let Some(upstream) = self.nodes.get_mut(&source.node) {
            upstream
                .ports_mut()
                .output_port_mut(source.index)?
                .detach(destination);
        }
        tracing::debug!("Unlinked {:?} -> {:?}", source, destination);
        Ok(true)
    }

    /// Unlink every input fed by output `source`; returns how many were unlinked
    pub fn unlink_output(&mut self, source: PortRef) -> Result<usize> {
        let destinations = self
            .require_mut(source.node)?
            .ports_mut()
            .output_port_mut(source.index)?
            .detach_all();
        for destination in &destinations {
            if let Some(downstream) = self.nodes.get_mut(&destination.node) {
                downstream
                    .ports_mut()
                    .input_port_mut(destination.index)?
                    .detach();
            }
        }
        Ok(destinations.len())
    }

    /// Whether some output of `source` feeds some input of `destination`
    pub fn is_linked(&self, source: NodeId, destination: NodeId) -> bool {
        self.node(destination).is_some_and(|node| {
            node.ports()
                .inputs()
                .iter()
                .any(|input| input.link().is_some_and(|link| link.node == source))
        })
    }

    /// Every link as `(output, input)`, grouped by destination node
    pub fn links(&self) -> Vec<(PortRef, PortRef)> {
        self.nodes
            .iter()
            .flat_map(|(id, node)| {
                node.ports()
                    .inputs()
                    .iter()
                    .enumerate()
                    .filter_map(move |(index, input)| {
                        input.link().map(|source| (source, PortRef::new(*id, index)))
                    })
            })
            .collect()
    }

    /// Read input `port` as `T`
    pub fn get_input<T: 'static>(&self, port: PortRef) -> Result<&T> {
        self.input_port(port)?.get::<T>()
    }

    /// Set input `port` to `value`, notify its node and run the cascade
    pub fn set_input<T: Clone + 'static>(&mut self, port: PortRef, value: T) -> Result<()> {
        self.require_mut(port.node)?
            .ports_mut()
            .input_port_mut(port.index)?
            .set(value)?;
        self.notify_and_propagate(port)
    }

    /// Set input `port` from a value of any type, converting it to the
    /// port's type; then notify and run the cascade.
    ///
    /// Returns `Ok(false)` if a wildcard value could not be narrowed.
    pub fn set_input_convert(&mut self, port: PortRef, value: Any) -> Result<bool> {
        let converters = Arc::clone(&self.converters);
        let accepted = self
            .require_mut(port.node)?
            .ports_mut()
            .input_port_mut(port.index)?
            .set_convert(value, &converters)?;
        if accepted {
            self.notify_and_propagate(port)?;
        }
        Ok(accepted)
    }

    /// Reset input `port` to its default value and mark it unset
    pub fn clear_input(&mut self, port: PortRef) -> Result<()> {
        self.require_mut(port.node)?
            .ports_mut()
            .input_port_mut(port.index)?
            .clear();
        Ok(())
    }

    /// Run a node's update and deliver whatever it wrote to its outputs
    pub fn update(&mut self, node_id: NodeId) -> Result<()> {
        self.require_mut(node_id)?.update()?;
        self.flush(node_id)
    }

    /// Run one subtask of a node and deliver its outputs
    pub fn run_subtask(&mut self, node_id: NodeId, index: usize) -> Result<()> {
        self.require_mut(node_id)?.run_subtask(index)?;
        self.flush(node_id)
    }

    /// Deliver pending output values of a node and run the cascade
    pub fn flush(&mut self, node_id: NodeId) -> Result<()> {
        let mut stack = Vec::new();
        self.collect_pending(node_id, &mut stack)?;
        self.propagate(stack)
    }

    fn notify_and_propagate(&mut self, port: PortRef) -> Result<()> {
        self.require_mut(port.node)?.notify(port.index)?;
        self.flush(port.node)
    }

    /// Move pending output values of `node_id` onto the work stack so that
    /// the first link of the first output is delivered first.
    fn collect_pending(&mut self, node_id: NodeId, stack: &mut Vec<Delivery>) -> Result<()> {
        let node = self.require_mut(node_id)?;
        let mut deliveries = Vec::new();
        for output in node.ports_mut().outputs_mut() {
            let Some(value) = output.take_pending() else {
                continue;
            };
            for target in output.links() {
                deliveries.push(Delivery {
                    target: *target,
                    value: value.clone(),
                });
            }
        }
        stack.extend(deliveries.into_iter().rev());
        Ok(())
    }

    fn propagate(&mut self, mut stack: Vec<Delivery>) -> Result<()> {
        let converters = Arc::clone(&self.converters);
        while let Some(Delivery { target, value }) = stack.pop() {
            let node = self.require_mut(target.node)?;
            let accepted = node
                .ports_mut()
                .input_port_mut(target.index)?
                .set_convert(value, &converters)?;
            if !accepted {
                tracing::warn!(
                    "Dropped wildcard value on {:?}: no conversion to the input type",
                    target
                );
                continue;
            }
            tracing::trace!("Delivered value to {:?}", target);
            node.notify(target.index)?;
            self.collect_pending(target.node, &mut stack)?;
        }
        Ok(())
    }

    fn require(&self, node_id: NodeId) -> Result<&dyn Node> {
        self.node(node_id)
            .ok_or_else(|| GraphError::out_of_range(format!("Node not found: {node_id:?}")))
    }

    fn require_mut(&mut self, node_id: NodeId) -> Result<&mut dyn Node> {
        self.node_mut(node_id)
            .ok_or_else(|| GraphError::out_of_range(format!("Node not found: {node_id:?}")))
    }
}

impl Default for NodeGraph {
    fn default() -> Self {
        Self::new(Arc::new(ConverterRegistry::with_builtins()))
    }
}

impl fmt::Debug for NodeGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeGraph")
            .field("nodes", &self.nodes.len())
            .field("links", &self.links().len())
            .finish()
    }
}
