// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions for the graph framework.
//!
//! A node is a bag of typed ports plus an update/notify contract. Ports are
//! stored in two ordered sequences inside [`Ports`], so every node exposes the
//! same index-based interface whatever its concrete port types are.

use crate::dag::DirectedGraph;
use crate::error::{GraphError, Result};
use crate::port::{InputPort, OutputPort};
use serde::{Deserialize, Serialize};
use std::any::{Any as StdAny, TypeId};
use uuid::Uuid;

/// Unique identifier for a node instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Create a new random node ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

/// Input and output ports of a node
#[derive(Debug, Clone, Default)]
pub struct Ports {
    inputs: Vec<InputPort>,
    outputs: Vec<OutputPort>,
}

impl Ports {
    /// Create an empty port set
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an input port of type `T`
    pub fn input<T: Clone + Default + 'static>(mut self, name: impl Into<String>) -> Self {
        self.inputs.push(InputPort::new::<T>(name));
        self
    }

    /// Append an output port of type `T`
    pub fn output<T: Clone + 'static>(mut self, name: impl Into<String>) -> Self {
        self.outputs.push(OutputPort::new::<T>(name));
        self
    }

    /// Number of input ports
    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    /// Number of output ports
    pub fn output_count(&self) -> usize {
        self.outputs.len()
    }

    /// Input port by index
    pub fn input_port(&self, index: usize) -> Result<&InputPort> {
        self.inputs
            .get(index)
            .ok_or_else(|| GraphError::out_of_range(format!("no input port {index}")))
    }

    /// Mutable input port by index
    pub fn input_port_mut(&mut self, index: usize) -> Result<&mut InputPort> {
        self.inputs
            .get_mut(index)
            .ok_or_else(|| GraphError::out_of_range(format!("no input port {index}")))
    }

    /// Output port by index
    pub fn output_port(&self, index: usize) -> Result<&OutputPort> {
        self.outputs
            .get(index)
            .ok_or_else(|| GraphError::out_of_range(format!("no output port {index}")))
    }

    /// Mutable output port by index
    pub fn output_port_mut(&mut self, index: usize) -> Result<&mut OutputPort> {
        self.outputs
            .get_mut(index)
            .ok_or_else(|| GraphError::out_of_range(format!("no output port {index}")))
    }

    /// All input ports
    pub fn inputs(&self) -> &[InputPort] {
        &self.inputs
    }

    /// All output ports
    pub fn outputs(&self) -> &[OutputPort] {
        &self.outputs
    }

    pub(crate) fn inputs_mut(&mut self) -> &mut [InputPort] {
        &mut self.inputs
    }

    pub(crate) fn outputs_mut(&mut self) -> &mut [OutputPort] {
        &mut self.outputs
    }

    /// Read input `index` as `T`
    pub fn get<T: 'static>(&self, index: usize) -> Result<&T> {
        self.input_port(index)?.get::<T>()
    }

    /// Write output `index` as `T`
    pub fn set<T: Clone + 'static>(&mut self, index: usize, value: T) -> Result<()> {
        self.output_port_mut(index)?.set(value)
    }

    /// Index of the input named `name`
    pub fn find_input(&self, name: &str) -> Option<usize> {
        self.inputs.iter().position(|port| port.name() == name)
    }

    /// Index of the output named `name`
    pub fn find_output(&self, name: &str) -> Option<usize> {
        self.outputs.iter().position(|port| port.name() == name)
    }
}

/// One step of a node's internal task graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtask {
    /// Step name, for diagnostics and schedulers
    pub name: String,
}

impl Subtask {
    /// Create a named subtask
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Upcast helper so `dyn Node` can be downcast to its concrete class.
pub trait AsAny: StdAny {
    /// `self` as [`std::any::Any`]
    fn as_any(&self) -> &dyn StdAny;
    /// `self` as mutable [`std::any::Any`]
    fn as_any_mut(&mut self) -> &mut dyn StdAny;
}

impl<T: StdAny> AsAny for T {
    fn as_any(&self) -> &dyn StdAny {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn StdAny {
        self
    }
}

/// Unit of computation with typed ports.
pub trait Node: AsAny + 'static {
    /// The node's ports
    fn ports(&self) -> &Ports;

    /// The node's ports, mutably
    fn ports_mut(&mut self) -> &mut Ports;

    /// Read inputs and write outputs
    fn update(&mut self) -> Result<()>;

    /// Called after a value arrived on input `input`.
    ///
    /// The default does nothing: the node waits for a scheduler to call
    /// [`update`](Self::update). Combinational nodes update here.
    fn notify(&mut self, input: usize) -> Result<()> {
        let _ = input;
        Ok(())
    }

    /// Internal task graph of a graphics node; `None` runs the node as a
    /// single task.
    fn subtasks(&self) -> Option<DirectedGraph<Subtask>> {
        None
    }

    /// Execute subtask `index` of [`subtasks`](Self::subtasks)
    fn run_subtask(&mut self, index: usize) -> Result<()> {
        let _ = index;
        self.update()
    }
}

impl dyn Node {
    /// [`TypeId`] of the concrete node class
    pub fn class_id(&self) -> TypeId {
        self.as_any().type_id()
    }

    /// Downcast to the concrete class
    pub fn downcast_ref<T: Node>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Mutably downcast to the concrete class
    pub fn downcast_mut<T: Node>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }

    /// Input port by index
    pub fn input(&self, index: usize) -> Result<&InputPort> {
        self.ports().input_port(index)
    }

    /// Output port by index
    pub fn output(&self, index: usize) -> Result<&OutputPort> {
        self.ports().output_port(index)
    }
}

/// A node type that can be registered with [`crate::NodeFactory`].
pub trait NodeClass: Node + Default {
    /// `"Name:Description"`; the name ends at the first colon
    const INFO: &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Probe {
        ports: Ports,
        updates: usize,
    }

    impl Node for Probe {
        fn ports(&self) -> &Ports {
            &self.ports
        }

        fn ports_mut(&mut self) -> &mut Ports {
            &mut self.ports
        }

        fn update(&mut self) -> Result<()> {
            self.updates += 1;
            Ok(())
        }
    }

    #[test]
    fn test_ports_index_access() {
        let ports = Ports::new()
            .input::<f32>("a")
            .input::<String>("label")
            .output::<f32>("out");

        assert_eq!(ports.input_count(), 2);
        assert_eq!(ports.output_count(), 1);
        assert_eq!(ports.find_input("label"), Some(1));
        assert_eq!(ports.find_output("missing"), None);
        assert!(matches!(ports.input_port(2), Err(GraphError::OutOfRange(_))));
        assert!(matches!(ports.get::<String>(0), Err(GraphError::InvalidCast(_))));
    }

    #[test]
    fn test_dyn_node_downcast() {
        let mut node: Box<dyn Node> = Box::new(Probe::default());
        assert_eq!(node.class_id(), TypeId::of::<Probe>());

        node.run_subtask(0).unwrap();
        node.notify(0).unwrap();
        assert_eq!(node.downcast_ref::<Probe>().unwrap().updates, 1);
        assert!(node.subtasks().is_none());
    }
}
