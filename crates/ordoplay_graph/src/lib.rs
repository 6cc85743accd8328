// SPDX-License-Identifier: MIT OR Apache-2.0
//! Typed dataflow node graph engine for `OrdoPlay`.
//!
//! This crate provides the graph core shared by the render pipeline and
//! visual scripting:
//! - Nodes with typed input/output ports, addressed by index
//! - Links with automatic value conversion between port types
//! - A synchronous notify cascade when values arrive on inputs
//! - A class factory and JSON graph files
//! - Dependency and task graphs for schedulers
//!
//! ## Architecture
//!
//! Nodes live in a [`NodeGraph`] arena and refer to each other through
//! [`PortRef`]s. A [`Pipeline`] derives the dependency graph from the links
//! and expands per-node subtasks into one task graph. An [`EngineContext`]
//! owns the [`NodeFactory`] and [`ConverterRegistry`] every graph uses.
//!
//! ```ignore
//! let context = EngineContext::with_builtin_nodes();
//! let mut graph = context.new_graph();
//! let add = graph.add_node(context.factory().create("Float/Add")?);
//! graph.set_input(PortRef::new(add, 0), 2.0f32)?;
//! ```

pub mod context;
pub mod convert;
pub mod dag;
pub mod error;
pub mod event;
pub mod factory;
pub mod graph;
pub mod node;
pub mod nodes;
pub mod parser;
pub mod pipeline;
pub mod port;
pub mod value;

pub use context::EngineContext;
pub use convert::ConverterRegistry;
pub use dag::{CycleError, DirectedGraph};
pub use error::{GraphError, Result};
pub use event::{Event, SubscriptionId};
pub use factory::{NodeFactory, NodeInfo};
pub use graph::NodeGraph;
pub use node::{Node, NodeClass, NodeId, Ports, Subtask};
pub use parser::{GraphHeader, GraphParser, LinkDescription, NodeDescription, NodeMetadata};
pub use pipeline::{Pipeline, Task, TaskKind};
pub use port::{InputPort, OutputPort, PortRef, PortState};
pub use value::{Any, DynamicTuple, TypeTag};
