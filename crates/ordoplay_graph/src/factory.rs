// SPDX-License-Identifier: MIT OR Apache-2.0
//! Registry of node classes available to graph files.

use crate::error::{GraphError, Result};
use crate::node::{Node, NodeClass};
use crate::value::TypeTag;
use indexmap::IndexMap;
use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;

/// Introspection data of a registered node class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    /// Class name
    pub name: String,
    /// Description
    pub description: String,
    /// Group the class was registered under
    pub group: String,
    /// Input port names, by index
    pub input_names: Vec<String>,
    /// Input port types, by index
    pub input_types: Vec<TypeTag>,
    /// Output port names, by index
    pub output_names: Vec<String>,
    /// Output port types, by index
    pub output_types: Vec<TypeTag>,
}

impl NodeInfo {
    /// `"group/name"`, or just `"name"` without a group
    pub fn full_name(&self) -> String {
        full_name(&self.group, &self.name)
    }
}

type CreateFn = fn() -> Box<dyn Node>;

struct Registration {
    create: CreateFn,
    info: NodeInfo,
}

fn create_boxed<T: NodeClass>() -> Box<dyn Node> {
    Box::new(T::default())
}

fn full_name(group: &str, name: &str) -> String {
    if group.is_empty() {
        name.to_string()
    } else {
        format!("{group}/{name}")
    }
}

/// Split `"Name:Description"` on the first colon
fn split_info(info: &str) -> (&str, &str) {
    match info.split_once(':') {
        Some((name, description)) => (name.trim(), description.trim()),
        None => (info.trim(), ""),
    }
}

/// Maps class names to constructors and metadata.
///
/// Registration is explicit: an application creates one factory at startup
/// and registers the classes it needs (see [`crate::register_nodes!`]).
#[derive(Default)]
pub struct NodeFactory {
    classes: IndexMap<String, Registration>,
    names_by_type: HashMap<TypeId, String>,
}

impl NodeFactory {
    /// Create an empty factory
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T` under `group`.
    ///
    /// Returns `false` if the name is empty, contains a `/`, or the
    /// `group/name` key is already taken; the first registration wins.
    pub fn register<T: NodeClass>(&mut self, group: &str) -> bool {
        let (name, description) = split_info(T::INFO);
        if name.is_empty() || name.contains('/') {
            tracing::warn!("Refusing to register node class with name {:?}", name);
            return false;
        }
        let key = full_name(group, name);
        if self.classes.contains_key(&key) {
            tracing::warn!("Node class {} is already registered", key);
            return false;
        }

        let prototype = T::default();
        let ports = prototype.ports();
        let info = NodeInfo {
            name: name.to_string(),
            description: description.to_string(),
            group: group.to_string(),
            input_names: ports.inputs().iter().map(|p| p.name().to_string()).collect(),
            input_types: ports.inputs().iter().map(|p| p.port_type()).collect(),
            output_names: ports.outputs().iter().map(|p| p.name().to_string()).collect(),
            output_types: ports.outputs().iter().map(|p| p.port_type()).collect(),
        };

        self.names_by_type
            .entry(TypeId::of::<T>())
            .or_insert_with(|| key.clone());
        self.classes.insert(
            key.clone(),
            Registration {
                create: create_boxed::<T>,
                info,
            },
        );
        tracing::debug!("Registered node class {}", key);
        true
    }

    /// Create a node by full name
    pub fn create(&self, name: &str) -> Result<Box<dyn Node>> {
        self.classes
            .get(name)
            .map(|registration| (registration.create)())
            .ok_or_else(|| GraphError::invalid_argument(format!("Unknown node class: {name}")))
    }

    /// Metadata of a class, if registered
    pub fn info(&self, name: &str) -> Option<&NodeInfo> {
        self.classes.get(name).map(|registration| &registration.info)
    }

    /// Snapshot of every registered class, in registration order
    pub fn enumerate(&self) -> Vec<NodeInfo> {
        self.classes
            .values()
            .map(|registration| registration.info.clone())
            .collect()
    }

    /// Full name of the class with the given [`TypeId`]
    pub fn full_name(&self, class: TypeId) -> Result<&str> {
        self.names_by_type
            .get(&class)
            .map(String::as_str)
            .ok_or_else(|| GraphError::out_of_range("Node class is not registered"))
    }

    /// Full name of the class of `node`
    pub fn full_name_of(&self, node: &dyn Node) -> Result<&str> {
        self.full_name(node.class_id())
    }

    /// Number of registered classes
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Whether no class is registered
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl fmt::Debug for NodeFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeFactory")
            .field("classes", &self.classes.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Register node classes under a group, in order.
///
/// ```ignore
/// register_nodes!(factory, "Float" => [Add<f32>, Subtract<f32>]);
/// ```
#[macro_export]
macro_rules! register_nodes {
    ($factory:expr, $group:expr => [$($class:ty),* $(,)?]) => {{
        let factory: &mut $crate::NodeFactory = &mut $factory;
        let mut registered = 0usize;
        $(
            if factory.register::<$class>($group) {
                registered += 1;
            }
        )*
        registered
    }};
}
