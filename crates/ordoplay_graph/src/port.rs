// SPDX-License-Identifier: MIT OR Apache-2.0
//! Port definitions for node inputs/outputs.
//!
//! Ports are owned by their node. Links are non-owning [`PortRef`]s kept in
//! sync on both ends by [`crate::NodeGraph`]; an input has at most one
//! upstream link while an output fans out to any number of inputs.

use crate::convert::ConverterRegistry;
use crate::error::{GraphError, Result};
use crate::node::NodeId;
use crate::value::{Any, TypeTag};
use serde::{Deserialize, Serialize};

/// Reference to a port: owning node plus 0-based port index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortRef {
    /// Node owning the port
    pub node: NodeId,
    /// Index within the node's inputs or outputs
    pub index: usize,
}

impl PortRef {
    /// Create a port reference
    pub fn new(node: NodeId, index: usize) -> Self {
        Self { node, index }
    }
}

/// Observable state of an input port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortState {
    /// No link and no value
    UnlinkedUnset,
    /// Linked to an output; values arrive through the link
    Linked,
    /// No link, but a value (usually a literal default) was pushed manually
    UnlinkedSet,
}

fn default_any<T: Clone + Default + 'static>() -> Any {
    Any::new(T::default())
}

/// Typed input endpoint.
///
/// The stored value always has the declared type. Wildcard inputs are
/// declared with [`Any`] as their type and store the delivered value wrapped
/// in an [`Any`].
#[derive(Debug, Clone)]
pub struct InputPort {
    name: String,
    port_type: TypeTag,
    value: Any,
    is_set: bool,
    link: Option<PortRef>,
    default: fn() -> Any,
}

impl InputPort {
    /// Create an input port of type `T`, holding `T::default()`
    pub fn new<T: Clone + Default + 'static>(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            port_type: TypeTag::of::<T>(),
            value: default_any::<T>(),
            is_set: false,
            link: None,
            default: default_any::<T>,
        }
    }

    /// Port name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared type
    pub fn port_type(&self) -> TypeTag {
        self.port_type
    }

    /// Whether the port accepts any type
    pub fn is_wildcard(&self) -> bool {
        self.port_type.is_wildcard()
    }

    /// Whether a value has arrived since creation or the last [`clear`](Self::clear)
    pub fn is_set(&self) -> bool {
        self.is_set
    }

    /// Upstream output, if linked
    pub fn link(&self) -> Option<PortRef> {
        self.link
    }

    /// Whether the port is linked to an output
    pub fn is_linked(&self) -> bool {
        self.link.is_some()
    }

    /// Current state
    pub fn state(&self) -> PortState {
        match (self.link, self.is_set) {
            (Some(_), _) => PortState::Linked,
            (None, true) => PortState::UnlinkedSet,
            (None, false) => PortState::UnlinkedUnset,
        }
    }

    /// Borrow the current value as `T`.
    ///
    /// Unset ports yield the default-constructed value.
    pub fn get<T: 'static>(&self) -> Result<&T> {
        self.value.get::<T>().map_err(|_| self.type_error::<T>())
    }

    /// Current value, type-erased
    pub fn value(&self) -> &Any {
        &self.value
    }

    /// Store `value` without conversion. `T` must be the declared type, or
    /// the port must be a wildcard.
    ///
    /// Does not notify the owning node; use [`crate::NodeGraph::set_input`]
    /// for that.
    pub fn set<T: Clone + 'static>(&mut self, value: T) -> Result<()> {
        if self.port_type.is::<T>() {
            self.assign(Any::new(value));
        } else if self.is_wildcard() {
            self.assign(Any::new(Any::new(value)));
        } else {
            return Err(self.type_error::<T>());
        }
        Ok(())
    }

    /// Store `value`, converting it to the declared type through `converters`.
    ///
    /// Returns `Ok(false)` if a wildcard value could not be narrowed and was
    /// dropped.
    pub fn set_convert(&mut self, value: Any, converters: &ConverterRegistry) -> Result<bool> {
        match converters.adapt(value, self.port_type)? {
            Some(adapted) => {
                self.assign(adapted);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Reset to the default-constructed value and mark unset
    pub fn clear(&mut self) {
        self.value = (self.default)();
        self.is_set = false;
    }

    pub(crate) fn assign(&mut self, value: Any) {
        debug_assert_eq!(value.type_tag(), Some(self.port_type));
        self.value = value;
        self.is_set = true;
    }

    pub(crate) fn attach(&mut self, source: PortRef) -> bool {
        if self.link.is_some() {
            return false;
        }
        self.link = Some(source);
        true
    }

    pub(crate) fn detach(&mut self) -> Option<PortRef> {
        self.link.take()
    }

    fn type_error<T>(&self) -> GraphError {
        GraphError::invalid_cast(format!(
            "input '{}' has type {} but {} was used",
            self.name,
            self.port_type,
            std::any::type_name::<T>()
        ))
    }
}

/// Typed output endpoint.
///
/// [`set`](Self::set) records a pending value; the owning graph flushes it to
/// every linked input after the node's update returns.
#[derive(Debug, Clone)]
pub struct OutputPort {
    name: String,
    port_type: TypeTag,
    links: Vec<PortRef>,
    pending: Any,
}

impl OutputPort {
    /// Create an output port of type `T`
    pub fn new<T: Clone + 'static>(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            port_type: TypeTag::of::<T>(),
            links: Vec::new(),
            pending: Any::empty(),
        }
    }

    /// Port name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared type
    pub fn port_type(&self) -> TypeTag {
        self.port_type
    }

    /// Whether the port delivers any type
    pub fn is_wildcard(&self) -> bool {
        self.port_type.is_wildcard()
    }

    /// Linked inputs, in link order
    pub fn links(&self) -> &[PortRef] {
        &self.links
    }

    /// Whether at least one input is linked
    pub fn is_linked(&self) -> bool {
        !self.links.is_empty()
    }

    /// Publish `value` to every linked input. `T` must be the declared type,
    /// or the port must be a wildcard.
    pub fn set<T: Clone + 'static>(&mut self, value: T) -> Result<()> {
        if self.port_type.is::<T>() {
            self.pending = Any::new(value);
        } else if self.is_wildcard() {
            self.pending = Any::new(Any::new(value));
        } else {
            return Err(GraphError::invalid_cast(format!(
                "output '{}' has type {} but {} was used",
                self.name,
                self.port_type,
                std::any::type_name::<T>()
            )));
        }
        Ok(())
    }

    /// Whether a value is waiting to be delivered
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub(crate) fn take_pending(&mut self) -> Option<Any> {
        let value = self.pending.take();
        (!value.is_empty()).then_some(value)
    }

    pub(crate) fn attach(&mut self, destination: PortRef) {
        if !self.links.contains(&destination) {
            self.links.push(destination);
        }
    }

    pub(crate) fn detach(&mut self, destination: PortRef) -> bool {
        let before = self.links.len();
        self.links.retain(|link| *link != destination);
        self.links.len() != before
    }

    pub(crate) fn detach_all(&mut self) -> Vec<PortRef> {
        std::mem::take(&mut self.links)
    }
}
