// SPDX-License-Identifier: MIT OR Apache-2.0
//! Type-erased values flowing through ports.
//!
//! [`Any`] owns at most one value of an arbitrary cloneable type and keeps
//! the "empty", "wrong type" and "right type" cases apart. [`DynamicTuple`]
//! maps each type to at most one value and carries engine environment data.

use crate::error::{GraphError, Result};
use std::any::{Any as StdAny, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Runtime type tag of a port or value
#[derive(Clone, Copy)]
pub struct TypeTag {
    id: TypeId,
    name: &'static str,
}

impl TypeTag {
    /// Tag of the type `T`
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Tag of the wildcard type, which links to anything
    pub fn wildcard() -> Self {
        Self::of::<Any>()
    }

    /// The underlying [`TypeId`]
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Fully qualified type name, for diagnostics only
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether this tag describes `T`
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }

    /// Whether this is the wildcard tag
    pub fn is_wildcard(&self) -> bool {
        self.is::<Any>()
    }
}

impl PartialEq for TypeTag {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeTag {}

impl Hash for TypeTag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeTag({})", self.name)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Object-safe view of a boxed value.
trait ErasedValue: StdAny {
    fn clone_box(&self) -> Box<dyn ErasedValue>;
    fn type_tag(&self) -> TypeTag;
    fn as_std(&self) -> &dyn StdAny;
    fn as_std_mut(&mut self) -> &mut dyn StdAny;
    fn into_std(self: Box<Self>) -> Box<dyn StdAny>;
}

impl<T: Clone + 'static> ErasedValue for T {
    fn clone_box(&self) -> Box<dyn ErasedValue> {
        Box::new(self.clone())
    }

    fn type_tag(&self) -> TypeTag {
        TypeTag::of::<T>()
    }

    fn as_std(&self) -> &dyn StdAny {
        self
    }

    fn as_std_mut(&mut self) -> &mut dyn StdAny {
        self
    }

    fn into_std(self: Box<Self>) -> Box<dyn StdAny> {
        self
    }
}

/// Container owning exactly one value of any cloneable type, or nothing.
#[derive(Default)]
pub struct Any {
    value: Option<Box<dyn ErasedValue>>,
}

impl Any {
    /// Box `value`
    pub fn new<T: Clone + 'static>(value: T) -> Self {
        Self {
            value: Some(Box::new(value)),
        }
    }

    /// An empty container
    pub fn empty() -> Self {
        Self { value: None }
    }

    /// Whether no value is held
    pub fn is_empty(&self) -> bool {
        self.value.is_none()
    }

    /// Type of the held value, `None` when empty
    pub fn type_tag(&self) -> Option<TypeTag> {
        self.value.as_deref().map(ErasedValue::type_tag)
    }

    /// Whether a value of type `T` is held
    pub fn is<T: 'static>(&self) -> bool {
        self.type_tag().is_some_and(|tag| tag.is::<T>())
    }

    /// Borrow the held value as `T`
    pub fn get<T: 'static>(&self) -> Result<&T> {
        let value = self
            .value
            .as_deref()
            .ok_or_else(|| GraphError::invalid_state("Any is empty"))?;
        let tag = value.type_tag();
        value.as_std().downcast_ref::<T>().ok_or_else(|| {
            GraphError::invalid_cast(format!(
                "Any holds {} but {} was requested",
                tag,
                std::any::type_name::<T>()
            ))
        })
    }

    /// Mutably borrow the held value as `T`
    pub fn get_mut<T: 'static>(&mut self) -> Result<&mut T> {
        let value = self
            .value
            .as_deref_mut()
            .ok_or_else(|| GraphError::invalid_state("Any is empty"))?;
        let tag = value.type_tag();
        value.as_std_mut().downcast_mut::<T>().ok_or_else(|| {
            GraphError::invalid_cast(format!(
                "Any holds {} but {} was requested",
                tag,
                std::any::type_name::<T>()
            ))
        })
    }

    /// Move the held value out as `T`. On failure the container is unchanged.
    pub fn into_inner<T: 'static>(self) -> Result<T> {
        self.get::<T>()?;
        let value = self
            .value
            .ok_or_else(|| GraphError::invalid_state("Any is empty"))?;
        value
            .into_std()
            .downcast::<T>()
            .map(|boxed| *boxed)
            .map_err(|_| GraphError::invalid_cast("type changed during move"))
    }

    /// Untyped view of the boxed storage, used by value converters
    pub fn raw(&self) -> Result<&dyn StdAny> {
        self.value
            .as_deref()
            .map(ErasedValue::as_std)
            .ok_or_else(|| GraphError::invalid_state("Any is empty"))
    }

    /// Move the value out, leaving this container empty
    pub fn take(&mut self) -> Any {
        Any {
            value: self.value.take(),
        }
    }

    /// Drop the held value
    pub fn reset(&mut self) {
        self.value = None;
    }
}

impl Clone for Any {
    fn clone(&self) -> Self {
        Self {
            value: self.value.as_ref().map(|value| (**value).clone_box()),
        }
    }
}

impl fmt::Debug for Any {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.type_tag() {
            Some(tag) => write!(f, "Any({tag})"),
            None => f.write_str("Any(<empty>)"),
        }
    }
}

/// Heterogeneous map holding at most one value per type.
#[derive(Debug, Clone, Default)]
pub struct DynamicTuple {
    values: HashMap<TypeId, Any>,
}

impl DynamicTuple {
    /// Create an empty tuple
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value. Fails if a value of type `T` is already present.
    pub fn insert<T: Clone + 'static>(&mut self, value: T) -> Result<()> {
        let id = TypeId::of::<T>();
        if self.values.contains_key(&id) {
            return Err(GraphError::invalid_argument(format!(
                "DynamicTuple already holds a {}",
                std::any::type_name::<T>()
            )));
        }
        self.values.insert(id, Any::new(value));
        Ok(())
    }

    /// Borrow the value of type `T`
    pub fn get<T: 'static>(&self) -> Result<&T> {
        self.values
            .get(&TypeId::of::<T>())
            .ok_or_else(|| Self::missing::<T>())?
            .get::<T>()
    }

    /// Mutably borrow the value of type `T`
    pub fn get_mut<T: 'static>(&mut self) -> Result<&mut T> {
        self.values
            .get_mut(&TypeId::of::<T>())
            .ok_or_else(|| Self::missing::<T>())?
            .get_mut::<T>()
    }

    /// Whether a value of type `T` is present
    pub fn has<T: 'static>(&self) -> bool {
        self.values.contains_key(&TypeId::of::<T>())
    }

    /// Remove the value of type `T`, if any
    pub fn erase<T: 'static>(&mut self) {
        self.values.remove(&TypeId::of::<T>());
    }

    /// Number of stored values
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the tuple is empty
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn missing<T>() -> GraphError {
        GraphError::out_of_range(format!(
            "DynamicTuple holds no {}",
            std::any::type_name::<T>()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_any_three_way_access() {
        let empty = Any::empty();
        assert!(matches!(empty.get::<i32>(), Err(GraphError::InvalidState(_))));

        let value = Any::new(42_i32);
        assert_eq!(*value.get::<i32>().unwrap(), 42);
        assert!(matches!(value.get::<u32>(), Err(GraphError::InvalidCast(_))));
        assert_eq!(value.type_tag(), Some(TypeTag::of::<i32>()));
    }

    #[test]
    fn test_any_clone_is_deep() {
        let mut original = Any::new(String::from("left"));
        let copy = original.clone();
        original.get_mut::<String>().unwrap().push_str("-changed");

        assert_eq!(copy.get::<String>().unwrap(), "left");
        assert_eq!(original.get::<String>().unwrap(), "left-changed");
    }

    #[test]
    fn test_any_take_leaves_source_empty() {
        let mut source = Any::new(1.5_f32);
        let moved = source.take();
        assert!(source.is_empty());
        assert!(source.raw().is_err());
        assert_eq!(moved.into_inner::<f32>().unwrap(), 1.5);
    }

    #[test]
    fn test_nested_any_is_wildcard() {
        let wrapped = Any::new(Any::new(3_u8));
        assert!(wrapped.type_tag().unwrap().is_wildcard());
        assert_eq!(*wrapped.get::<Any>().unwrap().get::<u8>().unwrap(), 3);
    }

    #[test]
    fn test_dynamic_tuple() {
        let mut tuple = DynamicTuple::new();
        tuple.insert(7_u32).unwrap();
        tuple.insert(String::from("env")).unwrap();

        assert!(matches!(tuple.insert(8_u32), Err(GraphError::InvalidArgument(_))));
        assert_eq!(*tuple.get::<u32>().unwrap(), 7);
        assert!(tuple.has::<String>());
        assert!(matches!(tuple.get::<f64>(), Err(GraphError::OutOfRange(_))));

        *tuple.get_mut::<u32>().unwrap() += 1;
        assert_eq!(*tuple.get::<u32>().unwrap(), 8);

        tuple.erase::<u32>();
        tuple.erase::<u32>();
        assert!(!tuple.has::<u32>());
        assert_eq!(tuple.len(), 1);
    }
}
