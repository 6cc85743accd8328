// SPDX-License-Identifier: MIT OR Apache-2.0
//! Value conversion between mismatched port types.
//!
//! A [`ConverterRegistry`] is keyed by destination type, then by source type.
//! Links between ports of different concrete types are only accepted when a
//! converter exists, and the converter runs each time a value crosses the link.

use crate::error::{GraphError, Result};
use crate::value::{Any, TypeTag};
use std::any::{Any as StdAny, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Type-erased conversion function
pub type ConvertFn = Arc<dyn Fn(&dyn StdAny) -> Result<Any> + Send + Sync>;

/// Registry of conversion functions between port types.
#[derive(Clone, Default)]
pub struct ConverterRegistry {
    by_destination: HashMap<TypeId, HashMap<TypeId, ConvertFn>>,
}

impl ConverterRegistry {
    /// Create a registry without any converters
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the arithmetic, vector and string converters
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_builtins();
        registry
    }

    /// Register a conversion from `S` to `D`, replacing any previous one
    pub fn register<S, D>(&mut self, convert: impl Fn(&S) -> Result<D> + Send + Sync + 'static)
    where
        S: 'static,
        D: Clone + 'static,
    {
        let erased: ConvertFn = Arc::new(move |raw: &dyn StdAny| {
            let source = raw.downcast_ref::<S>().ok_or_else(|| {
                GraphError::invalid_cast(format!(
                    "converter expected {}",
                    std::any::type_name::<S>()
                ))
            })?;
            convert(source).map(Any::new)
        });
        self.by_destination
            .entry(TypeId::of::<D>())
            .or_default()
            .insert(TypeId::of::<S>(), erased);
    }

    /// Whether a converter from `source` to `destination` exists
    pub fn has(&self, source: TypeTag, destination: TypeTag) -> bool {
        self.lookup(source, destination).is_some()
    }

    /// Whether a link from a `source` output to a `destination` input is allowed
    pub fn can_link(&self, source: TypeTag, destination: TypeTag) -> bool {
        source == destination
            || source.is_wildcard()
            || destination.is_wildcard()
            || self.has(source, destination)
    }

    /// Convert `value` to `destination`.
    ///
    /// Fails with `OutOfRange` when no converter is registered for the pair.
    pub fn convert(&self, value: &Any, destination: TypeTag) -> Result<Any> {
        let source = value
            .type_tag()
            .ok_or_else(|| GraphError::invalid_state("cannot convert an empty value"))?;
        if source == destination {
            return Ok(value.clone());
        }
        let convert = self.lookup(source, destination).ok_or_else(|| {
            GraphError::out_of_range(format!("no converter from {source} to {destination}"))
        })?;
        convert(value.raw()?)
    }

    /// Convert `value` to `D`
    pub fn convert_to<D: Clone + 'static>(&self, value: &Any) -> Result<D> {
        self.convert(value, TypeTag::of::<D>())?.into_inner::<D>()
    }

    /// Render `value` as a string literal.
    ///
    /// Fails with `InvalidCall` for empty or wildcard values and for types
    /// without a string converter.
    pub fn to_string(&self, value: &Any) -> Result<String> {
        let source = value
            .type_tag()
            .ok_or_else(|| GraphError::invalid_call("cannot stringify an empty value"))?;
        if source.is_wildcard() {
            return Err(GraphError::invalid_call("cannot stringify a wildcard value"));
        }
        if source.is::<String>() {
            return value.get::<String>().cloned();
        }
        let destination = TypeTag::of::<String>();
        let convert = self.lookup(source, destination).ok_or_else(|| {
            GraphError::invalid_call(format!("{source} cannot be converted to a string"))
        })?;
        convert(value.raw()?)?.into_inner::<String>()
    }

    /// Adapt a value delivered from a port to the type of a receiving port.
    ///
    /// Returns `Ok(None)` when a wildcard value cannot be narrowed to the
    /// destination type; such deliveries are dropped.
    pub fn adapt(&self, value: Any, destination: TypeTag) -> Result<Option<Any>> {
        let source = value
            .type_tag()
            .ok_or_else(|| GraphError::invalid_state("cannot deliver an empty value"))?;
        if source == destination {
            return Ok(Some(value));
        }
        if destination.is_wildcard() {
            return Ok(Some(Any::new(value)));
        }
        if source.is_wildcard() {
            let inner = value.into_inner::<Any>()?;
            return match inner.type_tag() {
                Some(tag) if tag == destination => Ok(Some(inner)),
                Some(tag) if self.has(tag, destination) => self.convert(&inner, destination).map(Some),
                _ => Ok(None),
            };
        }
        self.convert(&value, destination).map(Some)
    }

    /// Number of registered converters
    pub fn len(&self) -> usize {
        self.by_destination.values().map(HashMap::len).sum()
    }

    /// Whether no converters are registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup(&self, source: TypeTag, destination: TypeTag) -> Option<&ConvertFn> {
        self.by_destination
            .get(&destination.id())
            .and_then(|sources| sources.get(&source.id()))
    }

    fn register_builtins(&mut self) {
        macro_rules! numeric_casts {
            ($registry:ident; $($src:ty),*) => {
                $( numeric_casts!(@from $registry, $src; i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64); )*
            };
            (@from $registry:ident, $src:ty; $($dst:ty),*) => {
                $( $registry.register::<$src, $dst>(|value| Ok(*value as $dst)); )*
            };
        }

        macro_rules! scalar_strings {
            ($registry:ident; $($ty:ty),*) => {
                $(
                    $registry.register::<String, $ty>(|text| parse_scalar::<$ty>(text));
                    $registry.register::<$ty, String>(|value| Ok(value.to_string()));
                    $registry.register::<$ty, bool>(|value| Ok(*value != <$ty>::default()));
                    $registry.register::<bool, $ty>(|value| Ok(u8::from(*value) as $ty));
                )*
            };
        }

        macro_rules! vector_casts {
            ($registry:ident, $n:literal; $($src:ty),*) => {
                $( vector_casts!(@from $registry, $n, $src; f32, f64, i32, u32); )*
                $(
                    $registry.register::<String, [$src; $n]>(|text| parse_vector::<$src, $n>(text));
                    $registry.register::<[$src; $n], String>(|value| Ok(format_vector(value)));
                )*
            };
            (@from $registry:ident, $n:literal, $src:ty; $($dst:ty),*) => {
                $( $registry.register::<[$src; $n], [$dst; $n]>(|value| Ok((*value).map(|c| c as $dst))); )*
            };
        }

        let registry = self;
        numeric_casts!(registry; i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);
        scalar_strings!(registry; i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);
        registry.register::<String, bool>(|text| parse_bool(text));
        registry.register::<bool, String>(|value| Ok(value.to_string()));
        vector_casts!(registry, 2; f32, f64, i32, u32);
        vector_casts!(registry, 3; f32, f64, i32, u32);
        vector_casts!(registry, 4; f32, f64, i32, u32);
    }
}

impl fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterRegistry")
            .field("converters", &self.len())
            .finish()
    }
}

/// Parse a whole string as `T`; surrounding whitespace and trailing
/// characters are an error.
fn parse_scalar<T: FromStr>(text: &str) -> Result<T> {
    if text.is_empty() {
        return Err(GraphError::invalid_cast(format!(
            "empty string is not a valid {}",
            std::any::type_name::<T>()
        )));
    }
    text.parse::<T>().map_err(|_| {
        GraphError::invalid_cast(format!(
            "'{text}' is not a valid {}",
            std::any::type_name::<T>()
        ))
    })
}

fn parse_bool(text: &str) -> Result<bool> {
    match text {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        "" => Err(GraphError::invalid_cast("empty string is not a valid bool")),
        _ => Err(GraphError::invalid_cast(format!("'{text}' is not a valid bool"))),
    }
}

/// Parse `"[1, 2, 3]"` (brackets optional) into an `N`-component vector.
fn parse_vector<T: FromStr + Copy + Default, const N: usize>(text: &str) -> Result<[T; N]> {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .unwrap_or(trimmed);
    let components: Vec<&str> = body.split(',').collect();
    if components.len() != N {
        return Err(GraphError::invalid_cast(format!(
            "'{text}' does not have {N} components"
        )));
    }
    let mut vector = [T::default(); N];
    for (slot, component) in vector.iter_mut().zip(components) {
        *slot = parse_scalar::<T>(component.trim())?;
    }
    Ok(vector)
}

fn format_vector<T: ToString, const N: usize>(vector: &[T; N]) -> String {
    let components: Vec<String> = vector.iter().map(ToString::to_string).collect();
    format!("[{}]", components.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_to_u32_boundary() {
        let registry = ConverterRegistry::with_builtins();
        let max = registry
            .convert_to::<u32>(&Any::new(String::from("4294967295")))
            .unwrap();
        assert_eq!(max, u32::MAX);
    }

    #[test]
    fn test_malformed_numeric_strings() {
        let registry = ConverterRegistry::with_builtins();
        for text in ["abc", "", "12abc", "  ", "12 ", " 12", "12\n\t"] {
            let value = Any::new(text.to_string());
            assert!(matches!(
                registry.convert_to::<i32>(&value),
                Err(GraphError::InvalidCast(_))
            ));
            assert!(matches!(
                registry.convert_to::<f64>(&value),
                Err(GraphError::InvalidCast(_))
            ));
        }
        assert!(matches!(
            registry.convert_to::<u8>(&Any::new(String::from("256"))),
            Err(GraphError::InvalidCast(_))
        ));
        for text in ["12 ", "12\n\t"] {
            assert!(matches!(
                registry.convert_to::<u32>(&Any::new(text.to_string())),
                Err(GraphError::InvalidCast(_))
            ));
        }
        assert!(matches!(
            registry.convert_to::<bool>(&Any::new(String::from(" true"))),
            Err(GraphError::InvalidCast(_))
        ));
    }

    #[test]
    fn test_cross_width_conversion() {
        let registry = ConverterRegistry::with_builtins();
        assert_eq!(registry.convert_to::<f64>(&Any::new(3_i8)).unwrap(), 3.0);
        assert_eq!(registry.convert_to::<i32>(&Any::new(2.75_f32)).unwrap(), 2);
        assert!(registry.convert_to::<bool>(&Any::new(5_u16)).unwrap());
        assert_eq!(registry.convert_to::<u64>(&Any::new(true)).unwrap(), 1);
    }

    #[test]
    fn test_vector_conversion() {
        let registry = ConverterRegistry::with_builtins();
        let vector = registry
            .convert_to::<[f32; 3]>(&Any::new(String::from("[1, 2.5, -3]")))
            .unwrap();
        assert_eq!(vector, [1.0, 2.5, -3.0]);

        let widened = registry.convert_to::<[i32; 3]>(&Any::new(vector)).unwrap();
        assert_eq!(widened, [1, 2, -3]);

        assert_eq!(registry.to_string(&Any::new([1_u32, 2])).unwrap(), "[1, 2]");
        assert!(!registry.has(TypeTag::of::<[f32; 2]>(), TypeTag::of::<[f32; 3]>()));
        assert!(matches!(
            registry.convert_to::<[f32; 2]>(&Any::new(String::from("[1, 2, 3]"))),
            Err(GraphError::InvalidCast(_))
        ));
    }

    #[test]
    fn test_missing_converter_is_out_of_range() {
        let registry = ConverterRegistry::with_builtins();
        assert!(matches!(
            registry.convert(&Any::new(vec![1_u8]), TypeTag::of::<f32>()),
            Err(GraphError::OutOfRange(_))
        ));
    }

    #[test]
    fn test_to_string_failures() {
        let registry = ConverterRegistry::with_builtins();
        assert_eq!(registry.to_string(&Any::new(2.5_f64)).unwrap(), "2.5");
        assert!(matches!(
            registry.to_string(&Any::new(vec![1_u8])),
            Err(GraphError::InvalidCall(_))
        ));
        assert!(matches!(
            registry.to_string(&Any::new(Any::new(1_i32))),
            Err(GraphError::InvalidCall(_))
        ));
        assert!(matches!(
            registry.to_string(&Any::empty()),
            Err(GraphError::InvalidCall(_))
        ));
    }

    #[test]
    fn test_adapt_wildcards() {
        let registry = ConverterRegistry::with_builtins();

        let wrapped = registry
            .adapt(Any::new(4_i32), TypeTag::wildcard())
            .unwrap()
            .unwrap();
        assert!(wrapped.is::<Any>());

        let narrowed = registry
            .adapt(wrapped.clone(), TypeTag::of::<f32>())
            .unwrap()
            .unwrap();
        assert_eq!(*narrowed.get::<f32>().unwrap(), 4.0);

        let dropped = registry
            .adapt(Any::new(Any::new(vec![0_u8])), TypeTag::of::<f32>())
            .unwrap();
        assert!(dropped.is_none());
    }

    #[test]
    fn test_can_link() {
        let registry = ConverterRegistry::with_builtins();
        let float = TypeTag::of::<f32>();
        let bytes = TypeTag::of::<Vec<u8>>();
        assert!(registry.can_link(float, float));
        assert!(registry.can_link(float, TypeTag::of::<i64>()));
        assert!(registry.can_link(bytes, TypeTag::wildcard()));
        assert!(registry.can_link(TypeTag::wildcard(), bytes));
        assert!(!registry.can_link(float, bytes));
    }
}
