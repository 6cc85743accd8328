// SPDX-License-Identifier: MIT OR Apache-2.0
//! Arithmetic nodes, generic over the scalar type.
//!
//! The binary nodes are combinational: once both inputs hold a value, every
//! notify recomputes the output. Notifications arriving while an input is
//! still unset are ignored. An explicit update reads unset inputs as zero.

use crate::error::{GraphError, Result};
use crate::node::{Node, NodeClass, Ports};
use crate::port::InputPort;
use std::marker::PhantomData;
use std::ops::{Add as AddOp, Mul, Sub};

/// Scalar types the arithmetic nodes operate on
pub trait Scalar:
    Copy + Default + AddOp<Output = Self> + Sub<Output = Self> + Mul<Output = Self> + 'static
{
    /// `a / b`; fails where the type cannot represent the quotient
    fn divide(a: Self, b: Self) -> Result<Self>;
}

macro_rules! float_scalar {
    ($($ty:ty),*) => {
        $(
            impl Scalar for $ty {
                fn divide(a: Self, b: Self) -> Result<Self> {
                    Ok(a / b)
                }
            }
        )*
    };
}

float_scalar!(f32, f64);

impl Scalar for i32 {
    fn divide(a: Self, b: Self) -> Result<Self> {
        a.checked_div(b).ok_or_else(|| {
            if b == 0 {
                GraphError::invalid_argument("integer division by zero")
            } else {
                GraphError::invalid_argument(format!("{a} / {b} overflows"))
            }
        })
    }
}

fn binary_ports<T: Scalar>() -> Ports {
    Ports::new()
        .input::<T>("a")
        .input::<T>("b")
        .output::<T>("result")
}

macro_rules! binary_node {
    ($(#[$meta:meta])* $name:ident, $info:literal, |$a:ident, $b:ident| $body:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        pub struct $name<T> {
            ports: Ports,
            _scalar: PhantomData<T>,
        }

        impl<T: Scalar> Default for $name<T> {
            fn default() -> Self {
                Self {
                    ports: binary_ports::<T>(),
                    _scalar: PhantomData,
                }
            }
        }

        impl<T: Scalar> Node for $name<T> {
            fn ports(&self) -> &Ports {
                &self.ports
            }

            fn ports_mut(&mut self) -> &mut Ports {
                &mut self.ports
            }

            fn update(&mut self) -> Result<()> {
                let $a = *self.ports.get::<T>(0)?;
                let $b = *self.ports.get::<T>(1)?;
                let result: Result<T> = $body;
                self.ports.set(0, result?)
            }

            fn notify(&mut self, _input: usize) -> Result<()> {
                if self.ports.inputs().iter().all(InputPort::is_set) {
                    self.update()
                } else {
                    Ok(())
                }
            }
        }

        impl<T: Scalar> NodeClass for $name<T> {
            const INFO: &'static str = $info;
        }
    };
}

binary_node!(
    /// `result = a + b`
    Add, "Add:Adds the two inputs", |a, b| Ok(a + b)
);

binary_node!(
    /// `result = a - b`
    Subtract, "Subtract:Subtracts the second input from the first", |a, b| Ok(a - b)
);

binary_node!(
    /// `result = a * b`
    Multiply, "Multiply:Multiplies the two inputs", |a, b| Ok(a * b)
);

binary_node!(
    /// `result = a / b`
    Divide, "Divide:Divides the first input by the second", |a, b| T::divide(a, b)
);

/// Forwards its input; the usual way to inject a literal into a graph
#[derive(Debug, Clone)]
pub struct Constant<T> {
    ports: Ports,
    _scalar: PhantomData<T>,
}

impl<T: Scalar> Default for Constant<T> {
    fn default() -> Self {
        Self {
            ports: Ports::new().input::<T>("value").output::<T>("value"),
            _scalar: PhantomData,
        }
    }
}

impl<T: Scalar> Node for Constant<T> {
    fn ports(&self) -> &Ports {
        &self.ports
    }

    fn ports_mut(&mut self) -> &mut Ports {
        &mut self.ports
    }

    fn update(&mut self) -> Result<()> {
        let value = *self.ports.get::<T>(0)?;
        self.ports.set(0, value)
    }

    fn notify(&mut self, _input: usize) -> Result<()> {
        self.update()
    }
}

impl<T: Scalar> NodeClass for Constant<T> {
    const INFO: &'static str = "Constant:Outputs its input value";
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeGraph;
    use crate::port::PortRef;

    #[test]
    fn test_float_arithmetic() {
        let mut graph = NodeGraph::default();
        let sub = graph.insert(Subtract::<f32>::default());
        let div = graph.insert(Divide::<f32>::default());
        graph
            .link(PortRef::new(sub, 0), PortRef::new(div, 0))
            .unwrap();

        graph.set_input(PortRef::new(sub, 0), 9.0f32).unwrap();
        graph.set_input(PortRef::new(sub, 1), 3.0f32).unwrap();
        graph.set_input(PortRef::new(div, 1), 4.0f32).unwrap();
        assert_eq!(*graph.get_input::<f32>(PortRef::new(div, 0)).unwrap(), 6.0);

        let mut node = Divide::<f32>::default();
        node.update().unwrap();
        assert!(node.ports().outputs()[0].has_pending());
    }

    #[test]
    fn test_integer_division_by_zero() {
        let mut node = Divide::<i32>::default();
        node.ports_mut().input_port_mut(0).unwrap().set(7i32).unwrap();
        assert!(matches!(node.update(), Err(GraphError::InvalidArgument(_))));

        node.ports_mut().input_port_mut(1).unwrap().set(2i32).unwrap();
        node.update().unwrap();

        assert!(matches!(i32::divide(i32::MIN, -1), Err(GraphError::InvalidArgument(_))));
        assert_eq!(i32::divide(7, 2).unwrap(), 3);
    }

    #[test]
    fn test_integer_division_waits_for_both_inputs() {
        let mut graph = NodeGraph::default();
        let a = graph.insert(Constant::<i32>::default());
        let b = graph.insert(Constant::<i32>::default());
        let quotient = graph.insert(Divide::<i32>::default());
        let sink = graph.insert(Constant::<i32>::default());
        graph.link(PortRef::new(a, 0), PortRef::new(quotient, 0)).unwrap();
        graph.link(PortRef::new(b, 0), PortRef::new(quotient, 1)).unwrap();
        graph.link(PortRef::new(quotient, 0), PortRef::new(sink, 0)).unwrap();

        // the divisor is still unset when the dividend arrives
        graph.set_input(PortRef::new(a, 0), 6i32).unwrap();
        assert!(!graph.input_port(PortRef::new(sink, 0)).unwrap().is_set());

        graph.set_input(PortRef::new(b, 0), 3i32).unwrap();
        assert_eq!(*graph.get_input::<i32>(PortRef::new(sink, 0)).unwrap(), 2);

        graph.set_input(PortRef::new(a, 0), 12i32).unwrap();
        assert_eq!(*graph.get_input::<i32>(PortRef::new(sink, 0)).unwrap(), 4);
    }

    #[test]
    fn test_constant_forwards_to_downstream() {
        let mut graph = NodeGraph::default();
        let constant = graph.insert(Constant::<f64>::default());
        let mul = graph.insert(Multiply::<f64>::default());
        graph
            .link(PortRef::new(constant, 0), PortRef::new(mul, 0))
            .unwrap();
        graph
            .link(PortRef::new(constant, 0), PortRef::new(mul, 1))
            .unwrap();

        graph.set_input(PortRef::new(constant, 0), 1.5f64).unwrap();
        assert_eq!(*graph.get_input::<f64>(PortRef::new(mul, 0)).unwrap(), 1.5);
        assert_eq!(*graph.get_input::<f64>(PortRef::new(mul, 1)).unwrap(), 1.5);
    }
}
