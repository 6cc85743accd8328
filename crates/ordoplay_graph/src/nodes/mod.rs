// SPDX-License-Identifier: MIT OR Apache-2.0
//! Built-in node classes.

pub mod math;
pub mod util;

pub use math::{Add, Constant, Divide, Multiply, Scalar, Subtract};
pub use util::{Relay, WaitAll};

use crate::factory::NodeFactory;

/// Register every built-in class with `factory`; returns how many were added
pub fn register_builtin_nodes(factory: &mut NodeFactory) -> usize {
    let mut registered = 0;

    // ========================================================================
    // Arithmetic
    // ========================================================================

    registered += crate::register_nodes!(*factory, "Float" => [
        Add<f32>, Subtract<f32>, Multiply<f32>, Divide<f32>, Constant<f32>,
    ]);
    registered += crate::register_nodes!(*factory, "Double" => [
        Add<f64>, Subtract<f64>, Multiply<f64>, Divide<f64>, Constant<f64>,
    ]);
    registered += crate::register_nodes!(*factory, "Int" => [
        Add<i32>, Subtract<i32>, Multiply<i32>, Divide<i32>, Constant<i32>,
    ]);

    // ========================================================================
    // Utility
    // ========================================================================

    registered += crate::register_nodes!(*factory, "Utility" => [Relay, WaitAll]);

    tracing::debug!("Registered {} built-in node classes", registered);
    registered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry() {
        let mut factory = NodeFactory::new();
        assert_eq!(register_builtin_nodes(&mut factory), 17);
        assert_eq!(register_builtin_nodes(&mut factory), 0);

        let info = factory.info("Int/Divide").unwrap();
        assert_eq!(info.input_names, vec!["a", "b"]);
        assert_eq!(info.output_names, vec!["result"]);

        let relay = factory.info("Utility/Relay").unwrap();
        assert!(relay.input_types[0].is_wildcard());

        let wait = factory.create("Utility/WaitAll").unwrap();
        assert_eq!(wait.ports().input_count(), 3);
        assert_eq!(factory.full_name_of(wait.as_ref()).unwrap(), "Utility/WaitAll");
    }
}
