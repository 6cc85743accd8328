// SPDX-License-Identifier: MIT OR Apache-2.0
//! Routing and synchronisation nodes.

use crate::error::Result;
use crate::node::{Node, NodeClass, Ports};
use crate::value::Any;

/// Passes any value through unchanged
#[derive(Debug, Clone)]
pub struct Relay {
    ports: Ports,
}

impl Default for Relay {
    fn default() -> Self {
        Self {
            ports: Ports::new().input::<Any>("in").output::<Any>("out"),
        }
    }
}

impl Node for Relay {
    fn ports(&self) -> &Ports {
        &self.ports
    }

    fn ports_mut(&mut self) -> &mut Ports {
        &mut self.ports
    }

    fn update(&mut self) -> Result<()> {
        let value = self.ports.get::<Any>(0)?.clone();
        if value.is_empty() {
            return Ok(());
        }
        self.ports.set(0, value)
    }

    fn notify(&mut self, _input: usize) -> Result<()> {
        self.update()
    }
}

impl NodeClass for Relay {
    const INFO: &'static str = "Relay:Forwards any value unchanged";
}

/// Number of data inputs of [`WaitAll`]
const DATA_INPUTS: usize = 2;

/// Emits once every data input has fired since the last reset.
///
/// Input 0 is the reset; inputs `1..` carry data. The output is the value of
/// the data input that fired most recently.
#[derive(Debug, Clone)]
pub struct WaitAll {
    ports: Ports,
    fired: u32,
    latest: usize,
}

impl WaitAll {
    const ALL_FIRED: u32 = (1 << DATA_INPUTS) - 1;

    /// Whether every data input fired since the last reset
    pub fn is_complete(&self) -> bool {
        self.fired == Self::ALL_FIRED
    }
}

impl Default for WaitAll {
    fn default() -> Self {
        let mut ports = Ports::new().input::<bool>("reset");
        for index in 0..DATA_INPUTS {
            ports = ports.input::<f32>(format!("in{index}"));
        }
        Self {
            ports: ports.output::<f32>("result"),
            fired: 0,
            latest: 1,
        }
    }
}

impl Node for WaitAll {
    fn ports(&self) -> &Ports {
        &self.ports
    }

    fn ports_mut(&mut self) -> &mut Ports {
        &mut self.ports
    }

    fn update(&mut self) -> Result<()> {
        let value = *self.ports.get::<f32>(self.latest)?;
        self.ports.set(0, value)
    }

    fn notify(&mut self, input: usize) -> Result<()> {
        if input == 0 {
            self.fired = 0;
            return Ok(());
        }
        self.fired |= 1 << (input - 1);
        self.latest = input;
        if self.is_complete() {
            self.update()?;
        }
        Ok(())
    }
}

impl NodeClass for WaitAll {
    const INFO: &'static str = "WaitAll:Emits the latest input once all inputs fired since reset";
}
