//! Hardware backends for the electrochromic display engine.
//!
//! - [`sim`]: an in-memory electrochemical model, used by tests and the CLI.
//! - `rpi` (feature `hardware`, Linux only): GPIO segment pins, MCP3008 ADC
//!   and MCP4811 DAC over SPI.

pub mod error;
pub mod mcp;
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod rpi;
pub mod sim;

pub use sim::{SimElectrode, SimSegmentPin, SimulatedPanel};
