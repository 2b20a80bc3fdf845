//! SPI frame encoding for the MCP3008 ADC and the MCP4811 DAC.
//!
//! Pure byte packing so it can be tested off-target.

use crate::error::{HwError, Result};
pub use ecd_traits::MAX_CODE;

/// MCP4811 command word with the output buffer shut down (high impedance).
pub const MCP4811_SHUTDOWN: [u8; 2] = [0x00, 0x00];

/// Gain 1x, output active.
const MCP4811_ACTIVE: u16 = 0x3000;

/// Single-ended read request for `channel` (0..=7).
pub fn mcp3008_request(channel: u8) -> Result<[u8; 3]> {
    if channel > 7 {
        return Err(HwError::ChannelOutOfRange(channel));
    }
    Ok([0x01, (0x08 | channel) << 4, 0x00])
}

/// Extract the 10-bit conversion from a response frame.
#[inline]
pub fn mcp3008_decode(rx: &[u8; 3]) -> u16 {
    (u16::from(rx[1] & 0x03) << 8) | u16::from(rx[2])
}

/// Write command for a 10-bit output code.
pub fn mcp4811_word(code: u16) -> Result<[u8; 2]> {
    if code > MAX_CODE {
        return Err(HwError::CodeOutOfRange(code));
    }
    Ok((MCP4811_ACTIVE | (code << 2)).to_be_bytes())
}
