//! Raspberry Pi backend: GPIO working electrodes, MCP3008 for sampling and
//! MCP4811 for the counter electrode.
//!
//! Wiring assumed:
//! - ADC on SPI0 CE0, DAC on SPI0 CE1.
//! - Each segment GPIO also feeds one ADC channel.
//! - The DAC's LDAC input on a GPIO; pulsed low to latch each write.

use std::sync::{Arc, Mutex};

use rppal::gpio::{Gpio, IoPin, Level, Mode, OutputPin};
use rppal::spi::{Bus, Mode as SpiMode, SlaveSelect, Spi};
use tracing::trace;

use crate::error::{HwError, Result};
use crate::mcp;
use ecd_traits::{CounterElectrode, HwResult, SegmentPin};

const SPI_CLOCK_HZ: u32 = 1_000_000;

fn gpio_err(e: rppal::gpio::Error) -> HwError {
    HwError::Gpio(e.to_string())
}

fn spi_err(e: rppal::spi::Error) -> HwError {
    HwError::Spi(e.to_string())
}

/// MCP3008 on its own chip select.
pub struct Mcp3008 {
    spi: Spi,
}

impl Mcp3008 {
    pub fn new() -> Result<Self> {
        let spi = Spi::new(Bus::Spi0, SlaveSelect::Ss0, SPI_CLOCK_HZ, SpiMode::Mode0)
            .map_err(spi_err)?;
        Ok(Self { spi })
    }

    pub fn read(&mut self, channel: u8) -> Result<u16> {
        let tx = mcp::mcp3008_request(channel)?;
        let mut rx = [0u8; 3];
        self.spi.transfer(&mut rx, &tx).map_err(spi_err)?;
        let code = mcp::mcp3008_decode(&rx);
        trace!(channel, code, "mcp3008 read");
        Ok(code)
    }
}

/// Tri-state segment pin with a shared ADC for sampling.
pub struct RpiSegmentPin {
    pin: IoPin,
    adc: Arc<Mutex<Mcp3008>>,
    channel: u8,
    segment: usize,
    driven: bool,
}

impl RpiSegmentPin {
    pub fn new(
        gpio: &Gpio,
        bcm: u8,
        adc: Arc<Mutex<Mcp3008>>,
        channel: u8,
        segment: usize,
    ) -> Result<Self> {
        let pin = gpio.get(bcm).map_err(gpio_err)?.into_io(Mode::Input);
        Ok(Self {
            pin,
            adc,
            channel,
            segment,
            driven: false,
        })
    }

    fn drive(&mut self, level: Level) {
        self.pin.write(level);
        self.pin.set_mode(Mode::Output);
        self.driven = true;
    }
}

impl SegmentPin for RpiSegmentPin {
    fn drive_high(&mut self) -> HwResult<()> {
        self.drive(Level::High);
        Ok(())
    }

    fn drive_low(&mut self) -> HwResult<()> {
        self.drive(Level::Low);
        Ok(())
    }

    fn release(&mut self) -> HwResult<()> {
        self.pin.set_mode(Mode::Input);
        self.driven = false;
        Ok(())
    }

    fn sample(&mut self) -> HwResult<u16> {
        if self.driven {
            return Err(Box::new(HwError::NotReleased {
                segment: self.segment,
            }));
        }
        let mut adc = self
            .adc
            .lock()
            .map_err(|_| HwError::Spi("adc mutex poisoned".into()))?;
        Ok(adc.read(self.channel)?)
    }
}

/// MCP4811 counter electrode driver.
pub struct Mcp4811 {
    spi: Spi,
    ldac: OutputPin,
}

impl Mcp4811 {
    pub fn new(gpio: &Gpio, ldac_bcm: u8) -> Result<Self> {
        let spi = Spi::new(Bus::Spi0, SlaveSelect::Ss1, SPI_CLOCK_HZ, SpiMode::Mode0)
            .map_err(spi_err)?;
        let mut ldac = gpio.get(ldac_bcm).map_err(gpio_err)?.into_output();
        ldac.set_high();
        Ok(Self { spi, ldac })
    }

    fn send(&mut self, word: [u8; 2]) -> Result<()> {
        self.spi.write(&word).map_err(spi_err)?;
        self.ldac.set_low();
        self.ldac.set_high();
        Ok(())
    }
}

impl CounterElectrode for Mcp4811 {
    fn write_code(&mut self, code: u16) -> HwResult<()> {
        self.send(mcp::mcp4811_word(code)?)?;
        trace!(code, "mcp4811 write");
        Ok(())
    }

    fn release(&mut self) -> HwResult<()> {
        self.send(mcp::MCP4811_SHUTDOWN)?;
        trace!("mcp4811 shutdown");
        Ok(())
    }
}

/// Open every device named by the pin map.
///
/// `adc_channels` defaults to the segment index when absent.
pub fn open(
    segment_pins: &[u8],
    adc_channels: Option<&[u8]>,
    ldac_bcm: u8,
) -> Result<(Vec<RpiSegmentPin>, Mcp4811)> {
    let gpio = Gpio::new().map_err(gpio_err)?;
    let adc = Arc::new(Mutex::new(Mcp3008::new()?));
    let mut pins = Vec::with_capacity(segment_pins.len());
    for (i, &bcm) in segment_pins.iter().enumerate() {
        let channel = match adc_channels {
            Some(chans) => *chans.get(i).ok_or(HwError::ChannelOutOfRange(u8::MAX))?,
            None => u8::try_from(i).map_err(|_| HwError::ChannelOutOfRange(u8::MAX))?,
        };
        pins.push(RpiSegmentPin::new(&gpio, bcm, adc.clone(), channel, i)?);
    }
    let dac = Mcp4811::new(&gpio, ldac_bcm)?;
    Ok((pins, dac))
}
