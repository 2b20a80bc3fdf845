use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("gpio error: {0}")]
    Gpio(String),
    #[error("spi error: {0}")]
    Spi(String),
    #[error("adc channel {0} out of range")]
    ChannelOutOfRange(u8),
    #[error("dac code {0} exceeds 10-bit range")]
    CodeOutOfRange(u16),
    #[error("segment {segment} sampled while driven")]
    NotReleased { segment: usize },
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;
