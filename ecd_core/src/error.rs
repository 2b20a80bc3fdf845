use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EcdError {
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("hardware fault: {0}")]
    HardwareFault(String),
    #[error("segment index {index} out of range (display has {count} segments)")]
    SegmentIndex { index: usize, count: usize },
    #[error("segment {index}: Undefined is not a drive target")]
    UndefinedTarget { index: usize },
    #[error("configuration error: {0}")]
    Config(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("missing segment pins")]
    MissingSegments,
    #[error("missing counter electrode")]
    MissingCounterElectrode,
    #[error("display has no segments")]
    NoSegments,
    #[error("too many segments: {count} (max {max})")]
    TooManySegments { count: usize, max: usize },
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
