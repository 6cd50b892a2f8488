//! Error type shared by the simulation and benchmark modules
//!
//! Every variant is fatal for the operation that produced it: nothing in
//! this crate retries. Callers decide whether to log-and-exit or surface it.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// `run` was called on an engine that holds no parameters
    #[error("simulation parameters have not been loaded")]
    MissingParameters,

    /// A parameter failed validation when converting from its config form
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// Configuration source could not be read or parsed
    #[error("configuration error: {0}")]
    Config(String),

    /// Buffer allocation failed (SOA arrays or session samples)
    #[error("failed to allocate {what} for {len} elements")]
    Allocation { what: &'static str, len: usize },

    /// A force kernel needs shadow buffers the state was allocated without
    #[error("force kernel `{0}` requires shadow buffers")]
    MissingShadow(&'static str),

    /// Fault raised by a force kernel or another step collaborator
    #[error("force kernel failed: {0}")]
    Kernel(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("a measurement session is already open")]
    SessionAlreadyOpen,

    #[error("no measurement session is open")]
    NoActiveSession,

    #[error("interval already started; record it before marking again")]
    IntervalAlreadyOpen,

    #[error("record called without a matching mark")]
    RecordWithoutMark,

    #[error("measurement session is full ({0} samples)")]
    CapacityExceeded(usize),

    #[error("cannot finish: {0}")]
    UnfinishedSession(&'static str),

    #[error("unknown force kernel `{0}` (expected `reference` or `cell-list`)")]
    UnknownKernel(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Error::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }

    /// Wrap a collaborator's own error (or message) as [`Error::Kernel`]
    pub fn kernel(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Error::Kernel(source.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
