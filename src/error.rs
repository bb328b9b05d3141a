//! Error types for smartview.
//!
//! Parsing never fails; these cover configuration I/O and self-test
//! control only.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file could not be read or written
    #[error("config error: {0}")]
    Config(String),

    /// Self-test operation not valid in the current state
    #[error("cannot {action} while self-test is {state}")]
    InvalidTransition { action: &'static str, state: &'static str },

    /// No device with this path is known
    #[error("unknown device: {0}")]
    UnknownDevice(String),

    /// Drive or smartctl refused the self-test command
    #[error("self-test rejected on {path}: {reason}")]
    TestRejected { path: String, reason: String },
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(e: toml::ser::Error) -> Self {
        Error::Config(e.to_string())
    }
}
