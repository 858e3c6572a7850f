use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TickscopeError>;

#[derive(Debug, Error)]
pub enum TickscopeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("hardware counter is not usable on this machine")]
    UnsupportedPlatform,
    #[error("metadata slot pool exhausted")]
    SlotsExhausted,
    #[error("invalid capture format: {0}")]
    InvalidFormat(&'static str),
    #[error("could not open capture sink at {path}: {source}")]
    SinkCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
