use std::io;
use std::ops::Range;
use std::path::PathBuf;

use thiserror::Error;

/// Top-level error for everything the crate can report.
#[derive(Debug, Error)]
pub enum OvertoneError {
    #[error("Bank error: {0}")]
    Bank(#[from] BankError),
    #[error("Tone error: {0}")]
    Tone(#[from] ToneError),
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("Control error: {0}")]
    Control(#[from] ControlError),
    #[error("Render error: {0}")]
    Render(#[from] RenderError),
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Rejected harmonic bank mutations. The bank is left untouched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BankError {
    #[error("harmonic index {index} out of range (bank has {len})")]
    OutOfRange { index: usize, len: usize },
    #[error("{param} must be a number, got {value}")]
    NotANumber { param: &'static str, value: f64 },
    #[error("harmonic frequency must be positive and finite, got {0}")]
    InvalidFrequency(f64),
    #[error("invalid bank snapshot: {0}")]
    InvalidSnapshot(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToneError {
    #[error("unknown note '{0}'")]
    UnknownNote(String),
    #[error("key '{0}' is not mapped to a note")]
    UnmappedKey(String),
}

/// A control line that matched a known prefix but whose payload is unusable.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProtocolError {
    #[error("malformed command '{line}': {reason}")]
    MalformedCommand {
        line: String,
        /// Byte range of the offending payload within `line`.
        span: Range<usize>,
        reason: String,
    },
}

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("invalid harmonic selection {requested} (valid: 1..={len})")]
    InvalidSelection { requested: i64, len: usize },
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Bank(#[from] BankError),
    #[error(transparent)]
    Tone(#[from] ToneError),
    #[error("control source unavailable: {0}")]
    Source(#[source] io::Error),
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("cannot write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("render task failed: {0}")]
    Task(String),
    #[error("not a PCM WAV stream: {0}")]
    InvalidHeader(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}
