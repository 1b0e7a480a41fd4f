//! Error kinds, per spec.md 7.
use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("bad input: {0}")]
    BadInput(String),

    #[error("no table file for sum {sum}")]
    TableMissing { sum: u32 },

    #[error("board not found in sum-{sum} table")]
    BoardNotFound { sum: u32 },

    #[error("lut file missing at {0}")]
    LutMissing(PathBuf),

    #[error("lut file malformed at line {line}: {reason}")]
    LutMalformed { line: usize, reason: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("worker thread panicked: {0}")]
    WorkerPanicked(String),
}

pub type Result<T> = std::result::Result<T, Error>;
