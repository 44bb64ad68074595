use std::io;

use thiserror::Error;

/// Errors raised by index construction and random-access reads.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid index configuration: {0}")]
    ConfigInvalid(&'static str),

    #[error("allocation failed")]
    OutOfMemory,

    #[error("compressed source I/O error: {0}")]
    IoError(#[from] io::Error),

    #[error("deflate data error: {0}")]
    DataError(&'static str),

    #[error("invalid argument: {0}")]
    InvalidArg(&'static str),

    #[error("index has not been built")]
    NotBuilt,
}

pub type Result<T> = std::result::Result<T, Error>;
