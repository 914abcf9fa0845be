//! Error type for platecast-png.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("deflate compression failed: {0}")]
    Compress(#[source] std::io::Error),

    #[error("inflate decompression failed: {0}")]
    Decompress(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
