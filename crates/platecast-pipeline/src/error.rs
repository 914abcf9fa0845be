//! Error type for platecast-pipeline (spec.md §7).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Container(#[from] platecast_core::Error),

    #[error(transparent)]
    Pack(#[from] platecast_pack::Error),

    #[error(transparent)]
    Png(#[from] platecast_png::Error),

    #[error("conversion cancelled")]
    Cancelled,

    #[error("worker panicked: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
