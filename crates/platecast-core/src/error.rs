//! Error types for platecast-core

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while parsing a slice file or resolving its target profile.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("IO error at {path}: {source}")]
    IoAt {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unrecognized magic number 0x{0:08X}")]
    UnknownMagic(u32),

    #[error("layer count {0} exceeds the maximum of {1}")]
    TooManyLayers(u32, u32),

    #[error("invalid layer table offset {0}")]
    InvalidLayerTableOffset(i64),

    #[error("layer {index} range [{offset}, {end}) lies outside the file (size {file_size})")]
    LayerRangeOutOfBounds {
        index: u32,
        offset: u64,
        end: u64,
        file_size: u64,
    },

    #[error("truncated preview stream at offset {0}")]
    TruncatedPreview(u64),

    #[error("settings-block decryption failed: {0}")]
    SettingsDecryption(String),

    #[error("unexpected end of data at offset {0}, needed {1} bytes")]
    UnexpectedEof(u64, usize),

    #[error("Unsupported resolution {x}x{y}")]
    UnsupportedResolution { x: u32, y: u32 },

    #[error("print height {height_mm:.2}mm exceeds profile max Z {max_z_mm:.2}mm")]
    HeightExceedsMaxZ { height_mm: f64, max_z_mm: f64 },

    #[error("no target profile could be resolved for {x}x{y}")]
    NoTargetProfile { x: u32, y: u32 },
}

pub type Result<T> = std::result::Result<T, Error>;
