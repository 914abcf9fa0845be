//! Fast, scanline-level PNG writer and recompressor. Bypasses general image
//! libraries entirely: the encoder only ever needs to emit IHDR/IDAT/IEND
//! for 8-bit RGB or greyscale layers.

pub mod encode;
pub mod error;
pub mod recompress;
pub mod scanline;

pub use encode::{encode_png, BLANK_LAYER_PNG};
pub use error::{Error, Result};
pub use recompress::{decide_adaptive_recompression, recompress, LayerPngStats, RecompressDecision};
pub use scanline::ColorType;
