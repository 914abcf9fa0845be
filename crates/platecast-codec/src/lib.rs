//! Per-layer decoding: keystream decryption, RLE expansion, area statistics
//! and subpixel remap.

pub mod keystream;
pub mod remap;
pub mod rle;
pub mod stats;

pub use keystream::apply_keystream;
pub use remap::remap_row;
pub use rle::decode_rle;
pub use stats::compute_area_info;
