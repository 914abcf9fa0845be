//! Resource limits for security and DoS prevention
//!
//! Centralizes input-driven bounds so that a malformed or adversarial slice
//! file cannot force unbounded allocation.

use crate::error::{Error, Result};

/// Hard cap on layer count (spec.md §4.2 sanity check).
pub const MAX_LAYER_COUNT: u32 = 100_000;

/// Hard cap on a single layer's raw payload size (100 MB is generous even for
/// a 16K full-black layer at the least favorable RLE expansion).
pub const MAX_LAYER_PAYLOAD_BYTES: u64 = 100 * 1024 * 1024;

/// Hard cap on preview pixel counts to avoid decoding a malformed preview
/// into an unbounded buffer.
pub const MAX_PREVIEW_PIXELS: u64 = 4096 * 4096;

/// Threshold below which a layer's raw payload is treated as blank
/// (spec.md §4.3.2 "Blank-layer fast path").
pub const BLANK_LAYER_THRESHOLD_BYTES: usize = 100;

pub fn validate_layer_count(count: u32) -> Result<()> {
    if count > MAX_LAYER_COUNT {
        return Err(Error::TooManyLayers(count, MAX_LAYER_COUNT));
    }
    Ok(())
}
