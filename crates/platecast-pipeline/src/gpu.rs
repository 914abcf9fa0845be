//! Optional GPU accelerator contract (spec.md §9 "Optional GPU path").
//!
//! The CPU path is authoritative for output bytes: a GPU backend may only be
//! consulted as a speed optimization, and its absence or failure must never
//! change what gets written. No GPU backend ships in this crate; consumers
//! that have one implement [`GpuBackend`] and pass it in.

use platecast_core::BoardType;

/// Parameters describing one batch of raw layers to remap on the GPU path.
pub struct ScanlineBatchParams {
    pub resolution_x: u32,
    pub resolution_y: u32,
    pub output_width: u32,
    pub board_type: BoardType,
}

/// One GPU-produced scanline buffer, same shape as the CPU remap's output.
pub struct GpuScanlines {
    pub layer_index: u32,
    pub pixels: Vec<u8>,
}

/// A GPU accelerator for the scanline-remap stage. Implementations may
/// return `None` from `scanline_batch` at any time (device busy, batch too
/// large, driver error) to fall back to the CPU path for that batch.
pub trait GpuBackend: Send + Sync {
    fn name(&self) -> &str;

    fn scanline_batch(
        &self,
        raw_layers: &[(u32, Vec<u8>)],
        params: &ScanlineBatchParams,
    ) -> Option<Vec<GpuScanlines>>;
}

/// A backend that always declines, used when no real GPU path is wired in.
pub struct NoGpu;

impl GpuBackend for NoGpu {
    fn name(&self) -> &str {
        "none"
    }

    fn scanline_batch(
        &self,
        _raw_layers: &[(u32, Vec<u8>)],
        _params: &ScanlineBatchParams,
    ) -> Option<Vec<GpuScanlines>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_gpu_backend_always_declines() {
        let backend = NoGpu;
        let params = ScanlineBatchParams {
            resolution_x: 100,
            resolution_y: 100,
            output_width: 50,
            board_type: BoardType::Rgb8Bit,
        };
        assert!(backend.scanline_batch(&[], &params).is_none());
        assert_eq!(backend.name(), "none");
    }
}
