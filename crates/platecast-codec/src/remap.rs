//! Subpixel remap (spec.md §4.3.4, C3).
//!
//! Source panels pack multiple physical subpixels behind one addressable
//! column; converting to a target board's native width requires collapsing
//! (or centering) those subpixels into the target's pixel grid.

use platecast_core::BoardType;

/// Remaps one decoded source row (`src_width` grey samples) onto a row of
/// `dst_width` output samples for the given board type.
///
/// `RGB_8BIT` groups three consecutive source samples into one RGB triple,
/// each channel copied verbatim. `TWO_SUBPIXEL_GREYSCALE` averages pairs of
/// source samples into one grey output sample. Either way, if the source
/// row maps to fewer output samples than `dst_width`, the remainder is
/// centered with zero padding on both sides.
pub fn remap_row(src: &[u8], dst_width: usize, board_type: BoardType) -> Vec<u8> {
    let channels = match board_type {
        BoardType::Rgb8Bit => 3,
        BoardType::TwoSubpixelGreyscale => 1,
    };
    let mut out = vec![0u8; dst_width * channels];

    let mapped = match board_type {
        BoardType::Rgb8Bit => remap_rgb8(src),
        BoardType::TwoSubpixelGreyscale => remap_two_subpixel_grey(src),
    };

    let mapped_samples = mapped.len() / channels;
    if mapped_samples >= dst_width {
        // truncate symmetrically if the source maps to more than fits.
        let skip = (mapped_samples - dst_width) / 2;
        let start = skip * channels;
        let end = start + dst_width * channels;
        out.copy_from_slice(&mapped[start..end]);
    } else {
        let pad = (dst_width - mapped_samples) / 2;
        let start = pad * channels;
        out[start..start + mapped.len()].copy_from_slice(&mapped);
    }

    out
}

fn remap_rgb8(src: &[u8]) -> Vec<u8> {
    let triples = src.len() / 3;
    let mut out = Vec::with_capacity(triples * 3);
    for t in 0..triples {
        out.push(src[t * 3]);
        out.push(src[t * 3 + 1]);
        out.push(src[t * 3 + 2]);
    }
    out
}

fn remap_two_subpixel_grey(src: &[u8]) -> Vec<u8> {
    let pairs = src.len() / 2;
    let mut out = Vec::with_capacity(pairs);
    for p in 0..pairs {
        let a = src[p * 2] as u16;
        let b = src[p * 2 + 1] as u16;
        out.push(((a + b) >> 1) as u8);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgb8_groups_triples_verbatim() {
        let src = [10, 20, 30, 40, 50, 60];
        let out = remap_row(&src, 2, BoardType::Rgb8Bit);
        assert_eq!(out, vec![10, 20, 30, 40, 50, 60]);
    }

    #[test]
    fn two_subpixel_averages_pairs() {
        let src = [10, 20, 100, 200];
        let out = remap_row(&src, 2, BoardType::TwoSubpixelGreyscale);
        assert_eq!(out, vec![15, 150]);
    }

    #[test]
    fn shorter_mapped_row_is_centered_with_zero_padding() {
        let src = [10, 20]; // one grey sample after averaging
        let out = remap_row(&src, 3, BoardType::TwoSubpixelGreyscale);
        assert_eq!(out, vec![0, 15, 0]);
    }

    #[test]
    fn longer_mapped_row_is_truncated_symmetrically() {
        let src = [10, 20, 30, 40, 50, 60]; // three grey samples
        let out = remap_row(&src, 1, BoardType::TwoSubpixelGreyscale);
        assert_eq!(out, vec![35]); // the middle pair: (30+40)/2
    }
}
