//! Scanline building and the PNG Up filter (spec.md §4.4.1, §4.4.2).

/// The colour type a layer's PNG is encoded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorType {
    /// IHDR colour type 2.
    Rgb8,
    /// IHDR colour type 0.
    Grey8,
}

impl ColorType {
    pub fn ihdr_code(&self) -> u8 {
        match self {
            ColorType::Rgb8 => 2,
            ColorType::Grey8 => 0,
        }
    }

    pub fn channels(&self) -> usize {
        match self {
            ColorType::Rgb8 => 3,
            ColorType::Grey8 => 1,
        }
    }
}

/// Builds the unfiltered scanline buffer: `height` rows of `1 + bytes_per_row`
/// bytes, filter marker 0, row bytes copied straight from `pixels`
/// (`width * height * channels` bytes, row-major, already remapped).
pub fn build_scanlines(pixels: &[u8], width: u32, height: u32, channels: usize) -> Vec<u8> {
    let bytes_per_row = width as usize * channels;
    let stride = 1 + bytes_per_row;
    let mut out = vec![0u8; stride * height as usize];

    for y in 0..height as usize {
        let src = &pixels[y * bytes_per_row..(y + 1) * bytes_per_row];
        let dst_start = y * stride + 1;
        out[dst_start..dst_start + bytes_per_row].copy_from_slice(src);
    }

    out
}

/// Applies the Up filter in place, bottom-up, per spec.md §4.4.2. The first
/// row is left untouched (equivalent to subtracting an all-zero prior row);
/// every row's filter marker becomes 2.
pub fn apply_up_filter(scanlines: &mut [u8], height: u32, stride: usize) {
    let h = height as usize;
    if h == 0 {
        return;
    }

    for y in (1..h).rev() {
        let (prior_and_cur, _) = scanlines.split_at_mut((y + 1) * stride);
        let (prior_block, cur_block) = prior_and_cur.split_at_mut(y * stride);
        let prior = &prior_block[(y - 1) * stride + 1..y * stride];
        let cur = &mut cur_block[1..stride];
        for i in 0..cur.len() {
            cur[i] = cur[i].wrapping_sub(prior[i]);
        }
    }

    for y in 0..h {
        scanlines[y * stride] = 2;
    }
}

/// Reverses [`apply_up_filter`], used only by tests to confirm the round
/// trip holds.
#[cfg(test)]
pub fn unapply_up_filter(scanlines: &mut [u8], height: u32, stride: usize) {
    let h = height as usize;
    for y in 1..h {
        let (prior_and_cur, _) = scanlines.split_at_mut((y + 1) * stride);
        let (prior_block, cur_block) = prior_and_cur.split_at_mut(y * stride);
        let prior = &prior_block[(y - 1) * stride + 1..y * stride];
        let cur = &mut cur_block[1..stride];
        for i in 0..cur.len() {
            cur[i] = cur[i].wrapping_add(prior[i]);
        }
    }
    for y in 0..h {
        scanlines[y * stride] = 0;
    }
}
