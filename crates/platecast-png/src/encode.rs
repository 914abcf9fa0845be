//! Deflate compression and PNG chunk assembly (spec.md §4.4.3).

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::error::{Error, Result};
use crate::scanline::{apply_up_filter, build_scanlines, ColorType};

const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

fn crc32_of(type_tag: &[u8; 4], data: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(type_tag);
    hasher.update(data);
    hasher.finalize()
}

fn write_chunk(out: &mut Vec<u8>, type_tag: &[u8; 4], data: &[u8]) {
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(type_tag);
    out.extend_from_slice(data);
    out.extend_from_slice(&crc32_of(type_tag, data).to_be_bytes());
}

fn deflate(data: &[u8], level: u32) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(level.min(9)));
    encoder.write_all(data).map_err(Error::Compress)?;
    encoder.finish().map_err(Error::Compress)
}

/// Encodes a decoded, already-remapped pixel buffer into a full PNG byte
/// stream: scanline build, Up filter, deflate, chunk assembly.
pub fn encode_png(
    pixels: &[u8],
    width: u32,
    height: u32,
    color_type: ColorType,
    level: u32,
) -> Result<Vec<u8>> {
    let channels = color_type.channels();
    let mut scanlines = build_scanlines(pixels, width, height, channels);
    let stride = 1 + width as usize * channels;
    apply_up_filter(&mut scanlines, height, stride);

    let idat = deflate(&scanlines, level)?;

    let mut ihdr = Vec::with_capacity(13);
    ihdr.extend_from_slice(&width.to_be_bytes());
    ihdr.extend_from_slice(&height.to_be_bytes());
    ihdr.push(8); // bit depth
    ihdr.push(color_type.ihdr_code());
    ihdr.push(0); // compression method
    ihdr.push(0); // filter method
    ihdr.push(0); // interlace method

    let mut out = Vec::with_capacity(8 + 25 + idat.len() + 12 + 12);
    out.extend_from_slice(&PNG_SIGNATURE);
    write_chunk(&mut out, b"IHDR", &ihdr);
    write_chunk(&mut out, b"IDAT", &idat);
    write_chunk(&mut out, b"IEND", &[]);
    Ok(out)
}

/// Lazily built, reused 1x1 black greyscale PNG for the blank-layer fast
/// path (spec.md §4.3.2, scenario S5).
pub static BLANK_LAYER_PNG: once_cell::sync::Lazy<Vec<u8>> = once_cell::sync::Lazy::new(|| {
    encode_png(&[0u8], 1, 1, ColorType::Grey8, 6).expect("encoding the fixed blank PNG cannot fail")
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoded_png_starts_with_signature_and_ihdr() {
        let pixels = vec![0u8; 4]; // 2x2 grey8
        let png = encode_png(&pixels, 2, 2, ColorType::Grey8, 6).unwrap();
        assert_eq!(&png[0..8], &PNG_SIGNATURE);
        assert_eq!(&png[12..16], b"IHDR");
        let width = u32::from_be_bytes([png[16], png[17], png[18], png[19]]);
        let height = u32::from_be_bytes([png[20], png[21], png[22], png[23]]);
        assert_eq!(width, 2);
        assert_eq!(height, 2);
        assert_eq!(png[25], 8); // bit depth
        assert_eq!(png[26], 0); // grey colour type
    }

    #[test]
    fn rgb_png_reports_colour_type_two() {
        let pixels = vec![0u8; 2 * 2 * 3];
        let png = encode_png(&pixels, 2, 2, ColorType::Rgb8, 6).unwrap();
        assert_eq!(png[26], 2);
    }

    #[test]
    fn blank_layer_png_is_cached_and_stable() {
        let a = &*BLANK_LAYER_PNG;
        let b = &*BLANK_LAYER_PNG;
        assert_eq!(a.as_ptr(), b.as_ptr());
        assert_eq!(&a[0..8], &PNG_SIGNATURE);
    }
}
