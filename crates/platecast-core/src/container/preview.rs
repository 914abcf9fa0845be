//! Preview image extraction (spec.md §4.2 "Previews").
//!
//! Each preview's pixel stream is RLE-encoded RGB-15: every 16-bit
//! little-endian word carries R in bits 15-11, G in bits 10-6, B in bits
//! 4-0, with bit 5 as a repeat flag. Decoding here only expands to a plain
//! RGB8 buffer; wrapping that into a PNG is the caller's job (platecast-png).

use crate::error::{Error, Result};
use crate::limits::MAX_PREVIEW_PIXELS;
use crate::reader::{ByteReader, SliceCursor};

#[derive(Debug, Clone, Copy)]
pub struct PreviewHeader {
    pub width: u32,
    pub height: u32,
    pub data_offset: u32,
    pub data_length: u32,
}

pub fn parse_preview_header(reader: &mut ByteReader, header_offset: u32) -> Result<PreviewHeader> {
    let raw = reader.read_at(header_offset as u64, 32)?;
    let mut c = SliceCursor::new(&raw);
    let width = c.u32()?;
    let height = c.u32()?;
    let data_offset = c.u32()?;
    let data_length = c.u32()?;
    Ok(PreviewHeader {
        width,
        height,
        data_offset,
        data_length,
    })
}

/// An expanded RGB8 preview image, row-major, 3 bytes per pixel.
pub struct PreviewImage {
    pub width: u32,
    pub height: u32,
    pub rgb8: Vec<u8>,
}

fn rgb15_to_rgb8(word: u16) -> (u8, u8, u8) {
    let r5 = ((word >> 11) & 0x1F) as u8;
    let g5 = ((word >> 6) & 0x1F) as u8;
    let b5 = (word & 0x1F) as u8;
    // 5-bit to 8-bit expansion by replicating the top bits into the low ones.
    let r8 = (r5 << 3) | (r5 >> 2);
    let g8 = (g5 << 3) | (g5 >> 2);
    let b8 = (b5 << 3) | (b5 >> 2);
    (r8, g8, b8)
}

/// Decodes a preview given its header and the raw RLE-encoded byte stream
/// already read from the file.
pub fn decode_preview(header: PreviewHeader, data: &[u8]) -> Result<PreviewImage> {
    let pixel_count = header.width as u64 * header.height as u64;
    if pixel_count > MAX_PREVIEW_PIXELS {
        return Err(Error::TruncatedPreview(header.data_offset as u64));
    }

    let mut out = vec![0u8; pixel_count as usize * 3];
    let mut written: usize = 0;
    let mut i = 0usize;

    while i + 1 < data.len() && written < pixel_count as usize {
        let word = u16::from_le_bytes([data[i], data[i + 1]]);
        i += 2;

        let repeat_flag = word & 0x0020 != 0;
        let (r, g, b) = rgb15_to_rgb8(word);

        let repeat: u32 = if repeat_flag {
            if i + 1 >= data.len() {
                return Err(Error::TruncatedPreview(header.data_offset as u64));
            }
            let lo = data[i] as u32;
            let hi = data[i + 1] as u32;
            i += 2;
            (lo | ((hi & 0x0F) << 8)) + 1
        } else {
            1
        };

        let remaining = pixel_count as usize - written;
        let run = (repeat as usize).min(remaining);
        for p in 0..run {
            let px = (written + p) * 3;
            out[px] = r;
            out[px + 1] = g;
            out[px + 2] = b;
        }
        written += run;
    }

    Ok(PreviewImage {
        width: header.width,
        height: header.height,
        rgb8: out,
    })
}

/// Reads and decodes a preview in one step, returning `None` when the header
/// offset is zero (spec scenario S4: preview absent).
pub fn read_preview(reader: &mut ByteReader, header_offset: u32) -> Result<Option<PreviewImage>> {
    if header_offset == 0 {
        return Ok(None);
    }
    let header = parse_preview_header(reader, header_offset)?;
    if header.data_offset == 0 || header.width == 0 || header.height == 0 {
        return Ok(None);
    }
    let raw = reader.read_at(header.data_offset as u64, header.data_length as usize)?;
    decode_preview(header, &raw).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_pixel_no_repeat() {
        // R=31,G=0,B=0, repeat bit clear.
        let word: u16 = 0b11111_0_00000_00000;
        let bytes = word.to_le_bytes();
        let header = PreviewHeader {
            width: 1,
            height: 1,
            data_offset: 0,
            data_length: 2,
        };
        let img = decode_preview(header, &bytes).unwrap();
        assert_eq!(img.rgb8, vec![255, 0, 0]);
    }

    #[test]
    fn repeated_run_expands_correctly() {
        // R=0,G=31,B=0 with repeat flag set, repeat count of 3 (encoded as 2).
        let word: u16 = 0b00000_1_11111_00000;
        let mut bytes = word.to_le_bytes().to_vec();
        bytes.push(2); // lo byte of (repeat - 1)
        bytes.push(0); // hi nibble
        let header = PreviewHeader {
            width: 3,
            height: 1,
            data_offset: 0,
            data_length: bytes.len() as u32,
        };
        let img = decode_preview(header, &bytes).unwrap();
        assert_eq!(img.rgb8.len(), 9);
        for px in img.rgb8.chunks(3) {
            assert_eq!(px, &[0, 255, 0]);
        }
    }

    #[test]
    fn zero_offset_returns_none() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        use std::io::Write;
        file.write_all(&[0u8; 16]).unwrap();
        file.flush().unwrap();
        let mut reader = ByteReader::open(file.path()).unwrap();
        assert!(read_preview(&mut reader, 0).unwrap().is_none());
    }
}
