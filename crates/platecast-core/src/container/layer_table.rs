//! Layer-table parsing (spec.md §4.2 "Layer-table parsing").
//!
//! Represented uniformly as an owned `Vec<LayerDef>` regardless of whether
//! the underlying format stores a contiguous table (CBDDLP/CTB v2-v3) or a
//! two-level pointer array (CTB v4/v4E) — the two-level indirection is a
//! parser detail hidden behind this module's return type.

use crate::error::{Error, Result};
use crate::limits::validate_layer_count;
use crate::reader::{ByteReader, SliceCursor};
use crate::types::LayerDef;

const LEGACY_ENTRY_SIZE: usize = 36;
const POINTER_ENTRY_SIZE: usize = 16;
const LAYER_DEF_SIZE: usize = 88;

/// Parses the contiguous 36-byte-entry table used by CBDDLP and CTB v2/v3.
pub fn parse_legacy_table(
    reader: &mut ByteReader,
    layer_table_offset: u32,
    layer_count: u32,
) -> Result<Vec<LayerDef>> {
    validate_layer_count(layer_count)?;
    if layer_count > 0 && layer_table_offset == 0 {
        return Err(Error::InvalidLayerTableOffset(layer_table_offset as i64));
    }

    let raw = reader.read_at(
        layer_table_offset as u64,
        layer_count as usize * LEGACY_ENTRY_SIZE,
    )?;

    let mut layers = Vec::with_capacity(layer_count as usize);
    for i in 0..layer_count as usize {
        let entry = &raw[i * LEGACY_ENTRY_SIZE..(i + 1) * LEGACY_ENTRY_SIZE];
        let mut c = SliceCursor::new(entry);
        let position_z_mm = c.f32()?;
        c.seek(c.position() + 16); // reserved/unused fields between Z and the data pointer
        let data_offset = c.u32()? as u64;
        let data_length = c.u32()? as u64;
        let exposure_s = c.f32()?;
        let light_off_s = c.f32()?;
        layers.push(LayerDef {
            data_offset,
            data_length,
            position_z_mm,
            exposure_s,
            light_off_s,
        });
    }

    Ok(layers)
}

/// Parses the two-level table used by CTB v4/v4E: a pointer array of
/// `layer_count` 16-byte entries, each pointing at an 88-byte `LayerDef`.
pub fn parse_two_level_table(
    reader: &mut ByteReader,
    layer_table_offset: u32,
    layer_count: u32,
) -> Result<Vec<LayerDef>> {
    validate_layer_count(layer_count)?;
    if layer_count > 0 && layer_table_offset == 0 {
        return Err(Error::InvalidLayerTableOffset(layer_table_offset as i64));
    }

    let pointer_raw = reader.read_at(
        layer_table_offset as u64,
        layer_count as usize * POINTER_ENTRY_SIZE,
    )?;

    let mut layers = Vec::with_capacity(layer_count as usize);
    for i in 0..layer_count as usize {
        let entry = &pointer_raw[i * POINTER_ENTRY_SIZE..(i + 1) * POINTER_ENTRY_SIZE];
        let mut c = SliceCursor::new(entry);
        let layer_def_offset = c.u32()? as u64;
        let _unused = c.u32()?;
        let _table_size = c.u32()?;
        let _unused2 = c.u32()?;

        let def_raw = reader.read_at(layer_def_offset, LAYER_DEF_SIZE)?;
        let mut dc = SliceCursor::at(&def_raw, 4);
        let position_z_mm = dc.f32()?;
        let exposure_s = dc.f32()?;
        let light_off_s = dc.f32()?;
        let data_offset = dc.u32()? as u64;
        dc.seek(24);
        let data_length = dc.u32()? as u64;

        layers.push(LayerDef {
            data_offset,
            data_length,
            position_z_mm,
            exposure_s,
            light_off_s,
        });
    }

    Ok(layers)
}

/// Validates that every layer's `[offset, offset+length)` range lies inside
/// the file (spec.md §3 invariants).
pub fn validate_layer_ranges(layers: &[LayerDef], file_len: u64) -> Result<()> {
    for (index, layer) in layers.iter().enumerate() {
        let end = layer
            .data_offset
            .checked_add(layer.data_length)
            .ok_or_else(|| Error::LayerRangeOutOfBounds {
                index: index as u32,
                offset: layer.data_offset,
                end: u64::MAX,
                file_size: file_len,
            })?;
        if end > file_len {
            return Err(Error::LayerRangeOutOfBounds {
                index: index as u32,
                offset: layer.data_offset,
                end,
                file_size: file_len,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(bytes: &[u8]) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(bytes).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn legacy_table_parses_two_entries() {
        let mut bytes = vec![0u8; LEGACY_ENTRY_SIZE * 2];
        // entry 0
        bytes[0..4].copy_from_slice(&0.05f32.to_le_bytes());
        bytes[20..24].copy_from_slice(&1000u32.to_le_bytes()); // data_offset
        bytes[24..28].copy_from_slice(&200u32.to_le_bytes()); // data_length
        bytes[28..32].copy_from_slice(&8.0f32.to_le_bytes()); // exposure
        bytes[32..36].copy_from_slice(&0.5f32.to_le_bytes()); // light_off
        // entry 1
        let base = LEGACY_ENTRY_SIZE;
        bytes[base..base + 4].copy_from_slice(&0.10f32.to_le_bytes());
        bytes[base + 20..base + 24].copy_from_slice(&2000u32.to_le_bytes());
        bytes[base + 24..base + 28].copy_from_slice(&300u32.to_le_bytes());

        let mut file_bytes = vec![0u8; 1300];
        file_bytes.extend_from_slice(&bytes);
        let f = write_file(&file_bytes);
        let mut reader = ByteReader::open(f.path()).unwrap();

        let layers = parse_legacy_table(&mut reader, 1300, 2).unwrap();
        assert_eq!(layers.len(), 2);
        assert_eq!(layers[0].data_offset, 1000);
        assert_eq!(layers[0].data_length, 200);
        assert_eq!(layers[0].exposure_s, 8.0);
        assert_eq!(layers[1].position_z_mm, 0.10f32);
    }

    #[test]
    fn rejects_zero_offset_with_nonzero_layer_count() {
        let f = write_file(&[0u8; 64]);
        let mut reader = ByteReader::open(f.path()).unwrap();
        assert!(parse_legacy_table(&mut reader, 0, 5).is_err());
    }

    #[test]
    fn out_of_bounds_range_is_rejected() {
        let layers = vec![LayerDef {
            data_offset: 100,
            data_length: 50,
            position_z_mm: 0.0,
            exposure_s: 0.0,
            light_off_s: 0.0,
        }];
        assert!(validate_layer_ranges(&layers, 120).is_err());
        assert!(validate_layer_ranges(&layers, 150).is_ok());
    }
}
