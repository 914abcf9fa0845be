//! Container parser (spec.md §4.2, C2).
//!
//! Entry point is [`Parser::open`], which reads the first bytes, identifies
//! one of the four supported magic numbers and dispatches to the matching
//! header/layer-table/settings parsing path.

pub mod crypto;
pub mod header;
pub mod layer_table;
pub mod preview;

use crate::error::Result;
use crate::reader::ByteReader;
use crate::types::{LayerDef, SliceFileDescriptor};

pub use header::ContainerKind;

/// A fully parsed container: the reader is kept open so layer bytes can be
/// streamed lazily by the pipeline.
pub struct Parser {
    reader: ByteReader,
    pub kind: ContainerKind,
    pub descriptor: SliceFileDescriptor,
    pub layers: Vec<LayerDef>,
    pub xor_key: u32,
    pub preview: Option<preview::PreviewImage>,
}

impl Parser {
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let mut reader = ByteReader::open(path)?;
        let magic_bytes = reader.read_at(0, 4)?;
        let magic = u32::from_le_bytes([
            magic_bytes[0],
            magic_bytes[1],
            magic_bytes[2],
            magic_bytes[3],
        ]);
        let kind = ContainerKind::from_magic(magic)?;

        match kind {
            ContainerKind::Cbddlp | ContainerKind::CtbV2V3 | ContainerKind::CtbV4 => {
                Self::open_unencrypted(reader, kind)
            }
            ContainerKind::CtbV4E => Self::open_v4e(reader),
        }
    }

    fn open_unencrypted(mut reader: ByteReader, kind: ContainerKind) -> Result<Self> {
        let h = header::parse_extended_header(&mut reader)?;
        crate::limits::validate_layer_count(h.layer_count)?;

        let layers = if kind.uses_two_level_layer_table() {
            layer_table::parse_two_level_table(&mut reader, h.layer_table_offset, h.layer_count)?
        } else {
            layer_table::parse_legacy_table(&mut reader, h.layer_table_offset, h.layer_count)?
        };
        layer_table::validate_layer_ranges(&layers, reader.len())?;

        let preview_image = preview::read_preview(&mut reader, h.large_preview_offset)?
            .or(preview::read_preview(&mut reader, h.small_preview_offset)?);

        let descriptor = SliceFileDescriptor {
            source_path: reader.path().to_path_buf(),
            resolution_x: h.resolution_x,
            resolution_y: h.resolution_y,
            display_mm_x: h.display_mm_x,
            display_mm_y: h.display_mm_y,
            max_z_mm: h.bed_mm_z,
            layer_height_mm: h.layer_height_mm,
            layer_count: h.layer_count,
            bottom_layer_count: h.bottom_layer_count,
            bottom_exposure_s: h.bottom_exposure_s,
            normal_exposure_s: h.normal_exposure_s,
            lift_height_mm: h.lift_height_mm,
            lift_speed_mm_min: h.lift_speed_mm_min,
            retract_speed_mm_min: h.retract_speed_mm_min,
            machine_name: h.machine_name,
            preview_png: None,
        };

        Ok(Self {
            reader,
            kind,
            descriptor,
            layers,
            xor_key: h.xor_key,
            preview: preview_image,
        })
    }

    fn open_v4e(mut reader: ByteReader) -> Result<Self> {
        let file_header = header::parse_v4e_file_header(&mut reader)?;
        let ciphertext = reader.read_at(
            file_header.settings_offset as u64,
            file_header.settings_size as usize,
        )?;
        let decrypted = crypto::decrypt_settings_block(&ciphertext)?;
        let s = header::parse_v4e_settings(&decrypted)?;

        crate::limits::validate_layer_count(s.layer_count)?;

        // CTB v4E always uses the two-level layer table, same as CTB v4; the
        // layer table's own offset is not part of the settings block, so it
        // is read from the same fixed location CTB v4 uses relative to this
        // file's header size.
        let layer_table_offset = (48 + 288) as u32;
        let layers =
            layer_table::parse_two_level_table(&mut reader, layer_table_offset, s.layer_count)?;
        layer_table::validate_layer_ranges(&layers, reader.len())?;

        let preview_image = preview::read_preview(&mut reader, s.large_preview_offset)?
            .or(preview::read_preview(&mut reader, s.small_preview_offset)?);

        let descriptor = SliceFileDescriptor {
            source_path: reader.path().to_path_buf(),
            resolution_x: s.resolution_x,
            resolution_y: s.resolution_y,
            display_mm_x: s.display_mm_x,
            display_mm_y: s.display_mm_y,
            max_z_mm: s.bed_mm_z,
            layer_height_mm: s.layer_height_mm,
            layer_count: s.layer_count,
            bottom_layer_count: s.bottom_layer_count,
            bottom_exposure_s: s.bottom_exposure_s,
            normal_exposure_s: s.normal_exposure_s,
            lift_height_mm: s.lift_height_mm,
            lift_speed_mm_min: s.lift_speed_mm_min,
            retract_speed_mm_min: s.retract_speed_mm_min,
            // The v4E settings block reserves space for a machine-name
            // pointer that the format never populates in practice; per
            // DESIGN.md this is intentionally left unresolved (Open Question).
            machine_name: None,
            preview_png: None,
        };

        Ok(Self {
            reader,
            kind: ContainerKind::CtbV4E,
            descriptor,
            layers,
            xor_key: s.xor_key,
            preview: preview_image,
        })
    }

    /// Reads one layer's raw (still keystream-encrypted, still RLE-encoded)
    /// payload bytes.
    pub fn read_layer_payload(&mut self, layer_index: usize) -> Result<Vec<u8>> {
        let layer = self.layers[layer_index];
        self.reader
            .read_at(layer.data_offset, layer.data_length as usize)
    }

    pub fn layer_count(&self) -> u32 {
        self.layers.len() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn legacy_header(magic: u32, resolution_x: u32, resolution_y: u32, layer_count: u32) -> Vec<u8> {
        let mut h = vec![0u8; 108];
        h[0..4].copy_from_slice(&magic.to_le_bytes());
        h[4..8].copy_from_slice(&2u32.to_le_bytes()); // version
        h[8..12].copy_from_slice(&68.0f32.to_le_bytes()); // display x
        h[12..16].copy_from_slice(&120.0f32.to_le_bytes()); // display y
        h[16..20].copy_from_slice(&165.0f32.to_le_bytes()); // bed z
        h[28..32].copy_from_slice(&0.05f32.to_le_bytes()); // layer height
        h[32..36].copy_from_slice(&8.0f32.to_le_bytes()); // normal exposure
        h[36..40].copy_from_slice(&35.0f32.to_le_bytes()); // bottom exposure
        h[48..52].copy_from_slice(&resolution_x.to_le_bytes());
        h[52..56].copy_from_slice(&resolution_y.to_le_bytes());
        h[60..64].copy_from_slice(&108u32.to_le_bytes()); // layer_table_offset
        h[64..68].copy_from_slice(&layer_count.to_le_bytes());
        h
    }

    #[test]
    fn opens_cbddlp_with_zero_layers() {
        let mut bytes = legacy_header(0x12FD0066, 1620, 2560, 0);
        bytes.resize(108, 0);
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(&bytes).unwrap();
        f.flush().unwrap();

        let parser = Parser::open(f.path()).unwrap();
        assert_eq!(parser.kind, ContainerKind::Cbddlp);
        assert_eq!(parser.layer_count(), 0);
        assert_eq!(parser.descriptor.resolution_x, 1620);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(&[0u8; 108]).unwrap();
        f.flush().unwrap();
        assert!(Parser::open(f.path()).is_err());
    }
}
