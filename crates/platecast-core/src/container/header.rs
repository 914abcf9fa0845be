//! Versioned header parsing for the four supported magic numbers
//! (spec.md §4.2).

use crate::error::{Error, Result};
use crate::reader::{ByteReader, SliceCursor};

/// Which of the four ChituBox-family container variants this file is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    Cbddlp,
    CtbV2V3,
    CtbV4,
    CtbV4E,
}

impl ContainerKind {
    pub fn from_magic(magic: u32) -> Result<Self> {
        match magic {
            0x12FD0066 => Ok(ContainerKind::Cbddlp),
            0x12FD0086 => Ok(ContainerKind::CtbV2V3),
            0x12FD0106 => Ok(ContainerKind::CtbV4),
            0x12FD0107 => Ok(ContainerKind::CtbV4E),
            other => Err(Error::UnknownMagic(other)),
        }
    }

    /// Whether this variant stores layer data at all encrypted by the
    /// per-layer keystream of spec.md §4.3.1 (distinct from the CTB v4E
    /// settings-block AES encryption).
    pub fn layer_data_may_be_keystream_encrypted(&self) -> bool {
        matches!(self, ContainerKind::CtbV4 | ContainerKind::CtbV4E)
    }

    /// Whether the layer table is the two-level pointer-array format used by
    /// CTB v4 and v4E, as opposed to the contiguous 36-byte-entry table used
    /// by CBDDLP/CTB v2-v3.
    pub fn uses_two_level_layer_table(&self) -> bool {
        matches!(self, ContainerKind::CtbV4 | ContainerKind::CtbV4E)
    }
}

/// Print-parameters defaults applied when the optional block is absent
/// (spec.md §4.2).
pub struct PrintParamDefaults;
impl PrintParamDefaults {
    pub const BOTTOM_LAYER_COUNT: u32 = 0;
    pub const LIFT_HEIGHT_MM: f32 = 5.0;
    pub const LIFT_SPEED_MM_MIN: f32 = 65.0;
    pub const RETRACT_SPEED_MM_MIN: f32 = 150.0;
}

/// Fields extracted from the 108-byte extended header shared by CBDDLP,
/// CTB v2/v3 and CTB v4.
#[derive(Debug, Clone)]
pub struct ExtendedHeader {
    pub version: u32,
    pub display_mm_x: f32,
    pub display_mm_y: f32,
    pub bed_mm_z: f32,
    pub layer_height_mm: f32,
    pub normal_exposure_s: f32,
    pub bottom_exposure_s: f32,
    pub light_off_delay_s: f32,
    pub bottom_layer_count: u32,
    pub resolution_x: u32,
    pub resolution_y: u32,
    pub large_preview_offset: u32,
    pub small_preview_offset: u32,
    pub layer_table_offset: u32,
    pub layer_count: u32,
    pub print_params_offset: u32,
    pub print_params_size: u32,
    pub anti_aliasing_level: u32,
    pub xor_key: u32,
    pub slicer_info_offset: u32,
    pub lift_height_mm: f32,
    pub lift_speed_mm_min: f32,
    pub retract_speed_mm_min: f32,
    pub machine_name: Option<String>,
}

/// Parses the 108-byte extended header at file offset 0, plus the optional
/// print-parameters block and slicer-info block it points to.
pub fn parse_extended_header(reader: &mut ByteReader) -> Result<ExtendedHeader> {
    let raw = reader.read_at(0, 108)?;
    let mut c = SliceCursor::new(&raw);

    let _magic = c.u32()?;
    let version = c.u32()?;
    let display_mm_x = c.f32()?;
    let display_mm_y = c.f32()?;
    let bed_mm_z = c.f32()?;
    let _unknown1 = c.u32()?;
    let _unknown2 = c.u32()?;
    let layer_height_mm = c.f32()?;
    let normal_exposure_s = c.f32()?;
    let bottom_exposure_s = c.f32()?;
    let light_off_delay_s = c.f32()?;
    let bottom_layer_count = c.u32()?;
    let resolution_x = c.u32()?;
    let resolution_y = c.u32()?;
    let large_preview_offset = c.u32()?;
    let layer_table_offset = c.u32()?;
    let layer_count = c.u32()?;
    let small_preview_offset = c.u32()?;
    let _print_duration_s = c.u32()?;
    let _image_mirrored = c.u32()?;
    let print_params_offset = c.u32()?;
    let print_params_size = c.u32()?;
    let anti_aliasing_level = c.u32()?;
    let _normal_uv_power = c.u16()?;
    let _bottom_uv_power = c.u16()?;
    let xor_key = c.u32()?;
    let slicer_info_offset = c.u32()?;
    let _slicer_info_size = c.u32()?;

    let (lift_height_mm, lift_speed_mm_min, retract_speed_mm_min) = if print_params_offset != 0
        && print_params_size > 0
    {
        read_print_params(reader, print_params_offset as u64)?
    } else {
        (
            PrintParamDefaults::LIFT_HEIGHT_MM,
            PrintParamDefaults::LIFT_SPEED_MM_MIN,
            PrintParamDefaults::RETRACT_SPEED_MM_MIN,
        )
    };

    let machine_name = if slicer_info_offset != 0 {
        read_machine_name(reader, slicer_info_offset as u64).ok()
    } else {
        None
    };

    Ok(ExtendedHeader {
        version,
        display_mm_x,
        display_mm_y,
        bed_mm_z,
        layer_height_mm,
        normal_exposure_s,
        bottom_exposure_s,
        light_off_delay_s,
        bottom_layer_count,
        resolution_x,
        resolution_y,
        large_preview_offset,
        small_preview_offset,
        layer_table_offset,
        layer_count,
        print_params_offset,
        print_params_size,
        anti_aliasing_level,
        xor_key,
        slicer_info_offset,
        lift_height_mm,
        lift_speed_mm_min,
        retract_speed_mm_min,
        machine_name,
    })
}

fn read_print_params(reader: &mut ByteReader, offset: u64) -> Result<(f32, f32, f32)> {
    // bottom_lift_height(f32) @0, bottom_lift_speed(f32) @4, lift_height(f32) @8,
    // lift_speed(f32) @12, retract_speed(f32) @16, volume(f32) @20 ... layout
    // varies by slicer build; fall back to defaults on a short read rather
    // than failing the whole parse.
    let raw = match reader.read_at(offset, 28) {
        Ok(raw) => raw,
        Err(_) => {
            return Ok((
                PrintParamDefaults::LIFT_HEIGHT_MM,
                PrintParamDefaults::LIFT_SPEED_MM_MIN,
                PrintParamDefaults::RETRACT_SPEED_MM_MIN,
            ))
        }
    };
    let mut c = SliceCursor::new(&raw);
    let _bottom_lift_height = c.f32()?;
    let _bottom_lift_speed = c.f32()?;
    let lift_height = c.f32()?;
    let lift_speed = c.f32()?;
    let retract_speed = c.f32()?;
    Ok((lift_height, lift_speed, retract_speed))
}

fn read_machine_name(reader: &mut ByteReader, slicer_info_offset: u64) -> Result<String> {
    // The slicer-info block holds an (offset, length) indirection pair
    // pointing at the machine name string.
    let raw = reader.read_at(slicer_info_offset, 8)?;
    let mut c = SliceCursor::new(&raw);
    let name_offset = c.u32()? as u64;
    let name_len = c.u32()? as usize;
    if name_len == 0 || name_len > 256 {
        return Err(Error::SettingsDecryption("implausible machine name length".into()));
    }
    let bytes = reader.read_at(name_offset, name_len)?;
    String::from_utf8(bytes)
        .map(|s| s.trim_end_matches('\0').to_string())
        .map_err(|_| Error::SettingsDecryption("machine name is not valid UTF-8".into()))
}

/// Fields extracted from the decrypted 288-byte CTB v4E settings block
/// (spec.md §4.2).
#[derive(Debug, Clone)]
pub struct CtbV4ESettings {
    pub display_mm_x: f32,
    pub display_mm_y: f32,
    pub bed_mm_z: f32,
    pub layer_height_mm: f32,
    pub bottom_exposure_s: f32,
    pub normal_exposure_s: f32,
    pub bottom_layer_count: u32,
    pub resolution_x: u32,
    pub resolution_y: u32,
    pub large_preview_offset: u32,
    pub small_preview_offset: u32,
    pub layer_count: u32,
    pub lift_height_mm: f32,
    pub lift_speed_mm_min: f32,
    pub retract_speed_mm_min: f32,
    pub xor_key: u32,
}

pub fn parse_v4e_settings(decrypted: &[u8]) -> Result<CtbV4ESettings> {
    if decrypted.len() < 132 {
        return Err(Error::UnexpectedEof(0, 132 - decrypted.len()));
    }
    let f32_at = |off: usize| -> f32 {
        f32::from_le_bytes([
            decrypted[off],
            decrypted[off + 1],
            decrypted[off + 2],
            decrypted[off + 3],
        ])
    };
    let u32_at = |off: usize| -> u32 {
        u32::from_le_bytes([
            decrypted[off],
            decrypted[off + 1],
            decrypted[off + 2],
            decrypted[off + 3],
        ])
    };

    let display_mm_x = f32_at(12);
    let display_mm_y = f32_at(16);
    let bed_mm_z = f32_at(20);
    let layer_height_mm = f32_at(36);
    let normal_exposure_s = f32_at(40);
    let bottom_exposure_s = f32_at(44);
    let bottom_layer_count = u32_at(52);
    let resolution_x = u32_at(56);
    let resolution_y = u32_at(60);
    let layer_count = u32_at(64);
    let large_preview_offset = u32_at(68);
    let small_preview_offset = u32_at(72);

    let mut lift_height_mm = f32_at(92);
    let mut lift_speed_mm_min = f32_at(96);
    let mut retract_speed_mm_min = f32_at(100);
    if !(0.5 < lift_height_mm && lift_height_mm < 100.0) {
        lift_height_mm = 6.0;
    }
    if !(1.0 < lift_speed_mm_min && lift_speed_mm_min < 10_000.0) {
        lift_speed_mm_min = 540.0;
    }
    if !(1.0 < retract_speed_mm_min && retract_speed_mm_min < 10_000.0) {
        retract_speed_mm_min = 540.0;
    }

    let xor_key = u32_at(128);

    Ok(CtbV4ESettings {
        display_mm_x,
        display_mm_y,
        bed_mm_z,
        layer_height_mm,
        bottom_exposure_s,
        normal_exposure_s,
        bottom_layer_count,
        resolution_x,
        resolution_y,
        large_preview_offset,
        small_preview_offset,
        layer_count,
        lift_height_mm,
        lift_speed_mm_min,
        retract_speed_mm_min,
        xor_key,
    })
}

/// Header fields the v4E variant keeps in the plaintext 48-byte file header:
/// just enough to locate and size the encrypted settings block.
#[derive(Debug, Clone, Copy)]
pub struct V4EFileHeader {
    pub settings_offset: u32,
    pub settings_size: u32,
}

pub fn parse_v4e_file_header(reader: &mut ByteReader) -> Result<V4EFileHeader> {
    let raw = reader.read_at(0, 48)?;
    let mut c = SliceCursor::new(&raw);
    let _magic = c.u32()?;
    // The remaining plaintext fields before the settings pointer are unused
    // by this parser; only the pointer pair is load-bearing.
    c.seek(c.position() + 32);
    let settings_offset = c.u32()?;
    let settings_size = c.u32()?;
    Ok(V4EFileHeader {
        settings_offset,
        settings_size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_dispatch_covers_all_four_variants() {
        assert_eq!(
            ContainerKind::from_magic(0x12FD0066).unwrap(),
            ContainerKind::Cbddlp
        );
        assert_eq!(
            ContainerKind::from_magic(0x12FD0086).unwrap(),
            ContainerKind::CtbV2V3
        );
        assert_eq!(
            ContainerKind::from_magic(0x12FD0106).unwrap(),
            ContainerKind::CtbV4
        );
        assert_eq!(
            ContainerKind::from_magic(0x12FD0107).unwrap(),
            ContainerKind::CtbV4E
        );
        assert!(ContainerKind::from_magic(0xDEADBEEF).is_err());
    }

    #[test]
    fn lift_bounds_reject_implausible_values() {
        let mut block = vec![0u8; 288];
        block[92..96].copy_from_slice(&1000.0f32.to_le_bytes());
        block[96..100].copy_from_slice(&(-5.0f32).to_le_bytes());
        block[100..104].copy_from_slice(&50_000.0f32.to_le_bytes());
        let parsed = parse_v4e_settings(&block).unwrap();
        assert_eq!(parsed.lift_height_mm, 6.0);
        assert_eq!(parsed.lift_speed_mm_min, 540.0);
        assert_eq!(parsed.retract_speed_mm_min, 540.0);
    }

    #[test]
    fn lift_bounds_keep_plausible_values() {
        let mut block = vec![0u8; 288];
        block[92..96].copy_from_slice(&8.0f32.to_le_bytes());
        block[96..100].copy_from_slice(&600.0f32.to_le_bytes());
        block[100..104].copy_from_slice(&600.0f32.to_le_bytes());
        let parsed = parse_v4e_settings(&block).unwrap();
        assert_eq!(parsed.lift_height_mm, 8.0);
        assert_eq!(parsed.lift_speed_mm_min, 600.0);
        assert_eq!(parsed.retract_speed_mm_min, 600.0);
    }
}
