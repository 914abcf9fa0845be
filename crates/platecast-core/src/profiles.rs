//! Printer profile catalog and resolution-class detector (spec.md §4.7, C7).

use crate::error::{Error, Result};
use crate::types::{BoardType, PrinterProfile, ResolutionClass};

/// Resolutions belonging to the 12K class (RGB_8BIT board family).
const TWELVE_K_WIDTHS: &[u32] = &[11_520];

/// Resolutions belonging to the 16K class (two-subpixel-greyscale family).
const SIXTEEN_K_WIDTHS: &[u32] = &[15_120, 15_136, 15_360];

/// Determines which resolution class a source resolution-x value belongs to,
/// or `None` if it doesn't match either known family.
pub fn class_of(resolution_x: u32) -> Option<ResolutionClass> {
    if TWELVE_K_WIDTHS.contains(&resolution_x) {
        Some(ResolutionClass::TwelveK)
    } else if SIXTEEN_K_WIDTHS.contains(&resolution_x) {
        Some(ResolutionClass::SixteenK)
    } else {
        None
    }
}

fn catalog() -> &'static [PrinterProfile] {
    static CATALOG: once_cell::sync::Lazy<Vec<PrinterProfile>> = once_cell::sync::Lazy::new(|| {
        vec![
            PrinterProfile {
                name: "Generic 12K RGB",
                manufacturer: "generic",
                board_type: BoardType::Rgb8Bit,
                resolution_x: 11_520,
                resolution_y: 5_120,
                display_mm_x: 218.88,
                display_mm_y: 122.88,
                max_z_mm: 260.0,
                png_output_width: 3_840,
                resolution_class: ResolutionClass::TwelveK,
            },
            PrinterProfile {
                name: "Generic 16K Mono",
                manufacturer: "generic",
                board_type: BoardType::TwoSubpixelGreyscale,
                resolution_x: 15_360,
                resolution_y: 7_680,
                display_mm_x: 218.88,
                display_mm_y: 122.88,
                max_z_mm: 260.0,
                png_output_width: 7_680,
                resolution_class: ResolutionClass::SixteenK,
            },
            PrinterProfile {
                name: "Elegoo Saturn 3 Ultra",
                manufacturer: "Elegoo",
                board_type: BoardType::TwoSubpixelGreyscale,
                resolution_x: 15_120,
                resolution_y: 6_230,
                display_mm_x: 219.36,
                display_mm_y: 123.12,
                max_z_mm: 260.0,
                png_output_width: 7_560,
                resolution_class: ResolutionClass::SixteenK,
            },
            PrinterProfile {
                name: "Elegoo Saturn 4 Ultra",
                manufacturer: "Elegoo",
                board_type: BoardType::TwoSubpixelGreyscale,
                resolution_x: 15_136,
                resolution_y: 6_480,
                display_mm_x: 223.72,
                display_mm_y: 126.6,
                max_z_mm: 165.0,
                png_output_width: 7_568,
                resolution_class: ResolutionClass::SixteenK,
            },
            PrinterProfile {
                name: "Phrozen Sonic Mighty 12K",
                manufacturer: "Phrozen",
                board_type: BoardType::Rgb8Bit,
                resolution_x: 11_520,
                resolution_y: 5_120,
                display_mm_x: 223.02,
                display_mm_y: 125.71,
                max_z_mm: 218.0,
                png_output_width: 3_840,
                resolution_class: ResolutionClass::TwelveK,
            },
        ]
    });
    &CATALOG
}

/// Picks the default conversion target for a source resolution: 16K sources
/// map to the greyscale default, 12K sources to the RGB default, per
/// spec.md's detector rules.
pub fn detect_target(resolution_x: u32, resolution_y: u32) -> Option<PrinterProfile> {
    let class = class_of(resolution_x)?;
    catalog()
        .iter()
        .find(|p| {
            p.resolution_class == class
                && p.resolution_x == resolution_x
                && (resolution_y == 0 || p.resolution_y == resolution_y)
        })
        .or_else(|| catalog().iter().find(|p| p.resolution_class == class))
        .cloned()
}

/// Identifies a known source profile for a resolution pair, used by
/// `platecast info`/`platecast validate` to label the input file.
pub fn detect_source(resolution_x: u32, resolution_y: u32) -> Option<PrinterProfile> {
    catalog()
        .iter()
        .find(|p| p.resolution_x == resolution_x && p.resolution_y == resolution_y)
        .cloned()
}

/// Confirms a resolution pair belongs to a supported class, returning the
/// dedicated `UnsupportedResolution` error otherwise.
pub fn validate(resolution_x: u32, resolution_y: u32) -> Result<()> {
    if class_of(resolution_x).is_some() {
        Ok(())
    } else {
        Err(Error::UnsupportedResolution {
            x: resolution_x,
            y: resolution_y,
        })
    }
}

/// Looks up a catalog entry by its exact display name, for `--target-profile`
/// overrides.
pub fn find_by_name(name: &str) -> Option<PrinterProfile> {
    catalog().iter().find(|p| p.name == name).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_widths() {
        assert_eq!(class_of(11_520), Some(ResolutionClass::TwelveK));
        assert_eq!(class_of(15_360), Some(ResolutionClass::SixteenK));
        assert_eq!(class_of(1_620), None);
    }

    #[test]
    fn detects_target_for_each_class() {
        let twelve_k = detect_target(11_520, 5_120).unwrap();
        assert_eq!(twelve_k.resolution_class, ResolutionClass::TwelveK);
        assert_eq!(twelve_k.board_type, BoardType::Rgb8Bit);

        let sixteen_k = detect_target(15_360, 0).unwrap();
        assert_eq!(sixteen_k.resolution_class, ResolutionClass::SixteenK);
        assert_eq!(sixteen_k.board_type, BoardType::TwoSubpixelGreyscale);
    }

    #[test]
    fn unknown_resolution_fails_validation() {
        assert!(validate(1_620, 2_560).is_err());
        assert!(validate(11_520, 5_120).is_ok());
    }
}
