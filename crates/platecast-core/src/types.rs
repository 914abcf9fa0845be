//! Core data model (spec.md §3).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Immutable record describing the source slice file, independent of the
/// chosen output profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SliceFileDescriptor {
    pub source_path: PathBuf,
    pub resolution_x: u32,
    pub resolution_y: u32,
    pub display_mm_x: f32,
    pub display_mm_y: f32,
    pub max_z_mm: f32,
    pub layer_height_mm: f32,
    pub layer_count: u32,
    pub bottom_layer_count: u32,
    pub bottom_exposure_s: f32,
    pub normal_exposure_s: f32,
    pub lift_height_mm: f32,
    pub lift_speed_mm_min: f32,
    pub retract_speed_mm_min: f32,
    pub machine_name: Option<String>,
    #[serde(skip)]
    pub preview_png: Option<Vec<u8>>,
}

/// One entry of the layer table. Produced exclusively by the container
/// parser; never mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerDef {
    pub data_offset: u64,
    pub data_length: u64,
    pub position_z_mm: f32,
    pub exposure_s: f32,
    pub light_off_s: f32,
}

/// Per-layer connected-component area statistics (spec.md §4.3.3).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayerAreaInfo {
    pub total_solid_area_mm2: f64,
    pub largest_island_mm2: f64,
    pub smallest_island_mm2: f64,
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
    pub island_count: u32,
}

impl LayerAreaInfo {
    pub const EMPTY: LayerAreaInfo = LayerAreaInfo {
        total_solid_area_mm2: 0.0,
        largest_island_mm2: 0.0,
        smallest_island_mm2: 0.0,
        min_x: 0,
        min_y: 0,
        max_x: 0,
        max_y: 0,
        island_count: 0,
    };

    pub fn is_empty(&self) -> bool {
        self.island_count == 0
    }
}

/// A target printer's driver/subpixel interpretation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoardType {
    Rgb8Bit,
    TwoSubpixelGreyscale,
}

/// Resolution class a source panel belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionClass {
    #[serde(rename = "12K")]
    TwelveK,
    #[serde(rename = "16K")]
    SixteenK,
}

impl ResolutionClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionClass::TwelveK => "12K",
            ResolutionClass::SixteenK => "16K",
        }
    }
}

/// A static catalog entry describing a target printer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrinterProfile {
    pub name: &'static str,
    pub manufacturer: &'static str,
    pub board_type: BoardType,
    pub resolution_x: u32,
    pub resolution_y: u32,
    pub display_mm_x: f32,
    pub display_mm_y: f32,
    pub max_z_mm: f32,
    pub png_output_width: u32,
    pub resolution_class: ResolutionClass,
}

/// Aggregates the slice-file descriptor plus the chosen target profile and
/// derived per-axis pixel pitch, feeding the JSON descriptors in C6.
#[derive(Debug, Clone)]
pub struct PlateMetadata {
    pub descriptor: SliceFileDescriptor,
    pub target_profile: PrinterProfile,
    pub x_pitch_mm: f64,
    pub y_pitch_mm: f64,
    pub output_layer_count: u32,
    pub thumbnail_png: Option<Vec<u8>>,
}

/// Terminal result of a conversion, surfaced to the consumer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionResult {
    pub success: bool,
    pub output_path: Option<PathBuf>,
    pub source_info: Option<SourceInfo>,
    pub target_profile: Option<PrinterProfile>,
    pub layer_count: u32,
    pub output_size_bytes: u64,
    #[serde(with = "duration_millis")]
    pub duration: Duration,
    pub error_message: Option<String>,
}

impl ConversionResult {
    pub fn failure(error_message: impl Into<String>, duration: Duration) -> Self {
        Self {
            success: false,
            output_path: None,
            source_info: None,
            target_profile: None,
            layer_count: 0,
            output_size_bytes: 0,
            duration,
            error_message: Some(error_message.into()),
        }
    }
}

/// Minimal summary of the source file, echoed back in `ConversionResult`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceInfo {
    pub path: PathBuf,
    pub resolution_x: u32,
    pub resolution_y: u32,
    pub layer_count: u32,
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        (d.as_millis() as u64).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(d)?;
        Ok(Duration::from_millis(millis))
    }
}
