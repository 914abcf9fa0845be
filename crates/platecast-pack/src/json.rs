//! JSON descriptor generation (spec.md §4.6).
//!
//! Every descriptor's shape is fixed by the NanoDLP consumer; fields that
//! have "no" value in this pipeline are still emitted with their documented
//! neutral value rather than omitted.

use platecast_core::types::{LayerAreaInfo, PlateMetadata};
use serde_json::{json, Value};

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

struct Aggregate {
    avg_total_solid_area_mm2: f64,
    min_x: u32,
    max_x: u32,
    min_y: u32,
    max_y: u32,
}

fn aggregate(layer_areas: &[LayerAreaInfo]) -> Aggregate {
    if layer_areas.is_empty() {
        return Aggregate {
            avg_total_solid_area_mm2: 0.0,
            min_x: 0,
            max_x: 0,
            min_y: 0,
            max_y: 0,
        };
    }

    let sum: f64 = layer_areas.iter().map(|a| a.total_solid_area_mm2).sum();
    let avg = sum / layer_areas.len() as f64;

    let non_empty: Vec<&LayerAreaInfo> = layer_areas.iter().filter(|a| !a.is_empty()).collect();
    if non_empty.is_empty() {
        return Aggregate {
            avg_total_solid_area_mm2: avg,
            min_x: 0,
            max_x: 0,
            min_y: 0,
            max_y: 0,
        };
    }

    let min_x = non_empty.iter().map(|a| a.min_x).min().unwrap();
    let max_x = non_empty.iter().map(|a| a.max_x).max().unwrap();
    let min_y = non_empty.iter().map(|a| a.min_y).min().unwrap();
    let max_y = non_empty.iter().map(|a| a.max_y).max().unwrap();

    Aggregate {
        avg_total_solid_area_mm2: avg,
        min_x,
        max_x,
        min_y,
        max_y,
    }
}

/// Builds `plate.json`.
pub fn build_plate_json(metadata: &PlateMetadata, layer_areas: &[LayerAreaInfo]) -> Value {
    let agg = aggregate(layer_areas);
    let descriptor = &metadata.descriptor;
    let layer_count = metadata.output_layer_count as f64;
    let layer_height = descriptor.layer_height_mm as f64;

    let total_solid_area = agg.avg_total_solid_area_mm2 * layer_height * layer_count / 1000.0;

    let w = metadata.target_profile.display_mm_x as f64;
    let h = metadata.target_profile.display_mm_y as f64;
    let x_min = agg.min_x as f64 * metadata.x_pitch_mm - w / 2.0;
    let x_max = (agg.max_x as f64 + 1.0) * metadata.x_pitch_mm - w / 2.0;
    let y_min = agg.min_y as f64 * metadata.y_pitch_mm - h / 2.0;
    let y_max = (agg.max_y as f64 + 1.0) * metadata.y_pitch_mm - h / 2.0;

    json!({
        "TotalSolidArea": round4(total_solid_area),
        "XMin": round4(x_min),
        "XMax": round4(x_max),
        "YMin": round4(y_min),
        "YMax": round4(y_max),
        "ZMax": round4(layer_height * layer_count),
        "LayersCount": metadata.output_layer_count,
    })
}

/// Builds `profile.json`.
pub fn build_profile_json(metadata: &PlateMetadata) -> Value {
    let descriptor = &metadata.descriptor;
    json!({
        "PixelSizeX": metadata.x_pitch_mm,
        "PixelSizeY": metadata.y_pitch_mm,
        "BottomExposure": descriptor.bottom_exposure_s,
        "Exposure": descriptor.normal_exposure_s,
        "LiftHeight": descriptor.lift_height_mm,
        "LiftSpeed": descriptor.lift_speed_mm_min,
        "RetractSpeed": descriptor.retract_speed_mm_min,
        "BottomLayers": descriptor.bottom_layer_count,
        "Depth": round1(descriptor.layer_height_mm as f64 * 1000.0),
    })
}

/// Builds `options.json`.
pub fn build_options_json(metadata: &PlateMetadata) -> Value {
    let profile = &metadata.target_profile;
    json!({
        "ResolutionX": profile.resolution_x,
        "ResolutionY": profile.resolution_y,
        "PixelSizeX": metadata.x_pitch_mm,
        "PixelSizeY": metadata.y_pitch_mm,
        "XOffset": profile.resolution_x as f64 / 2.0,
        "YOffset": profile.resolution_y as f64 / 2.0,
        "XRes": (metadata.x_pitch_mm * 1000.0).round(),
    })
}

/// Builds `info.json`, the per-layer area info descriptor. Returns `None`
/// when per-layer area info was never collected (the archive then omits the
/// entry entirely, per spec.md §4.6).
pub fn build_info_json(layer_areas: &[LayerAreaInfo]) -> Option<Value> {
    if layer_areas.is_empty() {
        return None;
    }
    let layers: Vec<Value> = layer_areas
        .iter()
        .enumerate()
        .map(|(i, a)| {
            json!({
                "Layer": i + 1,
                "TotalSolidArea": a.total_solid_area_mm2,
                "LargestIsland": a.largest_island_mm2,
                "SmallestIsland": a.smallest_island_mm2,
                "MinX": a.min_x,
                "MinY": a.min_y,
                "MaxX": a.max_x,
                "MaxY": a.max_y,
                "IslandCount": a.island_count,
            })
        })
        .collect();
    Some(json!({ "Layers": layers }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use platecast_core::types::{BoardType, PrinterProfile, ResolutionClass, SliceFileDescriptor};
    use std::path::PathBuf;

    fn sample_metadata() -> PlateMetadata {
        PlateMetadata {
            descriptor: SliceFileDescriptor {
                source_path: PathBuf::from("in.ctb"),
                resolution_x: 15_120,
                resolution_y: 6_230,
                display_mm_x: 219.36,
                display_mm_y: 123.12,
                max_z_mm: 260.0,
                layer_height_mm: 0.05,
                layer_count: 40,
                bottom_layer_count: 5,
                bottom_exposure_s: 32.0,
                normal_exposure_s: 2.3,
                lift_height_mm: 6.0,
                lift_speed_mm_min: 540.0,
                retract_speed_mm_min: 540.0,
                machine_name: None,
                preview_png: None,
            },
            target_profile: PrinterProfile {
                name: "test",
                manufacturer: "test",
                board_type: BoardType::TwoSubpixelGreyscale,
                resolution_x: 7_560,
                resolution_y: 6_230,
                display_mm_x: 219.36,
                display_mm_y: 123.12,
                max_z_mm: 260.0,
                png_output_width: 7_560,
                resolution_class: ResolutionClass::SixteenK,
            },
            x_pitch_mm: 219.36 / 7_560.0,
            y_pitch_mm: 123.12 / 6_230.0,
            output_layer_count: 40,
            thumbnail_png: None,
        }
    }

    #[test]
    fn plate_json_zmax_matches_layer_count_times_height() {
        let metadata = sample_metadata();
        let value = build_plate_json(&metadata, &[]);
        assert_eq!(value["ZMax"], json!(2.0));
        assert_eq!(value["LayersCount"], json!(40));
    }

    #[test]
    fn info_json_absent_when_no_area_data() {
        assert!(build_info_json(&[]).is_none());
    }

    #[test]
    fn info_json_present_with_layer_entries() {
        let areas = vec![LayerAreaInfo::EMPTY];
        let value = build_info_json(&areas).unwrap();
        assert_eq!(value["Layers"].as_array().unwrap().len(), 1);
    }
}
