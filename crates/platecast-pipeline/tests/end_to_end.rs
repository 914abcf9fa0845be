//! End-to-end orchestrator runs against synthetic CBDDLP containers,
//! covering the conversion scenarios exercised by platecast's C5 worker pool.

use std::io::{Read, Write};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use platecast_pipeline::{convert, ConvertOptions};

const CBDDLP_MAGIC: u32 = 0x12FD_0066;
const LEGACY_ENTRY_SIZE: usize = 36;
const HEADER_SIZE: usize = 108;

/// Builds a minimal legacy-table CBDDLP file: extended header + contiguous
/// 36-byte layer entries + raw (unencrypted, since `xor_key` is left at 0)
/// layer payload bytes.
fn build_cbddlp(
    resolution_x: u32,
    resolution_y: u32,
    layer_height_mm: f32,
    bed_mm_z: f32,
    layers: &[Vec<u8>],
) -> Vec<u8> {
    let layer_count = layers.len() as u32;
    let table_offset = HEADER_SIZE as u32;

    let mut bytes = vec![0u8; HEADER_SIZE];
    bytes[0..4].copy_from_slice(&CBDDLP_MAGIC.to_le_bytes());
    bytes[4..8].copy_from_slice(&2u32.to_le_bytes());
    bytes[8..12].copy_from_slice(&68.0f32.to_le_bytes());
    bytes[12..16].copy_from_slice(&120.0f32.to_le_bytes());
    bytes[16..20].copy_from_slice(&bed_mm_z.to_le_bytes());
    bytes[28..32].copy_from_slice(&layer_height_mm.to_le_bytes());
    bytes[32..36].copy_from_slice(&2.0f32.to_le_bytes());
    bytes[36..40].copy_from_slice(&8.0f32.to_le_bytes());
    bytes[48..52].copy_from_slice(&resolution_x.to_le_bytes());
    bytes[52..56].copy_from_slice(&resolution_y.to_le_bytes());
    bytes[60..64].copy_from_slice(&table_offset.to_le_bytes());
    bytes[64..68].copy_from_slice(&layer_count.to_le_bytes());

    let table_start = bytes.len();
    bytes.resize(table_start + layers.len() * LEGACY_ENTRY_SIZE, 0);

    for (i, payload) in layers.iter().enumerate() {
        let data_offset = bytes.len() as u32;
        bytes.extend_from_slice(payload);
        let entry_start = table_start + i * LEGACY_ENTRY_SIZE;
        bytes[entry_start..entry_start + 4]
            .copy_from_slice(&(i as f32 * layer_height_mm).to_le_bytes());
        bytes[entry_start + 20..entry_start + 24].copy_from_slice(&data_offset.to_le_bytes());
        bytes[entry_start + 24..entry_start + 28]
            .copy_from_slice(&(payload.len() as u32).to_le_bytes());
        bytes[entry_start + 28..entry_start + 32].copy_from_slice(&2.0f32.to_le_bytes());
    }
    bytes
}

/// A single RLE run covering every pixel at grey 0, short enough to qualify
/// for the blank-layer fast path (platecast_codec::rle::BLANK_LAYER_THRESHOLD_BYTES).
fn blank_layer_payload(pixel_count: u32) -> Vec<u8> {
    vec![0x80, (pixel_count.min(0x7F)) as u8]
}

/// `pixel_count` literal (non-run) bytes, each a distinct low grey value.
fn solid_layer_payload(pixel_count: u32) -> Vec<u8> {
    (0..pixel_count).map(|i| (i % 0x7F) as u8).collect()
}

fn write_fixture(bytes: &[u8]) -> tempfile::NamedTempFile {
    let mut f = tempfile::NamedTempFile::with_suffix(".cbddlp").unwrap();
    f.write_all(bytes).unwrap();
    f.flush().unwrap();
    f
}

fn read_zip_entry(path: &std::path::Path, name: &str) -> Option<Vec<u8>> {
    let file = std::fs::File::open(path).unwrap();
    let mut archive = zip::ZipArchive::new(file).unwrap();
    let mut entry = archive.by_name(name).ok()?;
    let mut buf = Vec::new();
    entry.read_to_end(&mut buf).unwrap();
    Some(buf)
}

fn zip_names(path: &std::path::Path) -> Vec<String> {
    let file = std::fs::File::open(path).unwrap();
    let archive = zip::ZipArchive::new(file).unwrap();
    archive.file_names().map(|s| s.to_string()).collect()
}

#[test]
fn oversized_print_height_fails_with_exceeds_message() {
    let bytes = build_cbddlp(
        4,
        4,
        0.05,
        260.0,
        &[blank_layer_payload(16), solid_layer_payload(16)],
    );
    let file = write_fixture(&bytes);

    let options = ConvertOptions {
        target_profile: Some("Generic 12K RGB".to_string()),
        max_z_override: Some(0.01),
        ..Default::default()
    };

    let result = convert(
        file.path(),
        options,
        4,
        None,
        None,
        Arc::new(AtomicBool::new(false)),
        None,
    );

    assert!(!result.success);
    let message = result.error_message.unwrap();
    assert!(message.contains("exceeds"), "unexpected message: {message}");
}

#[test]
fn unsupported_resolution_fails_without_profile_override() {
    let bytes = build_cbddlp(1_620, 2_560, 0.05, 260.0, &[vec![0xAA]]);
    let file = write_fixture(&bytes);

    let result = convert(
        file.path(),
        ConvertOptions::default(),
        4,
        None,
        None,
        Arc::new(AtomicBool::new(false)),
        None,
    );

    assert!(!result.success);
    let message = result.error_message.unwrap().to_lowercase();
    assert!(
        message.contains("unsupported resolution"),
        "unexpected message: {message}"
    );
}

#[test]
fn missing_preview_produces_archive_without_thumbnail() {
    let bytes = build_cbddlp(4, 4, 0.05, 260.0, &[solid_layer_payload(16)]);
    let file = write_fixture(&bytes);
    let out_dir = tempfile::tempdir().unwrap();

    let options = ConvertOptions {
        target_profile: Some("Generic 12K RGB".to_string()),
        output_directory: Some(out_dir.path().to_path_buf()),
        ..Default::default()
    };

    let result = convert(
        file.path(),
        options,
        4,
        None,
        None,
        Arc::new(AtomicBool::new(false)),
        None,
    );

    assert!(result.success, "{:?}", result.error_message);
    let output_path = result.output_path.unwrap();
    let names = zip_names(&output_path);
    assert!(!names.iter().any(|n| n == "3d.png"));
    assert!(names.iter().any(|n| n == "plate.json"));
    assert!(names.iter().any(|n| n == "1.png"));
}

#[test]
fn blank_layer_uses_cached_png_and_recompression_is_skipped_for_tiny_output() {
    let bytes = build_cbddlp(
        4,
        4,
        0.05,
        260.0,
        &[blank_layer_payload(16), solid_layer_payload(16)],
    );
    let file = write_fixture(&bytes);
    let out_dir = tempfile::tempdir().unwrap();
    let (log_tx, log_rx) = crossbeam_channel::unbounded();

    let options = ConvertOptions {
        target_profile: Some("Generic 12K RGB".to_string()),
        output_directory: Some(out_dir.path().to_path_buf()),
        ..Default::default()
    };

    let result = convert(
        file.path(),
        options,
        4,
        None,
        Some(log_tx),
        Arc::new(AtomicBool::new(false)),
        None,
    );

    assert!(result.success, "{:?}", result.error_message);
    let output_path = result.output_path.unwrap();

    let blank_entry = read_zip_entry(&output_path, "1.png").unwrap();
    assert_eq!(blank_entry, *platecast_png::BLANK_LAYER_PNG);

    let solid_entry = read_zip_entry(&output_path, "2.png").unwrap();
    assert_ne!(solid_entry, *platecast_png::BLANK_LAYER_PNG);

    let logs: Vec<String> = log_rx.try_iter().collect();
    assert!(
        logs.iter().any(|l| l.contains("recompression skipped")),
        "expected a skip log, got: {logs:?}"
    );
}

#[test]
fn cancellation_before_dispatch_short_circuits_with_cancelled_message() {
    let bytes = build_cbddlp(4, 4, 0.05, 260.0, &[solid_layer_payload(16)]);
    let file = write_fixture(&bytes);

    let options = ConvertOptions {
        target_profile: Some("Generic 12K RGB".to_string()),
        ..Default::default()
    };
    let cancel = Arc::new(AtomicBool::new(true));

    let result = convert(file.path(), options, 4, None, None, cancel, None);

    assert!(!result.success);
    assert_eq!(result.error_message.as_deref(), Some("cancelled"));
}
