//! Pipeline orchestrator (spec.md §4.5, C5): worker pool, chunked dispatch,
//! debounced progress, blank-layer fast path, cancellation.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Sender};

use platecast_codec::rle::is_blank_candidate;
use platecast_codec::{compute_area_info, decode_rle, keystream, remap_row};
use platecast_core::types::{LayerAreaInfo, PlateMetadata};
use platecast_core::{profiles, BoardType, ConversionResult, Parser, PrinterProfile, SourceInfo};
use platecast_pack::{
    build_info_json, build_options_json, build_plate_json, build_profile_json, write_archive,
    ArchiveEntry,
};
use platecast_png::{decide_adaptive_recompression, encode_png, recompress, ColorType, LayerPngStats};

use crate::analytics::{AnalyticsCollector, AnalyticsReport, WorkerTiming};
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Open,
    Read,
    Process,
    Recompress,
    Write,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub current: u32,
    pub total: u32,
    pub phase: Phase,
    pub workers: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecompressMode {
    Adaptive,
    On,
    Off,
}

/// Conversion options (spec.md §6).
#[derive(Debug, Clone, Default)]
pub struct ConvertOptions {
    pub target_profile: Option<String>,
    pub max_z_override: Option<f32>,
    pub output_directory: Option<PathBuf>,
    pub output_name: Option<String>,
    pub fast_mode: bool,
    pub process_png_level: Option<u32>,
    pub recompress_mode: Option<RecompressMode>,
    pub preload_layers: bool,
    pub analytics: bool,
    pub cpu_host_workers: Option<usize>,
    pub gpu_host_workers: Option<usize>,
    pub autotune: bool,
}

impl ConvertOptions {
    fn resolved_png_level(&self) -> u32 {
        if self.fast_mode {
            0
        } else {
            self.process_png_level.unwrap_or(6)
        }
    }

    fn resolved_recompress_mode(&self) -> RecompressMode {
        if self.fast_mode {
            RecompressMode::Off
        } else {
            self.recompress_mode.unwrap_or(RecompressMode::Adaptive)
        }
    }
}

const PRELOAD_LAYER_THRESHOLD: u32 = 200;

fn concurrency_for(layer_count: u32, user_max: Option<usize>, logical_cores: usize) -> usize {
    let base: usize = if layer_count < 100 {
        3
    } else if layer_count < 500 {
        8
    } else {
        12
    };
    let mut concurrency = base.min(logical_cores.max(1));
    if let Some(max) = user_max {
        concurrency = concurrency.min(max.max(1));
    }
    concurrency.max(1)
}

fn process_chunk_size(layer_count: u32, concurrency: usize) -> usize {
    const TARGET_WAVES: f64 = 2.5;
    let total_chunks = (concurrency as f64 * TARGET_WAVES).max(1.0);
    let raw = (layer_count as f64 / total_chunks).ceil().max(1.0) as usize;
    raw.clamp(12, 64)
}

fn recompress_chunk_count(total_layers: usize) -> usize {
    if total_layers == 0 {
        0
    } else {
        total_layers.min(8).max(total_layers.min(2))
    }
}

/// Splits `layer_pngs` into up to `chunk_count` contiguous slices and
/// recompresses each slice on its own thread.
fn parallel_recompress(layer_pngs: &mut [Vec<u8>], chunk_count: usize) {
    let total = layer_pngs.len();
    if total == 0 || chunk_count == 0 {
        return;
    }
    let chunk_len = total.div_ceil(chunk_count);

    std::thread::scope(|scope| {
        let mut remaining: &mut [Vec<u8>] = layer_pngs;
        let mut handles = Vec::new();
        while !remaining.is_empty() {
            let take = chunk_len.min(remaining.len());
            let (chunk, rest) = remaining.split_at_mut(take);
            remaining = rest;
            handles.push(scope.spawn(move || {
                for png in chunk.iter_mut() {
                    *png = recompress(png, 9);
                }
            }));
        }
        for handle in handles {
            let _ = handle.join();
        }
    });
}

struct LayerJob {
    layer_index: u32,
    raw: Vec<u8>,
}

struct LayerResult {
    layer_index: u32,
    png: Vec<u8>,
    area: LayerAreaInfo,
    timing: WorkerTiming,
}

#[allow(clippy::too_many_arguments)]
fn process_one_layer(
    job: LayerJob,
    global_key: u32,
    resolution_x: u32,
    resolution_y: u32,
    board_type: BoardType,
    output_width: u32,
    x_pitch_mm: f64,
    y_pitch_mm: f64,
    png_level: u32,
) -> Result<LayerResult> {
    let start = Instant::now();

    let mut raw = job.raw;
    keystream::apply_keystream(&mut raw, global_key, job.layer_index);

    let decode_start = Instant::now();
    let expected_pixels = resolution_x as usize * resolution_y as usize;
    let decoded = decode_rle(&raw, expected_pixels);
    let decode_ns = decode_start.elapsed().as_nanos() as u64;

    if is_blank_candidate(&raw) {
        return Ok(LayerResult {
            layer_index: job.layer_index,
            png: platecast_png::BLANK_LAYER_PNG.clone(),
            area: LayerAreaInfo::EMPTY,
            timing: WorkerTiming {
                worker_id: 0,
                layers: 1,
                total_ns: start.elapsed().as_nanos() as u64,
                decode_ns,
                scanline_ns: 0,
                compress_ns: 0,
                png_ns: 0,
            },
        });
    }

    let stats_start = Instant::now();
    let pixel_area_mm2 = x_pitch_mm * y_pitch_mm;
    let area = compute_area_info(&decoded, resolution_x, resolution_y, pixel_area_mm2);
    let stats_ns = stats_start.elapsed().as_nanos() as u64;

    let scanline_start = Instant::now();
    let mut remapped = Vec::with_capacity(resolution_y as usize * output_width as usize * 3);
    for y in 0..resolution_y as usize {
        let row = &decoded[y * resolution_x as usize..(y + 1) * resolution_x as usize];
        remapped.extend_from_slice(&remap_row(row, output_width as usize, board_type));
    }
    let scanline_ns = scanline_start.elapsed().as_nanos() as u64;

    let compress_start = Instant::now();
    let color_type = match board_type {
        BoardType::Rgb8Bit => ColorType::Rgb8,
        BoardType::TwoSubpixelGreyscale => ColorType::Grey8,
    };
    let png = encode_png(&remapped, output_width, resolution_y, color_type, png_level)?;
    let compress_ns = compress_start.elapsed().as_nanos() as u64;

    Ok(LayerResult {
        layer_index: job.layer_index,
        png,
        area,
        timing: WorkerTiming {
            worker_id: 0,
            layers: 1,
            total_ns: start.elapsed().as_nanos() as u64,
            decode_ns: decode_ns + stats_ns,
            scanline_ns,
            compress_ns,
            png_ns: 0,
        },
    })
}

struct ProgressReporter {
    tx: Option<Sender<ProgressEvent>>,
    last_sent: Mutex<Option<Instant>>,
}

impl ProgressReporter {
    fn new(tx: Option<Sender<ProgressEvent>>) -> Self {
        Self {
            tx,
            last_sent: Mutex::new(None),
        }
    }

    fn send_forced(&self, event: ProgressEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
        *self.last_sent.lock().unwrap() = Some(Instant::now());
    }

    fn send_debounced(&self, event: ProgressEvent) {
        let mut last = self.last_sent.lock().unwrap();
        let should_send = last.map(|t| t.elapsed() >= Duration::from_millis(250)).unwrap_or(true);
        if should_send {
            if let Some(tx) = &self.tx {
                let _ = tx.send(event);
            }
            *last = Some(Instant::now());
        }
    }
}

/// Drives one end-to-end conversion. `logical_cores` is injected so tests
/// don't depend on the host machine's actual core count.
#[allow(clippy::too_many_arguments)]
pub fn convert(
    path: &Path,
    options: ConvertOptions,
    logical_cores: usize,
    progress_tx: Option<Sender<ProgressEvent>>,
    log_tx: Option<Sender<String>>,
    cancel: Arc<AtomicBool>,
    analytics_tx: Option<Sender<AnalyticsReport>>,
) -> ConversionResult {
    let started = Instant::now();
    let progress = ProgressReporter::new(progress_tx);
    let log = |msg: String| {
        if let Some(tx) = &log_tx {
            let _ = tx.send(msg);
        }
    };

    match run(
        path,
        options,
        logical_cores,
        &progress,
        &log,
        &cancel,
        &analytics_tx,
    ) {
        Ok(result) => result,
        Err(err) => {
            log(format!("ERROR: {err}"));
            ConversionResult::failure(err.to_string(), started.elapsed())
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn run(
    path: &Path,
    options: ConvertOptions,
    logical_cores: usize,
    progress: &ProgressReporter,
    log: &impl Fn(String),
    cancel: &Arc<AtomicBool>,
    analytics_tx: &Option<Sender<AnalyticsReport>>,
) -> Result<ConversionResult> {
    let started = Instant::now();

    progress.send_forced(ProgressEvent {
        current: 0,
        total: 1,
        phase: Phase::Open,
        workers: None,
    });
    let mut parser = Parser::open(path)?;
    let descriptor = parser.descriptor.clone();

    let target_profile =
        resolve_target_profile(&options, descriptor.resolution_x, descriptor.resolution_y)?;

    let max_z = options.max_z_override.unwrap_or(target_profile.max_z_mm);
    let print_height = descriptor.layer_count as f64 * descriptor.layer_height_mm as f64;
    if print_height > max_z as f64 {
        return Err(platecast_core::Error::HeightExceedsMaxZ {
            height_mm: print_height,
            max_z_mm: max_z as f64,
        }
        .into());
    }

    progress.send_forced(ProgressEvent {
        current: 1,
        total: 1,
        phase: Phase::Open,
        workers: None,
    });

    if cancel.load(Ordering::SeqCst) {
        return Ok(ConversionResult::failure("cancelled", started.elapsed()));
    }

    let layer_count = parser.layer_count();
    let x_pitch_mm = target_profile.display_mm_x as f64 / target_profile.png_output_width as f64;
    let y_pitch_mm = target_profile.display_mm_y as f64 / target_profile.resolution_y as f64;

    let concurrency = concurrency_for(layer_count, options.cpu_host_workers, logical_cores);
    progress.send_forced(ProgressEvent {
        current: 0,
        total: layer_count,
        phase: Phase::Read,
        workers: Some(concurrency),
    });

    let preload = layer_count <= PRELOAD_LAYER_THRESHOLD || options.preload_layers;
    let mut preloaded: Vec<Option<Vec<u8>>> = Vec::new();
    if preload {
        for i in 0..layer_count {
            preloaded.push(Some(parser.read_layer_payload(i as usize)?));
        }
    }
    progress.send_forced(ProgressEvent {
        current: layer_count,
        total: layer_count,
        phase: Phase::Read,
        workers: Some(concurrency),
    });

    if cancel.load(Ordering::SeqCst) {
        return Ok(ConversionResult::failure("cancelled", started.elapsed()));
    }

    let chunk_size = process_chunk_size(layer_count, concurrency);
    let board_type = target_profile.board_type;
    let output_width = target_profile.png_output_width;
    let png_level = options.resolved_png_level();
    let global_key = parser.xor_key;
    let resolution_x = descriptor.resolution_x;
    let resolution_y = descriptor.resolution_y;

    let analytics = if options.analytics {
        Some(Arc::new(AnalyticsCollector::new()))
    } else {
        None
    };

    let (job_tx, job_rx) = bounded::<LayerJob>(concurrency + 1);
    let (result_tx, result_rx) = bounded::<Result<LayerResult>>(concurrency + 1);

    let handles: Vec<_> = (0..concurrency)
        .map(|_| {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();
            std::thread::spawn(move || {
                while let Ok(job) = job_rx.recv() {
                    let result = process_one_layer(
                        job,
                        global_key,
                        resolution_x,
                        resolution_y,
                        board_type,
                        output_width,
                        x_pitch_mm,
                        y_pitch_mm,
                        png_level,
                    );
                    if result_tx.send(result).is_err() {
                        break;
                    }
                }
            })
        })
        .collect();
    drop(job_rx);
    drop(result_tx);

    let mut results: Vec<Option<(Vec<u8>, LayerAreaInfo)>> = (0..layer_count).map(|_| None).collect();
    let mut completed: u32 = 0;
    let mut cancelled = false;

    'dispatch: for chunk_start in (0..layer_count).step_by(chunk_size) {
        if cancel.load(Ordering::SeqCst) {
            cancelled = true;
            break 'dispatch;
        }
        let chunk_end = (chunk_start + chunk_size as u32).min(layer_count);
        for layer_index in chunk_start..chunk_end {
            let raw = if let Some(slot) = preloaded.get_mut(layer_index as usize) {
                slot.take().expect("each preloaded layer is dispatched exactly once")
            } else {
                parser.read_layer_payload(layer_index as usize)?
            };
            if job_tx.send(LayerJob { layer_index, raw }).is_err() {
                break 'dispatch;
            }
        }

        while completed < chunk_end {
            match result_rx.recv() {
                Ok(Ok(result)) => {
                    if let Some(analytics) = &analytics {
                        analytics.record_worker(result.timing.clone());
                    }
                    results[result.layer_index as usize] = Some((result.png, result.area));
                    completed += 1;
                    progress.send_debounced(ProgressEvent {
                        current: completed,
                        total: layer_count,
                        phase: Phase::Process,
                        workers: Some(concurrency),
                    });
                }
                Ok(Err(err)) => return Err(err),
                Err(_) => break,
            }
        }
    }

    drop(job_tx);
    for handle in handles {
        let _ = handle.join();
    }

    if cancelled {
        return Ok(ConversionResult::failure("cancelled", started.elapsed()));
    }

    progress.send_forced(ProgressEvent {
        current: layer_count,
        total: layer_count,
        phase: Phase::Process,
        workers: Some(concurrency),
    });

    let mut layer_pngs: Vec<Vec<u8>> = Vec::with_capacity(layer_count as usize);
    let mut layer_areas: Vec<LayerAreaInfo> = Vec::with_capacity(layer_count as usize);
    for slot in results {
        let (png, area) = slot.expect("every dispatched layer produces exactly one result");
        layer_pngs.push(png);
        layer_areas.push(area);
    }

    let recompress_mode = options.resolved_recompress_mode();
    progress.send_forced(ProgressEvent {
        current: 0,
        total: layer_count,
        phase: Phase::Recompress,
        workers: None,
    });

    let should_recompress = match recompress_mode {
        RecompressMode::On => true,
        RecompressMode::Off => false,
        RecompressMode::Adaptive => {
            let stats: Vec<LayerPngStats> = layer_pngs
                .iter()
                .enumerate()
                .map(|(i, p)| LayerPngStats {
                    layer_index: i as u32,
                    original_size: p.len(),
                })
                .collect();
            let decision = decide_adaptive_recompression(&stats, |idx| {
                let orig = &layer_pngs[idx as usize];
                let recompressed = recompress(orig, 9);
                (orig.len(), recompressed.len())
            });
            decision == platecast_png::RecompressDecision::Run
        }
    };

    if should_recompress {
        let chunk_count = recompress_chunk_count(layer_count as usize).max(1);
        parallel_recompress(&mut layer_pngs, chunk_count);
        log("recompression pass applied".to_string());
    } else {
        log("recompression skipped".to_string());
    }

    progress.send_forced(ProgressEvent {
        current: layer_count,
        total: layer_count,
        phase: Phase::Recompress,
        workers: None,
    });

    progress.send_forced(ProgressEvent {
        current: 0,
        total: 1,
        phase: Phase::Write,
        workers: None,
    });

    let thumbnail_png = parser
        .preview
        .as_ref()
        .and_then(|p| encode_png(&p.rgb8, p.width, p.height, ColorType::Rgb8, 6).ok());

    let metadata = PlateMetadata {
        descriptor: descriptor.clone(),
        target_profile: target_profile.clone(),
        x_pitch_mm,
        y_pitch_mm,
        output_layer_count: layer_count,
        thumbnail_png,
    };

    let plate_json = serde_json::to_vec_pretty(&build_plate_json(&metadata, &layer_areas))
        .map_err(platecast_pack::Error::from)?;
    let profile_json = serde_json::to_vec_pretty(&build_profile_json(&metadata))
        .map_err(platecast_pack::Error::from)?;
    let options_json = serde_json::to_vec_pretty(&build_options_json(&metadata))
        .map_err(platecast_pack::Error::from)?;
    let info_json = build_info_json(&layer_areas)
        .map(|v| serde_json::to_vec_pretty(&v).map_err(platecast_pack::Error::from))
        .transpose()?;

    let mut entries: Vec<ArchiveEntry> = vec![
        ArchiveEntry {
            name: "plate.json".to_string(),
            data: &plate_json,
        },
        ArchiveEntry {
            name: "profile.json".to_string(),
            data: &profile_json,
        },
    ];
    if let Some(info_json) = &info_json {
        entries.push(ArchiveEntry {
            name: "info.json".to_string(),
            data: info_json,
        });
    }
    entries.push(ArchiveEntry {
        name: "options.json".to_string(),
        data: &options_json,
    });
    if let Some(thumbnail) = &metadata.thumbnail_png {
        if !thumbnail.is_empty() {
            entries.push(ArchiveEntry {
                name: "3d.png".to_string(),
                data: thumbnail,
            });
        }
    }
    let layer_names: Vec<String> = (0..layer_count).map(|i| format!("{}.png", i + 1)).collect();
    for (name, png) in layer_names.iter().zip(layer_pngs.iter()) {
        entries.push(ArchiveEntry {
            name: name.clone(),
            data: png,
        });
    }

    let output_path = resolve_output_path(path, &options);
    write_archive(&output_path, &entries)?;

    progress.send_forced(ProgressEvent {
        current: 1,
        total: 1,
        phase: Phase::Write,
        workers: None,
    });

    let output_size_bytes = std::fs::metadata(&output_path).map(|m| m.len()).unwrap_or(0);

    if let (Some(collector), Some(tx)) = (&analytics, analytics_tx) {
        let _ = tx.send(collector.report(concurrency, logical_cores));
    }

    Ok(ConversionResult {
        success: true,
        output_path: Some(output_path),
        source_info: Some(SourceInfo {
            path: path.to_path_buf(),
            resolution_x: descriptor.resolution_x,
            resolution_y: descriptor.resolution_y,
            layer_count,
        }),
        target_profile: Some(target_profile),
        layer_count,
        output_size_bytes,
        duration: started.elapsed(),
        error_message: None,
    })
}

fn resolve_target_profile(
    options: &ConvertOptions,
    resolution_x: u32,
    resolution_y: u32,
) -> Result<PrinterProfile> {
    if let Some(name) = &options.target_profile {
        return profiles::find_by_name(name).ok_or_else(|| {
            platecast_core::Error::NoTargetProfile {
                x: resolution_x,
                y: resolution_y,
            }
            .into()
        });
    }
    profiles::validate(resolution_x, resolution_y)?;
    profiles::detect_target(resolution_x, resolution_y).ok_or_else(|| {
        platecast_core::Error::NoTargetProfile {
            x: resolution_x,
            y: resolution_y,
        }
        .into()
    })
}

fn resolve_output_path(source_path: &Path, options: &ConvertOptions) -> PathBuf {
    let stem = options
        .output_name
        .clone()
        .or_else(|| {
            source_path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
        })
        .unwrap_or_else(|| "output".to_string());
    let dir = options
        .output_directory
        .clone()
        .or_else(|| source_path.parent().map(|p| p.to_path_buf()))
        .unwrap_or_default();
    dir.join(format!("{stem}.nanodlp"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concurrency_uses_layer_count_tiers() {
        assert_eq!(concurrency_for(50, None, 32), 3);
        assert_eq!(concurrency_for(200, None, 32), 8);
        assert_eq!(concurrency_for(5000, None, 32), 12);
    }

    #[test]
    fn concurrency_respects_user_max_and_cores() {
        assert_eq!(concurrency_for(5000, Some(4), 32), 4);
        assert_eq!(concurrency_for(5000, None, 2), 2);
    }

    #[test]
    fn chunk_size_is_clamped() {
        assert!(process_chunk_size(10, 3) >= 12);
        assert!(process_chunk_size(100_000, 12) <= 64);
    }

    #[test]
    fn recompress_chunk_count_stays_in_range() {
        assert_eq!(recompress_chunk_count(0), 0);
        assert!(recompress_chunk_count(1) <= 8);
        assert!(recompress_chunk_count(10_000) <= 8);
    }

    #[test]
    fn fast_mode_forces_png_level_zero_and_recompress_off() {
        let options = ConvertOptions {
            fast_mode: true,
            ..Default::default()
        };
        assert_eq!(options.resolved_png_level(), 0);
        assert_eq!(options.resolved_recompress_mode(), RecompressMode::Off);
    }

    #[test]
    fn parallel_recompress_leaves_each_png_decodable() {
        let pixels = vec![0u8; 16];
        let png = encode_png(&pixels, 4, 4, ColorType::Grey8, 0).unwrap();
        let mut layer_pngs = vec![png.clone(), png];
        parallel_recompress(&mut layer_pngs, 2);
        for p in &layer_pngs {
            assert_eq!(&p[0..8], &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]);
        }
    }
}
