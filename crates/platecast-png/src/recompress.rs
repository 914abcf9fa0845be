//! PNG recompression and the adaptive-recompression decision
//! (spec.md §4.4.4, §4.4.5).

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

struct ParsedPng {
    width: u32,
    height: u32,
    bit_depth: u8,
    colour_type: u8,
    idat: Vec<u8>,
}

fn parse_png(bytes: &[u8]) -> Option<ParsedPng> {
    if bytes.len() < 8 || bytes[0..8] != PNG_SIGNATURE {
        return None;
    }

    let mut pos = 8usize;
    let mut width = 0u32;
    let mut height = 0u32;
    let mut bit_depth = 0u8;
    let mut colour_type = 0u8;
    let mut idat = Vec::new();

    while pos + 8 <= bytes.len() {
        let len = u32::from_be_bytes(bytes[pos..pos + 4].try_into().ok()?) as usize;
        let type_tag = &bytes[pos + 4..pos + 8];
        let data_start = pos + 8;
        let data_end = data_start.checked_add(len)?;
        if data_end + 4 > bytes.len() {
            return None;
        }
        let data = &bytes[data_start..data_end];

        match type_tag {
            b"IHDR" => {
                if data.len() < 13 {
                    return None;
                }
                width = u32::from_be_bytes(data[0..4].try_into().ok()?);
                height = u32::from_be_bytes(data[4..8].try_into().ok()?);
                bit_depth = data[8];
                colour_type = data[9];
            }
            b"IDAT" => idat.extend_from_slice(data),
            b"IEND" => break,
            _ => {}
        }

        pos = data_end + 4;
    }

    if width == 0 || height == 0 || idat.is_empty() {
        return None;
    }

    Some(ParsedPng {
        width,
        height,
        bit_depth,
        colour_type,
        idat,
    })
}

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

/// Recompresses a known-good PNG at a new deflate `level`. Any parse failure
/// (or re-encode failure) returns the input byte-for-byte unchanged, per
/// spec.md §4.4.4.
pub fn recompress(png_bytes: &[u8], level: u32) -> Vec<u8> {
    let Some(parsed) = parse_png(png_bytes) else {
        return png_bytes.to_vec();
    };

    let mut inflated = Vec::new();
    if ZlibDecoder::new(parsed.idat.as_slice())
        .read_to_end(&mut inflated)
        .is_err()
    {
        return png_bytes.to_vec();
    }

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(level.min(9)));
    if encoder.write_all(&inflated).is_err() {
        return png_bytes.to_vec();
    }
    let Ok(idat) = encoder.finish() else {
        return png_bytes.to_vec();
    };

    let mut ihdr = Vec::with_capacity(13);
    ihdr.extend_from_slice(&parsed.width.to_be_bytes());
    ihdr.extend_from_slice(&parsed.height.to_be_bytes());
    ihdr.push(parsed.bit_depth);
    ihdr.push(parsed.colour_type);
    ihdr.push(0);
    ihdr.push(0);
    ihdr.push(0);

    let mut out = Vec::with_capacity(8 + 25 + idat.len() + 12 + 12);
    out.extend_from_slice(&PNG_SIGNATURE);
    write_chunk(&mut out, b"IHDR", &ihdr);
    write_chunk(&mut out, b"IDAT", &idat);
    write_chunk(&mut out, b"IEND", &[]);
    out
}

/// A layer's pre-recompression size, used for the adaptive sampling
/// heuristic below.
pub struct LayerPngStats {
    pub layer_index: u32,
    pub original_size: usize,
}

/// How the orchestrator should handle recompression for a job, decided once
/// up front per spec.md §4.4.5.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecompressDecision {
    Run,
    Skip,
}

const NON_TRIVIAL_THRESHOLD_BYTES: usize = 256;
const SAMPLE_COUNT: usize = 8;
const LARGE_JOB_LAYER_COUNT: usize = 2000;

/// Samples up to 8 evenly spaced non-trivial layers, measures recompression
/// savings on them, and decides whether the full pass is worth running.
///
/// `recompress_fn` is injected so tests (and the orchestrator, which already
/// has the encoded bytes in hand) don't need to re-derive layer PNGs here.
pub fn decide_adaptive_recompression(
    layers: &[LayerPngStats],
    mut recompress_sample: impl FnMut(u32) -> (usize, usize),
) -> RecompressDecision {
    let candidates: Vec<&LayerPngStats> = layers
        .iter()
        .filter(|l| l.original_size > NON_TRIVIAL_THRESHOLD_BYTES)
        .collect();

    if candidates.is_empty() {
        return RecompressDecision::Skip;
    }

    let stride = (candidates.len() / SAMPLE_COUNT).max(1);
    let sampled: Vec<&&LayerPngStats> = candidates.iter().step_by(stride).take(SAMPLE_COUNT).collect();

    let mut total_orig: u64 = 0;
    let mut total_recompressed: u64 = 0;
    for layer in &sampled {
        let (orig, recompressed) = recompress_sample(layer.layer_index);
        total_orig += orig as u64;
        total_recompressed += recompressed as u64;
    }

    if total_orig == 0 {
        return RecompressDecision::Skip;
    }

    let savings_ratio = (total_orig.saturating_sub(total_recompressed)) as f64 / total_orig as f64;
    let avg_orig_size = total_orig as f64 / sampled.len() as f64;
    let projected_total_savings_mb =
        savings_ratio * avg_orig_size * layers.len() as f64 / (1024.0 * 1024.0);

    let is_large_job = layers.len() >= LARGE_JOB_LAYER_COUNT;

    let should_run = (savings_ratio >= 0.04 && projected_total_savings_mb >= 25.0)
        || (is_large_job && (savings_ratio >= 0.08 || projected_total_savings_mb >= 150.0));

    if should_run {
        RecompressDecision::Run
    } else {
        RecompressDecision::Skip
    }
}
