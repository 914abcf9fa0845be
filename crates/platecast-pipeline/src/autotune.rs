//! Optional compute-path auto-tune: benchmark CPU vs. an available GPU
//! backend on a small prefix of layers, cache the winner (spec.md §4.5
//! "Auto-tune").

use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::gpu::{GpuBackend, ScanlineBatchParams};

const MAX_BENCHMARK_LAYERS: usize = 64;
const MIN_LAYER_COUNT_FOR_AUTOTUNE: u32 = 8;
const CACHE_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// The cache key: every dimension that plausibly changes which backend
/// wins, per spec.md's documented key tuple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AutotuneKey {
    pub backend: String,
    pub gpu_name: Option<String>,
    pub cpu_cores: usize,
    pub resolution_x: u32,
    pub resolution_y: u32,
    pub output_width: u32,
    pub channels: u8,
    pub profile_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutotuneEntry {
    pub winning_backend: String,
    pub measured_at_unix_secs: u64,
    pub duration_ns: u64,
}

/// A key→entry map protected by a mutex; the orchestrator persists
/// snapshots the consumer chooses to keep across runs.
#[derive(Default)]
pub struct AutotuneCache {
    entries: Mutex<HashMap<AutotuneKey, AutotuneEntry>>,
}

impl AutotuneCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: &[u8]) -> Self {
        let entries = serde_json::from_slice(snapshot).unwrap_or_default();
        Self {
            entries: Mutex::new(entries),
        }
    }

    pub fn snapshot(&self) -> Vec<u8> {
        serde_json::to_vec(&*self.entries.lock()).unwrap_or_default()
    }

    /// Returns a cached winner if present and not expired.
    pub fn get(&self, key: &AutotuneKey) -> Option<String> {
        let now = now_unix_secs();
        let entries = self.entries.lock();
        let entry = entries.get(key)?;
        if now.saturating_sub(entry.measured_at_unix_secs) > CACHE_TTL.as_secs() {
            None
        } else {
            Some(entry.winning_backend.clone())
        }
    }

    pub fn insert(&self, key: AutotuneKey, winning_backend: String, duration_ns: u64) {
        self.entries.lock().insert(
            key,
            AutotuneEntry {
                winning_backend,
                measured_at_unix_secs: now_unix_secs(),
                duration_ns,
            },
        );
    }
}

fn now_unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Benchmarks the CPU path against an optional GPU backend on up to
/// [`MAX_BENCHMARK_LAYERS`] layers, returning the faster backend's name.
/// `cpu_fn` must perform exactly the work the real CPU path would do on
/// this batch (decode→remap), so relative timings are meaningful.
pub fn select_backend(
    sample_layers: &[(u32, Vec<u8>)],
    params: &ScanlineBatchParams,
    cpu_fn: impl Fn(&[(u32, Vec<u8>)]) -> Duration,
    gpu: Option<&dyn GpuBackend>,
) -> String {
    let sample: Vec<(u32, Vec<u8>)> = sample_layers
        .iter()
        .take(MAX_BENCHMARK_LAYERS)
        .cloned()
        .collect();

    let cpu_duration = cpu_fn(&sample);

    let Some(gpu) = gpu else {
        return "cpu".to_string();
    };

    let gpu_start = std::time::Instant::now();
    let gpu_result = gpu.scanline_batch(&sample, params);
    let gpu_duration = gpu_start.elapsed();

    match gpu_result {
        Some(_) if gpu_duration < cpu_duration => gpu.name().to_string(),
        _ => "cpu".to_string(),
    }
}

pub fn should_autotune(layer_count: u32, autotune_requested: bool) -> bool {
    autotune_requested && layer_count >= MIN_LAYER_COUNT_FOR_AUTOTUNE
}
