//! Per-stage and per-worker timing aggregation plus heuristic diagnosis
//! (spec.md §4.8, C8). Purely observational: nothing here may influence
//! output bytes.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;

/// Diagnosis plus raw per-worker timings for one conversion, handed back to
/// callers that opt into `ConvertOptions::analytics` (e.g. `platecast-cli
/// --analytics-out`).
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalyticsReport {
    pub worker_timings: Vec<WorkerTiming>,
    pub diagnosis: Vec<String>,
}

/// Per-worker timing breakdown for one conversion.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WorkerTiming {
    pub worker_id: u32,
    pub layers: u32,
    pub total_ns: u64,
    pub decode_ns: u64,
    pub scanline_ns: u64,
    pub compress_ns: u64,
    pub png_ns: u64,
}

const LOAD_IMBALANCE_RATIO: f64 = 2.0;
const EFFICIENCY_DROPOFF_FRACTION: f64 = 0.80;
const EFFICIENCY_DROPOFF_MIN_WORKERS: usize = 3;
const IO_READ_FRACTION_THRESHOLD: f64 = 0.35;
const IO_WRITE_FRACTION_THRESHOLD: f64 = 0.30;
const NATIVE_STAGE_BOTTLENECK_FRACTION: f64 = 0.45;
const GPU_FALLBACK_RATE_THRESHOLD: f64 = 0.15;
const MAX_DIAGNOSIS_ITEMS: usize = 8;

/// Aggregates stage and per-worker timings across one conversion run.
#[derive(Default)]
pub struct AnalyticsCollector {
    stage_timings: Mutex<HashMap<String, Duration>>,
    worker_timings: Mutex<Vec<WorkerTiming>>,
    gpu_attempts: Mutex<(u64, u64)>, // (fallbacks, total)
}

impl AnalyticsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_stage(&self, phase: &str, duration: Duration) {
        let mut timings = self.stage_timings.lock();
        *timings.entry(phase.to_string()).or_insert(Duration::ZERO) += duration;
    }

    pub fn record_worker(&self, timing: WorkerTiming) {
        self.worker_timings.lock().push(timing);
    }

    pub fn record_gpu_attempt(&self, fell_back: bool) {
        let mut attempts = self.gpu_attempts.lock();
        attempts.1 += 1;
        if fell_back {
            attempts.0 += 1;
        }
    }

    pub fn stage_fraction(&self, phase: &str) -> f64 {
        let timings = self.stage_timings.lock();
        let total: Duration = timings.values().sum();
        if total.is_zero() {
            return 0.0;
        }
        let phase_total = timings.get(phase).copied().unwrap_or(Duration::ZERO);
        phase_total.as_secs_f64() / total.as_secs_f64()
    }

    /// Produces up to [`MAX_DIAGNOSIS_ITEMS`] ranked diagnosis messages.
    pub fn diagnose(&self, worker_count: usize, logical_cores: usize) -> Vec<String> {
        let mut items = Vec::new();
        let workers = self.worker_timings.lock();

        if worker_count > logical_cores {
            items.push(format!(
                "oversubscription: {worker_count} workers on {logical_cores} logical cores"
            ));
        }

        if let (Some(max), Some(min)) = (
            workers.iter().map(|w| w.total_ns).max(),
            workers.iter().map(|w| w.total_ns).min(),
        ) {
            if min > 0 && (max as f64 / min as f64) > LOAD_IMBALANCE_RATIO {
                items.push(format!(
                    "load imbalance: slowest worker took {:.2}x the fastest",
                    max as f64 / min as f64
                ));
            }
        }

        if let Some(peak_layers) = workers.iter().map(|w| w.layers).max() {
            let laggards = workers
                .iter()
                .filter(|w| {
                    peak_layers > 0
                        && (w.layers as f64) < peak_layers as f64 * EFFICIENCY_DROPOFF_FRACTION
                })
                .count();
            if laggards >= EFFICIENCY_DROPOFF_MIN_WORKERS {
                items.push(format!(
                    "efficiency drop-off: {laggards} workers finished under 80% of the busiest worker's layer count"
                ));
            }
        }

        let read_fraction = self.stage_fraction("read");
        if read_fraction > IO_READ_FRACTION_THRESHOLD {
            items.push(format!(
                "I/O-bound reads: {:.0}% of total time spent in the read phase",
                read_fraction * 100.0
            ));
        }

        let write_fraction = self.stage_fraction("write");
        if write_fraction > IO_WRITE_FRACTION_THRESHOLD {
            items.push(format!(
                "I/O-bound writes: {:.0}% of total time spent in the write phase",
                write_fraction * 100.0
            ));
        }

        let native_total: u64 = workers
            .iter()
            .map(|w| w.decode_ns + w.scanline_ns + w.compress_ns + w.png_ns)
            .sum();
        if native_total > 0 {
            let compress_total: u64 = workers.iter().map(|w| w.compress_ns).sum();
            let compress_fraction = compress_total as f64 / native_total as f64;
            if compress_fraction > NATIVE_STAGE_BOTTLENECK_FRACTION {
                items.push(format!(
                    "compression bottleneck: {:.0}% of native processing time",
                    compress_fraction * 100.0
                ));
            }

            let scanline_total: u64 = workers.iter().map(|w| w.scanline_ns).sum();
            let scanline_fraction = scanline_total as f64 / native_total as f64;
            if scanline_fraction > NATIVE_STAGE_BOTTLENECK_FRACTION {
                items.push(format!(
                    "scanline bottleneck: {:.0}% of native processing time",
                    scanline_fraction * 100.0
                ));
            }
        }

        let (fallbacks, attempts) = *self.gpu_attempts.lock();
        if attempts > 0 {
            let fallback_rate = fallbacks as f64 / attempts as f64;
            if fallback_rate > GPU_FALLBACK_RATE_THRESHOLD {
                items.push(format!(
                    "high GPU fallback rate: {:.0}% of batches fell back to CPU",
                    fallback_rate * 100.0
                ));
            }
        }

        items.truncate(MAX_DIAGNOSIS_ITEMS);
        items
    }

    pub fn report(&self, worker_count: usize, logical_cores: usize) -> AnalyticsReport {
        AnalyticsReport {
            worker_timings: self.worker_timings.lock().clone(),
            diagnosis: self.diagnose(worker_count, logical_cores),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oversubscription_is_flagged() {
        let collector = AnalyticsCollector::new();
        let diagnosis = collector.diagnose(16, 8);
        assert!(diagnosis.iter().any(|d| d.contains("oversubscription")));
    }

    #[test]
    fn load_imbalance_is_flagged() {
        let collector = AnalyticsCollector::new();
        collector.record_worker(WorkerTiming {
            worker_id: 0,
            layers: 10,
            total_ns: 10_000,
            ..Default::default()
        });
        collector.record_worker(WorkerTiming {
            worker_id: 1,
            layers: 10,
            total_ns: 100_000,
            ..Default::default()
        });
        let diagnosis = collector.diagnose(2, 8);
        assert!(diagnosis.iter().any(|d| d.contains("load imbalance")));
    }

    #[test]
    fn balanced_run_has_no_imbalance_warning() {
        let collector = AnalyticsCollector::new();
        for i in 0..4 {
            collector.record_worker(WorkerTiming {
                worker_id: i,
                layers: 10,
                total_ns: 10_000,
                ..Default::default()
            });
        }
        let diagnosis = collector.diagnose(4, 8);
        assert!(!diagnosis.iter().any(|d| d.contains("load imbalance")));
        assert!(!diagnosis.iter().any(|d| d.contains("oversubscription")));
    }
}
