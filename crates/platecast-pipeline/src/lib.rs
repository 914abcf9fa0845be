//! Worker-pool orchestrator that turns a parsed slice file into a packaged
//! NanoDLP plate archive (spec.md §4.5-§4.8).

pub mod analytics;
pub mod autotune;
pub mod error;
pub mod gpu;
pub mod orchestrator;

pub use analytics::{AnalyticsCollector, AnalyticsReport, WorkerTiming};
pub use autotune::{should_autotune, AutotuneCache, AutotuneEntry, AutotuneKey};
pub use error::{Error, Result};
pub use gpu::{GpuBackend, GpuScanlines, NoGpu, ScanlineBatchParams};
pub use orchestrator::{convert, ConvertOptions, Phase, ProgressEvent, RecompressMode};
