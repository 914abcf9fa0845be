//! Convert a slice file into a NanoDLP plate archive.

use anyhow::Result;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use platecast_pipeline::{convert as run_convert, AnalyticsReport, ConvertOptions, Phase};

pub struct ConvertArgs {
    pub file: PathBuf,
    pub target_profile: Option<String>,
    pub max_z_override: Option<f32>,
    pub output_directory: Option<PathBuf>,
    pub output_name: Option<String>,
    pub fast_mode: bool,
    pub process_png_level: Option<u32>,
    pub recompress_mode: Option<platecast_pipeline::RecompressMode>,
    pub preload_layers: bool,
    pub analytics: bool,
    pub analytics_out: Option<PathBuf>,
    pub cpu_host_workers: Option<usize>,
    pub gpu_host_workers: Option<usize>,
    pub autotune: bool,
}

pub fn run(args: ConvertArgs) -> Result<()> {
    if !args.file.exists() {
        anyhow::bail!("file not found: {}", args.file.display());
    }

    let options = ConvertOptions {
        target_profile: args.target_profile,
        max_z_override: args.max_z_override,
        output_directory: args.output_directory,
        output_name: args.output_name,
        fast_mode: args.fast_mode,
        process_png_level: args.process_png_level,
        recompress_mode: args.recompress_mode,
        preload_layers: args.preload_layers,
        analytics: args.analytics,
        cpu_host_workers: args.cpu_host_workers,
        gpu_host_workers: args.gpu_host_workers,
        autotune: args.autotune,
    };

    let logical_cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4);

    let (progress_tx, progress_rx) = crossbeam_channel::unbounded();
    let (log_tx, log_rx) = crossbeam_channel::unbounded();
    let (analytics_tx, analytics_rx) = crossbeam_channel::unbounded();
    let cancel = Arc::new(AtomicBool::new(false));

    let printer = std::thread::spawn(move || {
        for event in progress_rx.iter() {
            let phase = match event.phase {
                Phase::Open => "open",
                Phase::Read => "read",
                Phase::Process => "process",
                Phase::Recompress => "recompress",
                Phase::Write => "write",
            };
            println!("[{phase}] {}/{}", event.current, event.total);
        }
    });
    let log_printer = std::thread::spawn(move || {
        for line in log_rx.iter() {
            println!("{line}");
        }
    });

    let result = run_convert(
        &args.file,
        options,
        logical_cores,
        Some(progress_tx),
        Some(log_tx),
        cancel,
        Some(analytics_tx),
    );

    let _ = printer.join();
    let _ = log_printer.join();

    if let Some(path) = &args.analytics_out {
        let report = analytics_rx.try_recv().unwrap_or_default();
        write_analytics(&report, path)?;
    }

    if result.success {
        println!(
            "converted {} layers -> {}",
            result.layer_count,
            result
                .output_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default()
        );
        Ok(())
    } else {
        anyhow::bail!(
            "conversion failed: {}",
            result.error_message.unwrap_or_else(|| "unknown error".to_string())
        )
    }
}

fn write_analytics(report: &AnalyticsReport, path: &std::path::Path) -> Result<()> {
    let json = serde_json::to_vec_pretty(report)?;
    std::fs::write(path, json)?;
    Ok(())
}
