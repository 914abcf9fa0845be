//! platecast - convert ChiTuBox-family slice files into NanoDLP plate archives

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

/// platecast - slice-file to NanoDLP plate-archive converter
#[derive(Parser, Debug)]
#[command(name = "platecast")]
#[command(about = "Convert CBDDLP/CTB slice files into NanoDLP plate archives", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable verbose logging (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Input file path (CBDDLP/CTB slice file)
    #[arg(short = 'f', long)]
    file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Convert a slice file into a NanoDLP plate archive (the default command)
    Convert {
        /// Slice file path
        file: PathBuf,

        /// Override the auto-detected target profile (exact catalog name)
        #[arg(long)]
        target_profile: Option<String>,

        /// Override the target profile's maximum Z height (mm)
        #[arg(long)]
        max_z_override: Option<f32>,

        /// Output directory (defaults to the input file's directory)
        #[arg(short, long)]
        output_directory: Option<PathBuf>,

        /// Output file stem, without the .nanodlp extension
        #[arg(long)]
        output_name: Option<String>,

        /// Skip recompression and use PNG level 0, for the fastest possible run
        #[arg(long)]
        fast_mode: bool,

        /// Deflate level for initial per-layer PNGs (0..=9)
        #[arg(long)]
        process_png_level: Option<u32>,

        /// Recompression policy
        #[arg(long, value_enum)]
        recompress_mode: Option<RecompressModeArg>,

        /// Force pre-reading every raw layer payload before dispatch
        #[arg(long)]
        preload_layers: bool,

        /// Collect per-stage/per-worker timings
        #[arg(long)]
        analytics: bool,

        /// Write the collected analytics as JSON to this path (implies --analytics)
        #[arg(long)]
        analytics_out: Option<PathBuf>,

        /// Override the number of CPU worker threads
        #[arg(long)]
        cpu_host_workers: Option<usize>,

        /// Override the number of GPU worker threads
        #[arg(long)]
        gpu_host_workers: Option<usize>,

        /// Benchmark and select the fastest scanline-mapping backend
        #[arg(long)]
        autotune: bool,
    },

    /// Open a slice file and print its descriptor and detected profile, without converting
    Info {
        /// Slice file path
        file: PathBuf,
    },

    /// Parse a slice file and report whether it passes the conversion invariants
    Validate {
        /// Slice file path
        file: PathBuf,

        /// Exit with a non-zero status on the first failed check
        #[arg(short, long)]
        strict: bool,
    },
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum RecompressModeArg {
    Adaptive,
    On,
    Off,
}

impl From<RecompressModeArg> for platecast_pipeline::RecompressMode {
    fn from(value: RecompressModeArg) -> Self {
        match value {
            RecompressModeArg::Adaptive => platecast_pipeline::RecompressMode::Adaptive,
            RecompressModeArg::On => platecast_pipeline::RecompressMode::On,
            RecompressModeArg::Off => platecast_pipeline::RecompressMode::Off,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_max_level(log_level.parse().unwrap_or(tracing::Level::WARN))
        .init();

    let command = match (cli.command, cli.file) {
        (Some(command), _) => command,
        (None, Some(file)) => Commands::Convert {
            file,
            target_profile: None,
            max_z_override: None,
            output_directory: None,
            output_name: None,
            fast_mode: false,
            process_png_level: None,
            recompress_mode: None,
            preload_layers: false,
            analytics: false,
            analytics_out: None,
            cpu_host_workers: None,
            gpu_host_workers: None,
            autotune: false,
        },
        (None, None) => anyhow::bail!("a subcommand or -f/--file <path> is required"),
    };

    match command {
        Commands::Convert {
            file,
            target_profile,
            max_z_override,
            output_directory,
            output_name,
            fast_mode,
            process_png_level,
            recompress_mode,
            preload_layers,
            analytics,
            analytics_out,
            cpu_host_workers,
            gpu_host_workers,
            autotune,
        } => commands::convert::run(commands::convert::ConvertArgs {
            file,
            target_profile,
            max_z_override,
            output_directory,
            output_name,
            fast_mode,
            process_png_level,
            recompress_mode: recompress_mode.map(Into::into),
            preload_layers,
            analytics: analytics || analytics_out.is_some(),
            analytics_out,
            cpu_host_workers,
            gpu_host_workers,
            autotune,
        }),
        Commands::Info { file } => commands::info::run(file),
        Commands::Validate { file, strict } => commands::validate::run(file, strict),
    }
}
