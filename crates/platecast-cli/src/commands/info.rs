//! Open a slice file and print its descriptor and detected profile.

use anyhow::Result;
use std::path::PathBuf;

use platecast_core::{profiles, Parser};

pub fn run(file: PathBuf) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("file not found: {}", file.display());
    }

    let parser = Parser::open(&file)?;
    let d = &parser.descriptor;

    println!("File:            {}", file.display());
    println!("Container kind:  {:?}", parser.kind);
    println!("Resolution:      {}x{}", d.resolution_x, d.resolution_y);
    println!("Display (mm):    {:.2} x {:.2}", d.display_mm_x, d.display_mm_y);
    println!("Layer height:    {:.3} mm", d.layer_height_mm);
    println!("Layer count:     {}", d.layer_count);
    println!("Bottom layers:   {}", d.bottom_layer_count);
    println!(
        "Exposure (s):    {:.2} normal / {:.2} bottom",
        d.normal_exposure_s, d.bottom_exposure_s
    );
    println!("Max Z (mm):      {:.2}", d.max_z_mm);
    println!(
        "Print height:    {:.2} mm",
        d.layer_count as f64 * d.layer_height_mm as f64
    );
    if let Some(name) = &d.machine_name {
        println!("Machine:         {name}");
    }
    println!("Has preview:     {}", parser.preview.is_some());

    match profiles::detect_source(d.resolution_x, d.resolution_y) {
        Some(profile) => println!(
            "Source profile:  {} ({})",
            profile.name, profile.manufacturer
        ),
        None => println!("Source profile:  unrecognized resolution"),
    }

    match profiles::detect_target(d.resolution_x, d.resolution_y) {
        Some(profile) => println!(
            "Default target:  {} ({:?}, output width {})",
            profile.name, profile.board_type, profile.png_output_width
        ),
        None => println!("Default target:  none (unsupported resolution class)"),
    }

    Ok(())
}
