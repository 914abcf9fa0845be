//! Parse a slice file and report whether it passes the conversion invariants,
//! without writing any output.

use anyhow::Result;
use std::path::PathBuf;

use platecast_core::profiles;

pub fn run(file: PathBuf, strict: bool) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("file not found: {}", file.display());
    }

    let mut failures = Vec::new();

    let parser = match platecast_core::Parser::open(&file) {
        Ok(parser) => parser,
        Err(err) => {
            println!("FAIL: container parsing: {err}");
            if strict {
                anyhow::bail!("{err}");
            }
            return Ok(());
        }
    };
    println!("PASS: container parses as {:?}", parser.kind);

    let d = &parser.descriptor;
    match profiles::validate(d.resolution_x, d.resolution_y) {
        Ok(()) => println!("PASS: resolution {}x{} is a known class", d.resolution_x, d.resolution_y),
        Err(err) => failures.push(format!("resolution class: {err}")),
    }

    if let Some(profile) = profiles::detect_target(d.resolution_x, d.resolution_y) {
        let print_height = d.layer_count as f64 * d.layer_height_mm as f64;
        if print_height > profile.max_z_mm as f64 {
            failures.push(format!(
                "print height {print_height:.2}mm exceeds {} max Z {:.2}mm",
                profile.name, profile.max_z_mm
            ));
        } else {
            println!(
                "PASS: print height {print_height:.2}mm fits within {} max Z {:.2}mm",
                profile.name, profile.max_z_mm
            );
        }
    }

    for failure in &failures {
        println!("FAIL: {failure}");
    }

    if failures.is_empty() {
        println!("validation passed");
        Ok(())
    } else if strict {
        anyhow::bail!("{} check(s) failed", failures.len());
    } else {
        println!("validation failed ({} check(s))", failures.len());
        Ok(())
    }
}
