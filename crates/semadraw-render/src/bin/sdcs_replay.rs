//! Replay an SDCS stream through the reference renderer.
//!
//! Validates the file, renders it at the requested size, prints the
//! SHA-256 digest of the framebuffer bytes, and optionally writes a PPM.
//! Exits non-zero with a diagnostic naming the byte offset on any
//! validation error.
//!
//! ```bash
//! sdcs_replay frame.sdcs --width 256 --height 256 --out frame.ppm
//! ```

// A replay tool's output is stdout.
#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::{io::Write, process::ExitCode};

use clap::Parser;
use semadraw_render::{Framebuffer, render};
use sha2::{Digest, Sha256};

/// SDCS reference replay
#[derive(Parser, Debug)]
#[command(name = "sdcs_replay")]
#[command(about = "Render an SDCS command stream with the reference renderer")]
#[command(version)]
struct Args {
    /// Path to the stream file
    file: std::path::PathBuf,

    /// Framebuffer width in pixels
    #[arg(long, default_value = "256")]
    width: u32,

    /// Framebuffer height in pixels
    #[arg(long, default_value = "256")]
    height: u32,

    /// Write the rendered frame as a binary PPM (alpha dropped)
    #[arg(long)]
    out: Option<std::path::PathBuf>,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let bytes = match std::fs::read(&args.file) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("error: cannot read {}: {e}", args.file.display());
            return ExitCode::FAILURE;
        },
    };

    let mut fb = Framebuffer::new(args.width, args.height);
    if let Err(e) = render(&bytes, &mut fb) {
        eprintln!("error: {e}");
        return ExitCode::FAILURE;
    }

    let digest = Sha256::digest(fb.pixels());
    println!("{}x{} sha256 {:x}", args.width, args.height, digest);

    if let Some(path) = args.out {
        if let Err(e) = write_ppm(&path, &fb) {
            eprintln!("error: cannot write {}: {e}", path.display());
            return ExitCode::FAILURE;
        }
    }

    ExitCode::SUCCESS
}

fn write_ppm(path: &std::path::Path, fb: &Framebuffer) -> std::io::Result<()> {
    let mut out = Vec::with_capacity(fb.pixels().len());
    out.extend_from_slice(format!("P6\n{} {}\n255\n", fb.width(), fb.height()).as_bytes());
    for px in fb.pixels().chunks_exact(4) {
        out.extend_from_slice(&px[..3]);
    }
    let mut file = std::fs::File::create(path)?;
    file.write_all(&out)
}
