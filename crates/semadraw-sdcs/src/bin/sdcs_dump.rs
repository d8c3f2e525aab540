//! Dump the structure of an SDCS stream.
//!
//! Validates the file and prints the header, chunk table, and command
//! listing. Exits non-zero with a diagnostic naming the byte offset on any
//! validation error.
//!
//! ```bash
//! sdcs_dump frame.sdcs
//! ```

// A dump tool's output is stdout.
#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::process::ExitCode;

use clap::Parser;
use semadraw_sdcs::{Command, CommandReader, validate};

/// SDCS stream inspector
#[derive(Parser, Debug)]
#[command(name = "sdcs_dump")]
#[command(about = "Validate and dump an SDCS command stream")]
#[command(version)]
struct Args {
    /// Path to the stream file
    file: std::path::PathBuf,

    /// Print only the validation verdict, not the command listing
    #[arg(long)]
    quiet: bool,
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

    let summary = match validate(&bytes) {
        Ok(summary) => summary,
        Err(e) => {
            eprintln!("error at byte {}: {} ({})", e.offset, e.kind, e.detail);
            return ExitCode::FAILURE;
        },
    };

    println!(
        "{}: {} bytes, {} chunks ({} CMDS), {} commands, flags {:#010x}",
        args.file.display(),
        bytes.len(),
        summary.chunks,
        summary.command_chunks,
        summary.commands,
        summary.flags,
    );

    if args.quiet {
        return ExitCode::SUCCESS;
    }

    for (i, cmd) in CommandReader::new(&bytes).enumerate() {
        match cmd {
            Command::SetClipRects(rects) => println!("  {i:4}  SetClipRects x{}", rects.len()),
            Command::StrokePath(path) => {
                println!("  {i:4}  StrokePath x{} width {}", path.len(), path.stroke_width);
            },
            Command::BlitImage(img) => {
                println!("  {i:4}  BlitImage {}x{} at ({}, {})", img.width, img.height, img.x, img.y);
            },
            Command::DrawGlyphRun(run) => {
                println!(
                    "  {i:4}  DrawGlyphRun x{} atlas {}x{} at ({}, {})",
                    run.len(),
                    run.atlas.width,
                    run.atlas.height,
                    run.x,
                    run.y,
                );
            },
            other => println!("  {i:4}  {other:?}"),
        }
    }

    ExitCode::SUCCESS
}
