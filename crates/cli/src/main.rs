#![deny(unsafe_code)]
//! CLI binary for exercising the glstate context layer.
//!
//! Subcommands:
//! - `simulate` runs a multi-context workload against the headless driver
//!   and reports issued vs. elided driver calls
//! - `formats` prints the pixel format presets

mod error;
mod logging;
mod workload;

use clap::{Parser, Subcommand};
use error::CliError;
use glstate_core::PixelFormat;
use std::path::PathBuf;
use std::process;
use workload::{Report, WorkloadConfig};

#[derive(Parser)]
#[command(name = "glstate", about = "Rendering-context state cache diagnostics")]
struct Cli {
    /// Output as JSON instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Drive shared contexts through a synthetic frame loop.
    Simulate {
        /// JSON workload file; flags override its values.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Worker threads, each with its own surface.
        #[arg(short, long)]
        threads: Option<usize>,

        /// Contexts per thread, chained into one sharing group.
        #[arg(short = 'n', long)]
        contexts: Option<usize>,

        /// Frames to render.
        #[arg(short, long)]
        frames: Option<usize>,

        /// Texture units bound per pass.
        #[arg(short, long)]
        units: Option<u32>,

        /// Pixel format preset.
        #[arg(long)]
        format: Option<String>,
    },
    /// List pixel format presets.
    Formats,
}

fn print_report(report: &Report) {
    let c = &report.config;
    let d = &report.driver;
    println!(
        "workload: {} threads x {} contexts, {} frames, {} texture units, {}",
        c.threads, c.contexts, c.frames, c.texture_units, c.format
    );
    println!(
        "contexts: {} created, {} destroyed, {} make-current, {} release",
        d.creates, d.destroys, d.make_current, d.release_current
    );
    println!(
        "objects:  {} created, {} deleted",
        d.object_creates, d.object_deletes
    );
    println!(
        "binds:    {} issued, {} elided ({:.1}% elided)",
        report.binds.issued,
        report.binds.elided,
        report.elided_ratio() * 100.0
    );
    let groups: Vec<String> = report.sharing_groups.iter().map(|g| g.to_string()).collect();
    println!("groups:   {}", groups.join(", "));
    if d.destroyed_while_current > 0 || d.calls_without_context > 0 {
        println!(
            "warnings: {} destroyed while current, {} calls without context",
            d.destroyed_while_current, d.calls_without_context
        );
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::Formats => {
            let names = PixelFormat::list_names();
            if cli.json {
                let mut formats = serde_json::Map::new();
                for name in names {
                    let format = PixelFormat::from_name(name)?;
                    formats.insert(name.to_string(), serde_json::to_value(format)?);
                }
                println!("{}", serde_json::to_string_pretty(&formats)?);
            } else {
                println!("Pixel formats:");
                for name in names {
                    println!("  {name}");
                }
            }
        }
        Command::Simulate {
            config,
            threads,
            contexts,
            frames,
            units,
            format,
        } => {
            let mut workload = match config {
                Some(path) => WorkloadConfig::load(&path)?,
                None => WorkloadConfig::default(),
            };
            if let Some(threads) = threads {
                workload.threads = threads;
            }
            if let Some(contexts) = contexts {
                workload.contexts = contexts;
            }
            if let Some(frames) = frames {
                workload.frames = frames;
            }
            if let Some(units) = units {
                workload.texture_units = units;
            }
            if let Some(format) = format {
                workload.format = format;
            }

            let report = workload::run(&workload)?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
        }
    }

    Ok(())
}

fn main() {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);
    let json_mode = cli.json;
    if let Err(e) = run(cli) {
        log::debug!("exiting with code {}", e.exit_code());
        if json_mode {
            let j = serde_json::json!({
                "error": e.to_string(),
                "kind": e.kind(),
                "exit_code": e.exit_code(),
            });
            eprintln!("{}", serde_json::to_string_pretty(&j).unwrap_or_default());
        } else {
            eprintln!("error: {e}");
        }
        process::exit(e.exit_code());
    }
}
