//! roster-cli: command-line interface for the residency posting allocator.
//!
//! Drives the full allocation pipeline from a solver-input JSON document,
//! standing in for the web layer during development and testing.
//!
//! # Commands
//!
//! - `solve`: run the allocator on an input file and emit the output document
//! - `validate`: shape-check an input file without solving
//! - `diagnose`: run the pre-solve feasibility analysis

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use roster_core::models::AllocatorInput;
use roster_core::{allocate_timetable, diagnose::analyze_feasibility, validate_input};
use serde::Serialize;
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "roster-cli")]
#[command(version = "0.1.0")]
#[command(about = "Residency posting allocator CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the allocator on a solver-input file
    Solve {
        /// Input JSON file path (use --stdin to read from stdin)
        #[arg(value_name = "FILE")]
        input: Option<PathBuf>,

        /// Read input from stdin instead of a file
        #[arg(long)]
        stdin: bool,

        /// Output file path (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,

        /// Render the timetable to stderr after solving
        #[arg(long)]
        timetable: bool,
    },

    /// Validate a solver-input file without solving
    Validate {
        /// Input JSON file path
        #[arg(value_name = "FILE")]
        input: Option<PathBuf>,

        /// Read input from stdin instead of a file
        #[arg(long)]
        stdin: bool,
    },

    /// Analyze likely infeasibility sources without solving
    Diagnose {
        /// Input JSON file path
        #[arg(value_name = "FILE")]
        input: Option<PathBuf>,

        /// Read input from stdin instead of a file
        #[arg(long)]
        stdin: bool,

        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },
}

#[derive(Serialize)]
struct ErrorDocument {
    success: bool,
    error: String,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Solve {
            input,
            stdin,
            output,
            pretty,
            timetable,
        } => cmd_solve(input, stdin, output, pretty, timetable),

        Commands::Validate { input, stdin } => cmd_validate(input, stdin),

        Commands::Diagnose {
            input,
            stdin,
            pretty,
        } => cmd_diagnose(input, stdin, pretty),
    }
}

fn read_input(file: Option<PathBuf>, use_stdin: bool) -> Result<String> {
    if use_stdin {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read from stdin")?;
        Ok(buffer)
    } else if let Some(path) = file {
        fs::read_to_string(&path).with_context(|| format!("Failed to read file: {:?}", path))
    } else {
        anyhow::bail!("Either provide an input file or use --stdin")
    }
}

fn parse_input(json_str: &str) -> Result<AllocatorInput> {
    serde_json::from_str(json_str).context("Failed to parse input JSON")
}

fn cmd_solve(
    input: Option<PathBuf>,
    stdin: bool,
    output: Option<PathBuf>,
    pretty: bool,
    timetable: bool,
) -> Result<()> {
    let json_str = read_input(input, stdin)?;
    let allocator_input = parse_input(&json_str)?;

    eprintln!("Running allocator...");
    let result = match allocate_timetable(&allocator_input) {
        Ok(result) => result,
        Err(e) => {
            // the error document contract callers rely on
            let doc = ErrorDocument {
                success: false,
                error: e.to_string(),
            };
            println!("{}", serde_json::to_string(&doc)?);
            std::process::exit(1);
        }
    };

    if timetable {
        eprintln!("{}", result.display());
    }

    let output_json = if pretty {
        serde_json::to_string_pretty(&result)?
    } else {
        serde_json::to_string(&result)?
    };

    if let Some(output_path) = output {
        fs::write(&output_path, &output_json)
            .with_context(|| format!("Failed to write output to {:?}", output_path))?;
        eprintln!("Result written to {:?}", output_path);
    } else {
        println!("{}", output_json);
    }

    Ok(())
}

fn cmd_validate(input: Option<PathBuf>, stdin: bool) -> Result<()> {
    let json_str = read_input(input, stdin)?;
    let allocator_input = parse_input(&json_str)?;

    match validate_input(&allocator_input) {
        Ok(()) => {
            println!("{{\"valid\": true, \"message\": \"Solver input is valid\"}}");
            Ok(())
        }
        Err(e) => {
            println!(
                "{{\"valid\": false, \"error\": \"{}\"}}",
                e.to_string().replace('"', "\\\"")
            );
            Ok(())
        }
    }
}

fn cmd_diagnose(input: Option<PathBuf>, stdin: bool, pretty: bool) -> Result<()> {
    let json_str = read_input(input, stdin)?;
    let allocator_input = parse_input(&json_str)?;

    let report = analyze_feasibility(&allocator_input);
    let output_json = if pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{}", output_json);
    Ok(())
}
