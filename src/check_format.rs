/*
cargo run --bin check_format -- data/converted_data.jsonl

cat data/fine-tuning-data.jsonl | cargo run --bin check_format -- --json
*/

use anyhow::{Context, Result};
use clap::Parser;
use ft_jsonl::format_check::{check_format, trim_terminating_newline};
use ft_jsonl::logging::init_file_logger;
use log::{error, info, warn};
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process;

/// Check a chat fine-tuning JSONL file and count format defects.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// JSONL file to check (read stdin when omitted)
    input: Option<PathBuf>,

    /// Print the defect counts as a JSON object instead of a list
    #[arg(long)]
    json: bool,

    /// Validate the text exactly as read, keeping a terminating newline
    #[arg(long)]
    keep_trailing_newline: bool,

    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_path = init_file_logger(&cli.log_dir, "check_format")?;

    // read input
    let mut raw = String::new();
    let source = match &cli.input {
        Some(path) => {
            raw = fs::read_to_string(path).with_context(|| format!("Cannot read {:?}", path))?;
            format!("{:?}", path)
        }
        None => {
            io::stdin().read_to_string(&mut raw).context("Cannot read <stdin>")?;
            "<stdin>".to_owned()
        }
    };
    info!("Checking {source} ({} bytes)", raw.len());

    let text = trim_terminating_newline(&raw, cli.keep_trailing_newline);

    let errors = match check_format(text) {
        Ok(errors) => errors,
        Err(e) => {
            error!("{source}: {e}");
            return Err(e).with_context(|| format!("Cannot check {source}"));
        }
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&errors)?);
    } else {
        println!("\n=== Format check ===");
        println!("Input     : {source}");
        println!("Records   : {}", text.split('\n').count());
        println!("Log file  : {:?}", log_path);
        println!();
        if errors.is_empty() {
            println!("No errors found");
        } else {
            println!("Found errors:");
            print!("{errors}");
        }
    }

    if errors.is_empty() {
        info!("{source}: no errors found");
        return Ok(());
    }
    for (category, count) in errors.iter() {
        warn!("{source}: {category} x{count}");
    }
    process::exit(1);
}
