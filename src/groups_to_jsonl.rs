/*
cargo groups_to_jsonl \
    --groups-file data/groups.json \
    --out-file    data/fine-tuning-data.jsonl

groups.json:
[
  [
    {"role": "system",    "content": "You are a helpful assistant."},
    {"role": "user",      "content": "Draw a circle."},
    {"role": "assistant", "type": "svg", "content": "<svg>\n<circle r=\"4\"/>\n</svg>"}
  ]
]
*/

use anyhow::{bail, Context, Result};
use clap::Parser;
use ft_jsonl::convert::{group_record, to_jsonl, write_if_clean, GroupMessage};
use ft_jsonl::logging::init_file_logger;
use log::{info, warn};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::process;

/// Convert hand-written message groups into fine-tuning JSONL.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// JSON array of groups, each an array of {role, type?, content}
    #[arg(long, value_name = "PATH")]
    groups_file: PathBuf,

    #[arg(long = "out-file", value_name = "PATH", default_value = "fine-tuning-data.jsonl")]
    out_file: PathBuf,

    /// Also print the JSONL to stdout
    #[arg(long)]
    print: bool,

    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_path = init_file_logger(&cli.log_dir, "groups_to_jsonl")?;
    info!("Starting group conversion from {:?}", cli.groups_file);

    // load groups
    let file = File::open(&cli.groups_file)
        .with_context(|| format!("Cannot open groups file {:?}", cli.groups_file))?;
    let groups: Vec<Vec<GroupMessage>> = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Groups file {:?} malformed", cli.groups_file))?;
    if groups.is_empty() {
        bail!("No message groups in {:?}", cli.groups_file);
    }
    for (idx, group) in groups.iter().enumerate() {
        if group.is_empty() {
            warn!("Group {} has no messages", idx + 1);
        }
    }

    let records: Vec<_> = groups.iter().map(|g| group_record(g.as_slice())).collect();
    let jsonl = to_jsonl(&records)?;
    let errors = write_if_clean(&cli.out_file, &jsonl)?;

    if cli.print {
        println!("{jsonl}");
    }

    println!("\n=== Conversion summary ===");
    println!("Groups    : {}", groups.len());
    println!("Messages  : {}", groups.iter().map(Vec::len).sum::<usize>());
    println!("Log file  : {:?}", log_path);

    if !errors.is_empty() {
        println!("\nFound errors, nothing written:");
        print!("{errors}");
        for (category, count) in errors.iter() {
            warn!("{category} x{count}");
        }
        process::exit(1);
    }

    info!("Wrote {} records → {:?}", records.len(), cli.out_file);
    println!("Output    : {:?}", cli.out_file);

    Ok(())
}
