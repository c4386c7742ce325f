/*
cargo files_to_jsonl \
    --system "You draw pictures as SVG." \
    --user   'Draw a ${fileName}.' \
    --out-file data/converted_data.jsonl \
    data/svgs

cargo files_to_jsonl \
    --system "You summarise articles." \
    --user   "Summarise the article." \
    --overrides-file data/rows.json \
    --skip draft.txt \
    --max-chars 4000 \
    data/articles/a.txt data/articles/b.txt data/articles/draft.txt
*/

use anyhow::{bail, Context, Result};
use clap::Parser;
use ft_jsonl::convert::{
    apply_overrides, collect_input_files, is_exceeding_limit, read_text_lossy, to_jsonl,
    write_if_clean, ProcessedFile, RowOverride,
};
use ft_jsonl::logging::init_file_logger;
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use std::fs::File;
use std::path::PathBuf;
use std::process;

/// Turn every input file into an assistant message paired with a system and
/// user prompt, check the result and write it as JSONL.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Files, or directories whose files are taken in name order
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// System prompt shared by every row
    #[arg(long, default_value = "")]
    system: String,

    /// User prompt shared by every row; ${fileName} becomes the file name without extension
    #[arg(long, default_value = "")]
    user: String,

    /// JSON array of {name, system?, user?} replacing the prompts of single rows
    #[arg(long, value_name = "PATH")]
    overrides_file: Option<PathBuf>,

    /// Drop the row of this file name (repeatable)
    #[arg(long, value_name = "NAME")]
    skip: Vec<String>,

    /// Assistant messages longer than this are reported
    #[arg(long, default_value_t = 8192)]
    max_chars: usize,

    #[arg(long = "out-file", value_name = "PATH", default_value = "converted_data.jsonl")]
    out_file: PathBuf,

    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_path = init_file_logger(&cli.log_dir, "files_to_jsonl")?;
    info!("Starting file conversion");

    let paths = collect_input_files(&cli.inputs)?;
    if paths.is_empty() {
        bail!("No valid files were selected");
    }

    // read files
    let pb = ProgressBar::new(paths.len() as u64);
    pb.set_style(
        ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} {msg}")?
            .progress_chars("##-"),
    );

    let mut rows: Vec<ProcessedFile> = Vec::with_capacity(paths.len());
    for path in &paths {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .with_context(|| format!("No file name in {:?}", path))?;
        pb.set_message(name.clone());
        let content = read_text_lossy(path)?;
        rows.push(ProcessedFile::new(name, content, &cli.system, &cli.user));
        pb.inc(1);
    }
    pb.finish_and_clear();
    info!("Read {} files", rows.len());

    // per-row edits
    if let Some(path) = &cli.overrides_file {
        let overrides: Vec<RowOverride> = serde_json::from_reader(
            File::open(path).with_context(|| format!("Cannot open overrides file {:?}", path))?,
        )
        .with_context(|| format!("Overrides file {:?} malformed", path))?;
        for name in apply_overrides(&mut rows, &overrides) {
            warn!("Override for {name} matches no input file");
        }
    }
    for name in &cli.skip {
        let before = rows.len();
        rows.retain(|r| &r.name != name);
        if rows.len() == before {
            warn!("--skip {name} matches no input file");
        }
    }
    if rows.is_empty() {
        bail!("Every row was skipped, nothing to convert");
    }

    // size report
    let mut total_chars = 0usize;
    let mut over_limit: Vec<(&str, usize)> = Vec::new();
    for row in &rows {
        let count = row.assistant_chars();
        total_chars += count;
        if is_exceeding_limit(count, cli.max_chars) {
            warn!("{} has {count} chars (limit {})", row.name, cli.max_chars);
            over_limit.push((row.name.as_str(), count));
        }
    }

    // build, check and write
    let records: Vec<_> = rows.iter().map(ProcessedFile::to_record).collect();
    let jsonl = to_jsonl(&records)?;
    let errors = write_if_clean(&cli.out_file, &jsonl)?;

    println!("\n=== Conversion summary ===");
    println!("Rows             : {}", rows.len());
    println!("Assistant chars  : {}", total_chars);
    if !over_limit.is_empty() {
        println!("Files exceeding {} chars:", cli.max_chars);
        for (name, count) in &over_limit {
            println!("  {:<30} {}", name, count);
        }
    }
    println!("Log file         : {:?}", log_path);

    if !errors.is_empty() {
        println!("\nFound errors, nothing written:");
        print!("{errors}");
        for (category, count) in errors.iter() {
            warn!("{category} x{count}");
        }
        process::exit(1);
    }

    info!("Wrote {} records → {:?}", records.len(), cli.out_file);
    println!("Output JSONL     : {:?}", cli.out_file);

    Ok(())
}
