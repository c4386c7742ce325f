use anyhow::{Context, Result};
use chrono::Local;
use simplelog::{Config as LogConfig, LevelFilter, WriteLogger};
use std::fs::{create_dir_all, File};
use std::path::{Path, PathBuf};

/// Send `log` output of this run to `<log_dir>/<tool>_<timestamp>.log`.
/// Returns the path of the log file.
pub fn init_file_logger(log_dir: &Path, tool: &str) -> Result<PathBuf> {
    create_dir_all(log_dir)
        .with_context(|| format!("Cannot create log directory {:?}", log_dir))?;
    let ts = Local::now().format("%Y%m%d_%H%M%S");
    let log_path = log_dir.join(format!("{tool}_{ts}.log"));
    WriteLogger::init(
        LevelFilter::Info,
        LogConfig::default(),
        File::create(&log_path).with_context(|| format!("Cannot open log file {:?}", log_path))?,
    )?;
    Ok(log_path)
}
