//! get command - Fetch an archive from a container to local disk

use std::path::{Path, PathBuf};

use bmu_core::{Config, ResolvedBackup};
use clap::Args;
use serde::Serialize;

use super::{open_store, resolve_backup, resolve_container};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};
use crate::progress;

/// Fetch a backup archive to local disk
#[derive(Args, Debug)]
pub struct GetArgs {
    /// Object name, including any pseudo-folder
    pub filename: String,

    /// Configured backup supplying container and output directory
    #[arg(short, long)]
    pub backup: Option<String>,

    /// Source container (overrides the backup entry)
    #[arg(short, long)]
    pub container: Option<String>,

    /// Directory to write into
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct GetOutput {
    container: String,
    filename: String,
    path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    size_bytes: Option<u64>,
}

/// Output directory: flag, then backup entry, then `[defaults]`, then the working directory
fn output_directory(
    explicit: Option<PathBuf>,
    backup: Option<&ResolvedBackup>,
    config: &Config,
) -> PathBuf {
    explicit
        .or_else(|| backup.and_then(|b| b.output_directory.clone()))
        .or_else(|| config.defaults.output_directory.clone())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Execute the get command
pub async fn execute(args: GetArgs, config_path: Option<&Path>, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let (config, store) = match open_store(config_path, &formatter).await {
        Ok(opened) => opened,
        Err(code) => return code,
    };

    let backup = match resolve_backup(&config, args.backup.as_deref()) {
        Ok(b) => b,
        Err(e) => {
            formatter.error(&e);
            return ExitCode::UsageError;
        }
    };

    let container = match resolve_container(args.container.as_deref(), backup.as_ref(), &config) {
        Ok(c) => c,
        Err(e) => {
            formatter.error(&e);
            return ExitCode::UsageError;
        }
    };

    let out_dir = output_directory(args.output, backup.as_ref(), &config);
    if out_dir.join(&args.filename).is_file() {
        formatter.warning(&format!(
            "Replacing existing {}",
            out_dir.join(&args.filename).display()
        ));
    }

    let spinner = progress::spinner(&formatter, &format!("Fetching {}", args.filename));
    let result = store.get(&container, &args.filename, &out_dir).await;
    spinner.finish_and_clear();

    let path = match result {
        Ok(path) => path,
        Err(e) => {
            formatter.error(&e.to_string());
            return ExitCode::from_error(&e);
        }
    };

    let size = std::fs::metadata(&path).ok().map(|m| m.len());
    if formatter.is_json() {
        formatter.json(&GetOutput {
            container,
            filename: args.filename,
            path: path.display().to_string(),
            size_bytes: size,
        });
    } else {
        let size_human = size
            .map(|s| format!(" ({})", humansize::format_size(s, humansize::BINARY)))
            .unwrap_or_default();
        formatter.success(&format!(
            "Fetched {} to {}{}",
            formatter.style_file(&args.filename),
            path.display(),
            formatter.style_size(&size_human)
        ));
    }

    ExitCode::Success
}
