//! upload command - Store a local archive in a container

use std::path::{Path, PathBuf};

use bmu_core::ContainerPolicy;
use clap::Args;
use serde::Serialize;

use super::{open_store, resolve_backup, resolve_container};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};
use crate::progress;

/// Upload a backup archive
#[derive(Args, Debug)]
pub struct UploadArgs {
    /// Local file to upload
    pub file: PathBuf,

    /// Configured backup supplying container and folder
    #[arg(short, long)]
    pub backup: Option<String>,

    /// Target container (overrides the backup entry)
    #[arg(short, long)]
    pub container: Option<String>,

    /// Pseudo-folder to upload under
    #[arg(long)]
    pub folder: Option<String>,

    /// Fail instead of creating a missing container
    #[arg(long)]
    pub no_create_container: bool,
}

#[derive(Debug, Serialize)]
struct UploadOutput {
    container: String,
    name: String,
    size_bytes: u64,
    size_human: String,
}

/// Execute the upload command
pub async fn execute(args: UploadArgs, config_path: Option<&Path>, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let size = match std::fs::metadata(&args.file) {
        Ok(meta) if meta.is_file() => meta.len(),
        Ok(_) => {
            formatter.error(&format!("{} is not a regular file", args.file.display()));
            return ExitCode::UsageError;
        }
        Err(e) => {
            formatter.error(&format!("Cannot read {}: {e}", args.file.display()));
            return ExitCode::UsageError;
        }
    };

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

    let folder = args
        .folder
        .or_else(|| backup.as_ref().and_then(|b| b.pseudo_folder.clone()));

    let create = !args.no_create_container
        && backup
            .as_ref()
            .map(|b| b.create_container)
            .unwrap_or_else(|| config.defaults.create_container.unwrap_or(true));

    let spinner = progress::spinner(&formatter, &format!("Uploading {}", args.file.display()));
    let result = store
        .upload(
            &container,
            &args.file,
            folder.as_deref(),
            ContainerPolicy::from(create),
        )
        .await;
    spinner.finish_and_clear();

    let name = match result {
        Ok(name) => name,
        Err(e) => {
            formatter.error(&format!("Failed to upload {}: {e}", args.file.display()));
            return ExitCode::from_error(&e);
        }
    };

    let size_human = humansize::format_size(size, humansize::BINARY);
    if formatter.is_json() {
        formatter.json(&UploadOutput {
            container,
            name,
            size_bytes: size,
            size_human,
        });
    } else {
        formatter.success(&format!(
            "Uploaded {} to {} ({})",
            formatter.style_file(&name),
            formatter.style_name(&container),
            formatter.style_size(&size_human)
        ));
    }

    ExitCode::Success
}
