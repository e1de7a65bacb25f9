//! rm command - Delete an archive from a container

use std::path::Path;

use clap::Args;
use serde::Serialize;

use super::{open_store, resolve_backup, resolve_container};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Delete a backup archive
#[derive(Args, Debug)]
pub struct RmArgs {
    /// Object name, including any pseudo-folder
    pub filename: String,

    /// Configured backup supplying the container
    #[arg(short, long)]
    pub backup: Option<String>,

    /// Container holding the archive (overrides the backup entry)
    #[arg(short, long)]
    pub container: Option<String>,
}

#[derive(Debug, Serialize)]
struct RmOutput {
    container: String,
    filename: String,
    deleted: bool,
}

/// Execute the rm command
pub async fn execute(args: RmArgs, config_path: Option<&Path>, output_config: OutputConfig) -> ExitCode {
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

    if let Err(e) = store.delete(&container, &args.filename).await {
        formatter.error(&e.to_string());
        return ExitCode::from_error(&e);
    }

    if formatter.is_json() {
        formatter.json(&RmOutput {
            container,
            filename: args.filename,
            deleted: true,
        });
    } else {
        formatter.success(&format!(
            "Removed {} from {}",
            formatter.style_file(&args.filename),
            formatter.style_name(&container)
        ));
    }

    ExitCode::Success
}
