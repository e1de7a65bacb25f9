//! list command - Discover backup archives by name pattern
//!
//! With `--backup` or `--container` a single query runs. With neither, every
//! configured backup is listed in file order.

use std::path::Path;

use bmu_core::{BackupRecord, Config, ListQuery, MatchMode, ResolvedBackup};
use clap::Args;
use comfy_table::{Table, presets};
use serde::Serialize;

use super::{open_store, resolve_backup, resolve_container};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// List backup archives
#[derive(Args, Debug, Default)]
pub struct ListArgs {
    /// Configured backup to list
    #[arg(short, long)]
    pub backup: Option<String>,

    /// Container to list (overrides the backup entry)
    #[arg(short, long)]
    pub container: Option<String>,

    /// Label reported as the item of each record
    #[arg(long)]
    pub item: Option<String>,

    /// Label reported as the type of each record
    #[arg(long = "type")]
    pub item_type: Option<String>,

    /// Exact filename pattern
    #[arg(long)]
    pub filename: Option<String>,

    /// Pseudo-folder the archives live under
    #[arg(long)]
    pub folder: Option<String>,

    /// Filename prefix pattern
    #[arg(long)]
    pub prefix: Option<String>,

    /// Filename suffix pattern
    #[arg(long)]
    pub suffix: Option<String>,

    /// Require the pattern to match the whole object name
    #[arg(long)]
    pub full_match: bool,
}

#[derive(Debug, Serialize)]
struct ListOutput {
    records: Vec<BackupRecord>,
    total_count: usize,
}

/// Build a query from one backup entry, letting flags override its fields
fn build_query(args: &ListArgs, container: String, backup: Option<&ResolvedBackup>) -> ListQuery {
    let mut query = match backup {
        Some(b) => {
            let mut q = b.list_query();
            q.container = container;
            q
        }
        None => {
            let item = container.clone();
            ListQuery::new(item, "", container)
        }
    };

    if let Some(item) = &args.item {
        query.item = item.clone();
    }
    if let Some(item_type) = &args.item_type {
        query.item_type = item_type.clone();
    }
    if let Some(filename) = &args.filename {
        query = query.filename(filename);
    }
    if let Some(folder) = &args.folder {
        query = query.pseudo_folder(folder);
    }
    if let Some(prefix) = &args.prefix {
        query = query.prefix(prefix);
    }
    if let Some(suffix) = &args.suffix {
        query = query.suffix(suffix);
    }
    if args.full_match {
        query = query.match_mode(MatchMode::Full);
    }

    query
}

/// Queries to run for the given flags
fn plan_queries(args: &ListArgs, config: &Config) -> Result<Vec<ListQuery>, String> {
    if args.backup.is_none() && args.container.is_none() {
        let backups = config.expand();
        if backups.is_empty() {
            return Err("No backups configured (use --backup or --container)".to_string());
        }
        return Ok(backups
            .iter()
            .map(|b| build_query(args, b.container.clone(), Some(b)))
            .collect());
    }

    let backup = resolve_backup(config, args.backup.as_deref())?;
    let container = resolve_container(args.container.as_deref(), backup.as_ref(), config)?;
    Ok(vec![build_query(args, container, backup.as_ref())])
}

fn format_timestamp(record: &BackupRecord) -> String {
    record
        .last_modified
        .map(|ts| ts.strftime("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Execute the list command
pub async fn execute(args: ListArgs, config_path: Option<&Path>, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let (config, store) = match open_store(config_path, &formatter).await {
        Ok(opened) => opened,
        Err(code) => return code,
    };

    let queries = match plan_queries(&args, &config) {
        Ok(q) => q,
        Err(e) => {
            formatter.error(&e);
            return ExitCode::UsageError;
        }
    };

    let mut records = Vec::new();
    for query in &queries {
        match store.list(query).await {
            Ok(found) => records.extend(found),
            Err(e) => {
                formatter.error(&format!("Failed to list {}: {e}", query.container));
                return ExitCode::from_error(&e);
            }
        }
    }

    if formatter.is_json() {
        let total_count = records.len();
        formatter.json(&ListOutput {
            records,
            total_count,
        });
        return ExitCode::Success;
    }

    if records.is_empty() {
        formatter.println("No backups found.");
        return ExitCode::Success;
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_BORDERS_ONLY);
    table.set_header(vec!["ITEM", "TYPE", "FILENAME", "LAST MODIFIED"]);
    for record in &records {
        table.add_row(vec![
            formatter.style_name(&record.item),
            record.item_type.clone(),
            formatter.style_file(&record.filename),
            formatter.style_date(&format_timestamp(record)),
        ]);
    }
    formatter.println(&table.to_string());
    formatter.println(&format!("\nTotal: {} backup(s)", records.len()));

    ExitCode::Success
}
