//! Golden tests for verifying JSON output format stability
//!
//! Each test runs the `bmu` binary against a throwaway local store.
//!
//! Run with: `cargo test --features golden`

#![cfg(feature = "golden")]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

struct Env {
    dir: TempDir,
    config: PathBuf,
}

impl Env {
    fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let config = dir.path().join("config.toml");
        let root = dir.path().join("store");
        std::fs::write(
            &config,
            format!(
                r#"
[store]
type = "local"
root = "{}"

[[backups]]
name = "db"
container = "pg"
type = "database"
pseudo_folder = "nightly"
filename_suffix = '\.sql'
"#,
                root.display()
            ),
        )
        .expect("Failed to write config");
        Self { dir, config }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn bmu(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_bmu"))
            .arg("--config")
            .arg(&self.config)
            .args(args)
            .env_remove("RUST_LOG")
            .output()
            .expect("Failed to execute bmu")
    }

    fn archive(&self, name: &str, content: &str) -> String {
        let path = self.path().join(name);
        std::fs::write(&path, content).expect("Failed to write archive");
        path.display().to_string()
    }
}

fn json(output: &Output) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(&stdout).expect("Output should be valid JSON")
}

#[test]
fn test_upload_json() {
    let env = Env::new();
    let archive = env.archive("db-2024-05-01.sql", "select 1;\n");

    let output = env.bmu(&["upload", &archive, "--backup", "db", "--json"]);
    assert!(output.status.success(), "upload should succeed");

    insta::assert_json_snapshot!(json(&output), @r#"
    {
      "container": "pg",
      "name": "nightly/db-2024-05-01.sql",
      "size_bytes": 10,
      "size_human": "10 B"
    }
    "#);
}

#[test]
fn test_list_json() {
    let env = Env::new();
    for name in ["db-2024-05-01.sql", "db-2024-05-02.sql", "notes.txt"] {
        let archive = env.archive(name, "x");
        let output = env.bmu(&["upload", &archive, "--backup", "db", "--json"]);
        assert!(output.status.success(), "upload of {name} should succeed");
    }

    let output = env.bmu(&["list", "--json"]);
    assert!(output.status.success(), "list should succeed");

    let mut value = json(&output);
    let records = value["records"].as_array_mut().expect("records array");
    for record in records.iter_mut() {
        let record = record.as_object_mut().expect("record object");
        assert!(record.remove("last-modified").is_some());
    }

    insta::assert_json_snapshot!(value, @r#"
    {
      "records": [
        {
          "filename": "nightly/db-2024-05-01.sql",
          "item": "db",
          "type": "database"
        },
        {
          "filename": "nightly/db-2024-05-02.sql",
          "item": "db",
          "type": "database"
        }
      ],
      "total_count": 2
    }
    "#);
}

#[test]
fn test_get_missing_file_json() {
    let env = Env::new();
    let archive = env.archive("db-2024-05-01.sql", "x");
    assert!(env.bmu(&["upload", &archive, "--backup", "db"]).status.success());

    let output = env.bmu(&["get", "nightly/absent.sql", "--backup", "db", "--json"]);
    assert_eq!(output.status.code(), Some(5));

    let stderr = String::from_utf8_lossy(&output.stderr);
    let value: serde_json::Value = serde_json::from_str(&stderr).expect("error JSON");
    insta::assert_json_snapshot!(value, @r#"
    {
      "error": "nightly/absent.sql: file not found in store"
    }
    "#);
}

#[test]
fn test_rm_json() {
    let env = Env::new();
    let archive = env.archive("db-2024-05-01.sql", "x");
    assert!(env.bmu(&["upload", &archive, "--backup", "db"]).status.success());

    let output = env.bmu(&[
        "rm",
        "nightly/db-2024-05-01.sql",
        "--backup",
        "db",
        "--json",
    ]);
    assert!(output.status.success(), "rm should succeed");

    insta::assert_json_snapshot!(json(&output), @r#"
    {
      "container": "pg",
      "deleted": true,
      "filename": "nightly/db-2024-05-01.sql"
    }
    "#);
}
