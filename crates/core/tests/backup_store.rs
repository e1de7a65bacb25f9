//! End-to-end backup store behaviour against the local filesystem backend

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bmu_core::{
    BackupStore, ContainerPolicy, Error, ListQuery, LocalStore, MatchMode, ObjectStore,
};
use tempfile::TempDir;

struct Fixture {
    _dir: TempDir,
    backend: Arc<LocalStore>,
    store: BackupStore,
    work: PathBuf,
}

fn fixture() -> Fixture {
    let dir = TempDir::new().expect("temp dir");
    let backend = Arc::new(LocalStore::init(dir.path().join("remote")).expect("store root"));
    let work = dir.path().join("work");
    std::fs::create_dir_all(&work).expect("work dir");
    Fixture {
        store: BackupStore::new(backend.clone()),
        backend,
        work,
        _dir: dir,
    }
}

fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).expect("write source");
    path
}

#[tokio::test]
async fn upload_creates_container_and_object() {
    let fx = fixture();
    let source = write_file(&fx.work, "db.sql", "create table t;");

    let name = fx
        .store
        .upload("backups", &source, Some("nightly"), ContainerPolicy::Create)
        .await
        .unwrap();

    assert_eq!(name, "nightly/db.sql");
    assert!(fx.backend.container_exists("backups").await.unwrap());
    assert!(
        fx.backend
            .object_metadata("backups", "nightly/db.sql")
            .await
            .unwrap()
            .is_found()
    );
}

#[tokio::test]
async fn upload_without_creating_fails_on_missing_container() {
    let fx = fixture();
    let source = write_file(&fx.work, "db.sql", "x");

    let err = fx
        .store
        .upload("backups", &source, None, ContainerPolicy::ProceedWithoutCreating)
        .await
        .unwrap_err();

    assert!(err.is_not_found());
    assert!(!fx.backend.container_exists("backups").await.unwrap());
}

#[tokio::test]
async fn repeated_upload_overwrites_single_object() {
    let fx = fixture();
    let source = write_file(&fx.work, "db.sql", "v1");
    fx.store
        .upload("backups", &source, None, ContainerPolicy::Create)
        .await
        .unwrap();

    std::fs::write(&source, "v2").unwrap();
    fx.store
        .upload("backups", &source, None, ContainerPolicy::Create)
        .await
        .unwrap();

    let objects = fx.backend.list_objects("backups").await.unwrap();
    assert_eq!(objects.len(), 1);
    assert_eq!(objects[0].name, "db.sql");

    let out = fx.work.join("restore");
    let dest = fx.store.get("backups", "db.sql", &out).await.unwrap();
    assert_eq!(std::fs::read_to_string(dest).unwrap(), "v2");
}

#[tokio::test]
async fn get_recreates_directory_structure() {
    let fx = fixture();
    let source = write_file(&fx.work, "site.tar", "archive bytes");
    fx.store
        .upload("backups", &source, Some("web/2024"), ContainerPolicy::Create)
        .await
        .unwrap();

    let out = fx.work.join("restore");
    let dest = fx.store.get("backups", "web/2024/site.tar", &out).await.unwrap();
    assert_eq!(dest, out.join("web/2024/site.tar"));
    assert_eq!(std::fs::read_to_string(&dest).unwrap(), "archive bytes");

    // a second fetch overwrites in place
    fx.store.get("backups", "web/2024/site.tar", &out).await.unwrap();
    assert_eq!(std::fs::read_dir(out.join("web/2024")).unwrap().count(), 1);
}

#[tokio::test]
async fn get_reports_missing_container_and_file() {
    let fx = fixture();
    let out = fx.work.join("restore");

    let err = fx.store.get("nope", "db.sql", &out).await.unwrap_err();
    assert!(matches!(err, Error::Store(ref m) if m.contains("container not found")));

    fx.backend.create_container("backups").await.unwrap();
    let err = fx.store.get("backups", "db.sql", &out).await.unwrap_err();
    assert!(matches!(err, Error::Store(ref m) if m.contains("db.sql")));
    assert!(!out.exists());
}

#[tokio::test]
async fn delete_removes_object_and_reports_missing() {
    let fx = fixture();
    let source = write_file(&fx.work, "db.sql", "x");
    fx.store
        .upload("backups", &source, None, ContainerPolicy::Create)
        .await
        .unwrap();

    fx.store.delete("backups", "db.sql").await.unwrap();
    assert!(
        !fx.backend
            .object_metadata("backups", "db.sql")
            .await
            .unwrap()
            .is_found()
    );

    let err = fx.store.delete("backups", "db.sql").await.unwrap_err();
    match err {
        Error::Store(msg) => assert_eq!(msg, "error deleting db.sql"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn list_discovery_modes() {
    let fx = fixture();
    for (folder, file) in [
        ("backups", "db.sql"),
        ("backups", "web.tar"),
        ("archive", "db-2023.sql"),
    ] {
        let source = write_file(&fx.work, file, file);
        fx.store
            .upload("main", &source, Some(folder), ContainerPolicy::Create)
            .await
            .unwrap();
    }

    // folder-scoped prefix
    let records = fx
        .store
        .list(
            &ListQuery::new("site", "mysql", "main")
                .pseudo_folder("backups")
                .prefix("db"),
        )
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].filename, "backups/db.sql");
    assert_eq!(records[0].item, "site");
    assert_eq!(records[0].item_type, "mysql");
    assert!(records[0].last_modified.is_some());

    // folder-scoped exact name
    let records = fx
        .store
        .list(
            &ListQuery::new("site", "mysql", "main")
                .pseudo_folder("backups")
                .filename("web.tar"),
        )
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].filename, "backups/web.tar");

    // suffix across folders, reported as the matched span
    let records = fx
        .store
        .list(&ListQuery::new("site", "mysql", "main").suffix(".sql"))
        .await
        .unwrap();
    let names: Vec<_> = records.iter().map(|r| r.filename.as_str()).collect();
    assert_eq!(names, vec!["archive/db-2023.sql", "backups/db.sql"]);

    // prefix under full matching only accepts names that start with it
    let records = fx
        .store
        .list(
            &ListQuery::new("site", "mysql", "main")
                .prefix("db")
                .match_mode(MatchMode::Full),
        )
        .await
        .unwrap();
    assert!(records.is_empty());

    // no criteria lists everything
    let records = fx
        .store
        .list(&ListQuery::new("site", "mysql", "main"))
        .await
        .unwrap();
    assert_eq!(records.len(), 3);
}

#[tokio::test]
async fn list_missing_container_propagates_backend_error() {
    let fx = fixture();
    let err = fx
        .store
        .list(&ListQuery::new("i", "t", "missing"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}
