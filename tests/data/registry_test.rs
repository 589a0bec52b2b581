//! Integration tests for opening datasets and partitioning them into
//! training sets.

use std::fs;
use std::path::{Path, PathBuf};

use probrem::config::{Settings, SettingsError};
use probrem::data::{
    datasetinterface_factory, Backend, DataError, DataRegistry, DiType, TrainingSet,
};
use probrem::sql::{SqlValue, Statement};

fn create_database(path: &Path) {
    let conn = rusqlite::Connection::open(path).unwrap();
    conn.execute_batch(
        "CREATE TABLE Professor (prof_id INTEGER PRIMARY KEY, fame INTEGER);
         INSERT INTO Professor (prof_id) VALUES (1), (2), (3);",
    )
    .unwrap();
}

fn databases(dir: &Path, n: usize) -> Vec<PathBuf> {
    (0..n)
        .map(|i| {
            let path = dir.join(format!("school_{i}.sqlite"));
            create_database(&path);
            path
        })
        .collect()
}

#[test]
fn test_factory_rejects_unknown_backend() {
    let err = datasetinterface_factory("school.sqlite", "Postgres").unwrap_err();
    assert!(matches!(err, DataError::UnknownBackend(name) if name == "Postgres"));

    let err = datasetinterface_factory("school.xml", "XML").unwrap_err();
    assert!(matches!(err, DataError::NotImplemented(Backend::Xml)));
}

#[test]
fn test_factory_requires_existing_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing.sqlite");

    assert!(datasetinterface_factory(&path, "SQLite").is_err());
    assert!(!path.exists());
}

#[test]
fn test_factory_opens_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let path = databases(dir.path(), 1).remove(0);

    let dsi = datasetinterface_factory(&path, "sqlite").unwrap();
    assert_eq!(dsi.backend(), Backend::Sqlite);
    let rows = dsi
        .execute_query(&Statement::new("SELECT COUNT(*) FROM Professor"))
        .unwrap();
    assert_eq!(rows, vec![vec![SqlValue::Integer(3)]]);
    dsi.close().unwrap();
}

#[test]
fn test_leave_one_out_training_sets() {
    let dir = tempfile::tempdir().unwrap();
    let mut registry = DataRegistry::new("school", DiType::CrossValidation);
    for path in databases(dir.path(), 3) {
        registry.register(datasetinterface_factory(&path, "SQLite").unwrap());
    }

    let sets = registry.compute_training_sets().to_vec();
    assert_eq!(
        sets,
        vec![
            TrainingSet { test: 0, train: vec![1, 2] },
            TrainingSet { test: 1, train: vec![0, 2] },
            TrainingSet { test: 2, train: vec![0, 1] },
        ]
    );
    for set in &sets {
        assert_eq!(set.train.len(), registry.len() - 1);
        assert!(!set.train.contains(&set.test));
    }

    registry.close_all().unwrap();
    assert!(registry.is_empty());
    assert!(registry.training_sets().is_empty());
}

#[test]
fn test_committed_writes_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = databases(dir.path(), 1).remove(0);
    let update = Statement::new("UPDATE Professor SET fame = ? WHERE prof_id = ?")
        .with_params(vec![SqlValue::Integer(1), SqlValue::Integer(2)]);
    let select = Statement::new("SELECT fame FROM Professor WHERE prof_id = 2");

    let mut dsi = datasetinterface_factory(&path, "SQLite").unwrap();
    dsi.begin().unwrap();
    dsi.execute_update(&update).unwrap();
    dsi.rollback().unwrap();
    dsi.close().unwrap();

    let mut dsi = datasetinterface_factory(&path, "SQLite").unwrap();
    assert_eq!(dsi.execute_query(&select).unwrap(), vec![vec![SqlValue::Null]]);
    dsi.begin().unwrap();
    dsi.execute_update(&update).unwrap();
    dsi.commit().unwrap();
    dsi.close().unwrap();

    let dsi = datasetinterface_factory(&path, "SQLite").unwrap();
    assert_eq!(
        dsi.execute_query(&select).unwrap(),
        vec![vec![SqlValue::Integer(1)]]
    );
}

#[test]
fn test_settings_open_registry() {
    let dir = tempfile::tempdir().unwrap();
    databases(dir.path(), 2);
    let config = dir.path().join("probrem.toml");
    fs::write(
        &config,
        r#"
name = "school"
di_type = "cross-validation"

[[datasets]]
path = "school_0.sqlite"

[[datasets]]
path = "school_1.sqlite"
backend = "SQLite"
"#,
    )
    .unwrap();

    let settings = Settings::from_file(&config).unwrap();
    let mut registry = settings.open_registry().unwrap();
    assert_eq!(registry.name(), "school");
    assert_eq!(registry.di_type(), DiType::CrossValidation);
    assert_eq!(registry.len(), 2);
    assert_eq!(registry.compute_training_sets().len(), 2);
}

#[test]
fn test_settings_report_bad_dataset() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("probrem.toml");
    fs::write(
        &config,
        "[[datasets]]\npath = \"school.sqlite\"\nbackend = \"Postgres\"\n",
    )
    .unwrap();

    let settings = Settings::from_file(&config).unwrap();
    assert!(matches!(
        settings.open_registry(),
        Err(SettingsError::Dataset {
            source: DataError::UnknownBackend(_),
            ..
        })
    ));
}
