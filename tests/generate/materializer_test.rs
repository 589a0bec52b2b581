//! Integration tests for dataset generation over SQLite skeletons.

use std::path::Path;

use probrem::cpd::CpdTabular;
use probrem::data::{Backend, DataResult, DataSetInterface, SqliteInterface};
use probrem::generate::{generate_missing_cpds, GenerateError, GenerateOptions, Materializer};
use probrem::model::{parse_model, Attribute, Dependency, ErClass, Prm};
use probrem::planner::{AttributePlanner, QueryError};
use probrem::sql::{Dialect, SqlValue, Statement};
use rand::rngs::StdRng;
use rand::SeedableRng;

const SCHOOL: &str = r#"
name = "school"

[[class]]
name = "Professor"
pk = ["prof_id"]

[[class]]
name = "Student"
pk = ["student_id"]

[[class]]
name = "advisor"
pk = ["prof_id", "student_id"]
kind = "relationship"

[[attribute]]
class = "Professor"
name = "fame"
domain = [0, 1]
cpd = { table = [[0.4, 0.6]] }

[[attribute]]
class = "Professor"
name = "funding"
domain = [0, 1]
cpd = { table = [[0.9, 0.1], [0.1, 0.9]] }

[[attribute]]
class = "Student"
name = "success"
domain = [0, 1]
cpd = { table = [[0.5, 0.5], [0.0, 1.0]] }

[[dependency]]
child = "Professor.funding"
parent = "Professor.fame"

[[dependency]]
child = "Student.success"
parent = "Professor.fame"
slotchain = ["Student", "advisor", "Professor"]
joins = ["Student.student_id = advisor.student_id", "advisor.prof_id = Professor.prof_id"]
aggregator = "MAX"
"#;

/// Passes everything through to SQLite and keeps every UPDATE it saw.
#[derive(Debug)]
struct Recording {
    inner: SqliteInterface,
    updates: Vec<Statement>,
}

impl DataSetInterface for Recording {
    fn backend(&self) -> Backend {
        self.inner.backend()
    }

    fn describe(&self) -> String {
        format!("recording {}", self.inner.describe())
    }

    fn execute_query(&self, statement: &Statement) -> DataResult<Vec<Vec<SqlValue>>> {
        self.inner.execute_query(statement)
    }

    fn execute_update(&mut self, statement: &Statement) -> DataResult<usize> {
        self.updates.push(statement.clone());
        self.inner.execute_update(statement)
    }

    fn begin(&mut self) -> DataResult<()> {
        self.inner.begin()
    }

    fn commit(&mut self) -> DataResult<()> {
        self.inner.commit()
    }

    fn rollback(&mut self) -> DataResult<()> {
        self.inner.rollback()
    }

    fn in_transaction(&self) -> bool {
        self.inner.in_transaction()
    }

    fn close(self: Box<Self>) -> DataResult<()> {
        Box::new(self.inner).close()
    }
}

fn professor_model() -> Prm {
    Prm::builder("professors")
        .class(ErClass::entity("Professor", vec!["prof_id"]))
        .attribute(Attribute::new("Professor", "fame", vec![0, 1]))
        .attribute(Attribute::new("Professor", "funding", vec![0, 1]))
        .dependency(
            Dependency::new("Professor.funding", "Professor.fame").slotchain(vec!["Professor"]),
        )
        .cpd(
            "Professor.fame",
            CpdTabular::new(vec![0, 1], vec![], vec![vec![0.5, 0.5]]).unwrap(),
        )
        .cpd(
            "Professor.funding",
            CpdTabular::new(
                vec![0, 1],
                vec![vec![0, 1]],
                vec![vec![0.7, 0.3], vec![0.2, 0.8]],
            )
            .unwrap(),
        )
        .build()
        .unwrap()
}

/// Ten professors with `fame` already sampled.
fn famous_skeleton() -> Recording {
    let mut inner = SqliteInterface::open_in_memory().unwrap();
    inner
        .execute_batch(
            "CREATE TABLE Professor (prof_id INTEGER PRIMARY KEY, fame INTEGER, funding INTEGER);
             INSERT INTO Professor (prof_id, fame) VALUES
                 (1, 0), (2, 1), (3, 1), (4, 0), (5, 1), (6, 0), (7, 1), (8, 1), (9, 0), (10, 1);",
        )
        .unwrap();
    Recording {
        inner,
        updates: Vec::new(),
    }
}

fn generate_funding(dsi: &mut Recording, seed: u64) {
    let prm = professor_model();
    Materializer::new(&prm, Dialect::Sqlite)
        .with_options(GenerateOptions {
            start_from: Some("Professor.funding".into()),
        })
        .run(dsi, &mut StdRng::seed_from_u64(seed))
        .unwrap();
}

fn school() -> Prm {
    parse_model(SCHOOL, Path::new(".")).unwrap()
}

fn skeleton() -> SqliteInterface {
    let mut dsi = SqliteInterface::open_in_memory().unwrap();
    dsi.execute_batch(
        "CREATE TABLE Professor (prof_id INTEGER PRIMARY KEY, fame INTEGER, funding INTEGER);
         CREATE TABLE Student (student_id INTEGER PRIMARY KEY, success INTEGER);
         CREATE TABLE advisor (prof_id INTEGER, student_id INTEGER, PRIMARY KEY (prof_id, student_id));
         INSERT INTO Professor (prof_id) VALUES (1), (2), (3), (4), (5), (6), (7), (8), (9), (10);
         INSERT INTO Student (student_id) VALUES (100), (101), (102), (103);
         INSERT INTO advisor VALUES (1, 100), (2, 100), (3, 101), (4, 102);",
    )
    .unwrap();
    dsi
}

fn column(dsi: &SqliteInterface, sql: &str) -> Vec<SqlValue> {
    dsi.execute_query(&Statement::new(sql))
        .unwrap()
        .into_iter()
        .map(|mut row| row.remove(0))
        .collect()
}

fn professors(dsi: &SqliteInterface, attr: &str) -> Vec<SqlValue> {
    column(dsi, &format!("SELECT {attr} FROM Professor ORDER BY prof_id"))
}

#[test]
fn test_funding_gets_one_update_per_professor() {
    let mut dsi = famous_skeleton();
    generate_funding(&mut dsi, 42);

    assert_eq!(dsi.updates.len(), 10);
    for (i, update) in dsi.updates.iter().enumerate() {
        assert_eq!(
            update.sql,
            r#"UPDATE "Professor" SET "funding" = ? WHERE "prof_id" = ?"#
        );
        assert!(matches!(
            update.params[0],
            SqlValue::Integer(0) | SqlValue::Integer(1)
        ));
        assert_eq!(update.params[1], SqlValue::Integer(i as i64 + 1));
    }
}

#[test]
fn test_rerun_with_same_seed_is_identical() {
    let mut first = famous_skeleton();
    generate_funding(&mut first, 8);
    let mut second = famous_skeleton();
    generate_funding(&mut second, 8);
    generate_funding(&mut first, 8);

    assert_eq!(first.updates.len(), 20);
    assert_eq!(first.updates[..10], first.updates[10..]);
    assert_eq!(first.updates[..10], second.updates[..]);
}

#[test]
fn test_written_values_are_read_back_as_parents() {
    let prm = professor_model();
    let mut dsi = famous_skeleton();
    Materializer::new(&prm, Dialect::Sqlite)
        .run(&mut dsi, &mut StdRng::seed_from_u64(4))
        .unwrap();

    let written: Vec<SqlValue> = dsi
        .updates
        .iter()
        .filter(|u| u.sql.contains(r#"SET "fame""#))
        .map(|u| u.params[0].clone())
        .collect();
    assert_eq!(written.len(), 10);

    let query = AttributePlanner::new(&prm, Dialect::Sqlite)
        .select_for("Professor.funding")
        .unwrap();
    let parents: Vec<SqlValue> = dsi
        .execute_query(&query.statement)
        .unwrap()
        .iter()
        .map(|row| query.parents(row)[0].clone())
        .collect();
    assert_eq!(parents, written);
}

#[test]
fn test_every_professor_gets_a_value() {
    let prm = school();
    let mut dsi = skeleton();
    let mut rng = StdRng::seed_from_u64(42);

    let report = Materializer::new(&prm, Dialect::Sqlite)
        .run(&mut dsi, &mut rng)
        .unwrap();

    let processed: Vec<&str> = report
        .attributes
        .iter()
        .map(|a| a.attribute.as_str())
        .collect();
    assert_eq!(processed.len(), 3);
    assert!(
        processed.iter().position(|a| *a == "Professor.fame")
            < processed.iter().position(|a| *a == "Professor.funding")
    );

    let fame = report
        .attributes
        .iter()
        .find(|a| a.attribute == "Professor.fame")
        .unwrap();
    assert_eq!(fame.rows_read, 10);
    assert_eq!(fame.rows_updated, 10);

    for attr in ["fame", "funding"] {
        let values = professors(&dsi, attr);
        assert_eq!(values.len(), 10);
        assert!(
            values
                .iter()
                .all(|v| matches!(v, SqlValue::Integer(0) | SqlValue::Integer(1))),
            "{attr}: {values:?}"
        );
    }
}

#[test]
fn test_students_without_advisor_stay_empty() {
    let prm = school();
    let mut dsi = skeleton();
    let mut rng = StdRng::seed_from_u64(5);

    Materializer::new(&prm, Dialect::Sqlite)
        .run(&mut dsi, &mut rng)
        .unwrap();

    let success = column(&dsi, "SELECT success FROM Student ORDER BY student_id");
    assert_eq!(success.len(), 4);
    assert!(success[..3].iter().all(|v| !v.is_null()));
    assert_eq!(success[3], SqlValue::Null);

    // A famous advisor forces success through the deterministic CPD row.
    let famous_advised = column(
        &dsi,
        "SELECT s.success FROM Student s
         WHERE EXISTS (SELECT 1 FROM advisor a JOIN Professor p ON a.prof_id = p.prof_id
                       WHERE a.student_id = s.student_id AND p.fame = 1)",
    );
    assert!(famous_advised.iter().all(|v| *v == SqlValue::Integer(1)));
}

#[test]
fn test_same_seed_same_dataset() {
    let prm = school();
    let materializer = Materializer::new(&prm, Dialect::Sqlite);

    let mut first = skeleton();
    materializer
        .run(&mut first, &mut StdRng::seed_from_u64(2024))
        .unwrap();
    let mut second = skeleton();
    materializer
        .run(&mut second, &mut StdRng::seed_from_u64(2024))
        .unwrap();

    for attr in ["fame", "funding"] {
        assert_eq!(professors(&first, attr), professors(&second, attr));
    }
}

#[test]
fn test_failed_update_rolls_back_the_attribute() {
    let prm = school();
    let mut dsi = skeleton();
    dsi.execute_batch(
        "CREATE TRIGGER reject_funding BEFORE UPDATE OF funding ON Professor
         WHEN NEW.prof_id = 5
         BEGIN SELECT RAISE(ABORT, 'funding frozen'); END;",
    )
    .unwrap();
    let mut rng = StdRng::seed_from_u64(9);

    let err = Materializer::new(&prm, Dialect::Sqlite)
        .run(&mut dsi, &mut rng)
        .unwrap_err();

    assert!(
        matches!(err, GenerateError::Database { ref attribute, .. } if attribute == "Professor.funding")
    );
    assert!(!dsi.in_transaction());
    // fame was committed before funding started.
    assert!(professors(&dsi, "fame").iter().all(|v| !v.is_null()));
    // rows 1 to 4 were written inside the failed transaction.
    assert!(professors(&dsi, "funding").iter().all(SqlValue::is_null));
}

#[test]
fn test_bad_slotchain_on_last_attribute_writes_nothing() {
    let toml = SCHOOL.replace(
        r#"joins = ["Student.student_id = advisor.student_id", "advisor.prof_id = Professor.prof_id"]"#,
        r#"joins = ["Student.student_id = advisor.student_id"]"#,
    );
    let prm = parse_model(&toml, Path::new(".")).unwrap();
    let mut dsi = skeleton();
    let mut rng = StdRng::seed_from_u64(4);

    let err = Materializer::new(&prm, Dialect::Sqlite)
        .run(&mut dsi, &mut rng)
        .unwrap_err();

    assert!(
        matches!(
            err,
            GenerateError::Plan(QueryError::DisconnectedSlotchain { ref from, ref to, .. })
                if from == "advisor" && to == "Professor"
        ),
        "{err}"
    );
    assert!(professors(&dsi, "fame").iter().all(SqlValue::is_null));
    assert!(professors(&dsi, "funding").iter().all(SqlValue::is_null));
    assert!(column(&dsi, "SELECT success FROM Student")
        .iter()
        .all(SqlValue::is_null));
}

#[test]
fn test_non_discrete_parent_rolls_back() {
    let prm = school();
    let mut dsi = skeleton();
    dsi.execute_batch("UPDATE Professor SET fame = 1; UPDATE Professor SET fame = 'high' WHERE prof_id = 7;")
        .unwrap();
    let mut rng = StdRng::seed_from_u64(9);

    let err = Materializer::new(&prm, Dialect::Sqlite)
        .with_options(GenerateOptions {
            start_from: Some("Professor.funding".into()),
        })
        .run(&mut dsi, &mut rng)
        .unwrap_err();

    assert!(matches!(
        err,
        GenerateError::Sample { ref attribute, row: 6, .. } if attribute == "Professor.funding"
    ));
    assert!(professors(&dsi, "funding").iter().all(SqlValue::is_null));
}

#[test]
fn test_generated_cpds_drive_generation() {
    let toml = SCHOOL
        .replace("cpd = { table = [[0.9, 0.1], [0.1, 0.9]] }\n", "")
        .replace("cpd = { table = [[0.5, 0.5], [0.0, 1.0]] }\n", "");
    let mut prm = parse_model(&toml, Path::new(".")).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let mut rng = StdRng::seed_from_u64(11);

    let err = Materializer::new(&prm, Dialect::Sqlite)
        .run(&mut skeleton(), &mut rng)
        .unwrap_err();
    assert!(matches!(err, GenerateError::Model(_)));

    let created = generate_missing_cpds(&mut prm, Some(dir.path()), &mut rng).unwrap();
    assert_eq!(created, vec!["Professor.funding", "Student.success"]);

    let saved = CpdTabular::load(&dir.path().join("Student.success.json")).unwrap();
    assert_eq!(prm.cpd("Student.success").unwrap(), &saved);

    let mut dsi = skeleton();
    let report = Materializer::new(&prm, Dialect::Sqlite)
        .run(&mut dsi, &mut rng)
        .unwrap();
    assert_eq!(report.rows_updated(), 10 + 10 + 3);
}
