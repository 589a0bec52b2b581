//! Integration tests for estimating CPDs from generated datasets.

use probrem::cpd::CpdTabular;
use probrem::data::{DataRegistry, DataSetInterface, DiType, SqliteInterface};
use probrem::generate::Materializer;
use probrem::learn::{cross_validate, estimate_cpd, LearnError};
use probrem::model::{Attribute, Dependency, ErClass, Prm};
use probrem::sql::Dialect;
use rand::rngs::StdRng;
use rand::SeedableRng;

const ROWS: usize = 1500;
const TOLERANCE: f64 = 0.06;

fn ground_truth() -> Prm {
    Prm::builder("school")
        .class(ErClass::entity("Professor", vec!["prof_id"]))
        .attribute(Attribute::new("Professor", "fame", vec![0, 1]))
        .attribute(Attribute::new("Professor", "funding", vec![0, 1]))
        .dependency(
            Dependency::new("Professor.funding", "Professor.fame").slotchain(vec!["Professor"]),
        )
        .cpd(
            "Professor.fame",
            CpdTabular::new(vec![0, 1], vec![], vec![vec![0.3, 0.7]]).unwrap(),
        )
        .cpd(
            "Professor.funding",
            CpdTabular::new(
                vec![0, 1],
                vec![vec![0, 1]],
                vec![vec![0.8, 0.2], vec![0.25, 0.75]],
            )
            .unwrap(),
        )
        .build()
        .unwrap()
}

fn generated(prm: &Prm, seed: u64) -> SqliteInterface {
    let mut dsi = SqliteInterface::open_in_memory().unwrap();
    dsi.execute_batch(&format!(
        "CREATE TABLE Professor (prof_id INTEGER PRIMARY KEY, fame INTEGER, funding INTEGER);
         WITH RECURSIVE n(i) AS (SELECT 1 UNION ALL SELECT i + 1 FROM n WHERE i < {ROWS})
         INSERT INTO Professor (prof_id) SELECT i FROM n;"
    ))
    .unwrap();
    Materializer::new(prm, Dialect::Sqlite)
        .run(&mut dsi, &mut StdRng::seed_from_u64(seed))
        .unwrap();
    dsi
}

fn assert_close(actual: &[Vec<f64>], expected: &[Vec<f64>]) {
    for (a_row, e_row) in actual.iter().zip(expected) {
        for (a, e) in a_row.iter().zip(e_row) {
            assert!((a - e).abs() < TOLERANCE, "{actual:?} vs {expected:?}");
        }
    }
}

#[test]
fn test_estimate_recovers_ground_truth() {
    let prm = ground_truth();
    let first = generated(&prm, 1);
    let second = generated(&prm, 2);
    let datasets: [&dyn DataSetInterface; 2] = [&first, &second];

    let fame = estimate_cpd(&prm, "Professor.fame", &datasets, Dialect::Sqlite, 0.0).unwrap();
    assert_close(fame.table(), prm.cpd("Professor.fame").unwrap().table());

    let funding =
        estimate_cpd(&prm, "Professor.funding", &datasets, Dialect::Sqlite, 0.0).unwrap();
    assert_close(funding.table(), prm.cpd("Professor.funding").unwrap().table());
}

#[test]
fn test_cross_validation_scores_every_dataset() {
    let prm = ground_truth();
    let mut registry = DataRegistry::new("school", DiType::CrossValidation);
    for seed in 0..3 {
        registry.register(Box::new(generated(&prm, seed)));
    }

    assert!(matches!(
        cross_validate(&prm, "Professor.funding", &registry, Dialect::Sqlite, 1.0),
        Err(LearnError::NoTrainingSets)
    ));

    registry.compute_training_sets();
    let scores =
        cross_validate(&prm, "Professor.funding", &registry, Dialect::Sqlite, 1.0).unwrap();

    let held_out: Vec<usize> = scores.iter().map(|s| s.test).collect();
    assert_eq!(held_out, vec![0, 1, 2]);
    for score in &scores {
        assert_eq!(score.rows, ROWS);
        assert!(score.log_likelihood < 0.0);
        // Entropy of funding given fame is about 0.54 nats.
        assert!(score.mean() > -0.7 && score.mean() < -0.45, "{score:?}");
    }
}
