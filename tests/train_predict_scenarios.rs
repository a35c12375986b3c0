//! End-to-end scenarios over the public train/predict API.

use serde_json::{Value, json};
use tabml::algorithm::ProblemType;
use tabml::artifact::ArtifactStore;
use tabml::dataset::Record;
use tabml::error::TabmlError;
use tabml::metrics::Metrics;
use tabml::predictor::{Predictor, RecordOutcome};
use tabml::trainer::{AlgorithmOutcome, TrainRequest, Trainer};
use tempfile::TempDir;

fn record(pairs: &[(&str, Value)]) -> Record {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn request(problem: ProblemType, target: Option<&str>, algorithms: &[&str]) -> TrainRequest {
    TrainRequest {
        workspace_id: "ws1".to_string(),
        dataset_id: "ds1".to_string(),
        problem_type: problem,
        target_column: target.map(|t| t.to_string()),
        algorithms: algorithms.iter().map(|a| a.to_string()).collect(),
        test_size: 0.2,
        n_clusters: 3,
    }
}

/// 20 review rows: one text column, one numeric column, binary target.
fn review_rows() -> Vec<Record> {
    let positive = [
        "absolutely wonderful product that exceeded all my expectations",
        "fantastic quality and very fast shipping, highly recommended",
        "great value for the money, works exactly as advertised here",
        "excellent build quality and the battery lasts a really long time",
        "love this thing, easily the best purchase I made all year",
        "superb customer service and the device itself works flawlessly",
        "very happy with this order, everything arrived in perfect shape",
        "impressive performance for the price, would gladly buy again",
        "solid product with thoughtful design and reliable operation",
        "delighted with the quality, it handles everything I throw at it",
    ];
    let negative = [
        "terrible quality and the unit arrived completely broken apart",
        "awful experience, the product stopped working after two days",
        "very disappointed, nothing like the description promised at all",
        "cheap materials and sloppy assembly, do not waste your money",
        "the worst purchase I have made, support ignored every email",
        "poor performance and the battery drains within a single hour",
        "arrived late, scratched, and missing half of the accessories",
        "frustrating to use and the software crashes almost constantly",
        "flimsy construction that cracked during the very first week",
        "regret buying this, it never worked properly from the start",
    ];

    let mut rows = Vec::new();
    for (i, text) in positive.iter().enumerate() {
        rows.push(record(&[
            ("review", json!(text)),
            ("rating", json!(4 + (i % 2) as i64)),
            ("positive", json!("positive")),
        ]));
    }
    for (i, text) in negative.iter().enumerate() {
        rows.push(record(&[
            ("review", json!(text)),
            ("rating", json!(1 + (i % 2) as i64)),
            ("positive", json!("negative")),
        ]));
    }
    rows
}

/// 15 numeric rows with a linear-ish continuous target.
fn regression_rows() -> Vec<Record> {
    (0..15)
        .map(|i| {
            let x1 = i as f64;
            let x2 = ((i * 7) % 5) as f64;
            record(&[
                ("x1", json!(x1)),
                ("x2", json!(x2)),
                ("y", json!(3.0 * x1 - 2.0 * x2 + 5.0)),
            ])
        })
        .collect()
}

/// 30 numeric rows in three well-separated blobs.
fn clustering_rows() -> Vec<Record> {
    let mut rows = Vec::new();
    for i in 0..10 {
        let offset = i as f64 * 0.01;
        rows.push(record(&[("x", json!(offset)), ("y", json!(offset))]));
        rows.push(record(&[("x", json!(10.0 + offset)), ("y", json!(offset))]));
        rows.push(record(&[("x", json!(offset)), ("y", json!(10.0 + offset))]));
    }
    rows
}

#[test]
fn classification_scenario() {
    let dir = TempDir::new().unwrap();
    let trainer = Trainer::new(ArtifactStore::new(dir.path()).unwrap());
    let rows = review_rows();

    let outcome = trainer
        .train(
            &rows,
            &request(
                ProblemType::Classification,
                Some("positive"),
                &["logistic_regression"],
            ),
        )
        .unwrap();

    assert_eq!(outcome.results.len(), 1);
    assert_eq!(outcome.models_trained, 1);
    assert_eq!(outcome.total_failed, 0);

    let AlgorithmOutcome::Success {
        algorithm,
        metrics,
        artifact_id,
        ..
    } = &outcome.results[0]
    else {
        panic!("expected a success record");
    };
    assert_eq!(algorithm, "logistic_regression");

    let Metrics::Classification(m) = metrics else {
        panic!("expected classification metrics");
    };
    assert!((0.0..=1.0).contains(&m.accuracy));
    assert!((0.0..=1.0).contains(&m.f1_score));
    assert_eq!(m.confusion_matrix.len(), 2);

    // The saved artifact loads back intact.
    let artifact = trainer.store().load(artifact_id).unwrap();
    assert_eq!(artifact.algorithm, "logistic_regression");
    assert_eq!(artifact.problem_type, ProblemType::Classification);
    assert!(artifact.supports_probability);
    assert_eq!(artifact.target_column.as_deref(), Some("positive"));

    // Predictions decode to the original labels with a real confidence.
    let predictor = Predictor::new(trainer.store());
    let outcomes = predictor
        .predict(
            artifact_id,
            &[record(&[
                ("review", json!("fantastic quality, highly recommended purchase")),
                ("rating", json!(5)),
            ])],
        )
        .unwrap();
    assert_eq!(outcomes.len(), 1);
    let RecordOutcome::Success { prediction } = &outcomes[0] else {
        panic!("expected a successful prediction");
    };
    assert!(prediction.value == json!("positive") || prediction.value == json!("negative"));
    assert!((0.0..=1.0).contains(&prediction.confidence));
    let probabilities = prediction.probabilities.as_ref().unwrap();
    assert_eq!(probabilities.len(), 2);
    assert!((probabilities.iter().sum::<f64>() - 1.0).abs() < 1e-9);
}

#[test]
fn regression_scenario_best_model_by_r2() {
    let dir = TempDir::new().unwrap();
    let trainer = Trainer::new(ArtifactStore::new(dir.path()).unwrap());

    let outcome = trainer
        .train(
            &regression_rows(),
            &request(
                ProblemType::Regression,
                Some("y"),
                &["linear_regression", "random_forest"],
            ),
        )
        .unwrap();

    assert_eq!(outcome.results.len(), 2);
    assert!(outcome.results.iter().all(|r| r.is_success()));

    let best = outcome.best_model.as_ref().unwrap();
    let top_score = outcome
        .results
        .iter()
        .filter_map(|r| r.score())
        .fold(f64::NEG_INFINITY, f64::max);
    assert_eq!(best.score().unwrap(), top_score);

    // The target is an exact linear function, so OLS must fit it almost
    // perfectly and win.
    assert_eq!(best.algorithm(), "linear_regression");
    assert!(best.score().unwrap() > 0.99);
}

#[test]
fn clustering_scenario_kmeans() {
    let dir = TempDir::new().unwrap();
    let trainer = Trainer::new(ArtifactStore::new(dir.path()).unwrap());

    let outcome = trainer
        .train(
            &clustering_rows(),
            &request(ProblemType::Clustering, None, &["kmeans"]),
        )
        .unwrap();

    assert_eq!(outcome.results.len(), 1);
    let AlgorithmOutcome::Success { metrics, artifact_id, .. } = &outcome.results[0] else {
        panic!("expected a success record");
    };
    let Metrics::Clustering(m) = metrics else {
        panic!("expected clustering metrics");
    };
    assert_eq!(m.n_clusters, 3);
    assert_eq!(m.cluster_sizes.values().sum::<usize>(), 30);
    assert!(m.silhouette_score > 0.5);

    // Out-of-sample assignment works for kmeans artifacts.
    let predictor = Predictor::new(trainer.store());
    let outcomes = predictor
        .predict(artifact_id, &[record(&[("x", json!(0.1)), ("y", json!(0.2))])])
        .unwrap();
    assert!(outcomes[0].is_success());
}

#[test]
fn missing_target_column_is_validation_error_and_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let store = ArtifactStore::new(dir.path()).unwrap();
    let trainer = Trainer::new(store);

    let result = trainer.train(
        &review_rows(),
        &request(
            ProblemType::Classification,
            Some("nonexistent"),
            &["logistic_regression"],
        ),
    );
    assert!(matches!(result, Err(TabmlError::Validation(_))));

    let leftover: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert!(leftover.is_empty(), "no artifact may be written");
}

#[test]
fn unknown_algorithm_is_silently_skipped() {
    let dir = TempDir::new().unwrap();
    let trainer = Trainer::new(ArtifactStore::new(dir.path()).unwrap());

    let outcome = trainer
        .train(
            &review_rows(),
            &request(
                ProblemType::Classification,
                Some("positive"),
                &["not_a_real_algo", "knn"],
            ),
        )
        .unwrap();

    // Exactly one record, for knn; the unknown name is neither an error
    // nor a failure record.
    assert_eq!(outcome.results.len(), 1);
    assert_eq!(outcome.results[0].algorithm(), "knn");
    assert!(outcome.results[0].is_success());
}

#[test]
fn minimum_row_floor_boundary() {
    let dir = TempDir::new().unwrap();
    let trainer = Trainer::new(ArtifactStore::new(dir.path()).unwrap());

    let rows_at_floor: Vec<Record> = (0..10)
        .map(|i| {
            record(&[
                ("value", json!(i as f64)),
                ("label", json!(if i < 5 { "low" } else { "high" })),
            ])
        })
        .collect();

    let outcome = trainer
        .train(
            &rows_at_floor,
            &request(
                ProblemType::Classification,
                Some("label"),
                &["logistic_regression"],
            ),
        )
        .unwrap();
    assert_eq!(outcome.models_trained, 1);

    // One row fewer fails validation.
    let result = trainer.train(
        &rows_at_floor[..9],
        &request(
            ProblemType::Classification,
            Some("label"),
            &["logistic_regression"],
        ),
    );
    assert!(matches!(result, Err(TabmlError::Validation(_))));
}

#[test]
fn unseen_category_prediction_does_not_raise() {
    let dir = TempDir::new().unwrap();
    let trainer = Trainer::new(ArtifactStore::new(dir.path()).unwrap());

    let rows: Vec<Record> = (0..12)
        .map(|i| {
            record(&[
                ("color", json!(if i % 2 == 0 { "red" } else { "blue" })),
                ("size", json!(i as f64)),
                ("label", json!(if i < 6 { "small" } else { "large" })),
            ])
        })
        .collect();

    let outcome = trainer
        .train(
            &rows,
            &request(ProblemType::Classification, Some("label"), &["decision_tree"]),
        )
        .unwrap();
    let AlgorithmOutcome::Success { artifact_id, .. } = &outcome.results[0] else {
        panic!("expected a success record");
    };

    let predictor = Predictor::new(trainer.store());
    let outcomes = predictor
        .predict(
            artifact_id,
            &[record(&[
                ("color", json!("chartreuse")),
                ("size", json!(3.0)),
            ])],
        )
        .unwrap();

    let RecordOutcome::Success { prediction } = &outcomes[0] else {
        panic!("unseen category must not fail the prediction");
    };
    assert!(prediction.value == json!("small") || prediction.value == json!("large"));
}

#[test]
fn batch_records_are_processed_independently() {
    let dir = TempDir::new().unwrap();
    let trainer = Trainer::new(ArtifactStore::new(dir.path()).unwrap());

    let outcome = trainer
        .train(
            &review_rows(),
            &request(ProblemType::Classification, Some("positive"), &["knn"]),
        )
        .unwrap();
    let AlgorithmOutcome::Success { artifact_id, .. } = &outcome.results[0] else {
        panic!("expected a success record");
    };

    let predictor = Predictor::new(trainer.store());
    let outcomes = predictor
        .predict(
            artifact_id,
            &[
                record(&[
                    ("review", json!("a perfectly lovely item that works great")),
                    ("rating", json!(5)),
                ]),
                // Missing the review column entirely.
                record(&[("rating", json!(2))]),
                record(&[
                    ("review", json!("broke immediately and support never answered")),
                    ("rating", json!(1)),
                ]),
            ],
        )
        .unwrap();

    assert_eq!(outcomes.len(), 3);
    assert!(outcomes[0].is_success());
    let RecordOutcome::Failed { error } = &outcomes[1] else {
        panic!("record missing a feature column must fail");
    };
    assert!(error.contains("review"));
    assert!(outcomes[2].is_success());
}

#[test]
fn training_is_deterministic_under_fixed_seed() {
    let dir_a = TempDir::new().unwrap();
    let dir_b = TempDir::new().unwrap();
    let trainer_a = Trainer::new(ArtifactStore::new(dir_a.path()).unwrap());
    let trainer_b = Trainer::new(ArtifactStore::new(dir_b.path()).unwrap());
    let rows = review_rows();

    let req = request(
        ProblemType::Classification,
        Some("positive"),
        &["random_forest"],
    );
    let outcome_a = trainer_a.train(&rows, &req).unwrap();
    let outcome_b = trainer_b.train(&rows, &req).unwrap();

    assert_eq!(
        outcome_a.results[0].score().unwrap(),
        outcome_b.results[0].score().unwrap()
    );

    // The two independently trained artifacts agree on a fresh record.
    let ids = [&outcome_a, &outcome_b].map(|o| {
        let AlgorithmOutcome::Success { artifact_id, .. } = &o.results[0] else {
            panic!("expected a success record");
        };
        artifact_id.clone()
    });
    let probe = record(&[
        ("review", json!("reasonably good product with a few rough edges")),
        ("rating", json!(3)),
    ]);

    let prediction_a = Predictor::new(trainer_a.store())
        .predict(&ids[0], std::slice::from_ref(&probe))
        .unwrap();
    let prediction_b = Predictor::new(trainer_b.store())
        .predict(&ids[1], std::slice::from_ref(&probe))
        .unwrap();

    let (pa, pb) = (
        prediction_a[0].prediction().unwrap(),
        prediction_b[0].prediction().unwrap(),
    );
    assert_eq!(pa.value, pb.value);
    assert_eq!(pa.confidence, pb.confidence);
}

#[test]
fn empty_algorithm_list_is_validation_error() {
    let dir = TempDir::new().unwrap();
    let trainer = Trainer::new(ArtifactStore::new(dir.path()).unwrap());

    let result = trainer.train(
        &review_rows(),
        &request(ProblemType::Classification, Some("positive"), &[]),
    );
    assert!(matches!(result, Err(TabmlError::Validation(_))));
}

#[test]
fn evaluate_replays_metrics_over_labeled_rows() {
    let dir = TempDir::new().unwrap();
    let trainer = Trainer::new(ArtifactStore::new(dir.path()).unwrap());
    let rows = review_rows();

    let outcome = trainer
        .train(
            &rows,
            &request(
                ProblemType::Classification,
                Some("positive"),
                &["logistic_regression"],
            ),
        )
        .unwrap();
    let AlgorithmOutcome::Success { artifact_id, .. } = &outcome.results[0] else {
        panic!("expected a success record");
    };

    let predictor = Predictor::new(trainer.store());
    let metrics = predictor.evaluate(artifact_id, &rows, "positive").unwrap();
    let Metrics::Classification(m) = metrics else {
        panic!("expected classification metrics");
    };
    // Evaluating on the training rows themselves: the fit should be strong.
    assert!(m.accuracy > 0.7);
}
