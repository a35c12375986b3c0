use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use serde_json::json;
use tabml::algorithm::ProblemType;
use tabml::artifact::ArtifactStore;
use tabml::dataset::Record;
use tabml::features::TfidfVectorizer;
use tabml::trainer::{TrainRequest, Trainer};

fn synthetic_documents(n: usize) -> Vec<String> {
    let words = [
        "fast", "slow", "reliable", "broken", "battery", "screen", "shipping", "quality",
        "support", "price", "design", "performance",
    ];
    (0..n)
        .map(|i| {
            (0..12)
                .map(|j| words[(i * 7 + j * 3) % words.len()])
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}

fn synthetic_rows(n: usize) -> Vec<Record> {
    let documents = synthetic_documents(n);
    documents
        .into_iter()
        .enumerate()
        .map(|(i, text)| {
            let mut row = Record::new();
            row.insert("review".to_string(), json!(text));
            row.insert("rating".to_string(), json!((i % 5 + 1) as f64));
            row.insert(
                "label".to_string(),
                json!(if i % 2 == 0 { "positive" } else { "negative" }),
            );
            row
        })
        .collect()
}

fn bench_vectorizer(c: &mut Criterion) {
    let documents = synthetic_documents(200);
    c.bench_function("tfidf_fit_200_docs", |b| {
        b.iter(|| TfidfVectorizer::fit(black_box(&documents)).unwrap())
    });

    let vectorizer = TfidfVectorizer::fit(&documents).unwrap();
    c.bench_function("tfidf_transform", |b| {
        b.iter(|| vectorizer.transform(black_box("reliable battery and fast shipping")))
    });
}

fn bench_training(c: &mut Criterion) {
    let rows = synthetic_rows(100);
    let request = TrainRequest {
        workspace_id: "bench".to_string(),
        dataset_id: "synthetic".to_string(),
        problem_type: ProblemType::Classification,
        target_column: Some("label".to_string()),
        algorithms: vec!["logistic_regression".to_string()],
        test_size: 0.2,
        n_clusters: 3,
    };

    c.bench_function("train_logistic_100_rows", |b| {
        b.iter(|| {
            let dir = tempfile::tempdir().unwrap();
            let trainer = Trainer::new(ArtifactStore::new(dir.path()).unwrap());
            trainer.train(black_box(&rows), black_box(&request)).unwrap()
        })
    });
}

criterion_group!(benches, bench_vectorizer, bench_training);
criterion_main!(benches);
