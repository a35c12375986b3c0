//! # tabml
//!
//! A tabular machine learning training and prediction backend for Rust.
//!
//! ## Features
//!
//! - Pure Rust estimators, serialized with their preprocessing state
//! - Per-column feature-type detection (free text vs. structured data)
//! - TF-IDF vectorization, categorical encoding, and feature scaling
//! - Multi-algorithm training with best-model selection
//! - Atomic artifact persistence with exact prediction-time replay
//!
//! ## Example
//!
//! ```no_run
//! use tabml::algorithm::ProblemType;
//! use tabml::artifact::ArtifactStore;
//! use tabml::predictor::Predictor;
//! use tabml::trainer::{TrainRequest, Trainer};
//!
//! # fn run(rows: Vec<tabml::dataset::Record>) -> tabml::error::Result<()> {
//! let store = ArtifactStore::new("models")?;
//! let trainer = Trainer::new(store);
//!
//! let outcome = trainer.train(
//!     &rows,
//!     &TrainRequest {
//!         workspace_id: "ws1".into(),
//!         dataset_id: "ds1".into(),
//!         problem_type: ProblemType::Classification,
//!         target_column: Some("label".into()),
//!         algorithms: vec!["logistic_regression".into(), "random_forest".into()],
//!         test_size: 0.2,
//!         n_clusters: 3,
//!     },
//! )?;
//!
//! let predictor = Predictor::new(trainer.store());
//! for result in &outcome.results {
//!     println!("{}: {:?}", result.algorithm(), result.score());
//! }
//! # let _ = predictor;
//! # Ok(())
//! # }
//! ```

pub mod algorithm;
pub mod artifact;
pub mod dataset;
pub mod error;
pub mod features;
pub mod metrics;
pub mod predictor;
pub mod target;
pub mod trainer;

pub mod prelude {
    pub use crate::algorithm::{AlgorithmRegistry, ProblemType};
    pub use crate::artifact::ArtifactStore;
    pub use crate::dataset::Record;
    pub use crate::error::{Result, TabmlError};
    pub use crate::predictor::{Predictor, PredictorConfig};
    pub use crate::trainer::{TrainRequest, Trainer, TrainingOutcome};
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
