//! Feature-type detection and per-column transformation.
//!
//! Every non-target column is classified once per training run as free text
//! or structured data, fitted with the matching transformer, and assembled
//! into one feature matrix. The fitted state ([`FeatureSpace`]) is persisted
//! inside the model artifact and replayed in transform-only mode at
//! prediction time.

pub mod assembler;
pub mod classifier;
pub mod encoder;
pub mod scaler;
pub mod text;

pub use assembler::FeatureSpace;
pub use classifier::{ColumnRole, classify_column};
pub use encoder::CategoryEncoder;
pub use scaler::StandardScaler;
pub use text::TfidfVectorizer;

/// A dense feature matrix, one inner vector per input row.
pub type FeatureMatrix = Vec<Vec<f64>>;
