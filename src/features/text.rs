//! Bounded-vocabulary TF-IDF vectorizer for text columns.
//!
//! Fits a fixed vocabulary (unigrams and bigrams, stop words removed, capped
//! at [`MAX_VOCABULARY`] terms by corpus frequency) on the training values of
//! one column. Transforming new text reuses the fitted vocabulary and maps
//! out-of-vocabulary terms to zero weight.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};
use tracing::debug;
use unicode_segmentation::UnicodeSegmentation;

use crate::error::{Result, TabmlError};

/// Maximum number of terms kept per column vocabulary.
pub const MAX_VOCABULARY: usize = 500;

/// Default English stop words list.
const ENGLISH_STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "if", "in", "into", "is", "it",
    "no", "not", "of", "on", "or", "such", "that", "the", "their", "then", "there", "these",
    "they", "this", "to", "was", "will", "with",
];

static STOP_WORDS: LazyLock<AHashSet<&'static str>> =
    LazyLock::new(|| ENGLISH_STOP_WORDS.iter().copied().collect());

/// TF-IDF vectorizer fitted on one text column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    /// Term -> index mapping. Indices are assigned lexicographically so a
    /// refit over the same values reproduces the same layout.
    vocabulary: BTreeMap<String, usize>,
    /// Inverse document frequency per term index.
    idf: Vec<f64>,
    /// Number of documents seen during fitting.
    n_documents: usize,
}

/// Lowercased word and word-pair terms with stop words removed.
fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let words: Vec<&str> = lowered
        .unicode_words()
        .filter(|w| !STOP_WORDS.contains(w))
        .collect();

    let mut terms = Vec::with_capacity(words.len() * 2);
    for word in &words {
        terms.push((*word).to_string());
    }
    for pair in words.windows(2) {
        terms.push(format!("{} {}", pair[0], pair[1]));
    }
    terms
}

impl TfidfVectorizer {
    /// Fit a vectorizer on the training documents of one column.
    ///
    /// Fails when no usable term survives cleaning; the caller drops the
    /// column from the feature set in that case.
    pub fn fit(documents: &[String]) -> Result<Self> {
        let n_documents = documents.len();
        let mut document_frequency: AHashMap<String, usize> = AHashMap::new();
        let mut corpus_frequency: AHashMap<String, usize> = AHashMap::new();

        for doc in documents {
            let tokens = tokenize(doc);
            let mut seen: AHashSet<&str> = AHashSet::new();
            for token in &tokens {
                *corpus_frequency.entry(token.clone()).or_insert(0) += 1;
                if seen.insert(token.as_str()) {
                    *document_frequency.entry(token.clone()).or_insert(0) += 1;
                }
            }
        }

        if corpus_frequency.is_empty() {
            return Err(TabmlError::validation(
                "no usable text after cleaning; column yields an empty vocabulary",
            ));
        }

        // Cap the vocabulary at the most frequent terms, ties broken
        // lexicographically so the selection is deterministic.
        let mut terms: Vec<(String, usize)> = corpus_frequency.into_iter().collect();
        if terms.len() > MAX_VOCABULARY {
            terms.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
            terms.truncate(MAX_VOCABULARY);
        }

        let mut selected: Vec<String> = terms.into_iter().map(|(term, _)| term).collect();
        selected.sort();

        let mut vocabulary = BTreeMap::new();
        let mut idf = vec![0.0; selected.len()];
        for (index, term) in selected.into_iter().enumerate() {
            let df = document_frequency.get(&term).copied().unwrap_or(0);
            idf[index] = ((n_documents as f64 + 1.0) / (df as f64 + 1.0)).ln() + 1.0;
            vocabulary.insert(term, index);
        }

        Ok(TfidfVectorizer {
            vocabulary,
            idf,
            n_documents,
        })
    }

    /// Transform a document into a TF-IDF feature vector.
    ///
    /// Out-of-vocabulary terms contribute nothing; they are counted and
    /// logged for diagnostics but never an error.
    pub fn transform(&self, document: &str) -> Vec<f64> {
        let tokens = tokenize(document);
        let mut tf = vec![0.0; self.vocabulary.len()];
        let mut oov = 0usize;

        for token in &tokens {
            match self.vocabulary.get(token) {
                Some(&index) => tf[index] += 1.0,
                None => oov += 1,
            }
        }

        if oov > 0 {
            debug!(oov_terms = oov, "out-of-vocabulary terms mapped to zero weight");
        }

        let doc_length = tokens.len() as f64;
        if doc_length > 0.0 {
            for count in &mut tf {
                *count /= doc_length;
            }
        }

        for (index, weight) in tf.iter_mut().enumerate() {
            *weight *= self.idf[index];
        }

        tf
    }

    /// Width of the vectors this vectorizer produces.
    pub fn dimension(&self) -> usize {
        self.vocabulary.len()
    }

    /// Number of documents this vectorizer was fitted on.
    pub fn n_documents(&self) -> usize {
        self.n_documents
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_and_transform() {
        let documents = vec![
            "what is machine learning".to_string(),
            "how to install rust on linux".to_string(),
            "buy a cheap laptop online".to_string(),
        ];

        let vectorizer = TfidfVectorizer::fit(&documents).unwrap();
        assert!(vectorizer.dimension() > 0);
        assert_eq!(vectorizer.n_documents(), 3);

        let features = vectorizer.transform("what is rust");
        assert_eq!(features.len(), vectorizer.dimension());
        assert!(features.iter().any(|&w| w > 0.0));
    }

    #[test]
    fn test_bigrams_included() {
        let documents = vec!["machine learning rocks".to_string()];
        let vectorizer = TfidfVectorizer::fit(&documents).unwrap();
        assert!(vectorizer.vocabulary.contains_key("machine learning"));
        assert!(vectorizer.vocabulary.contains_key("learning rocks"));
    }

    #[test]
    fn test_stop_words_removed() {
        let documents = vec!["the cat and the hat".to_string()];
        let vectorizer = TfidfVectorizer::fit(&documents).unwrap();
        assert!(!vectorizer.vocabulary.contains_key("the"));
        assert!(!vectorizer.vocabulary.contains_key("and"));
        assert!(vectorizer.vocabulary.contains_key("cat"));
    }

    #[test]
    fn test_oov_terms_are_zero_weight() {
        let documents = vec!["alpha beta".to_string(), "alpha gamma".to_string()];
        let vectorizer = TfidfVectorizer::fit(&documents).unwrap();

        let features = vectorizer.transform("delta epsilon zeta");
        assert!(features.iter().all(|&w| w == 0.0));
    }

    #[test]
    fn test_empty_vocabulary_is_error() {
        let documents = vec!["the and of".to_string(), "".to_string()];
        assert!(TfidfVectorizer::fit(&documents).is_err());
    }

    #[test]
    fn test_refit_is_identical() {
        let documents = vec![
            "red wine from the south".to_string(),
            "white wine from the north".to_string(),
        ];
        let first = TfidfVectorizer::fit(&documents).unwrap();
        let second = TfidfVectorizer::fit(&documents).unwrap();
        assert_eq!(first.vocabulary, second.vocabulary);
        assert_eq!(first.idf, second.idf);
        assert_eq!(
            first.transform("red wine"),
            second.transform("red wine")
        );
    }

    #[test]
    fn test_vocabulary_cap() {
        // 600 distinct single-word documents exceed the cap.
        let documents: Vec<String> = (0..600).map(|i| format!("term{i:04}")).collect();
        let vectorizer = TfidfVectorizer::fit(&documents).unwrap();
        assert_eq!(vectorizer.dimension(), MAX_VOCABULARY);
    }
}
