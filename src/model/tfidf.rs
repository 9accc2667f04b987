//! TF-IDF vectorizer — a fitted vocabulary plus per-term idf weights.
//!
//! Transform semantics mirror the fitting library: unicode word tokens of
//! length ≥ 2, optional lowercasing, raw term counts scaled by idf, then
//! L2 normalization. Tokens outside the vocabulary are ignored.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use super::{FeatureVector, Validate, Vectorizer};
use crate::error::ModelError;

/// Default token pattern of the fitting library: word chars, length ≥ 2.
static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\w\w+\b").unwrap());

fn default_true() -> bool {
    true
}

/// Fitted TF-IDF vectorizer, deserialized from a JSON artifact.
#[derive(Debug, Deserialize)]
pub struct TfidfVectorizer {
    /// Token → feature index.
    vocabulary: HashMap<String, u32>,
    /// Per-index inverse document frequency; its length is the dimension.
    idf: Vec<f64>,
    #[serde(default = "default_true")]
    lowercase: bool,
}

impl TfidfVectorizer {
    #[cfg(test)]
    pub fn from_parts(vocabulary: HashMap<String, u32>, idf: Vec<f64>, lowercase: bool) -> Self {
        Self {
            vocabulary,
            idf,
            lowercase,
        }
    }
}

impl Vectorizer for TfidfVectorizer {
    fn transform(&self, text: &str) -> Result<FeatureVector, ModelError> {
        let lowered;
        let text = if self.lowercase {
            lowered = text.to_lowercase();
            &lowered
        } else {
            text
        };

        let mut counts: HashMap<u32, f64> = HashMap::new();
        for token in TOKEN_RE.find_iter(text) {
            if let Some(&index) = self.vocabulary.get(token.as_str()) {
                *counts.entry(index).or_insert(0.0) += 1.0;
            }
        }

        let mut entries: Vec<(u32, f64)> = counts
            .into_iter()
            .map(|(index, count)| (index, count * self.idf[index as usize]))
            .collect();
        entries.sort_unstable_by_key(|&(index, _)| index);

        // L2 normalize; an all-zero vector stays all-zero.
        let norm: f64 = entries.iter().map(|&(_, v)| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            for entry in &mut entries {
                entry.1 /= norm;
            }
        }

        let (indices, values) = entries.into_iter().unzip();
        Ok(FeatureVector {
            dim: self.idf.len(),
            indices,
            values,
        })
    }

    fn dim(&self) -> usize {
        self.idf.len()
    }
}

impl Validate for TfidfVectorizer {
    fn validate(&self) -> Result<(), String> {
        if self.idf.is_empty() {
            return Err("empty idf vector".into());
        }
        for (token, &index) in &self.vocabulary {
            if index as usize >= self.idf.len() {
                return Err(format!(
                    "vocabulary index {index} for token {token:?} outside idf length {}",
                    self.idf.len()
                ));
            }
        }
        Ok(())
    }
}
