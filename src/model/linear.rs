//! Linear classifiers over sparse features, plus the intent label encoder.

use serde::Deserialize;

use super::{FeatureVector, ProbClassifier, Validate};
use crate::error::ModelError;

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// Fitted logistic-regression classifier, deserialized from a JSON artifact.
///
/// Binary models carry a single coefficient row (sigmoid over its decision
/// value, probabilities ordered as `classes`); multiclass models carry one
/// row per class (softmax).
#[derive(Debug, Deserialize)]
pub struct LogisticRegression {
    classes: Vec<i64>,
    coef: Vec<Vec<f64>>,
    intercept: Vec<f64>,
}

impl LogisticRegression {
    #[cfg(test)]
    pub fn from_parts(classes: Vec<i64>, coef: Vec<Vec<f64>>, intercept: Vec<f64>) -> Self {
        Self {
            classes,
            coef,
            intercept,
        }
    }

    fn is_binary(&self) -> bool {
        self.classes.len() == 2 && self.coef.len() == 1
    }
}

impl ProbClassifier for LogisticRegression {
    fn classes(&self) -> &[i64] {
        &self.classes
    }

    fn predict_proba(&self, features: &FeatureVector) -> Result<Vec<f64>, ModelError> {
        if features.dim != self.n_features() {
            return Err(ModelError::DimensionMismatch {
                expected: self.n_features(),
                got: features.dim,
            });
        }

        if self.is_binary() {
            let p = sigmoid(features.dot(&self.coef[0]) + self.intercept[0]);
            return Ok(vec![1.0 - p, p]);
        }

        // Softmax over per-class decision values, shifted for stability.
        let scores: Vec<f64> = self
            .coef
            .iter()
            .zip(&self.intercept)
            .map(|(row, &b)| features.dot(row) + b)
            .collect();
        let max = scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let exps: Vec<f64> = scores.iter().map(|&z| (z - max).exp()).collect();
        let sum: f64 = exps.iter().sum();
        Ok(exps.into_iter().map(|e| e / sum).collect())
    }

    fn n_features(&self) -> usize {
        self.coef.first().map(Vec::len).unwrap_or(0)
    }
}

impl Validate for LogisticRegression {
    fn validate(&self) -> Result<(), String> {
        if self.classes.is_empty() {
            return Err("empty class list".into());
        }
        let expected_rows = if self.classes.len() == 2 {
            1
        } else {
            self.classes.len()
        };
        if self.coef.len() != expected_rows {
            return Err(format!(
                "{} classes require {expected_rows} coefficient rows, got {}",
                self.classes.len(),
                self.coef.len()
            ));
        }
        if self.intercept.len() != self.coef.len() {
            return Err(format!(
                "{} coefficient rows but {} intercepts",
                self.coef.len(),
                self.intercept.len()
            ));
        }
        let width = self.coef[0].len();
        if width == 0 || self.coef.iter().any(|row| row.len() != width) {
            return Err("ragged or empty coefficient matrix".into());
        }
        Ok(())
    }
}

/// Maps intent class ids back to their string labels.
#[derive(Debug, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    #[cfg(test)]
    pub fn from_classes(classes: Vec<String>) -> Self {
        Self { classes }
    }

    /// Recover the string label for a class id.
    pub fn inverse_transform(&self, id: i64) -> Result<&str, ModelError> {
        usize::try_from(id)
            .ok()
            .and_then(|i| self.classes.get(i))
            .map(String::as_str)
            .ok_or_else(|| {
                ModelError::Invalid(format!(
                    "class id {id} outside encoder range 0..{}",
                    self.classes.len()
                ))
            })
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl Validate for LabelEncoder {
    fn validate(&self) -> Result<(), String> {
        if self.classes.is_empty() {
            return Err("empty label encoder".into());
        }
        Ok(())
    }
}
