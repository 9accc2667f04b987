//! Pre-trained model artifacts — loading and the narrow invocation contract.
//!
//! Model internals are opaque to the rest of the crate. The decision engine
//! only sees `Vectorizer::transform` and `ProbClassifier::predict` /
//! `predict_proba`, so any compatible model format can be plugged in behind
//! the traits. The shipped format is JSON exported by the offline training
//! process: a TF-IDF vectorizer and a logistic-regression classifier per
//! stage, plus a label encoder for the intent stage.
//!
//! The context is loaded once at startup and shared read-only across
//! requests; after load nothing is ever mutated, so no locking is needed.

mod linear;
mod tfidf;

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use tracing::info;

use crate::error::ModelError;

pub use linear::{LabelEncoder, LogisticRegression};
pub use tfidf::TfidfVectorizer;

/// Stage-specific sparse feature vector.
///
/// Vectors from different stages are not interchangeable — each stage has
/// its own vocabulary and weighting. `indices` is sorted ascending and
/// parallel to `values`.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    /// Dimensionality of the stage's feature space.
    pub dim: usize,
    pub indices: Vec<u32>,
    pub values: Vec<f64>,
}

impl FeatureVector {
    /// Dot product against a dense weight row of length `dim`.
    pub fn dot(&self, weights: &[f64]) -> f64 {
        self.indices
            .iter()
            .zip(&self.values)
            .map(|(&i, &v)| v * weights[i as usize])
            .sum()
    }
}

/// Maps normalized text to a stage's feature space.
pub trait Vectorizer: Send + Sync {
    fn transform(&self, text: &str) -> Result<FeatureVector, ModelError>;

    /// Dimensionality of the produced vectors.
    fn dim(&self) -> usize;
}

/// A trained classifier with calibrated class probabilities.
pub trait ProbClassifier: Send + Sync {
    /// Class labels, in the order `predict_proba` reports them.
    fn classes(&self) -> &[i64];

    /// Probability per class, summing to 1.
    fn predict_proba(&self, features: &FeatureVector) -> Result<Vec<f64>, ModelError>;

    /// Predicted class label (argmax of `predict_proba`).
    fn predict(&self, features: &FeatureVector) -> Result<i64, ModelError> {
        let proba = self.predict_proba(features)?;
        let best = proba
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .ok_or_else(|| ModelError::Invalid("classifier has no classes".into()))?;
        Ok(self.classes()[best])
    }

    /// Number of input features the classifier expects.
    fn n_features(&self) -> usize;
}

/// Index of the positive class for a binary stage.
///
/// Convention: the positive class is label `1`; if `1` is absent among the
/// observed classes, fall back to the numerically largest label.
pub fn positive_class_index(classes: &[i64]) -> usize {
    classes.iter().position(|&c| c == 1).unwrap_or_else(|| {
        classes
            .iter()
            .enumerate()
            .max_by_key(|&(_, &c)| c)
            .map(|(i, _)| i)
            .unwrap_or(0)
    })
}

/// One stage's fitted vectorizer + classifier pair.
pub struct StageModel {
    pub vectorizer: Box<dyn Vectorizer>,
    pub classifier: Box<dyn ProbClassifier>,
}

impl std::fmt::Debug for StageModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageModel").finish_non_exhaustive()
    }
}

impl StageModel {
    pub fn new(vectorizer: Box<dyn Vectorizer>, classifier: Box<dyn ProbClassifier>) -> Self {
        Self {
            vectorizer,
            classifier,
        }
    }

    /// Fail if the classifier's feature count does not match the
    /// vectorizer's output dimension.
    fn validate(&self, name: &str) -> Result<(), ModelError> {
        if self.vectorizer.dim() != self.classifier.n_features() {
            return Err(ModelError::Invalid(format!(
                "{name}: vectorizer produces {} features, classifier expects {}",
                self.vectorizer.dim(),
                self.classifier.n_features()
            )));
        }
        Ok(())
    }
}

/// The three stage models plus the intent label encoder.
///
/// Constructed once at startup and injected into the decision engine.
#[derive(Debug)]
pub struct ModelContext {
    pub abuse: StageModel,
    pub spam: StageModel,
    pub intent: StageModel,
    pub intent_labels: LabelEncoder,
}

impl ModelContext {
    pub fn new(
        abuse: StageModel,
        spam: StageModel,
        intent: StageModel,
        intent_labels: LabelEncoder,
    ) -> Self {
        Self {
            abuse,
            spam,
            intent,
            intent_labels,
        }
    }

    /// Load all seven artifacts from `dir` and cross-validate them.
    ///
    /// Any missing or corrupt artifact is fatal — the service must not
    /// accept traffic with a partial model set.
    pub fn load(dir: &Path) -> Result<Self, ModelError> {
        let abuse = load_stage(dir, "abuse_tfidf.json", "abuse_detector.json")?;
        let spam = load_stage(dir, "spam_tfidf.json", "spam_detector.json")?;
        let intent = load_stage(dir, "intent_tfidf.json", "intent_classifier.json")?;
        let intent_labels: LabelEncoder = load_json(&dir.join("intent_label_encoder.json"))?;

        abuse.validate("abuse stage")?;
        spam.validate("spam stage")?;
        intent.validate("intent stage")?;

        if intent.classifier.classes().len() != intent_labels.len() {
            return Err(ModelError::Invalid(format!(
                "intent stage: classifier has {} classes, label encoder has {}",
                intent.classifier.classes().len(),
                intent_labels.len()
            )));
        }

        info!(
            abuse_features = abuse.vectorizer.dim(),
            spam_features = spam.vectorizer.dim(),
            intent_features = intent.vectorizer.dim(),
            intent_classes = intent_labels.len(),
            "Model artifacts loaded"
        );

        Ok(Self::new(abuse, spam, intent, intent_labels))
    }
}

fn load_stage(dir: &Path, vectorizer_file: &str, classifier_file: &str) -> Result<StageModel, ModelError> {
    let vectorizer: TfidfVectorizer = load_json(&dir.join(vectorizer_file))?;
    let classifier: LogisticRegression = load_json(&dir.join(classifier_file))?;
    Ok(StageModel::new(Box::new(vectorizer), Box::new(classifier)))
}

/// Read and deserialize one JSON artifact, validating it afterwards.
fn load_json<T: DeserializeOwned + Validate>(path: &Path) -> Result<T, ModelError> {
    if !path.exists() {
        return Err(ModelError::ArtifactMissing {
            path: PathBuf::from(path),
        });
    }
    let raw = std::fs::read_to_string(path)?;
    let value: T = serde_json::from_str(&raw).map_err(|e| ModelError::ArtifactCorrupt {
        path: PathBuf::from(path),
        reason: e.to_string(),
    })?;
    value.validate().map_err(|reason| ModelError::ArtifactCorrupt {
        path: PathBuf::from(path),
        reason,
    })?;
    Ok(value)
}

/// Internal consistency check run on each artifact right after parsing.
pub(crate) trait Validate {
    fn validate(&self) -> Result<(), String>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn positive_class_is_one_when_present() {
        assert_eq!(positive_class_index(&[0, 1]), 1);
        assert_eq!(positive_class_index(&[1, 0]), 0);
    }

    #[test]
    fn positive_class_falls_back_to_largest_label() {
        assert_eq!(positive_class_index(&[0, 2]), 1);
        assert_eq!(positive_class_index(&[5, -1, 3]), 0);
    }

    #[test]
    fn feature_vector_dot() {
        let v = FeatureVector {
            dim: 4,
            indices: vec![0, 3],
            values: vec![0.5, 2.0],
        };
        let w = [1.0, 10.0, 10.0, 0.25];
        assert!((v.dot(&w) - 1.0).abs() < 1e-12);
    }

    fn write_artifact(dir: &Path, name: &str, json: &str) {
        let mut f = std::fs::File::create(dir.join(name)).unwrap();
        f.write_all(json.as_bytes()).unwrap();
    }

    fn write_full_set(dir: &Path) {
        let tfidf = r#"{"vocabulary":{"hello":0,"world":1},"idf":[1.0,1.0],"lowercase":true}"#;
        let binary = r#"{"classes":[0,1],"coef":[[0.5,-0.5]],"intercept":[0.0]}"#;
        let intent =
            r#"{"classes":[0,1,2],"coef":[[1.0,0.0],[0.0,1.0],[0.5,0.5]],"intercept":[0.0,0.0,0.0]}"#;
        let encoder = r#"{"classes":["COLD","HOT","WARM"]}"#;
        write_artifact(dir, "abuse_tfidf.json", tfidf);
        write_artifact(dir, "abuse_detector.json", binary);
        write_artifact(dir, "spam_tfidf.json", tfidf);
        write_artifact(dir, "spam_detector.json", binary);
        write_artifact(dir, "intent_tfidf.json", tfidf);
        write_artifact(dir, "intent_classifier.json", intent);
        write_artifact(dir, "intent_label_encoder.json", encoder);
    }

    #[test]
    fn load_full_artifact_set() {
        let dir = tempfile::tempdir().unwrap();
        write_full_set(dir.path());

        let ctx = ModelContext::load(dir.path()).unwrap();
        assert_eq!(ctx.abuse.classifier.classes(), &[0, 1]);
        assert_eq!(ctx.intent.classifier.classes(), &[0, 1, 2]);
        assert_eq!(ctx.intent_labels.len(), 3);
    }

    #[test]
    fn missing_artifact_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write_full_set(dir.path());
        std::fs::remove_file(dir.path().join("spam_detector.json")).unwrap();

        let err = ModelContext::load(dir.path()).unwrap_err();
        assert!(matches!(err, ModelError::ArtifactMissing { .. }));
    }

    #[test]
    fn corrupt_artifact_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write_full_set(dir.path());
        write_artifact(dir.path(), "abuse_tfidf.json", "{not json");

        let err = ModelContext::load(dir.path()).unwrap_err();
        assert!(matches!(err, ModelError::ArtifactCorrupt { .. }));
    }

    #[test]
    fn stage_dimension_mismatch_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write_full_set(dir.path());
        // Classifier expecting 3 features against a 2-feature vectorizer.
        write_artifact(
            dir.path(),
            "abuse_detector.json",
            r#"{"classes":[0,1],"coef":[[0.5,-0.5,0.1]],"intercept":[0.0]}"#,
        );

        let err = ModelContext::load(dir.path()).unwrap_err();
        assert!(matches!(err, ModelError::Invalid(_)));
    }

    #[test]
    fn encoder_class_count_mismatch_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write_full_set(dir.path());
        write_artifact(
            dir.path(),
            "intent_label_encoder.json",
            r#"{"classes":["COLD","HOT"]}"#,
        );

        let err = ModelContext::load(dir.path()).unwrap_err();
        assert!(matches!(err, ModelError::Invalid(_)));
    }
}
