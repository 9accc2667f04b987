//! Hierarchical decision engine — the three-stage classification cascade.
//!
//! Flow: text → abuse detector → spam detector → intent classifier.
//! Adversarial classes are checked first, so an email must clear two
//! confident "not adversarial" gates before intent is consulted, and a
//! confident stage-1 or stage-2 positive exits early without ever invoking
//! the later stages.
//!
//! A single 0.70 threshold gates every stage: below it, a positive
//! prediction is not trusted and the cascade continues (or, at the intent
//! stage, falls back to NEEDS_REVIEW rather than guessing).

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::error::ClassifyError;
use crate::model::{ModelContext, StageModel};
use crate::pipeline::types::{Label, RawEmail, Stage, StageResult, Verdict};

/// Confidence cutoff shared by all three stages.
pub const CONFIDENCE_THRESHOLD: f64 = 0.70;

/// The decision engine. Holds the pre-loaded model context; classification
/// itself is pure CPU work over read-only state, so one engine is safely
/// shared across request handlers.
pub struct DecisionEngine {
    models: ModelContext,
}

impl DecisionEngine {
    pub fn new(models: ModelContext) -> Self {
        Self { models }
    }

    /// Classify one email through the cascade.
    ///
    /// Empty input (subject and body both blank) short-circuits to the
    /// NEEDS_REVIEW verdict without invoking any model. Vectorizer or
    /// classifier failures propagate as hard errors — they are never
    /// downgraded to a verdict.
    pub fn classify(&self, body: &str, subject: &str) -> Result<Verdict, ClassifyError> {
        let combined = format!("{subject} {body}");
        let text = combined.trim();

        if text.is_empty() {
            debug!("Empty input — returning NEEDS_REVIEW without model invocation");
            return Ok(Verdict::empty_input());
        }

        // Stage 1: abuse detection.
        if let Some(verdict) =
            self.binary_stage(&self.models.abuse, Label::Abuse, Stage::AbuseDetection, text)?
        {
            return Ok(verdict);
        }

        // Stage 2: spam detection.
        if let Some(verdict) =
            self.binary_stage(&self.models.spam, Label::Spam, Stage::SpamDetection, text)?
        {
            return Ok(verdict);
        }

        // Stage 3: intent classification.
        self.intent_stage(text)
    }

    /// Classify a batch in input order — exactly one verdict per email.
    ///
    /// Emails are independent; the first hard failure aborts the batch
    /// (a failed model call cannot be retried into success).
    pub fn classify_batch(&self, emails: &[RawEmail]) -> Result<Vec<Verdict>, ClassifyError> {
        emails
            .iter()
            .map(|email| self.classify(&email.body, &email.subject))
            .collect()
    }

    /// Run one binary stage; `Some` means a confident positive (early exit).
    fn binary_stage(
        &self,
        model: &StageModel,
        positive_label: Label,
        stage: Stage,
        text: &str,
    ) -> Result<Option<Verdict>, ClassifyError> {
        let result = run_stage(model, stage.as_str(), text)?;
        let confidence = result.positive_confidence();

        debug!(
            stage = stage.as_str(),
            predicted = result.predicted,
            confidence,
            "Stage evaluated"
        );

        if result.predicted == result.positive_class() && confidence >= CONFIDENCE_THRESHOLD {
            return Ok(Some(Verdict::stage_positive(
                positive_label,
                confidence,
                stage,
            )));
        }
        Ok(None)
    }

    /// Run the multiclass intent stage, with NEEDS_REVIEW fallback below
    /// the threshold.
    fn intent_stage(&self, text: &str) -> Result<Verdict, ClassifyError> {
        let stage = Stage::IntentClassification;
        let result = run_stage(&self.models.intent, stage.as_str(), text)?;
        let confidence = result.max_probability();

        let raw_label = self
            .models
            .intent_labels
            .inverse_transform(result.predicted)
            .map_err(|e| ClassifyError::Prediction {
                stage: stage.as_str(),
                reason: e.to_string(),
            })?;
        let predicted: Label = raw_label.parse().map_err(|reason| ClassifyError::Prediction {
            stage: stage.as_str(),
            reason,
        })?;

        debug!(
            stage = stage.as_str(),
            predicted = %predicted,
            confidence,
            "Stage evaluated"
        );

        Ok(Verdict::intent(
            predicted,
            confidence,
            confidence >= CONFIDENCE_THRESHOLD,
        ))
    }
}

/// Vectorize and predict for one stage, producing a fresh `StageResult`.
fn run_stage(
    model: &StageModel,
    stage: &'static str,
    text: &str,
) -> Result<StageResult, ClassifyError> {
    let features = model
        .vectorizer
        .transform(text)
        .map_err(|e| ClassifyError::Transform {
            stage,
            reason: e.to_string(),
        })?;
    let probabilities =
        model
            .classifier
            .predict_proba(&features)
            .map_err(|e| ClassifyError::Prediction {
                stage,
                reason: e.to_string(),
            })?;
    let predicted = model
        .classifier
        .predict(&features)
        .map_err(|e| ClassifyError::Prediction {
            stage,
            reason: e.to_string(),
        })?;

    Ok(StageResult {
        classes: model.classifier.classes().to_vec(),
        probabilities,
        predicted,
    })
}

// ── Batch summary ───────────────────────────────────────────────────

/// Label histogram and review count, folded over a batch's verdicts.
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub counts: BTreeMap<Label, usize>,
    pub needs_review_count: usize,
}

impl BatchSummary {
    pub fn from_verdicts(verdicts: &[Verdict]) -> Self {
        let mut counts: BTreeMap<Label, usize> = BTreeMap::new();
        let mut needs_review_count = 0;
        for verdict in verdicts {
            *counts.entry(verdict.label).or_insert(0) += 1;
            if verdict.needs_review {
                needs_review_count += 1;
            }
        }
        Self {
            total: verdicts.len(),
            counts,
            needs_review_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelError;
    use crate::model::{FeatureVector, LabelEncoder, ProbClassifier, Vectorizer};

    // ── Stubs ───────────────────────────────────────────────────────

    /// Vectorizer stub: fixed-dimension empty vector.
    struct StubVectorizer {
        dim: usize,
    }

    impl Vectorizer for StubVectorizer {
        fn transform(&self, _text: &str) -> Result<FeatureVector, ModelError> {
            Ok(FeatureVector {
                dim: self.dim,
                indices: vec![],
                values: vec![],
            })
        }

        fn dim(&self) -> usize {
            self.dim
        }
    }

    /// Vectorizer stub that always fails.
    struct FailingVectorizer;

    impl Vectorizer for FailingVectorizer {
        fn transform(&self, _text: &str) -> Result<FeatureVector, ModelError> {
            Err(ModelError::Invalid("broken vectorizer".into()))
        }

        fn dim(&self) -> usize {
            1
        }
    }

    /// Classifier stub returning a fixed distribution.
    struct StubClassifier {
        classes: Vec<i64>,
        proba: Vec<f64>,
    }

    impl ProbClassifier for StubClassifier {
        fn classes(&self) -> &[i64] {
            &self.classes
        }

        fn predict_proba(&self, _features: &FeatureVector) -> Result<Vec<f64>, ModelError> {
            Ok(self.proba.clone())
        }

        fn n_features(&self) -> usize {
            1
        }
    }

    fn stage(classes: Vec<i64>, proba: Vec<f64>) -> StageModel {
        StageModel::new(
            Box::new(StubVectorizer { dim: 1 }),
            Box::new(StubClassifier { classes, proba }),
        )
    }

    fn encoder() -> LabelEncoder {
        LabelEncoder::from_classes(vec!["COLD".into(), "HOT".into(), "WARM".into()])
    }

    /// Engine with given per-stage probability distributions.
    fn engine(abuse: Vec<f64>, spam: Vec<f64>, intent: Vec<f64>) -> DecisionEngine {
        DecisionEngine::new(ModelContext::new(
            stage(vec![0, 1], abuse),
            stage(vec![0, 1], spam),
            stage(vec![0, 1, 2], intent),
            encoder(),
        ))
    }

    fn negative() -> Vec<f64> {
        vec![0.95, 0.05]
    }

    // ── Empty input ─────────────────────────────────────────────────

    #[test]
    fn empty_input_short_circuits() {
        // Stage models would all fail loudly if invoked.
        let broken = || {
            StageModel::new(
                Box::new(FailingVectorizer),
                Box::new(StubClassifier {
                    classes: vec![0, 1],
                    proba: vec![0.5, 0.5],
                }),
            )
        };
        let engine =
            DecisionEngine::new(ModelContext::new(broken(), broken(), broken(), encoder()));

        for (body, subject) in [("", ""), ("   ", ""), ("", "  \t "), (" ", " ")] {
            let v = engine.classify(body, subject).unwrap();
            assert_eq!(v.label, Label::NeedsReview);
            assert_eq!(v.confidence, 0.0);
            assert_eq!(v.stage, Stage::None);
            assert!(v.needs_review);
        }
    }

    // ── Cascade ─────────────────────────────────────────────────────

    #[test]
    fn abuse_fires_and_later_stages_never_run() {
        // Spam and intent stages would error if invoked.
        let broken = StageModel::new(
            Box::new(FailingVectorizer),
            Box::new(StubClassifier {
                classes: vec![0, 1],
                proba: vec![0.5, 0.5],
            }),
        );
        let broken2 = StageModel::new(
            Box::new(FailingVectorizer),
            Box::new(StubClassifier {
                classes: vec![0, 1, 2],
                proba: vec![0.3, 0.3, 0.4],
            }),
        );
        let engine = DecisionEngine::new(ModelContext::new(
            stage(vec![0, 1], vec![0.08, 0.92]),
            broken,
            broken2,
            encoder(),
        ));

        let v = engine.classify("threatening content", "").unwrap();
        assert_eq!(v.label, Label::Abuse);
        assert_eq!(v.stage, Stage::AbuseDetection);
        assert_eq!(v.confidence, 92.0);
        assert!(!v.needs_review);
        assert!(v.predicted_label.is_none());
    }

    #[test]
    fn spam_fires_when_abuse_does_not() {
        let engine = engine(negative(), vec![0.12, 0.88], vec![0.3, 0.3, 0.4]);
        let v = engine.classify("buy now limited offer", "").unwrap();
        assert_eq!(v.label, Label::Spam);
        assert_eq!(v.stage, Stage::SpamDetection);
        assert_eq!(v.confidence, 88.0);
    }

    #[test]
    fn positive_prediction_below_threshold_falls_through() {
        // Abuse predicted positive at 0.65 — not trusted, cascade continues.
        let engine = engine(vec![0.35, 0.65], negative(), vec![0.1, 0.8, 0.1]);
        let v = engine.classify("borderline text", "").unwrap();
        assert_eq!(v.label, Label::Hot);
        assert_eq!(v.stage, Stage::IntentClassification);
    }

    #[test]
    fn threshold_is_inclusive() {
        let engine = engine(vec![0.3, 0.7], negative(), vec![0.3, 0.3, 0.4]);
        let v = engine.classify("exactly at threshold", "").unwrap();
        assert_eq!(v.label, Label::Abuse);
        assert_eq!(v.confidence, 70.0);
    }

    #[test]
    fn confident_negative_prediction_never_fires() {
        // Predicted class is 0 even though we ask about class 1's probability.
        let engine = engine(vec![0.8, 0.2], vec![0.8, 0.2], vec![0.05, 0.9, 0.05]);
        let v = engine.classify("ordinary email", "").unwrap();
        assert_eq!(v.stage, Stage::IntentClassification);
    }

    #[test]
    fn positive_class_fallback_without_label_one() {
        // Binary classes [0, 2]: positive is the largest label.
        let engine = DecisionEngine::new(ModelContext::new(
            stage(vec![0, 2], vec![0.1, 0.9]),
            stage(vec![0, 1], negative()),
            stage(vec![0, 1, 2], vec![0.3, 0.3, 0.4]),
            encoder(),
        ));
        let v = engine.classify("text", "").unwrap();
        assert_eq!(v.label, Label::Abuse);
        assert_eq!(v.confidence, 90.0);
    }

    // ── Intent stage ────────────────────────────────────────────────

    #[test]
    fn confident_intent_prediction() {
        let engine = engine(negative(), negative(), vec![0.05, 0.85, 0.10]);
        let v = engine.classify("ready to buy, send the contract", "").unwrap();
        assert_eq!(v.label, Label::Hot);
        assert_eq!(v.stage, Stage::IntentClassification);
        assert_eq!(v.confidence, 85.0);
        assert!(!v.needs_review);
        assert_eq!(v.predicted_label.as_deref(), Some("HOT"));
    }

    #[test]
    fn uncertain_intent_falls_back_to_needs_review() {
        let engine = engine(negative(), negative(), vec![0.45, 0.30, 0.25]);
        let v = engine.classify("maybe later", "").unwrap();
        assert_eq!(v.label, Label::NeedsReview);
        assert!(v.needs_review);
        assert_eq!(v.confidence, 45.0);
        // Raw model prediction is retained.
        assert_eq!(v.predicted_label.as_deref(), Some("COLD"));
        assert_eq!(v.stage, Stage::IntentClassification);
    }

    #[test]
    fn needs_review_iff_label_is_needs_review() {
        let cases = [
            engine(vec![0.1, 0.9], negative(), vec![0.4, 0.3, 0.3]),
            engine(negative(), negative(), vec![0.05, 0.85, 0.10]),
            engine(negative(), negative(), vec![0.4, 0.35, 0.25]),
        ];
        for engine in &cases {
            let v = engine.classify("text", "").unwrap();
            assert_eq!(v.needs_review, v.label == Label::NeedsReview);
        }
    }

    // ── Failure propagation ─────────────────────────────────────────

    #[test]
    fn transform_failure_propagates() {
        let engine = DecisionEngine::new(ModelContext::new(
            StageModel::new(
                Box::new(FailingVectorizer),
                Box::new(StubClassifier {
                    classes: vec![0, 1],
                    proba: vec![0.5, 0.5],
                }),
            ),
            stage(vec![0, 1], negative()),
            stage(vec![0, 1, 2], vec![0.3, 0.3, 0.4]),
            encoder(),
        ));
        let err = engine.classify("text", "").unwrap_err();
        assert!(matches!(err, ClassifyError::Transform { stage: "abuse_detection", .. }));
    }

    #[test]
    fn unknown_intent_class_id_is_an_error() {
        // Encoder has 3 classes but the classifier reports class 7.
        let engine = DecisionEngine::new(ModelContext::new(
            stage(vec![0, 1], negative()),
            stage(vec![0, 1], negative()),
            stage(vec![0, 1, 7], vec![0.1, 0.1, 0.8]),
            encoder(),
        ));
        let err = engine.classify("text", "").unwrap_err();
        assert!(matches!(err, ClassifyError::Prediction { stage: "intent_classification", .. }));
    }

    #[test]
    fn unmapped_intent_label_is_an_error() {
        let engine = DecisionEngine::new(ModelContext::new(
            stage(vec![0, 1], negative()),
            stage(vec![0, 1], negative()),
            stage(vec![0, 1, 2], vec![0.1, 0.1, 0.8]),
            LabelEncoder::from_classes(vec!["COLD".into(), "HOT".into(), "LUKEWARM".into()]),
        ));
        let err = engine.classify("text", "").unwrap_err();
        assert!(matches!(err, ClassifyError::Prediction { .. }));
    }

    // ── Batch ───────────────────────────────────────────────────────

    fn email(subject: &str, body: &str) -> RawEmail {
        RawEmail {
            subject: subject.into(),
            body: body.into(),
        }
    }

    #[test]
    fn batch_preserves_order_and_count() {
        let engine = engine(negative(), negative(), vec![0.05, 0.85, 0.10]);
        let emails = vec![
            email("a", "first"),
            email("", ""),
            email("c", "third"),
        ];
        let verdicts = engine.classify_batch(&emails).unwrap();
        assert_eq!(verdicts.len(), 3);
        assert_eq!(verdicts[0].label, Label::Hot);
        assert_eq!(verdicts[1].label, Label::NeedsReview);
        assert_eq!(verdicts[1].stage, Stage::None);
        assert_eq!(verdicts[2].label, Label::Hot);
    }

    #[test]
    fn batch_summary_counts_sum_to_total() {
        let verdicts = vec![
            Verdict::stage_positive(Label::Spam, 0.9, Stage::SpamDetection),
            Verdict::intent(Label::Hot, 0.8, true),
            Verdict::intent(Label::Warm, 0.5, false),
            Verdict::empty_input(),
        ];
        let summary = BatchSummary::from_verdicts(&verdicts);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.counts[&Label::Spam], 1);
        assert_eq!(summary.counts[&Label::Hot], 1);
        assert_eq!(summary.counts[&Label::NeedsReview], 2);
        assert_eq!(summary.counts.values().sum::<usize>(), summary.total);
        assert_eq!(summary.needs_review_count, 2);
    }

    #[test]
    fn batch_summary_serializes_label_keys() {
        let verdicts = vec![Verdict::intent(Label::Hot, 0.9, true)];
        let summary = BatchSummary::from_verdicts(&verdicts);
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["counts"]["HOT"], 1);
    }
}
