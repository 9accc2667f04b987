//! Shared types for the classification pipeline.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ── Inbound email ───────────────────────────────────────────────────

/// A raw inbound email. Both fields are optional on the wire; at least one
/// must be non-empty for a model to run (otherwise the verdict is the
/// empty-input NEEDS_REVIEW shortcut).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawEmail {
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body: String,
}

// ── Labels ──────────────────────────────────────────────────────────

/// Final classification label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Label {
    #[serde(rename = "HOT")]
    Hot,
    #[serde(rename = "WARM")]
    Warm,
    #[serde(rename = "COLD")]
    Cold,
    #[serde(rename = "SPAM")]
    Spam,
    #[serde(rename = "ABUSE")]
    Abuse,
    #[serde(rename = "NEEDS_REVIEW")]
    NeedsReview,
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hot => "HOT",
            Self::Warm => "WARM",
            Self::Cold => "COLD",
            Self::Spam => "SPAM",
            Self::Abuse => "ABUSE",
            Self::NeedsReview => "NEEDS_REVIEW",
        }
    }

    /// Recommended action for each label — fixed lookup, one entry per label.
    pub fn action(&self) -> &'static str {
        match self {
            Self::Hot => "IMMEDIATE FOLLOW-UP REQUIRED - High interest lead, contact within 24 hours",
            Self::Warm => "SCHEDULE FOLLOW-UP - Moderate interest, add to nurture sequence",
            Self::Cold => "ADD TO NURTURE LIST - Low interest, continue general outreach",
            Self::Spam => "AUTO-DELETE - Move to spam folder, no action needed",
            Self::Abuse => "BLOCK & REPORT - Abusive content, block sender and document",
            Self::NeedsReview => "MANUAL REVIEW REQUIRED - Model uncertain, human review needed",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Label {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HOT" => Ok(Self::Hot),
            "WARM" => Ok(Self::Warm),
            "COLD" => Ok(Self::Cold),
            "SPAM" => Ok(Self::Spam),
            "ABUSE" => Ok(Self::Abuse),
            "NEEDS_REVIEW" => Ok(Self::NeedsReview),
            other => Err(format!("unknown label {other:?}")),
        }
    }
}

// ── Stages ──────────────────────────────────────────────────────────

/// Which cascade stage produced the final decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    AbuseDetection,
    SpamDetection,
    IntentClassification,
    /// Empty-input shortcut: no model was invoked.
    None,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AbuseDetection => "abuse_detection",
            Self::SpamDetection => "spam_detection",
            Self::IntentClassification => "intent_classification",
            Self::None => "none",
        }
    }
}

// ── Stage result ────────────────────────────────────────────────────

/// One stage invocation's output: the predicted class and the calibrated
/// probability distribution over the stage's classes. Produced fresh per
/// invocation, never mutated.
#[derive(Debug, Clone)]
pub struct StageResult {
    /// Class labels, parallel to `probabilities`.
    pub classes: Vec<i64>,
    pub probabilities: Vec<f64>,
    pub predicted: i64,
}

impl StageResult {
    /// Probability of the binary stage's positive class
    /// (label `1`, falling back to the numerically largest label).
    pub fn positive_confidence(&self) -> f64 {
        let idx = crate::model::positive_class_index(&self.classes);
        self.probabilities.get(idx).copied().unwrap_or(0.0)
    }

    /// The positive class label itself, under the same convention.
    pub fn positive_class(&self) -> i64 {
        self.classes[crate::model::positive_class_index(&self.classes)]
    }

    /// Highest probability across classes.
    pub fn max_probability(&self) -> f64 {
        self.probabilities
            .iter()
            .cloned()
            .fold(f64::NEG_INFINITY, f64::max)
    }
}

// ── Verdict ─────────────────────────────────────────────────────────

/// The externally visible classification result. Created once per email,
/// immutable after construction.
///
/// Invariant: `needs_review` is true iff `label` is NEEDS_REVIEW, enforced
/// by the constructors.
#[derive(Debug, Clone, Serialize)]
pub struct Verdict {
    pub label: Label,
    /// Percentage in [0, 100], rounded to one decimal place.
    pub confidence: f64,
    pub action: String,
    pub stage: Stage,
    pub needs_review: bool,
    /// Raw intent-model prediction, kept when the final label fell back to
    /// NEEDS_REVIEW (and echoed on confident intent verdicts).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub predicted_label: Option<String>,
}

/// Round a probability to a percentage with one decimal place.
pub fn confidence_pct(probability: f64) -> f64 {
    (probability * 1000.0).round() / 10.0
}

impl Verdict {
    /// Shortcut verdict for empty input — no model invocation.
    pub fn empty_input() -> Self {
        Self {
            label: Label::NeedsReview,
            confidence: 0.0,
            action: "Empty email - manual review required".to_string(),
            stage: Stage::None,
            needs_review: true,
            predicted_label: None,
        }
    }

    /// Confident early-exit verdict from a binary stage.
    pub fn stage_positive(label: Label, probability: f64, stage: Stage) -> Self {
        Self {
            label,
            confidence: confidence_pct(probability),
            action: label.action().to_string(),
            stage,
            needs_review: false,
            predicted_label: None,
        }
    }

    /// Intent-stage verdict: confident prediction, or NEEDS_REVIEW fallback
    /// retaining the raw model prediction.
    pub fn intent(predicted: Label, probability: f64, confident: bool) -> Self {
        let label = if confident {
            predicted
        } else {
            Label::NeedsReview
        };
        Self {
            label,
            confidence: confidence_pct(probability),
            action: label.action().to_string(),
            stage: Stage::IntentClassification,
            needs_review: !confident,
            predicted_label: Some(predicted.as_str().to_string()),
        }
    }
}
