//! Classification scoring.
//!
//! The same score table serves as the training metric (against the judge's
//! independent opinion) and the test metric (against human ground truth).
//! Metric functions are total over malformed predictions: a missing field
//! scores 0.0 with a warning, so one bad row never sinks a batch run.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::classify::FitClass;
use crate::judge::ClassificationJudge;

/// One pipeline prediction in the shape the metrics consume.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Prediction {
    pub label: Option<FitClass>,
    pub rationale: Option<String>,
    /// Research context the label was produced from; the judge reads this.
    pub context: Option<String>,
}

/// Score one predicted label against an expected one.
///
/// Exact match scores 1.0. Confusing the two fit classes with each other
/// scores 0.5; any confusion involving `not_a_fit` is a full miss.
pub fn compute_classification_score(predicted: FitClass, expected: FitClass) -> f64 {
    if predicted == expected {
        return 1.0;
    }
    let fits = |c: FitClass| matches!(c, FitClass::StrongFit | FitClass::WeakFit);
    if fits(predicted) && fits(expected) {
        0.5
    } else {
        0.0
    }
}

/// Test metric: predicted label vs. human ground truth.
pub fn test_score(prediction: &Prediction, ground_truth: FitClass) -> f64 {
    match prediction.label {
        Some(label) => compute_classification_score(label, ground_truth),
        None => {
            warn!("Prediction has no label, scoring 0.0");
            0.0
        }
    }
}

/// Training metric: predicted label vs. the judge's independent opinion.
///
/// The judge is never shown ground truth. Judge failures score 0.0 rather
/// than aborting the batch.
pub async fn training_score(judge: &ClassificationJudge, prediction: &Prediction) -> f64 {
    let Some(label) = prediction.label else {
        warn!("Prediction has no label, scoring 0.0");
        return 0.0;
    };
    let Some(context) = prediction.context.as_deref() else {
        warn!("Prediction has no research context, scoring 0.0");
        return 0.0;
    };

    match judge.judge(context, label, prediction.rationale.as_deref()).await {
        Ok(opinion) => compute_classification_score(label, opinion),
        Err(e) => {
            warn!(error = %e, "Judge call failed, scoring 0.0");
            0.0
        }
    }
}
