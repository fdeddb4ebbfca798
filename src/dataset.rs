//! Lead dataset records.
//!
//! Operates on already-loaded rows: label normalization, train/test
//! splitting on the `training_set` column, and extraction of judge
//! calibration examples. File parsing itself lives with the caller.

use serde::{Deserialize, Serialize};

use crate::judge::JudgeExample;

/// One dataset row describing a lead and its annotations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeadRecord {
    pub username: String,
    pub name: String,
    pub url: String,
    /// Human-assigned label, display form ("Strong fit") or canonical.
    #[serde(default)]
    pub icp_match: Option<String>,
    /// "train" or "test" (case-insensitive); anything else is unsplit.
    #[serde(default)]
    pub training_set: Option<String>,
    /// Whether this row calibrates the classification judge.
    #[serde(default)]
    pub judge_example: bool,
    /// Research context captured when the row was labeled.
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub rationale: Option<String>,
}

/// Normalize a display-form label to its canonical form.
///
/// Exactly three mapped pairs; anything else passes through unchanged so
/// upstream data oddities stay visible instead of being silently eaten.
pub fn normalize_label(label: &str) -> String {
    match label {
        "Strong fit" => "strong_fit".to_string(),
        "Weak fit" => "weak_fit".to_string(),
        "Not a fit" => "not_a_fit".to_string(),
        other => other.to_string(),
    }
}

/// Labeled rows split by their `training_set` column.
#[derive(Debug, Default)]
pub struct DatasetSplit {
    pub train: Vec<LeadRecord>,
    pub test: Vec<LeadRecord>,
}

/// Split labeled records into train and test sets.
///
/// Rows without a label or with an unrecognized `training_set` value are
/// dropped from both sets.
pub fn split_records(records: &[LeadRecord]) -> DatasetSplit {
    let mut split = DatasetSplit::default();
    for record in records {
        if record.icp_match.is_none() {
            continue;
        }
        match record.training_set.as_deref().map(str::to_lowercase).as_deref() {
            Some("train") => split.train.push(record.clone()),
            Some("test") => split.test.push(record.clone()),
            _ => {}
        }
    }
    split
}

/// Extract judge calibration examples from rows flagged `judge_example`.
///
/// Only rows with a label and context qualify; labels are normalized.
pub fn judge_examples(records: &[LeadRecord]) -> Vec<JudgeExample> {
    records
        .iter()
        .filter(|r| r.judge_example)
        .filter_map(|r| {
            let label = r.icp_match.as_deref()?;
            let context = r.context.clone()?;
            Some(JudgeExample {
                name: r.name.clone(),
                username: r.username.clone(),
                context,
                icp_match: normalize_label(label),
                rationale: r.rationale.clone().unwrap_or_default(),
            })
        })
        .collect()
}
