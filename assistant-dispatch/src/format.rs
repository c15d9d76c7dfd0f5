//! Human readable rendering of classifier results.

use crate::backend::{AlzheimerPrediction, EegPrediction};

const EEG_PREVIEW_RECORDS: usize = 5;

pub const DIAGNOSIS_DISCLAIMER: &str = "This is an AI-powered analysis and should not replace professional medical diagnosis. Please consult with a qualified neurologist for accurate assessment.";

fn seizure_class_meaning(class: i64) -> Option<&'static str> {
    match class {
        0 => Some("Normal EEG signal"),
        1 => Some("Seizure activity detected (Class 1)"),
        2 => Some("Seizure activity detected (Class 2)"),
        3 => Some("Seizure activity detected (Class 3)"),
        4 => Some("Seizure activity detected (Class 4)"),
        _ => None,
    }
}

/// Per-record preview of the first few records plus aggregate counts.
pub fn format_eeg_results(results: &[EegPrediction]) -> String {
    if results.is_empty() {
        return "No prediction results available".to_string();
    }

    let summary = results
        .iter()
        .take(EEG_PREVIEW_RECORDS)
        .enumerate()
        .map(|(index, result)| {
            let label = seizure_class_meaning(result.prediction)
                .map(str::to_string)
                .unwrap_or_else(|| format!("Class {}", result.prediction));
            format!("Record {}: {}", index + 1, label)
        })
        .collect::<Vec<_>>()
        .join("\n");

    let seizure_count = results.iter().filter(|r| r.prediction > 0).count();
    let normal_count = results.iter().filter(|r| r.prediction == 0).count();

    format!(
        "EEG Analysis Results:\n\n{}\n\nSummary:\n- Normal signals: {}\n- Seizure detections: {}\n- Total records analyzed: {}",
        summary,
        normal_count,
        seizure_count,
        results.len()
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Normal,
    VeryMild,
    Mild,
    Moderate,
    Unknown,
}

impl Severity {
    pub fn from_prediction(prediction: &str) -> Self {
        match prediction {
            "No Impairment" => Severity::Normal,
            "Very Mild Impairment" => Severity::VeryMild,
            "Mild Impairment" => Severity::Mild,
            "Moderate Impairment" => Severity::Moderate,
            _ => Severity::Unknown,
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Severity::Normal => "🟢",
            Severity::VeryMild => "🟡",
            Severity::Mild => "🟠",
            Severity::Moderate => "🔴",
            Severity::Unknown => "⚪",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Severity::Normal => "✅",
            Severity::VeryMild | Severity::Mild => "⚠️",
            Severity::Moderate => "🚨",
            Severity::Unknown => "❓",
        }
    }
}

pub fn format_alzheimer_result(result: &AlzheimerPrediction) -> String {
    let severity = Severity::from_prediction(&result.prediction);
    format!(
        "{} **Alzheimer's Analysis Result:**\n\n**Predicted Class:** {}\n**Severity Level:** {}\n\n**Description:** {}\n\n⚠️ *{}*",
        severity.icon(),
        result.prediction,
        severity.color(),
        result.meaning,
        DIAGNOSIS_DISCLAIMER
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn predictions(classes: &[i64]) -> Vec<EegPrediction> {
        classes
            .iter()
            .map(|&prediction| EegPrediction { prediction })
            .collect()
    }

    #[test]
    fn test_eeg_summary_counts() {
        let text = format_eeg_results(&predictions(&[0, 1, 0]));
        assert!(text.contains("Normal signals: 2"));
        assert!(text.contains("Seizure detections: 1"));
        assert!(text.contains("Total records analyzed: 3"));
        assert!(text.contains("Record 2: Seizure activity detected (Class 1)"));
    }

    #[test]
    fn test_eeg_preview_limited_to_five_records() {
        let text = format_eeg_results(&predictions(&[0, 0, 2, 0, 4, 3, 1]));
        assert!(text.contains("Record 5: Seizure activity detected (Class 4)"));
        assert!(!text.contains("Record 6"));
        assert!(text.contains("Total records analyzed: 7"));
        assert!(text.contains("Seizure detections: 4"));
    }

    #[test]
    fn test_eeg_unknown_class_label() {
        let text = format_eeg_results(&predictions(&[7]));
        assert!(text.contains("Record 1: Class 7"));
    }

    #[test]
    fn test_eeg_empty_results() {
        assert_eq!(format_eeg_results(&[]), "No prediction results available");
    }

    #[test]
    fn test_moderate_impairment_is_critical() {
        let text = format_alzheimer_result(&AlzheimerPrediction {
            prediction: "Moderate Impairment".to_string(),
            meaning: "Significant cognitive decline".to_string(),
        });
        assert!(text.contains("🔴"));
        assert!(text.starts_with("🚨"));
        assert!(text.contains(DIAGNOSIS_DISCLAIMER));
        assert!(text.contains("**Description:** Significant cognitive decline"));
    }

    #[test]
    fn test_unknown_prediction_gets_neutral_marker() {
        let text = format_alzheimer_result(&AlzheimerPrediction {
            prediction: "Severe Impairment".to_string(),
            meaning: "n/a".to_string(),
        });
        assert!(text.contains("⚪"));
        assert!(text.starts_with("❓"));
        assert!(text.contains("**Predicted Class:** Severe Impairment"));
    }
}
