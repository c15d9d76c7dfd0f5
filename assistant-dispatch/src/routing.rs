//! Decides which response source handles a text turn.

use serde::{Deserialize, Serialize};

use crate::upload::UploadKind;

const EEG_TERMS: &[&str] = &["eeg", "brain", "seizure", "analysis"];
const ALZHEIMER_TERMS: &[&str] = &["alzheimer", "mri", "brain scan", "dementia", "cognitive"];

pub const EEG_READY_REPLY: &str = "I can help you analyze EEG data! Please upload a CSV file with your EEG signals, and I'll process it to detect seizure activity.";
pub const EEG_UNAVAILABLE_REPLY: &str = "EEG analysis service is currently unavailable. Please check that the backend server is running and try configuring the backend URL.";
pub const ALZHEIMER_READY_REPLY: &str = "I can help you analyze MRI brain scans for Alzheimer's disease detection! Please upload an MRI image (jpg, jpeg, or png), and I'll analyze it to assess the level of impairment.";
pub const ALZHEIMER_UNAVAILABLE_REPLY: &str = "Alzheimer's analysis service is currently unavailable. Please check that the Python API server is running and try configuring the Alzheimer API URL.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// User asks about EEG analysis; answered with upload instructions
    EegInfo,
    /// User asks about MRI / Alzheimer's analysis
    AlzheimerInfo,
    /// Anything else goes to the chat backend or the canned replies
    Conversation,
}

/// EEG terms are checked before Alzheimer terms, so "brain scan" is an EEG
/// question.
pub fn detect_intent(input: &str) -> Intent {
    let message = input.to_lowercase();
    if EEG_TERMS.iter().any(|term| message.contains(term)) {
        Intent::EegInfo
    } else if ALZHEIMER_TERMS.iter().any(|term| message.contains(term)) {
        Intent::AlzheimerInfo
    } else {
        Intent::Conversation
    }
}

impl Intent {
    /// The classifier an informational question is about, if any.
    pub fn upload_kind(&self) -> Option<UploadKind> {
        match self {
            Intent::EegInfo => Some(UploadKind::Eeg),
            Intent::AlzheimerInfo => Some(UploadKind::Alzheimer),
            Intent::Conversation => None,
        }
    }
}

/// Fixed answer to an informational question; never touches the network.
pub fn info_reply(kind: UploadKind, connected: bool) -> &'static str {
    match (kind, connected) {
        (UploadKind::Eeg, true) => EEG_READY_REPLY,
        (UploadKind::Eeg, false) => EEG_UNAVAILABLE_REPLY,
        (UploadKind::Alzheimer, true) => ALZHEIMER_READY_REPLY,
        (UploadKind::Alzheimer, false) => ALZHEIMER_UNAVAILABLE_REPLY,
    }
}
