use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::{backend::BackendKind, error::DispatchError};

/// Which classifier an upload is meant for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadKind {
    Eeg,
    Alzheimer,
}

impl FromStr for UploadKind {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "eeg" => Ok(UploadKind::Eeg),
            "alzheimer" => Ok(UploadKind::Alzheimer),
            _ => Err(DispatchError::UnknownKind(s.to_string())),
        }
    }
}

impl UploadKind {
    pub fn backend(&self) -> BackendKind {
        match self {
            UploadKind::Eeg => BackendKind::Eeg,
            UploadKind::Alzheimer => BackendKind::Alzheimer,
        }
    }

    /// Checks the file type the classifier expects.
    pub fn accepts(&self, file: &UploadedFile) -> bool {
        let name = file.file_name.to_lowercase();
        let content_type = file.content_type.as_deref().unwrap_or_default();
        match self {
            UploadKind::Eeg => content_type == "text/csv" || name.ends_with(".csv"),
            UploadKind::Alzheimer => {
                content_type.starts_with("image/")
                    || [".jpg", ".jpeg", ".png"].iter().any(|ext| name.ends_with(ext))
            }
        }
    }

    pub(crate) fn wrong_type_notice(&self) -> &'static str {
        match self {
            UploadKind::Eeg => "Please select a CSV file",
            UploadKind::Alzheimer => "Please select a valid image file (jpg, jpeg, png)",
        }
    }

    pub(crate) fn selected_notice(&self, file_name: &str) -> String {
        match self {
            UploadKind::Eeg => format!("File selected: {}", file_name),
            UploadKind::Alzheimer => format!("Image selected: {}", file_name),
        }
    }

    pub(crate) fn missing_notice(&self) -> &'static str {
        match self {
            UploadKind::Eeg => "Please select a CSV file first",
            UploadKind::Alzheimer => "Please select an image first",
        }
    }

    pub(crate) fn unavailable_notice(&self) -> &'static str {
        match self {
            UploadKind::Eeg => "EEG service not connected. Please check backend URL.",
            UploadKind::Alzheimer => {
                "Alzheimer analysis service not connected. Please check if the Python API server is running."
            }
        }
    }

    pub(crate) fn failure_prefix(&self) -> &'static str {
        match self {
            UploadKind::Eeg => "Error analyzing EEG data",
            UploadKind::Alzheimer => "Error analyzing MRI image",
        }
    }
}

/// Raw file content as received from the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(file_name: impl Into<String>, content_type: Option<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type,
            bytes,
        }
    }
}

/// A selected file waiting for an explicit submit.
#[derive(Debug, Clone)]
pub struct PendingUpload {
    pub kind: UploadKind,
    pub file: UploadedFile,
    pub selected_at: DateTime<Utc>,
    /// Position in the selection order; a later selection always has a higher value
    pub selection: u64,
}

/// Serializable view of a pending upload, without the file content
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingUploadInfo {
    pub kind: UploadKind,
    pub file_name: String,
    pub size: usize,
    pub selected_at: DateTime<Utc>,
}

impl From<&PendingUpload> for PendingUploadInfo {
    fn from(pending: &PendingUpload) -> Self {
        Self {
            kind: pending.kind,
            file_name: pending.file.file_name.clone(),
            size: pending.file.bytes.len(),
            selected_at: pending.selected_at,
        }
    }
}

/// One slot per upload kind.
#[derive(Debug, Default)]
pub(crate) struct PendingUploads {
    eeg: Option<PendingUpload>,
    alzheimer: Option<PendingUpload>,
    selections: u64,
}

impl PendingUploads {
    fn slot(&mut self, kind: UploadKind) -> &mut Option<PendingUpload> {
        match kind {
            UploadKind::Eeg => &mut self.eeg,
            UploadKind::Alzheimer => &mut self.alzheimer,
        }
    }

    pub fn get(&self, kind: UploadKind) -> Option<&PendingUpload> {
        match kind {
            UploadKind::Eeg => self.eeg.as_ref(),
            UploadKind::Alzheimer => self.alzheimer.as_ref(),
        }
    }

    /// Stores `file`, replacing anything already selected for `kind`.
    pub fn replace(&mut self, kind: UploadKind, file: UploadedFile) {
        self.selections += 1;
        let selection = self.selections;
        *self.slot(kind) = Some(PendingUpload {
            kind,
            file,
            selected_at: Utc::now(),
            selection,
        });
    }

    /// Clears `kind` unless a newer file was selected in the meantime.
    pub fn clear_if_current(&mut self, kind: UploadKind, selection: u64) {
        let slot = self.slot(kind);
        if slot.as_ref().is_some_and(|p| p.selection == selection) {
            *slot = None;
        }
    }
}
