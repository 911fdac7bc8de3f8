use serde::{Deserialize, Serialize};

use crate::{
    domain::{UploadId, UploadRecord, UploadStatus},
    error::ErrorReport,
};

/// Observation published whenever a record changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum UploadEvent {
    Registered(UploadRecord),
    Progress(UploadRecord),
    PhaseChanged(UploadRecord),
    Completed(UploadRecord),
    Failed(UploadRecord),
    Cancelled { id: UploadId },
}

impl UploadEvent {
    pub fn id(&self) -> UploadId {
        match self {
            Self::Registered(record)
            | Self::Progress(record)
            | Self::PhaseChanged(record)
            | Self::Completed(record)
            | Self::Failed(record) => record.id,
            Self::Cancelled { id } => *id,
        }
    }

    pub fn record(&self) -> Option<&UploadRecord> {
        match self {
            Self::Registered(record)
            | Self::Progress(record)
            | Self::PhaseChanged(record)
            | Self::Completed(record)
            | Self::Failed(record) => Some(record),
            Self::Cancelled { .. } => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed(_) | Self::Failed(_) | Self::Cancelled { .. }
        )
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub name: String,
    pub error: ErrorReport,
}

/// Acknowledgment returned by a validated batch submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitReceipt {
    pub accepted: Vec<UploadId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rejected: Vec<Rejection>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadSummary {
    pub total: usize,
    pub uploading: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

impl UploadSummary {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a UploadRecord>) -> Self {
        let mut summary = Self::default();
        for record in records {
            summary.total += 1;
            match record.status {
                UploadStatus::Uploading => summary.uploading += 1,
                UploadStatus::Processing => summary.processing += 1,
                UploadStatus::Completed => summary.completed += 1,
                UploadStatus::Error => summary.failed += 1,
            }
        }
        summary
    }

    pub fn active(&self) -> usize {
        self.uploading + self.processing
    }
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
