use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::UploadError;

pub const PROGRESS_MAX: f64 = 100.0;

/// Smallest increment applied per tick. Keeps every record moving towards a
/// terminal state even when a generator yields zero, negative or NaN steps.
pub const MIN_PROGRESS_STEP: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UploadId(pub Uuid);

impl UploadId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UploadId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UploadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    Uploading,
    Processing,
    Completed,
    Error,
}

impl UploadStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }

    pub fn phase(self) -> Option<Phase> {
        match self {
            Self::Uploading => Some(Phase::Uploading),
            Self::Processing => Some(Phase::Processing),
            Self::Completed | Self::Error => None,
        }
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Uploading => "uploading",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Error => "error",
        };
        f.write_str(label)
    }
}

/// The two active statuses a record can be driven through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Uploading,
    Processing,
}

impl Phase {
    pub fn status(self) -> UploadStatus {
        match self {
            Self::Uploading => UploadStatus::Uploading,
            Self::Processing => UploadStatus::Processing,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    pub name: String,
    pub size: u64,
}

impl FileDescriptor {
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadRecord {
    pub id: UploadId,
    pub name: String,
    pub size: u64,
    pub status: UploadStatus,
    pub progress: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

/// Outcome of applying one tick or one failure to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Progressed,
    PhaseChanged,
    Completed,
    Failed,
    Unchanged,
}

impl UploadRecord {
    pub fn register(descriptor: FileDescriptor) -> Self {
        Self {
            id: UploadId::new(),
            name: descriptor.name,
            size: descriptor.size,
            status: UploadStatus::Uploading,
            progress: 0.0,
            error: None,
            submitted_at: Utc::now(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn phase(&self) -> Option<Phase> {
        self.status.phase()
    }

    /// Applies one progress increment for the current phase.
    ///
    /// Crossing 100 while uploading moves the record to `Processing` with
    /// progress reset to 0; crossing 100 while processing completes it with
    /// progress clamped to 100. Terminal records are left untouched.
    pub fn advance(&mut self, step: f64) -> Transition {
        let Some(phase) = self.phase() else {
            return Transition::Unchanged;
        };

        let next = self.progress + sanitize_step(step);
        if next < PROGRESS_MAX {
            self.progress = next;
            return Transition::Progressed;
        }

        match phase {
            Phase::Uploading => {
                self.status = UploadStatus::Processing;
                self.progress = 0.0;
                Transition::PhaseChanged
            }
            Phase::Processing => {
                self.status = UploadStatus::Completed;
                self.progress = PROGRESS_MAX;
                Transition::Completed
            }
        }
    }

    /// Moves an active record to `Error`. Progress keeps its last value.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<Transition, UploadError> {
        if self.is_terminal() {
            return Err(UploadError::AlreadyTerminal {
                id: self.id,
                status: self.status,
            });
        }
        self.status = UploadStatus::Error;
        self.error = Some(message.into());
        Ok(Transition::Failed)
    }
}

fn sanitize_step(step: f64) -> f64 {
    if step.is_nan() || step < MIN_PROGRESS_STEP {
        MIN_PROGRESS_STEP
    } else {
        step
    }
}

/// Worst-case number of ticks a single phase can take.
pub fn max_ticks_per_phase() -> u32 {
    (PROGRESS_MAX / MIN_PROGRESS_STEP).ceil() as u32
}

#[cfg(test)]
#[path = "tests/domain_tests.rs"]
mod tests;
