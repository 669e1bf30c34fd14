use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle event emitted by a creative session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudioEvent {
    pub event_id: Uuid,
    pub event_type: StudioEventType,
    pub session_id: Uuid,
    /// Sequence number of the generation job the event concerns, if any.
    pub job_sequence: Option<u64>,
    pub detail: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StudioEventType {
    // Intake events
    IntakeAccepted,
    IntakeRejected,
    IntakeCleared,
    // Job lifecycle
    JobSubmitted,
    JobInProgress,
    JobCompleted,
    JobFailed,
    JobCanceled,
    StaleResponseDiscarded,
    // Gallery
    VariantSelected,
    VariantDeselected,
    VariantDownloaded,
}
