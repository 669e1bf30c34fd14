use std::fmt;
use std::path::Path;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CreativeResult;
use crate::intake::content_type_for_path;

// ─── Intake ───────────────────────────────────────────────────────────

/// How the image reached the studio.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IntakeOrigin {
    Picker,
    DragDrop,
}

/// A file-like object offered to the intake.
#[derive(Debug, Clone)]
pub struct ImageSource {
    pub file_name: String,
    /// Declared content type. `None` when the source did not declare one.
    pub content_type: Option<String>,
    pub bytes: Bytes,
    pub origin: IntakeOrigin,
}

impl ImageSource {
    pub fn from_bytes(
        file_name: impl Into<String>,
        content_type: Option<&str>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.map(String::from),
            bytes: bytes.into(),
            origin: IntakeOrigin::Picker,
        }
    }

    /// Read an image file from disk. The content type comes from the
    /// extension; unknown extensions are declared as
    /// `application/octet-stream` and will be rejected by intake.
    pub async fn from_path(path: &Path) -> CreativeResult<Self> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("upload");
        let content_type = content_type_for_path(path).unwrap_or("application/octet-stream");
        Ok(Self::from_bytes(file_name, Some(content_type), bytes))
    }

    pub fn with_origin(mut self, origin: IntakeOrigin) -> Self {
        self.origin = origin;
        self
    }
}

/// The accepted product image: raw payload plus its preview encoding.
#[derive(Debug, Clone)]
pub struct Intake {
    pub(crate) id: Uuid,
    pub(crate) file_name: String,
    pub(crate) content_type: String,
    pub(crate) raw: Bytes,
    pub(crate) preview: String,
    pub(crate) origin: IntakeOrigin,
    pub(crate) accepted_at: DateTime<Utc>,
}

impl Intake {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn raw(&self) -> &Bytes {
        &self.raw
    }

    /// `data:<mime>;base64,<payload>` for display.
    pub fn preview(&self) -> &str {
        &self.preview
    }

    /// Transmissible form of the upload. Same as the preview data-URI.
    pub fn encoded_payload(&self) -> &str {
        &self.preview
    }

    pub fn origin(&self) -> IntakeOrigin {
        self.origin
    }

    pub fn accepted_at(&self) -> DateTime<Utc> {
        self.accepted_at
    }

    pub fn size_bytes(&self) -> usize {
        self.raw.len()
    }
}

// ─── Requests ─────────────────────────────────────────────────────────

/// Tunable generation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub variant_count: u32,
    pub strength: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            variant_count: 3,
            strength: 0.7,
        }
    }
}

impl From<&campaign_core::CreativeConfig> for GenerationParams {
    fn from(config: &campaign_core::CreativeConfig) -> Self {
        Self {
            variant_count: config.variant_count,
            strength: config.strength,
        }
    }
}

/// A fully-derived generation request. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRequest {
    pub(crate) source_image: String,
    pub(crate) prompt: String,
    pub(crate) variant_count: u32,
    pub(crate) strength: f32,
}

impl GenerationRequest {
    pub fn source_image(&self) -> &str {
        &self.source_image
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn variant_count(&self) -> u32 {
        self.variant_count
    }

    pub fn strength(&self) -> f32 {
        self.strength
    }
}

/// Wire body for the batch generation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRequest {
    pub image: String,
    pub prompt: String,
    pub num_variations: u32,
    pub strength: f32,
}

impl BatchRequest {
    /// Pair a request with the payload returned by the upload step.
    pub fn new(request: &GenerationRequest, image: String) -> Self {
        Self {
            image,
            prompt: request.prompt.clone(),
            num_variations: request.variant_count,
            strength: request.strength,
        }
    }
}

// ─── Jobs ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Idle,
    Submitting,
    InProgress,
    Completed,
    Failed,
}

impl JobStatus {
    /// Submitting or in progress.
    pub fn is_active(&self) -> bool {
        matches!(self, JobStatus::Submitting | JobStatus::InProgress)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            JobStatus::Idle => "idle",
            JobStatus::Submitting => "submitting",
            JobStatus::InProgress => "in progress",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Handle for one submitted job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobTicket {
    pub(crate) sequence: u64,
}

impl JobTicket {
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

/// Read-only view of the current job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSnapshot {
    pub sequence: Option<u64>,
    pub status: JobStatus,
    pub progress_percent: u8,
    pub prompt_used: Option<String>,
    pub error_detail: Option<String>,
}

impl Default for JobSnapshot {
    fn default() -> Self {
        Self {
            sequence: None,
            status: JobStatus::Idle,
            progress_percent: 0,
            prompt_used: None,
            error_detail: None,
        }
    }
}

/// How a remote reply was treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Current,
    /// The reply belongs to a superseded or canceled job and was ignored.
    Stale,
}

/// Result of one `submit` call as seen by the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Completed { sequence: u64, variant_count: usize },
    Failed { sequence: u64, detail: String },
    /// The job was canceled or replaced before its reply arrived.
    Superseded { sequence: u64 },
}

// ─── Variants ─────────────────────────────────────────────────────────

/// Variant identifier, namespaced by the job that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VariantId {
    pub job: u64,
    pub key: String,
}

impl VariantId {
    pub fn new(job: u64, key: impl Into<String>) -> Self {
        Self {
            job,
            key: key.into(),
        }
    }
}

impl fmt::Display for VariantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.job, self.key)
    }
}

/// One generated creative asset. Immutable once received.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratedVariant {
    pub id: VariantId,
    /// Data-URI or bare base64 image payload.
    pub image: String,
    pub prompt: String,
    pub score: u32,
    pub kind: String,
    pub received_at: DateTime<Utc>,
}

impl GeneratedVariant {
    /// Display title: the first clause of the prompt.
    pub fn title(&self) -> &str {
        self.prompt
            .split(',')
            .next()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or("Generated Asset")
    }
}

/// Remote variant id: the service may send numbers or strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RemoteId {
    Number(u64),
    Text(String),
}

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteId::Number(n) => write!(f, "{n}"),
            RemoteId::Text(s) => f.write_str(s),
        }
    }
}

/// A variant as returned by the generation service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteVariant {
    #[serde(default)]
    pub id: Option<RemoteId>,
    pub image: String,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

/// Static creative guidance shown next to the gallery.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub label: &'static str,
    pub value: &'static str,
    pub stat: &'static str,
}
