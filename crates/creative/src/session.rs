//! Creative session: one intake, its generation orchestrator and its result
//! gallery, driven as a single logical actor.
//!
//! All state lives behind one lock that is never held across an `.await`.
//! Composite transitions (clear, replace-while-running, apply-result) happen
//! under a single acquisition, so no partially-reset state is observable.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use campaign_core::event_bus::make_event;
use campaign_core::types::StudioEventType;
use campaign_core::{CreativeConfig, EventSink, RegenerationPolicy};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use uuid::Uuid;

use crate::client::ImageGenerationClient;
use crate::error::{ClientError, CreativeError, CreativeResult};
use crate::gallery::{self, ResultGallery};
use crate::intake;
use crate::orchestrator::GenerationOrchestrator;
use crate::request_builder::build_request;
use crate::types::{
    Applied, BatchRequest, GeneratedVariant, GenerationParams, GenerationRequest, ImageSource,
    Intake, JobSnapshot, JobTicket, RemoteVariant, SubmitOutcome, VariantId,
};

const MIN_PROGRESS_TICK: Duration = Duration::from_millis(10);

/// Per-session knobs, usually derived from [`CreativeConfig`].
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub params: GenerationParams,
    pub regeneration: RegenerationPolicy,
    pub max_upload_bytes: usize,
    pub expected_duration: Duration,
    pub progress_tick: Duration,
}

impl From<&CreativeConfig> for SessionSettings {
    fn from(config: &CreativeConfig) -> Self {
        Self {
            params: GenerationParams::from(config),
            regeneration: config.regeneration,
            max_upload_bytes: config.max_upload_bytes,
            expected_duration: Duration::from_secs(config.expected_duration_secs),
            progress_tick: Duration::from_millis(config.progress_tick_ms),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from(&CreativeConfig::default())
    }
}

struct SessionState {
    intake: Option<Intake>,
    orchestrator: GenerationOrchestrator,
    gallery: ResultGallery,
}

/// Upload → generate → review workflow for one product image.
pub struct CreativeSession {
    id: Uuid,
    state: Mutex<SessionState>,
    client: Arc<dyn ImageGenerationClient>,
    events: Arc<dyn EventSink>,
    snapshots: watch::Sender<JobSnapshot>,
    settings: SessionSettings,
}

impl CreativeSession {
    pub fn new(
        client: Arc<dyn ImageGenerationClient>,
        events: Arc<dyn EventSink>,
        settings: SessionSettings,
    ) -> Self {
        let (snapshots, _) = watch::channel(JobSnapshot::default());
        Self {
            id: Uuid::new_v4(),
            state: Mutex::new(SessionState {
                intake: None,
                orchestrator: GenerationOrchestrator::new(settings.expected_duration),
                gallery: ResultGallery::new(),
            }),
            client,
            events,
            snapshots,
            settings,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    // ─── Intake ───────────────────────────────────────────────────────

    /// Accept a new product image. A rejected source leaves the session
    /// untouched. An accepted one replaces the previous intake and discards
    /// its job and results; a running job is canceled first.
    pub fn set_image(&self, source: ImageSource) -> CreativeResult<Intake> {
        let file_name = source.file_name.clone();
        let origin = source.origin;
        let accepted = match intake::accept(source, self.settings.max_upload_bytes) {
            Ok(accepted) => accepted,
            Err(err) => {
                metrics::counter!("creative.intake.rejected").increment(1);
                warn!(session = %self.id, file = %file_name, ?origin, error = %err, "image rejected");
                self.emit(StudioEventType::IntakeRejected, None, Some(err.to_string()));
                return Err(err);
            }
        };

        let canceled = {
            let mut state = self.state.lock();
            let canceled = state.orchestrator.cancel().ok();
            state.orchestrator.reset();
            state.gallery.clear();
            state.intake = Some(accepted.clone());
            self.publish(&state);
            canceled
        };

        if let Some(ticket) = canceled {
            self.emit(
                StudioEventType::JobCanceled,
                Some(ticket.sequence()),
                Some("image replaced".to_string()),
            );
        }
        info!(
            session = %self.id,
            file = %accepted.file_name(),
            content_type = %accepted.content_type(),
            ?origin,
            "product image accepted"
        );
        self.emit(
            StudioEventType::IntakeAccepted,
            None,
            Some(accepted.file_name().to_string()),
        );
        Ok(accepted)
    }

    /// Remove the intake together with every job and gallery entry derived
    /// from it.
    pub fn clear(&self) {
        let discarded = {
            let mut state = self.state.lock();
            let discarded = state.orchestrator.live_sequence();
            state.intake = None;
            state.orchestrator.reset();
            state.gallery.clear();
            self.publish(&state);
            discarded
        };
        info!(session = %self.id, discarded_job = ?discarded, "intake cleared");
        self.emit(StudioEventType::IntakeCleared, discarded, None);
    }

    pub fn intake(&self) -> Option<Intake> {
        self.state.lock().intake.clone()
    }

    // ─── Generation ───────────────────────────────────────────────────

    /// Run one generation job for the current intake.
    ///
    /// Returns an error only when the job could not start (no intake, bad
    /// parameters, another job in flight). Remote failures are reported as
    /// [`SubmitOutcome::Failed`] and leave the session in `Failed`.
    pub async fn submit(&self, goal: Option<&str>) -> CreativeResult<SubmitOutcome> {
        let (ticket, request, intake) = {
            let mut state = self.state.lock();
            let intake = state.intake.clone().ok_or(CreativeError::NoIntake)?;
            let request = build_request(&intake, goal, self.settings.params)?;
            let ticket = state.orchestrator.begin(&request)?;
            self.publish(&state);
            (ticket, request, intake)
        };
        self.emit(
            StudioEventType::JobSubmitted,
            Some(ticket.sequence()),
            Some(request.prompt().to_string()),
        );

        let mut guard = InFlightGuard {
            session: self,
            ticket: Some(ticket),
        };
        let work = self.run_remote(ticket, &request, &intake);
        tokio::pin!(work);
        let mut ticker = tokio::time::interval(self.settings.progress_tick.max(MIN_PROGRESS_TICK));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let result = loop {
            tokio::select! {
                result = &mut work => break result,
                _ = ticker.tick() => self.tick_progress(),
            }
        };

        guard.disarm();
        Ok(self.apply_result(ticket, &request, result))
    }

    /// Run generation again for the same intake with a freshly built request.
    pub async fn regenerate(&self, goal: Option<&str>) -> CreativeResult<SubmitOutcome> {
        info!(
            session = %self.id,
            goal = goal.unwrap_or("-"),
            policy = ?self.settings.regeneration,
            "regenerating creative assets"
        );
        self.submit(goal).await
    }

    /// Abandon the running job. Its eventual reply is discarded.
    pub fn cancel(&self) -> CreativeResult<u64> {
        let ticket = {
            let mut state = self.state.lock();
            let ticket = state.orchestrator.cancel()?;
            self.publish(&state);
            ticket
        };
        self.emit(StudioEventType::JobCanceled, Some(ticket.sequence()), None);
        Ok(ticket.sequence())
    }

    /// Current job view with progress brought up to date.
    pub fn snapshot(&self) -> JobSnapshot {
        let mut state = self.state.lock();
        state.orchestrator.refresh_progress();
        state.orchestrator.snapshot()
    }

    /// Observe job snapshots as they change.
    pub fn subscribe(&self) -> watch::Receiver<JobSnapshot> {
        self.snapshots.subscribe()
    }

    async fn run_remote(
        &self,
        ticket: JobTicket,
        request: &GenerationRequest,
        intake: &Intake,
    ) -> Result<Option<Vec<RemoteVariant>>, ClientError> {
        let payload = self.client.upload_image(intake).await?;

        {
            let mut state = self.state.lock();
            if state.orchestrator.mark_accepted(ticket) == Applied::Stale {
                return Ok(None);
            }
            self.publish(&state);
        }
        self.emit(StudioEventType::JobInProgress, Some(ticket.sequence()), None);

        let batch = BatchRequest::new(request, payload);
        self.client.generate_batch(&batch).await.map(Some)
    }

    fn apply_result(
        &self,
        ticket: JobTicket,
        request: &GenerationRequest,
        result: Result<Option<Vec<RemoteVariant>>, ClientError>,
    ) -> SubmitOutcome {
        let sequence = ticket.sequence();
        match result {
            Ok(None) => self.discard(sequence),
            Ok(Some(remote)) if remote.is_empty() => self.apply_failure(
                ticket,
                "generation service returned no variants".to_string(),
            ),
            Ok(Some(remote)) => {
                let variants = gallery::variants_from_remote(sequence, remote, request.prompt());
                let variant_count = variants.len();
                let applied = {
                    let mut state = self.state.lock();
                    let applied = state.orchestrator.complete(ticket);
                    if applied == Applied::Current {
                        state.gallery.apply(variants, self.settings.regeneration);
                        self.publish(&state);
                    }
                    applied
                };
                match applied {
                    Applied::Current => {
                        info!(session = %self.id, sequence, variant_count, "creative assets generated");
                        self.emit(
                            StudioEventType::JobCompleted,
                            Some(sequence),
                            Some(format!("{variant_count} variants")),
                        );
                        SubmitOutcome::Completed {
                            sequence,
                            variant_count,
                        }
                    }
                    Applied::Stale => self.discard(sequence),
                }
            }
            Err(err) => self.apply_failure(ticket, err.to_string()),
        }
    }

    fn apply_failure(&self, ticket: JobTicket, detail: String) -> SubmitOutcome {
        let sequence = ticket.sequence();
        let (applied, detail) = {
            let mut state = self.state.lock();
            let applied = state.orchestrator.fail(ticket, detail.clone());
            self.publish(&state);
            let detail = state.orchestrator.snapshot().error_detail.unwrap_or(detail);
            (applied, detail)
        };
        match applied {
            Applied::Current => {
                self.emit(StudioEventType::JobFailed, Some(sequence), Some(detail.clone()));
                SubmitOutcome::Failed { sequence, detail }
            }
            Applied::Stale => self.discard(sequence),
        }
    }

    /// Cancel `ticket` if it is still the live job. Used when a `submit`
    /// future is dropped before its reply was applied.
    fn abandon(&self, ticket: JobTicket) {
        let canceled = {
            let mut state = self.state.lock();
            if !state.orchestrator.is_live(ticket) {
                return;
            }
            let canceled = state.orchestrator.cancel().is_ok();
            self.publish(&state);
            canceled
        };
        if canceled {
            warn!(session = %self.id, sequence = ticket.sequence(), "submit dropped, job canceled");
            self.emit(
                StudioEventType::JobCanceled,
                Some(ticket.sequence()),
                Some("submit dropped".to_string()),
            );
        }
    }

    fn discard(&self, sequence: u64) -> SubmitOutcome {
        self.emit(StudioEventType::StaleResponseDiscarded, Some(sequence), None);
        SubmitOutcome::Superseded { sequence }
    }

    fn tick_progress(&self) {
        let mut state = self.state.lock();
        let before = state.orchestrator.progress_percent();
        if state.orchestrator.refresh_progress() != before {
            self.publish(&state);
        }
    }

    // ─── Gallery ──────────────────────────────────────────────────────

    pub fn variants(&self) -> Vec<GeneratedVariant> {
        self.state.lock().gallery.variants().to_vec()
    }

    pub fn variant(&self, id: &VariantId) -> Option<GeneratedVariant> {
        self.state.lock().gallery.get(id).cloned()
    }

    pub fn toggle_select(&self, id: &VariantId) -> CreativeResult<bool> {
        let selected = self.state.lock().gallery.toggle_select(id)?;
        let event_type = if selected {
            StudioEventType::VariantSelected
        } else {
            StudioEventType::VariantDeselected
        };
        self.emit(event_type, Some(id.job), Some(id.to_string()));
        Ok(selected)
    }

    pub fn toggle_favorite(&self, id: &VariantId) -> CreativeResult<bool> {
        self.state.lock().gallery.toggle_favorite(id)
    }

    pub fn selected(&self) -> Vec<VariantId> {
        self.state.lock().gallery.selected_ids()
    }

    pub fn favorites(&self) -> Vec<VariantId> {
        self.state.lock().gallery.favorite_ids()
    }

    /// Save a variant of the current result set under `dir`.
    pub async fn download(&self, id: &VariantId, dir: &Path) -> CreativeResult<PathBuf> {
        let variant = self
            .variant(id)
            .ok_or_else(|| CreativeError::UnknownVariant(id.to_string()))?;
        let path = gallery::download_variant(&variant, dir).await?;
        self.emit(
            StudioEventType::VariantDownloaded,
            Some(id.job),
            Some(path.display().to_string()),
        );
        Ok(path)
    }

    // ─── Helpers ──────────────────────────────────────────────────────

    fn publish(&self, state: &SessionState) {
        self.snapshots.send_replace(state.orchestrator.snapshot());
    }

    fn emit(&self, event_type: StudioEventType, job_sequence: Option<u64>, detail: Option<String>) {
        self.events
            .emit(make_event(event_type, self.id, job_sequence, detail));
    }
}

/// Cancels its job on drop unless disarmed, so a `submit` future that is
/// dropped mid-flight never leaves the session stuck in `InProgress`.
struct InFlightGuard<'a> {
    session: &'a CreativeSession,
    ticket: Option<JobTicket>,
}

impl InFlightGuard<'_> {
    fn disarm(&mut self) {
        self.ticket = None;
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if let Some(ticket) = self.ticket.take() {
            self.session.abandon(ticket);
        }
    }
}
