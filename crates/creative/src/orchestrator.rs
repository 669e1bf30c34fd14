//! Generation job state machine.
//!
//! `Idle → Submitting → InProgress → {Completed | Failed}`. Every submitted job
//! gets a monotonically increasing sequence number; remote replies are applied
//! only when they carry the sequence of the live job. Cancel and reset forget
//! the live sequence, so late replies for those jobs are reported as
//! [`Applied::Stale`] and change nothing.
//!
//! Progress is synthesized on the client from elapsed time because the
//! service exposes no progress channel. It never decreases, stays below 100
//! while the job is running and is exactly 100 once the job is terminal.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::error::{CreativeError, CreativeResult};
use crate::types::{Applied, GenerationRequest, JobSnapshot, JobStatus, JobTicket};

/// Ceiling for the synthesized in-flight estimate.
const PROGRESS_CEILING: f64 = 95.0;

#[derive(Debug, Clone)]
struct JobRecord {
    sequence: u64,
    status: JobStatus,
    prompt_used: String,
    error_detail: Option<String>,
    progress: u8,
    started_at: Instant,
}

/// Sole writer of generation job state for one intake.
#[derive(Debug)]
pub struct GenerationOrchestrator {
    next_sequence: u64,
    current: Option<JobRecord>,
    live: Option<u64>,
    expected: Duration,
}

impl GenerationOrchestrator {
    /// `expected` is the typical job duration used by the progress estimate.
    pub fn new(expected: Duration) -> Self {
        Self {
            next_sequence: 0,
            current: None,
            live: None,
            expected,
        }
    }

    pub fn status(&self) -> JobStatus {
        self.current
            .as_ref()
            .map(|job| job.status)
            .unwrap_or(JobStatus::Idle)
    }

    /// Sequence of the job currently awaiting a reply, if any.
    pub fn live_sequence(&self) -> Option<u64> {
        self.live
    }

    pub fn is_live(&self, ticket: JobTicket) -> bool {
        self.live == Some(ticket.sequence)
    }

    /// Start a new job. Rejected while another job is submitting or in
    /// progress; the existing job is left untouched in that case.
    pub fn begin(&mut self, request: &GenerationRequest) -> CreativeResult<JobTicket> {
        if let Some(job) = self.current.as_ref().filter(|job| job.status.is_active()) {
            warn!(sequence = job.sequence, status = %job.status, "submit rejected, job in flight");
            return Err(CreativeError::JobInFlight {
                sequence: job.sequence,
                status: job.status.to_string(),
            });
        }

        self.next_sequence += 1;
        let sequence = self.next_sequence;
        self.current = Some(JobRecord {
            sequence,
            status: JobStatus::Submitting,
            prompt_used: request.prompt().to_string(),
            error_detail: None,
            progress: 0,
            started_at: Instant::now(),
        });
        self.live = Some(sequence);

        metrics::counter!("creative.jobs.submitted").increment(1);
        info!(
            sequence,
            variants = request.variant_count(),
            strength = request.strength(),
            "generation job submitted"
        );
        Ok(JobTicket { sequence })
    }

    /// The remote accepted the job: `Submitting → InProgress`.
    pub fn mark_accepted(&mut self, ticket: JobTicket) -> Applied {
        let Some(job) = self.live_job_mut(ticket) else {
            debug!(sequence = ticket.sequence, "acceptance for stale job ignored");
            return Applied::Stale;
        };
        if job.status == JobStatus::Submitting {
            job.status = JobStatus::InProgress;
            job.started_at = Instant::now();
            debug!(sequence = ticket.sequence, "generation job in progress");
        }
        Applied::Current
    }

    /// Record a successful reply for `ticket`.
    pub fn complete(&mut self, ticket: JobTicket) -> Applied {
        let Some(job) = self.live_job_mut(ticket) else {
            return self.stale(ticket);
        };
        job.status = JobStatus::Completed;
        job.progress = 100;
        job.error_detail = None;
        self.live = None;

        metrics::counter!("creative.jobs.completed").increment(1);
        info!(sequence = ticket.sequence, "generation job completed");
        Applied::Current
    }

    /// Record a failed reply for `ticket`.
    pub fn fail(&mut self, ticket: JobTicket, detail: impl Into<String>) -> Applied {
        let Some(job) = self.live_job_mut(ticket) else {
            return self.stale(ticket);
        };
        let detail = detail.into();
        let detail = if detail.trim().is_empty() {
            "generation failed".to_string()
        } else {
            detail
        };
        warn!(sequence = ticket.sequence, error = %detail, "generation job failed");
        job.status = JobStatus::Failed;
        job.progress = 100;
        job.error_detail = Some(detail);
        self.live = None;

        metrics::counter!("creative.jobs.failed").increment(1);
        Applied::Current
    }

    /// Abandon the in-flight job and return to `Idle`. The remote work is not
    /// aborted; its reply will be stale.
    pub fn cancel(&mut self) -> CreativeResult<JobTicket> {
        let sequence = match (&self.current, self.live) {
            (Some(job), Some(live)) if job.status.is_active() && job.sequence == live => live,
            _ => return Err(CreativeError::NothingToCancel),
        };
        self.current = None;
        self.live = None;

        metrics::counter!("creative.jobs.canceled").increment(1);
        info!(sequence, "generation job canceled");
        Ok(JobTicket { sequence })
    }

    /// Drop all job state. The sequence counter keeps counting so replies for
    /// jobs started before the reset stay stale.
    pub fn reset(&mut self) {
        if let Some(sequence) = self.live.take() {
            debug!(sequence, "in-flight job discarded by reset");
        }
        self.current = None;
    }

    /// Advance the synthesized progress for the running job to `now` and
    /// return the current value.
    pub fn refresh_progress_at(&mut self, now: Instant) -> u8 {
        let expected = self.expected;
        match self.current.as_mut() {
            Some(job) if job.status == JobStatus::InProgress => {
                let elapsed = now.saturating_duration_since(job.started_at);
                job.progress = job.progress.max(estimate_progress(elapsed, expected));
                job.progress
            }
            Some(job) => job.progress,
            None => 0,
        }
    }

    pub fn refresh_progress(&mut self) -> u8 {
        self.refresh_progress_at(Instant::now())
    }

    pub fn progress_percent(&self) -> u8 {
        self.current.as_ref().map(|job| job.progress).unwrap_or(0)
    }

    pub fn snapshot(&self) -> JobSnapshot {
        match &self.current {
            Some(job) => JobSnapshot {
                sequence: Some(job.sequence),
                status: job.status,
                progress_percent: job.progress,
                prompt_used: Some(job.prompt_used.clone()),
                error_detail: job.error_detail.clone(),
            },
            None => JobSnapshot::default(),
        }
    }

    fn live_job_mut(&mut self, ticket: JobTicket) -> Option<&mut JobRecord> {
        if self.live != Some(ticket.sequence) {
            return None;
        }
        self.current
            .as_mut()
            .filter(|job| job.sequence == ticket.sequence && job.status.is_active())
    }

    fn stale(&self, ticket: JobTicket) -> Applied {
        metrics::counter!("creative.jobs.stale").increment(1);
        debug!(
            sequence = ticket.sequence,
            live = ?self.live,
            "stale generation reply discarded"
        );
        Applied::Stale
    }
}

/// Elapsed-time progress curve: `95 * (1 - e^(-elapsed / expected))`.
/// Approaches but never exceeds 95, so a running job never reads as done.
pub fn estimate_progress(elapsed: Duration, expected: Duration) -> u8 {
    if expected.is_zero() {
        return PROGRESS_CEILING as u8;
    }
    let ratio = elapsed.as_secs_f64() / expected.as_secs_f64();
    let value = PROGRESS_CEILING * (1.0 - (-ratio).exp());
    value.floor().clamp(0.0, PROGRESS_CEILING) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GenerationRequest;

    fn request(prompt: &str) -> GenerationRequest {
        GenerationRequest {
            source_image: "data:image/png;base64,AA==".to_string(),
            prompt: prompt.to_string(),
            variant_count: 3,
            strength: 0.7,
        }
    }

    fn orchestrator() -> GenerationOrchestrator {
        GenerationOrchestrator::new(Duration::from_secs(45))
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut orch = orchestrator();
        assert_eq!(orch.status(), JobStatus::Idle);

        let ticket = orch.begin(&request("conversion")).unwrap();
        assert_eq!(ticket.sequence(), 1);
        assert_eq!(orch.status(), JobStatus::Submitting);

        assert_eq!(orch.mark_accepted(ticket), Applied::Current);
        assert_eq!(orch.status(), JobStatus::InProgress);

        assert_eq!(orch.complete(ticket), Applied::Current);
        let snapshot = orch.snapshot();
        assert_eq!(snapshot.status, JobStatus::Completed);
        assert_eq!(snapshot.progress_percent, 100);
        assert_eq!(snapshot.prompt_used.as_deref(), Some("conversion"));
        assert!(orch.live_sequence().is_none());
    }

    #[test]
    fn test_second_submit_rejected_while_active() {
        let mut orch = orchestrator();
        let ticket = orch.begin(&request("a")).unwrap();
        let before = orch.snapshot();

        let err = orch.begin(&request("b")).unwrap_err();
        assert!(matches!(err, CreativeError::JobInFlight { sequence: 1, .. }));
        assert_eq!(orch.snapshot(), before);

        orch.mark_accepted(ticket);
        assert!(orch.begin(&request("c")).is_err());
        assert_eq!(orch.snapshot().prompt_used.as_deref(), Some("a"));
    }

    #[test]
    fn test_resubmit_after_failure_starts_fresh_job() {
        let mut orch = orchestrator();
        let first = orch.begin(&request("a")).unwrap();
        assert_eq!(orch.fail(first, "network unreachable"), Applied::Current);
        assert_eq!(orch.status(), JobStatus::Failed);
        assert_eq!(
            orch.snapshot().error_detail.as_deref(),
            Some("network unreachable")
        );

        let second = orch.begin(&request("a")).unwrap();
        assert_eq!(second.sequence(), 2);
        assert_eq!(orch.status(), JobStatus::Submitting);
        assert!(orch.snapshot().error_detail.is_none());
    }

    #[test]
    fn test_blank_failure_detail_is_replaced() {
        let mut orch = orchestrator();
        let ticket = orch.begin(&request("a")).unwrap();
        orch.fail(ticket, "  ");
        assert_eq!(
            orch.snapshot().error_detail.as_deref(),
            Some("generation failed")
        );
    }

    #[test]
    fn test_cancel_makes_reply_stale() {
        let mut orch = orchestrator();
        let first = orch.begin(&request("a")).unwrap();
        orch.mark_accepted(first);

        assert_eq!(orch.cancel().unwrap(), first);
        assert_eq!(orch.status(), JobStatus::Idle);
        assert_eq!(orch.complete(first), Applied::Stale);
        assert_eq!(orch.fail(first, "late"), Applied::Stale);
        assert_eq!(orch.status(), JobStatus::Idle);

        let second = orch.begin(&request("b")).unwrap();
        assert_eq!(second.sequence(), 2);
        assert_eq!(orch.mark_accepted(first), Applied::Stale);
        assert_eq!(orch.complete(first), Applied::Stale);
        assert_eq!(orch.status(), JobStatus::Submitting);
        assert_eq!(orch.snapshot().sequence, Some(2));
    }

    #[test]
    fn test_cancel_requires_active_job() {
        let mut orch = orchestrator();
        assert!(matches!(orch.cancel(), Err(CreativeError::NothingToCancel)));

        let ticket = orch.begin(&request("a")).unwrap();
        orch.complete(ticket);
        assert!(matches!(orch.cancel(), Err(CreativeError::NothingToCancel)));
        assert_eq!(orch.status(), JobStatus::Completed);
    }

    #[test]
    fn test_reset_keeps_sequence_counter() {
        let mut orch = orchestrator();
        let first = orch.begin(&request("a")).unwrap();
        orch.reset();
        assert_eq!(orch.snapshot(), JobSnapshot::default());
        assert_eq!(orch.complete(first), Applied::Stale);

        let second = orch.begin(&request("a")).unwrap();
        assert!(second.sequence() > first.sequence());
    }

    #[test]
    fn test_progress_is_monotonic_and_below_100_in_flight() {
        let mut orch = GenerationOrchestrator::new(Duration::from_secs(10));
        let ticket = orch.begin(&request("a")).unwrap();
        let start = Instant::now();
        assert_eq!(orch.refresh_progress_at(start + Duration::from_secs(5)), 0);

        orch.mark_accepted(ticket);
        let accepted = Instant::now();
        let mut last = 0;
        for secs in [1u64, 3, 2, 10, 30, 600, 5] {
            let value = orch.refresh_progress_at(accepted + Duration::from_secs(secs));
            assert!(value >= last, "progress went from {last} to {value}");
            assert!(value < 100);
            last = value;
        }
        assert!(last > 0);

        orch.complete(ticket);
        assert_eq!(orch.progress_percent(), 100);
        assert_eq!(orch.refresh_progress(), 100);
    }

    #[test]
    fn test_estimate_progress_curve() {
        let expected = Duration::from_secs(45);
        assert_eq!(estimate_progress(Duration::ZERO, expected), 0);
        let mid = estimate_progress(Duration::from_secs(45), expected);
        assert!((55..=65).contains(&mid));
        assert_eq!(estimate_progress(Duration::from_secs(3600), expected), 95);
        assert_eq!(estimate_progress(Duration::from_secs(1), Duration::ZERO), 95);
    }
}
