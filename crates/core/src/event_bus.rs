//! Studio event bus: trait for emitting creative-session lifecycle events.
//!
//! Sessions accept an `Arc<dyn EventSink>` so the host application can route
//! events to its own telemetry pipeline.

use crate::types::{StudioEvent, StudioEventType};
use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;
use uuid::Uuid;

/// Trait for emitting studio events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: StudioEvent);
}

/// No-op sink for callers that don't need event emission.
pub struct NoOpSink;

impl EventSink for NoOpSink {
    fn emit(&self, _event: StudioEvent) {}
}

/// Sink that writes every event to the structured log.
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: StudioEvent) {
        tracing::info!(
            event_id = %event.event_id,
            event_type = ?event.event_type,
            session = %event.session_id,
            job = ?event.job_sequence,
            detail = event.detail.as_deref().unwrap_or(""),
            "studio event"
        );
    }
}

/// In-memory sink that captures events for testing.
#[derive(Default)]
pub struct CaptureSink {
    events: Mutex<Vec<StudioEvent>>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<StudioEvent> {
        self.events.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.events.lock().len()
    }

    pub fn count_type(&self, event_type: StudioEventType) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventSink for CaptureSink {
    fn emit(&self, event: StudioEvent) {
        self.events.lock().push(event);
    }
}

/// Convenience builder for creating a `StudioEvent` with minimal boilerplate.
pub fn make_event(
    event_type: StudioEventType,
    session_id: Uuid,
    job_sequence: Option<u64>,
    detail: Option<String>,
) -> StudioEvent {
    StudioEvent {
        event_id: Uuid::new_v4(),
        event_type,
        session_id,
        job_sequence,
        detail,
        timestamp: Utc::now(),
    }
}

/// Convenience: create a no-op event bus.
pub fn noop_sink() -> Arc<dyn EventSink> {
    Arc::new(NoOpSink)
}

/// Convenience: route events to the tracing subscriber.
pub fn tracing_sink() -> Arc<dyn EventSink> {
    Arc::new(TracingSink)
}

/// Convenience: create a capture sink for tests.
pub fn capture_sink() -> Arc<CaptureSink> {
    Arc::new(CaptureSink::new())
}
