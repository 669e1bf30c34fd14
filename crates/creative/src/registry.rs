//! Registry of concurrent creative sessions, one per product image.

use std::sync::Arc;

use campaign_core::EventSink;
use dashmap::DashMap;
use tracing::info;
use uuid::Uuid;

use crate::client::ImageGenerationClient;
use crate::session::{CreativeSession, SessionSettings};

/// Each session has its own orchestrator and sequence counter; sessions never
/// share job state.
pub struct SessionRegistry {
    sessions: DashMap<Uuid, Arc<CreativeSession>>,
    client: Arc<dyn ImageGenerationClient>,
    events: Arc<dyn EventSink>,
    settings: SessionSettings,
}

impl SessionRegistry {
    pub fn new(
        client: Arc<dyn ImageGenerationClient>,
        events: Arc<dyn EventSink>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            sessions: DashMap::new(),
            client,
            events,
            settings,
        }
    }

    /// Open a fresh session sharing this registry's client and event sink.
    pub fn open(&self) -> Arc<CreativeSession> {
        let session = Arc::new(CreativeSession::new(
            self.client.clone(),
            self.events.clone(),
            self.settings.clone(),
        ));
        self.sessions.insert(session.id(), session.clone());
        info!(session = %session.id(), client = self.client.name(), "creative session opened");
        session
    }

    pub fn get(&self, id: &Uuid) -> Option<Arc<CreativeSession>> {
        self.sessions.get(id).map(|entry| entry.value().clone())
    }

    /// Close a session. Its state is cleared so in-flight replies are dropped.
    pub fn close(&self, id: &Uuid) -> Option<Arc<CreativeSession>> {
        let (_, session) = self.sessions.remove(id)?;
        session.clear();
        info!(session = %id, "creative session closed");
        Some(session)
    }

    pub fn ids(&self) -> Vec<Uuid> {
        self.sessions.iter().map(|entry| *entry.key()).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
