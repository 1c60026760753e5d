//! The research service: submission, status, reports, resume and cancel
//!
//! Each accepted session runs as its own tokio task driven by an
//! [`Orchestrator`]. The service tracks running sessions by id together with
//! their cancellation tokens; a session leaves the table when its task ends,
//! however it ends.

use crate::config::PipelineConfig;
use crate::error::ServiceError;
use crate::orchestrator::Orchestrator;
use crate::state::{ArtifactSummary, SessionState};
use crate::store::SharedStore;
use scrivener_domain::traits::{ContentFetcher, LlmProvider, SearchProvider, SessionStore};
use scrivener_domain::{
    unix_now, Artifact, FinalReport, Session, SessionId, SessionStatus, Stage, TranscriptEntry,
};
use scrivener_research::{validate_topic, ResearchConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Display;
use std::sync::{Arc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

type ActiveTable = Arc<RwLock<HashMap<SessionId, CancellationToken>>>;

/// What a status query returns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStatusView {
    /// Session id
    pub id: SessionId,
    /// Research topic
    pub topic: String,
    /// Last completed stage
    pub stage: Stage,
    /// Overall status
    pub status: SessionStatus,
    /// Revision rounds completed
    pub revision_count: u32,
    /// Error of a failed session
    pub error: Option<String>,
    /// Whether a task is driving the session in this process
    pub active: bool,
    /// Counts of persisted artifacts
    pub artifacts: ArtifactSummary,
}

/// Removes a session from the active table when its task ends
struct ActiveGuard {
    id: SessionId,
    active: ActiveTable,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        let mut active = self.active.write().unwrap_or_else(|e| e.into_inner());
        active.remove(&self.id);
    }
}

/// Accepts research requests and runs them in the background
///
/// # Examples
///
/// ```no_run
/// use scrivener_pipeline::{PipelineConfig, ResearchService, SharedStore};
/// use scrivener_llm::MockProvider;
/// use scrivener_store::SqliteSessionStore;
/// use scrivener_web::{MockFetcher, MockSearch};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let service = ResearchService::new(
///     Arc::new(MockProvider::default()),
///     Arc::new(MockSearch::default()),
///     Arc::new(MockFetcher::new()),
///     SharedStore::new(SqliteSessionStore::in_memory()?),
///     PipelineConfig::default(),
/// );
///
/// let id = service.submit_research("Do four-day weeks raise output?", None)?;
/// let session = service.wait(id).await?;
/// println!("{} finished as {}", session.id, session.status.as_str());
/// # Ok(())
/// # }
/// ```
pub struct ResearchService<L, S, F, St> {
    llm: Arc<L>,
    search: Arc<S>,
    fetcher: Arc<F>,
    store: SharedStore<St>,
    config: PipelineConfig,
    active: ActiveTable,
    handles: Mutex<HashMap<SessionId, JoinHandle<()>>>,
}

impl<L, S, F, St> ResearchService<L, S, F, St>
where
    L: LlmProvider + Send + Sync + 'static,
    L::Error: Display + Send + 'static,
    S: SearchProvider + Send + Sync + 'static,
    S::Error: Display + Send + 'static,
    F: ContentFetcher + Send + Sync + 'static,
    F::Error: Display + Send + 'static,
    St: SessionStore + Send + 'static,
    St::Error: Display,
{
    /// Create a service over the given collaborators and store
    pub fn new(
        llm: Arc<L>,
        search: Arc<S>,
        fetcher: Arc<F>,
        store: SharedStore<St>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            llm,
            search,
            fetcher,
            store,
            config,
            active: Arc::new(RwLock::new(HashMap::new())),
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// Service configuration
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Validate a request, record the session and start it in the background
    ///
    /// `config` overrides the service's research defaults for this session
    /// only; it is stored with the session so a resume uses it too.
    pub fn submit_research(
        &self,
        topic: &str,
        config: Option<ResearchConfig>,
    ) -> Result<SessionId, ServiceError> {
        let topic = validate_topic(topic)?;
        let stored_config = match &config {
            Some(config) => {
                config.validate().map_err(ServiceError::Input)?;
                Some(config.to_toml().map_err(ServiceError::Input)?)
            }
            None => None,
        };

        let mut session = Session::new(topic, unix_now());
        session.config = stored_config;
        let id = session.id;

        let token = self.reserve(id)?;
        if let Err(e) = self.store.with(|s| s.create_session(&session)) {
            self.release(id);
            return Err(ServiceError::Store(e));
        }
        info!("Accepted session {}: {}", id, session.topic);
        self.launch(id, token);
        Ok(id)
    }

    /// Status of a session
    pub fn get_session_status(&self, id: SessionId) -> Result<SessionStatusView, ServiceError> {
        let session = self.session(id)?;
        let artifacts = match self
            .store
            .with(|s| s.load_artifacts(id))
            .map_err(ServiceError::Store)
            .and_then(|stored| SessionState::replay(&stored).map_err(ServiceError::from))
        {
            Ok(state) => state.summary(),
            Err(e) => {
                debug!("No artifact summary for {}: {}", id, e);
                ArtifactSummary::default()
            }
        };

        Ok(SessionStatusView {
            id,
            topic: session.topic,
            stage: session.current_stage,
            status: session.status,
            revision_count: session.revision_count,
            error: session.error,
            active: self.is_active(id),
            artifacts,
        })
    }

    /// The final report of a finished session
    pub fn get_final_report(&self, id: SessionId) -> Result<FinalReport, ServiceError> {
        let session = self.session(id)?;
        let artifacts = self
            .store
            .with(|s| s.load_artifacts(id))
            .map_err(ServiceError::Store)?;

        artifacts
            .into_iter()
            .find_map(|stored| match stored.artifact {
                Artifact::FinalReport(report) => Some(report),
                _ => None,
            })
            .ok_or_else(|| {
                ServiceError::NotReady(format!(
                    "session {} is {} after {}",
                    id,
                    session.status.as_str(),
                    session.current_stage
                ))
            })
    }

    /// Continue an interrupted, cancelled or failed session from its last
    /// completed stage
    pub fn resume(&self, id: SessionId) -> Result<(), ServiceError> {
        let session = self.session(id)?;
        if matches!(session.status, SessionStatus::Done | SessionStatus::DoneWithWarning) {
            return Err(ServiceError::AlreadyFinished(id));
        }
        let token = self.reserve(id)?;
        info!("Resuming session {} after {}", id, session.current_stage);
        self.launch(id, token);
        Ok(())
    }

    /// Ask a running session to stop at its next stage boundary
    ///
    /// Returns false when the session exists but is not running here.
    pub fn cancel(&self, id: SessionId) -> Result<bool, ServiceError> {
        let active = self.active.read().unwrap_or_else(|e| e.into_inner());
        if let Some(token) = active.get(&id) {
            token.cancel();
            info!("Cancellation requested for session {}", id);
            return Ok(true);
        }
        drop(active);
        self.session(id)?;
        Ok(false)
    }

    /// All sessions, newest first
    pub fn list_sessions(&self) -> Result<Vec<Session>, ServiceError> {
        self.store
            .with(|s| s.list_sessions())
            .map_err(ServiceError::Store)
    }

    /// A session's transcript in order
    pub fn transcript(&self, id: SessionId) -> Result<Vec<TranscriptEntry>, ServiceError> {
        self.session(id)?;
        self.store
            .with(|s| s.load_transcript(id))
            .map_err(ServiceError::Store)
    }

    /// Wait for a session's task to end and return the session as stored
    pub async fn wait(&self, id: SessionId) -> Result<Session, ServiceError> {
        let handle = self
            .handles
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id);
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("Task for session {} ended abnormally: {}", id, e);
            }
        }
        self.session(id)
    }

    /// Resume sessions a previous process left running
    pub fn recover_interrupted(&self) -> Result<Vec<SessionId>, ServiceError> {
        let interrupted: Vec<SessionId> = self
            .list_sessions()?
            .into_iter()
            .filter(|s| s.status == SessionStatus::Running && !self.is_active(s.id))
            .map(|s| s.id)
            .collect();

        let mut resumed = Vec::new();
        for id in interrupted {
            match self.resume(id) {
                Ok(()) => resumed.push(id),
                Err(e) => warn!("Could not resume interrupted session {}: {}", id, e),
            }
        }
        Ok(resumed)
    }

    /// Sessions running in this process
    pub fn active_count(&self) -> usize {
        self.active.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn is_active(&self, id: SessionId) -> bool {
        self.active
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(&id)
    }

    fn session(&self, id: SessionId) -> Result<Session, ServiceError> {
        self.store
            .with(|s| s.get_session(id))
            .map_err(ServiceError::Store)?
            .ok_or(ServiceError::NotFound(id))
    }

    /// Claim a slot in the active table
    fn reserve(&self, id: SessionId) -> Result<CancellationToken, ServiceError> {
        let mut active = self.active.write().unwrap_or_else(|e| e.into_inner());
        if active.contains_key(&id) {
            return Err(ServiceError::AlreadyRunning(id));
        }
        if active.len() >= self.config.max_active_sessions {
            return Err(ServiceError::Busy(active.len()));
        }
        let token = CancellationToken::new();
        active.insert(id, token.clone());
        Ok(token)
    }

    fn release(&self, id: SessionId) {
        self.active
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id);
    }

    fn launch(&self, id: SessionId, token: CancellationToken) {
        let orchestrator = Orchestrator::new(
            Arc::clone(&self.llm),
            Arc::clone(&self.search),
            Arc::clone(&self.fetcher),
            self.store.clone(),
        )
        .with_cancellation(token);
        let defaults = self.config.research.clone();
        let guard = ActiveGuard {
            id,
            active: Arc::clone(&self.active),
        };

        let handle = tokio::spawn(async move {
            let _guard = guard;
            if let Err(e) = orchestrator.run(id, &defaults).await {
                debug!("Session {} stopped: {}", id, e);
            }
        });

        let mut handles = self.handles.lock().unwrap_or_else(|e| e.into_inner());
        handles.retain(|_, h| !h.is_finished());
        handles.insert(id, handle);
    }
}
