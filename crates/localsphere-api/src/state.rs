//! Application state shared across all route handlers.
//!
//! AppState holds the message store, the responder and the registry of
//! live session controllers. It is passed to handlers via axum's State
//! extractor.
//!
//! A visitor that closes the page never says goodbye, so every lookup
//! refreshes the session's `last_seen` and a background sweeper unmounts
//! sessions that stay idle past `chat.session_idle_secs`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use localsphere_chat::{
    IntentResponder, LocalIdentityProvider, Responder, SessionController, SessionSettings,
};
use localsphere_core::config::{InjectedEnvironment, PortalConfig};
use localsphere_core::portal::Carousel;
use localsphere_storage::{Database, MessageRepository, SqliteMessageStore};

use crate::error::ApiError;

/// A registered controller and the last time a request touched it.
pub struct SessionEntry {
    pub controller: SessionController,
    pub last_seen: tokio::time::Instant,
}

/// Shared application state.
///
/// All fields use `Arc` for cheap cloning across handler tasks.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<PortalConfig>,
    /// Resolved app id, auth token and runtime description.
    pub environment: Arc<InjectedEnvironment>,
    pub database: Arc<Database>,
    pub store: Arc<SqliteMessageStore>,
    pub responder: Arc<dyn Responder>,
    /// Live controllers keyed by session id.
    pub sessions: Arc<Mutex<HashMap<String, SessionEntry>>>,
    /// Server start time for uptime and carousel position.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: PortalConfig, environment: InjectedEnvironment, database: Database) -> Self {
        let database = Arc::new(database);
        let store = SqliteMessageStore::new(
            MessageRepository::new(Arc::clone(&database)),
            config.chat.subscription_buffer,
        );
        let responder = IntentResponder::from_config(&config.chat);
        Self {
            config: Arc::new(config),
            environment: Arc::new(environment),
            database,
            store: Arc::new(store),
            responder: Arc::new(responder),
            sessions: Arc::new(Mutex::new(HashMap::new())),
            start_time: Instant::now(),
        }
    }

    /// Replace the responder.
    pub fn with_responder(mut self, responder: Arc<dyn Responder>) -> Self {
        self.responder = responder;
        self
    }

    /// Build a controller for a new visitor load. Each load gets its own
    /// identity state.
    pub fn new_controller(&self) -> SessionController {
        SessionController::new(
            SessionSettings::from_environment(&self.environment, &self.config.chat),
            Arc::new(LocalIdentityProvider::new()),
            self.store.clone(),
            self.responder.clone(),
        )
    }

    pub fn carousel(&self) -> Carousel {
        Carousel::new(Duration::from_secs(self.config.carousel.interval_secs))
    }

    fn registry(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, SessionEntry>>, ApiError> {
        self.sessions
            .lock()
            .map_err(|e| ApiError::Internal(format!("Session registry poisoned: {}", e)))
    }

    pub fn register(&self, controller: SessionController) -> Result<(), ApiError> {
        let entry = SessionEntry {
            last_seen: tokio::time::Instant::now(),
            controller,
        };
        self.registry()?
            .insert(entry.controller.session_id().to_string(), entry);
        Ok(())
    }

    /// Look up a live session and mark it as seen.
    pub fn session(&self, id: &str) -> Result<SessionController, ApiError> {
        let mut sessions = self.registry()?;
        let entry = sessions
            .get_mut(id)
            .ok_or_else(|| ApiError::NotFound(format!("Unknown session: {}", id)))?;
        entry.last_seen = tokio::time::Instant::now();
        Ok(entry.controller.clone())
    }

    pub fn remove_session(&self, id: &str) -> Result<SessionController, ApiError> {
        self.registry()?
            .remove(id)
            .map(|entry| entry.controller)
            .ok_or_else(|| ApiError::NotFound(format!("Unknown session: {}", id)))
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().map(|s| s.len()).unwrap_or(0)
    }

    /// Unmount and forget sessions idle for at least `idle`.
    ///
    /// A session with an open transcript stream counts as active.
    /// Returns the number of sessions removed.
    pub fn sweep_idle(&self, idle: Duration) -> usize {
        let now = tokio::time::Instant::now();
        let expired: Vec<SessionController> = {
            let Ok(mut sessions) = self.sessions.lock() else {
                return 0;
            };
            for entry in sessions.values_mut() {
                if entry.controller.has_observers() {
                    entry.last_seen = now;
                }
            }
            let ids: Vec<String> = sessions
                .iter()
                .filter(|(_, entry)| now.duration_since(entry.last_seen) >= idle)
                .map(|(id, _)| id.clone())
                .collect();
            ids.iter()
                .filter_map(|id| sessions.remove(id))
                .map(|entry| entry.controller)
                .collect()
        };

        for controller in &expired {
            controller.unmount();
            tracing::info!(session = %controller.session_id(), "Idle session expired");
        }
        expired.len()
    }

    /// Run [`AppState::sweep_idle`] every `chat.session_sweep_secs`.
    pub fn spawn_session_sweeper(&self) -> JoinHandle<()> {
        let (idle, period) = self.config.chat.session_expiry();
        let state = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let removed = state.sweep_idle(idle);
                if removed > 0 {
                    tracing::debug!(removed, remaining = state.session_count(), "Session sweep");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use localsphere_chat::ControllerState;

    fn make_state(idle_secs: u64, sweep_secs: u64) -> AppState {
        let mut config = PortalConfig::default();
        config.chat.responder_min_latency_ms = 0;
        config.chat.responder_max_latency_ms = 0;
        config.chat.session_idle_secs = idle_secs;
        config.chat.session_sweep_secs = sweep_secs;
        let environment = config.resolve_environment();
        AppState::new(config, environment, Database::in_memory().unwrap())
    }

    async fn mounted_session(state: &AppState) -> SessionController {
        let controller = state.new_controller();
        controller.mount().await.unwrap();
        state.register(controller.clone()).unwrap();
        controller
    }

    #[tokio::test]
    async fn test_register_and_remove() {
        let state = make_state(60, 10);
        let controller = mounted_session(&state).await;
        let id = controller.session_id().to_string();
        assert_eq!(state.session_count(), 1);
        assert!(state.session(&id).is_ok());

        state.remove_session(&id).unwrap();
        assert_eq!(state.session_count(), 0);
        assert!(matches!(state.session(&id), Err(ApiError::NotFound(_))));
        assert!(matches!(state.remove_session(&id), Err(ApiError::NotFound(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_only_removes_idle_sessions() {
        let state = make_state(60, 10);
        let stale = mounted_session(&state).await;
        let fresh = mounted_session(&state).await;

        tokio::time::advance(Duration::from_secs(45)).await;
        state.session(fresh.session_id().as_str()).unwrap();
        assert_eq!(state.sweep_idle(Duration::from_secs(60)), 0);

        tokio::time::advance(Duration::from_secs(20)).await;
        assert_eq!(state.sweep_idle(Duration::from_secs(60)), 1);
        assert_eq!(state.session_count(), 1);
        assert!(state.session(stale.session_id().as_str()).is_err());
        assert!(state.session(fresh.session_id().as_str()).is_ok());
        assert_eq!(stale.view().state, ControllerState::Idle);
        assert_eq!(fresh.view().state, ControllerState::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_stream_keeps_session_alive() {
        let state = make_state(60, 10);
        let watched = mounted_session(&state).await;
        let _stream = watched.watch_transcript();

        tokio::time::advance(Duration::from_secs(120)).await;
        assert_eq!(state.sweep_idle(Duration::from_secs(60)), 0);
        assert_eq!(state.session_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_expires_abandoned_sessions() {
        let state = make_state(60, 10);
        let abandoned = mounted_session(&state).await;
        let active = mounted_session(&state).await;
        let sweeper = state.spawn_session_sweeper();

        for _ in 0..4 {
            tokio::time::sleep(Duration::from_secs(20)).await;
            state.session(active.session_id().as_str()).unwrap();
        }

        assert_eq!(state.session_count(), 1);
        assert!(state.session(abandoned.session_id().as_str()).is_err());
        assert_eq!(abandoned.view().state, ControllerState::Idle);
        sweeper.abort();
    }
}
