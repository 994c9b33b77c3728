//! Session controller.
//!
//! One controller per visitor load. It owns the session id, the active
//! department, the widget flags and the draft input, and it drives the
//! identity provider, the responder and the message store.
//!
//! State machine:
//!
//! ```text
//! Idle --mount--> AwaitingAuth --user confirmed--> Ready --submit--> Sending
//!                      ^                             |  ^               |
//!                      +-------- user cleared -------+  +---- always ---+
//! ```
//!
//! The live transcript is published on a `watch` channel and replaced as a
//! whole on every snapshot. A department switch swaps the store
//! subscription; snapshots from the previous feed are discarded by
//! generation.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use localsphere_core::config::{ChatConfig, InjectedEnvironment};
use localsphere_core::types::{AppId, CollectionPath, Department, NewMessage, SessionId};
use localsphere_storage::{MessageStore, Subscription};

use crate::error::ChatError;
use crate::identity::{generate_token, IdentityProvider, User};
use crate::responder::{Reply, Responder};
use crate::transcript::{welcome_message, Transcript};

// =============================================================================
// Public types
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerState {
    Idle,
    AwaitingAuth,
    Ready,
    Sending,
}

/// Why a submit did nothing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Input was empty or whitespace only.
    EmptyInput,
    /// Input exceeded the configured maximum length.
    TooLong,
    /// No signed-in user yet.
    NoIdentity,
    /// A previous submit is still in flight.
    Busy,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Both messages were appended.
    Sent { reply: Reply },
    /// Rejected before anything was written.
    Skipped(SkipReason),
    /// A store write failed; the error was logged.
    Failed,
}

/// Point-in-time copy of the controller's observable state.
#[derive(Clone, Debug, Serialize)]
pub struct ControllerView {
    pub session_id: SessionId,
    pub state: ControllerState,
    pub department: Department,
    pub typing: bool,
    pub widget_open: bool,
    pub input: String,
    pub user: Option<User>,
}

/// Per-controller settings resolved at startup.
#[derive(Clone, Debug)]
pub struct SessionSettings {
    pub app_id: AppId,
    /// Custom token to sign in with; anonymous sign-in when `None`.
    pub auth_token: Option<String>,
    pub max_message_length: usize,
}

impl SessionSettings {
    pub fn from_environment(env: &InjectedEnvironment, chat: &ChatConfig) -> Self {
        Self {
            app_id: env.app_id.clone(),
            auth_token: env.auth_token.clone(),
            max_message_length: chat.max_message_length,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            app_id: AppId::default(),
            auth_token: None,
            max_message_length: ChatConfig::default().max_message_length,
        }
    }
}

// =============================================================================
// Controller
// =============================================================================

/// Handle to one chat session. Clones share the same session.
#[derive(Clone)]
pub struct SessionController {
    shared: Arc<Shared>,
}

struct Shared {
    session_id: SessionId,
    settings: SessionSettings,
    identity: Arc<dyn IdentityProvider>,
    store: Arc<dyn MessageStore>,
    responder: Arc<dyn Responder>,
    inner: Mutex<Inner>,
    transcript: watch::Sender<Transcript>,
}

struct Inner {
    state: ControllerState,
    user: Option<User>,
    department: Department,
    input: String,
    typing: bool,
    widget_open: bool,
    feed_generation: u64,
    feed_cancel: Option<CancellationToken>,
    mount_cancel: Option<CancellationToken>,
}

impl SessionController {
    /// Create an unmounted controller with a fresh session id.
    pub fn new(
        settings: SessionSettings,
        identity: Arc<dyn IdentityProvider>,
        store: Arc<dyn MessageStore>,
        responder: Arc<dyn Responder>,
    ) -> Self {
        let session_id = SessionId::new(generate_token());
        let (transcript, _) = watch::channel(Transcript::empty(Department::default()));
        let shared = Shared {
            session_id,
            settings,
            identity,
            store,
            responder,
            inner: Mutex::new(Inner {
                state: ControllerState::Idle,
                user: None,
                department: Department::default(),
                input: String::new(),
                typing: false,
                widget_open: false,
                feed_generation: 0,
                feed_cancel: None,
                mount_cancel: None,
            }),
            transcript,
        };
        Self {
            shared: Arc::new(shared),
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.shared.session_id
    }

    /// Start listening for identity changes and sign in.
    ///
    /// Uses the configured custom token when present, anonymous sign-in
    /// otherwise. On failure the controller stays in `AwaitingAuth`.
    pub async fn mount(&self) -> Result<(), ChatError> {
        let cancel = {
            let mut inner = self.shared.lock();
            if inner.state != ControllerState::Idle {
                return Err(ChatError::AlreadyMounted);
            }
            inner.state = ControllerState::AwaitingAuth;
            let cancel = CancellationToken::new();
            inner.mount_cancel = Some(cancel.clone());
            cancel
        };
        self.spawn_identity_listener(cancel);

        let identity = &self.shared.identity;
        let result = match self.shared.settings.auth_token.as_deref() {
            Some(token) => identity.sign_in_with_custom_token(token).await,
            None => identity.sign_in_anonymously().await,
        };

        match result {
            Ok(user) => {
                info!(session = %self.shared.session_id, uid = %user.uid, "Session mounted");
                self.shared.apply_user(Some(user));
                Ok(())
            }
            Err(e) => {
                error!(session = %self.shared.session_id, error = %e, "Sign-in failed");
                Err(e)
            }
        }
    }

    /// Stop all background work and return to `Idle`.
    pub fn unmount(&self) {
        let mut inner = self.shared.lock();
        if let Some(cancel) = inner.mount_cancel.take() {
            cancel.cancel();
        }
        if let Some(cancel) = inner.feed_cancel.take() {
            cancel.cancel();
        }
        inner.feed_generation += 1;
        inner.user = None;
        inner.typing = false;
        inner.state = ControllerState::Idle;
        debug!(session = %self.shared.session_id, "Session unmounted");
    }

    fn spawn_identity_listener(&self, cancel: CancellationToken) {
        let mut users = self.shared.identity.watch();
        let weak = Arc::downgrade(&self.shared);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    changed = users.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let user = users.borrow_and_update().clone();
                        let Some(shared) = weak.upgrade() else { break };
                        shared.apply_user(user);
                    }
                }
            }
        });
    }

    // ---- Input and widget ----

    pub fn set_input(&self, text: impl Into<String>) {
        self.shared.lock().input = text.into();
    }

    pub fn input(&self) -> String {
        self.shared.lock().input.clone()
    }

    pub fn open_widget(&self) {
        self.shared.lock().widget_open = true;
    }

    pub fn close_widget(&self) {
        self.shared.lock().widget_open = false;
    }

    // ---- Department ----

    pub fn department(&self) -> Department {
        self.shared.lock().department
    }

    /// Make `department` active and swap the live feed over to it.
    ///
    /// Input and typing flag are left as they are. Selecting the active
    /// department is a no-op.
    pub fn select_department(&self, department: Department) {
        let mut inner = self.shared.lock();
        if inner.department == department {
            return;
        }
        debug!(
            session = %self.shared.session_id,
            from = %inner.department,
            to = %department,
            "Department switched"
        );
        inner.department = department;
        self.shared.resubscribe(&mut inner);
    }

    // ---- Observation ----

    pub fn view(&self) -> ControllerView {
        let inner = self.shared.lock();
        ControllerView {
            session_id: self.shared.session_id.clone(),
            state: inner.state,
            department: inner.department,
            typing: inner.typing,
            widget_open: inner.widget_open,
            input: inner.input.clone(),
            user: inner.user.clone(),
        }
    }

    pub fn transcript(&self) -> Transcript {
        self.shared.transcript.borrow().clone()
    }

    pub fn watch_transcript(&self) -> watch::Receiver<Transcript> {
        self.shared.transcript.subscribe()
    }

    /// True while any transcript receiver is alive, e.g. an open stream.
    pub fn has_observers(&self) -> bool {
        self.shared.transcript.receiver_count() > 0
    }

    // ---- Sending ----

    /// Send the current input.
    ///
    /// The input box is cleared before any write. The user message and the
    /// reply are both filed under the department active at submit time.
    pub async fn submit(&self) -> SubmitOutcome {
        let shared = &*self.shared;
        let (text, department, path) = {
            let mut inner = shared.lock();
            if inner.input.trim().is_empty() {
                return SubmitOutcome::Skipped(SkipReason::EmptyInput);
            }
            if inner.input.chars().count() > shared.settings.max_message_length {
                return SubmitOutcome::Skipped(SkipReason::TooLong);
            }
            let Some(user) = inner.user.as_ref() else {
                return SubmitOutcome::Skipped(SkipReason::NoIdentity);
            };
            if inner.state == ControllerState::Sending {
                return SubmitOutcome::Skipped(SkipReason::Busy);
            }
            let path = CollectionPath::messages(shared.settings.app_id.clone(), user.uid.clone());
            let text = std::mem::take(&mut inner.input);
            inner.state = ControllerState::Sending;
            inner.typing = true;
            (text, inner.department, path)
        };

        let _sending = SendingGuard { shared };
        match shared.send(text, department, &path).await {
            Ok(reply) => SubmitOutcome::Sent { reply },
            Err(e) => {
                warn!(session = %shared.session_id, department = %department, error = %e, "Send failed");
                SubmitOutcome::Failed
            }
        }
    }
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("session_id", &self.shared.session_id)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Shared internals
// =============================================================================

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// React to an identity change.
    ///
    /// The feed is only rebuilt when the uid actually changes.
    fn apply_user(self: &Arc<Self>, user: Option<User>) {
        let mut inner = self.lock();
        if inner.state == ControllerState::Idle {
            return;
        }
        match user {
            Some(user) => {
                let changed = inner.user.as_ref().map(|u| u.uid.as_str()) != Some(user.uid.as_str());
                inner.user = Some(user);
                if inner.state == ControllerState::AwaitingAuth {
                    inner.state = ControllerState::Ready;
                }
                if changed {
                    self.resubscribe(&mut inner);
                }
            }
            None => {
                inner.user = None;
                if inner.state == ControllerState::Ready {
                    inner.state = ControllerState::AwaitingAuth;
                }
                if let Some(cancel) = inner.feed_cancel.take() {
                    cancel.cancel();
                }
                inner.feed_generation += 1;
                self.transcript.send_replace(Transcript::empty(inner.department));
            }
        }
    }

    /// Replace the live feed with one for the current user and department.
    fn resubscribe(self: &Arc<Self>, inner: &mut Inner) {
        if let Some(cancel) = inner.feed_cancel.take() {
            cancel.cancel();
        }
        inner.feed_generation += 1;
        self.transcript.send_replace(Transcript::empty(inner.department));

        let (Some(user), Some(mount)) = (inner.user.as_ref(), inner.mount_cancel.as_ref()) else {
            return;
        };
        let path = CollectionPath::messages(self.settings.app_id.clone(), user.uid.clone());
        let department = inner.department;
        let cancel = mount.child_token();
        inner.feed_cancel = Some(cancel.clone());

        let feed = Feed {
            shared: Arc::downgrade(self),
            subscription: self.store.subscribe(&path, department),
            path,
            department,
            generation: inner.feed_generation,
            cancel,
        };
        tokio::spawn(feed.run());
    }

    /// Publish a transcript if `generation` is still the live feed.
    fn publish(&self, generation: u64, transcript: Transcript) -> bool {
        let inner = self.lock();
        if inner.feed_generation != generation {
            return false;
        }
        self.transcript.send_replace(transcript);
        true
    }

    async fn send(
        &self,
        text: String,
        department: Department,
        path: &CollectionPath,
    ) -> Result<Reply, ChatError> {
        let user_message = NewMessage::user(text.clone(), department, self.session_id.clone());
        self.store.append(path, user_message).await?;

        let reply = self.responder.respond(&text, department).await;

        let assistant = NewMessage::assistant(reply.text.clone(), department, self.session_id.clone());
        self.store.append(path, assistant).await?;
        debug!(session = %self.session_id, intent = ?reply.intent, "Reply stored");
        Ok(reply)
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let inner = self.inner.get_mut().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(cancel) = inner.mount_cancel.take() {
            cancel.cancel();
        }
        if let Some(cancel) = inner.feed_cancel.take() {
            cancel.cancel();
        }
    }
}

/// Clears the typing flag and leaves `Sending` when a submit ends, however
/// it ends.
struct SendingGuard<'a> {
    shared: &'a Shared,
}

impl Drop for SendingGuard<'_> {
    fn drop(&mut self) {
        let mut inner = self.shared.lock();
        inner.typing = false;
        if inner.state == ControllerState::Sending {
            inner.state = if inner.user.is_some() {
                ControllerState::Ready
            } else {
                ControllerState::AwaitingAuth
            };
        }
    }
}

// =============================================================================
// Live feed
// =============================================================================

/// Consumes one store subscription and turns snapshots into transcripts.
struct Feed {
    shared: Weak<Shared>,
    subscription: Subscription,
    path: CollectionPath,
    department: Department,
    generation: u64,
    cancel: CancellationToken,
}

impl Feed {
    async fn run(mut self) {
        let mut welcomed = false;
        loop {
            let snapshot = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                snapshot = self.subscription.next() => match snapshot {
                    Some(snapshot) => snapshot,
                    None => break,
                },
            };
            let Some(shared) = self.shared.upgrade() else { break };

            let transcript =
                Transcript::from_snapshot(snapshot.docs, self.department, &shared.session_id);
            if transcript.is_empty() {
                // The welcome append triggers the next snapshot.
                if !welcomed {
                    welcomed = true;
                    let welcome = welcome_message(self.department, shared.session_id.clone());
                    if let Err(e) = shared.store.append(&self.path, welcome).await {
                        warn!(
                            session = %shared.session_id,
                            department = %self.department,
                            error = %e,
                            "Welcome message not stored"
                        );
                    }
                }
                continue;
            }

            if !shared.publish(self.generation, transcript) {
                break;
            }
        }
        self.subscription.cancel();
        debug!(collection = %self.path, department = %self.department, "Feed stopped");
    }
}

// =============================================================================
// Tests
// =============================================================================
