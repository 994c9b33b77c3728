//! Live message store.
//!
//! [`MessageStore`] is the seam between the chat session controller and the
//! backing document store: append-only writes plus push-based subscriptions
//! that deliver the department-filtered document set after every change.

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use localsphere_core::error::PortalError;
use localsphere_core::types::{CollectionPath, Department, Message, NewMessage};

use crate::repository::MessageRepository;

/// One push from a live subscription.
///
/// `docs` holds every message of the subscribed department in the
/// collection, across all sessions, in no guaranteed order.
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    pub docs: Vec<Message>,
}

/// Handle to a live query.
///
/// Snapshots stop once [`Subscription::cancel`] is called or the handle is
/// dropped.
#[derive(Debug)]
pub struct Subscription {
    receiver: mpsc::Receiver<Snapshot>,
    cancel: CancellationToken,
}

impl Subscription {
    pub fn new(receiver: mpsc::Receiver<Snapshot>, cancel: CancellationToken) -> Self {
        Self { receiver, cancel }
    }

    /// Wait for the next snapshot. Returns `None` once cancelled or closed.
    pub async fn next(&mut self) -> Option<Snapshot> {
        if self.cancel.is_cancelled() {
            return None;
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            snapshot = self.receiver.recv() => snapshot,
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Append-only store with live, department-filtered queries.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist a message; the store assigns its id and timestamp.
    async fn append(&self, path: &CollectionPath, message: NewMessage)
        -> Result<Message, PortalError>;

    /// Start a live query over one department of a collection.
    ///
    /// The first snapshot reflects the current contents; a new one follows
    /// every append to the same collection and department. Must be called
    /// from within a tokio runtime.
    fn subscribe(&self, path: &CollectionPath, department: Department) -> Subscription;
}

#[derive(Clone, Debug)]
struct ChangeNotice {
    path: CollectionPath,
    department: Department,
}

/// SQLite-backed [`MessageStore`].
///
/// Appends are broadcast as change notices; each subscription runs a task
/// that re-queries its department whenever a matching notice arrives.
pub struct SqliteMessageStore {
    repository: MessageRepository,
    changes: broadcast::Sender<ChangeNotice>,
    buffer: usize,
}

impl SqliteMessageStore {
    /// Create a store; `buffer` bounds pending snapshots per subscription.
    pub fn new(repository: MessageRepository, buffer: usize) -> Self {
        let (changes, _) = broadcast::channel(256);
        Self {
            repository,
            changes,
            buffer: buffer.max(1),
        }
    }

    pub fn repository(&self) -> &MessageRepository {
        &self.repository
    }
}

#[async_trait]
impl MessageStore for SqliteMessageStore {
    async fn append(
        &self,
        path: &CollectionPath,
        message: NewMessage,
    ) -> Result<Message, PortalError> {
        let department = message.department;
        let stored = self.repository.insert(path, message)?;
        debug!(
            collection = %path,
            department = %department,
            role = stored.role.as_str(),
            "Message appended"
        );
        // No live subscribers is not an error.
        let _ = self.changes.send(ChangeNotice {
            path: path.clone(),
            department,
        });
        Ok(stored)
    }

    fn subscribe(&self, path: &CollectionPath, department: Department) -> Subscription {
        let (tx, rx) = mpsc::channel(self.buffer);
        let cancel = CancellationToken::new();
        // Listen before the first query so no append falls in between.
        let mut changes = self.changes.subscribe();
        let repository = self.repository.clone();
        let path = path.clone();
        let token = cancel.clone();

        tokio::spawn(async move {
            if !deliver(&repository, &path, department, &tx).await {
                return;
            }
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    notice = changes.recv() => match notice {
                        Ok(n) if n.path == path && n.department == department => {
                            if !deliver(&repository, &path, department, &tx).await {
                                break;
                            }
                        }
                        Ok(_) => {}
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped, collection = %path, "Change feed lagged; re-querying");
                            if !deliver(&repository, &path, department, &tx).await {
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
            debug!(collection = %path, department = %department, "Subscription closed");
        });

        Subscription::new(rx, cancel)
    }
}

/// Query and push one snapshot. Returns `false` once the subscriber is gone.
///
/// Read failures are logged and skipped; the subscription stays open.
async fn deliver(
    repository: &MessageRepository,
    path: &CollectionPath,
    department: Department,
    tx: &mpsc::Sender<Snapshot>,
) -> bool {
    match repository.find_by_department(path, department) {
        Ok(docs) => tx.send(Snapshot { docs }).await.is_ok(),
        Err(e) => {
            error!(error = %e, collection = %path, department = %department, "Snapshot query failed");
            !tx.is_closed()
        }
    }
}
