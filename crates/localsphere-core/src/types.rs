use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PortalError;

// =============================================================================
// Enums
// =============================================================================

/// A portal department. Exactly one is active per session controller.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Department {
    /// Landing page; no department-specific hero content.
    #[default]
    Home,
    Tax,
    Vehicle,
    Benefits,
    Housing,
}

impl Department {
    /// Every department, landing page first.
    pub const ALL: [Department; 5] = [
        Department::Home,
        Department::Tax,
        Department::Vehicle,
        Department::Benefits,
        Department::Housing,
    ];

    /// Departments that have their own hero page, in navigation order.
    pub const DESKS: [Department; 4] = [
        Department::Tax,
        Department::Vehicle,
        Department::Benefits,
        Department::Housing,
    ];

    /// Stable identifier used in storage and on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Department::Home => "home",
            Department::Tax => "tax",
            Department::Vehicle => "vehicle",
            Department::Benefits => "benefits",
            Department::Housing => "housing",
        }
    }
}

impl fmt::Display for Department {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Department {
    type Err = PortalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "home" => Ok(Department::Home),
            "tax" => Ok(Department::Tax),
            "vehicle" => Ok(Department::Vehicle),
            "benefits" => Ok(Department::Benefits),
            "housing" => Ok(Department::Housing),
            _ => Err(PortalError::InvalidDepartment(s.to_string())),
        }
    }
}

/// Author of a chat message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl FromStr for Role {
    type Err = PortalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(PortalError::Serialization(format!("unknown role: {}", other))),
        }
    }
}

// =============================================================================
// Identifiers
// =============================================================================

/// Opaque per-load session token.
///
/// Generated once when a session controller is created and stable until it
/// is dropped. Never persisted as a standalone entity.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Application namespace, restricted to `[A-Za-z0-9_-]`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppId(String);

impl AppId {
    /// Namespace used when the hosting environment injects none.
    pub const FALLBACK: &'static str = "default-app-id";

    /// Build an app id, replacing every character outside `[A-Za-z0-9_-]`
    /// with `_`.
    pub fn sanitize(raw: &str) -> Self {
        let cleaned = raw
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        Self(cleaned)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for AppId {
    fn default() -> Self {
        Self(Self::FALLBACK.to_string())
    }
}

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Location of one user's message collection inside an app namespace.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CollectionPath {
    pub app_id: AppId,
    pub user_id: String,
}

impl CollectionPath {
    pub fn messages(app_id: AppId, user_id: impl Into<String>) -> Self {
        Self {
            app_id,
            user_id: user_id.into(),
        }
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "artifacts/{}/users/{}/messages",
            self.app_id, self.user_id
        )
    }
}

// =============================================================================
// Messages
// =============================================================================

/// Structured payload attached to assistant messages.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageData {
    pub text: String,
}

/// A message before the store has assigned its id and timestamp.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessage {
    pub role: Role,
    pub content: String,
    pub data: Option<MessageData>,
    pub department: Department,
    pub session_id: SessionId,
}

impl NewMessage {
    /// A user-authored message; carries no structured payload.
    pub fn user(content: impl Into<String>, department: Department, session_id: SessionId) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            data: None,
            department,
            session_id,
        }
    }

    /// An assistant message whose structured payload echoes its text.
    pub fn assistant(
        content: impl Into<String>,
        department: Department,
        session_id: SessionId,
    ) -> Self {
        let content = content.into();
        Self {
            role: Role::Assistant,
            data: Some(MessageData {
                text: content.clone(),
            }),
            content,
            department,
            session_id,
        }
    }
}

/// An immutable, stored chat message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    pub data: Option<MessageData>,
    pub department: Department,
    pub session_id: SessionId,
    /// Server-assigned, strictly increasing within one store.
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Text to render: the structured payload if present, else the raw content.
    pub fn display_text(&self) -> &str {
        self.data
            .as_ref()
            .map(|d| d.text.as_str())
            .unwrap_or(&self.content)
    }
}
