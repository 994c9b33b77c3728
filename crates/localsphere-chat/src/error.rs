//! Error types for the chat widget engine.

use localsphere_core::error::PortalError;

/// Errors from the chat engine.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("identity provider error: {0}")]
    Identity(String),
    #[error("custom token rejected: {0}")]
    InvalidToken(String),
    #[error("session controller already mounted")]
    AlreadyMounted,
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<PortalError> for ChatError {
    fn from(err: PortalError) -> Self {
        match err {
            PortalError::Identity(msg) => ChatError::Identity(msg),
            other => ChatError::Storage(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_error_display() {
        assert_eq!(
            ChatError::Identity("offline".into()).to_string(),
            "identity provider error: offline"
        );
        assert_eq!(
            ChatError::InvalidToken("blank".into()).to_string(),
            "custom token rejected: blank"
        );
        assert_eq!(
            ChatError::AlreadyMounted.to_string(),
            "session controller already mounted"
        );
        assert_eq!(
            ChatError::Storage("disk full".into()).to_string(),
            "storage error: disk full"
        );
    }

    #[test]
    fn test_chat_error_from_portal_storage() {
        let err: ChatError = PortalError::Storage("connection lost".into()).into();
        assert!(matches!(err, ChatError::Storage(_)));
        assert!(err.to_string().contains("connection lost"));
    }

    #[test]
    fn test_chat_error_from_portal_identity() {
        let err: ChatError = PortalError::Identity("expired".into()).into();
        assert!(matches!(err, ChatError::Identity(ref m) if m == "expired"));
    }
}
