//! Per-session transcript view.
//!
//! The store pushes every message of a department, across sessions and in
//! arbitrary order. A [`Transcript`] is what one session actually shows.

use serde::Serialize;

use localsphere_core::types::{Department, Message, NewMessage, SessionId};

use crate::responder::GREETING;

/// Messages visible to one session in one department, oldest first.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Transcript {
    department: Department,
    messages: Vec<Message>,
}

impl Transcript {
    pub fn empty(department: Department) -> Self {
        Self {
            department,
            messages: Vec::new(),
        }
    }

    /// Keep only `session`'s messages for `department`, ordered by creation
    /// time. Ties keep delivery order.
    pub fn from_snapshot(docs: Vec<Message>, department: Department, session: &SessionId) -> Self {
        let mut messages: Vec<Message> = docs
            .into_iter()
            .filter(|m| m.department == department && &m.session_id == session)
            .collect();
        messages.sort_by_key(|m| m.created_at);
        Self {
            department,
            messages,
        }
    }

    pub fn department(&self) -> Department {
        self.department
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Opening assistant line for a department's empty transcript.
pub fn welcome_text(department: Department) -> String {
    match department.profile() {
        Some(profile) => format!("Welcome to the {} assistant.", profile.name),
        None => GREETING.to_string(),
    }
}

pub fn welcome_message(department: Department, session: SessionId) -> NewMessage {
    NewMessage::assistant(welcome_text(department), department, session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use localsphere_core::types::Role;
    use uuid::Uuid;

    fn msg(content: &str, dept: Department, session: &str, offset_ms: i64) -> Message {
        let base = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        Message {
            id: Uuid::new_v4(),
            role: Role::User,
            content: content.to_string(),
            data: None,
            department: dept,
            session_id: SessionId::new(session),
            created_at: base + Duration::milliseconds(offset_ms),
        }
    }

    fn contents(t: &Transcript) -> Vec<&str> {
        t.messages().iter().map(|m| m.content.as_str()).collect()
    }

    #[test]
    fn test_orders_shuffled_delivery() {
        let docs = vec![
            msg("third", Department::Tax, "s1", 30),
            msg("first", Department::Tax, "s1", 10),
            msg("second", Department::Tax, "s1", 20),
        ];
        let t = Transcript::from_snapshot(docs, Department::Tax, &SessionId::new("s1"));
        assert_eq!(contents(&t), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_excludes_other_sessions() {
        let docs = vec![
            msg("mine", Department::Tax, "s1", 10),
            msg("theirs", Department::Tax, "s2", 5),
        ];
        let t = Transcript::from_snapshot(docs, Department::Tax, &SessionId::new("s1"));
        assert_eq!(contents(&t), vec!["mine"]);
    }

    #[test]
    fn test_excludes_other_departments() {
        let docs = vec![
            msg("tax", Department::Tax, "s1", 10),
            msg("housing", Department::Housing, "s1", 20),
        ];
        let t = Transcript::from_snapshot(docs, Department::Housing, &SessionId::new("s1"));
        assert_eq!(contents(&t), vec!["housing"]);
        assert_eq!(t.department(), Department::Housing);
    }

    #[test]
    fn test_equal_timestamps_keep_delivery_order() {
        let docs = vec![
            msg("a", Department::Home, "s1", 0),
            msg("b", Department::Home, "s1", 0),
        ];
        let t = Transcript::from_snapshot(docs, Department::Home, &SessionId::new("s1"));
        assert_eq!(contents(&t), vec!["a", "b"]);
    }

    #[test]
    fn test_empty_transcript() {
        let t = Transcript::empty(Department::Vehicle);
        assert!(t.is_empty());
        assert_eq!(t.len(), 0);
        assert_eq!(t.department(), Department::Vehicle);
    }

    #[test]
    fn test_welcome_text_per_department() {
        assert_eq!(welcome_text(Department::Home), GREETING);
        assert_eq!(
            welcome_text(Department::Housing),
            format!("Welcome to the {} assistant.", Department::Housing.display_name())
        );
        for dept in Department::DESKS {
            assert!(welcome_text(dept).starts_with("Welcome to the "));
        }
    }

    #[test]
    fn test_welcome_message_is_assistant() {
        let m = welcome_message(Department::Tax, SessionId::new("s9"));
        assert_eq!(m.role, Role::Assistant);
        assert_eq!(m.department, Department::Tax);
        assert_eq!(m.session_id.as_str(), "s9");
        assert_eq!(m.data.as_ref().map(|d| d.text.as_str()), Some(m.content.as_str()));
    }
}
