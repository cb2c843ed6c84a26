//! Messages carried on the per-team push channel.

use crate::event::ProgressEvent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A message on the team channel, distinguished by its `type` tag.
///
/// The channel is bidirectional: clients send `Chat`; the server relays
/// chat to every member and injects `System` notifications from the
/// orchestrator plus join/leave markers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TeamMessage {
    /// A chat message from a team member.
    Chat {
        message: String,
        timestamp: DateTime<Utc>,
    },
    /// An orchestrator-originated progress notification.
    System { event: ProgressEvent },
    /// A member joined; `active` is the connection count after the join.
    UserJoined { active: usize },
    /// A member left; `active` is the connection count after the leave.
    UserLeft { active: usize },
}

impl TeamMessage {
    /// Wrap client-provided text as a chat message stamped now.
    pub fn chat(message: impl Into<String>) -> Self {
        TeamMessage::Chat {
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    /// Wrap a progress event as a system notification.
    pub fn system(event: ProgressEvent) -> Self {
        TeamMessage::System { event }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::RunId;
    use crate::status::Stage;

    #[test]
    fn test_type_tags() {
        let chat = serde_json::to_value(TeamMessage::chat("hello team")).unwrap();
        assert_eq!(chat["type"], "chat");
        assert_eq!(chat["message"], "hello team");

        let event = ProgressEvent::stage_started(RunId::generate(), Stage::Crystallize);
        let system = serde_json::to_value(TeamMessage::system(event)).unwrap();
        assert_eq!(system["type"], "system");
        assert_eq!(system["event"]["event_type"], "stage_started");
    }

    #[test]
    fn test_roundtrip() {
        let joined = TeamMessage::UserJoined { active: 3 };
        let json = serde_json::to_string(&joined).unwrap();
        let back: TeamMessage = serde_json::from_str(&json).unwrap();
        match back {
            TeamMessage::UserJoined { active } => assert_eq!(active, 3),
            other => panic!("unexpected variant: {:?}", other),
        }
    }
}
