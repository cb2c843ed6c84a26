//! Newtype wrappers for identifiers to ensure type safety.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Create a new id from a string.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Generate a new random id.
            pub fn generate() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            /// Get the inner string reference.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume and return the inner string.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}

string_id! {
    /// Unique identifier for a workflow Run.
    ///
    /// Run ids are uuid-v4 strings; their lexicographic ordering on the
    /// derived `Ord` is only meaningful for equality and supersession
    /// bookkeeping together with run creation timestamps.
    RunId
}

string_id! {
    /// Identifier for a conversation (memory-store key).
    ConversationId
}

string_id! {
    /// Identifier for a team (broadcast-channel key).
    TeamId
}

string_id! {
    /// Unique identifier for a candidate profile.
    CandidateId
}

string_id! {
    /// Unique identifier for a progress event.
    EventId
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_id_generate() {
        let id1 = RunId::generate();
        let id2 = RunId::generate();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_id_display() {
        let id = ConversationId::new("conv-1");
        assert_eq!(format!("{}", id), "conv-1");
        assert_eq!(id.as_str(), "conv-1");
    }

    #[test]
    fn test_id_from_str() {
        let id: TeamId = "team-42".into();
        assert_eq!(id.into_inner(), "team-42");
    }
}
