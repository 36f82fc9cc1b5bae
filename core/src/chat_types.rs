/// Shared types for the messaging core: identifiers, entity links, list
/// summaries and the event stream.
use crate::insight::Insight;
use crate::message::Message;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id!(
    /// Identity of a workspace member, as known to the roster
    UserId
);
string_id!(ConversationId);
string_id!(
    /// Time-ordered: `msg_{millis:013}_{seq:020}`, so lexical order == append order
    MessageId
);
string_id!(AttachmentId);
string_id!(InsightId);
string_id!(
    /// Durable id assigned by the external task collaborator
    TaskId
);

impl ConversationId {
    pub fn generate() -> Self {
        Self(format!("conv_{}", uuid::Uuid::new_v4().simple()))
    }
}

impl AttachmentId {
    pub fn generate() -> Self {
        Self(format!("att_{}", uuid::Uuid::new_v4().simple()))
    }
}

impl InsightId {
    pub fn generate() -> Self {
        Self(format!("ins_{}", uuid::Uuid::new_v4().simple()))
    }
}

impl MessageId {
    pub fn sequenced(at: DateTime<Utc>, seq: u64) -> Self {
        Self(format!("msg_{:013}_{:020}", at.timestamp_millis(), seq))
    }
}

/// Optional references to records owned by other systems
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedEntities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
}

impl LinkedEntities {
    pub fn is_empty(&self) -> bool {
        self.project_id.is_none()
            && self.client_id.is_none()
            && self.task_id.is_none()
            && self.record_id.is_none()
    }
}

/// Summary of one conversation (for list views)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub conversation_id: ConversationId,
    pub title: String,
    pub last_message_preview: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub pending_insights: usize,
    pub version: u64,
}

/// Events published on the workspace broadcast channel
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkspaceEvent {
    ConversationCreated {
        conversation_id: ConversationId,
    },
    /// Pending analysis for the conversation was cancelled
    ConversationArchived {
        conversation_id: ConversationId,
    },
    MessageAppended {
        message: Message,
    },
    /// Deferred analysis produced an insight
    InsightAdded {
        conversation_id: ConversationId,
        insight: Insight,
    },
    ReactionToggled {
        conversation_id: ConversationId,
        message_id: MessageId,
        emoji: String,
        user_id: UserId,
        added: bool,
    },
    PinToggled {
        conversation_id: ConversationId,
        message_id: MessageId,
        pinned: bool,
    },
    UnreadChanged {
        conversation_id: ConversationId,
        user_id: UserId,
        unread: u32,
    },
    TaskCreated {
        conversation_id: ConversationId,
        task_id: TaskId,
        source_message_id: MessageId,
    },
}
