/// Messages and the per-conversation append-only log
use crate::attachment::Attachment;
use crate::chat_types::{ConversationId, LinkedEntities, MessageId, UserId};
use crate::error::{Result, WorkspaceError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    ActionCard,
    SystemInsight,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    pub sender_name: String,
    pub kind: MessageKind,
    pub text: String,
    /// Insertion order == display order
    pub attachments: Vec<Attachment>,
    /// emoji -> voters; never holds an empty set
    pub reactions: BTreeMap<String, BTreeSet<UserId>>,
    pub pinned: bool,
    pub reply_to: Option<MessageId>,
    pub linked: LinkedEntities,
    pub created_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
    pub version: u64,
}

impl Message {
    /// Add or remove `user_id` under `emoji`. Returns true if the reaction
    /// is now present.
    pub fn toggle_reaction(&mut self, emoji: &str, user_id: &UserId) -> bool {
        let added = if let Some(voters) = self.reactions.get_mut(emoji) {
            if voters.remove(user_id) {
                if voters.is_empty() {
                    self.reactions.remove(emoji);
                }
                false
            } else {
                voters.insert(user_id.clone());
                true
            }
        } else {
            self.reactions
                .insert(emoji.to_string(), BTreeSet::from([user_id.clone()]));
            true
        };
        self.version += 1;
        added
    }

    pub fn toggle_pin(&mut self) -> bool {
        self.pinned = !self.pinned;
        self.version += 1;
        self.pinned
    }

    pub fn reaction_count(&self, emoji: &str) -> usize {
        self.reactions.get(emoji).map_or(0, BTreeSet::len)
    }

    /// Text, or `[type] title` of the first attachment when there is none
    pub fn preview(&self, max_chars: usize) -> String {
        let raw = if self.text.trim().is_empty() {
            self.attachments
                .first()
                .map(Attachment::label)
                .unwrap_or_default()
        } else {
            self.text.clone()
        };
        raw.chars().take(max_chars).collect()
    }
}

/// What a caller supplies to append a message; the log fills in the rest
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub sender_id: UserId,
    pub sender_name: String,
    pub kind: MessageKind,
    pub text: String,
    pub attachments: Vec<Attachment>,
    pub reply_to: Option<MessageId>,
    pub linked: LinkedEntities,
}

/// Append-only, ordered message sequence for one conversation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageLog {
    messages: Vec<Message>,
    next_seq: u64,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(
        &mut self,
        conversation_id: &ConversationId,
        new: NewMessage,
    ) -> Result<&Message> {
        if new.text.is_empty() && new.attachments.is_empty() {
            return Err(WorkspaceError::EmptyMessage);
        }
        if let Some(parent) = &new.reply_to {
            self.get(parent)?;
        }

        // Clamp so ids and timestamps never run backwards even if the wall clock does
        let now = Utc::now();
        let created_at = match self.messages.last() {
            Some(last) if last.created_at > now => last.created_at,
            _ => now,
        };
        self.next_seq += 1;

        self.messages.push(Message {
            id: MessageId::sequenced(created_at, self.next_seq),
            conversation_id: conversation_id.clone(),
            sender_id: new.sender_id,
            sender_name: new.sender_name,
            kind: new.kind,
            text: new.text,
            attachments: new.attachments,
            reactions: BTreeMap::new(),
            pinned: false,
            reply_to: new.reply_to,
            linked: new.linked,
            created_at,
            edited_at: None,
            version: 1,
        });
        let last = self.messages.len() - 1;
        Ok(&self.messages[last])
    }

    pub fn get(&self, id: &MessageId) -> Result<&Message> {
        self.messages
            .iter()
            .find(|m| &m.id == id)
            .ok_or_else(|| WorkspaceError::not_found("message", id))
    }

    pub fn get_mut(&mut self, id: &MessageId) -> Result<&mut Message> {
        self.messages
            .iter_mut()
            .find(|m| &m.id == id)
            .ok_or_else(|| WorkspaceError::not_found("message", id))
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn pinned(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| m.pinned)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
