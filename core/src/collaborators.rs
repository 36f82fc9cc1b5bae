/// Interfaces to systems outside the messaging core
///
/// The workspace never reaches for ambient globals: the roster, the task
/// board, the records archive and the unread notifier are injected at
/// construction. In-memory implementations live here for the demo binaries
/// and tests.
use crate::chat_types::{ConversationId, MessageId, TaskId, UserId};
use crate::error::{Result, WorkspaceError};
use crate::extract::TaskDraft;
use crate::records_store::RecordEntry;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// Read-only lookup of display names keyed by user id
pub trait Roster: Send + Sync {
    fn display_name(&self, user_id: &UserId) -> Option<String>;

    fn name_or_id(&self, user_id: &UserId) -> String {
        self.display_name(user_id)
            .unwrap_or_else(|| user_id.to_string())
    }
}

/// Everything the task board receives when a user confirms a draft
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRequest {
    pub draft: TaskDraft,
    pub source_message_id: MessageId,
    pub source_conversation_id: ConversationId,
    pub source_preview_text: String,
    pub source_sender_name: String,
    pub created_by: UserId,
}

pub trait TaskCollaborator: Send + Sync {
    /// Persist the task and return its durable id
    fn create_task(&self, request: TaskRequest) -> Result<TaskId>;
}

pub trait RecordsCollaborator: Send + Sync {
    /// Returns the record id assigned by the archive
    fn save(&self, entry: RecordEntry) -> Result<String>;
}

/// Hook fired whenever a participant's unread counter changes
pub trait UnreadNotifier: Send + Sync {
    fn unread_changed(&self, conversation_id: &ConversationId, user_id: &UserId, unread: u32);
}

// ─── Reference implementations ───────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct StaticRoster {
    names: HashMap<UserId, String>,
}

impl StaticRoster {
    pub fn new<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<UserId>,
        V: Into<String>,
    {
        Self {
            names: entries
                .into_iter()
                .map(|(id, name)| (id.into(), name.into()))
                .collect(),
        }
    }

    pub fn insert(&mut self, user_id: impl Into<UserId>, name: impl Into<String>) {
        self.names.insert(user_id.into(), name.into());
    }
}

impl Roster for StaticRoster {
    fn display_name(&self, user_id: &UserId) -> Option<String> {
        self.names.get(user_id).cloned()
    }
}

/// Keeps every request it receives; ids are `task_{uuid}`
#[derive(Debug, Default)]
pub struct InMemoryTaskBoard {
    tasks: Mutex<Vec<(TaskId, TaskRequest)>>,
}

impl InMemoryTaskBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tasks(&self) -> Vec<(TaskId, TaskRequest)> {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl TaskCollaborator for InMemoryTaskBoard {
    fn create_task(&self, request: TaskRequest) -> Result<TaskId> {
        let id = TaskId(format!("task_{}", uuid::Uuid::new_v4().simple()));
        debug!(
            "Task board stored {} ({} subtasks) from {}",
            id,
            request.draft.subtasks.len(),
            request.source_message_id
        );
        self.tasks
            .lock()
            .map_err(|_| WorkspaceError::Collaborator("task board lock poisoned".to_string()))?
            .push((id.clone(), request));
        Ok(id)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryRecords {
    entries: Mutex<Vec<RecordEntry>>,
}

impl InMemoryRecords {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<RecordEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl RecordsCollaborator for InMemoryRecords {
    fn save(&self, entry: RecordEntry) -> Result<String> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| WorkspaceError::Collaborator("records lock poisoned".to_string()))?;
        entries.push(entry);
        Ok(format!("rec_{}", entries.len()))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl UnreadNotifier for NoopNotifier {
    fn unread_changed(&self, _conversation_id: &ConversationId, _user_id: &UserId, _unread: u32) {}
}
