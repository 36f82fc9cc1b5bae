/// Records archive entries and a sled-backed reference archive
/// Frugal: JSON values keyed by save time plus a sled-issued sequence, no secondary indexes
use crate::chat_types::{ConversationId, UserId};
use crate::collaborators::RecordsCollaborator;
use crate::conversation::{Conversation, ConversationType};
use crate::error::{Result, WorkspaceError};
use crate::message::Message;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

const TRANSCRIPT_VERSION: u8 = 1;

/// A full conversation export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub version: u8,
    pub conversation_id: ConversationId,
    pub conversation_type: ConversationType,
    pub title: String,
    pub participant_ids: Vec<UserId>,
    pub exported_at: DateTime<Utc>,
    pub messages: Vec<Message>,
}

impl Transcript {
    pub fn from_conversation(conversation: &Conversation) -> Self {
        Self {
            version: TRANSCRIPT_VERSION,
            conversation_id: conversation.id().clone(),
            conversation_type: conversation.conversation_type(),
            title: conversation.title().to_string(),
            participant_ids: conversation.participant_ids().iter().cloned().collect(),
            exported_at: Utc::now(),
            messages: conversation.messages().to_vec(),
        }
    }

    /// Export transcript to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Load transcript from file
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read(path)?;
        let transcript: Transcript = serde_json::from_slice(&data)?;
        if transcript.version != TRANSCRIPT_VERSION {
            return Err(WorkspaceError::Storage(format!(
                "Unsupported transcript version: {}",
                transcript.version
            )));
        }
        Ok(transcript)
    }
}

/// What gets handed to the records collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordEntry {
    Message {
        conversation_id: ConversationId,
        conversation_title: String,
        message: Message,
        saved_by: UserId,
        saved_at: DateTime<Utc>,
    },
    Transcript {
        transcript: Transcript,
        saved_by: UserId,
        saved_at: DateTime<Utc>,
    },
}

impl RecordEntry {
    pub fn saved_at(&self) -> DateTime<Utc> {
        match self {
            RecordEntry::Message { saved_at, .. } | RecordEntry::Transcript { saved_at, .. } => {
                *saved_at
            }
        }
    }

    fn subject_id(&self) -> String {
        match self {
            RecordEntry::Message { message, .. } => message.id.to_string(),
            RecordEntry::Transcript { transcript, .. } => transcript.conversation_id.to_string(),
        }
    }
}

pub struct SledRecordsStore {
    db: sled::Db,
}

impl SledRecordsStore {
    /// Open (or create) the records archive
    pub fn new(data_dir: &Path) -> Result<Self> {
        let db_path = data_dir.join("records.db");
        let db = sled::open(&db_path)
            .map_err(|e| WorkspaceError::Storage(format!("Failed to open records DB: {}", e)))?;
        info!("Records store initialized at {:?}", db_path);
        Ok(Self { db })
    }

    /// Get most recent entries (last N), oldest first
    pub fn list_recent(&self, limit: usize) -> Result<Vec<RecordEntry>> {
        let mut entries = Vec::new();
        for item in self.db.iter().rev().take(limit) {
            let (_, value) = item.map_err(|e| {
                WorkspaceError::Storage(format!("Failed to read records: {}", e))
            })?;
            entries.push(serde_json::from_slice::<RecordEntry>(&value)?);
        }
        entries.reverse();
        Ok(entries)
    }

    pub fn count(&self) -> usize {
        self.db.len()
    }
}

impl RecordsCollaborator for SledRecordsStore {
    fn save(&self, entry: RecordEntry) -> Result<String> {
        // The sled-issued id keeps two saves within one millisecond apart
        let seq = self.db.generate_id().map_err(|e| {
            WorkspaceError::Storage(format!("Failed to allocate record id: {}", e))
        })?;
        let key = format!(
            "{:013}:{:020}:{}",
            entry.saved_at().timestamp_millis(),
            seq,
            entry.subject_id()
        );
        let value = serde_json::to_vec(&entry)?;
        self.db
            .insert(key.as_bytes(), value)
            .map_err(|e| WorkspaceError::Storage(format!("Failed to save record: {}", e)))?;
        self.db
            .flush()
            .map_err(|e| WorkspaceError::Storage(format!("Failed to flush records: {}", e)))?;
        debug!("Saved record {}", key);
        Ok(key)
    }
}

impl Clone for SledRecordsStore {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
        }
    }
}
