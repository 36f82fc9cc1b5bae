/// Workspace: the registry of conversations and the entry point callers use
///
/// Each conversation is an independent unit of mutation behind its own lock
/// with its own insight worker; operations on different conversations never
/// contend. Collaborators are injected, never looked up globally.
use crate::attachment::Attachment;
use crate::chat_types::{
    ConversationId, ConversationSummary, InsightId, LinkedEntities, MessageId, TaskId, UserId,
    WorkspaceEvent,
};
use crate::collaborators::{
    InMemoryRecords, InMemoryTaskBoard, NoopNotifier, RecordsCollaborator, Roster, StaticRoster,
    TaskCollaborator, TaskRequest, UnreadNotifier,
};
use crate::config::Config;
use crate::conversation::{action_card, Appended, Conversation, NewConversation};
use crate::error::{Result, WorkspaceError};
use crate::extract::TaskDraft;
use crate::insight::{Insight, InsightAnalyzer, RandomAmbientSignal, RuleAnalyzer};
use crate::message::{Message, MessageKind, NewMessage};
use crate::records_store::{RecordEntry, Transcript};
use crate::scheduler::InsightScheduler;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info};

/// External systems the core talks to
#[derive(Clone)]
pub struct Collaborators {
    pub roster: Arc<dyn Roster>,
    pub tasks: Arc<dyn TaskCollaborator>,
    pub records: Arc<dyn RecordsCollaborator>,
    pub notifier: Arc<dyn UnreadNotifier>,
}

impl Collaborators {
    /// In-memory task board and records, no-op notifier
    pub fn in_memory(roster: StaticRoster) -> Self {
        Self {
            roster: Arc::new(roster),
            tasks: Arc::new(InMemoryTaskBoard::new()),
            records: Arc::new(InMemoryRecords::new()),
            notifier: Arc::new(NoopNotifier),
        }
    }
}

/// A message as submitted by a user
#[derive(Debug, Clone)]
pub struct SendMessage {
    pub sender_id: UserId,
    pub text: String,
    pub attachments: Vec<Attachment>,
    pub reply_to: Option<MessageId>,
    pub linked: LinkedEntities,
    /// Reject with `StaleVersion` unless the conversation is at this version
    pub expected_version: Option<u64>,
}

impl SendMessage {
    pub fn text(sender_id: impl Into<UserId>, text: impl Into<String>) -> Self {
        Self {
            sender_id: sender_id.into(),
            text: text.into(),
            attachments: Vec::new(),
            reply_to: None,
            linked: LinkedEntities::default(),
            expected_version: None,
        }
    }

    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }
}

/// A user's confirmation of a task draft
#[derive(Debug, Clone)]
pub struct TaskConfirmation {
    pub confirmed_by: UserId,
    pub draft: TaskDraft,
    pub source_message_id: MessageId,
}

struct ConversationEntry {
    state: Arc<RwLock<Conversation>>,
    scheduler: InsightScheduler,
}

#[derive(Clone)]
pub struct Workspace {
    config: Arc<Config>,
    collaborators: Collaborators,
    analyzer: Arc<dyn InsightAnalyzer>,
    conversations: Arc<RwLock<HashMap<ConversationId, Arc<ConversationEntry>>>>,
    events: broadcast::Sender<WorkspaceEvent>,
}

impl Workspace {
    /// Workspace with the keyword rule analyzer and a random ambient draw
    pub fn new(config: Config, collaborators: Collaborators) -> Result<Self> {
        let analyzer = RuleAnalyzer::new(Box::new(RandomAmbientSignal::new(
            config.general_insight_probability,
        )));
        Self::with_analyzer(config, collaborators, Arc::new(analyzer))
    }

    pub fn with_analyzer(
        config: Config,
        collaborators: Collaborators,
        analyzer: Arc<dyn InsightAnalyzer>,
    ) -> Result<Self> {
        config.validate()?;
        let (events, _) = broadcast::channel(config.event_capacity);
        Ok(Self {
            config: Arc::new(config),
            collaborators,
            analyzer,
            conversations: Arc::new(RwLock::new(HashMap::new())),
            events,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WorkspaceEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: WorkspaceEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    async fn entry(&self, id: &ConversationId) -> Result<Arc<ConversationEntry>> {
        self.conversations
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| WorkspaceError::not_found("conversation", id))
    }

    // ─── Conversation lifecycle ──────────────────────────────────────────────

    pub async fn create_conversation(&self, new: NewConversation) -> Result<ConversationId> {
        let id = ConversationId::generate();
        let conversation = Conversation::new(id.clone(), new)?;
        info!("Created conversation {} ({})", id, conversation.title());

        let state = Arc::new(RwLock::new(conversation));
        let scheduler = InsightScheduler::spawn(
            state.clone(),
            id.clone(),
            self.analyzer.clone(),
            self.config.insight_delay,
            self.events.clone(),
        );
        self.conversations
            .write()
            .await
            .insert(id.clone(), Arc::new(ConversationEntry { state, scheduler }));

        self.publish(WorkspaceEvent::ConversationCreated {
            conversation_id: id.clone(),
        });
        Ok(id)
    }

    /// Tear a conversation down: pending analysis is cancelled and the id
    /// stops resolving. Returns the final state.
    pub async fn archive_conversation(&self, id: &ConversationId) -> Result<Conversation> {
        let entry = self
            .conversations
            .write()
            .await
            .remove(id)
            .ok_or_else(|| WorkspaceError::not_found("conversation", id))?;

        let snapshot = {
            let mut conversation = entry.state.write().await;
            conversation.archive();
            entry.scheduler.cancel();
            conversation.clone()
        };
        info!("Archived conversation {}", id);
        self.publish(WorkspaceEvent::ConversationArchived {
            conversation_id: id.clone(),
        });
        Ok(snapshot)
    }

    pub async fn conversation(&self, id: &ConversationId) -> Result<Conversation> {
        let entry = self.entry(id).await?;
        let snapshot = entry.state.read().await.clone();
        Ok(snapshot)
    }

    /// Most recently active first
    pub async fn list_conversations(&self) -> Vec<ConversationSummary> {
        let entries: Vec<_> = self.conversations.read().await.values().cloned().collect();
        let mut summaries = Vec::with_capacity(entries.len());
        for entry in entries {
            summaries.push(entry.state.read().await.summary());
        }
        summaries.sort_by(|a, b| b.last_message_at.cmp(&a.last_message_at));
        summaries
    }

    // ─── Messages ────────────────────────────────────────────────────────────

    /// Append a message. Returns as soon as it is stored; insight analysis
    /// runs later on the conversation's worker.
    pub async fn send_message(
        &self,
        conversation_id: &ConversationId,
        send: SendMessage,
    ) -> Result<Message> {
        let new = NewMessage {
            sender_name: self.collaborators.roster.name_or_id(&send.sender_id),
            sender_id: send.sender_id,
            kind: MessageKind::Text,
            text: send.text,
            attachments: send.attachments,
            reply_to: send.reply_to,
            linked: send.linked,
        };
        self.append(conversation_id, new, send.expected_version).await
    }

    async fn append(
        &self,
        conversation_id: &ConversationId,
        new: NewMessage,
        expected_version: Option<u64>,
    ) -> Result<Message> {
        let entry = self.entry(conversation_id).await?;
        let appended = {
            let mut conversation = entry.state.write().await;
            self.append_locked(&entry, &mut conversation, new, expected_version)?
        };
        self.announce(conversation_id, &appended);
        Ok(appended.message)
    }

    /// Append while the caller holds the conversation's write lock
    fn append_locked(
        &self,
        entry: &ConversationEntry,
        conversation: &mut Conversation,
        new: NewMessage,
        expected_version: Option<u64>,
    ) -> Result<Appended> {
        if conversation.is_archived() {
            return Err(WorkspaceError::not_found("conversation", conversation.id()));
        }
        conversation.ensure_version(expected_version)?;
        let appended = conversation.append_message(new, self.config.preview_max_chars)?;

        // Queue under the lock so analysis order always matches append order
        let message = &appended.message;
        if message.kind == MessageKind::Text && !message.text.trim().is_empty() {
            entry
                .scheduler
                .schedule(message.id.clone(), message.text.clone());
        }
        Ok(appended)
    }

    fn announce(&self, conversation_id: &ConversationId, appended: &Appended) {
        for (user_id, unread) in &appended.unread {
            self.collaborators
                .notifier
                .unread_changed(conversation_id, user_id, *unread);
            self.publish(WorkspaceEvent::UnreadChanged {
                conversation_id: conversation_id.clone(),
                user_id: user_id.clone(),
                unread: *unread,
            });
        }
        self.publish(WorkspaceEvent::MessageAppended {
            message: appended.message.clone(),
        });
    }

    pub async fn toggle_reaction(
        &self,
        conversation_id: &ConversationId,
        message_id: &MessageId,
        emoji: &str,
        user_id: &UserId,
    ) -> Result<bool> {
        let entry = self.entry(conversation_id).await?;
        let added = entry
            .state
            .write()
            .await
            .toggle_reaction(message_id, emoji, user_id)?;
        self.publish(WorkspaceEvent::ReactionToggled {
            conversation_id: conversation_id.clone(),
            message_id: message_id.clone(),
            emoji: emoji.to_string(),
            user_id: user_id.clone(),
            added,
        });
        Ok(added)
    }

    pub async fn toggle_pin(
        &self,
        conversation_id: &ConversationId,
        message_id: &MessageId,
    ) -> Result<bool> {
        let entry = self.entry(conversation_id).await?;
        let pinned = entry.state.write().await.toggle_pin(message_id)?;
        self.publish(WorkspaceEvent::PinToggled {
            conversation_id: conversation_id.clone(),
            message_id: message_id.clone(),
            pinned,
        });
        Ok(pinned)
    }

    pub async fn mark_read(
        &self,
        conversation_id: &ConversationId,
        user_id: &UserId,
    ) -> Result<()> {
        let entry = self.entry(conversation_id).await?;
        entry.state.write().await.mark_read(user_id)?;
        self.collaborators
            .notifier
            .unread_changed(conversation_id, user_id, 0);
        self.publish(WorkspaceEvent::UnreadChanged {
            conversation_id: conversation_id.clone(),
            user_id: user_id.clone(),
            unread: 0,
        });
        Ok(())
    }

    pub async fn toggle_conversation_pin(
        &self,
        conversation_id: &ConversationId,
        user_id: &UserId,
    ) -> Result<bool> {
        let entry = self.entry(conversation_id).await?;
        let pinned = entry.state.write().await.toggle_conversation_pin(user_id)?;
        Ok(pinned)
    }

    pub async fn set_muted(
        &self,
        conversation_id: &ConversationId,
        user_id: &UserId,
        muted: bool,
    ) -> Result<()> {
        let entry = self.entry(conversation_id).await?;
        entry.state.write().await.set_muted(user_id, muted)?;
        Ok(())
    }

    // ─── Insights and tasks ──────────────────────────────────────────────────

    pub async fn insights(&self, conversation_id: &ConversationId) -> Result<Vec<Insight>> {
        let entry = self.entry(conversation_id).await?;
        let insights = entry.state.read().await.insights().to_vec();
        Ok(insights)
    }

    /// Consume an insight and return the task draft extracted from it
    pub async fn act_on_insight(
        &self,
        conversation_id: &ConversationId,
        insight_id: &InsightId,
    ) -> Result<(Insight, TaskDraft)> {
        let entry = self.entry(conversation_id).await?;
        let result = entry.state.write().await.act_on_insight(insight_id)?;
        debug!(
            "Insight {} in {} drafted \"{}\"",
            insight_id, conversation_id, result.1.title
        );
        Ok(result)
    }

    pub async fn dismiss_insight(
        &self,
        conversation_id: &ConversationId,
        insight_id: &InsightId,
    ) -> Result<Insight> {
        let entry = self.entry(conversation_id).await?;
        let insight = entry.state.write().await.dismiss_insight(insight_id)?;
        Ok(insight)
    }

    pub async fn draft_task_from_message(
        &self,
        conversation_id: &ConversationId,
        message_id: &MessageId,
    ) -> Result<TaskDraft> {
        let entry = self.entry(conversation_id).await?;
        let draft = entry.state.read().await.draft_task_from_message(message_id)?;
        Ok(draft)
    }

    /// Hand a confirmed draft to the task board, then acknowledge it in the
    /// conversation with an action card replying to the source message.
    ///
    /// Everything that could refuse the card is checked before the task board
    /// is called, and the lock is held until the card is in the log.
    pub async fn confirm_task(
        &self,
        conversation_id: &ConversationId,
        confirmation: TaskConfirmation,
    ) -> Result<(TaskId, Message)> {
        let entry = self.entry(conversation_id).await?;
        let (task_id, appended) = {
            let mut conversation = entry.state.write().await;
            if conversation.is_archived() {
                return Err(WorkspaceError::not_found("conversation", conversation_id));
            }
            conversation.ensure_participant(&confirmation.confirmed_by)?;
            let source = conversation.message(&confirmation.source_message_id)?;
            let request = TaskRequest {
                draft: confirmation.draft.clone(),
                source_message_id: source.id.clone(),
                source_conversation_id: conversation_id.clone(),
                source_preview_text: source.preview(self.config.preview_max_chars),
                source_sender_name: source.sender_name.clone(),
                created_by: confirmation.confirmed_by.clone(),
            };

            let task_id = self.collaborators.tasks.create_task(request)?;
            info!(
                "Task {} created from {} in {}",
                task_id, confirmation.source_message_id, conversation_id
            );

            let card = action_card(
                confirmation.confirmed_by.clone(),
                self.collaborators.roster.name_or_id(&confirmation.confirmed_by),
                &confirmation.draft,
                confirmation.source_message_id.clone(),
            );
            let appended = self.append_locked(&entry, &mut conversation, card, None)?;
            (task_id, appended)
        };
        self.announce(conversation_id, &appended);

        self.publish(WorkspaceEvent::TaskCreated {
            conversation_id: conversation_id.clone(),
            task_id: task_id.clone(),
            source_message_id: confirmation.source_message_id,
        });
        Ok((task_id, appended.message))
    }

    // ─── Records ─────────────────────────────────────────────────────────────

    pub async fn save_message_to_records(
        &self,
        conversation_id: &ConversationId,
        message_id: &MessageId,
        saved_by: &UserId,
    ) -> Result<String> {
        let entry = {
            let entry = self.entry(conversation_id).await?;
            let conversation = entry.state.read().await;
            let message = conversation.message(message_id)?.clone();
            RecordEntry::Message {
                conversation_id: conversation_id.clone(),
                conversation_title: conversation.title().to_string(),
                message,
                saved_by: saved_by.clone(),
                saved_at: Utc::now(),
            }
        };
        let record_id = self.collaborators.records.save(entry)?;
        info!("Saved {} to records as {}", message_id, record_id);
        Ok(record_id)
    }

    pub async fn save_transcript_to_records(
        &self,
        conversation_id: &ConversationId,
        saved_by: &UserId,
    ) -> Result<String> {
        let transcript = {
            let entry = self.entry(conversation_id).await?;
            let conversation = entry.state.read().await;
            Transcript::from_conversation(&conversation)
        };
        let record_id = self.collaborators.records.save(RecordEntry::Transcript {
            transcript,
            saved_by: saved_by.clone(),
            saved_at: Utc::now(),
        })?;
        info!(
            "Saved transcript of {} to records as {}",
            conversation_id, record_id
        );
        Ok(record_id)
    }
}
