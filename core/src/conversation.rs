/// Conversation aggregate: owns the message log, the active insight list and
/// per-user preferences for one conversation. Every mutation is synchronous
/// and bumps `version`.
use crate::chat_types::{
    ConversationId, ConversationSummary, InsightId, LinkedEntities, MessageId, UserId,
};
use crate::error::{Result, WorkspaceError};
use crate::extract::{extract_task, TaskDraft};
use crate::insight::{Insight, InsightCandidate};
use crate::message::{Message, MessageKind, MessageLog, NewMessage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationType {
    Dm,
    Channel,
    Project,
    System,
}

#[derive(Debug, Clone)]
pub struct NewConversation {
    pub conversation_type: ConversationType,
    pub title: String,
    pub subtitle: Option<String>,
    pub participant_ids: Vec<UserId>,
    pub linked: LinkedEntities,
}

/// Result of a successful append
#[derive(Debug, Clone)]
pub struct Appended {
    pub message: Message,
    /// Participants whose unread counter moved, with the new value
    pub unread: Vec<(UserId, u32)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    id: ConversationId,
    conversation_type: ConversationType,
    title: String,
    subtitle: Option<String>,
    participant_ids: BTreeSet<UserId>,
    linked: LinkedEntities,
    last_message_at: Option<DateTime<Utc>>,
    last_message_preview: Option<String>,
    unread_by_user: BTreeMap<UserId, u32>,
    pinned_by_user: BTreeSet<UserId>,
    muted_by_user: BTreeSet<UserId>,
    log: MessageLog,
    insights: Vec<Insight>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: u64,
    archived: bool,
}

impl Conversation {
    pub fn new(id: ConversationId, new: NewConversation) -> Result<Self> {
        if new.title.trim().is_empty() {
            return Err(WorkspaceError::validation("title", "required"));
        }
        let participant_ids: BTreeSet<UserId> = new.participant_ids.into_iter().collect();
        if participant_ids.is_empty() {
            return Err(WorkspaceError::validation(
                "participant_ids",
                "at least one participant required",
            ));
        }
        if new.conversation_type == ConversationType::Dm && participant_ids.len() != 2 {
            return Err(WorkspaceError::validation(
                "participant_ids",
                "a direct message has exactly two participants",
            ));
        }

        let now = Utc::now();
        Ok(Self {
            id,
            conversation_type: new.conversation_type,
            title: new.title.trim().to_string(),
            subtitle: new.subtitle,
            unread_by_user: participant_ids.iter().map(|u| (u.clone(), 0)).collect(),
            participant_ids,
            linked: new.linked,
            last_message_at: None,
            last_message_preview: None,
            pinned_by_user: BTreeSet::new(),
            muted_by_user: BTreeSet::new(),
            log: MessageLog::new(),
            insights: Vec::new(),
            created_at: now,
            updated_at: now,
            version: 1,
            archived: false,
        })
    }

    // ─── Accessors ───────────────────────────────────────────────────────────

    pub fn id(&self) -> &ConversationId {
        &self.id
    }

    pub fn conversation_type(&self) -> ConversationType {
        self.conversation_type
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn subtitle(&self) -> Option<&str> {
        self.subtitle.as_deref()
    }

    pub fn participant_ids(&self) -> &BTreeSet<UserId> {
        &self.participant_ids
    }

    pub fn linked(&self) -> &LinkedEntities {
        &self.linked
    }

    pub fn last_message_at(&self) -> Option<DateTime<Utc>> {
        self.last_message_at
    }

    pub fn last_message_preview(&self) -> Option<&str> {
        self.last_message_preview.as_deref()
    }

    pub fn unread_count(&self, user_id: &UserId) -> u32 {
        self.unread_by_user.get(user_id).copied().unwrap_or(0)
    }

    pub fn is_pinned_for(&self, user_id: &UserId) -> bool {
        self.pinned_by_user.contains(user_id)
    }

    pub fn is_muted_for(&self, user_id: &UserId) -> bool {
        self.muted_by_user.contains(user_id)
    }

    pub fn messages(&self) -> &[Message] {
        self.log.messages()
    }

    pub fn message(&self, id: &MessageId) -> Result<&Message> {
        self.log.get(id)
    }

    pub fn pinned_messages(&self) -> Vec<&Message> {
        self.log.pinned().collect()
    }

    pub fn insights(&self) -> &[Insight] {
        &self.insights
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn is_archived(&self) -> bool {
        self.archived
    }

    pub fn summary(&self) -> ConversationSummary {
        ConversationSummary {
            conversation_id: self.id.clone(),
            title: self.title.clone(),
            last_message_preview: self.last_message_preview.clone(),
            last_message_at: self.last_message_at,
            pending_insights: self.insights.len(),
            version: self.version,
        }
    }

    // ─── Mutations ───────────────────────────────────────────────────────────

    fn touch(&mut self) {
        self.version += 1;
        self.updated_at = Utc::now();
    }

    pub fn ensure_participant(&self, user_id: &UserId) -> Result<()> {
        if self.participant_ids.contains(user_id) {
            Ok(())
        } else {
            Err(WorkspaceError::validation(
                "user_id",
                format!("{} is not a participant of {}", user_id, self.id),
            ))
        }
    }

    /// Fails with `StaleVersion` when the caller's view is out of date
    pub fn ensure_version(&self, expected: Option<u64>) -> Result<()> {
        match expected {
            Some(expected) if expected != self.version => Err(WorkspaceError::StaleVersion {
                expected,
                actual: self.version,
            }),
            _ => Ok(()),
        }
    }

    pub fn append_message(
        &mut self,
        new: NewMessage,
        preview_max_chars: usize,
    ) -> Result<Appended> {
        self.ensure_participant(&new.sender_id)?;
        let sender = new.sender_id.clone();
        let message = self.log.append(&self.id, new)?.clone();

        self.last_message_at = Some(message.created_at);
        self.last_message_preview = Some(message.preview(preview_max_chars));

        let mut unread = Vec::new();
        for (user, count) in self.unread_by_user.iter_mut() {
            if *user != sender {
                *count += 1;
                unread.push((user.clone(), *count));
            }
        }
        self.touch();

        debug!(
            "Appended {} to {} ({} attachments, version {})",
            message.id,
            self.id,
            message.attachments.len(),
            self.version
        );
        Ok(Appended { message, unread })
    }

    pub fn toggle_reaction(
        &mut self,
        message_id: &MessageId,
        emoji: &str,
        user_id: &UserId,
    ) -> Result<bool> {
        if emoji.trim().is_empty() {
            return Err(WorkspaceError::validation("emoji", "required"));
        }
        self.ensure_participant(user_id)?;
        let added = self.log.get_mut(message_id)?.toggle_reaction(emoji, user_id);
        self.touch();
        Ok(added)
    }

    pub fn toggle_pin(&mut self, message_id: &MessageId) -> Result<bool> {
        let pinned = self.log.get_mut(message_id)?.toggle_pin();
        self.touch();
        Ok(pinned)
    }

    pub fn mark_read(&mut self, user_id: &UserId) -> Result<()> {
        self.ensure_participant(user_id)?;
        self.unread_by_user.insert(user_id.clone(), 0);
        self.touch();
        Ok(())
    }

    /// Pin or unpin this conversation in `user_id`'s list
    pub fn toggle_conversation_pin(&mut self, user_id: &UserId) -> Result<bool> {
        self.ensure_participant(user_id)?;
        let pinned = if self.pinned_by_user.remove(user_id) {
            false
        } else {
            self.pinned_by_user.insert(user_id.clone());
            true
        };
        self.touch();
        Ok(pinned)
    }

    pub fn set_muted(&mut self, user_id: &UserId, muted: bool) -> Result<()> {
        self.ensure_participant(user_id)?;
        if muted {
            self.muted_by_user.insert(user_id.clone());
        } else {
            self.muted_by_user.remove(user_id);
        }
        self.touch();
        Ok(())
    }

    /// Append analysis results for one message, preserving candidate order
    pub fn push_insights(
        &mut self,
        source_message_id: &MessageId,
        candidates: Vec<InsightCandidate>,
    ) -> Vec<Insight> {
        if candidates.is_empty() {
            return Vec::new();
        }
        let added: Vec<Insight> = candidates
            .into_iter()
            .map(|c| Insight::from_candidate(c, Some(source_message_id.clone())))
            .collect();
        self.insights.extend(added.iter().cloned());
        self.touch();
        added
    }

    pub fn dismiss_insight(&mut self, insight_id: &InsightId) -> Result<Insight> {
        let index = self
            .insights
            .iter()
            .position(|i| &i.id == insight_id)
            .ok_or_else(|| WorkspaceError::not_found("insight", insight_id))?;
        let insight = self.insights.remove(index);
        self.touch();
        Ok(insight)
    }

    /// Consume an insight and draft a task from the text that triggered it.
    /// The message log is left untouched.
    pub fn act_on_insight(&mut self, insight_id: &InsightId) -> Result<(Insight, TaskDraft)> {
        let insight = self.dismiss_insight(insight_id)?;
        let source = insight
            .captured_text
            .as_deref()
            .unwrap_or(&insight.description);
        let draft = extract_task(source, &self.title);
        Ok((insight, draft))
    }

    pub fn draft_task_from_message(&self, message_id: &MessageId) -> Result<TaskDraft> {
        let message = self.log.get(message_id)?;
        Ok(extract_task(&message.text, &self.title))
    }

    pub(crate) fn archive(&mut self) {
        self.archived = true;
        self.touch();
    }
}

/// Acknowledgement appended after the task board accepts a draft
pub fn task_created_text(draft: &TaskDraft) -> String {
    format!(
        "Task created: \"{}\"\n{} subtasks added.",
        draft.title,
        draft.subtasks.len()
    )
}

pub fn action_card(
    sender_id: UserId,
    sender_name: String,
    draft: &TaskDraft,
    reply_to: MessageId,
) -> NewMessage {
    NewMessage {
        sender_id,
        sender_name,
        kind: MessageKind::ActionCard,
        text: task_created_text(draft),
        attachments: Vec::new(),
        reply_to: Some(reply_to),
        linked: LinkedEntities::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insight::{InsightAnalyzer, InsightType, RuleAnalyzer};

    fn channel() -> Conversation {
        Conversation::new(
            ConversationId::from("conv_campaign"),
            NewConversation {
                conversation_type: ConversationType::Channel,
                title: "Campaign Chat".to_string(),
                subtitle: None,
                participant_ids: vec![
                    UserId::from("ana"),
                    UserId::from("mike"),
                    UserId::from("sam"),
                ],
                linked: LinkedEntities::default(),
            },
        )
        .unwrap()
    }

    fn say(sender: &str, text: &str) -> NewMessage {
        NewMessage {
            sender_id: UserId::from(sender),
            sender_name: sender.to_string(),
            kind: MessageKind::Text,
            text: text.to_string(),
            attachments: Vec::new(),
            reply_to: None,
            linked: LinkedEntities::default(),
        }
    }

    #[test]
    fn test_dm_needs_two_participants() {
        let err = Conversation::new(
            ConversationId::from("dm"),
            NewConversation {
                conversation_type: ConversationType::Dm,
                title: "Ana".to_string(),
                subtitle: None,
                participant_ids: vec![UserId::from("ana")],
                linked: LinkedEntities::default(),
            },
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_append_updates_preview_unread_and_version() {
        let mut conv = channel();
        let v0 = conv.version();
        let appended = conv.append_message(say("ana", "Kickoff at 3"), 100).unwrap();

        assert_eq!(conv.last_message_preview(), Some("Kickoff at 3"));
        assert_eq!(conv.last_message_at(), Some(appended.message.created_at));
        assert_eq!(conv.version(), v0 + 1);
        assert_eq!(conv.unread_count(&UserId::from("ana")), 0);
        assert_eq!(conv.unread_count(&UserId::from("mike")), 1);
        assert_eq!(appended.unread.len(), 2);
    }

    #[test]
    fn test_non_participant_cannot_send() {
        let mut conv = channel();
        let err = conv.append_message(say("eve", "hi"), 100).unwrap_err();
        assert!(err.is_validation());
        assert!(conv.messages().is_empty());
    }

    #[test]
    fn test_mark_read_then_new_message_from_other_sender() {
        let mut conv = channel();
        let mike = UserId::from("mike");
        conv.append_message(say("ana", "one"), 100).unwrap();
        conv.mark_read(&mike).unwrap();
        assert_eq!(conv.unread_count(&mike), 0);

        conv.append_message(say("sam", "two"), 100).unwrap();
        assert!(conv.unread_count(&mike) > 0);
    }

    #[test]
    fn test_stale_version() {
        let conv = channel();
        assert!(conv.ensure_version(None).is_ok());
        assert!(conv.ensure_version(Some(conv.version())).is_ok());
        assert!(matches!(
            conv.ensure_version(Some(conv.version() + 3)),
            Err(WorkspaceError::StaleVersion { .. })
        ));
    }

    #[test]
    fn test_act_on_insight_consumes_it() {
        let mut conv = channel();
        let text = "- Call Mike\n- Book room\nplease finish budget";
        let msg = conv.append_message(say("ana", text), 100).unwrap().message;
        let candidates = RuleAnalyzer::deterministic().analyze(text).unwrap();
        let added = conv.push_insights(&msg.id, candidates);
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].insight_type, InsightType::TaskRecommendation);

        let log_len = conv.messages().len();
        let (insight, draft) = conv.act_on_insight(&added[0].id).unwrap();
        assert_eq!(insight.source_message_id, Some(msg.id));
        assert_eq!(draft.subtasks.len(), 2);
        assert!(draft.description.starts_with("Context: Campaign Chat"));
        assert!(conv.insights().is_empty());
        assert_eq!(conv.messages().len(), log_len);

        assert!(matches!(
            conv.act_on_insight(&insight.id),
            Err(WorkspaceError::NotFound { kind: "insight", .. })
        ));
    }

    #[test]
    fn test_preferences() {
        let mut conv = channel();
        let ana = UserId::from("ana");
        assert!(conv.toggle_conversation_pin(&ana).unwrap());
        assert!(conv.is_pinned_for(&ana));
        assert!(!conv.toggle_conversation_pin(&ana).unwrap());

        conv.set_muted(&ana, true).unwrap();
        assert!(conv.is_muted_for(&ana));
        assert!(conv.set_muted(&UserId::from("eve"), true).is_err());
    }

    #[test]
    fn test_action_card_text() {
        let draft = extract_task("- Call Mike\n- Book room", "X");
        let card = action_card(UserId::from("ana"), "Ana".into(), &draft, MessageId::from("m1"));
        assert_eq!(card.kind, MessageKind::ActionCard);
        assert_eq!(card.text, "Task created: \"- Call Mike\n- Book room\"\n2 subtasks added.");
    }
}
