/// Workspace integration tests
/// Deferred insights, task confirmation, records and events, driven on a paused clock
extern crate threadline_core;

use std::sync::{Arc, Mutex};
use std::time::Duration;
use threadline_core::attachment::{build_attachment, AttachmentKind};
use threadline_core::attachment_form::{AttachmentForm, FileForm, LinkForm, PollForm};
use threadline_core::chat_types::{ConversationId, LinkedEntities, UserId, WorkspaceEvent};
use threadline_core::collaborators::{
    InMemoryRecords, InMemoryTaskBoard, StaticRoster, UnreadNotifier,
};
use threadline_core::conversation::{ConversationType, NewConversation};
use threadline_core::insight::{
    FixedAmbientSignal, InsightAnalyzer, InsightCandidate, InsightType, RuleAnalyzer,
};
use threadline_core::message::MessageKind;
use threadline_core::records_store::RecordEntry;
use threadline_core::{
    Collaborators, Config, Result, SendMessage, TaskConfirmation, Workspace, WorkspaceError,
};
use tokio::sync::broadcast;
use tokio::time::sleep;

const CAMPAIGN_REQUEST: &str =
    "Can you pull data for CA-45 and CA-92 by tomorrow? Then draft the memo.";

fn roster() -> StaticRoster {
    StaticRoster::new([("ana", "Ana Ruiz"), ("raj", "Raj Patel"), ("mei", "Mei Chen")])
}

fn config() -> Config {
    Config {
        insight_delay: Duration::from_millis(1000),
        general_insight_probability: 0.0,
        ..Config::default()
    }
}

fn workspace_with(collaborators: Collaborators, analyzer: Arc<dyn InsightAnalyzer>) -> Workspace {
    Workspace::with_analyzer(config(), collaborators, analyzer).unwrap()
}

fn workspace() -> Workspace {
    workspace_with(
        Collaborators::in_memory(roster()),
        Arc::new(RuleAnalyzer::deterministic()),
    )
}

async fn campaign_chat(workspace: &Workspace) -> ConversationId {
    workspace
        .create_conversation(NewConversation {
            conversation_type: ConversationType::Project,
            title: "Campaign Chat".to_string(),
            subtitle: None,
            participant_ids: vec![UserId::from("ana"), UserId::from("raj"), UserId::from("mei")],
            linked: LinkedEntities::default(),
        })
        .await
        .unwrap()
}

fn drain(events: &mut broadcast::Receiver<WorkspaceEvent>) -> Vec<WorkspaceEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

struct FailingAnalyzer;

impl InsightAnalyzer for FailingAnalyzer {
    fn analyze(&self, _message_text: &str) -> Result<Vec<InsightCandidate>> {
        Err(WorkspaceError::Collaborator("model offline".to_string()))
    }
}

#[derive(Default)]
struct RecordingNotifier {
    calls: Mutex<Vec<(UserId, u32)>>,
}

impl UnreadNotifier for RecordingNotifier {
    fn unread_changed(&self, _conversation_id: &ConversationId, user_id: &UserId, unread: u32) {
        self.calls.lock().unwrap().push((user_id.clone(), unread));
    }
}

#[tokio::test(start_paused = true)]
async fn test_insight_appears_only_after_delay() {
    let workspace = workspace();
    let conv = campaign_chat(&workspace).await;

    let message = workspace
        .send_message(&conv, SendMessage::text("ana", CAMPAIGN_REQUEST))
        .await
        .unwrap();

    // The append is visible immediately, the insight is not
    let snapshot = workspace.conversation(&conv).await.unwrap();
    assert_eq!(snapshot.messages().len(), 1);
    assert!(snapshot.insights().is_empty());

    sleep(Duration::from_millis(999)).await;
    assert!(workspace.insights(&conv).await.unwrap().is_empty());

    sleep(Duration::from_millis(2)).await;
    let insights = workspace.insights(&conv).await.unwrap();
    assert_eq!(insights.len(), 1);
    assert_eq!(insights[0].insight_type, InsightType::TaskRecommendation);
    assert_eq!(insights[0].title, "Task Recommendation");
    assert_eq!(insights[0].source_message_id.as_ref(), Some(&message.id));
    assert!(insights[0]
        .description
        .starts_with("Based on your message: \"Can you pull data"));
}

#[tokio::test(start_paused = true)]
async fn test_insights_resolve_in_append_order() {
    let workspace = workspace();
    let conv = campaign_chat(&workspace).await;

    let mut ids = Vec::new();
    for text in ["Please send the deck", "Lunch?", "Draft is due Friday"] {
        let message = workspace
            .send_message(&conv, SendMessage::text("raj", text))
            .await
            .unwrap();
        ids.push(message.id);
        sleep(Duration::from_millis(10)).await;
    }

    sleep(Duration::from_millis(1100)).await;
    let sources: Vec<_> = workspace
        .insights(&conv)
        .await
        .unwrap()
        .into_iter()
        .filter_map(|i| i.source_message_id)
        .collect();
    assert_eq!(sources, vec![ids[0].clone(), ids[2].clone()]);
}

#[tokio::test(start_paused = true)]
async fn test_archive_cancels_pending_analysis() {
    let workspace = workspace();
    let conv = campaign_chat(&workspace).await;
    let mut events = workspace.subscribe();

    workspace
        .send_message(&conv, SendMessage::text("ana", CAMPAIGN_REQUEST))
        .await
        .unwrap();
    sleep(Duration::from_millis(500)).await;

    let archived = workspace.archive_conversation(&conv).await.unwrap();
    assert!(archived.is_archived());
    assert!(archived.insights().is_empty());

    sleep(Duration::from_millis(2000)).await;
    let seen = drain(&mut events);
    assert!(seen
        .iter()
        .all(|e| !matches!(e, WorkspaceEvent::InsightAdded { .. })));
    assert!(seen
        .iter()
        .any(|e| matches!(e, WorkspaceEvent::ConversationArchived { .. })));

    let err = workspace.conversation(&conv).await.unwrap_err();
    assert!(matches!(err, WorkspaceError::NotFound { kind: "conversation", .. }));
    let err = workspace
        .send_message(&conv, SendMessage::text("ana", "still there?"))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkspaceError::NotFound { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_failing_analyzer_never_blocks_send() {
    let workspace = workspace_with(
        Collaborators::in_memory(roster()),
        Arc::new(FailingAnalyzer),
    );
    let conv = campaign_chat(&workspace).await;

    for text in ["Please send it", "Draft due soon"] {
        workspace
            .send_message(&conv, SendMessage::text("ana", text))
            .await
            .unwrap();
    }
    sleep(Duration::from_millis(1500)).await;

    let snapshot = workspace.conversation(&conv).await.unwrap();
    assert_eq!(snapshot.messages().len(), 2);
    assert!(snapshot.insights().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_ambient_insight_follows_task_recommendation() {
    let workspace = workspace_with(
        Collaborators::in_memory(roster()),
        Arc::new(RuleAnalyzer::new(Box::new(FixedAmbientSignal(true)))),
    );
    let conv = campaign_chat(&workspace).await;

    workspace
        .send_message(&conv, SendMessage::text("mei", "Please review"))
        .await
        .unwrap();
    workspace
        .send_message(&conv, SendMessage::text("mei", "Nice work everyone"))
        .await
        .unwrap();
    sleep(Duration::from_millis(1100)).await;

    let kinds: Vec<_> = workspace
        .insights(&conv)
        .await
        .unwrap()
        .into_iter()
        .map(|i| i.insight_type)
        .collect();
    assert_eq!(
        kinds,
        vec![
            InsightType::TaskRecommendation,
            InsightType::General,
            InsightType::General
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_act_on_insight_and_confirm_task() {
    let tasks = Arc::new(InMemoryTaskBoard::new());
    let collaborators = Collaborators {
        tasks: tasks.clone(),
        ..Collaborators::in_memory(roster())
    };
    let workspace = workspace_with(collaborators, Arc::new(RuleAnalyzer::deterministic()));
    let conv = campaign_chat(&workspace).await;
    let mut events = workspace.subscribe();

    let source = workspace
        .send_message(&conv, SendMessage::text("ana", CAMPAIGN_REQUEST))
        .await
        .unwrap();
    sleep(Duration::from_millis(1001)).await;

    let insight = workspace.insights(&conv).await.unwrap().remove(0);
    let (acted, draft) = workspace.act_on_insight(&conv, &insight.id).await.unwrap();
    assert_eq!(acted.id, insight.id);
    assert_eq!(draft.title, "Campaign data pull and memo");
    assert_eq!(draft.subtasks.len(), 4);
    // Acting consumes the insight but leaves the log alone
    assert!(workspace.insights(&conv).await.unwrap().is_empty());
    assert_eq!(workspace.conversation(&conv).await.unwrap().messages().len(), 1);

    let (task_id, card) = workspace
        .confirm_task(
            &conv,
            TaskConfirmation {
                confirmed_by: UserId::from("raj"),
                draft: draft.clone(),
                source_message_id: source.id.clone(),
            },
        )
        .await
        .unwrap();

    assert_eq!(card.kind, MessageKind::ActionCard);
    assert_eq!(card.reply_to.as_ref(), Some(&source.id));
    assert_eq!(card.sender_name, "Raj Patel");
    assert_eq!(
        card.text,
        "Task created: \"Campaign data pull and memo\"\n4 subtasks added."
    );

    let board = tasks.tasks();
    assert_eq!(board.len(), 1);
    assert_eq!(board[0].0, task_id);
    assert_eq!(board[0].1.source_message_id, source.id);
    assert_eq!(board[0].1.source_sender_name, "Ana Ruiz");
    assert_eq!(board[0].1.draft, draft);

    // Action cards are never analyzed
    sleep(Duration::from_millis(2000)).await;
    assert!(workspace.insights(&conv).await.unwrap().is_empty());
    assert!(drain(&mut events)
        .iter()
        .any(|e| matches!(e, WorkspaceEvent::TaskCreated { task_id: t, .. } if *t == task_id)));
}

#[tokio::test]
async fn test_refused_confirmation_creates_no_task() {
    let tasks = Arc::new(InMemoryTaskBoard::new());
    let collaborators = Collaborators {
        tasks: tasks.clone(),
        ..Collaborators::in_memory(roster())
    };
    let workspace = workspace_with(collaborators, Arc::new(RuleAnalyzer::deterministic()));
    let conv = campaign_chat(&workspace).await;

    let source = workspace
        .send_message(&conv, SendMessage::text("ana", "Please pull the Q3 numbers."))
        .await
        .unwrap();
    let draft = workspace
        .draft_task_from_message(&conv, &source.id)
        .await
        .unwrap();

    let err = workspace
        .confirm_task(
            &conv,
            TaskConfirmation {
                confirmed_by: UserId::from("zoe"),
                draft: draft.clone(),
                source_message_id: source.id.clone(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, WorkspaceError::Validation { field: "user_id", .. }));
    assert!(tasks.tasks().is_empty());
    assert_eq!(workspace.conversation(&conv).await.unwrap().messages().len(), 1);

    workspace.archive_conversation(&conv).await.unwrap();
    let err = workspace
        .confirm_task(
            &conv,
            TaskConfirmation {
                confirmed_by: UserId::from("raj"),
                draft,
                source_message_id: source.id,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, WorkspaceError::NotFound { .. }));
    assert!(tasks.tasks().is_empty());
}

#[tokio::test]
async fn test_dismissed_insight_is_gone() {
    let workspace = workspace();
    let conv = campaign_chat(&workspace).await;
    let err = workspace
        .dismiss_insight(&conv, &"ins_missing".into())
        .await
        .unwrap_err();
    assert!(matches!(err, WorkspaceError::NotFound { kind: "insight", .. }));
}

#[tokio::test]
async fn test_attachments_keep_order_and_previews() {
    let workspace = workspace();
    let conv = campaign_chat(&workspace).await;
    let roster = roster();

    let mut poll = PollForm {
        question: "Venue?".to_string(),
        ..Default::default()
    };
    poll.set_option(0, "Rooftop");
    poll.set_option(1, "Office");
    let forms = [
        AttachmentForm::File(FileForm {
            name: "brief.pdf".to_string(),
            size_bytes: Some(2_400_000),
            ..Default::default()
        }),
        AttachmentForm::Poll(poll),
        AttachmentForm::Link(LinkForm {
            url: "https://www.example.com/q3".to_string(),
            ..Default::default()
        }),
    ];
    let attachments: Vec<_> = forms
        .iter()
        .map(|f| build_attachment(f, &roster).unwrap())
        .collect();

    let message = workspace
        .send_message(&conv, SendMessage::text("mei", "").with_attachments(attachments.clone()))
        .await
        .unwrap();
    assert_eq!(message.attachments, attachments);

    let stored = workspace.conversation(&conv).await.unwrap();
    let kinds: Vec<_> = stored.messages()[0]
        .attachments
        .iter()
        .map(|a| a.kind())
        .collect();
    assert_eq!(
        kinds,
        vec![AttachmentKind::File, AttachmentKind::Poll, AttachmentKind::Link]
    );
    for (stored, sent) in stored.messages()[0].attachments.iter().zip(&attachments) {
        assert_eq!(stored.preview(), sent.preview());
    }
    // Attachment-only message previews as the first attachment's label
    assert_eq!(
        stored.summary().last_message_preview.as_deref(),
        Some("[file] brief.pdf")
    );
}

#[tokio::test]
async fn test_empty_message_rejected() {
    let workspace = workspace();
    let conv = campaign_chat(&workspace).await;
    let err = workspace
        .send_message(&conv, SendMessage::text("ana", ""))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkspaceError::EmptyMessage));
    assert!(workspace.conversation(&conv).await.unwrap().messages().is_empty());
}

#[tokio::test]
async fn test_stale_version_rejected() {
    let workspace = workspace();
    let conv = campaign_chat(&workspace).await;
    let version = workspace.conversation(&conv).await.unwrap().version();

    let mut first = SendMessage::text("ana", "hello");
    first.expected_version = Some(version);
    workspace.send_message(&conv, first).await.unwrap();

    let mut stale = SendMessage::text("raj", "hi");
    stale.expected_version = Some(version);
    let err = workspace.send_message(&conv, stale).await.unwrap_err();
    match err {
        WorkspaceError::StaleVersion { expected, actual } => {
            assert_eq!(expected, version);
            assert!(actual > version);
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn test_reactions_pins_and_unread() {
    let notifier = Arc::new(RecordingNotifier::default());
    let collaborators = Collaborators {
        notifier: notifier.clone(),
        ..Collaborators::in_memory(roster())
    };
    let workspace = workspace_with(collaborators, Arc::new(RuleAnalyzer::deterministic()));
    let conv = campaign_chat(&workspace).await;
    let ana = UserId::from("ana");
    let raj = UserId::from("raj");

    let message = workspace
        .send_message(&conv, SendMessage::text("ana", "Kickoff at 10"))
        .await
        .unwrap();
    workspace
        .send_message(&conv, SendMessage::text("ana", "Room 4"))
        .await
        .unwrap();

    assert!(workspace.toggle_reaction(&conv, &message.id, "👍", &raj).await.unwrap());
    assert!(workspace.toggle_reaction(&conv, &message.id, "👍", &ana).await.unwrap());
    assert!(!workspace.toggle_reaction(&conv, &message.id, "👍", &raj).await.unwrap());
    assert!(workspace.toggle_pin(&conv, &message.id).await.unwrap());

    let snapshot = workspace.conversation(&conv).await.unwrap();
    let stored = snapshot.message(&message.id).unwrap();
    assert_eq!(stored.reaction_count("👍"), 1);
    assert!(stored.pinned);
    assert_eq!(snapshot.unread_count(&raj), 2);
    assert_eq!(snapshot.unread_count(&ana), 0);

    workspace.mark_read(&conv, &raj).await.unwrap();
    assert_eq!(workspace.conversation(&conv).await.unwrap().unread_count(&raj), 0);
    assert_eq!(notifier.calls.lock().unwrap().last(), Some(&(raj.clone(), 0)));

    assert!(workspace.toggle_conversation_pin(&conv, &raj).await.unwrap());
    workspace.set_muted(&conv, &raj, true).await.unwrap();
    let snapshot = workspace.conversation(&conv).await.unwrap();
    assert!(snapshot.is_pinned_for(&raj));
    assert!(snapshot.is_muted_for(&raj));
    assert!(!snapshot.is_pinned_for(&ana));
}

#[tokio::test]
async fn test_outsider_cannot_post() {
    let workspace = workspace();
    let conv = campaign_chat(&workspace).await;
    let err = workspace
        .send_message(&conv, SendMessage::text("zoe", "hi all"))
        .await
        .unwrap_err();
    assert!(err.is_validation());
}

#[tokio::test]
async fn test_save_to_records() {
    let records = Arc::new(InMemoryRecords::new());
    let collaborators = Collaborators {
        records: records.clone(),
        ..Collaborators::in_memory(roster())
    };
    let workspace = workspace_with(collaborators, Arc::new(RuleAnalyzer::deterministic()));
    let conv = campaign_chat(&workspace).await;
    let mei = UserId::from("mei");

    let message = workspace
        .send_message(&conv, SendMessage::text("raj", "Final numbers attached"))
        .await
        .unwrap();
    workspace
        .save_message_to_records(&conv, &message.id, &mei)
        .await
        .unwrap();
    workspace.save_transcript_to_records(&conv, &mei).await.unwrap();

    let entries = records.entries();
    assert_eq!(entries.len(), 2);
    match &entries[0] {
        RecordEntry::Message {
            message: saved,
            conversation_title,
            saved_by,
            ..
        } => {
            assert_eq!(saved.id, message.id);
            assert_eq!(conversation_title, "Campaign Chat");
            assert_eq!(saved_by, &mei);
        }
        other => panic!("unexpected entry: {:?}", other),
    }
    match &entries[1] {
        RecordEntry::Transcript { transcript, .. } => {
            assert_eq!(transcript.messages.len(), 1);
            assert_eq!(transcript.title, "Campaign Chat");
        }
        other => panic!("unexpected entry: {:?}", other),
    }

    let err = workspace
        .save_message_to_records(&conv, &"msg_missing".into(), &mei)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkspaceError::NotFound { kind: "message", .. }));
}

#[tokio::test]
async fn test_list_conversations_most_recent_first() {
    let workspace = workspace();
    let quiet = campaign_chat(&workspace).await;
    let busy = campaign_chat(&workspace).await;

    workspace
        .send_message(&quiet, SendMessage::text("ana", "first"))
        .await
        .unwrap();
    sleep(Duration::from_millis(5)).await;
    workspace
        .send_message(&busy, SendMessage::text("raj", "second"))
        .await
        .unwrap();

    let summaries = workspace.list_conversations().await;
    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[0].conversation_id, busy);
    assert_eq!(summaries[0].last_message_preview.as_deref(), Some("second"));
}

#[tokio::test]
async fn test_events_for_append() {
    let workspace = workspace();
    let conv = campaign_chat(&workspace).await;
    let mut events = workspace.subscribe();

    workspace
        .send_message(&conv, SendMessage::text("ana", "hello"))
        .await
        .unwrap();

    let seen = drain(&mut events);
    let unread: Vec<_> = seen
        .iter()
        .filter_map(|e| match e {
            WorkspaceEvent::UnreadChanged {
                user_id, unread, ..
            } => Some((user_id.clone(), *unread)),
            _ => None,
        })
        .collect();
    assert_eq!(
        unread,
        vec![(UserId::from("mei"), 1), (UserId::from("raj"), 1)]
    );
    assert!(matches!(
        seen.last(),
        Some(WorkspaceEvent::MessageAppended { message }) if message.text == "hello"
    ));
}

#[tokio::test]
async fn test_dm_needs_two_participants() {
    let workspace = workspace();
    let err = workspace
        .create_conversation(NewConversation {
            conversation_type: ConversationType::Dm,
            title: "Ana".to_string(),
            subtitle: None,
            participant_ids: vec![UserId::from("ana")],
            linked: LinkedEntities::default(),
        })
        .await
        .unwrap_err();
    assert!(err.is_validation());
}
