/// Typed message attachments
///
/// Every attachment carries a strongly-typed payload; the preview is always
/// computed from that payload, so it can never hold data the payload lacks.
/// Attachments are only produced by `build_attachment`, which validates the
/// composer form for the selected type first.
use crate::attachment_form::{
    AiBriefForm, ApprovalForm, AttachmentForm, CalendarInviteForm, FileForm, LinkForm, PollForm,
    RecordForm, TaskForm,
};
use crate::chat_types::{AttachmentId, LinkedEntities, MessageId, UserId};
use crate::collaborators::Roster;
use crate::error::Result;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

const BRIEF_PREVIEW_CHARS: usize = 140;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentKind {
    File,
    Task,
    CalendarInvite,
    Record,
    Link,
    Poll,
    Approval,
    AiBrief,
}

impl AttachmentKind {
    pub const ALL: [AttachmentKind; 8] = [
        AttachmentKind::File,
        AttachmentKind::Task,
        AttachmentKind::CalendarInvite,
        AttachmentKind::Record,
        AttachmentKind::Link,
        AttachmentKind::Poll,
        AttachmentKind::Approval,
        AttachmentKind::AiBrief,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AttachmentKind::File => "file",
            AttachmentKind::Task => "task",
            AttachmentKind::CalendarInvite => "calendar_invite",
            AttachmentKind::Record => "record",
            AttachmentKind::Link => "link",
            AttachmentKind::Poll => "poll",
            AttachmentKind::Approval => "approval",
            AttachmentKind::AiBrief => "ai_brief",
        }
    }
}

impl fmt::Display for AttachmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rsvp {
    Pending,
    Accepted,
    Declined,
    Tentative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

// ─── Payloads ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilePayload {
    pub name: String,
    pub mime_type: Option<String>,
    pub size_bytes: Option<u64>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskPayload {
    pub description: Option<String>,
    pub assignee_id: Option<UserId>,
    pub assignee_name: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub priority: TaskPriority,
    pub subtasks: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarInvitePayload {
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub location: Option<String>,
    pub attendees: Vec<Attendee>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attendee {
    pub user_id: UserId,
    pub name: String,
    pub rsvp: Rsvp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordPayload {
    pub record_id: String,
    pub record_type: Option<String>,
    pub summary: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkPayload {
    pub url: String,
    pub domain: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollPayload {
    pub question: String,
    pub options: Vec<String>,
    pub allow_multiple: bool,
    /// option index -> voters
    pub votes: BTreeMap<usize, BTreeSet<UserId>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalPayload {
    pub description: Option<String>,
    pub approvers: Vec<Approver>,
    pub amount: Option<String>,
    pub status: ApprovalStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Approver {
    pub user_id: UserId,
    pub name: String,
    pub decision: Option<ApprovalStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiBriefPayload {
    pub summary: String,
    pub key_points: Vec<String>,
    pub source_message_ids: Vec<MessageId>,
}

/// Full interactive state of an attachment, the single source of truth
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AttachmentPayload {
    File(FilePayload),
    Task(TaskPayload),
    CalendarInvite(CalendarInvitePayload),
    Record(RecordPayload),
    Link(LinkPayload),
    Poll(PollPayload),
    Approval(ApprovalPayload),
    AiBrief(AiBriefPayload),
}

impl AttachmentPayload {
    pub fn kind(&self) -> AttachmentKind {
        match self {
            AttachmentPayload::File(_) => AttachmentKind::File,
            AttachmentPayload::Task(_) => AttachmentKind::Task,
            AttachmentPayload::CalendarInvite(_) => AttachmentKind::CalendarInvite,
            AttachmentPayload::Record(_) => AttachmentKind::Record,
            AttachmentPayload::Link(_) => AttachmentKind::Link,
            AttachmentPayload::Poll(_) => AttachmentKind::Poll,
            AttachmentPayload::Approval(_) => AttachmentKind::Approval,
            AttachmentPayload::AiBrief(_) => AttachmentKind::AiBrief,
        }
    }

    /// Minimal rendering-safe projection of this payload
    pub fn preview(&self) -> AttachmentPreview {
        match self {
            AttachmentPayload::File(p) => AttachmentPreview::File {
                name: p.name.clone(),
                extension: file_extension(&p.name),
                size_label: p.size_bytes.map(format_size),
            },
            AttachmentPayload::Task(p) => AttachmentPreview::Task {
                assignee_name: p.assignee_name.clone(),
                due_date: p.due_date,
                priority: p.priority,
                subtask_count: p.subtasks.len(),
            },
            AttachmentPayload::CalendarInvite(p) => AttachmentPreview::CalendarInvite {
                date: p.date,
                start: p.start,
                end: p.end,
                location: p.location.clone(),
                attendee_count: p.attendees.len(),
            },
            AttachmentPayload::Record(p) => AttachmentPreview::Record {
                record_type: p.record_type.clone(),
                summary: p.summary.clone(),
            },
            AttachmentPayload::Link(p) => AttachmentPreview::Link {
                domain: p.domain.clone(),
                description: p.description.clone(),
            },
            AttachmentPayload::Poll(p) => AttachmentPreview::Poll {
                question: p.question.clone(),
                options: p.options.clone(),
                allow_multiple: p.allow_multiple,
            },
            AttachmentPayload::Approval(p) => AttachmentPreview::Approval {
                status: p.status,
                approver_names: p.approvers.iter().map(|a| a.name.clone()).collect(),
            },
            AttachmentPayload::AiBrief(p) => AttachmentPreview::AiBrief {
                summary: truncate_chars(&p.summary, BRIEF_PREVIEW_CHARS),
                key_point_count: p.key_points.len(),
            },
        }
    }
}

/// What a card renders without touching the payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AttachmentPreview {
    File {
        name: String,
        extension: Option<String>,
        size_label: Option<String>,
    },
    Task {
        assignee_name: Option<String>,
        due_date: Option<NaiveDate>,
        priority: TaskPriority,
        subtask_count: usize,
    },
    CalendarInvite {
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
        location: Option<String>,
        attendee_count: usize,
    },
    Record {
        record_type: Option<String>,
        summary: Option<String>,
    },
    Link {
        domain: String,
        description: Option<String>,
    },
    Poll {
        question: String,
        options: Vec<String>,
        allow_multiple: bool,
    },
    Approval {
        status: ApprovalStatus,
        approver_names: Vec<String>,
    },
    AiBrief {
        summary: String,
        key_point_count: usize,
    },
}

// ─── Attachment ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    id: AttachmentId,
    title: String,
    subtitle: Option<String>,
    linked: LinkedEntities,
    payload: AttachmentPayload,
    created_at: DateTime<Utc>,
}

impl Attachment {
    fn new(title: String, subtitle: Option<String>, payload: AttachmentPayload) -> Self {
        Self {
            id: AttachmentId::generate(),
            title,
            subtitle,
            linked: LinkedEntities::default(),
            payload,
            created_at: Utc::now(),
        }
    }

    fn linked_to(mut self, linked: LinkedEntities) -> Self {
        self.linked = linked;
        self
    }

    pub fn id(&self) -> &AttachmentId {
        &self.id
    }

    pub fn kind(&self) -> AttachmentKind {
        self.payload.kind()
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn subtitle(&self) -> Option<&str> {
        self.subtitle.as_deref()
    }

    pub fn linked(&self) -> &LinkedEntities {
        &self.linked
    }

    pub fn payload(&self) -> &AttachmentPayload {
        &self.payload
    }

    pub fn preview(&self) -> AttachmentPreview {
        self.payload.preview()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// `[type] title`, used when a message has no text of its own
    pub fn label(&self) -> String {
        format!("[{}] {}", self.kind(), self.title)
    }
}

// ─── Builders ────────────────────────────────────────────────────────────────

/// Build an attachment from a composer form. Fails with a validation error
/// naming the first missing or invalid field.
pub fn build_attachment(form: &AttachmentForm, roster: &dyn Roster) -> Result<Attachment> {
    form.validate()?;
    let attachment = match form {
        AttachmentForm::File(f) => build_file(f),
        AttachmentForm::Task(f) => build_task(f, roster)?,
        AttachmentForm::CalendarInvite(f) => build_calendar_invite(f, roster)?,
        AttachmentForm::Record(f) => build_record(f),
        AttachmentForm::Link(f) => build_link(f)?,
        AttachmentForm::Poll(f) => build_poll(f),
        AttachmentForm::Approval(f) => build_approval(f, roster),
        AttachmentForm::AiBrief(f) => build_ai_brief(f),
    };
    Ok(attachment)
}

fn build_file(form: &FileForm) -> Attachment {
    let payload = FilePayload {
        name: form.name.trim().to_string(),
        mime_type: non_empty(&form.mime_type),
        size_bytes: form.size_bytes,
        url: non_empty(&form.url),
    };
    let subtitle = match (file_extension(&payload.name), payload.size_bytes) {
        (Some(ext), Some(size)) => format!("{} · {}", ext, format_size(size)),
        (Some(ext), None) => ext,
        (None, Some(size)) => format_size(size),
        (None, None) => "File".to_string(),
    };
    Attachment::new(
        payload.name.clone(),
        Some(subtitle),
        AttachmentPayload::File(payload),
    )
}

fn build_task(form: &TaskForm, roster: &dyn Roster) -> Result<Attachment> {
    let due_date = match non_empty(&form.due_date) {
        Some(raw) => Some(parse_date("due_date", &raw)?),
        None => None,
    };
    let assignee_name = form.assignee_id.as_ref().map(|id| roster.name_or_id(id));

    let mut parts = Vec::new();
    match &assignee_name {
        Some(name) => parts.push(format!("Assigned to {}", name)),
        None => parts.push("Unassigned".to_string()),
    }
    if let Some(date) = due_date {
        parts.push(format!("Due {}", date.format("%b %-d")));
    }

    let payload = TaskPayload {
        description: non_empty(&form.description),
        assignee_id: form.assignee_id.clone(),
        assignee_name,
        due_date,
        priority: form.priority,
        subtasks: non_empty_lines(&form.subtasks),
    };
    Ok(Attachment::new(
        form.title.trim().to_string(),
        Some(parts.join(" · ")),
        AttachmentPayload::Task(payload),
    ))
}

fn build_calendar_invite(form: &CalendarInviteForm, roster: &dyn Roster) -> Result<Attachment> {
    let (date, start, end) = form.parse_schedule()?;
    let attendees = form
        .attendee_ids
        .iter()
        .map(|id| Attendee {
            user_id: id.clone(),
            name: roster.name_or_id(id),
            rsvp: Rsvp::Pending,
        })
        .collect();
    let subtitle = format!(
        "{} · {}–{}",
        date.format("%a, %b %-d"),
        start.format("%H:%M"),
        end.format("%H:%M")
    );
    let payload = CalendarInvitePayload {
        date,
        start,
        end,
        location: non_empty(&form.location),
        attendees,
    };
    Ok(Attachment::new(
        form.title.trim().to_string(),
        Some(subtitle),
        AttachmentPayload::CalendarInvite(payload),
    ))
}

fn build_record(form: &RecordForm) -> Attachment {
    let payload = RecordPayload {
        record_id: form.record_id.trim().to_string(),
        record_type: non_empty(&form.record_type),
        summary: non_empty(&form.summary),
    };
    let subtitle = payload
        .record_type
        .clone()
        .unwrap_or_else(|| format!("Record {}", payload.record_id));
    let linked = LinkedEntities {
        record_id: Some(payload.record_id.clone()),
        ..Default::default()
    };
    Attachment::new(
        form.title.trim().to_string(),
        Some(subtitle),
        AttachmentPayload::Record(payload),
    )
    .linked_to(linked)
}

fn build_link(form: &LinkForm) -> Result<Attachment> {
    let url = form.url.trim().to_string();
    let domain = link_domain(&url)?;
    let title = non_empty(&form.title).unwrap_or_else(|| domain.clone());
    let payload = LinkPayload {
        url,
        domain: domain.clone(),
        description: non_empty(&form.description),
    };
    Ok(Attachment::new(
        title,
        Some(domain),
        AttachmentPayload::Link(payload),
    ))
}

fn build_poll(form: &PollForm) -> Attachment {
    let options = non_empty_lines(&form.options);
    let subtitle = format!(
        "{} options · {}",
        options.len(),
        if form.allow_multiple {
            "multiple choice"
        } else {
            "single choice"
        }
    );
    let payload = PollPayload {
        question: form.question.trim().to_string(),
        options,
        allow_multiple: form.allow_multiple,
        votes: BTreeMap::new(),
    };
    Attachment::new(
        payload.question.clone(),
        Some(subtitle),
        AttachmentPayload::Poll(payload),
    )
}

fn build_approval(form: &ApprovalForm, roster: &dyn Roster) -> Attachment {
    let approvers: Vec<Approver> = form
        .approver_ids
        .iter()
        .map(|id| Approver {
            user_id: id.clone(),
            name: roster.name_or_id(id),
            decision: None,
        })
        .collect();
    let subtitle = match approvers.as_slice() {
        [only] => format!("Awaiting {}", only.name),
        many => format!("Awaiting {} approvers", many.len()),
    };
    let payload = ApprovalPayload {
        description: non_empty(&form.description),
        approvers,
        amount: non_empty(&form.amount),
        status: ApprovalStatus::Pending,
    };
    Attachment::new(
        form.title.trim().to_string(),
        Some(subtitle),
        AttachmentPayload::Approval(payload),
    )
}

fn build_ai_brief(form: &AiBriefForm) -> Attachment {
    let key_points = non_empty_lines(&form.key_points);
    let subtitle = match key_points.len() {
        1 => "AI brief · 1 key point".to_string(),
        n => format!("AI brief · {} key points", n),
    };
    let payload = AiBriefPayload {
        summary: form.summary.trim().to_string(),
        key_points,
        source_message_ids: form.source_message_ids.clone(),
    };
    Attachment::new(
        form.title.trim().to_string(),
        Some(subtitle),
        AttachmentPayload::AiBrief(payload),
    )
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

pub(crate) fn parse_date(field: &'static str, raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
        crate::error::WorkspaceError::validation(
            field,
            format!("expected YYYY-MM-DD, got {:?}", raw),
        )
    })
}

pub(crate) fn parse_time(field: &'static str, raw: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M").map_err(|_| {
        crate::error::WorkspaceError::validation(field, format!("expected HH:MM, got {:?}", raw))
    })
}

pub(crate) fn link_domain(url: &str) -> Result<String> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .ok_or_else(|| {
            crate::error::WorkspaceError::validation("url", "must start with http:// or https://")
        })?;
    let host = rest
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default()
        .trim_start_matches("www.");
    if host.is_empty() {
        return Err(crate::error::WorkspaceError::validation(
            "url",
            "missing host",
        ));
    }
    Ok(host.to_string())
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn non_empty_lines(items: &[String]) -> Vec<String> {
    items.iter().filter_map(|s| non_empty(s)).collect()
}

fn file_extension(name: &str) -> Option<String> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_uppercase())
}

fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

pub(crate) fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
