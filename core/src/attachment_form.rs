/// Composer-side attachment forms
///
/// A form holds raw field values as typed by the user. `missing_fields`
/// drives the disabled state of the submit button; `validate` is the full
/// check the builder runs before constructing anything.
use crate::attachment::{link_domain, parse_date, parse_time, AttachmentKind, TaskPriority};
use crate::chat_types::{MessageId, UserId};
use crate::error::{Result, WorkspaceError};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

pub const MIN_POLL_OPTIONS: usize = 2;
pub const MAX_POLL_OPTIONS: usize = 6;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileForm {
    pub name: String,
    pub mime_type: String,
    pub size_bytes: Option<u64>,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskForm {
    pub title: String,
    pub description: String,
    pub assignee_id: Option<UserId>,
    /// YYYY-MM-DD, optional
    pub due_date: String,
    pub priority: TaskPriority,
    pub subtasks: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalendarInviteForm {
    pub title: String,
    /// YYYY-MM-DD
    pub date: String,
    /// HH:MM
    pub start: String,
    /// HH:MM
    pub end: String,
    pub location: String,
    pub attendee_ids: Vec<UserId>,
}

impl CalendarInviteForm {
    pub(crate) fn parse_schedule(&self) -> Result<(NaiveDate, NaiveTime, NaiveTime)> {
        let date = parse_date("date", &self.date)?;
        let start = parse_time("start", &self.start)?;
        let end = parse_time("end", &self.end)?;
        if end <= start {
            return Err(WorkspaceError::validation("end", "must be after start"));
        }
        Ok((date, start, end))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordForm {
    pub record_id: String,
    pub title: String,
    pub record_type: String,
    pub summary: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkForm {
    pub url: String,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollForm {
    pub question: String,
    pub options: Vec<String>,
    pub allow_multiple: bool,
}

impl Default for PollForm {
    /// A fresh poll starts with the minimum number of blank options
    fn default() -> Self {
        Self {
            question: String::new(),
            options: vec![String::new(); MIN_POLL_OPTIONS],
            allow_multiple: false,
        }
    }
}

impl PollForm {
    /// Append a blank option. No-op once the poll holds the maximum.
    pub fn add_option(&mut self) -> bool {
        if self.options.len() >= MAX_POLL_OPTIONS {
            return false;
        }
        self.options.push(String::new());
        true
    }

    pub fn can_remove_option(&self) -> bool {
        self.options.len() > MIN_POLL_OPTIONS
    }

    /// Remove the option at `index`. Refused while only the minimum remains.
    pub fn remove_option(&mut self, index: usize) -> bool {
        if !self.can_remove_option() || index >= self.options.len() {
            return false;
        }
        self.options.remove(index);
        true
    }

    pub fn set_option(&mut self, index: usize, text: impl Into<String>) -> bool {
        match self.options.get_mut(index) {
            Some(slot) => {
                *slot = text.into();
                true
            }
            None => false,
        }
    }

    fn filled_options(&self) -> usize {
        self.options.iter().filter(|o| !o.trim().is_empty()).count()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApprovalForm {
    pub title: String,
    pub description: String,
    pub approver_ids: Vec<UserId>,
    pub amount: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AiBriefForm {
    pub title: String,
    pub summary: String,
    pub key_points: Vec<String>,
    pub source_message_ids: Vec<MessageId>,
}

/// One form per attachment type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AttachmentForm {
    File(FileForm),
    Task(TaskForm),
    CalendarInvite(CalendarInviteForm),
    Record(RecordForm),
    Link(LinkForm),
    Poll(PollForm),
    Approval(ApprovalForm),
    AiBrief(AiBriefForm),
}

impl AttachmentForm {
    /// Blank form for the type picked in the composer
    pub fn blank(kind: AttachmentKind) -> Self {
        match kind {
            AttachmentKind::File => AttachmentForm::File(FileForm::default()),
            AttachmentKind::Task => AttachmentForm::Task(TaskForm::default()),
            AttachmentKind::CalendarInvite => {
                AttachmentForm::CalendarInvite(CalendarInviteForm::default())
            }
            AttachmentKind::Record => AttachmentForm::Record(RecordForm::default()),
            AttachmentKind::Link => AttachmentForm::Link(LinkForm::default()),
            AttachmentKind::Poll => AttachmentForm::Poll(PollForm::default()),
            AttachmentKind::Approval => AttachmentForm::Approval(ApprovalForm::default()),
            AttachmentKind::AiBrief => AttachmentForm::AiBrief(AiBriefForm::default()),
        }
    }

    pub fn kind(&self) -> AttachmentKind {
        match self {
            AttachmentForm::File(_) => AttachmentKind::File,
            AttachmentForm::Task(_) => AttachmentKind::Task,
            AttachmentForm::CalendarInvite(_) => AttachmentKind::CalendarInvite,
            AttachmentForm::Record(_) => AttachmentKind::Record,
            AttachmentForm::Link(_) => AttachmentKind::Link,
            AttachmentForm::Poll(_) => AttachmentKind::Poll,
            AttachmentForm::Approval(_) => AttachmentKind::Approval,
            AttachmentForm::AiBrief(_) => AttachmentKind::AiBrief,
        }
    }

    /// Required fields that are still blank, in display order
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        match self {
            AttachmentForm::File(f) => require(&mut missing, "name", &f.name),
            AttachmentForm::Task(f) => require(&mut missing, "title", &f.title),
            AttachmentForm::CalendarInvite(f) => {
                require(&mut missing, "title", &f.title);
                require(&mut missing, "date", &f.date);
                require(&mut missing, "start", &f.start);
                require(&mut missing, "end", &f.end);
            }
            AttachmentForm::Record(f) => {
                require(&mut missing, "record_id", &f.record_id);
                require(&mut missing, "title", &f.title);
            }
            AttachmentForm::Link(f) => require(&mut missing, "url", &f.url),
            AttachmentForm::Poll(f) => {
                require(&mut missing, "question", &f.question);
                if f.filled_options() < MIN_POLL_OPTIONS {
                    missing.push("options");
                }
            }
            AttachmentForm::Approval(f) => {
                require(&mut missing, "title", &f.title);
                if f.approver_ids.is_empty() {
                    missing.push("approver_ids");
                }
            }
            AttachmentForm::AiBrief(f) => {
                require(&mut missing, "title", &f.title);
                require(&mut missing, "summary", &f.summary);
            }
        }
        missing
    }

    /// Required-field presence plus per-field format checks
    pub fn validate(&self) -> Result<()> {
        if let Some(&field) = self.missing_fields().first() {
            let reason = match field {
                "options" => format!("at least {} non-empty options required", MIN_POLL_OPTIONS),
                "approver_ids" => "at least one approver required".to_string(),
                _ => "required".to_string(),
            };
            return Err(WorkspaceError::validation(field, reason));
        }

        match self {
            AttachmentForm::Task(f) if !f.due_date.trim().is_empty() => {
                parse_date("due_date", &f.due_date)?;
            }
            AttachmentForm::CalendarInvite(f) => {
                f.parse_schedule()?;
            }
            AttachmentForm::Link(f) => {
                link_domain(f.url.trim())?;
            }
            AttachmentForm::Poll(f) if f.options.len() > MAX_POLL_OPTIONS => {
                return Err(WorkspaceError::validation(
                    "options",
                    format!("at most {} options allowed", MAX_POLL_OPTIONS),
                ));
            }
            _ => {}
        }
        Ok(())
    }

    /// Whether the composer should enable submission
    pub fn can_submit(&self) -> bool {
        self.validate().is_ok()
    }
}

fn require(missing: &mut Vec<&'static str>, field: &'static str, value: &str) {
    if value.trim().is_empty() {
        missing.push(field);
    }
}
