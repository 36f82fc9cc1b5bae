/// Pre-send message composer: draft text plus pending attachments
use crate::attachment::{build_attachment, Attachment};
use crate::attachment_form::AttachmentForm;
use crate::chat_types::AttachmentId;
use crate::collaborators::Roster;
use crate::error::Result;

#[derive(Debug, Clone, Default)]
pub struct Composer {
    text: String,
    attachments: Vec<Attachment>,
}

impl Composer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    /// Build and queue an attachment. Forms that cannot submit, whether a
    /// field is missing or malformed, are refused before the builder runs.
    pub fn attach(&mut self, form: &AttachmentForm, roster: &dyn Roster) -> Result<&Attachment> {
        form.validate()?;
        let attachment = build_attachment(form, roster)?;
        self.attachments.push(attachment);
        let last = self.attachments.len() - 1;
        Ok(&self.attachments[last])
    }

    pub fn remove(&mut self, id: &AttachmentId) -> Option<Attachment> {
        let index = self.attachments.iter().position(|a| a.id() == id)?;
        Some(self.attachments.remove(index))
    }

    pub fn is_sendable(&self) -> bool {
        !self.text.is_empty() || !self.attachments.is_empty()
    }

    /// Hand text and attachments over for sending and reset the composer
    pub fn take(&mut self) -> (String, Vec<Attachment>) {
        let text = std::mem::take(&mut self.text);
        let attachments = std::mem::take(&mut self.attachments);
        (text, attachments)
    }
}
