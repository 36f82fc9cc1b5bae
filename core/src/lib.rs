/// Threadline - messaging core with insight mining and typed attachments
///
/// Conversations hold an append-only message log; every text message is
/// analyzed off the send path for actionable intent, and insights or
/// messages can be turned into structured task drafts.

pub mod attachment;
pub mod attachment_form;
pub mod chat_types;
pub mod cli_app;
pub mod collaborators;
pub mod composer;
pub mod config;
pub mod conversation;
pub mod error;
pub mod extract;
pub mod insight;
pub mod message;
pub mod records_store;
pub mod scheduler;
pub mod workspace;

pub use config::Config;
pub use error::{Result, WorkspaceError};
pub use workspace::{Collaborators, SendMessage, TaskConfirmation, Workspace};
