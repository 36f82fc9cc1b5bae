/// Insight rule engine
///
/// Intent detection is a fixed keyword rule set, not a model. A message
/// containing any trigger phrase yields one task recommendation; the
/// ambient "discussion focus" insight is drawn independently.
use crate::attachment::truncate_chars;
use crate::chat_types::{InsightId, MessageId};
use crate::error::Result;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const TRIGGER_PHRASES: [&str; 6] = [
    "due",
    "by tomorrow",
    "please",
    "draft",
    "send",
    "pull data",
];

const DESCRIPTION_PREVIEW_CHARS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightType {
    TaskRecommendation,
    General,
}

impl fmt::Display for InsightType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InsightType::TaskRecommendation => f.write_str("task_recommendation"),
            InsightType::General => f.write_str("general"),
        }
    }
}

/// An insight before it is attached to a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsightCandidate {
    pub insight_type: InsightType,
    pub title: String,
    pub description: String,
    /// Always present for task recommendations
    pub captured_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Insight {
    pub id: InsightId,
    pub insight_type: InsightType,
    pub title: String,
    pub description: String,
    pub source_message_id: Option<MessageId>,
    pub captured_text: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Insight {
    pub fn from_candidate(
        candidate: InsightCandidate,
        source_message_id: Option<MessageId>,
    ) -> Self {
        Self {
            id: InsightId::generate(),
            insight_type: candidate.insight_type,
            title: candidate.title,
            description: candidate.description,
            source_message_id,
            captured_text: candidate.captured_text,
            created_at: Utc::now(),
        }
    }
}

/// Placeholder for a real ambient-analysis signal. There is no business rule
/// behind the general insight yet; implementations only decide whether it
/// fires for a given message.
pub trait AmbientSignal: Send + Sync {
    fn fires(&self, message_text: &str) -> bool;
}

/// Unseeded random draw with a configurable probability
#[derive(Debug, Clone, Copy)]
pub struct RandomAmbientSignal {
    probability: f64,
}

impl RandomAmbientSignal {
    pub fn new(probability: f64) -> Self {
        Self {
            probability: probability.clamp(0.0, 1.0),
        }
    }
}

impl AmbientSignal for RandomAmbientSignal {
    fn fires(&self, _message_text: &str) -> bool {
        self.probability > 0.0 && rand::thread_rng().gen_bool(self.probability)
    }
}

/// Deterministic stub: always or never fires
#[derive(Debug, Clone, Copy)]
pub struct FixedAmbientSignal(pub bool);

impl AmbientSignal for FixedAmbientSignal {
    fn fires(&self, _message_text: &str) -> bool {
        self.0
    }
}

/// Runs once per appended text message, off the send path
pub trait InsightAnalyzer: Send + Sync {
    fn analyze(&self, message_text: &str) -> Result<Vec<InsightCandidate>>;
}

pub struct RuleAnalyzer {
    ambient: Box<dyn AmbientSignal>,
}

impl RuleAnalyzer {
    pub fn new(ambient: Box<dyn AmbientSignal>) -> Self {
        Self { ambient }
    }

    /// Trigger phrases only; the ambient path never fires
    pub fn deterministic() -> Self {
        Self::new(Box::new(FixedAmbientSignal(false)))
    }
}

impl InsightAnalyzer for RuleAnalyzer {
    fn analyze(&self, message_text: &str) -> Result<Vec<InsightCandidate>> {
        let mut out = Vec::new();
        if let Some(candidate) = task_recommendation(message_text) {
            out.push(candidate);
        }
        if self.ambient.fires(message_text) {
            out.push(discussion_focus());
        }
        Ok(out)
    }
}

pub fn matched_trigger(message_text: &str) -> Option<&'static str> {
    let lower = message_text.to_lowercase();
    TRIGGER_PHRASES
        .iter()
        .copied()
        .find(|phrase| lower.contains(phrase))
}

fn task_recommendation(message_text: &str) -> Option<InsightCandidate> {
    matched_trigger(message_text)?;
    Some(InsightCandidate {
        insight_type: InsightType::TaskRecommendation,
        title: "Task Recommendation".to_string(),
        description: format!(
            "Based on your message: \"{}...\"",
            truncate_chars(message_text, DESCRIPTION_PREVIEW_CHARS)
        ),
        captured_text: Some(message_text.to_string()),
    })
}

fn discussion_focus() -> InsightCandidate {
    InsightCandidate {
        insight_type: InsightType::General,
        title: "Discussion Focus".to_string(),
        description: "The conversation is converging on a single topic. Consider pinning the key decision or saving a summary to records.".to_string(),
        captured_text: None,
    }
}
