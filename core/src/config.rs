/// Configuration management
use crate::error::{Result, WorkspaceError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_INSIGHT_DELAY_MS: u64 = 1000;
const DEFAULT_GENERAL_INSIGHT_PROBABILITY: f64 = 0.3;

/// Workspace configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Deferred window between appending a message and its insights becoming visible
    pub insight_delay: Duration,

    /// Chance that the ambient "discussion focus" insight fires for a message (0.0 disables it)
    pub general_insight_probability: f64,

    /// Max characters kept in a conversation's last-message preview
    pub preview_max_chars: usize,

    /// Capacity of the workspace event broadcast channel
    pub event_capacity: usize,

    /// Optional data directory for the records store (defaults to `.threadline`)
    pub data_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            insight_delay: Duration::from_millis(DEFAULT_INSIGHT_DELAY_MS),
            general_insight_probability: DEFAULT_GENERAL_INSIGHT_PROBABILITY,
            preview_max_chars: 100,
            event_capacity: 256,
            data_dir: None,
        }
    }
}

impl Config {
    /// Create config from command line arguments
    ///
    /// `args[0]` is the binary name; everything after it is flags.
    pub fn from_args(args: &[String]) -> Result<Self> {
        let mut config = Self::default();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--insight-delay-ms" => {
                    let v = args.get(i + 1).ok_or_else(|| {
                        WorkspaceError::Config("--insight-delay-ms requires a number".to_string())
                    })?;
                    let ms = v.parse::<u64>().map_err(|_| {
                        WorkspaceError::Config(
                            "--insight-delay-ms must be a non-negative integer".to_string(),
                        )
                    })?;
                    config.insight_delay = Duration::from_millis(ms);
                    i += 2;
                }
                "--general-insights" => {
                    let v = args.get(i + 1).ok_or_else(|| {
                        WorkspaceError::Config(
                            "--general-insights requires a probability argument".to_string(),
                        )
                    })?;
                    config.general_insight_probability = parse_probability(v)?;
                    i += 2;
                }
                "--no-general-insights" => {
                    config.general_insight_probability = 0.0;
                    i += 1;
                }
                "--data-dir" => {
                    let path = args.get(i + 1).ok_or_else(|| {
                        WorkspaceError::Config("--data-dir requires a path argument".to_string())
                    })?;
                    config.data_dir = Some(PathBuf::from(path));
                    i += 2;
                }
                other => {
                    return Err(WorkspaceError::Config(format!(
                        "Unknown argument: {}. Usage: {} [--insight-delay-ms <ms>] [--general-insights <p>] [--no-general-insights] [--data-dir <path>]",
                        other,
                        args.first().map(String::as_str).unwrap_or("threadline"),
                    )));
                }
            }
        }

        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Env overrides (nice for scripts)
    fn apply_env(&mut self) -> Result<()> {
        if let Some(ms) = std::env::var("THREADLINE_INSIGHT_DELAY_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
        {
            self.insight_delay = Duration::from_millis(ms);
        }
        if let Ok(p) = std::env::var("THREADLINE_GENERAL_INSIGHTS") {
            self.general_insight_probability = parse_probability(&p)?;
        }
        if let Ok(dir) = std::env::var("THREADLINE_DATA_DIR") {
            self.data_dir = Some(PathBuf::from(dir));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.general_insight_probability) {
            return Err(WorkspaceError::Config(format!(
                "general insight probability must be within [0, 1], got {}",
                self.general_insight_probability
            )));
        }
        if self.event_capacity == 0 {
            return Err(WorkspaceError::Config(
                "event capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(".threadline"))
    }
}

fn parse_probability(raw: &str) -> Result<f64> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| WorkspaceError::Config(format!("Invalid probability: {}", raw)))
}
