//! Environment configuration.

use std::env;
use std::str::FromStr;

use crate::error::ConfigError;

pub const FULL_SCREEN_MARKER_ENV_VAR: &str = "AGENT_CHAT_FULL_SCREEN_MARKER";
pub const SYNTHETIC_TOOL_CONTENT_ENV_VAR: &str = "AGENT_CHAT_SYNTHETIC_TOOL_CONTENT";
pub const SYNTHETIC_IDS_ENV_VAR: &str = "AGENT_CHAT_SYNTHETIC_IDS";

pub const DEFAULT_FULL_SCREEN_MARKER: &str = "full_screen";
pub const DEFAULT_SYNTHETIC_TOOL_CONTENT: &str = "Successfully handled tool call.";

/// How ids of synthesized tool-result messages are minted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyntheticIdStrategy {
    /// A fresh random id on every reconciliation.
    #[default]
    Random,
    /// A stable id derived from the unanswered call id.
    Derived,
}

impl FromStr for SyntheticIdStrategy {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "random" => Ok(Self::Random),
            "derived" => Ok(Self::Derived),
            _ => Err(ConfigError::InvalidSyntheticIds {
                value: value.to_string(),
            }),
        }
    }
}

/// Shape of the placeholder results the reconciler synthesizes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntheticToolResults {
    pub content: String,
    pub ids: SyntheticIdStrategy,
}

impl Default for SyntheticToolResults {
    fn default() -> Self {
        Self {
            content: DEFAULT_SYNTHETIC_TOOL_CONTENT.to_string(),
            ids: SyntheticIdStrategy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// UI payload name that requests a full-screen takeover.
    pub full_screen_marker: String,
    pub synthetic: SyntheticToolResults,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            full_screen_marker: DEFAULT_FULL_SCREEN_MARKER.to_string(),
            synthetic: SyntheticToolResults::default(),
        }
    }
}

impl ControllerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let ids = match env_string_opt(SYNTHETIC_IDS_ENV_VAR) {
            Some(value) => value.parse()?,
            None => SyntheticIdStrategy::default(),
        };

        Ok(Self {
            full_screen_marker: env_string_or(FULL_SCREEN_MARKER_ENV_VAR, DEFAULT_FULL_SCREEN_MARKER),
            synthetic: SyntheticToolResults {
                content: env_string_or(
                    SYNTHETIC_TOOL_CONTENT_ENV_VAR,
                    DEFAULT_SYNTHETIC_TOOL_CONTENT,
                ),
                ids,
            },
        })
    }
}

fn env_string_or(key: &str, default: &str) -> String {
    env_string_opt(key).unwrap_or_else(|| default.to_string())
}

fn env_string_opt(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
