//! Common types shared across Parley crates.
//!
//! This crate defines the provider set, the shared error taxonomy, and the
//! observability helpers used throughout the workspace. It is intentionally
//! lightweight so that every crate can depend on it without pulling in the
//! browser stack.
//!
//! # Overview
//!
//! - [`Provider`]: the chat front ends Parley can drive
//! - [`StealthLevel`]: how aggressively the browser masks automation
//! - [`observability`]: centralised tracing/logging initialisation
//! - [`ParleyError`] and [`Result`]: shared error handling
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub mod observability;

/// Chat services reachable through their browser front ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    ChatGpt,
    Perplexity,
    Mistral,
    Claude,
}

impl Provider {
    pub const ALL: [Provider; 4] = [
        Provider::ChatGpt,
        Provider::Perplexity,
        Provider::Mistral,
        Provider::Claude,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Provider::ChatGpt => "chatgpt",
            Provider::Perplexity => "perplexity",
            Provider::Mistral => "mistral",
            Provider::Claude => "claude",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Browser automation stealth level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StealthLevel {
    Lightweight,
    #[default]
    Balanced,
    Maximum,
}

/// Which part of the login protocol a failure occurred in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStage {
    Entry,
    Email,
    Password,
    Verification,
    ChatReady,
}

impl fmt::Display for LoginStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoginStage::Entry => "entry",
            LoginStage::Email => "email",
            LoginStage::Password => "password",
            LoginStage::Verification => "verification",
            LoginStage::ChatReady => "chat-ready",
        };
        f.write_str(name)
    }
}

/// Error types used across the Parley system.
///
/// Each failure mode of a chat session maps to its own variant; nothing is
/// collapsed into a catch-all, and nothing here triggers an internal retry.
#[derive(thiserror::Error, Debug)]
pub enum ParleyError {
    /// A DOM element did not satisfy the awaited condition within its timeout.
    #[error("element not found: {selector} after {elapsed:?}")]
    ElementNotFound { selector: String, elapsed: Duration },

    /// A login step could not be completed. Carries the failing stage.
    #[error("login failed at the {stage} step: {reason}")]
    LoginFailed { stage: LoginStage, reason: String },

    /// The chat input or send control was unreachable, or the prompt was
    /// rejected before submission.
    #[error("prompt submission failed: {0}")]
    SubmissionFailed(String),

    /// The reply never stabilised within the response window. No partial
    /// text is returned.
    #[error("response did not stabilise within {0:?}")]
    ResponseTimeout(Duration),

    /// Opening a session failed; wraps the login or launch error.
    #[error("session open failed: {0}")]
    SessionOpen(#[source] Box<ParleyError>),

    /// Configuration was incomplete or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// The browser driver reported an error.
    #[error("driver error: {0}")]
    Driver(#[from] anyhow::Error),
}

/// Convenient alias for results that use [`ParleyError`].
pub type Result<T> = std::result::Result<T, ParleyError>;
