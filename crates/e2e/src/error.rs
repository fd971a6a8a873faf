//! Error types for the E2E harness

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Invalid run state: {from} -> {to}")]
    InvalidRunState { from: String, to: String },

    #[error("Run attribute not set: {0}")]
    AttributeMissing(String),

    #[error("Run attribute {key} is a {found}, expected a {expected}")]
    AttributeType {
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("No browser session registered for test: {0}")]
    NoSession(String),

    #[error("Screenshot '{name}' could not be captured: {reason}")]
    Screenshot { name: String, reason: String },

    #[error("Failed to copy artifact {from} -> {to}: {reason}")]
    ArtifactCopy {
        from: String,
        to: String,
        reason: String,
    },

    #[error("Browser session {id} could not be released: {reason}")]
    SessionRelease { id: String, reason: String },

    #[error("Issue tracker error: {0}")]
    IssueTracker(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type HarnessResult<T> = Result<T, HarnessError>;
