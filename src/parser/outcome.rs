//! Tagged outcome of a best-effort extraction

use std::fmt;

use serde::{Deserialize, Serialize};

/// Result of one isolated sub-extraction
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction<T> {
    /// Section found and read
    Ok(T),
    /// Section absent from the page
    Empty,
    /// Section present but reading it failed
    Failed(String),
}

impl<T> Extraction<T> {
    pub fn failed(reason: impl fmt::Display) -> Self {
        Self::Failed(reason.to_string())
    }

    pub fn status(&self) -> SectionStatus {
        match self {
            Self::Ok(_) => SectionStatus::Ok,
            Self::Empty => SectionStatus::Empty,
            Self::Failed(reason) => SectionStatus::Failed(reason.clone()),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    pub fn ok(self) -> Option<T> {
        match self {
            Self::Ok(value) => Some(value),
            _ => None,
        }
    }
}

impl<T: Default> Extraction<T> {
    /// Value, or the structurally valid default for `Empty`/`Failed`
    pub fn into_value(self) -> T {
        self.ok().unwrap_or_default()
    }
}

impl<T, E: fmt::Display> From<Result<T, E>> for Extraction<T> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Self::Ok(value),
            Err(e) => Self::failed(e),
        }
    }
}

/// Value-free status of a section, kept in detail reports
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum SectionStatus {
    Ok,
    Empty,
    Failed(String),
}

impl fmt::Display for SectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => f.write_str("ok"),
            Self::Empty => f.write_str("empty"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}
