use bytes::Bytes;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::fmt;

/// One row of a remote directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub name: String,
    pub size: Option<u64>,
}

#[cfg(test)]
impl RemoteEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    Accepted,
    Rejected(Rejection),
}

#[cfg(test)]
impl ValidationResult {
    pub fn is_accepted(&self) -> bool {
        matches!(self, ValidationResult::Accepted)
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            ValidationResult::Accepted => None,
            ValidationResult::Rejected(reason) => Some(reason),
        }
    }
}

/// Why a filename failed the naming contract, one variant per rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    InvalidFormat { expected: usize, found: usize },
    InvalidPrefix { expected: String, found: String },
    EmptyDate,
    InvalidSuffix { expected: String, found: String },
    InvalidDate { value: String },
    DateMismatch { expected: NaiveDate, found: NaiveDate },
}

impl Rejection {
    pub fn code(&self) -> &'static str {
        match self {
            Rejection::InvalidFormat { .. } => "invalid format",
            Rejection::InvalidPrefix { .. } => "invalid prefix",
            Rejection::EmptyDate => "empty date",
            Rejection::InvalidSuffix { .. } => "invalid suffix",
            Rejection::InvalidDate { .. } => "invalid date",
            Rejection::DateMismatch { .. } => "date mismatch",
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::InvalidFormat { expected, found } => write!(
                f,
                "{}: expected {} parts, got {}",
                self.code(),
                expected,
                found
            ),
            Rejection::InvalidPrefix { expected, found } => {
                write!(f, "{}: expected {}, got {}", self.code(), expected, found)
            }
            Rejection::EmptyDate => write!(f, "{}", self.code()),
            Rejection::InvalidSuffix { expected, found } => {
                write!(f, "{}: expected {}, got {}", self.code(), expected, found)
            }
            Rejection::InvalidDate { value } => write!(f, "{}: {}", self.code(), value),
            Rejection::DateMismatch { expected, found } => write!(
                f,
                "{}: expected {}, got {}",
                self.code(),
                expected.format("%Y%m%d"),
                found.format("%Y%m%d")
            ),
        }
    }
}

/// The file carried from fetch through publish.
#[derive(Debug, Clone)]
pub struct TransferJob {
    pub remote_path: String,
    pub file_name: String,
    pub content: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishedArtifact {
    pub object_key: String,
    pub signed_url: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CleanupOutcome {
    Removed { attempts: u32 },
    Skipped,
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub remote_path: String,
    pub artifact: PublishedArtifact,
    pub cleanup: CleanupOutcome,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_messages_lead_with_code() {
        let reason = Rejection::DateMismatch {
            expected: NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(),
            found: NaiveDate::from_ymd_opt(2025, 1, 30).unwrap(),
        };
        assert_eq!(
            reason.to_string(),
            "date mismatch: expected 20250131, got 20250130"
        );

        let reason = Rejection::InvalidFormat {
            expected: 3,
            found: 2,
        };
        assert_eq!(reason.to_string(), "invalid format: expected 3 parts, got 2");
    }

    #[test]
    fn cleanup_outcome_serializes_with_status_tag() {
        let json = serde_json::to_value(CleanupOutcome::Removed { attempts: 2 }).unwrap();
        assert_eq!(json["status"], "removed");
        assert_eq!(json["attempts"], 2);
    }
}
