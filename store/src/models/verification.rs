use std::str::FromStr;

use common::error::AppError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Checklist outcome recorded against a contractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Verified,
    Review,
    Flagged,
}

impl Outcome {
    pub const ALL: [Outcome; 3] = [Outcome::Verified, Outcome::Review, Outcome::Flagged];

    /// Display label. Total over the enumeration.
    pub fn label(self) -> &'static str {
        match self {
            Outcome::Verified => "Verified",
            Outcome::Review => "Needs review",
            Outcome::Flagged => "Flagged",
        }
    }

    /// The wire value stored by the record store.
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Verified => "verified",
            Outcome::Review => "review",
            Outcome::Flagged => "flagged",
        }
    }
}

impl FromStr for Outcome {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Outcome::ALL
            .into_iter()
            .find(|outcome| outcome.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| AppError::BadRequest(format!("Unknown outcome: {}", s)))
    }
}

/// A single verification check, immutable once created except for deletion.
///
/// `id` and `created_at` are assigned server-side on insert; `created_at`
/// stays in its wire form and is only parsed for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub created_at: String,
    pub contractor_name: String,
    pub trade: String,
    pub abn: String,
    pub licence: String,
    pub insurance: String,
    pub notes: String,
    pub outcome: Outcome,
}
