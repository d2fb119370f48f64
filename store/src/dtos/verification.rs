use common::error::{AppError, Res};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::verification::Outcome;

/// A verification being drafted, before the store assigns id and timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationDraft {
    pub contractor_name: String,
    pub trade: String,
    pub abn: String,
    pub licence: String,
    pub insurance: String,
    pub notes: String,
    pub outcome: Outcome,
}

impl Default for VerificationDraft {
    fn default() -> Self {
        VerificationDraft {
            contractor_name: String::new(),
            trade: String::new(),
            abn: String::new(),
            licence: String::new(),
            insurance: String::new(),
            notes: String::new(),
            outcome: Outcome::Verified,
        }
    }
}

impl VerificationDraft {
    /// Local precondition checked before any network call: the contractor
    /// name must be non-empty after trimming. Every other field may stay
    /// empty.
    pub fn validate(&self) -> Res<()> {
        if self.contractor_name.trim().is_empty() {
            return Err(AppError::BadRequest(
                "Add a contractor/business name.".to_string(),
            ));
        }
        Ok(())
    }
}

/// Insert payload: the draft plus the owning user id.
#[derive(Debug, Serialize)]
pub struct InsertVerification<'a> {
    pub user_id: Uuid,
    #[serde(flatten)]
    pub draft: &'a VerificationDraft,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_whitespace_names_are_rejected() {
        let mut draft = VerificationDraft::default();
        assert!(draft.validate().is_err());

        draft.contractor_name = "   \t ".to_string();
        assert!(draft.validate().is_err());

        draft.contractor_name = "North Shore Plumbing Co.".to_string();
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn insert_payload_carries_the_owner_and_all_draft_fields() {
        let draft = VerificationDraft {
            contractor_name: "North Shore Plumbing Co.".to_string(),
            trade: "Plumbing".to_string(),
            ..Default::default()
        };
        let user_id = Uuid::new_v4();
        let payload = serde_json::to_value(InsertVerification {
            user_id,
            draft: &draft,
        })
        .unwrap();
        assert_eq!(payload["user_id"], serde_json::json!(user_id));
        assert_eq!(payload["contractor_name"], "North Shore Plumbing Co.");
        assert_eq!(payload["trade"], "Plumbing");
        assert_eq!(payload["outcome"], "verified");
    }
}
