use std::str::FromStr;

use common::error::AppError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Australian state/territory codes accepted on a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Region {
    Nsw,
    Vic,
    Qld,
    Wa,
    Sa,
    Tas,
    Act,
    Nt,
}

impl Region {
    pub const ALL: [Region; 8] = [
        Region::Nsw,
        Region::Vic,
        Region::Qld,
        Region::Wa,
        Region::Sa,
        Region::Tas,
        Region::Act,
        Region::Nt,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Region::Nsw => "NSW",
            Region::Vic => "VIC",
            Region::Qld => "QLD",
            Region::Wa => "WA",
            Region::Sa => "SA",
            Region::Tas => "TAS",
            Region::Act => "ACT",
            Region::Nt => "NT",
        }
    }
}

impl FromStr for Region {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Region::ALL
            .into_iter()
            .find(|region| region.code().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| AppError::BadRequest(format!("Unknown state/territory: {}", s)))
    }
}

/// Per-user organisation details. One row per user id; a user with no row
/// yet is indistinguishable from one who saved the default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: Uuid,
    pub org_name: String,
    pub role: String,
    pub phone: String,
    pub state: Region,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl Profile {
    /// The profile presented when the store holds no row for this user.
    pub fn default_for(user_id: Uuid) -> Self {
        Profile {
            user_id,
            org_name: String::new(),
            role: String::new(),
            phone: String::new(),
            state: Region::Nsw,
            updated_at: None,
        }
    }
}
