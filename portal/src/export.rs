use std::{
    fs,
    path::{Path, PathBuf},
};

use chrono::NaiveDate;
use common::error::Res;
use identity::session::Identity;
use serde::Serialize;
use store::models::{profile::Profile, verification::VerificationRecord};
use uuid::Uuid;

/// The downloadable snapshot: identity, profile, and the full record list.
#[derive(Debug, Serialize)]
pub struct ExportDocument<'a> {
    pub user_id: Uuid,
    pub email: &'a str,
    pub profile: &'a Profile,
    pub verifications: &'a [VerificationRecord],
}

pub fn build_export<'a>(
    identity: &'a Identity,
    profile: &'a Profile,
    verifications: &'a [VerificationRecord],
) -> ExportDocument<'a> {
    ExportDocument {
        user_id: identity.id,
        email: &identity.email,
        profile,
        verifications,
    }
}

/// Artifact name for the given day.
pub fn export_file_name(date: NaiveDate) -> String {
    format!("aussie-verify-export_{}.json", date.format("%Y-%m-%d"))
}

/// Serializes the snapshot and writes it under the export directory,
/// returning the written path.
pub fn write_export(dir: &Path, document: &ExportDocument<'_>, date: NaiveDate) -> Res<PathBuf> {
    let path = dir.join(export_file_name(date));
    let json = serde_json::to_string_pretty(document)?;
    fs::write(&path, json)?;
    Ok(path)
}
