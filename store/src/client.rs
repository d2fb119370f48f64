use std::sync::Arc;

use async_trait::async_trait;
use common::{
    env_config::ServiceConfig,
    error::Res,
    http::ensure_success,
};
use url::Url;
use uuid::Uuid;

use crate::{
    dtos::verification::{InsertVerification, VerificationDraft},
    models::{profile::Profile, verification::VerificationRecord},
};

const PROFILE_COLUMNS: &str = "user_id,org_name,role,phone,state,updated_at";
const VERIFICATION_COLUMNS: &str =
    "id,user_id,created_at,contractor_name,trade,abn,licence,insurance,notes,outcome";

/// Supplies the bearer token for record store calls. The identity client
/// implements this so data requests run as the signed-in user; without a
/// session the anon key is used and the store's row isolation returns
/// nothing.
pub trait BearerSource: Send + Sync {
    fn access_token(&self) -> Option<String>;
}

/// The two vendor-managed collections, scoped by owning user id.
///
/// The store is the authority for cross-user isolation; every call here
/// still filters by `user_id` as deliberate defensive duplication.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// The profile row for this user, if one has ever been saved.
    async fn fetch_profile(&self, user_id: Uuid) -> Res<Option<Profile>>;

    /// Create-or-replace the profile row keyed by user id.
    async fn upsert_profile(&self, profile: &Profile) -> Res<()>;

    /// All verification records for this user, newest first.
    async fn list_records(&self, user_id: Uuid) -> Res<Vec<VerificationRecord>>;

    /// Insert a new record; the store assigns id and creation timestamp.
    async fn insert_record(&self, user_id: Uuid, draft: &VerificationDraft) -> Res<()>;

    /// Delete one record, keyed by record id AND owning user id.
    async fn delete_record(&self, user_id: Uuid, record_id: Uuid) -> Res<()>;
}

/// REST client for a PostgREST-style table API.
pub struct RestStoreClient {
    http: reqwest::Client,
    base: Url,
    anon_key: String,
    bearer: Arc<dyn BearerSource>,
}

impl RestStoreClient {
    pub fn new(service: &ServiceConfig, bearer: Arc<dyn BearerSource>) -> Res<Self> {
        let base = Url::parse(&format!("{}/", service.base_url.trim_end_matches('/')))?;
        Ok(RestStoreClient {
            http: reqwest::Client::new(),
            base,
            anon_key: service.anon_key.clone(),
            bearer,
        })
    }

    fn table(&self, name: &str) -> Res<Url> {
        Ok(self.base.join(&format!("rest/v1/{}", name))?)
    }

    fn authed(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let token = self
            .bearer
            .access_token()
            .unwrap_or_else(|| self.anon_key.clone());
        request
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", token))
    }
}

#[async_trait]
impl RecordStore for RestStoreClient {
    async fn fetch_profile(&self, user_id: Uuid) -> Res<Option<Profile>> {
        let owner = format!("eq.{}", user_id);
        let response = self
            .authed(self.http.get(self.table("profiles")?))
            .query(&[
                ("select", PROFILE_COLUMNS),
                ("user_id", owner.as_str()),
                ("limit", "1"),
            ])
            .send()
            .await?;
        let mut rows: Vec<Profile> = ensure_success(response).await?.json().await?;
        Ok(rows.drain(..).next())
    }

    async fn upsert_profile(&self, profile: &Profile) -> Res<()> {
        let response = self
            .authed(self.http.post(self.table("profiles")?))
            .query(&[("on_conflict", "user_id")])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(profile)
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn list_records(&self, user_id: Uuid) -> Res<Vec<VerificationRecord>> {
        let owner = format!("eq.{}", user_id);
        let response = self
            .authed(self.http.get(self.table("verifications")?))
            .query(&[
                ("select", VERIFICATION_COLUMNS),
                ("user_id", owner.as_str()),
                ("order", "created_at.desc"),
            ])
            .send()
            .await?;
        Ok(ensure_success(response).await?.json().await?)
    }

    async fn insert_record(&self, user_id: Uuid, draft: &VerificationDraft) -> Res<()> {
        let response = self
            .authed(self.http.post(self.table("verifications")?))
            .header("Prefer", "return=minimal")
            .json(&InsertVerification { user_id, draft })
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn delete_record(&self, user_id: Uuid, record_id: Uuid) -> Res<()> {
        let row = format!("eq.{}", record_id);
        let owner = format!("eq.{}", user_id);
        let response = self
            .authed(self.http.delete(self.table("verifications")?))
            .query(&[("id", row.as_str()), ("user_id", owner.as_str())])
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }
}
