use std::{fs, path::PathBuf, sync::RwLock};

use async_trait::async_trait;
use common::{
    env_config::ServiceConfig,
    error::{AppError, Res},
    http::ensure_success,
};
use store::client::BearerSource;
use tokio::sync::broadcast;
use url::Url;

use crate::{
    dtos::auth::{
        CredentialsRequest, RecoverRequest, SignUpPayload, TokenPayload, UpdatePasswordRequest,
        UserPayload,
    },
    session::{
        Identity, Session, SessionEvent, SessionEvents, recovery_tokens, tag_recovery,
    },
};

/// The vendor identity provider. Sessions are issued and revoked here;
/// the rest of the system only observes them.
#[async_trait]
pub trait IdentityService: Send + Sync {
    /// Password sign-in.
    async fn sign_in(&self, email: &str, password: &str) -> Res<Session>;

    /// Sign-up. `None` means the provider wants the email confirmed before
    /// it will issue a session.
    async fn sign_up(&self, email: &str, password: &str, redirect_to: &str)
    -> Res<Option<Session>>;

    /// Revokes the session remotely (best-effort) and clears it locally.
    async fn sign_out(&self) -> Res<()>;

    fn current_session(&self) -> Option<Session>;

    /// Requests a password reset email whose link returns to `callback`
    /// tagged with the recovery marker.
    async fn send_recovery_email(&self, email: &str, callback: &str) -> Res<()>;

    /// Establishes a recovery session from a followed reset link.
    async fn adopt_recovery(&self, callback: &Url) -> Res<Session>;

    /// Updates the signed-in user's password. Requires an active session.
    async fn update_password(&self, new_password: &str) -> Res<Session>;

    /// Restores and revalidates a cached session, if any.
    async fn hydrate(&self) -> Res<Option<Identity>>;

    fn subscribe(&self) -> broadcast::Receiver<SessionEvent>;
}

/// REST client for a GoTrue-style auth API.
pub struct RestIdentityClient {
    http: reqwest::Client,
    base: Url,
    anon_key: String,
    session: RwLock<Option<Session>>,
    events: SessionEvents,
    cache_path: PathBuf,
}

impl RestIdentityClient {
    pub fn new(service: &ServiceConfig, cache_path: PathBuf) -> Res<Self> {
        let base = Url::parse(&format!("{}/", service.base_url.trim_end_matches('/')))?;
        Ok(RestIdentityClient {
            http: reqwest::Client::new(),
            base,
            anon_key: service.anon_key.clone(),
            session: RwLock::new(None),
            events: SessionEvents::new(),
            cache_path,
        })
    }

    fn endpoint(&self, path: &str) -> Res<Url> {
        Ok(self.base.join(&format!("auth/v1/{}", path))?)
    }

    fn with_token(&self, request: reqwest::RequestBuilder, token: &str) -> reqwest::RequestBuilder {
        request
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", token))
    }

    fn anon(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", self.anon_key))
    }

    /// Replaces the held session, mirrors it into the cache file, and
    /// notifies subscribers. The cache write is best-effort: a failure
    /// degrades to a session that will not survive restart.
    fn set_session(&self, session: Option<Session>) {
        {
            let mut guard = self.session.write().expect("session lock poisoned");
            *guard = session.clone();
        }
        match session {
            Some(session) => {
                match serde_json::to_string(&session) {
                    Ok(json) => {
                        if let Err(err) = fs::write(&self.cache_path, json) {
                            log::warn!("failed to cache session: {}", err);
                        }
                    }
                    Err(err) => log::warn!("failed to serialize session: {}", err),
                }
                self.events.emit(SessionEvent::SignedIn(session.identity));
            }
            None => {
                let _ = fs::remove_file(&self.cache_path);
                self.events.emit(SessionEvent::SignedOut);
            }
        }
    }

    async fn fetch_identity(&self, access_token: &str) -> Res<Identity> {
        let response = self
            .with_token(self.http.get(self.endpoint("user")?), access_token)
            .send()
            .await?;
        let user: UserPayload = ensure_success(response).await?.json().await?;
        Ok(Identity {
            id: user.id,
            email: user.email.unwrap_or_default(),
        })
    }
}

#[async_trait]
impl IdentityService for RestIdentityClient {
    async fn sign_in(&self, email: &str, password: &str) -> Res<Session> {
        let response = self
            .anon(self.http.post(self.endpoint("token")?))
            .query(&[("grant_type", "password")])
            .json(&CredentialsRequest { email, password })
            .send()
            .await?;
        let payload: TokenPayload = ensure_success(response).await?.json().await?;

        let session = Session {
            access_token: payload.access_token,
            refresh_token: payload.refresh_token.unwrap_or_default(),
            identity: Identity {
                id: payload.user.id,
                email: payload.user.email.unwrap_or_else(|| email.to_string()),
            },
        };
        self.set_session(Some(session.clone()));
        Ok(session)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        redirect_to: &str,
    ) -> Res<Option<Session>> {
        let response = self
            .anon(self.http.post(self.endpoint("signup")?))
            .query(&[("redirect_to", redirect_to)])
            .json(&CredentialsRequest { email, password })
            .send()
            .await?;
        let payload: SignUpPayload = ensure_success(response).await?.json().await?;

        match (payload.access_token, payload.user) {
            (Some(access_token), Some(user)) => {
                let session = Session {
                    access_token,
                    refresh_token: payload.refresh_token.unwrap_or_default(),
                    identity: Identity {
                        id: user.id,
                        email: user.email.unwrap_or_else(|| email.to_string()),
                    },
                };
                self.set_session(Some(session.clone()));
                Ok(Some(session))
            }
            // Confirmation required: the response carries only the pending user.
            _ => Ok(None),
        }
    }

    async fn sign_out(&self) -> Res<()> {
        if let Some(session) = self.current_session() {
            let revoke = self
                .with_token(self.http.post(self.endpoint("logout")?), &session.access_token)
                .send()
                .await;
            match revoke {
                Ok(response) if !response.status().is_success() => {
                    log::warn!("remote sign-out returned {}", response.status());
                }
                Err(err) => log::warn!("remote sign-out failed: {}", err),
                Ok(_) => {}
            }
        }
        self.set_session(None);
        Ok(())
    }

    fn current_session(&self) -> Option<Session> {
        self.session
            .read()
            .expect("session lock poisoned")
            .clone()
    }

    async fn send_recovery_email(&self, email: &str, callback: &str) -> Res<()> {
        let redirect_to = tag_recovery(callback)?;
        let response = self
            .anon(self.http.post(self.endpoint("recover")?))
            .query(&[("redirect_to", redirect_to.as_str())])
            .json(&RecoverRequest { email })
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn adopt_recovery(&self, callback: &Url) -> Res<Session> {
        let (access_token, refresh_token) = recovery_tokens(callback).ok_or_else(|| {
            AppError::BadRequest(
                "Recovery link is missing its session token. Use the email link again."
                    .to_string(),
            )
        })?;

        let identity = self.fetch_identity(&access_token).await?;
        let session = Session {
            access_token,
            refresh_token,
            identity,
        };
        self.set_session(Some(session.clone()));
        Ok(session)
    }

    async fn update_password(&self, new_password: &str) -> Res<Session> {
        let session = self.current_session().ok_or_else(|| {
            AppError::Precondition("No recovery session. Use the email link again.".to_string())
        })?;

        let response = self
            .with_token(self.http.put(self.endpoint("user")?), &session.access_token)
            .json(&UpdatePasswordRequest {
                password: new_password,
            })
            .send()
            .await?;
        let user: UserPayload = ensure_success(response).await?.json().await?;

        let session = Session {
            access_token: session.access_token,
            refresh_token: session.refresh_token,
            identity: Identity {
                id: user.id,
                email: user.email.unwrap_or(session.identity.email),
            },
        };
        self.set_session(Some(session.clone()));
        Ok(session)
    }

    async fn hydrate(&self) -> Res<Option<Identity>> {
        if let Some(session) = self.current_session() {
            return Ok(Some(session.identity));
        }
        if !self.cache_path.exists() {
            return Ok(None);
        }

        let cached: Session = match fs::read_to_string(&self.cache_path)
            .map_err(AppError::from)
            .and_then(|raw| serde_json::from_str(&raw).map_err(AppError::from))
        {
            Ok(session) => session,
            Err(err) => {
                log::warn!("discarding unreadable session cache: {}", err);
                let _ = fs::remove_file(&self.cache_path);
                return Ok(None);
            }
        };

        let response = self
            .with_token(self.http.get(self.endpoint("user")?), &cached.access_token)
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::UNAUTHORIZED
            || response.status() == reqwest::StatusCode::FORBIDDEN
        {
            // Expired or revoked since last run. Not an error.
            log::debug!("cached session rejected by the identity service");
            let _ = fs::remove_file(&self.cache_path);
            return Ok(None);
        }
        let user: UserPayload = ensure_success(response).await?.json().await?;

        let session = Session {
            access_token: cached.access_token,
            refresh_token: cached.refresh_token,
            identity: Identity {
                id: user.id,
                email: user.email.unwrap_or(cached.identity.email),
            },
        };
        self.set_session(Some(session.clone()));
        Ok(Some(session.identity))
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}

impl BearerSource for RestIdentityClient {
    fn access_token(&self) -> Option<String> {
        self.session
            .read()
            .expect("session lock poisoned")
            .as_ref()
            .map(|session| session.access_token.clone())
    }
}
