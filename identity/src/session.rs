use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use url::Url;
use uuid::Uuid;

/// The authenticated user as issued by the identity service. Observed,
/// never constructed locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
}

/// A vendor-issued session. Tokens are opaque strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub identity: Identity,
}

/// Push notification of session establishment or loss.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    SignedIn(Identity),
    SignedOut,
}

/// Event source the session controller subscribes to. Every session
/// mutation in the identity client emits here; nothing polls.
pub struct SessionEvents {
    tx: broadcast::Sender<SessionEvent>,
}

impl SessionEvents {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        SessionEvents { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    /// Send errors only mean no subscriber is listening yet.
    pub fn emit(&self, event: SessionEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for SessionEvents {
    fn default() -> Self {
        Self::new()
    }
}

const RECOVERY_KEY: &str = "type";
const RECOVERY_VALUE: &str = "recovery";

/// Tags a callback URL with the recovery marker the identity service
/// echoes back after a password reset email is followed.
pub fn tag_recovery(callback: &str) -> Result<String, url::ParseError> {
    let mut url = Url::parse(callback)?;
    if !is_recovery_callback(&url) {
        url.query_pairs_mut()
            .append_pair(RECOVERY_KEY, RECOVERY_VALUE);
    }
    Ok(url.into())
}

/// Presence of the marker is the sole trigger for entering recovery mode.
pub fn is_recovery_callback(url: &Url) -> bool {
    url.query_pairs()
        .any(|(key, value)| key == RECOVERY_KEY && value == RECOVERY_VALUE)
}

/// Token material from the fragment of a followed recovery link.
pub fn recovery_tokens(url: &Url) -> Option<(String, String)> {
    let fragment = url.fragment()?;
    let mut access_token = None;
    let mut refresh_token = None;
    for pair in fragment.split('&') {
        match pair.split_once('=') {
            Some(("access_token", value)) => access_token = Some(value.to_string()),
            Some(("refresh_token", value)) => refresh_token = Some(value.to_string()),
            _ => {}
        }
    }
    Some((access_token?, refresh_token.unwrap_or_default()))
}
