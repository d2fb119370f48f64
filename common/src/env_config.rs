use std::{env, path::PathBuf, sync::Arc};

use crate::error::{AppError, Res};

#[derive(Clone, Debug)]
/// Configuration for the portal client.
///
/// Holds everything needed to reach the identity service and record store,
/// plus local paths for the session cache and export artifacts. The two
/// service values are optional on purpose: when they are missing the client
/// runs in a degraded mode where every remote operation is disabled, rather
/// than refusing to start.
pub struct Config {
    // environment
    pub environment: String, // development or production
    /// Endpoint and key for the managed backend, when configured.
    pub service: Option<ServiceConfig>,
    /// The URL the identity service redirects back to after a password
    /// reset email is followed.
    pub auth_callback_url: String,
    /// Where the current session is cached between runs.
    pub session_cache_path: PathBuf,
    /// Directory export artifacts are written into.
    pub export_dir: PathBuf,
    /// A boolean indicating whether console logging is enabled.
    pub console_logging_enabled: bool,
}

#[derive(Clone, Debug)]
/// Connection values for the managed backend service.
///
/// Both the identity service and the record store live under one base URL;
/// the anon key authorizes unauthenticated calls and accompanies every
/// request.
pub struct ServiceConfig {
    /// Base URL of the managed service.
    pub base_url: String,
    /// The publishable (anon) API key.
    pub anon_key: String,
}

impl Config {
    /// Creates a new `Config` instance from environment variables.
    ///
    /// Optional (with defaults):
    /// - `ENVIRONMENT`: "development" or "production" (default: "development")
    /// - `AUTH_CALLBACK_URL`: recovery redirect target (default: "http://localhost:3000/portal")
    /// - `SESSION_CACHE_PATH`: session cache file (default: ".aussie-verify-session.json")
    /// - `EXPORT_DIR`: export artifact directory (default: ".")
    /// - `ENABLE_CONSOLE_LOGGING`: whether to enable console logging (default: true)
    ///
    /// `SUPABASE_URL` and `SUPABASE_ANON_KEY` enable the remote services;
    /// when either is absent or empty, `service` is `None` and the client
    /// degrades instead of crashing.
    pub fn from_env() -> Arc<Self> {
        dotenvy::dotenv().ok();

        let base_url = env::var("SUPABASE_URL").unwrap_or_default();
        let anon_key = env::var("SUPABASE_ANON_KEY").unwrap_or_default();
        let service = if base_url.is_empty() || anon_key.is_empty() {
            None
        } else {
            Some(ServiceConfig { base_url, anon_key })
        };

        Arc::new(Config {
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            service,
            auth_callback_url: env::var("AUTH_CALLBACK_URL")
                .unwrap_or_else(|_| "http://localhost:3000/portal".to_string()),
            session_cache_path: env::var("SESSION_CACHE_PATH")
                .unwrap_or_else(|_| ".aussie-verify-session.json".to_string())
                .into(),
            export_dir: env::var("EXPORT_DIR")
                .unwrap_or_else(|_| ".".to_string())
                .into(),
            console_logging_enabled: env::var("ENABLE_CONSOLE_LOGGING")
                .unwrap_or_else(|_| "true".to_string())
                .to_lowercase()
                == "true",
        })
    }

    /// The service configuration, or the configuration-missing error shown
    /// to the user when the portal is disabled.
    pub fn service(&self) -> Res<&ServiceConfig> {
        self.service.as_ref().ok_or_else(|| {
            AppError::Config(
                "Set SUPABASE_URL and SUPABASE_ANON_KEY to enable login and the portal."
                    .to_string(),
            )
        })
    }
}
