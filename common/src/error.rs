use thiserror::Error;

use crate::notice::Notice;

pub type Res<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    // === CONVERSION ERRORS ===
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // === APPLICATION ERRORS ===
    #[error("Service not configured: {0}")]
    Config(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Authorization error: {0}")]
    Unauthorized(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Precondition failed: {0}")]
    Precondition(String),

    // Message text from the identity service or record store, displayed verbatim.
    #[error("{0}")]
    Provider(String),

    #[error("{0}")]
    Internal(String),
}

impl AppError {
    /// Converts the error into a user-visible notice under the given title.
    ///
    /// Transport and serialization failures are also logged; application
    /// errors already carry display-ready text and are not.
    pub fn to_notice(&self, title: &str) -> Notice {
        match self {
            AppError::Http(_)
            | AppError::Json(_)
            | AppError::Url(_)
            | AppError::Io(_)
            | AppError::Internal(_) => {
                log::error!("{}: {}", title, self);
            }
            _ => {}
        }
        Notice::error(title).with_body(self.to_string())
    }
}
