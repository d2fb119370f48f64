use reqwest::Response;

use crate::error::{AppError, Res};

/// Passes a successful response through; otherwise extracts the provider's
/// error message for display.
pub async fn ensure_success(response: Response) -> Res<Response> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(provider_error(response).await)
    }
}

/// Builds an [`AppError::Provider`] from a non-success response.
///
/// Both services report failures as a small JSON body whose message key
/// varies by endpoint; the message text is treated as opaque display text.
/// Bodies that are not JSON fall back to the status code.
pub async fn provider_error(response: Response) -> AppError {
    let status = response.status();
    let message = match response.json::<serde_json::Value>().await {
        Ok(body) => ["message", "error_description", "msg", "error"]
            .iter()
            .find_map(|key| body.get(key).and_then(|v| v.as_str()))
            .map(str::to_string),
        Err(_) => None,
    };

    match message {
        Some(message) => AppError::Provider(message),
        None => AppError::Provider(format!("Service returned error status: {}", status)),
    }
}
