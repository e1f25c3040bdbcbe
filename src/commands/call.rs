//! `call`: one authenticated request against the running daemon's API.

use std::fs;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Certificate, Response};
use serde_json::Value;
use thiserror::Error;

use crate::api::tls::tls_paths;
use crate::config::ServerSettings;

#[derive(Debug, Error)]
pub enum CallError {
    #[error("failed to read API certificate {path}: {reason}")]
    Certificate { path: String, reason: String },

    #[error("invalid API password: {0}")]
    Password(#[from] reqwest::header::InvalidHeaderValue),

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid response body: {0}")]
    Body(#[from] serde_json::Error),
}

/// Fetch the ten most recent events and print them.
pub async fn call(settings: &ServerSettings) -> Result<(), CallError> {
    let mut builder =
        reqwest::Client::builder().timeout(Duration::from_secs(settings.request_timeout_secs));

    // Same detection as the server: TLS only when both files are present.
    let scheme = match tls_paths(settings) {
        Some((cert, _)) => {
            let certificate = fs::read(cert)
                .map_err(|e| e.to_string())
                .and_then(|pem| Certificate::from_pem(&pem).map_err(|e| e.to_string()))
                .map_err(|reason| CallError::Certificate {
                    path: settings.cert.clone(),
                    reason,
                })?;
            builder = builder.add_root_certificate(certificate);
            "https"
        }
        None => "http",
    };
    let client = builder.build()?;

    let mut headers = HeaderMap::new();
    let mut token = HeaderValue::from_str(&format!("Bearer {}", settings.password))?;
    token.set_sensitive(true);
    headers.insert(AUTHORIZATION, token);

    let url = format!(
        "{scheme}://{}:{}/api/events?limit=10",
        settings.host, settings.port
    );
    tracing::debug!(url = %url, "Calling the API");

    let res = client.get(url).headers(headers).send().await?;
    print_response(res).await
}

async fn print_response(res: Response) -> Result<(), CallError> {
    let status = res.status();
    if !status.is_success() {
        let body = res.text().await.unwrap_or_default();
        return Err(CallError::Status {
            status: status.as_u16(),
            body,
        });
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
