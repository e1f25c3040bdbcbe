//! LND REST client.
//!
//! # Responsibilities
//! - Load the node's TLS certificate and macaroon from disk
//! - Authenticate every request with the macaroon header
//! - Verify credentials with a `getinfo` handshake at connect time
//! - Open long-lived event subscriptions
//!
//! # Security Constraints
//! - Only the node's own certificate is trusted
//! - Never log the macaroon

use std::fs;
use std::time::Duration;

use bytes::Bytes;
use futures_util::stream::BoxStream;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Certificate, Client, Response};
use url::Url;

use crate::config::{EventStream, NodeSettings};
use crate::lnd::types::{NodeError, NodeInfo};
use crate::observability::metrics;

const MACAROON_HEADER: &str = "grpc-metadata-macaroon";

/// Raw body chunks of a streaming response.
pub type EventBody = BoxStream<'static, Result<Bytes, reqwest::Error>>;

/// Authenticated session with the node's REST endpoint.
#[derive(Clone)]
pub struct NodeConnection {
    client: Client,
    base_url: Url,
    rpc_timeout: Duration,
    info: NodeInfo,
}

impl NodeConnection {
    /// Load credentials, build the client and verify the connection.
    pub async fn connect(settings: &NodeSettings) -> Result<Self, NodeError> {
        let certificate = load_certificate(&settings.tls)?;
        let macaroon = load_macaroon(&settings.macaroon)?;
        let base_url = parse_address(&settings.node_address)?;
        let rpc_timeout = Duration::from_secs(settings.rpc_timeout_secs);

        let mut headers = HeaderMap::new();
        headers.insert(MACAROON_HEADER, macaroon);

        // No overall request timeout: subscriptions stay open indefinitely.
        let client = Client::builder()
            .add_root_certificate(certificate)
            .default_headers(headers)
            .connect_timeout(rpc_timeout)
            .build()?;

        let mut connection = Self {
            client,
            base_url,
            rpc_timeout,
            info: NodeInfo::default(),
        };
        connection.info = connection.get_info().await?;

        tracing::info!(
            alias = %connection.info.alias,
            pubkey = %connection.info.identity_pubkey,
            version = %connection.info.version,
            block_height = connection.info.block_height,
            synced = connection.info.synced_to_chain,
            "Connected to lightning node"
        );
        metrics::record_node_session_opened();

        Ok(connection)
    }

    /// `GET /v1/getinfo`.
    pub async fn get_info(&self) -> Result<NodeInfo, NodeError> {
        let url = self.url("/v1/getinfo")?;
        let response = self
            .client
            .get(url)
            .timeout(self.rpc_timeout)
            .send()
            .await?;
        let response = ensure_success(response).await?;
        Ok(response.json().await?)
    }

    /// Open a subscription and return its body as a byte stream.
    pub async fn subscribe(&self, stream: EventStream) -> Result<EventBody, NodeError> {
        let url = self.url(stream.path())?;
        let response = self.client.get(url).send().await?;
        let response = ensure_success(response).await?;

        tracing::info!(stream = %stream, "Subscribed to node events");
        Ok(Box::pin(response.bytes_stream()))
    }

    /// Info reported by the node during the connect handshake.
    pub fn info(&self) -> &NodeInfo {
        &self.info
    }

    /// Drop the session. Idle pooled connections close with the last clone
    /// of the client; open subscriptions end when their tasks return.
    pub fn close(self) {
        tracing::info!(address = %self.base_url, "Closing node connection");
        metrics::record_node_session_closed();
    }

    fn url(&self, path: &str) -> Result<Url, NodeError> {
        self.base_url
            .join(path)
            .map_err(|e| NodeError::Address(format!("{}{}: {}", self.base_url, path, e)))
    }
}

impl std::fmt::Debug for NodeConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeConnection")
            .field("base_url", &self.base_url.as_str())
            .field("alias", &self.info.alias)
            .field("rpc_timeout", &self.rpc_timeout)
            .finish()
    }
}

async fn ensure_success(response: Response) -> Result<Response, NodeError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(NodeError::Status {
        status: status.as_u16(),
        body,
    })
}

/// `host:port` (or a full URL) → `https://host:port/`.
pub fn parse_address(address: &str) -> Result<Url, NodeError> {
    let candidate = if address.contains("://") {
        address.to_string()
    } else {
        format!("https://{address}")
    };
    let url = Url::parse(&candidate).map_err(|e| NodeError::Address(format!("{address}: {e}")))?;
    if url.host_str().is_none() {
        return Err(NodeError::Address(address.to_string()));
    }
    Ok(url)
}

fn load_certificate(path: &str) -> Result<Certificate, NodeError> {
    if path.is_empty() {
        return Err(NodeError::MissingCredential("lnd.tls"));
    }
    let pem = fs::read(path).map_err(|e| NodeError::Credential {
        what: "tls certificate",
        path: path.to_string(),
        reason: e.to_string(),
    })?;
    Certificate::from_pem(&pem).map_err(|e| NodeError::Credential {
        what: "tls certificate",
        path: path.to_string(),
        reason: e.to_string(),
    })
}

/// Read a binary macaroon and encode it for the header.
fn load_macaroon(path: &str) -> Result<HeaderValue, NodeError> {
    if path.is_empty() {
        return Err(NodeError::MissingCredential("lnd.macaroon"));
    }
    let raw = fs::read(path).map_err(|e| NodeError::Credential {
        what: "macaroon",
        path: path.to_string(),
        reason: e.to_string(),
    })?;
    let mut value = HeaderValue::from_str(&hex::encode(raw)).map_err(|e| NodeError::Credential {
        what: "macaroon",
        path: path.to_string(),
        reason: e.to_string(),
    })?;
    value.set_sensitive(true);
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address() {
        let url = parse_address("localhost:8080").unwrap();
        assert_eq!(url.as_str(), "https://localhost:8080/");

        let url = parse_address("https://node.example:8443").unwrap();
        assert_eq!(url.port(), Some(8443));

        assert!(parse_address("").is_err());
    }

    #[tokio::test]
    async fn test_missing_credentials_fail_before_any_request() {
        let settings = NodeSettings::default();
        let err = NodeConnection::connect(&settings).await.unwrap_err();
        assert!(matches!(err, NodeError::MissingCredential("lnd.tls")));
    }

    #[tokio::test]
    async fn test_unreadable_certificate() {
        let settings = NodeSettings {
            tls: "/nonexistent/tls.cert".to_string(),
            macaroon: "/nonexistent/admin.macaroon".to_string(),
            ..Default::default()
        };
        let err = NodeConnection::connect(&settings).await.unwrap_err();
        assert!(matches!(err, NodeError::Credential { what: "tls certificate", .. }));
    }

    #[test]
    fn test_macaroon_is_hex_encoded() {
        let file = tempfile::NamedTempFile::new().unwrap();
        fs::write(file.path(), [0x02u8, 0x01, 0xff]).unwrap();

        let value = load_macaroon(file.path().to_str().unwrap()).unwrap();
        assert_eq!(value.to_str().unwrap(), "0201ff");
        assert!(value.is_sensitive());
    }
}
