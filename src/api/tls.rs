//! TLS configuration and certificate loading.

use std::path::Path;

use axum_server::tls_rustls::RustlsConfig;

use crate::config::ServerSettings;

/// Certificate and key paths, if both files exist.
pub fn tls_paths(settings: &ServerSettings) -> Option<(&Path, &Path)> {
    let cert = Path::new(&settings.cert);
    let key = Path::new(&settings.key);
    (!settings.cert.is_empty() && !settings.key.is_empty() && cert.is_file() && key.is_file())
        .then_some((cert, key))
}

/// Load TLS configuration from certificate and key files.
pub async fn load_tls_config(cert_path: &Path, key_path: &Path) -> Result<RustlsConfig, std::io::Error> {
    RustlsConfig::from_pem_file(cert_path, key_path).await
}
