//! Error types for the check executor and the configuration resolver.

use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Terminal failures of a single check. Certificate verification problems are
/// not errors: they are reported through `CheckResult::tls_valid`.
#[derive(Error, Debug)]
pub enum CheckError {
    #[error("invalid url '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error("invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("request to {url} failed")]
    RequestFailed {
        url: String,
        #[source]
        source: BoxError,
    },

    #[error("TLS handshake with {host}:{port} failed: {message}")]
    TlsHandshakeFailed {
        host: String,
        port: u16,
        message: String,
    },

    #[error("failed to read response body")]
    BodyReadFailed(#[source] reqwest::Error),

    #[error("invalid regular expression")]
    InvalidRegex(#[from] regex::Error),
}

impl CheckError {
    pub(crate) fn request_failed(url: &str, source: impl Into<BoxError>) -> Self {
        CheckError::RequestFailed {
            url: url.to_string(),
            source: source.into(),
        }
    }
}

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("failed to read configuration file {path}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration file {path}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("missing required configuration: {key}")]
    MissingRequired { key: String },

    #[error("invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("failed to initialise logging: {message}")]
    Logging { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alternate_format_includes_causes() {
        let err = anyhow::Error::new(CheckError::request_failed(
            "http://example.com",
            "connection refused",
        ))
        .context("check of http://example.com failed");
        assert_eq!(
            format!("{err:#}"),
            "check of http://example.com failed: request to http://example.com failed: connection refused"
        );
    }
}
