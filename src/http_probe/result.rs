use serde::Serialize;

/// Outcome of one completed check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckResult {
    pub url: String,
    pub status_code: u16,
    pub http_version: String,
    /// Wall time from dispatch until the response headers arrived.
    pub response_time_seconds: f64,
    /// `None` when the URL host is an IP literal.
    pub dns_lookup_seconds: Option<f64>,
    pub body_size_bytes: usize,
    pub regex_matched: bool,
    /// Always true for plain HTTP targets.
    pub tls_valid: bool,
    /// Seconds until the leaf certificate expires, 0 for plain HTTP targets.
    pub tls_expiry_seconds: f64,
    pub tls_errors: Vec<String>,
}
