use std::collections::HashMap;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::output::OutputFormat;

pub const DEFAULT_METHOD: &str = "GET";
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 5;

/// Where the certificate chain of an HTTPS target is inspected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum TlsProbeMode {
    /// Capture the chain during the handshake of the HTTP request itself.
    #[default]
    SameConnection,
    /// Open a second TCP+TLS connection after the request to read the chain.
    SeparateConnection,
}

/// A fully resolved check configuration, handed to the executor.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckConfig {
    /// Absolute URL of the target.
    pub url: String,

    /// HTTP verb, `GET` unless configured.
    pub method: String,

    pub body: Option<String>,

    /// Request headers. A `Host` entry overrides the virtual host of the request.
    pub headers: HashMap<String, String>,

    pub follow_redirects: bool,

    /// Connection and request timeout. Zero disables the timeout.
    pub timeout_seconds: u64,

    /// Pattern searched in the response body. Unset or empty always matches.
    pub regex: Option<String>,

    pub tls_probe: TlsProbeMode,

    /// Name servers used to resolve the target. Empty means system configuration.
    pub dns_servers: Vec<IpAddr>,
}

impl CheckConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: DEFAULT_METHOD.to_string(),
            body: None,
            headers: HashMap::new(),
            follow_redirects: true,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            regex: None,
            tls_probe: TlsProbeMode::default(),
            dns_servers: Vec::new(),
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_seconds > 0).then(|| Duration::from_secs(self.timeout_seconds))
    }

    /// Value of the `Host` header, matched case-insensitively.
    pub fn host_override(&self) -> Option<&str> {
        self.headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("host"))
            .map(|(_, value)| value.as_str())
    }
}

/// The YAML configuration file. Every field is optional; anything left out
/// falls back to flags, environment or the built-in defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileConfig {
    pub url: Option<String>,
    pub method: Option<String>,
    pub body: Option<String>,

    #[serde(default)]
    pub headers: HashMap<String, String>,

    pub follow_redirects: Option<bool>,

    /// Timeout in seconds.
    pub timeout: Option<u64>,

    pub regex: Option<String>,
    pub tls_probe: Option<TlsProbeMode>,

    #[serde(default)]
    pub dns_servers: Vec<IpAddr>,

    /// Log destination: `stderr`, `stdout` or a file path.
    pub log: Option<String>,

    pub output: Option<OutputFormat>,
}

/// Default location of the configuration file, `~/.oxycheck.yml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".oxycheck.yml"))
}
