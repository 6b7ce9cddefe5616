use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;

use reqwest::header::{HOST, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, redirect};
use rustls::pki_types::ServerName;
use tracing::{debug, info, warn};
use url::{Host, Url};

use super::prelude::*;
use super::tls::{self, CapturingVerifier, TlsReport};
use crate::config::app_config::setup_resolver;
use crate::config::check_config::{CheckConfig, TlsProbeMode};
use crate::error::CheckError;

const MAX_REDIRECTS: usize = 10;
const USER_AGENT: &str = concat!("oxycheck/", env!("CARGO_PKG_VERSION"));

/// Where the check connects to and which host it claims to be talking to.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Target {
    /// URL the request is sent to. Its host is the virtual host.
    pub request_url: Url,
    /// Host from the configured URL; the socket destination.
    pub dial_host: String,
    pub dial_ip: Option<IpAddr>,
    pub port: u16,
    /// Name used for SNI and certificate verification.
    pub virtual_host: String,
    /// Explicit `Host` header value, only kept when it names a port.
    pub host_header: Option<String>,
    pub https: bool,
}

fn host_name(host: &Host<&str>) -> String {
    match host {
        Host::Domain(domain) => domain.to_string(),
        Host::Ipv4(ip) => ip.to_string(),
        Host::Ipv6(ip) => ip.to_string(),
    }
}

fn host_ip(host: &Host<&str>) -> Option<IpAddr> {
    match host {
        Host::Domain(_) => None,
        Host::Ipv4(ip) => Some(IpAddr::V4(*ip)),
        Host::Ipv6(ip) => Some(IpAddr::V6(*ip)),
    }
}

impl Target {
    pub(crate) fn parse(raw_url: &str, host_override: Option<&str>) -> Result<Self, CheckError> {
        let invalid = |message: String| CheckError::InvalidUrl {
            url: raw_url.to_string(),
            message,
        };

        let url = Url::parse(raw_url).map_err(|e| invalid(e.to_string()))?;
        let https = match url.scheme() {
            "https" => true,
            "http" => false,
            other => return Err(invalid(format!("unsupported scheme '{other}'"))),
        };
        let host = url.host().ok_or_else(|| invalid("missing host".to_string()))?;
        let dial_host = host_name(&host);
        let dial_ip = host_ip(&host);
        let port = url
            .port_or_known_default()
            .ok_or_else(|| invalid("missing port".to_string()))?;

        let mut request_url = url.clone();
        let mut virtual_host = dial_host.clone();
        let mut host_header = None;

        if let Some(value) = host_override.map(str::trim).filter(|v| !v.is_empty()) {
            let bad_host = |message: String| CheckError::InvalidRequest {
                message: format!("invalid Host header '{value}': {message}"),
            };
            let authority = Url::parse(&format!("http://{value}")).map_err(|e| bad_host(e.to_string()))?;
            let override_host = authority
                .host()
                .ok_or_else(|| bad_host("missing host".to_string()))?;
            virtual_host = host_name(&override_host);
            match override_host {
                // A name can be pinned to the dial address, so it goes into the URL.
                Host::Domain(domain) => {
                    request_url
                        .set_host(Some(domain))
                        .map_err(|e| bad_host(e.to_string()))?;
                    if authority.port().is_some() {
                        host_header = Some(value.to_string());
                    }
                }
                // An address in the URL would be dialled; send it as a header only.
                Host::Ipv4(_) | Host::Ipv6(_) => host_header = Some(value.to_string()),
            }
        }

        Ok(Self {
            request_url,
            dial_host,
            dial_ip,
            port,
            virtual_host,
            host_header,
            https,
        })
    }
}

/// Resolve the dial host. Returns the socket addresses and, when DNS was
/// actually used, the time the lookup took.
async fn resolve_dial_addrs(
    target: &Target,
    config: &CheckConfig,
) -> Result<(Vec<SocketAddr>, Option<f64>), CheckError> {
    if let Some(ip) = target.dial_ip {
        return Ok((vec![SocketAddr::new(ip, target.port)], None));
    }

    let resolver = setup_resolver(&config.dns_servers)
        .map_err(|e| CheckError::request_failed(&config.url, e))?;

    let start = Instant::now();
    let lookup = tls::within(config.timeout(), resolver.lookup_ip(target.dial_host.as_str()))
        .await
        .map_err(|e| CheckError::request_failed(&config.url, e))?
        .map_err(|e| CheckError::request_failed(&config.url, e))?;
    let dns_time = start.elapsed().as_secs_f64();

    let addrs: Vec<SocketAddr> = lookup
        .iter()
        .map(|ip| SocketAddr::new(ip, target.port))
        .collect();
    if addrs.is_empty() {
        return Err(CheckError::request_failed(
            &config.url,
            format!("no addresses found for {}", target.dial_host),
        ));
    }
    debug!(host = %target.dial_host, ?addrs, dns_time, "resolved target");
    Ok((addrs, Some(dns_time)))
}

fn build_headers(config: &CheckConfig, target: &Target) -> Result<HeaderMap, CheckError> {
    let mut headers = HeaderMap::new();
    for (name, value) in &config.headers {
        // The virtual host travels in the request URL.
        if name.eq_ignore_ascii_case("host") {
            continue;
        }
        let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
            CheckError::InvalidRequest {
                message: format!("invalid header name '{name}': {e}"),
            }
        })?;
        let header_value =
            HeaderValue::from_str(value).map_err(|e| CheckError::InvalidRequest {
                message: format!("invalid value for header '{name}': {e}"),
            })?;
        headers.append(header_name, header_value);
    }

    if let Some(host) = &target.host_header {
        let value = HeaderValue::from_str(host).map_err(|e| CheckError::InvalidRequest {
            message: format!("invalid Host header '{host}': {e}"),
        })?;
        headers.insert(HOST, value);
    }
    Ok(headers)
}

fn version_name(version: reqwest::Version) -> String {
    match version {
        reqwest::Version::HTTP_09 => "HTTP/0.9".to_string(),
        reqwest::Version::HTTP_10 => "HTTP/1.0".to_string(),
        reqwest::Version::HTTP_11 => "HTTP/1.1".to_string(),
        reqwest::Version::HTTP_2 => "HTTP/2.0".to_string(),
        reqwest::Version::HTTP_3 => "HTTP/3.0".to_string(),
        _ => "UNKNOWN".to_string(),
    }
}

/// Run one check cycle: a single HTTP request, certificate chain inspection
/// for HTTPS targets, and the body match.
///
/// The first fatal error aborts the check. An invalid certificate is not an
/// error; it is reported through `tls_valid` and `tls_errors`.
pub async fn run_check(config: &CheckConfig) -> Result<CheckResult, CheckError> {
    let target = Target::parse(&config.url, config.host_override())?;
    let timeout = config.timeout();

    let method = Method::from_bytes(config.method.trim().as_bytes()).map_err(|e| {
        CheckError::InvalidRequest {
            message: format!("invalid method '{}': {e}", config.method),
        }
    })?;
    let headers = build_headers(config, &target)?;

    let (dial_addrs, dns_lookup_seconds) = resolve_dial_addrs(&target, config).await?;

    let provider = tls::crypto_provider();
    let web_pki = tls::web_pki_verifier(provider.clone())?;
    let capturing = Arc::new(CapturingVerifier::new(web_pki.clone()));
    let tls_config = tls::capturing_client_config(provider, capturing.clone())?;

    let mut builder = reqwest::Client::builder()
        .use_preconfigured_tls(tls_config.clone())
        .pool_max_idle_per_host(0)
        .no_proxy()
        .user_agent(USER_AGENT)
        .redirect(if config.follow_redirects {
            redirect::Policy::limited(MAX_REDIRECTS)
        } else {
            redirect::Policy::none()
        });
    if let Some(limit) = timeout {
        builder = builder.connect_timeout(limit).timeout(limit);
    }
    // Pin the virtual host to the dialled addresses so DNS never redirects
    // the socket away from the configured target.
    if let Some(Host::Domain(domain)) = target.request_url.host() {
        builder = builder.resolve_to_addrs(domain, &dial_addrs);
    }
    let client = builder.build().map_err(|e| CheckError::InvalidRequest {
        message: format!("failed to build HTTP client: {e}"),
    })?;

    let mut request = client
        .request(method, target.request_url.clone())
        .headers(headers);
    if let Some(body) = &config.body {
        request = request.body(body.clone());
    }

    debug!(url = %target.request_url, dial = %target.dial_host, port = target.port, "sending request");
    let start = Instant::now();
    let response = request
        .send()
        .await
        .map_err(|e| CheckError::request_failed(&config.url, e))?;
    // Time to first response byte, counted from before name resolution.
    let response_time_seconds =
        dns_lookup_seconds.unwrap_or_default() + start.elapsed().as_secs_f64();

    let status_code = response.status().as_u16();
    let http_version = version_name(response.version());
    debug!(status_code, %http_version, response_time_seconds, "response headers received");

    let tls_report = if target.https {
        let server_name = ServerName::try_from(target.virtual_host.clone()).map_err(|e| {
            CheckError::TlsHandshakeFailed {
                host: target.virtual_host.clone(),
                port: target.port,
                message: format!("invalid server name: {e}"),
            }
        })?;

        let chain = match config.tls_probe {
            TlsProbeMode::SameConnection => {
                capturing.take().ok_or_else(|| CheckError::TlsHandshakeFailed {
                    host: target.virtual_host.clone(),
                    port: target.port,
                    message: "no certificate chain was presented during the handshake"
                        .to_string(),
                })?
            }
            TlsProbeMode::SeparateConnection => {
                tls::probe_peer_chain(
                    dial_addrs[0],
                    &target.virtual_host,
                    tls_config,
                    timeout,
                )
                .await?
            }
        };

        let report = tls::evaluate_chain(&web_pki, &chain, &server_name);
        for error in &report.errors {
            warn!(host = %target.virtual_host, "certificate verification failed: {error}");
        }
        report
    } else {
        TlsReport::skipped()
    };

    let body = response.bytes().await.map_err(CheckError::BodyReadFailed)?;
    let body_size_bytes = body.len();

    let regex_matched = match config.regex.as_deref().filter(|p| !p.is_empty()) {
        Some(pattern) => regex::bytes::Regex::new(pattern)?.is_match(&body),
        None => true,
    };

    info!(
        url = %config.url,
        status_code,
        response_time_seconds,
        body_size_bytes,
        regex_matched,
        tls_valid = tls_report.valid,
        "check complete"
    );

    Ok(CheckResult {
        url: config.url.clone(),
        status_code,
        http_version,
        response_time_seconds,
        dns_lookup_seconds,
        body_size_bytes,
        regex_matched,
        tls_valid: tls_report.valid,
        tls_expiry_seconds: tls_report.expiry_seconds,
        tls_errors: tls_report.errors,
    })
}
