use std::time::{Duration, Instant};

use oxycheck::CheckError;
use oxycheck::config::check_config::{CheckConfig, TlsProbeMode};
use oxycheck::http_probe::prelude::*;
use wiremock::matchers::{body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn server_with(route: &str, response: ResponseTemplate) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(response)
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_plain_http_check() {
    let server = server_with("/health", ResponseTemplate::new(200).set_body_string("status: ok")).await;
    let config = CheckConfig::new(format!("{}/health", server.uri()));

    let result = run_check(&config).await.expect("check failed");
    assert_eq!(result.status_code, 200);
    assert_eq!(result.body_size_bytes, "status: ok".len());
    assert!(result.regex_matched);
    assert!(result.tls_valid);
    assert_eq!(result.tls_expiry_seconds, 0.0);
    assert!(result.tls_errors.is_empty());
    assert!(result.response_time_seconds >= 0.0);
    // 127.0.0.1 is an IP literal, no DNS lookup happens.
    assert!(result.dns_lookup_seconds.is_none());
}

#[tokio::test]
async fn test_response_time_includes_dns_lookup() {
    let server = server_with("/", ResponseTemplate::new(200)).await;
    let config = CheckConfig::new(format!("http://localhost:{}/", server.address().port()));

    let result = run_check(&config).await.expect("check failed");
    assert_eq!(result.status_code, 200);
    let dns = result.dns_lookup_seconds.expect("localhost is resolved");
    assert!(
        result.response_time_seconds >= dns,
        "response {} < dns {dns}",
        result.response_time_seconds
    );
}

#[tokio::test]
async fn test_regex_matches_body() {
    let server = server_with("/", ResponseTemplate::new(200).set_body_string("<h1>Service healthy</h1>")).await;
    let mut config = CheckConfig::new(server.uri());
    config.regex = Some(r"Service\s+healthy".to_string());

    let result = run_check(&config).await.expect("check failed");
    assert!(result.regex_matched);
}

#[tokio::test]
async fn test_absent_pattern_does_not_match() {
    let server = server_with("/", ResponseTemplate::new(200).set_body_string("nothing to see")).await;
    let mut config = CheckConfig::new(server.uri());
    config.regex = Some("q8Zr3VxT0pLm2WkYb7NcA1sDe4FgHj6U".to_string());

    let result = run_check(&config).await.expect("check failed");
    assert!(!result.regex_matched);
}

#[tokio::test]
async fn test_empty_regex_always_matches() {
    let server = server_with("/", ResponseTemplate::new(200).set_body_string("anything")).await;
    let mut config = CheckConfig::new(server.uri());
    config.regex = Some(String::new());

    let result = run_check(&config).await.expect("check failed");
    assert!(result.regex_matched);
}

#[tokio::test]
async fn test_invalid_regex_fails_the_check() {
    let server = server_with("/", ResponseTemplate::new(200)).await;
    let mut config = CheckConfig::new(server.uri());
    config.regex = Some("(unclosed".to_string());

    let err = run_check(&config).await.err().expect("invalid regex accepted");
    assert!(matches!(err, CheckError::InvalidRegex(_)));
}

#[tokio::test]
async fn test_error_status_is_a_result_not_an_error() {
    let server = server_with("/down", ResponseTemplate::new(503).set_body_string("maintenance")).await;
    let config = CheckConfig::new(format!("{}/down", server.uri()));

    let result = run_check(&config).await.expect("check failed");
    assert_eq!(result.status_code, 503);
    assert_eq!(result.body_size_bytes, "maintenance".len());
}

async fn redirecting_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(
            ResponseTemplate::new(301).insert_header("Location", format!("{}/new", server.uri()).as_str()),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(ResponseTemplate::new(200).set_body_string("moved here"))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_redirect_is_returned_when_not_following() {
    let server = redirecting_server().await;
    let mut config = CheckConfig::new(format!("{}/old", server.uri()));
    config.follow_redirects = false;

    let result = run_check(&config).await.expect("check failed");
    assert_eq!(result.status_code, 301);
}

#[tokio::test]
async fn test_redirect_is_followed_by_default() {
    let server = redirecting_server().await;
    let config = CheckConfig::new(format!("{}/old", server.uri()));

    let result = run_check(&config).await.expect("check failed");
    assert_eq!(result.status_code, 200);
    assert_eq!(result.body_size_bytes, "moved here".len());
}

#[tokio::test]
async fn test_method_body_and_headers_are_sent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/submit"))
        .and(header("x-probe", "oxycheck"))
        .and(body_string("ping"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = CheckConfig::new(format!("{}/submit", server.uri()));
    config.method = "POST".to_string();
    config.body = Some("ping".to_string());
    config
        .headers
        .insert("X-Probe".to_string(), "oxycheck".to_string());

    let result = run_check(&config).await.expect("check failed");
    assert_eq!(result.status_code, 202);
}

#[tokio::test]
async fn test_host_header_sets_virtual_host_but_keeps_socket_target() {
    let server = server_with("/vhost", ResponseTemplate::new(200)).await;
    let mut config = CheckConfig::new(format!("{}/vhost", server.uri()));
    config
        .headers
        .insert("Host".to_string(), "virtual.example.test".to_string());

    let result = run_check(&config).await.expect("check failed");
    assert_eq!(result.status_code, 200);

    let requests = server.received_requests().await.expect("recording enabled");
    assert_eq!(requests.len(), 1);
    let host = requests[0]
        .headers
        .get("host")
        .and_then(|v| v.to_str().ok())
        .expect("host header");
    assert!(host.starts_with("virtual.example.test"), "unexpected host {host}");
}

#[tokio::test]
async fn test_invalid_method_is_rejected() {
    let mut config = CheckConfig::new("http://127.0.0.1:9/");
    config.method = "GE T".to_string();

    let err = run_check(&config).await.err().expect("invalid method accepted");
    assert!(matches!(err, CheckError::InvalidRequest { .. }));
}

#[tokio::test]
async fn test_malformed_url_is_rejected() {
    let err = run_check(&CheckConfig::new("://missing-scheme"))
        .await
        .err()
        .expect("malformed url accepted");
    assert!(matches!(err, CheckError::InvalidUrl { .. }));
}

#[tokio::test]
async fn test_connection_refused_is_request_failure() {
    // Bind then drop a listener to get a port nothing is listening on.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        listener.local_addr().expect("addr").port()
    };
    let config = CheckConfig::new(format!("http://127.0.0.1:{port}/"));

    let err = run_check(&config).await.err().expect("closed port accepted");
    assert!(matches!(err, CheckError::RequestFailed { .. }));
}

#[tokio::test]
async fn test_unroutable_target_times_out() {
    let mut config = CheckConfig::new("http://10.255.255.1/");
    config.timeout_seconds = 1;

    let start = Instant::now();
    let err = run_check(&config).await.err().expect("unroutable target answered");
    assert!(matches!(err, CheckError::RequestFailed { .. }));
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
#[ignore = "needs internet access"]
async fn test_https_valid_certificate() {
    let config = CheckConfig::new("https://example.com");

    let result = run_check(&config).await.expect("check failed");
    assert_eq!(result.status_code, 200);
    assert!(result.tls_valid, "errors: {:?}", result.tls_errors);
    assert!(result.tls_expiry_seconds > 0.0);
    assert!(result.regex_matched);
    assert!(result.body_size_bytes > 0);
    assert!(result.dns_lookup_seconds.is_some());
}

#[tokio::test]
#[ignore = "needs internet access"]
async fn test_https_valid_certificate_separate_connection() {
    let mut config = CheckConfig::new("https://example.com");
    config.tls_probe = TlsProbeMode::SeparateConnection;

    let result = run_check(&config).await.expect("check failed");
    assert!(result.tls_valid, "errors: {:?}", result.tls_errors);
    assert!(result.tls_expiry_seconds > 0.0);
}

#[tokio::test]
#[ignore = "needs internet access"]
async fn test_expired_certificate_is_reported_not_fatal() {
    let config = CheckConfig::new("https://expired.badssl.com");

    let result = run_check(&config).await.expect("check failed");
    assert!(!result.tls_valid);
    assert!(!result.tls_errors.is_empty());
    assert!(result.tls_expiry_seconds < 0.0);
    assert!((100..600).contains(&result.status_code));
}
