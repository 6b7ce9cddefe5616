//! Result presentation: aligned text or JSON on stdout.

use std::fmt::Write;

use serde::Deserialize;

use crate::http_probe::result::CheckResult;

const LABEL_WIDTH: usize = 14;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

fn to_fixed_width(input: &str, width: usize) -> String {
    use unicode_truncate::UnicodeTruncateStr;

    let (truncated, _) = input.unicode_truncate(width);
    format!("{:<width$}", truncated, width = width)
}

pub fn render(result: &CheckResult, format: OutputFormat) -> Result<String, serde_json::Error> {
    match format {
        OutputFormat::Text => Ok(render_text(result)),
        OutputFormat::Json => serde_json::to_string_pretty(result),
    }
}

fn render_text(result: &CheckResult) -> String {
    let dns = result
        .dns_lookup_seconds
        .map(|d| format!("{:.2}ms", d * 1000.0))
        .unwrap_or_else(|| "N/A".to_string());

    let rows = [
        ("url", result.url.clone()),
        ("status code", result.status_code.to_string()),
        ("http version", result.http_version.clone()),
        ("response time", format!("{:.2}ms", result.response_time_seconds * 1000.0)),
        ("dns lookup", dns),
        ("body size", result.body_size_bytes.to_string()),
        ("regex match", result.regex_matched.to_string()),
        ("tls valid", result.tls_valid.to_string()),
        (
            "tls expiry",
            format!(
                "{:.0}s ({:.2}d)",
                result.tls_expiry_seconds,
                result.tls_expiry_seconds / 86400.0
            ),
        ),
    ];

    let mut out = String::new();
    for (label, value) in rows {
        let _ = writeln!(out, "{}: {}", to_fixed_width(label, LABEL_WIDTH), value);
    }
    for error in &result.tls_errors {
        let _ = writeln!(out, "  ❌ {error}");
    }
    out.trim_end().to_string()
}
