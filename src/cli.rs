//! CLI argument definitions using clap

use std::net::IpAddr;
use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

use crate::config::check_config::TlsProbeMode;
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "oxycheck")]
#[command(version)]
#[command(about = "Single-shot HTTP/TLS health check", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// YAML configuration file (default: ~/.oxycheck.yml)
    #[arg(long, global = true, env = "OXYCHECK_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a single check against a URL
    Run(RunArgs),
}

/// Everything is optional here: unset values fall back to the config file.
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// URL to check
    #[arg(long, env = "OXYCHECK_URL")]
    pub url: Option<String>,

    /// Log destination: stderr, stdout or a file path
    #[arg(long, env = "OXYCHECK_LOG", value_name = "DEST")]
    pub log: Option<String>,

    /// HTTP method
    #[arg(short = 'X', long, env = "OXYCHECK_METHOD")]
    pub method: Option<String>,

    /// Request body
    #[arg(short = 'd', long, env = "OXYCHECK_BODY")]
    pub body: Option<String>,

    /// Request header, repeatable. `Host` overrides the virtual host.
    #[arg(short = 'H', long = "header", value_name = "NAME:VALUE")]
    pub headers: Vec<String>,

    /// Follow redirects (true/false)
    #[arg(long, env = "OXYCHECK_FOLLOW_REDIRECTS", action = ArgAction::Set, value_name = "BOOL")]
    pub follow_redirects: Option<bool>,

    /// Connection and request timeout in seconds, 0 for none
    #[arg(long, env = "OXYCHECK_TIMEOUT", value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Regular expression the response body must match
    #[arg(long, env = "OXYCHECK_REGEX")]
    pub regex: Option<String>,

    /// Where to inspect the certificate chain
    #[arg(long, value_enum, env = "OXYCHECK_TLS_PROBE")]
    pub tls_probe: Option<TlsProbeMode>,

    /// DNS server used to resolve the target, repeatable
    #[arg(long = "dns-server", value_name = "IP")]
    pub dns_servers: Vec<IpAddr>,

    /// Output format
    #[arg(short, long, value_enum, env = "OXYCHECK_OUTPUT")]
    pub output: Option<OutputFormat>,
}
