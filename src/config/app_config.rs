use std::io::ErrorKind;
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

use trust_dns_resolver::{
    TokioAsyncResolver,
    config::{NameServerConfig, NameServerConfigGroup, Protocol, ResolverConfig, ResolverOpts},
    error::ResolveError,
};

use super::check_config::{
    CheckConfig, DEFAULT_METHOD, DEFAULT_TIMEOUT_SECONDS, FileConfig, default_config_path,
};
use super::logging::LogDestination;
use crate::cli::RunArgs;
use crate::error::ConfigError;
use crate::output::OutputFormat;

pub struct AppConfig {
    pub check: CheckConfig,
    pub log: LogDestination,
    pub output: OutputFormat,

    /// Problems met while loading that did not stop it. Logged once logging is up.
    pub warnings: Vec<String>,
}

/// Load the application configuration.
/// Values come from command line flags first, then environment variables (both
/// resolved by clap into `args`), then the YAML file, then the defaults.
/// A config file that cannot be read or parsed is reported as a warning and
/// the check continues on flags and defaults. The default `~/.oxycheck.yml`
/// is skipped silently when absent.
pub fn load_config(config_path: Option<&Path>, args: &RunArgs) -> Result<AppConfig, ConfigError> {
    let path = match config_path {
        Some(path) => Some(path.to_path_buf()),
        None => default_config_path().filter(|path| path.exists()),
    };

    let mut warnings = Vec::new();
    let file = match path {
        Some(path) => read_file_config(&path).unwrap_or_else(|e| {
            warnings.push(format!(
                "config specified but unable to read it, using defaults: {e}"
            ));
            FileConfig::default()
        }),
        None => FileConfig::default(),
    };

    let mut app = merge(args, file)?;
    app.warnings = warnings;
    Ok(app)
}

pub fn read_file_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let display = path.display().to_string();
    let config_str = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => ConfigError::FileNotFound {
            path: display.clone(),
        },
        _ => ConfigError::Read {
            path: display.clone(),
            source: e,
        },
    })?;

    // An empty file deserializes to `null`, which is as good as no file at all.
    if config_str.trim().is_empty() {
        return Ok(FileConfig::default());
    }

    serde_yaml::from_str(&config_str).map_err(|source| ConfigError::Parse {
        path: display,
        source,
    })
}

/// Merge flags/environment over the file configuration.
pub fn merge(args: &RunArgs, file: FileConfig) -> Result<AppConfig, ConfigError> {
    let url = args
        .url
        .clone()
        .or(file.url)
        .filter(|url| !url.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingRequired {
            key: "url".to_string(),
        })?;

    let mut headers = file.headers;
    for raw in &args.headers {
        let (name, value) = parse_header(raw)?;
        // A flag replaces a file header with the same name, whatever its case.
        headers.retain(|existing, _| !existing.eq_ignore_ascii_case(&name));
        headers.insert(name, value);
    }

    let dns_servers = if args.dns_servers.is_empty() {
        file.dns_servers
    } else {
        args.dns_servers.clone()
    };

    let check = CheckConfig {
        url,
        method: args
            .method
            .clone()
            .or(file.method)
            .unwrap_or_else(|| DEFAULT_METHOD.to_string()),
        body: args.body.clone().or(file.body),
        headers,
        follow_redirects: args.follow_redirects.or(file.follow_redirects).unwrap_or(true),
        timeout_seconds: args
            .timeout
            .or(file.timeout)
            .unwrap_or(DEFAULT_TIMEOUT_SECONDS),
        regex: args.regex.clone().or(file.regex),
        tls_probe: args.tls_probe.or(file.tls_probe).unwrap_or_default(),
        dns_servers,
    };

    let log = args
        .log
        .as_deref()
        .or(file.log.as_deref())
        .map(LogDestination::parse)
        .unwrap_or_default();

    Ok(AppConfig {
        check,
        log,
        output: args.output.or(file.output).unwrap_or_default(),
        warnings: Vec::new(),
    })
}

/// Split a `Name: Value` header flag.
fn parse_header(raw: &str) -> Result<(String, String), ConfigError> {
    let invalid = || ConfigError::InvalidValue {
        key: "header".to_string(),
        message: format!("expected NAME:VALUE, got '{raw}'"),
    };
    let (name, value) = raw.split_once(':').ok_or_else(invalid)?;
    let name = name.trim();
    if name.is_empty() {
        return Err(invalid());
    }
    Ok((name.to_string(), value.trim().to_string()))
}

/// Setup a DNS resolver for the check.
/// With explicit name servers the resolver queries them over TCP with 2 attempts
/// and a 100 ms per-query timeout. Without name servers the system
/// configuration is used.
pub fn setup_resolver(dns_servers: &[IpAddr]) -> Result<TokioAsyncResolver, ResolveError> {
    if dns_servers.is_empty() {
        return TokioAsyncResolver::tokio_from_system_conf();
    }

    let mut opts = ResolverOpts::default();
    opts.attempts = 2;
    opts.timeout = Duration::from_millis(100);
    opts.cache_size = 16;

    let mut name_servers = NameServerConfigGroup::new();

    for ip in dns_servers {
        name_servers.push(NameServerConfig {
            socket_addr: (*ip, 53).into(),
            protocol: Protocol::Tcp,
            tls_dns_name: None,
            trust_negative_responses: false,
            bind_addr: None,
        });
    }

    let resolver_config = ResolverConfig::from_parts(None, vec![], name_servers);
    Ok(TokioAsyncResolver::tokio(resolver_config, opts))
}
