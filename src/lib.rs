//! Single-shot HTTP/TLS health check.
//!
//! One request per check: status code, response time, body size, an optional
//! body pattern match, and validity of the certificate chain the server
//! presents. The transport accepts any certificate so an invalid chain is
//! reported in the result instead of failing the request.
//!
//! ```rust,ignore
//! use oxycheck::config::check_config::CheckConfig;
//! use oxycheck::http_probe::prelude::*;
//!
//! let result = run_check(&CheckConfig::new("https://example.com")).await?;
//! println!("{} in {:.3}s", result.status_code, result.response_time_seconds);
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod http_probe;
pub mod output;

pub use error::{CheckError, ConfigError};
