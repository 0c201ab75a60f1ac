//! Runtime configuration from the environment.
//!
//! | Variable | Default |
//! |---|---|
//! | `TOLLGATE_ADDR` | `0.0.0.0:8080` |
//! | `TOLLGATE_KEYS_FILE` | unset (empty registry) |
//! | `TOLLGATE_REQUEST_TIMEOUT_SECS` | `60` |
//! | `TOLLGATE_MAX_BODY_BYTES` | `1048576` (1 MiB) |
//! | `TOLLGATE_TRUST_PROXY_HEADERS` | `false` |
//! | `TOLLGATE_REQUIRE_JSON` | `true` |
//! | `TOLLGATE_NO_CACHE` | `true` |
//! | `TOLLGATE_LOG_FORMAT` | `pretty` (`json`, `compact`) |
//!
//! The binary loads a `.env` file first, if one exists.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::error::Error;
use crate::middleware::CredentialRegistry;

/// Which optional pipeline stages are installed, the request deadline and
/// the request body cap.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Also bounds how long the server waits for a request body.
    pub request_timeout: Duration,
    /// Larger bodies are answered with `413 Payload Too Large`.
    pub max_body_bytes: usize,
    /// Resolve the client address from `X-Forwarded-For` and friends.
    /// Only enable behind a proxy that overwrites those headers.
    pub trust_proxy_headers: bool,
    pub require_json: bool,
    pub no_cache: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(60),
            max_body_bytes: 1024 * 1024,
            trust_proxy_headers: false,
            require_json: true,
            no_cache: true,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            "compact" => Ok(Self::Compact),
            _ => Err(Error::Config(format!("unknown log format `{s}`, expected pretty, json or compact"))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub addr: SocketAddr,
    pub keys_file: Option<PathBuf>,
    pub pipeline: PipelineConfig,
    pub log_format: LogFormat,
}

impl Config {
    /// Reads `TOLLGATE_*` variables from the process environment.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let defaults = PipelineConfig::default();

        let addr = parse(&lookup, "TOLLGATE_ADDR")?
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 8080)));
        let keys_file = lookup("TOLLGATE_KEYS_FILE").filter(|v| !v.is_empty()).map(PathBuf::from);
        let request_timeout = parse::<u64>(&lookup, "TOLLGATE_REQUEST_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout);
        if request_timeout.is_zero() {
            return Err(Error::Config("TOLLGATE_REQUEST_TIMEOUT_SECS must be greater than zero".into()));
        }
        let max_body_bytes =
            parse(&lookup, "TOLLGATE_MAX_BODY_BYTES")?.unwrap_or(defaults.max_body_bytes);
        if max_body_bytes == 0 {
            return Err(Error::Config("TOLLGATE_MAX_BODY_BYTES must be greater than zero".into()));
        }

        Ok(Self {
            addr,
            keys_file,
            pipeline: PipelineConfig {
                request_timeout,
                max_body_bytes,
                trust_proxy_headers: flag(&lookup, "TOLLGATE_TRUST_PROXY_HEADERS")?
                    .unwrap_or(defaults.trust_proxy_headers),
                require_json: flag(&lookup, "TOLLGATE_REQUIRE_JSON")?.unwrap_or(defaults.require_json),
                no_cache: flag(&lookup, "TOLLGATE_NO_CACHE")?.unwrap_or(defaults.no_cache),
            },
            log_format: parse(&lookup, "TOLLGATE_LOG_FORMAT")?.unwrap_or_default(),
        })
    }

    /// Loads the credential registry named by `keys_file`.
    ///
    /// Without a key file the registry is empty and every private request
    /// is rejected.
    pub fn load_registry(&self) -> Result<CredentialRegistry, Error> {
        match &self.keys_file {
            Some(path) => CredentialRegistry::load(path),
            None => {
                warn!("TOLLGATE_KEYS_FILE is not set, private routes will reject every request");
                Ok(CredentialRegistry::default())
            }
        }
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>, Error>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::Config(format!("{key}={raw}: {e}"))),
    }
}

fn flag(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<bool>, Error> {
    let Some(raw) = lookup(key) else { return Ok(None) };
    match raw.trim().to_ascii_lowercase().as_str() {
        "" => Ok(None),
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        _ => Err(Error::Config(format!("{key}={raw}: expected a boolean"))),
    }
}
