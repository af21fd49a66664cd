//! Configuration for a warmup run.
//!
//! Configuration is loaded from the following sources, with later sources taking precedence:
//!
//! 1. Defaults
//! 2. YAML configuration file (specified via `-c` or `--config` flag)
//! 3. Environment variables (prefixed with `PREWARM__`)
//!
//! # Environment Variables
//!
//! Environment variables use `PREWARM__` as a prefix and double underscores (`__`) to denote
//! nested configuration structures. For example:
//!
//! - `PREWARM__HTTP_URL=http://localhost:8080` sets the HTTP target
//! - `PREWARM__READINESS__HTTP_PATH=/health` waits for `/health` before warming up
//! - `PREWARM__HTTP_HEADERS__AUTHORIZATION=secret` adds a header to every HTTP request
//!
//! # YAML Configuration File
//!
//! ```yaml
//! http_url: http://localhost:8080
//! grpc_url: http://localhost:50051
//! concurrency: 8
//! max_duration: 30s
//!
//! http_requests:
//!   - get:/users/{numbers-4}
//!   - 'post:/search:{"query": "{chars-8}", "date": "{today+3}"}'
//! grpc_requests:
//!   - echo.Echo/Say
//!
//! readiness:
//!   http_path: /health
//!   timeout: 2m
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use prewarm_service::{Options, TargetOptions};
use prewarm_types::{GrpcTemplate, RequestTemplate, parse_grpc};
use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

/// Environment variable prefix for all configuration options.
const ENV_PREFIX: &str = "PREWARM__";

/// Readiness checks that must pass before any warmup request is sent.
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Readiness {
    /// Path on the HTTP target that must answer a `GET` with `2xx`.
    ///
    /// # Default
    ///
    /// `None` (no HTTP readiness check)
    pub http_path: Option<String>,

    /// Fully qualified gRPC method, such as `grpc.health.v1.Health/Check`, that must answer an
    /// empty message with `OK`.
    ///
    /// # Default
    ///
    /// `None` (no gRPC readiness check)
    pub grpc_method: Option<String>,

    /// Maximum time to wait for the target.
    ///
    /// # Default
    ///
    /// `60s`
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Pause between two failed checks.
    ///
    /// # Default
    ///
    /// `1s`
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
}

impl Default for Readiness {
    fn default() -> Self {
        let defaults = TargetOptions::default();
        Self {
            http_path: None,
            grpc_method: None,
            timeout: defaults.readiness_timeout,
            interval: defaults.readiness_interval,
        }
    }
}

/// Log output format.
///
/// Controls how log messages are formatted. The format can be explicitly specified or
/// auto-detected based on whether output is to a TTY.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Auto detect the best format.
    ///
    /// This chooses [`LogFormat::Pretty`] for TTY, otherwise [`LogFormat::Simplified`].
    Auto,

    /// Pretty printing with colors.
    Pretty,

    /// Simplified plain text output.
    Simplified,

    /// Dump out JSON lines.
    Json,
}

/// The logging format parse error.
#[derive(Clone, Debug)]
pub struct FormatParseError(String);

impl fmt::Display for FormatParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            r#"error parsing "{}" as format: expected one of "auto", "pretty", "simplified", "json""#,
            self.0
        )
    }
}

impl std::str::FromStr for LogFormat {
    type Err = FormatParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let result = match s {
            "" => LogFormat::Auto,
            s if s.eq_ignore_ascii_case("auto") => LogFormat::Auto,
            s if s.eq_ignore_ascii_case("pretty") => LogFormat::Pretty,
            s if s.eq_ignore_ascii_case("simplified") => LogFormat::Simplified,
            s if s.eq_ignore_ascii_case("json") => LogFormat::Json,
            s => return Err(FormatParseError(s.into())),
        };

        Ok(result)
    }
}

impl std::error::Error for FormatParseError {}

mod display_fromstr {
    pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
        T: std::fmt::Display,
    {
        serializer.collect_str(&value)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        D: serde::Deserializer<'de>,
        T: std::str::FromStr,
        <T as std::str::FromStr>::Err: std::fmt::Display,
    {
        use serde::Deserialize;
        let s = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Logging configuration.
///
/// Logs are always written to stderr, so they never mix with the summary on stdout.
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Logging {
    /// Minimum log level to output.
    ///
    /// Overridden by the `RUST_LOG` environment variable, if set.
    ///
    /// # Default
    ///
    /// `info`
    #[serde(with = "display_fromstr")]
    pub level: LevelFilter,

    /// Log output format.
    ///
    /// # Default
    ///
    /// `auto`
    pub format: LogFormat,
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            level: LevelFilter::INFO,
            format: LogFormat::Auto,
        }
    }
}

/// Main configuration struct of a warmup run.
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the HTTP target, such as `http://localhost:8080`.
    ///
    /// Without it, HTTP requests are skipped.
    pub http_url: Option<String>,

    /// URL of the gRPC target, such as `http://localhost:50051`.
    ///
    /// Only plaintext connections are supported. Without it, gRPC requests are skipped.
    pub grpc_url: Option<String>,

    /// Accept invalid TLS certificates from the HTTP target.
    pub insecure: bool,

    /// Headers added to every HTTP request.
    pub http_headers: BTreeMap<String, String>,

    /// Headers added to every gRPC call, in the form `key: value`.
    pub grpc_headers: Vec<String>,

    /// HTTP request templates, such as `get:/users/{numbers-4}`.
    pub http_requests: Vec<String>,

    /// gRPC request templates, such as `echo.Echo/Say:{chars-8}`.
    pub grpc_requests: Vec<String>,

    /// Maximum number of requests in flight.
    ///
    /// # Default
    ///
    /// The number of available CPUs.
    pub concurrency: usize,

    /// Stop sending new requests after this duration.
    ///
    /// # Default
    ///
    /// `60s`
    #[serde(with = "humantime_serde")]
    pub max_duration: Duration,

    /// Stop after this many requests per transport.
    ///
    /// # Default
    ///
    /// `None` (only bounded by [`max_duration`](Self::max_duration))
    pub max_requests: Option<usize>,

    /// Timeout of a single request, including connecting.
    ///
    /// # Default
    ///
    /// `5s`
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Readiness checks. See [`Readiness`].
    pub readiness: Readiness,

    /// Logging configuration. See [`Logging`].
    pub logging: Logging,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_url: None,
            grpc_url: None,
            insecure: false,
            http_headers: BTreeMap::new(),
            grpc_headers: Vec::new(),
            http_requests: Vec::new(),
            grpc_requests: Vec::new(),
            concurrency: Options::default().concurrency,
            max_duration: Duration::from_secs(60),
            max_requests: None,
            request_timeout: Duration::from_secs(5),
            readiness: Readiness::default(),
            logging: Logging::default(),
        }
    }
}

impl Config {
    /// Loads configuration from defaults, the optional YAML file at `path`, and the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML file cannot be read or parsed, or if any value has the wrong
    /// type.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = figment::Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        let config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        Ok(config)
    }

    /// Parses all configured HTTP request templates.
    pub fn http_templates(&self) -> Result<Vec<RequestTemplate>> {
        self.http_requests
            .iter()
            .map(|line| {
                line.parse()
                    .with_context(|| format!("invalid HTTP request {line:?}"))
            })
            .collect()
    }

    /// Parses all configured gRPC request templates.
    pub fn grpc_templates(&self) -> Result<Vec<GrpcTemplate>> {
        self.grpc_requests
            .iter()
            .map(|line| {
                line.parse()
                    .with_context(|| format!("invalid gRPC request {line:?}"))
            })
            .collect()
    }

    /// Returns the readiness options of the target.
    pub fn target_options(&self) -> Result<TargetOptions> {
        let readiness_grpc_method = match &self.readiness.grpc_method {
            Some(method) => {
                let request = parse_grpc(method)
                    .with_context(|| format!("invalid gRPC readiness method {method:?}"))?;
                Some(request.service_method)
            }
            None => None,
        };

        Ok(TargetOptions {
            readiness_http_path: self.readiness.http_path.clone(),
            readiness_grpc_method,
            readiness_timeout: self.readiness.timeout,
            readiness_interval: self.readiness.interval,
        })
    }

    /// Returns the dispatcher options.
    pub fn options(&self) -> Options {
        Options {
            concurrency: self.concurrency,
        }
    }
}
