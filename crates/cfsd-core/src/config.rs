//! Daemon configuration.
//!
//! Settings are layered: built-in defaults, then an optional TOML file,
//! then explicit command-line flags or environment variables. The result
//! is validated once at startup and handed to the core as an immutable
//! `SdConfig`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, ConfigResult};

pub const DEFAULT_OUTPUT_FILE: &str = "/tmp/cf_targets.json";
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(3 * 60);
pub const DEFAULT_CYCLE_TIMEOUT: Duration = Duration::from_secs(10 * 60);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_WORKERS: usize = 10;
pub const DEFAULT_PORT: u16 = 8080;

// ── Resolved configuration ────────────────────────────────────────

/// Fully resolved configuration for one daemon process.
#[derive(Debug, Clone, PartialEq)]
pub struct SdConfig {
    pub api: ApiConfig,
    pub refresh: RefreshConfig,
    /// Where the target list is written.
    pub output_file: PathBuf,
    /// Port for the liveness/status HTTP endpoint.
    pub port: u16,
}

/// Platform API connection settings.
#[derive(Clone, PartialEq)]
pub struct ApiConfig {
    /// Base URL of the Cloud Foundry API, e.g. `https://api.sys.example.com`.
    pub address: String,
    pub client_id: String,
    pub client_secret: String,
    /// Disable TLS certificate verification.
    pub skip_ssl: bool,
    /// Per-request timeout for API calls.
    pub request_timeout: Duration,
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("address", &self.address)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("skip_ssl", &self.skip_ssl)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Refresh scheduling settings.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshConfig {
    /// Time between refresh ticks.
    pub interval: Duration,
    /// Deadline for a single cycle. `None` lets a cycle run forever.
    pub cycle_timeout: Option<Duration>,
    /// Upper bound on concurrent stats workers per cycle.
    pub max_workers: usize,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            cycle_timeout: Some(DEFAULT_CYCLE_TIMEOUT),
            max_workers: DEFAULT_MAX_WORKERS,
        }
    }
}

// ── Config file ───────────────────────────────────────────────────

/// On-disk TOML configuration. Every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    pub api: Option<ApiSection>,
    pub refresh: Option<RefreshSection>,
    pub output: Option<OutputSection>,
    pub server: Option<ServerSection>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiSection {
    pub address: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub skip_ssl: Option<bool>,
    pub request_timeout: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefreshSection {
    pub interval: Option<String>,
    /// `"0"` disables the cycle deadline.
    pub cycle_timeout: Option<String>,
    pub max_workers: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputSection {
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerSection {
    pub port: Option<u16>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(content)?)
    }
}

// ── Overrides ─────────────────────────────────────────────────────

/// Values given explicitly on the command line or through the environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub api_address: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub skip_ssl: Option<bool>,
    /// Refresh interval in whole minutes.
    pub frequency_minutes: Option<u64>,
    pub output_file: Option<PathBuf>,
    pub port: Option<u16>,
}

impl SdConfig {
    /// Layer defaults, file and overrides, then validate.
    pub fn resolve(file: Option<FileConfig>, overrides: ConfigOverrides) -> ConfigResult<Self> {
        let file = file.unwrap_or_default();
        let api = file.api.unwrap_or_default();
        let refresh = file.refresh.unwrap_or_default();

        let address = overrides
            .api_address
            .or(api.address)
            .map(|a| a.trim().trim_end_matches('/').to_string())
            .filter(|a| !a.is_empty())
            .ok_or(ConfigError::Missing("api.address"))?;

        let request_timeout = match api.request_timeout {
            Some(s) => parse_duration(&s).ok_or(ConfigError::Invalid {
                key: "api.request_timeout",
                value: s,
            })?,
            None => DEFAULT_REQUEST_TIMEOUT,
        };

        let interval = match (overrides.frequency_minutes, refresh.interval) {
            (Some(minutes), _) => Duration::from_secs(minutes * 60),
            (None, Some(s)) => parse_duration(&s).ok_or(ConfigError::Invalid {
                key: "refresh.interval",
                value: s,
            })?,
            (None, None) => DEFAULT_INTERVAL,
        };
        if interval.is_zero() {
            return Err(ConfigError::Invalid {
                key: "refresh.interval",
                value: "0".to_string(),
            });
        }

        let cycle_timeout = match refresh.cycle_timeout {
            Some(s) => {
                let d = parse_duration(&s).ok_or(ConfigError::Invalid {
                    key: "refresh.cycle_timeout",
                    value: s,
                })?;
                (!d.is_zero()).then_some(d)
            }
            None => Some(DEFAULT_CYCLE_TIMEOUT),
        };

        let max_workers = refresh.max_workers.unwrap_or(DEFAULT_MAX_WORKERS);
        if max_workers == 0 {
            return Err(ConfigError::Invalid {
                key: "refresh.max_workers",
                value: "0".to_string(),
            });
        }

        Ok(Self {
            api: ApiConfig {
                address,
                client_id: overrides.client_id.or(api.client_id).unwrap_or_default(),
                client_secret: overrides
                    .client_secret
                    .or(api.client_secret)
                    .unwrap_or_default(),
                skip_ssl: overrides.skip_ssl.or(api.skip_ssl).unwrap_or(false),
                request_timeout,
            },
            refresh: RefreshConfig {
                interval,
                cycle_timeout,
                max_workers,
            },
            output_file: overrides
                .output_file
                .or(file.output.and_then(|o| o.file))
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_FILE)),
            port: overrides
                .port
                .or(file.server.and_then(|s| s.port))
                .unwrap_or(DEFAULT_PORT),
        })
    }
}

/// Parse a duration string like "30s", "500ms", "3m", "1h".
///
/// A bare number is taken as seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        ms.parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>().ok().map(|m| Duration::from_secs(m * 60))
    } else if let Some(hours) = s.strip_suffix('h') {
        hours.parse::<u64>().ok().map(|h| Duration::from_secs(h * 3600))
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_address() -> ConfigOverrides {
        ConfigOverrides {
            api_address: Some("https://api.sys.example.com".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn defaults_match_flag_defaults() {
        let config = SdConfig::resolve(None, with_address()).unwrap();
        assert_eq!(config.api.address, "https://api.sys.example.com");
        assert_eq!(config.refresh.interval, Duration::from_secs(180));
        assert_eq!(config.output_file, PathBuf::from("/tmp/cf_targets.json"));
        assert_eq!(config.port, 8080);
        assert!(!config.api.skip_ssl);
        assert_eq!(config.refresh.max_workers, 10);
        assert_eq!(config.refresh.cycle_timeout, Some(Duration::from_secs(600)));
    }

    #[test]
    fn address_is_required() {
        let err = SdConfig::resolve(None, ConfigOverrides::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("api.address")));

        let blank = ConfigOverrides {
            api_address: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(SdConfig::resolve(None, blank).is_err());
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let overrides = ConfigOverrides {
            api_address: Some("https://api.example.com/".to_string()),
            ..Default::default()
        };
        let config = SdConfig::resolve(None, overrides).unwrap();
        assert_eq!(config.api.address, "https://api.example.com");
    }

    #[test]
    fn file_values_are_layered_under_overrides() {
        let file = FileConfig::from_toml_str(
            r#"
[api]
address = "https://file.example.com"
client_id = "from-file"
skip_ssl = true
request_timeout = "5s"

[refresh]
interval = "90s"
cycle_timeout = "0"
max_workers = 4

[output]
file = "/var/lib/cfsd/targets.json"

[server]
port = 9100
"#,
        )
        .unwrap();

        let overrides = ConfigOverrides {
            client_id: Some("from-flag".to_string()),
            port: Some(9200),
            ..Default::default()
        };
        let config = SdConfig::resolve(Some(file), overrides).unwrap();

        assert_eq!(config.api.address, "https://file.example.com");
        assert_eq!(config.api.client_id, "from-flag");
        assert!(config.api.skip_ssl);
        assert_eq!(config.api.request_timeout, Duration::from_secs(5));
        assert_eq!(config.refresh.interval, Duration::from_secs(90));
        assert_eq!(config.refresh.cycle_timeout, None);
        assert_eq!(config.refresh.max_workers, 4);
        assert_eq!(config.output_file, PathBuf::from("/var/lib/cfsd/targets.json"));
        assert_eq!(config.port, 9200);
    }

    #[test]
    fn frequency_flag_wins_over_file_interval() {
        let file = FileConfig::from_toml_str("[refresh]\ninterval = \"90s\"\n").unwrap();
        let overrides = ConfigOverrides {
            frequency_minutes: Some(5),
            ..with_address()
        };
        let config = SdConfig::resolve(Some(file), overrides).unwrap();
        assert_eq!(config.refresh.interval, Duration::from_secs(300));
    }

    #[test]
    fn zero_interval_rejected() {
        let overrides = ConfigOverrides {
            frequency_minutes: Some(0),
            ..with_address()
        };
        let err = SdConfig::resolve(None, overrides).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "refresh.interval", .. }));
    }

    #[test]
    fn zero_workers_rejected() {
        let file = FileConfig::from_toml_str("[refresh]\nmax_workers = 0\n").unwrap();
        assert!(SdConfig::resolve(Some(file), with_address()).is_err());
    }

    #[test]
    fn bad_duration_rejected() {
        let file = FileConfig::from_toml_str("[refresh]\ninterval = \"soon\"\n").unwrap();
        let err = SdConfig::resolve(Some(file), with_address()).unwrap_err();
        assert!(err.to_string().contains("soon"));
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let err = FileConfig::from_toml_str("[api\naddress = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn from_file_reads_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfsd.toml");
        std::fs::write(&path, "[server]\nport = 9000\n").unwrap();

        let file = FileConfig::from_file(&path).unwrap();
        assert_eq!(file.server.and_then(|s| s.port), Some(9000));

        let missing = FileConfig::from_file(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(missing, ConfigError::Read { .. }));
    }

    #[test]
    fn secret_is_redacted_in_debug() {
        let overrides = ConfigOverrides {
            client_secret: Some("hunter2".to_string()),
            ..with_address()
        };
        let config = SdConfig::resolve(None, overrides).unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn parse_duration_units() {
        assert_eq!(parse_duration("500ms"), Some(Duration::from_millis(500)));
        assert_eq!(parse_duration("30s"), Some(Duration::from_secs(30)));
        assert_eq!(parse_duration("3m"), Some(Duration::from_secs(180)));
        assert_eq!(parse_duration("1h"), Some(Duration::from_secs(3600)));
        assert_eq!(parse_duration("10"), Some(Duration::from_secs(10)));
        assert_eq!(parse_duration("abc"), None);
    }
}
