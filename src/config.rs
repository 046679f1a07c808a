use crate::adapter::Framework;
use crate::sink::TagFormat;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

pub const DEFAULT_STAT: &str = "node.express.router";
pub const DEFAULT_DELIM: &str = "-";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub http: HttpConfig,
    pub statsd: StatsdConfig,
    pub interceptor: InterceptorConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub addr: SocketAddr,
    pub request_timeout_secs: u64,
    pub body_limit_bytes: usize,
    pub tcp_nodelay: bool,
    pub tcp_keepalive_secs: Option<u64>,
    /// Which server the demo binary runs.
    pub framework: Framework,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsdConfig {
    pub host: String,
    pub port: u16,
    pub prefix: String,
    pub suffix: String,
    pub global_tags: Vec<String>,
    pub tag_format: TagFormat,
    /// Log metrics instead of sending them.
    pub mock: bool,
}

impl Default for StatsdConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8125,
            prefix: String::new(),
            suffix: String::new(),
            global_tags: Vec::new(),
            tag_format: TagFormat::Datadog,
            mock: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterceptorConfig {
    pub stat: String,
    pub tags: Vec<String>,
    pub path: bool,
    pub base_url: bool,
    pub method: bool,
    pub protocol: bool,
    pub response_code: bool,
    pub delim: String,
    /// Framework name reported to the interceptor. Resolved on first request,
    /// so an unknown name only shows up once traffic arrives.
    pub http_adapter: Option<String>,
}

impl Default for InterceptorConfig {
    fn default() -> Self {
        Self {
            stat: DEFAULT_STAT.to_string(),
            tags: Vec::new(),
            path: false,
            base_url: false,
            method: false,
            protocol: false,
            response_code: false,
            delim: DEFAULT_DELIM.to_string(),
            http_adapter: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

fn env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_or_parse<T: std::str::FromStr>(key: &str, default: T) -> T
where
    T::Err: std::fmt::Debug,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_list(key: &str) -> Vec<String> {
    env_or_default(key, "")
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // HTTP config
        let addr = env_or_default("ADDR", "0.0.0.0:8080")
            .parse()
            .context("Failed to parse ADDR")?;
        let request_timeout_secs = env_or_parse("REQUEST_TIMEOUT", 5);
        let body_limit_bytes = env_or_parse("BODY_LIMIT_BYTES", 64 * 1024);
        let tcp_nodelay = env_or_parse("TCP_NODELAY", true);
        let tcp_keepalive_secs = match env_or_parse("TCP_KEEPALIVE_SECS", 0) {
            0 => None,
            n => Some(n),
        };
        let framework: Framework = env_or_default("SERVER_FRAMEWORK", "axum")
            .parse()
            .context("Failed to parse SERVER_FRAMEWORK")?;

        // Logging config
        let level = env_or_default("LOG_LEVEL", "info");
        let format = match env_or_default("LOG_FORMAT", "json").to_lowercase().as_str() {
            "pretty" => LogFormat::Pretty,
            _ => LogFormat::Json,
        };

        // StatsD config
        let host = env_or_default("STATSD_HOST", "127.0.0.1");
        let port = env_or_default("STATSD_PORT", "8125")
            .parse()
            .context("Failed to parse STATSD_PORT")?;
        let prefix = env_or_default("STATSD_PREFIX", "");
        let suffix = env_or_default("STATSD_SUFFIX", "");
        let global_tags = env_list("STATSD_GLOBAL_TAGS");
        let tag_format = match env_or_default("STATSD_TAG_FORMAT", "datadog")
            .to_lowercase()
            .as_str()
        {
            "datadog" => TagFormat::Datadog,
            "telegraf" => TagFormat::Telegraf,
            other => anyhow::bail!("Invalid STATSD_TAG_FORMAT: {}", other),
        };
        let mock = env_or_parse("STATSD_MOCK", false);

        // Interceptor config
        let stat = env_or_default("STAT_NAME", DEFAULT_STAT);
        let tags = env_list("STAT_TAGS");
        let path = env_or_parse("STAT_PATH", false);
        let base_url = env_or_parse("STAT_BASE_URL", false);
        let method = env_or_parse("STAT_METHOD", false);
        let protocol = env_or_parse("STAT_PROTOCOL", false);
        let response_code = env_or_parse("STAT_RESPONSE_CODE", false);
        let delim = env_or_default("STAT_DELIM", DEFAULT_DELIM);
        let http_adapter = std::env::var("HTTP_ADAPTER").ok().filter(|s| !s.is_empty());

        let config = Config {
            http: HttpConfig {
                addr,
                request_timeout_secs,
                body_limit_bytes,
                tcp_nodelay,
                tcp_keepalive_secs,
                framework,
            },
            statsd: StatsdConfig {
                host,
                port,
                prefix,
                suffix,
                global_tags,
                tag_format,
                mock,
            },
            interceptor: InterceptorConfig {
                stat,
                tags,
                path,
                base_url,
                method,
                protocol,
                response_code,
                delim,
                http_adapter,
            },
            logging: LoggingConfig { level, format },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.statsd.host.trim().is_empty() {
            anyhow::bail!("STATSD_HOST cannot be empty");
        }
        if self.statsd.port == 0 {
            anyhow::bail!("STATSD_PORT must be non-zero");
        }
        if self.interceptor.delim.contains('|') {
            anyhow::bail!("STAT_DELIM cannot contain '|'");
        }
        if self.http.request_timeout_secs < 1 {
            anyhow::bail!("REQUEST_TIMEOUT must be at least 1 second");
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.http.request_timeout_secs)
    }
}

// For tests only
#[cfg(test)]
impl Default for Config {
    fn default() -> Self {
        Config {
            http: HttpConfig {
                addr: "0.0.0.0:8080".parse().unwrap(),
                request_timeout_secs: 5,
                body_limit_bytes: 64 * 1024,
                tcp_nodelay: true,
                tcp_keepalive_secs: Some(60),
                framework: Framework::Axum,
            },
            statsd: StatsdConfig::default(),
            interceptor: InterceptorConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                format: LogFormat::Json,
            },
        }
    }
}
