use crate::errors::ConfigError;
use std::env;
use std::num::{NonZeroU16, NonZeroUsize};
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub base_url: String,
    pub alt_base_urls: Vec<String>,
    pub api_version: String,
    pub spread_quote_asset: String,
    pub volume_quote_asset: String,
    pub top_n: usize,
    pub order_book_depth: usize,
    pub stats_batch_size: NonZeroUsize,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    /// 0 keeps every tracker entry for the lifetime of the process.
    pub tracker_ttl_cycles: u64,
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            base_url: "https://api.binance.com".to_string(),
            alt_base_urls: vec![
                "https://api1.binance.com".to_string(),
                "https://api2.binance.com".to_string(),
                "https://api3.binance.com".to_string(),
            ],
            api_version: "api/v3".to_string(),
            spread_quote_asset: "USDT".to_string(),
            volume_quote_asset: "BTC".to_string(),
            top_n: 5,
            order_book_depth: 200,
            stats_batch_size: NonZeroUsize::new(100).unwrap_or(NonZeroUsize::MIN),
            poll_interval: Duration::from_secs(10),
            request_timeout: Duration::from_secs(10),
            tracker_ttl_cycles: 0,
            log_format: LogFormat::Pretty,
        }
    }
}

impl Config {
    /// Reads `.env` and the process environment, then applies `--port`
    /// from the command line.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let mut config = Self::from_lookup(|key| env::var(key).ok())?;
        if let Some(port) = port_from_args(env::args().skip(1))? {
            config.port = port;
        }
        Ok(config)
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let alt_base_urls = match lookup("ALT_BASE_URLS") {
            Some(raw) => raw
                .split(',')
                .map(|s| s.trim().trim_end_matches('/').to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            None => defaults.alt_base_urls,
        };

        let stats_batch_size = match lookup("STATS_BATCH_SIZE") {
            Some(raw) => raw.trim().parse::<NonZeroUsize>().map_err(|_| ConfigError::Invalid {
                name: "STATS_BATCH_SIZE",
                expected: "a positive integer",
                value: raw,
            })?,
            None => defaults.stats_batch_size,
        };

        let log_format = match lookup("LOG_FORMAT").map(|s| s.trim().to_lowercase()) {
            None => defaults.log_format,
            Some(s) if s == "json" => LogFormat::Json,
            Some(s) if s == "pretty" || s.is_empty() => LogFormat::Pretty,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "LOG_FORMAT",
                    expected: "'pretty' or 'json'",
                    value: other,
                });
            }
        };

        Ok(Self {
            port: match lookup("PORT") {
                Some(raw) => parse_port("PORT", raw)?,
                None => defaults.port,
            },
            base_url: lookup("BASE_URL")
                .map(|s| s.trim().trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            alt_base_urls,
            api_version: lookup("API_VERSION")
                .map(|s| s.trim().trim_matches('/').to_string())
                .unwrap_or(defaults.api_version),
            spread_quote_asset: lookup("SPREAD_QUOTE_ASSET")
                .map(|s| s.trim().to_uppercase())
                .unwrap_or(defaults.spread_quote_asset),
            volume_quote_asset: lookup("VOLUME_QUOTE_ASSET")
                .map(|s| s.trim().to_uppercase())
                .unwrap_or(defaults.volume_quote_asset),
            top_n: parsed(&lookup, "TOP_N", "a non-negative integer", defaults.top_n)?,
            order_book_depth: parsed(
                &lookup,
                "ORDER_BOOK_DEPTH",
                "a non-negative integer",
                defaults.order_book_depth,
            )?,
            stats_batch_size,
            poll_interval: Duration::from_secs(parsed(
                &lookup,
                "POLL_INTERVAL_SECS",
                "a number of seconds",
                defaults.poll_interval.as_secs(),
            )?),
            request_timeout: Duration::from_secs(parsed(
                &lookup,
                "REQUEST_TIMEOUT_SECS",
                "a number of seconds",
                defaults.request_timeout.as_secs(),
            )?),
            tracker_ttl_cycles: parsed(
                &lookup,
                "TRACKER_TTL_CYCLES",
                "a non-negative integer",
                defaults.tracker_ttl_cycles,
            )?,
            log_format,
        })
    }

    /// Primary endpoint first, then the alternates in configured order.
    pub fn endpoints(&self) -> Vec<String> {
        std::iter::once(self.base_url.clone())
            .chain(self.alt_base_urls.iter().cloned())
            .collect()
    }
}

fn parsed<F, T>(lookup: &F, name: &'static str, expected: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        Some(raw) => raw.trim().parse::<T>().map_err(|_| ConfigError::Invalid {
            name,
            expected,
            value: raw,
        }),
        None => Ok(default),
    }
}

/// 1-65535; port 0 is refused.
fn parse_port(name: &'static str, raw: String) -> Result<u16, ConfigError> {
    raw.trim()
        .parse::<NonZeroU16>()
        .map(NonZeroU16::get)
        .map_err(|_| ConfigError::Invalid {
            name,
            expected: "a valid port number (1-65535)",
            value: raw,
        })
}

/// Accepts `--port 9090` and `--port=9090`; anything else is ignored.
fn port_from_args<I>(args: I) -> Result<Option<u16>, ConfigError>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let mut port = None;

    while let Some(arg) = args.next() {
        let raw = if arg == "--port" || arg == "-port" {
            args.next().ok_or(ConfigError::MissingPort)?
        } else if let Some(value) = arg.strip_prefix("--port=").or_else(|| arg.strip_prefix("-port=")) {
            value.to_string()
        } else {
            continue;
        };

        port = Some(parse_port("--port", raw)?);
    }

    Ok(port)
}
