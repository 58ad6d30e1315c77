use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use log::warn;
use secrecy::SecretString;

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Upper bound for the rate-limit window and sweep period, one day.
pub const MAX_RATE_LIMIT_SECS: u64 = 86_400;

/// Runtime configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub gemini: GeminiConfig,
    pub rate_limit: RateLimitConfig,
}

/// Provider settings. The API key only ever lives server-side.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: SecretString,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window: Duration,
    pub sweep_interval: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window: Duration::from_secs(60),
            sweep_interval: Duration::from_secs(300),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: parse_or("PORT", 8080),
            gemini: GeminiConfig::from_env()?,
            rate_limit: RateLimitConfig::from_env(),
        })
    }
}

impl GeminiConfig {
    pub fn from_env() -> Result<Self> {
        let api_key = env::var("GOOGLE_API_KEY")
            .context("GOOGLE_API_KEY must be set to reach the Gemini API")?;

        Ok(Self {
            api_key: SecretString::new(api_key),
            model: env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            base_url: env::var("GEMINI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            // Pinned to 0 unless overridden so repeated prompts stay reproducible.
            temperature: parse_or("TEMPERATURE", 0.0),
        })
    }
}

impl RateLimitConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_requests: parse_or("RATE_LIMIT_MAX_REQUESTS", defaults.max_requests),
            window: parse_secs("RATE_LIMIT_WINDOW_SECS", defaults.window),
            sweep_interval: parse_secs("RATE_LIMIT_SWEEP_SECS", defaults.sweep_interval),
        }
    }
}

fn parse_or<T: FromStr + Copy>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse::<T>().unwrap_or_else(|_| {
            warn!("Ignoring invalid value for {}: {:?}", key, raw);
            default
        }),
        Err(_) => default,
    }
}

/// Read a period in whole seconds, capped at [`MAX_RATE_LIMIT_SECS`].
fn parse_secs(key: &str, default: Duration) -> Duration {
    let secs = parse_or(key, default.as_secs());
    if secs > MAX_RATE_LIMIT_SECS {
        warn!("{} = {} is too large, capping at {}", key, secs, MAX_RATE_LIMIT_SECS);
        return Duration::from_secs(MAX_RATE_LIMIT_SECS);
    }
    Duration::from_secs(secs)
}
