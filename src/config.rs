use std::{path::PathBuf, str::FromStr, time::Duration};

use anyhow::Context;
use serde::Deserialize;
use tracing::warn;

const DEFAULT_ADMIN_ACCESS_CODE: &str = "010925";

#[derive(Debug, Clone, Deserialize)]
pub struct DiscordConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub public_dir: PathBuf,
    pub flush_interval: Duration,
    pub admin_access_code: String,
    pub session_ttl: Duration,
    pub cookie_secure: bool,
    pub project_domain_suffix: String,
    pub rate_limit: RateLimitConfig,
    pub discord: Option<DiscordConfig>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let admin_access_code = std::env::var("ADMIN_ACCESS_CODE").unwrap_or_else(|_| {
            warn!("ADMIN_ACCESS_CODE not set; using the built-in default");
            DEFAULT_ADMIN_ACCESS_CODE.into()
        });

        let discord = match (
            std::env::var("DISCORD_CLIENT_ID"),
            std::env::var("DISCORD_CLIENT_SECRET"),
        ) {
            (Ok(client_id), Ok(client_secret)) => Some(DiscordConfig {
                client_id,
                client_secret,
                redirect_uri: std::env::var("DISCORD_REDIRECT_URI").unwrap_or_else(|_| {
                    "http://localhost:5000/api/auth/discord/callback".into()
                }),
            }),
            _ => {
                warn!("DISCORD_CLIENT_ID / DISCORD_CLIENT_SECRET not set; discord login disabled");
                None
            }
        };

        Ok(Self {
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env_or("APP_PORT", 5000)?,
            data_dir: std::env::var("DATA_DIR")
                .unwrap_or_else(|_| "database".into())
                .into(),
            public_dir: std::env::var("PUBLIC_DIR")
                .unwrap_or_else(|_| "public".into())
                .into(),
            flush_interval: Duration::from_secs(env_or("FLUSH_INTERVAL_SECS", 30)?),
            admin_access_code,
            session_ttl: Duration::from_secs(env_or::<u64>("SESSION_TTL_HOURS", 24)? * 60 * 60),
            cookie_secure: env_or("COOKIE_SECURE", false)?,
            project_domain_suffix: std::env::var("PROJECT_DOMAIN_SUFFIX")
                .unwrap_or_else(|_| "spvisualcode.com".into()),
            rate_limit: RateLimitConfig {
                max_requests: env_or("RATE_LIMIT_MAX", 100)?,
                window: Duration::from_secs(env_or("RATE_LIMIT_WINDOW_SECS", 15 * 60)?),
            },
            discord,
        })
    }
}

fn env_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {key}: {raw:?}")),
        Err(_) => Ok(default),
    }
}
