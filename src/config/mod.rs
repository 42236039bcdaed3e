use anyhow::{anyhow, Context, Result};
use std::ops::RangeInclusive;
use std::str::FromStr;
use tracing::warn;

/// Ten years, the longest due offset or credential lifetime accepted.
const MAX_HOURS: i64 = 24 * 365 * 10;

const DEV_JWT_SECRET: &str = "dev-secret-key-change-in-production-minimum-32-chars";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtSettings,
    pub email: Option<EmailConfig>,
    pub tickets: TicketSettings,
    pub notifications: NotificationSettings,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Empty means any origin.
    pub cors_origins: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
}

#[derive(Clone, Debug)]
pub struct JwtSettings {
    pub secret: String,
    pub validity_hours: i64,
}

/// SMTP relay settings. Absent when `SMTP_HOST` is unset, in which case
/// notifications are only logged.
#[derive(Clone, Debug)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
}

#[derive(Clone, Debug)]
pub struct TicketSettings {
    pub due_hours: i64,
}

#[derive(Clone, Debug)]
pub struct NotificationSettings {
    pub queue_capacity: usize,
}

impl Default for TicketSettings {
    fn default() -> Self {
        Self { due_hours: 24 }
    }
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self { queue_capacity: 256 }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup so tests do not
    /// have to touch the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").context("DATABASE_URL must be set")?;

        let secret = match lookup("JWT_SECRET") {
            Some(secret) if secret.len() >= 32 => secret,
            Some(_) => return Err(anyhow!("JWT_SECRET must be at least 32 characters")),
            None => {
                warn!("JWT_SECRET not set, using default development secret - DO NOT USE IN PRODUCTION");
                DEV_JWT_SECRET.to_string()
            }
        };

        let email = match lookup("SMTP_HOST") {
            Some(smtp_host) => {
                let username = lookup("SMTP_USER");
                let from = lookup("SMTP_FROM")
                    .or_else(|| username.clone())
                    .context("SMTP_FROM or SMTP_USER must be set when SMTP_HOST is set")?;
                Some(EmailConfig {
                    smtp_host,
                    smtp_port: parse_or(&lookup, "SMTP_PORT", 587)?,
                    username,
                    password: lookup("SMTP_PASS"),
                    from,
                })
            }
            None => None,
        };

        Ok(Self {
            server: ServerConfig {
                host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: parse_or(&lookup, "PORT", 3000)?,
                cors_origins: lookup("CORS_ALLOWED_ORIGINS")
                    .map(|raw| {
                        raw.split(',')
                            .map(|s| s.trim().to_string())
                            .filter(|s| !s.is_empty())
                            .collect()
                    })
                    .unwrap_or_default(),
            },
            database: DatabaseConfig {
                url: database_url,
                pool_size: parse_in_range(&lookup, "DB_POOL_SIZE", 10, 1..=1_000)?,
            },
            jwt: JwtSettings {
                secret,
                validity_hours: parse_in_range(&lookup, "JWT_VALIDITY_HOURS", 8, 1..=MAX_HOURS)?,
            },
            email,
            tickets: TicketSettings {
                due_hours: parse_in_range(
                    &lookup,
                    "TICKET_DUE_HOURS",
                    TicketSettings::default().due_hours,
                    1..=MAX_HOURS,
                )?,
            },
            notifications: NotificationSettings {
                queue_capacity: parse_in_range(
                    &lookup,
                    "NOTIFICATION_QUEUE_CAPACITY",
                    NotificationSettings::default().queue_capacity,
                    1..=1_000_000,
                )?,
            },
        })
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow!("Invalid value for {key} ({raw}): {e}")),
        None => Ok(default),
    }
}

fn parse_in_range<F, T>(lookup: &F, key: &str, default: T, range: RangeInclusive<T>) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + PartialOrd + std::fmt::Display,
    T::Err: std::fmt::Display,
{
    let value = parse_or(lookup, key, default)?;
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(anyhow!(
            "{key} must be between {} and {}, got {value}",
            range.start(),
            range.end()
        ))
    }
}
