use std::env;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub scheduling: SchedulingConfig,
    pub notifications: NotificationsConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub frontend_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulingConfig {
    /// Minimum lead time (hours) required for a client-initiated cancellation.
    /// `0` disables the cutoff entirely. Admin-initiated cancellations bypass it.
    pub cancellation_cutoff_hours: u32,
    /// Offset of business-local time from UTC, in minutes. "Past slot" and
    /// cutoff checks are evaluated in business-local time.
    pub utc_offset_minutes: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationsConfig {
    /// Optional webhook endpoint that receives appointment events
    /// (created / cancelled / rescheduled / completed). Delivery is
    /// best-effort; failures are logged and never fail the operation.
    pub webhook_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Allowed requests per second (per IP) for public booking endpoints (e.g. POST /api/appointments)
    pub booking_per_second: u32,
    /// Burst size for booking endpoints
    pub booking_burst: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Config {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("PORT")
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue("PORT".to_string()))?,
                frontend_url: env::var("FRONTEND_URL")
                    .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite://data/booking.db".to_string()),
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .unwrap_or(5),
            },
            scheduling: SchedulingConfig {
                cancellation_cutoff_hours: env::var("CANCELLATION_CUTOFF_HOURS")
                    .unwrap_or_else(|_| "0".to_string())
                    .parse()
                    .unwrap_or(0),
                utc_offset_minutes: env::var("BUSINESS_UTC_OFFSET_MINUTES")
                    .unwrap_or_else(|_| "0".to_string())
                    .parse()
                    .unwrap_or(0),
            },
            notifications: NotificationsConfig {
                webhook_url: env::var("NOTIFY_WEBHOOK_URL").ok(),
            },
            rate_limit: RateLimitConfig {
                booking_per_second: env::var("RATE_LIMIT_BOOKING_PER_SECOND")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .unwrap_or(5),
                booking_burst: env::var("RATE_LIMIT_BOOKING_BURST")
                    .unwrap_or_else(|_| "20".to_string())
                    .parse()
                    .unwrap_or(20),
            },
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                frontend_url: "http://localhost:3000".to_string(),
            },
            database: DatabaseConfig {
                url: "sqlite://data/booking.db".to_string(),
                max_connections: 5,
            },
            scheduling: SchedulingConfig {
                cancellation_cutoff_hours: 0,
                utc_offset_minutes: 0,
            },
            notifications: NotificationsConfig { webhook_url: None },
            rate_limit: RateLimitConfig {
                booking_per_second: 5,
                booking_burst: 20,
            },
        }
    }
}
