use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Settings for the external payment gateway. Handed to the gateway adapter at
/// construction time.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub api_url: String,
    pub secret_key: String,
    pub currency: String,
    /// Where the gateway sends the buyer's browser after checkout.
    pub callback_url: String,
    /// Where the gateway POSTs asynchronous payment confirmations.
    pub webhook_url: String,
}

#[derive(Debug, Clone)]
pub struct PayoutConfig {
    /// Delivered orders older than this are completed by the sweep.
    pub grace_period: chrono::Duration,
    pub sweep_interval: Duration,
}

impl Default for PayoutConfig {
    fn default() -> Self {
        Self {
            grace_period: chrono::Duration::days(5),
            sweep_interval: Duration::from_secs(3600),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Supabase project ref, parsed out of `https://<ref>.supabase.co`.
    pub project_ref: String,
    pub anon_key: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub redis_url: Option<String>,
    pub port: u16,
    pub auth: AuthConfig,
    pub gateway: GatewayConfig,
    pub payout: PayoutConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let supabase_url = required("SUPABASE_URL")?;
        let project_ref = supabase_project_ref(&supabase_url).ok_or(ConfigError::Invalid {
            name: "SUPABASE_URL",
            reason: "expected https://PROJECT.supabase.co".to_string(),
        })?;

        let port = match std::env::var("PORT") {
            Ok(v) => v.parse().map_err(|e| ConfigError::Invalid {
                name: "PORT",
                reason: format!("{e}"),
            })?,
            Err(_) => 8080,
        };

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            redis_url: std::env::var("REDIS_URL").ok().filter(|v| !v.is_empty()),
            port,
            auth: AuthConfig {
                project_ref,
                anon_key: required("SUPABASE_ANON_KEY")?,
            },
            gateway: GatewayConfig::from_env()?,
            payout: PayoutConfig::from_env(),
        })
    }
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            api_url: required("PAYMENT_API_URL")?.trim_end_matches('/').to_string(),
            secret_key: required("PAYMENT_SECRET_KEY")?,
            currency: std::env::var("PAYMENT_CURRENCY").unwrap_or_else(|_| "ILS".to_string()),
            callback_url: required("PAYMENT_CALLBACK_URL")?,
            webhook_url: required("PAYMENT_WEBHOOK_URL")?,
        })
    }
}

impl PayoutConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let grace_days = std::env::var("PAYOUT_GRACE_DAYS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|days| *days >= 0);

        Self {
            grace_period: grace_days
                .map(chrono::Duration::days)
                .unwrap_or(defaults.grace_period),
            sweep_interval: parse_duration_secs("PAYOUT_SWEEP_INTERVAL_SECS", 3600),
        }
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::Missing(name))
}

fn parse_duration_secs(env_var: &str, default: u64) -> Duration {
    std::env::var(env_var)
        .ok()
        .and_then(|v| v.parse().ok())
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
        .unwrap_or_else(|| Duration::from_secs(default))
}

pub fn supabase_project_ref(url: &str) -> Option<String> {
    url.strip_prefix("https://")
        .and_then(|s| s.trim_end_matches('/').strip_suffix(".supabase.co"))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_ref_is_parsed_from_supabase_url() {
        assert_eq!(
            supabase_project_ref("https://abcd1234.supabase.co").as_deref(),
            Some("abcd1234")
        );
        assert_eq!(
            supabase_project_ref("https://abcd1234.supabase.co/").as_deref(),
            Some("abcd1234")
        );
        assert!(supabase_project_ref("http://abcd1234.supabase.co").is_none());
        assert!(supabase_project_ref("https://example.com").is_none());
    }

    #[test]
    fn payout_defaults_to_five_day_grace() {
        let config = PayoutConfig::default();
        assert_eq!(config.grace_period, chrono::Duration::days(5));
        assert_eq!(config.sweep_interval, Duration::from_secs(3600));
    }
}
