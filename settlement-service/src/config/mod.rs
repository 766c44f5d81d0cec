use secrecy::Secret;
use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct SettlementConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub storage: StorageConfig,
    pub cors: CorsConfig,
    pub signing: SigningConfig,
    pub gateway: GatewayConfig,
    pub proofs: ProofConfig,
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub local_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    /// Origins allowed to call the service; `*` opens it up for dev.
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SigningConfig {
    pub secret: Secret<String>,
    pub url_ttl_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Turn off to make every sandbox rail approve deterministically.
    pub simulate_failures: bool,
    pub latency_ms: u64,
    pub attempt_timeout_ms: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub card_decline_rate: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProofConfig {
    pub ttl_days: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub interval_seconds: u64,
}

impl SettlementConfig {
    pub fn load() -> Result<Self, AppError> {
        // Common config handles .env and the APP__ prefix.
        let common = core_config::Config::load()?;
        let is_prod = common.is_prod();

        Ok(SettlementConfig {
            common,
            storage: StorageConfig {
                local_path: get_env("STORAGE_LOCAL_PATH", Some("storage"), is_prod)?,
            },
            cors: CorsConfig {
                allowed_origins: get_env("CORS_ALLOWED_ORIGINS", Some("*"), is_prod)?
                    .split(',')
                    .map(|origin| origin.trim().to_string())
                    .collect(),
            },
            signing: SigningConfig {
                secret: Secret::new(get_env(
                    "SIGNING_SECRET",
                    Some("dev-signing-secret"),
                    is_prod,
                )?),
                url_ttl_seconds: parse_env("SIGNED_URL_TTL_SECONDS", 300)?,
            },
            gateway: GatewayConfig {
                simulate_failures: parse_env("GATEWAY_SIMULATE_FAILURES", true)?,
                latency_ms: parse_env("GATEWAY_LATENCY_MS", 400)?,
                attempt_timeout_ms: parse_env("GATEWAY_ATTEMPT_TIMEOUT_MS", 5_000)?,
                max_retries: parse_env("PAYMENT_MAX_RETRIES", 3)?,
                retry_backoff_ms: parse_env("PAYMENT_RETRY_BACKOFF_MS", 200)?,
                card_decline_rate: parse_env("CARD_DECLINE_RATE", 0.05)?,
            },
            proofs: ProofConfig {
                ttl_days: parse_env("PROOF_TTL_DAYS", 30)?,
            },
            scheduler: SchedulerConfig {
                enabled: parse_env("SCHEDULER_ENABLED", true)?,
                interval_seconds: parse_env("SCHEDULER_INTERVAL_SECONDS", 60)?,
            },
        })
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

fn parse_env<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(val) => val.parse().map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!(format!("Invalid {}: {}", key, e)))
        }),
        Err(_) => Ok(default),
    }
}
