//! ============================================================================
//! Configuration - Runtime settings with env overrides
//! ============================================================================
//! Defaults mirror the production bot: 5s between tasks, 45s between wallets,
//! ±30% delay jitter, ±15% amount jitter, batches of 100 wallets.
//! Values are overridden from the process environment (and a `.env` file).
//! ============================================================================

use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{Result, SmileError};

pub const DEFAULT_API_URL: &str = "https://smile-backend.vercel.app";
pub const DEFAULT_MAX_WALLETS: usize = 100_000;
pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_PAGE_SIZE: usize = 50;
/// Longest accepted base delay (one day)
pub const MAX_DELAY_SECS: f64 = 86_400.0;
/// Largest accepted simulated-latency multiplier
pub const MAX_SIMULATION_SCALE: f64 = 1_000.0;

/// Multiplicative jitter windows for delays and amounts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JitterConfig {
    pub delay_min: f64,
    pub delay_max: f64,
    pub amount_min: f64,
    pub amount_max: f64,
}

impl Default for JitterConfig {
    fn default() -> Self {
        Self {
            delay_min: 0.7,
            delay_max: 1.3,
            amount_min: 0.85,
            amount_max: 1.15,
        }
    }
}

impl JitterConfig {
    pub fn validate(&self) -> Result<()> {
        let windows = [
            ("delay", self.delay_min, self.delay_max),
            ("amount", self.amount_min, self.amount_max),
        ];
        for (name, min, max) in windows {
            if !(min > 0.0 && min <= max && max.is_finite()) {
                return Err(SmileError::invalid(format!(
                    "{} jitter window [{}, {}] must be positive and ordered",
                    name, min, max
                )));
            }
        }
        Ok(())
    }
}

/// Inter-step timing used by the executor and the cascade engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingConfig {
    /// Base pause after every task
    pub task_delay: Duration,
    /// Base pause after every wallet / cascade step
    pub wallet_delay: Duration,
    /// Multiplier applied to simulated operation latency (0 disables it)
    pub simulation_scale: f64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            task_delay: Duration::from_secs(5),
            wallet_delay: Duration::from_secs(45),
            simulation_scale: 1.0,
        }
    }
}

impl TimingConfig {
    /// No pauses and no simulated latency.
    pub fn immediate() -> Self {
        Self {
            task_delay: Duration::ZERO,
            wallet_delay: Duration::ZERO,
            simulation_scale: 0.0,
        }
    }
}

/// Top-level bot configuration
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub api_url: String,
    pub timing: TimingConfig,
    pub jitter: JitterConfig,
    pub max_wallets: usize,
    pub batch_size: usize,
    pub wallets_per_page: usize,
    /// Pause between generator batches
    pub batch_yield: Duration,
    /// Probability that a simulated operation fails
    pub failure_rate: f64,
    /// Passphrase sealing wallet secrets; required to generate or export
    pub wallet_passphrase: Option<String>,
    pub rpc_endpoints: HashMap<String, Vec<String>>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            timing: TimingConfig::default(),
            jitter: JitterConfig::default(),
            max_wallets: DEFAULT_MAX_WALLETS,
            batch_size: DEFAULT_BATCH_SIZE,
            wallets_per_page: DEFAULT_PAGE_SIZE,
            batch_yield: Duration::from_millis(10),
            failure_rate: 0.0,
            wallet_passphrase: None,
            rpc_endpoints: default_rpc_endpoints(),
        }
    }
}

fn default_rpc_endpoints() -> HashMap<String, Vec<String>> {
    let table: [(&str, &[&str]); 5] = [
        (
            "scroll",
            &[
                "https://scroll-sepolia.drpc.org",
                "https://sepolia-rpc.scroll.io",
                "https://scroll-testnet.public.blastapi.io",
            ],
        ),
        (
            "linea",
            &["https://rpc.goerli.linea.build", "https://linea-testnet.infura.io"],
        ),
        (
            "base",
            &["https://sepolia.base.org", "https://base-sepolia.public.blastapi.io"],
        ),
        (
            "optimism",
            &[
                "https://sepolia.optimism.io",
                "https://optimism-sepolia.public.blastapi.io",
            ],
        ),
        (
            "arbitrum",
            &[
                "https://sepolia-rollup.arbitrum.io/rpc",
                "https://arbitrum-sepolia.public.blastapi.io",
            ],
        ),
    ];

    table
        .iter()
        .map(|(network, urls)| {
            (
                network.to_string(),
                urls.iter().map(|u| u.to_string()).collect(),
            )
        })
        .collect()
}

/// Parse `key` from the environment, keeping `default` when unset or invalid.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                warn!("Ignoring invalid {}={:?}, keeping default", key, raw);
                default
            }
        },
        Err(_) => default,
    }
}

/// Like [`env_or`], but values outside `range` (NaN and infinities included)
/// also keep `default`.
fn env_in_range(key: &str, default: f64, range: RangeInclusive<f64>) -> f64 {
    let value = env_or(key, default);
    if range.contains(&value) {
        value
    } else {
        warn!(
            "Ignoring {}={} outside [{}, {}], keeping default",
            key,
            value,
            range.start(),
            range.end()
        );
        default
    }
}

impl BotConfig {
    /// Defaults overridden by `.env` and `SMILE_*` environment variables.
    pub fn from_env() -> Self {
        if let Err(e) = dotenvy::dotenv() {
            debug!("No .env file loaded: {}", e);
        }

        let defaults = Self::default();
        let delay_range = 0.0..=MAX_DELAY_SECS;
        let task_secs = env_in_range(
            "SMILE_TASK_DELAY",
            defaults.timing.task_delay.as_secs_f64(),
            delay_range.clone(),
        );
        let wallet_secs = env_in_range(
            "SMILE_WALLET_DELAY",
            defaults.timing.wallet_delay.as_secs_f64(),
            delay_range,
        );

        Self {
            api_url: std::env::var("SMILE_API_URL").unwrap_or(defaults.api_url),
            timing: TimingConfig {
                task_delay: secs(task_secs, defaults.timing.task_delay),
                wallet_delay: secs(wallet_secs, defaults.timing.wallet_delay),
                simulation_scale: env_in_range(
                    "SMILE_SIMULATION_SCALE",
                    defaults.timing.simulation_scale,
                    0.0..=MAX_SIMULATION_SCALE,
                ),
            },
            jitter: defaults.jitter,
            max_wallets: env_or("SMILE_MAX_WALLETS", defaults.max_wallets),
            batch_size: env_or("SMILE_BATCH_SIZE", defaults.batch_size).max(1),
            wallets_per_page: defaults.wallets_per_page,
            batch_yield: defaults.batch_yield,
            failure_rate: env_in_range("SMILE_FAILURE_RATE", defaults.failure_rate, 0.0..=1.0),
            wallet_passphrase: std::env::var("SMILE_WALLET_PASSPHRASE").ok(),
            rpc_endpoints: defaults.rpc_endpoints,
        }
    }

    /// Configuration for tests and dry runs: no waiting anywhere.
    pub fn immediate() -> Self {
        Self {
            timing: TimingConfig::immediate(),
            batch_yield: Duration::ZERO,
            ..Self::default()
        }
    }
}

fn secs(value: f64, default: Duration) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BotConfig::default();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.timing.task_delay, Duration::from_secs(5));
        assert_eq!(config.timing.wallet_delay, Duration::from_secs(45));
        assert_eq!(config.max_wallets, 100_000);
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.wallets_per_page, 50);
        assert_eq!(config.jitter, JitterConfig::default());
        assert_eq!(config.rpc_endpoints["scroll"].len(), 3);
        assert!(config.wallet_passphrase.is_none());
    }

    #[test]
    fn test_jitter_validation() {
        assert!(JitterConfig::default().validate().is_ok());

        let inverted = JitterConfig { delay_min: 1.3, delay_max: 0.7, ..Default::default() };
        assert!(inverted.validate().is_err());

        let zero = JitterConfig { amount_min: 0.0, ..Default::default() };
        assert!(zero.validate().is_err());
    }

    #[test]
    fn test_immediate_has_no_waits() {
        let config = BotConfig::immediate();
        assert_eq!(config.timing.task_delay, Duration::ZERO);
        assert_eq!(config.timing.wallet_delay, Duration::ZERO);
        assert_eq!(config.timing.simulation_scale, 0.0);
        assert_eq!(config.batch_yield, Duration::ZERO);
    }

    #[test]
    fn test_negative_seconds_fall_back() {
        assert_eq!(secs(-1.0, Duration::from_secs(5)), Duration::from_secs(5));
        assert_eq!(secs(1.5, Duration::from_secs(5)), Duration::from_millis(1500));
    }

    #[test]
    fn test_out_of_range_env_keeps_default() {
        let key = "SMILE_TEST_RANGE_CHECK";
        for raw in ["inf", "NaN", "-2", "1e30"] {
            std::env::set_var(key, raw);
            assert_eq!(env_in_range(key, 1.0, 0.0..=MAX_SIMULATION_SCALE), 1.0, "{}", raw);
        }
        std::env::set_var(key, "2.5");
        assert_eq!(env_in_range(key, 1.0, 0.0..=MAX_SIMULATION_SCALE), 2.5);
        std::env::remove_var(key);
        assert_eq!(env_in_range(key, 1.0, 0.0..=MAX_SIMULATION_SCALE), 1.0);
    }

    #[test]
    fn test_huge_wallet_delay_keeps_default() {
        std::env::set_var("SMILE_WALLET_DELAY", "18446744073709551615");
        std::env::set_var("SMILE_SIMULATION_SCALE", "inf");
        let config = BotConfig::from_env();
        std::env::remove_var("SMILE_WALLET_DELAY");
        std::env::remove_var("SMILE_SIMULATION_SCALE");

        assert_eq!(config.timing.wallet_delay, Duration::from_secs(45));
        assert_eq!(config.timing.simulation_scale, 1.0);
        // The maximum jittered delay must still be representable
        let _ = config.timing.wallet_delay.mul_f64(config.jitter.delay_max);
    }
}
