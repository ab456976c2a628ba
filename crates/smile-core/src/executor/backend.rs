//! ============================================================================
//! Operation Backend - Where task and transfer operations are submitted
//! ============================================================================
//! `SimulatedBackend` stands in for chain access: each operation is a timed
//! no-op (base latency × delay jitter × simulation scale) that returns a
//! synthetic transaction hash, optionally failing at a configured rate.
//! ============================================================================

use async_trait::async_trait;
use rand::Rng;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

use crate::config::{BotConfig, MAX_SIMULATION_SCALE};
use crate::error::{Result, SmileError};
use crate::jitter::{synthetic_tx_hash, Jitter};
use crate::types::TaskKind;

/// A single unit submitted to the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation<'a> {
    Task {
        kind: TaskKind,
        wallet: &'a str,
        chain: &'a str,
        amount: Option<Decimal>,
        count: Option<u32>,
    },
    Transfer {
        from: &'a str,
        to: &'a str,
        amount: Option<Decimal>,
    },
}

impl Operation<'_> {
    /// Nominal latency of the real operation being simulated.
    pub fn base_latency(&self) -> Duration {
        let millis = match self {
            Operation::Task { kind, .. } => match kind {
                TaskKind::ClaimFaucet => 1500,
                TaskKind::SwapTokens => 2000,
                TaskKind::Bridge => 3000,
                TaskKind::MintNft => 2500,
                TaskKind::Stake => 2000,
                TaskKind::ProvideLiquidity => 3000,
                TaskKind::Custom => 2000,
            },
            Operation::Transfer { .. } => 2000,
        };
        Duration::from_millis(millis)
    }
}

/// Synthetic confirmation of a submitted operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub tx_hash: String,
    pub rpc_endpoint: Option<String>,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum OperationError {
    #[error("{0}")]
    Transient(String),
    #[error("{0}")]
    Unsupported(String),
}

impl From<OperationError> for SmileError {
    fn from(e: OperationError) -> Self {
        match e {
            OperationError::Transient(msg) => SmileError::TransientOperationFailure(msg),
            OperationError::Unsupported(msg) => SmileError::UnsupportedTask(msg),
        }
    }
}

#[async_trait]
pub trait OperationBackend: Send + Sync {
    async fn submit(&self, operation: &Operation<'_>) -> Result<Receipt, OperationError>;
}

/// Round-robin over each network's RPC endpoints.
#[derive(Debug, Default)]
pub struct RpcRotator {
    endpoints: HashMap<String, Vec<String>>,
    cursor: Mutex<HashMap<String, usize>>,
}

impl RpcRotator {
    pub fn new(endpoints: HashMap<String, Vec<String>>) -> Self {
        Self {
            endpoints,
            cursor: Mutex::new(HashMap::new()),
        }
    }

    /// Next endpoint for `network`, or None if none are configured.
    pub fn next(&self, network: &str) -> Option<String> {
        let urls = self.endpoints.get(network).filter(|u| !u.is_empty())?;
        let mut cursor = self.cursor.lock().unwrap_or_else(|p| p.into_inner());
        let slot = cursor.entry(network.to_string()).or_insert(0);
        let url = urls[*slot % urls.len()].clone();
        *slot = (*slot + 1) % urls.len();
        Some(url)
    }
}

pub struct SimulatedBackend {
    jitter: Jitter,
    scale: f64,
    failure_rate: f64,
    rpc: RpcRotator,
}

impl SimulatedBackend {
    pub fn new(jitter: Jitter, scale: f64, failure_rate: f64, rpc: RpcRotator) -> Self {
        Self {
            jitter,
            scale: if scale.is_finite() {
                scale.clamp(0.0, MAX_SIMULATION_SCALE)
            } else {
                0.0
            },
            failure_rate: failure_rate.clamp(0.0, 1.0),
            rpc,
        }
    }

    pub fn from_config(config: &BotConfig) -> Result<Self> {
        Ok(Self::new(
            Jitter::new(config.jitter)?,
            config.timing.simulation_scale,
            config.failure_rate,
            RpcRotator::new(config.rpc_endpoints.clone()),
        ))
    }
}

#[async_trait]
impl OperationBackend for SimulatedBackend {
    async fn submit(&self, operation: &Operation<'_>) -> Result<Receipt, OperationError> {
        let rpc_endpoint = match operation {
            Operation::Task { chain, .. } => self.rpc.next(chain),
            Operation::Transfer { .. } => None,
        };

        let latency = self.jitter.delay(operation.base_latency()).mul_f64(self.scale);
        if !latency.is_zero() {
            sleep(latency).await;
        }

        let failed = self.failure_rate > 0.0 && rand::thread_rng().gen_bool(self.failure_rate);
        if failed {
            return Err(OperationError::Transient(
                "simulated transaction was dropped".to_string(),
            ));
        }

        let receipt = Receipt {
            tx_hash: synthetic_tx_hash(),
            rpc_endpoint,
        };
        debug!("Simulated {:?} -> {}", operation, receipt.tx_hash);
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instant(failure_rate: f64) -> SimulatedBackend {
        SimulatedBackend::new(Jitter::default(), 0.0, failure_rate, RpcRotator::default())
    }

    #[test]
    fn test_scale_is_bounded() {
        let backend = |scale| SimulatedBackend::new(Jitter::default(), scale, 0.0, RpcRotator::default());
        assert_eq!(backend(f64::INFINITY).scale, 0.0);
        assert_eq!(backend(f64::NAN).scale, 0.0);
        assert_eq!(backend(-1.0).scale, 0.0);
        assert_eq!(backend(1e12).scale, MAX_SIMULATION_SCALE);
        assert_eq!(backend(0.5).scale, 0.5);
    }

    #[test]
    fn test_rpc_rotation_wraps() {
        let mut endpoints = HashMap::new();
        endpoints.insert("base".to_string(), vec!["a".to_string(), "b".to_string()]);
        let rotator = RpcRotator::new(endpoints);

        let picked: Vec<_> = (0..5).filter_map(|_| rotator.next("base")).collect();
        assert_eq!(picked, vec!["a", "b", "a", "b", "a"]);
        assert_eq!(rotator.next("unknown"), None);
    }

    #[test]
    fn test_base_latency_per_kind() {
        let op = Operation::Task {
            kind: TaskKind::Bridge,
            wallet: "0x1",
            chain: "scroll",
            amount: None,
            count: None,
        };
        assert_eq!(op.base_latency(), Duration::from_millis(3000));
        let transfer = Operation::Transfer { from: "a", to: "b", amount: None };
        assert_eq!(transfer.base_latency(), Duration::from_millis(2000));
    }

    #[tokio::test]
    async fn test_simulated_success_returns_hash_and_rpc() {
        let config = BotConfig::immediate();
        let backend = SimulatedBackend::from_config(&config).unwrap();
        let op = Operation::Task {
            kind: TaskKind::ClaimFaucet,
            wallet: "0x1",
            chain: "scroll",
            amount: None,
            count: None,
        };
        let receipt = backend.submit(&op).await.unwrap();
        assert_eq!(receipt.tx_hash.len(), 66);
        assert_eq!(
            receipt.rpc_endpoint.as_deref(),
            Some("https://scroll-sepolia.drpc.org")
        );
    }

    #[tokio::test]
    async fn test_simulated_failure_rate_one_always_fails() {
        let backend = instant(1.0);
        let op = Operation::Transfer { from: "a", to: "b", amount: None };
        let err = backend.submit(&op).await.unwrap_err();
        assert!(matches!(err, OperationError::Transient(_)));
        assert!(matches!(
            SmileError::from(err),
            SmileError::TransientOperationFailure(_)
        ));
    }
}
