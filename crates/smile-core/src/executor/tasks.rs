//! Per-kind task handlers.
//!
//! Each handler draws its randomized amount or count, submits one operation
//! and returns the outcome. Dispatch is an exhaustive match on the variant.

use rust_decimal::Decimal;
use tracing::info;

use crate::error::{Result, SmileError};
use crate::executor::backend::{Operation, OperationBackend};
use crate::jitter::Jitter;
use crate::types::{TaskDefinition, TaskKind};

/// Result of one task against one wallet.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskOutcome {
    pub kind: TaskKind,
    pub amount: Option<Decimal>,
    pub count: Option<u32>,
    pub tx_hash: String,
    pub rpc_endpoint: Option<String>,
}

/// Bounds used when a definition leaves them out.
pub fn default_amount_bounds(kind: TaskKind) -> (Decimal, Decimal) {
    match kind {
        TaskKind::SwapTokens | TaskKind::Bridge => (Decimal::new(1, 2), Decimal::new(1, 1)),
        TaskKind::Stake | TaskKind::ProvideLiquidity => (Decimal::new(1, 1), Decimal::ONE),
        _ => (Decimal::ZERO, Decimal::ZERO),
    }
}

pub const DEFAULT_MINT_COUNT: (u32, u32) = (1, 3);

pub(crate) struct TaskContext<'a> {
    pub backend: &'a dyn OperationBackend,
    pub jitter: &'a Jitter,
    pub wallet: &'a str,
    pub chain: &'a str,
}

impl TaskContext<'_> {
    pub(crate) async fn run(&self, task: &TaskDefinition) -> Result<TaskOutcome> {
        match task {
            TaskDefinition::ClaimFaucet { .. } => self.claim_faucet().await,
            TaskDefinition::SwapTokens { amount_min, amount_max, .. } => {
                self.with_amount(TaskKind::SwapTokens, *amount_min, *amount_max).await
            }
            TaskDefinition::Bridge { amount_min, amount_max, .. } => {
                self.with_amount(TaskKind::Bridge, *amount_min, *amount_max).await
            }
            TaskDefinition::MintNft { count_min, count_max, .. } => {
                self.mint_nft(*count_min, *count_max).await
            }
            TaskDefinition::Stake { amount_min, amount_max, .. } => {
                self.with_amount(TaskKind::Stake, *amount_min, *amount_max).await
            }
            TaskDefinition::ProvideLiquidity { amount_min, amount_max, .. } => {
                self.with_amount(TaskKind::ProvideLiquidity, *amount_min, *amount_max).await
            }
            TaskDefinition::Custom { description, manual } => {
                if *manual {
                    return Err(SmileError::UnsupportedTask(format!(
                        "manual step cannot be automated: {}",
                        description
                    )));
                }
                self.custom(description).await
            }
        }
    }

    async fn claim_faucet(&self) -> Result<TaskOutcome> {
        info!("Claiming faucet for {}", self.wallet);
        self.submit(TaskKind::ClaimFaucet, None, None).await
    }

    async fn with_amount(
        &self,
        kind: TaskKind,
        min: Option<Decimal>,
        max: Option<Decimal>,
    ) -> Result<TaskOutcome> {
        let (default_min, default_max) = default_amount_bounds(kind);
        let amount = self
            .jitter
            .amount(min.unwrap_or(default_min), max.unwrap_or(default_max));
        info!("{} {} for {}", kind, amount, self.wallet);
        self.submit(kind, Some(amount), None).await
    }

    async fn mint_nft(&self, min: Option<u32>, max: Option<u32>) -> Result<TaskOutcome> {
        let count = self.jitter.count(
            min.unwrap_or(DEFAULT_MINT_COUNT.0),
            max.unwrap_or(DEFAULT_MINT_COUNT.1),
        );
        info!("Minting {} NFTs for {}", count, self.wallet);
        self.submit(TaskKind::MintNft, None, Some(count)).await
    }

    async fn custom(&self, description: &str) -> Result<TaskOutcome> {
        info!("Custom step for {}: {}", self.wallet, description);
        self.submit(TaskKind::Custom, None, None).await
    }

    async fn submit(
        &self,
        kind: TaskKind,
        amount: Option<Decimal>,
        count: Option<u32>,
    ) -> Result<TaskOutcome> {
        let operation = Operation::Task {
            kind,
            wallet: self.wallet,
            chain: self.chain,
            amount,
            count,
        };
        let receipt = self.backend.submit(&operation).await?;
        Ok(TaskOutcome {
            kind,
            amount,
            count,
            tx_hash: receipt.tx_hash,
            rpc_endpoint: receipt.rpc_endpoint,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::backend::{RpcRotator, SimulatedBackend};
    use std::str::FromStr;

    fn backend() -> SimulatedBackend {
        SimulatedBackend::new(Jitter::default(), 0.0, 0.0, RpcRotator::default())
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[tokio::test]
    async fn test_swap_amount_within_jittered_bounds() {
        let backend = backend();
        let jitter = Jitter::default();
        let ctx = TaskContext { backend: &backend, jitter: &jitter, wallet: "0xabc", chain: "scroll" };
        let task = TaskDefinition::SwapTokens {
            description: String::new(),
            amount_min: Some(dec("1")),
            amount_max: Some(dec("2")),
        };

        for _ in 0..50 {
            let outcome = ctx.run(&task).await.unwrap();
            let amount = outcome.amount.unwrap();
            assert!(amount >= dec("0.85") && amount <= dec("2.3"), "{}", amount);
            assert!(amount.scale() <= 6);
        }
    }

    #[tokio::test]
    async fn test_defaults_apply_when_bounds_missing() {
        let backend = backend();
        let jitter = Jitter::default();
        let ctx = TaskContext { backend: &backend, jitter: &jitter, wallet: "0xabc", chain: "base" };

        let stake = TaskDefinition::Stake { description: String::new(), amount_min: None, amount_max: None };
        let amount = ctx.run(&stake).await.unwrap().amount.unwrap();
        assert!(amount >= dec("0.085") && amount <= dec("1.15"));

        let mint = TaskDefinition::MintNft { description: String::new(), count_min: None, count_max: None };
        let count = ctx.run(&mint).await.unwrap().count.unwrap();
        assert!((1..=3).contains(&count));
    }

    #[tokio::test]
    async fn test_faucet_and_custom_have_no_amount() {
        let backend = backend();
        let jitter = Jitter::default();
        let ctx = TaskContext { backend: &backend, jitter: &jitter, wallet: "0xabc", chain: "scroll" };

        let faucet = ctx.run(&TaskDefinition::ClaimFaucet { description: String::new() }).await.unwrap();
        assert_eq!(faucet.amount, None);
        assert_eq!(faucet.count, None);

        let custom = ctx
            .run(&TaskDefinition::Custom { description: "ping".into(), manual: false })
            .await
            .unwrap();
        assert_eq!(custom.kind, TaskKind::Custom);
        assert_eq!(custom.amount, None);
    }

    #[tokio::test]
    async fn test_manual_custom_is_unsupported() {
        let backend = backend();
        let jitter = Jitter::default();
        let ctx = TaskContext { backend: &backend, jitter: &jitter, wallet: "0xabc", chain: "scroll" };
        let err = ctx
            .run(&TaskDefinition::Custom { description: "solve captcha".into(), manual: true })
            .await
            .unwrap_err();
        assert!(matches!(err, SmileError::UnsupportedTask(_)));
    }
}
