//! ============================================================================
//! Core Types for the SMILE batch runner
//! ============================================================================
//! Wallets, jobs and their task lists, completion/claim records, and the
//! per-run result. Serialized as camelCase JSON both in the store and in
//! exports.
//! ============================================================================

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Address family a wallet was generated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChainKind {
    #[serde(rename = "eth", alias = "evm")]
    Evm,
    #[serde(rename = "btc")]
    Btc,
    #[serde(rename = "sol")]
    Sol,
}

impl ChainKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "eth" | "evm" => Some(Self::Evm),
            "btc" => Some(Self::Btc),
            "sol" => Some(Self::Sol),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Evm => "eth",
            Self::Btc => "btc",
            Self::Sol => "sol",
        }
    }
}

impl fmt::Display for ChainKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Base64 ciphertext of a wallet secret (nonce || sealed bytes).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SealedSecret(pub String);

/// Synthetic wallet as persisted in the `wallets` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    /// Dense from 1, primary and paging key
    pub index: u64,
    pub chain_kind: ChainKind,
    pub address: String,
    pub secret_material: SealedSecret,
    pub recovery_phrase: SealedSecret,
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
}

impl Wallet {
    /// Shortened address for log lines.
    pub fn short_address(&self) -> &str {
        short(&self.address)
    }
}

pub(crate) fn short(address: &str) -> &str {
    let end = address
        .char_indices()
        .nth(10)
        .map(|(i, _)| i)
        .unwrap_or(address.len());
    &address[..end]
}

/// One step of a job, closed over the kinds the executor knows how to drive.
/// Unknown `type` values fail to decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum TaskDefinition {
    ClaimFaucet {
        #[serde(default)]
        description: String,
    },
    SwapTokens {
        #[serde(default)]
        description: String,
        #[serde(default)]
        amount_min: Option<Decimal>,
        #[serde(default)]
        amount_max: Option<Decimal>,
    },
    Bridge {
        #[serde(default)]
        description: String,
        #[serde(default)]
        amount_min: Option<Decimal>,
        #[serde(default)]
        amount_max: Option<Decimal>,
    },
    MintNft {
        #[serde(default)]
        description: String,
        #[serde(default, alias = "minCount")]
        count_min: Option<u32>,
        #[serde(default, alias = "maxCount")]
        count_max: Option<u32>,
    },
    Stake {
        #[serde(default)]
        description: String,
        #[serde(default)]
        amount_min: Option<Decimal>,
        #[serde(default)]
        amount_max: Option<Decimal>,
    },
    ProvideLiquidity {
        #[serde(default)]
        description: String,
        #[serde(default)]
        amount_min: Option<Decimal>,
        #[serde(default)]
        amount_max: Option<Decimal>,
    },
    #[serde(alias = "custom_tx")]
    Custom {
        #[serde(default)]
        description: String,
        /// Step needs a human; executing it fails the wallet
        #[serde(default)]
        manual: bool,
    },
}

impl TaskDefinition {
    pub fn kind(&self) -> TaskKind {
        match self {
            Self::ClaimFaucet { .. } => TaskKind::ClaimFaucet,
            Self::SwapTokens { .. } => TaskKind::SwapTokens,
            Self::Bridge { .. } => TaskKind::Bridge,
            Self::MintNft { .. } => TaskKind::MintNft,
            Self::Stake { .. } => TaskKind::Stake,
            Self::ProvideLiquidity { .. } => TaskKind::ProvideLiquidity,
            Self::Custom { .. } => TaskKind::Custom,
        }
    }

    pub fn description(&self) -> &str {
        match self {
            Self::ClaimFaucet { description }
            | Self::SwapTokens { description, .. }
            | Self::Bridge { description, .. }
            | Self::MintNft { description, .. }
            | Self::Stake { description, .. }
            | Self::ProvideLiquidity { description, .. }
            | Self::Custom { description, .. } => description,
        }
    }
}

/// Payload-free discriminant of [`TaskDefinition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    ClaimFaucet,
    SwapTokens,
    Bridge,
    MintNft,
    Stake,
    ProvideLiquidity,
    Custom,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClaimFaucet => "claim_faucet",
            Self::SwapTokens => "swap_tokens",
            Self::Bridge => "bridge",
            Self::MintNft => "mint_nft",
            Self::Stake => "stake",
            Self::ProvideLiquidity => "provide_liquidity",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A testnet campaign: the ordered task list applied to every wallet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestnetJob {
    pub id: String,
    pub name: String,
    pub chain: String,
    pub tasks: Vec<TaskDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// Append-only proof that `wallet_address` finished job `job_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRecord {
    /// Assigned by the store on insert
    #[serde(default)]
    pub id: u64,
    #[serde(alias = "testnetId")]
    pub job_id: String,
    pub wallet_address: String,
    pub timestamp: DateTime<Utc>,
}

/// Address reported eligible for a claim by the upstream service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimRecord {
    #[serde(default)]
    pub id: u64,
    pub address: String,
    pub checked_at: DateTime<Utc>,
}

/// Progress tick delivered at every batch / wallet / step boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub done: usize,
    pub total: usize,
    /// 0..=100
    pub percent: u8,
}

impl Progress {
    pub fn new(done: usize, total: usize) -> Self {
        let percent = if total == 0 {
            100
        } else {
            ((done as f64 / total as f64) * 100.0).round().min(100.0) as u8
        };
        Self { done, total, percent }
    }
}

/// Per-wallet failure captured in a [`RunResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureDetail {
    pub wallet: String,
    pub error_message: String,
}

/// Outcome of one executor call. Not persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    /// Wallets handed to the run, visited or not
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub details: Vec<FailureDetail>,
}

impl RunResult {
    pub fn processed(&self) -> usize {
        self.successful + self.failed
    }
}
