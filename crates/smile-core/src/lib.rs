//! ============================================================================
//! SMILE-CORE: Testnet batch runner
//! ============================================================================
//! This crate handles all run logic for the SMILE bot:
//! - Paged redb store for wallets, testnets, completions and claims
//! - Batched synthetic wallet generation with sealed secrets
//! - Sequential task execution with jittered timing and completion records
//! - Forward / reverse cascade transfers
//! - Discovery backend client with offline fallbacks and a local task parser
//! ============================================================================

pub mod cascade;
pub mod config;
pub mod db;
pub mod error;
pub mod executor;
pub mod export;
pub mod jitter;
pub mod run;
pub mod types;
pub mod upstream;
pub mod wallet;

// Re-export main types for convenience
pub use types::*;
pub use cascade::{CascadeDirection, CascadeEngine, CascadeReport, CascadeStep};
pub use config::{BotConfig, JitterConfig, TimingConfig};
pub use db::{BotDb, Collection, DbStats, StorageError};
pub use error::{Result, SmileError};
pub use executor::{OperationBackend, SimulatedBackend, TaskExecutor};
pub use jitter::Jitter;
pub use run::{RunController, RunGuard, RunHandle};
pub use upstream::{HttpJobSource, JobService, JobSource, OfflineJobSource, ParsedTask};
pub use wallet::{SecretCipher, WalletGenerator};
