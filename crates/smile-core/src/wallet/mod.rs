//! ============================================================================
//! Wallet Module - Batched synthetic wallet generation
//! ============================================================================
//! Generates up to `max_wallets` wallets per call in fixed-size batches:
//! - indices continue after the highest stored index (never renumbered)
//! - every batch is written with one `put_batch` transaction
//! - progress is reported after each batch, then the task yields
//! ============================================================================

mod address;
mod cipher;

pub use address::{derive_address, random_secret, recovery_phrase, secret_hex, SECRET_LEN};
pub use cipher::SecretCipher;

use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::config::BotConfig;
use crate::db::BotDb;
use crate::error::{Result, SmileError};
use crate::types::{ChainKind, Progress, Wallet};

pub struct WalletGenerator {
    db: Arc<BotDb>,
    cipher: SecretCipher,
    max_wallets: usize,
    batch_size: usize,
    batch_yield: Duration,
}

impl WalletGenerator {
    pub fn new(db: Arc<BotDb>, cipher: SecretCipher, config: &BotConfig) -> Self {
        Self {
            db,
            cipher,
            max_wallets: config.max_wallets,
            batch_size: config.batch_size.max(1),
            batch_yield: config.batch_yield,
        }
    }

    /// Build one wallet record; nothing is persisted.
    pub fn synthesize(&self, index: u64, kind: ChainKind) -> Result<Wallet> {
        let secret = random_secret();
        Ok(Wallet {
            index,
            chain_kind: kind,
            address: derive_address(kind, &secret),
            secret_material: self.cipher.seal(&secret_hex(&secret))?,
            recovery_phrase: self.cipher.seal(&recovery_phrase())?,
            balance: Decimal::ZERO,
            created_at: Utc::now(),
        })
    }

    /// Generate and persist `count` wallets of `kind`.
    ///
    /// Returns `count` on success; any failure is returned as an error.
    /// Batches written before a storage failure stay in the store.
    pub async fn generate<P>(&self, count: usize, kind: ChainKind, mut on_progress: P) -> Result<usize>
    where
        P: FnMut(Progress),
    {
        if count < 1 || count > self.max_wallets {
            return Err(SmileError::invalid(format!(
                "Wallet count must be between 1 and {}",
                self.max_wallets
            )));
        }

        info!("Starting generation of {} {} wallets", count, kind);

        let start_index = self.db.max_wallet_index()? + 1;
        let total_batches = count.div_ceil(self.batch_size);
        let mut generated = 0usize;

        for batch in 0..total_batches {
            let batch_count = self.batch_size.min(count - generated);
            let first = start_index + generated as u64;

            let wallets = (0..batch_count as u64)
                .map(|i| self.synthesize(first + i, kind))
                .collect::<Result<Vec<_>>>()?;

            self.db.put_batch(&wallets)?;
            generated += batch_count;

            on_progress(Progress::new(generated, count));
            info!(
                "Batch {}/{}: {}/{} wallets",
                batch + 1,
                total_batches,
                generated,
                count
            );

            if self.batch_yield.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(self.batch_yield).await;
            }
        }

        info!("Generated {} wallets successfully", generated);
        Ok(generated)
    }
}
