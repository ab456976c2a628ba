//! JSON snapshots of the store: decrypted wallets and the full backup.
//!
//! Both are write-only; there is no import path.

use chrono::{SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;
use tracing::info;

use crate::db::BotDb;
use crate::error::Result;
use crate::types::{ChainKind, ClaimRecord, CompletionRecord, TestnetJob, Wallet};
use crate::wallet::SecretCipher;

/// Wallet with its secrets in the clear.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedWallet {
    pub index: u64,
    pub chain_kind: ChainKind,
    pub address: String,
    pub secret_material: String,
    pub recovery_phrase: String,
    pub balance: Decimal,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Backup {
    pub wallets: Vec<Wallet>,
    pub testnets: Vec<TestnetJob>,
    pub completed: Vec<CompletionRecord>,
    pub claims: Vec<ClaimRecord>,
    pub export_date: String,
}

fn write_pretty<T: Serialize, W: Write>(value: &T, mut writer: W) -> Result<()> {
    let json = serde_json::to_vec_pretty(value)?;
    writer.write_all(&json)?;
    writer.flush()?;
    Ok(())
}

/// Every wallet, decrypted with `cipher`. Returns the number written.
pub fn export_wallets<W: Write>(db: &BotDb, cipher: &SecretCipher, writer: W) -> Result<usize> {
    let wallets: Vec<Wallet> = db.get_all()?;
    let exported = wallets
        .iter()
        .map(|w| {
            Ok(ExportedWallet {
                index: w.index,
                chain_kind: w.chain_kind,
                address: w.address.clone(),
                secret_material: cipher.open(&w.secret_material)?,
                recovery_phrase: cipher.open(&w.recovery_phrase)?,
                balance: w.balance,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    write_pretty(&exported, writer)?;
    info!("Exported {} wallets", exported.len());
    Ok(exported.len())
}

/// All four collections plus the export timestamp.
pub fn export_backup<W: Write>(db: &BotDb, writer: W) -> Result<Backup> {
    let backup = Backup {
        wallets: db.get_all()?,
        testnets: db.get_all()?,
        completed: db.get_all()?,
        claims: db.get_all()?,
        export_date: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    };
    write_pretty(&backup, writer)?;
    info!(
        "Backup written: {} wallets, {} testnets, {} completions, {} claims",
        backup.wallets.len(),
        backup.testnets.len(),
        backup.completed.len(),
        backup.claims.len()
    );
    Ok(backup)
}
