// ============================================================================
// BotDb - Paged Embedded Store (redb)
// ============================================================================
// Persistent local storage for wallets, testnet jobs, completion records and
// claims. Every batch write is one redb write transaction: all records become
// visible together or not at all.
// Default path: ~/.smile/smile.redb (override via SMILE_DB_PATH env var)
// ============================================================================

pub mod types;

pub use types::{AddressLink, AutoIncrement, Collection, DbStats, Record, StorageError};

use chrono::Utc;
use redb::{Database, ReadableTable, ReadableTableMetadata};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::types::{CompletionRecord, Wallet};
use types::{decode_numeric_key, numeric_key, WALLET_ADDRESSES};

type Result<T> = std::result::Result<T, StorageError>;

fn backend<E: std::fmt::Display>(context: &'static str) -> impl FnOnce(E) -> StorageError {
    move |e| StorageError::Backend(format!("{}: {}", context, e))
}

fn encode<R: Record>(record: &R) -> Result<Vec<u8>> {
    serde_json::to_vec(record).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn decode<R: Record>(bytes: &[u8]) -> Result<R> {
    serde_json::from_slice(bytes).map_err(|e| {
        StorageError::Serialization(format!("{} record: {}", R::COLLECTION.as_str(), e))
    })
}

/// Embedded database for the batch runner
pub struct BotDb {
    db: Database,
    path: PathBuf,
}

impl BotDb {
    /// Open (or create) the database at the given path.
    /// If `path` is None, uses SMILE_DB_PATH env var or ~/.smile/smile.redb
    pub fn open(path: Option<&Path>) -> Result<Self> {
        let db_path = if let Some(p) = path {
            p.to_path_buf()
        } else if let Ok(env_path) = std::env::var("SMILE_DB_PATH") {
            PathBuf::from(env_path)
        } else {
            let home = dirs::home_dir()
                .ok_or_else(|| StorageError::Backend("Cannot determine home directory".into()))?;
            let smile_dir = home.join(".smile");
            std::fs::create_dir_all(&smile_dir).map_err(backend("Failed to create .smile directory"))?;
            smile_dir.join("smile.redb")
        };

        info!("Opening database at: {}", db_path.display());

        let db = Database::create(&db_path).map_err(backend("Failed to open database"))?;

        // Tables are created lazily by redb; touch them all once so reads never
        // hit a missing table. Existing records are left untouched.
        let write_txn = db.begin_write().map_err(backend("Failed to begin write"))?;
        {
            for collection in Collection::ALL {
                write_txn
                    .open_table(collection.table())
                    .map_err(backend("Failed to create table"))?;
            }
            write_txn
                .open_table(WALLET_ADDRESSES)
                .map_err(backend("Failed to create address index"))?;
        }
        write_txn.commit().map_err(backend("Failed to commit init"))?;

        info!("Database ready");

        Ok(Self { db, path: db_path })
    }

    /// Get the database file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    // ========================================================================
    // Batch Writes
    // ========================================================================

    /// Insert or overwrite `records` by primary key in a single transaction.
    ///
    /// Wallet batches also maintain the address index and reject an address
    /// owned by a different index; completion batches must reference stored
    /// wallets. Any failure aborts the whole batch.
    pub fn put_batch<R: Record>(&self, records: &[R]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let write_txn = self.db.begin_write().map_err(backend("Failed to begin write"))?;
        {
            let mut table = write_txn
                .open_table(R::COLLECTION.table())
                .map_err(backend("Failed to open table"))?;
            let mut addresses = write_txn
                .open_table(WALLET_ADDRESSES)
                .map_err(backend("Failed to open address index"))?;

            for record in records {
                let key = record.key();
                match record.address_link() {
                    AddressLink::None => {}
                    AddressLink::Owns(address) => {
                        let index = decode_numeric_key(&key).unwrap_or_default();
                        let owner = addresses
                            .get(address)
                            .map_err(backend("Failed to read address index"))?
                            .map(|g| g.value());
                        if let Some(owner) = owner {
                            if owner != index {
                                return Err(StorageError::DuplicateAddress {
                                    address: address.to_string(),
                                    index: owner,
                                });
                            }
                        }
                        // Overwriting a wallet under a new address drops the stale entry
                        let previous = table
                            .get(key.as_slice())
                            .map_err(backend("Failed to read record"))?
                            .map(|g| g.value().to_vec());
                        if let Some(bytes) = previous {
                            let old: Wallet = decode(&bytes)?;
                            if old.address != address {
                                addresses
                                    .remove(old.address.as_str())
                                    .map_err(backend("Failed to update address index"))?;
                            }
                        }
                        addresses
                            .insert(address, index)
                            .map_err(backend("Failed to update address index"))?;
                    }
                    AddressLink::References(address) => {
                        let known = addresses
                            .get(address)
                            .map_err(backend("Failed to read address index"))?
                            .is_some();
                        if !known {
                            return Err(StorageError::UnknownWallet(address.to_string()));
                        }
                    }
                }

                let value = encode(record)?;
                table
                    .insert(key.as_slice(), value.as_slice())
                    .map_err(backend("Failed to insert record"))?;
            }
        }
        write_txn.commit().map_err(backend("Failed to commit"))?;

        debug!("Stored {} {} records", records.len(), R::COLLECTION.as_str());
        Ok(records.len())
    }

    /// Insert records into an auto-increment collection, assigning ids after
    /// the current highest one. Returns the records with their ids set.
    pub fn append<R: AutoIncrement>(&self, mut records: Vec<R>) -> Result<Vec<R>> {
        if records.is_empty() {
            return Ok(records);
        }

        let write_txn = self.db.begin_write().map_err(backend("Failed to begin write"))?;
        {
            let mut table = write_txn
                .open_table(R::COLLECTION.table())
                .map_err(backend("Failed to open table"))?;
            let addresses = write_txn
                .open_table(WALLET_ADDRESSES)
                .map_err(backend("Failed to open address index"))?;

            let mut next_id = table
                .last()
                .map_err(backend("Failed to read last key"))?
                .and_then(|(k, _)| decode_numeric_key(k.value()))
                .unwrap_or(0)
                + 1;

            for record in records.iter_mut() {
                if let AddressLink::References(address) = record.address_link() {
                    let known = addresses
                        .get(address)
                        .map_err(backend("Failed to read address index"))?
                        .is_some();
                    if !known {
                        return Err(StorageError::UnknownWallet(address.to_string()));
                    }
                }

                record.set_id(next_id);
                next_id += 1;

                let value = encode(&*record)?;
                table
                    .insert(record.key().as_slice(), value.as_slice())
                    .map_err(backend("Failed to insert record"))?;
            }
        }
        write_txn.commit().map_err(backend("Failed to commit"))?;

        debug!("Appended {} {} records", records.len(), R::COLLECTION.as_str());
        Ok(records)
    }

    /// Append one completion record for `(job_id, wallet_address)`.
    pub fn record_completion(&self, job_id: &str, wallet_address: &str) -> Result<CompletionRecord> {
        let record = CompletionRecord {
            id: 0,
            job_id: job_id.to_string(),
            wallet_address: wallet_address.to_string(),
            timestamp: Utc::now(),
        };
        let mut stored = self.append(vec![record])?;
        stored
            .pop()
            .ok_or_else(|| StorageError::Backend("Completion insert returned nothing".into()))
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Every record of `R`'s collection in primary-key order.
    pub fn get_all<R: Record>(&self) -> Result<Vec<R>> {
        let read_txn = self.db.begin_read().map_err(backend("Failed to begin read"))?;
        let table = read_txn
            .open_table(R::COLLECTION.table())
            .map_err(backend("Failed to open table"))?;

        let mut results = Vec::new();
        let iter = table.iter().map_err(backend("Failed to iterate table"))?;
        for entry in iter {
            let (_key, value) = entry.map_err(backend("Failed to read entry"))?;
            results.push(decode(value.value())?);
        }
        Ok(results)
    }

    /// One page of records in primary-key order. `page` is 1-based (0 is
    /// treated as 1); past the end this returns fewer records or none.
    pub fn get_page<R: Record>(&self, page: usize, page_size: usize) -> Result<Vec<R>> {
        if page_size == 0 {
            return Ok(Vec::new());
        }
        let skip = page.saturating_sub(1).saturating_mul(page_size);

        let read_txn = self.db.begin_read().map_err(backend("Failed to begin read"))?;
        let table = read_txn
            .open_table(R::COLLECTION.table())
            .map_err(backend("Failed to open table"))?;

        let mut results = Vec::with_capacity(page_size);
        let iter = table.iter().map_err(backend("Failed to iterate table"))?;
        for entry in iter.skip(skip).take(page_size) {
            let (_key, value) = entry.map_err(backend("Failed to read entry"))?;
            results.push(decode(value.value())?);
        }
        Ok(results)
    }

    pub fn count(&self, collection: Collection) -> Result<u64> {
        let read_txn = self.db.begin_read().map_err(backend("Failed to begin read"))?;
        let table = read_txn
            .open_table(collection.table())
            .map_err(backend("Failed to open table"))?;
        table.len().map_err(backend("Failed to count table"))
    }

    pub fn get_wallet(&self, index: u64) -> Result<Option<Wallet>> {
        let read_txn = self.db.begin_read().map_err(backend("Failed to begin read"))?;
        let table = read_txn
            .open_table(Collection::Wallets.table())
            .map_err(backend("Failed to open wallets table"))?;

        match table
            .get(numeric_key(index).as_slice())
            .map_err(backend("Failed to get wallet"))?
        {
            Some(value) => Ok(Some(decode(value.value())?)),
            None => Ok(None),
        }
    }

    pub fn wallet_by_address(&self, address: &str) -> Result<Option<Wallet>> {
        let index = {
            let read_txn = self.db.begin_read().map_err(backend("Failed to begin read"))?;
            let addresses = read_txn
                .open_table(WALLET_ADDRESSES)
                .map_err(backend("Failed to open address index"))?;
            let found = addresses
                .get(address)
                .map_err(backend("Failed to read address index"))?
                .map(|g| g.value());
            found
        };
        match index {
            Some(index) => self.get_wallet(index),
            None => Ok(None),
        }
    }

    /// Highest stored wallet index, 0 when there are no wallets.
    pub fn max_wallet_index(&self) -> Result<u64> {
        let read_txn = self.db.begin_read().map_err(backend("Failed to begin read"))?;
        let table = read_txn
            .open_table(Collection::Wallets.table())
            .map_err(backend("Failed to open wallets table"))?;
        let last = table
            .last()
            .map_err(backend("Failed to read last wallet"))?
            .and_then(|(k, _)| decode_numeric_key(k.value()));
        Ok(last.unwrap_or(0))
    }

    /// Distinct job ids that have at least one completion record.
    pub fn completed_job_ids(&self) -> Result<Vec<String>> {
        let ids: BTreeSet<String> = self
            .get_all::<CompletionRecord>()?
            .into_iter()
            .map(|c| c.job_id)
            .collect();
        Ok(ids.into_iter().collect())
    }

    pub fn completions_for_job(&self, job_id: &str) -> Result<Vec<CompletionRecord>> {
        Ok(self
            .get_all::<CompletionRecord>()?
            .into_iter()
            .filter(|c| c.job_id == job_id)
            .collect())
    }

    // ========================================================================
    // Clearing
    // ========================================================================

    pub fn clear(&self, collection: Collection) -> Result<()> {
        let write_txn = self.db.begin_write().map_err(backend("Failed to begin write"))?;
        {
            write_txn
                .delete_table(collection.table())
                .map_err(backend("Failed to drop table"))?;
            write_txn
                .open_table(collection.table())
                .map_err(backend("Failed to recreate table"))?;
            if collection == Collection::Wallets {
                write_txn
                    .delete_table(WALLET_ADDRESSES)
                    .map_err(backend("Failed to drop address index"))?;
                write_txn
                    .open_table(WALLET_ADDRESSES)
                    .map_err(backend("Failed to recreate address index"))?;
            }
        }
        write_txn.commit().map_err(backend("Failed to commit clear"))?;

        info!("Cleared {}", collection.as_str());
        Ok(())
    }

    pub fn clear_all(&self) -> Result<()> {
        for collection in Collection::ALL {
            self.clear(collection)?;
        }
        Ok(())
    }

    // ========================================================================
    // Statistics
    // ========================================================================

    pub fn stats(&self) -> Result<DbStats> {
        Ok(DbStats {
            wallets: self.count(Collection::Wallets)?,
            jobs: self.count(Collection::Jobs)?,
            completions: self.count(Collection::Completions)?,
            claims: self.count(Collection::Claims)?,
            max_wallet_index: self.max_wallet_index()?,
        })
    }
}
