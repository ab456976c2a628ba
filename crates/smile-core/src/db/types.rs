//! ============================================================================
//! Database Types - Collections, record keys and storage errors
//! ============================================================================

use redb::TableDefinition;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::types::{ClaimRecord, CompletionRecord, TestnetJob, Wallet};

type Table = TableDefinition<'static, &'static [u8], &'static [u8]>;

const WALLETS: Table = TableDefinition::new("wallets");
const TESTNETS: Table = TableDefinition::new("testnets");
const COMPLETIONS: Table = TableDefinition::new("completions");
const CLAIMS: Table = TableDefinition::new("claims");

/// Secondary unique index: wallet address -> wallet index
pub(crate) const WALLET_ADDRESSES: TableDefinition<&str, u64> =
    TableDefinition::new("wallet_addresses");

/// Keyed collections held by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Wallets,
    Jobs,
    Completions,
    Claims,
}

impl Collection {
    pub const ALL: [Collection; 4] = [
        Collection::Wallets,
        Collection::Jobs,
        Collection::Completions,
        Collection::Claims,
    ];

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "wallets" => Some(Self::Wallets),
            "jobs" | "testnets" => Some(Self::Jobs),
            "completions" | "completed" => Some(Self::Completions),
            "claims" => Some(Self::Claims),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Wallets => "wallets",
            Self::Jobs => "testnets",
            Self::Completions => "completions",
            Self::Claims => "claims",
        }
    }

    pub(crate) fn table(&self) -> Table {
        match self {
            Self::Wallets => WALLETS,
            Self::Jobs => TESTNETS,
            Self::Completions => COMPLETIONS,
            Self::Claims => CLAIMS,
        }
    }
}

/// How a record relates to the wallet address index.
pub enum AddressLink<'a> {
    None,
    /// Record owns the address (wallets); must be unique
    Owns(&'a str),
    /// Record points at an existing wallet (completions)
    References(&'a str),
}

/// A value storable in one of the collections.
///
/// Keys are byte strings whose lexicographic order equals primary-key order,
/// so a table scan is already sorted for paging.
pub trait Record: Serialize + DeserializeOwned {
    const COLLECTION: Collection;

    fn key(&self) -> Vec<u8>;

    fn address_link(&self) -> AddressLink<'_> {
        AddressLink::None
    }
}

/// Records keyed by a store-assigned, increasing id.
pub trait AutoIncrement: Record {
    fn set_id(&mut self, id: u64);
}

pub(crate) fn numeric_key(n: u64) -> Vec<u8> {
    n.to_be_bytes().to_vec()
}

pub(crate) fn decode_numeric_key(bytes: &[u8]) -> Option<u64> {
    let arr: [u8; 8] = bytes.try_into().ok()?;
    Some(u64::from_be_bytes(arr))
}

impl Record for Wallet {
    const COLLECTION: Collection = Collection::Wallets;

    fn key(&self) -> Vec<u8> {
        numeric_key(self.index)
    }

    fn address_link(&self) -> AddressLink<'_> {
        AddressLink::Owns(&self.address)
    }
}

impl Record for TestnetJob {
    const COLLECTION: Collection = Collection::Jobs;

    fn key(&self) -> Vec<u8> {
        self.id.as_bytes().to_vec()
    }
}

impl Record for CompletionRecord {
    const COLLECTION: Collection = Collection::Completions;

    fn key(&self) -> Vec<u8> {
        numeric_key(self.id)
    }

    fn address_link(&self) -> AddressLink<'_> {
        AddressLink::References(&self.wallet_address)
    }
}

impl AutoIncrement for CompletionRecord {
    fn set_id(&mut self, id: u64) {
        self.id = id;
    }
}

impl Record for ClaimRecord {
    const COLLECTION: Collection = Collection::Claims;

    fn key(&self) -> Vec<u8> {
        numeric_key(self.id)
    }
}

impl AutoIncrement for ClaimRecord {
    fn set_id(&mut self, id: u64) {
        self.id = id;
    }
}

/// Record counts per collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbStats {
    pub wallets: u64,
    pub jobs: u64,
    pub completions: u64,
    pub claims: u64,
    pub max_wallet_index: u64,
}

/// All errors surfaced by [`super::BotDb`].
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// redb failure (open, transaction, table, commit).
    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("record serialization error: {0}")]
    Serialization(String),

    /// Another wallet already owns this address.
    #[error("address {address} already belongs to wallet #{index}")]
    DuplicateAddress { address: String, index: u64 },

    /// Completion referencing an address that is not a stored wallet.
    #[error("no wallet with address {0}")]
    UnknownWallet(String),
}
