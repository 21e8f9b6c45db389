//! Holding persistence over a document-style SQLite collection.
//!
//! One row per (owner, ticker) with the holding serialized as a JSON
//! document column. Upserts fully replace the document (last write
//! wins, no merge) and `clear` is a single atomic statement, so a
//! concurrent reader never observes a partially-cleared owner.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};

use rusqlite::{params, Connection};
use thiserror::Error;
use tracing::{info, warn};

use crate::holding::{decode_document, normalize_ticker, Holding, HoldingError};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS holdings (
    owner TEXT NOT NULL,
    ticker TEXT NOT NULL,
    document TEXT NOT NULL,
    last_updated_ts_utc INTEGER NOT NULL,
    PRIMARY KEY (owner, ticker)
)";

pub trait HoldingStore: std::fmt::Debug + Send + Sync + 'static {
    /// All holdings for the owner, normalized to the canonical shape.
    fn list(&self, owner: &str) -> Result<Vec<Holding>, StoreError>;
    /// Full-document replace for the holding's (owner, ticker) key.
    fn upsert(&self, holding: &Holding) -> Result<(), StoreError>;
    /// Idempotent; missing keys are not an error.
    fn delete(&self, owner: &str, ticker: &str) -> Result<(), StoreError>;
    /// Removes every holding for the owner in one atomic operation.
    fn clear(&self, owner: &str) -> Result<(), StoreError>;
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error(transparent)]
    Holding(#[from] HoldingError),
    #[error("holding document failed to serialize: {0}")]
    Encode(String),
}

/// Session-scoped persistence handle. A backend that cannot be opened
/// at startup disables the adapter for the whole session; dependent
/// surfaces fall back to an empty-state message.
#[derive(Clone)]
pub enum StoreHandle {
    Ready(Arc<dyn HoldingStore>),
    Disabled(String),
}

impl StoreHandle {
    pub fn ready<S: HoldingStore>(store: S) -> Self {
        Self::Ready(Arc::new(store))
    }

    pub fn get(&self) -> Result<&Arc<dyn HoldingStore>, StoreError> {
        match self {
            Self::Ready(store) => Ok(store),
            Self::Disabled(reason) => Err(StoreError::Unavailable(reason.clone())),
        }
    }
}

#[derive(Debug)]
pub struct SqliteHoldingStore {
    conn: Mutex<Connection>,
}

impl SqliteHoldingStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl HoldingStore for SqliteHoldingStore {
    fn list(&self, owner: &str) -> Result<Vec<Holding>, StoreError> {
        let conn = self
            .conn
            .lock()
            .expect("holdings connection lock should not be poisoned");
        let mut stmt = conn.prepare(
            "SELECT ticker, document, last_updated_ts_utc
             FROM holdings
             WHERE owner = ?1
             ORDER BY ticker ASC",
        )?;

        let mut rows = stmt.query(params![owner])?;
        let mut holdings = Vec::new();
        while let Some(row) = rows.next()? {
            let ticker: String = row.get(0)?;
            let document: String = row.get(1)?;
            let fallback_ts_utc: i64 = row.get(2)?;

            match decode_document(owner, fallback_ts_utc, &document) {
                Ok(holding) => holdings.push(holding),
                Err(err) => {
                    warn!(
                        component = "holding_store",
                        event = "store.list.document_skipped",
                        owner,
                        ticker = %ticker,
                        error = %err
                    );
                }
            }
        }

        Ok(holdings)
    }

    fn upsert(&self, holding: &Holding) -> Result<(), StoreError> {
        let document = serde_json::to_string(&holding.to_document())
            .map_err(|err| StoreError::Encode(err.to_string()))?;

        let conn = self
            .conn
            .lock()
            .expect("holdings connection lock should not be poisoned");
        conn.execute(
            "INSERT INTO holdings (owner, ticker, document, last_updated_ts_utc)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(owner, ticker) DO UPDATE SET
                 document = excluded.document,
                 last_updated_ts_utc = excluded.last_updated_ts_utc",
            params![
                holding.owner,
                holding.ticker,
                document,
                holding.last_updated_ts_utc
            ],
        )?;

        info!(
            component = "holding_store",
            event = "store.upsert",
            owner = %holding.owner,
            ticker = %holding.ticker
        );
        Ok(())
    }

    fn delete(&self, owner: &str, ticker: &str) -> Result<(), StoreError> {
        // Unnormalizable tickers cannot exist in the store.
        let Ok(ticker) = normalize_ticker(ticker) else {
            return Ok(());
        };

        let conn = self
            .conn
            .lock()
            .expect("holdings connection lock should not be poisoned");
        let removed = conn.execute(
            "DELETE FROM holdings WHERE owner = ?1 AND ticker = ?2",
            params![owner, ticker],
        )?;

        info!(
            component = "holding_store",
            event = "store.delete",
            owner,
            ticker = %ticker,
            removed
        );
        Ok(())
    }

    fn clear(&self, owner: &str) -> Result<(), StoreError> {
        let conn = self
            .conn
            .lock()
            .expect("holdings connection lock should not be poisoned");
        let removed = conn.execute("DELETE FROM holdings WHERE owner = ?1", params![owner])?;

        info!(
            component = "holding_store",
            event = "store.clear",
            owner,
            removed
        );
        Ok(())
    }
}

/// In-memory store used by tests and demo mode.
#[derive(Debug, Clone, Default)]
pub struct InMemoryHoldingStore {
    inner: Arc<RwLock<BTreeMap<(String, String), Holding>>>,
}

impl InMemoryHoldingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HoldingStore for InMemoryHoldingStore {
    fn list(&self, owner: &str) -> Result<Vec<Holding>, StoreError> {
        let guard = self
            .inner
            .read()
            .expect("in-memory holdings lock should not be poisoned");
        Ok(guard
            .values()
            .filter(|holding| holding.owner == owner)
            .cloned()
            .collect())
    }

    fn upsert(&self, holding: &Holding) -> Result<(), StoreError> {
        let mut guard = self
            .inner
            .write()
            .expect("in-memory holdings lock should not be poisoned");
        guard.insert(
            (holding.owner.clone(), holding.ticker.clone()),
            holding.clone(),
        );
        Ok(())
    }

    fn delete(&self, owner: &str, ticker: &str) -> Result<(), StoreError> {
        let Ok(ticker) = normalize_ticker(ticker) else {
            return Ok(());
        };

        let mut guard = self
            .inner
            .write()
            .expect("in-memory holdings lock should not be poisoned");
        guard.remove(&(owner.to_string(), ticker));
        Ok(())
    }

    fn clear(&self, owner: &str) -> Result<(), StoreError> {
        let mut guard = self
            .inner
            .write()
            .expect("in-memory holdings lock should not be poisoned");
        guard.retain(|(entry_owner, _), _| entry_owner != owner);
        Ok(())
    }
}
