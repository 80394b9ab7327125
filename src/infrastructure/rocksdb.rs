use crate::domain::ledger::{LedgerMeta, LedgerState};
use crate::domain::transaction::{AccountId, TransactionRecord, TxId};
use crate::error::{LedgerError, Result};
use rocksdb::{ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

/// Column Family for transaction records, keyed by hex transaction id.
pub const CF_RECORDS: &str = "records";
/// Column Family for spare balances, keyed by owner identity.
pub const CF_BALANCES: &str = "balances";
/// Column Family for the remaining state (indexes, pools, counters, events).
pub const CF_META: &str = "meta";

const META_KEY: &[u8] = b"ledger_meta";

/// Persistent snapshot store for the ledger state, backed by RocksDB.
///
/// The replay binary loads the previous snapshot before a run and saves the
/// final state after it, in a single atomic `WriteBatch`. Records and spare
/// balances are stored per-entry as serde_json values; because records are
/// never deleted and owners never disappear, overwriting is sufficient and
/// no tombstones are needed.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct SnapshotStore {
    db: Arc<DB>,
}

impl SnapshotStore {
    /// Opens or creates a RocksDB instance at the specified path, ensuring
    /// the required column families exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cfs = vec![
            ColumnFamilyDescriptor::new(CF_RECORDS, Options::default()),
            ColumnFamilyDescriptor::new(CF_BALANCES, Options::default()),
            ColumnFamilyDescriptor::new(CF_META, Options::default()),
        ];
        let db = DB::open_cf_descriptors(&opts, path, cfs)?;

        Ok(Self { db: Arc::new(db) })
    }

    fn cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            LedgerError::Io(std::io::Error::other(format!(
                "{name} column family not found"
            )))
        })
    }

    /// Loads the persisted state, or `None` if this database has never been
    /// written to.
    pub fn load(&self) -> Result<Option<LedgerState>> {
        let meta_cf = self.cf(CF_META)?;
        let Some(meta_bytes) = self.db.get_cf(meta_cf, META_KEY)? else {
            return Ok(None);
        };
        let meta: LedgerMeta = serde_json::from_slice(&meta_bytes)?;

        let mut records = BTreeMap::new();
        for item in self.db.iterator_cf(self.cf(CF_RECORDS)?, IteratorMode::Start) {
            let (key, value) = item?;
            let id = TxId::from_str(&String::from_utf8_lossy(&key)).map_err(|e| {
                LedgerError::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("malformed record key: {e}"),
                ))
            })?;
            let record: TransactionRecord = serde_json::from_slice(&value)?;
            records.insert(id, record);
        }

        let mut balances = BTreeMap::new();
        for item in self.db.iterator_cf(self.cf(CF_BALANCES)?, IteratorMode::Start) {
            let (key, value) = item?;
            let owner: AccountId = String::from_utf8_lossy(&key).into_owned();
            let balance: u64 = serde_json::from_slice(&value)?;
            balances.insert(owner, balance);
        }

        Ok(Some(LedgerState::from_parts(records, balances, meta)))
    }

    /// Persists the full state in one atomic batch.
    pub fn save(&self, state: &LedgerState) -> Result<()> {
        let mut batch = WriteBatch::default();

        let records_cf = self.cf(CF_RECORDS)?;
        for (id, record) in state.records() {
            batch.put_cf(records_cf, id.to_string(), serde_json::to_vec(record)?);
        }

        let balances_cf = self.cf(CF_BALANCES)?;
        for (owner, balance) in state.spare_balances() {
            batch.put_cf(balances_cf, owner, serde_json::to_vec(balance)?);
        }

        batch.put_cf(self.cf(CF_META)?, META_KEY, serde_json::to_vec(&state.meta())?);

        self.db.write(batch)?;
        Ok(())
    }
}
