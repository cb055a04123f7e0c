//! Durable account store backed by RocksDB
//!
//! # Column Families
//!
//! - `accounts` - Versioned account state (key: account id)
//! - `events` - Append-only balance-change log (key: big-endian sequence)
//!
//! A commit writes the batch's account values and its events in a single
//! `WriteBatch`, so the store never exposes a state where balances moved but
//! the corresponding events are missing. The version check and the write are
//! serialized on a commit mutex; reads go straight to the database.

use crate::error::{Error, Result};
use crate::store::{AccountStore, CommitBatch};
use crate::types::{Account, AccountId, BalanceChangeEvent, Versioned};
use crate::Config;
use parking_lot::Mutex;
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, DBCompactionStyle, Direction, IteratorMode, Options,
    WriteBatch, DB,
};
use std::sync::Arc;

const CF_ACCOUNTS: &str = "accounts";
const CF_EVENTS: &str = "events";

/// RocksDB-backed account store
pub struct RocksStore {
    db: Arc<DB>,
    commit_lock: Mutex<()>,
}

impl RocksStore {
    /// Open or create the database under the configured data directory
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);

        // Universal compaction for the append-heavy event log
        db_opts.set_compaction_style(DBCompactionStyle::Universal);

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_ACCOUNTS, Self::cf_options_accounts()),
            ColumnFamilyDescriptor::new(CF_EVENTS, Self::cf_options_events()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!(path = %path.display(), "Opened RocksDB account store");

        Ok(Self {
            db: Arc::new(db),
            commit_lock: Mutex::new(()),
        })
    }

    fn cf_options_accounts() -> Options {
        let mut opts = Options::default();
        // Account state is frequently read, use LZ4 for speed
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_options_events() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts.set_bottommost_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    fn read_versioned(&self, id: &AccountId) -> Result<Option<Versioned<Account>>> {
        let cf = self.cf_handle(CF_ACCOUNTS)?;
        match self.db.get_cf(cf, id.as_str().as_bytes())? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    /// Load persisted events with sequence greater than `after`
    ///
    /// Used to rebuild the in-memory event log on open; keys are big-endian
    /// sequence numbers, so iteration order is commit order.
    pub fn load_events(&self, after: u64) -> Result<Vec<BalanceChangeEvent>> {
        let cf = self.cf_handle(CF_EVENTS)?;
        let start = (after + 1).to_be_bytes();

        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(&start, Direction::Forward));

        let mut events = Vec::new();
        for item in iter {
            let (_, value) = item?;
            let event: BalanceChangeEvent = bincode::deserialize(&value)?;
            events.push(event);
        }

        Ok(events)
    }

    /// Highest persisted event sequence, if any
    pub fn latest_sequence(&self) -> Result<Option<u64>> {
        let cf = self.cf_handle(CF_EVENTS)?;

        let mut iter = self.db.iterator_cf(cf, IteratorMode::End);
        if let Some(item) = iter.next() {
            let (_, value) = item?;
            let event: BalanceChangeEvent = bincode::deserialize(&value)?;
            return Ok(Some(event.sequence));
        }

        Ok(None)
    }
}

impl AccountStore for RocksStore {
    fn get(&self, id: &AccountId) -> Result<Versioned<Account>> {
        self.read_versioned(id)?
            .ok_or_else(|| Error::AccountNotFound(id.clone()))
    }

    fn insert(&self, account: Account) -> Result<()> {
        let _guard = self.commit_lock.lock();

        if self.read_versioned(&account.id)?.is_some() {
            return Err(Error::Validation(format!(
                "account {} already exists",
                account.id
            )));
        }

        let cf = self.cf_handle(CF_ACCOUNTS)?;
        let key = account.id.as_str().as_bytes().to_vec();
        let value = bincode::serialize(&Versioned::new(account, 0u64))?;
        self.db.put_cf(cf, key, value)?;

        Ok(())
    }

    fn commit(&self, batch: &CommitBatch) -> Result<()> {
        let _guard = self.commit_lock.lock();

        // Verify every version before staging the write
        for write in &batch.writes {
            let current = self
                .read_versioned(&write.account.id)?
                .ok_or_else(|| Error::AccountNotFound(write.account.id.clone()))?;

            if current.version != write.expected_version {
                return Err(Error::Conflict {
                    account: write.account.id.clone(),
                    expected: write.expected_version,
                    found: current.version,
                });
            }
        }

        let cf_accounts = self.cf_handle(CF_ACCOUNTS)?;
        let cf_events = self.cf_handle(CF_EVENTS)?;

        let mut wb = WriteBatch::default();

        for write in &batch.writes {
            let key = write.account.id.as_str().as_bytes().to_vec();
            let value = bincode::serialize(&Versioned::new(
                write.account.clone(),
                write.expected_version + 1,
            ))?;
            wb.put_cf(cf_accounts, key, value);
        }

        for event in &batch.events {
            let key = event.sequence.to_be_bytes();
            let value = bincode::serialize(event)?;
            wb.put_cf(cf_events, key, value);
        }

        // Atomic commit
        self.db.write(wb)?;

        tracing::debug!(
            writes = batch.writes.len(),
            events = batch.events.len(),
            "Commit batch applied"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StagedWrite;
    use crate::types::PrincipalId;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn test_store() -> (RocksStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        (RocksStore::open(&config).unwrap(), temp_dir)
    }

    fn account(id: &str, balance: i64) -> Account {
        Account::new(
            AccountId::new(id),
            PrincipalId::new("alice@email.com"),
            Decimal::from(balance),
        )
    }

    fn event(sequence: u64, account: &str, old: i64, new: i64) -> BalanceChangeEvent {
        BalanceChangeEvent {
            event_id: Uuid::now_v7(),
            sequence,
            timestamp: Utc::now(),
            account: AccountId::new(account),
            old_balance: Decimal::from(old),
            new_balance: Decimal::from(new),
        }
    }

    #[test]
    fn test_insert_and_get_roundtrip() {
        let (store, _temp) = test_store();
        store.insert(account("1", 10)).unwrap();

        let snapshot = store.get(&AccountId::new("1")).unwrap();
        assert_eq!(snapshot.version, 0);
        assert_eq!(snapshot.value.balance, Decimal::from(10));
        assert_eq!(snapshot.value.owner, PrincipalId::new("alice@email.com"));
    }

    #[test]
    fn test_commit_persists_accounts_and_events() {
        let (store, _temp) = test_store();
        store.insert(account("1", 10)).unwrap();

        let snapshot = store.get(&AccountId::new("1")).unwrap();
        let mut updated = snapshot.value.clone();
        updated.balance = Decimal::ZERO;

        store
            .commit(&CommitBatch {
                writes: vec![StagedWrite {
                    account: updated,
                    expected_version: snapshot.version,
                }],
                events: vec![event(1, "1", 10, 0)],
            })
            .unwrap();

        let reread = store.get(&AccountId::new("1")).unwrap();
        assert_eq!(reread.version, 1);
        assert_eq!(reread.value.balance, Decimal::ZERO);

        let events = store.load_events(0).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].sequence, 1);
        assert_eq!(events[0].old_balance, Decimal::from(10));

        assert_eq!(store.latest_sequence().unwrap(), Some(1));
    }

    #[test]
    fn test_stale_commit_conflicts_without_side_effects() {
        let (store, _temp) = test_store();
        store.insert(account("1", 20)).unwrap();

        let snapshot = store.get(&AccountId::new("1")).unwrap();
        let mut updated = snapshot.value.clone();
        updated.balance = Decimal::from(10);

        let staged = StagedWrite {
            account: updated,
            expected_version: snapshot.version,
        };

        store
            .commit(&CommitBatch {
                writes: vec![staged.clone()],
                events: vec![event(1, "1", 20, 10)],
            })
            .unwrap();

        // Same expected version again: the version moved underneath
        let err = store
            .commit(&CommitBatch {
                writes: vec![staged],
                events: vec![event(2, "1", 20, 10)],
            })
            .unwrap_err();
        assert!(err.is_conflict());

        // Conflicted events were not persisted
        assert_eq!(store.load_events(0).unwrap().len(), 1);
        assert_eq!(store.get(&AccountId::new("1")).unwrap().version, 1);
    }

    #[test]
    fn test_events_survive_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();

        {
            let store = RocksStore::open(&config).unwrap();
            store.insert(account("1", 10)).unwrap();

            let snapshot = store.get(&AccountId::new("1")).unwrap();
            let mut updated = snapshot.value.clone();
            updated.balance = Decimal::ZERO;

            store
                .commit(&CommitBatch {
                    writes: vec![StagedWrite {
                        account: updated,
                        expected_version: snapshot.version,
                    }],
                    events: vec![event(1, "1", 10, 0)],
                })
                .unwrap();
        }

        let reopened = RocksStore::open(&config).unwrap();
        let events = reopened.load_events(0).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].new_balance, Decimal::ZERO);

        let snapshot = reopened.get(&AccountId::new("1")).unwrap();
        assert_eq!(snapshot.version, 1);
    }

    #[test]
    fn test_load_events_from_checkpoint() {
        let (store, _temp) = test_store();
        store.insert(account("1", 100)).unwrap();

        for seq in 1..=3u64 {
            let snapshot = store.get(&AccountId::new("1")).unwrap();
            let mut updated = snapshot.value.clone();
            updated.balance -= Decimal::from(10);

            store
                .commit(&CommitBatch {
                    writes: vec![StagedWrite {
                        account: updated,
                        expected_version: snapshot.version,
                    }],
                    events: vec![event(seq, "1", 0, 0)],
                })
                .unwrap();
        }

        let tail = store.load_events(1).unwrap();
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].sequence, 2);
        assert_eq!(tail[1].sequence, 3);
    }
}
