use async_trait::async_trait;
use rocksdb::{ColumnFamilyDescriptor, DB, Options, WriteBatch};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::account::{Account, AccountId, PhoneNumber};
use crate::domain::ports::{AtomicUnit, AtomicUnitBox, LedgerStore};
use crate::domain::transaction::Transaction;
use crate::error::{LedgerError, Result};

/// Column family for account states, keyed by account id.
pub const CF_ACCOUNTS: &str = "accounts";
/// Column family for the transaction log, keyed by big-endian commit
/// sequence number so iteration order is commit order.
pub const CF_TRANSACTIONS: &str = "transactions";
/// Column family mapping phone number to account id.
pub const CF_PHONE_INDEX: &str = "phone_index";
/// Column family mapping transaction code to its log key, used for the
/// uniqueness check at commit.
pub const CF_CODE_INDEX: &str = "code_index";

/// A persistent ledger store on RocksDB.
///
/// Values are JSON; a commit is one `WriteBatch`, so balance updates and the
/// log append land together or not at all. Isolation between atomic units
/// uses the same in-process per-account lock table as the in-memory store;
/// the store assumes a single process owns the database.
#[derive(Clone)]
pub struct RocksDbLedger {
    db: Arc<DB>,
    locks: Arc<Mutex<HashMap<AccountId, Arc<Mutex<()>>>>>,
    next_seq: Arc<AtomicU64>,
}

impl RocksDbLedger {
    /// Opens or creates the database, ensuring all column families exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cfs = vec![
            ColumnFamilyDescriptor::new(CF_ACCOUNTS, Options::default()),
            ColumnFamilyDescriptor::new(CF_TRANSACTIONS, Options::default()),
            ColumnFamilyDescriptor::new(CF_PHONE_INDEX, Options::default()),
            ColumnFamilyDescriptor::new(CF_CODE_INDEX, Options::default()),
        ];
        let db = DB::open_cf_descriptors(&opts, path, cfs)?;

        // Resume the commit sequence after the highest key already logged.
        let cf = db.cf_handle(CF_TRANSACTIONS).ok_or_else(|| {
            LedgerError::StoreUnavailable(format!("column family {CF_TRANSACTIONS} missing"))
        })?;
        let next_seq = match db.iterator_cf(cf, rocksdb::IteratorMode::End).next() {
            Some(item) => {
                let (key, _) = item?;
                decode_seq(&key)? + 1
            }
            None => 0,
        };

        Ok(Self {
            db: Arc::new(db),
            locks: Arc::default(),
            next_seq: Arc::new(AtomicU64::new(next_seq)),
        })
    }

    fn cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| LedgerError::StoreUnavailable(format!("column family {name} missing")))
    }

    fn get_account(&self, id: &AccountId) -> Result<Option<Account>> {
        let cf = self.cf(CF_ACCOUNTS)?;
        match self.db.get_cf(cf, id.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

fn decode_seq(key: &[u8]) -> Result<u64> {
    let bytes: [u8; 8] = key
        .try_into()
        .map_err(|_| LedgerError::StoreUnavailable("corrupt transaction log key".to_string()))?;
    Ok(u64::from_be_bytes(bytes))
}

#[async_trait]
impl LedgerStore for RocksDbLedger {
    async fn insert_account(&self, account: Account) -> Result<()> {
        let phones = self.cf(CF_PHONE_INDEX)?;
        if self
            .db
            .get_pinned_cf(phones, account.phone_number.as_str().as_bytes())?
            .is_some()
        {
            return Err(LedgerError::PhoneAlreadyRegistered(
                account.phone_number.to_string(),
            ));
        }

        let accounts = self.cf(CF_ACCOUNTS)?;
        let mut batch = WriteBatch::default();
        batch.put_cf(
            phones,
            account.phone_number.as_str().as_bytes(),
            account.id.as_bytes(),
        );
        batch.put_cf(accounts, account.id.as_bytes(), serde_json::to_vec(&account)?);
        self.db.write(batch)?;
        Ok(())
    }

    async fn find_account(&self, id: &AccountId) -> Result<Option<Account>> {
        self.get_account(id)
    }

    async fn find_account_by_phone(&self, phone: &PhoneNumber) -> Result<Option<Account>> {
        let phones = self.cf(CF_PHONE_INDEX)?;
        match self.db.get_cf(phones, phone.as_str().as_bytes())? {
            Some(bytes) => {
                let id = AccountId::from_slice(&bytes).map_err(|e| {
                    LedgerError::StoreUnavailable(format!("corrupt phone index entry: {e}"))
                })?;
                self.get_account(&id)
            }
            None => Ok(None),
        }
    }

    async fn history(&self, id: &AccountId, limit: usize) -> Result<Vec<Transaction>> {
        let cf = self.cf(CF_TRANSACTIONS)?;
        // Keys are commit sequence numbers, so walking backwards yields
        // newest-committed first, same rule as the in-memory store.
        let mut involved = Vec::new();
        for item in self.db.iterator_cf(cf, rocksdb::IteratorMode::End) {
            if involved.len() == limit {
                break;
            }
            let (_key, value) = item?;
            let tx: Transaction = serde_json::from_slice(&value)?;
            if tx.involves(id) {
                involved.push(tx);
            }
        }
        Ok(involved)
    }

    async fn begin(&self, ids: &[AccountId]) -> Result<AtomicUnitBox> {
        let mut ids = ids.to_vec();
        ids.sort_unstable();
        ids.dedup();

        // Ids without an account get no lock entry; there is no state to
        // guard and the table must not grow with every unknown id probed.
        let mut known = Vec::with_capacity(ids.len());
        for id in ids {
            if self.get_account(&id)?.is_some() {
                known.push(id);
            }
        }
        let ids = known;

        let mut guards = Vec::with_capacity(ids.len());
        for id in &ids {
            let lock = {
                let mut table = self.locks.lock().await;
                Arc::clone(table.entry(*id).or_default())
            };
            guards.push(lock.lock_owned().await);
        }

        let mut snapshot = HashMap::with_capacity(ids.len());
        for id in &ids {
            if let Some(account) = self.get_account(id)? {
                snapshot.insert(account.id, account);
            }
        }

        Ok(Box::new(RocksDbUnit {
            snapshot,
            store: self.clone(),
            _guards: guards,
            committed: false,
        }))
    }
}

struct RocksDbUnit {
    snapshot: HashMap<AccountId, Account>,
    store: RocksDbLedger,
    _guards: Vec<OwnedMutexGuard<()>>,
    committed: bool,
}

#[async_trait]
impl AtomicUnit for RocksDbUnit {
    fn account(&self, id: &AccountId) -> Result<Account> {
        self.snapshot
            .get(id)
            .cloned()
            .ok_or(LedgerError::AccountNotFound(*id))
    }

    async fn commit(&mut self, accounts: Vec<Account>, record: Transaction) -> Result<()> {
        if self.committed {
            return Err(LedgerError::StoreUnavailable(
                "atomic unit already committed".to_string(),
            ));
        }
        if accounts.iter().any(|a| !self.snapshot.contains_key(&a.id)) {
            return Err(LedgerError::StoreUnavailable(
                "account not covered by this unit".to_string(),
            ));
        }

        let codes = self.store.cf(CF_CODE_INDEX)?;
        if self
            .store
            .db
            .get_pinned_cf(codes, record.code.as_str().as_bytes())?
            .is_some()
        {
            return Err(LedgerError::DuplicateCode(record.code.to_string()));
        }

        let transactions = self.store.cf(CF_TRANSACTIONS)?;
        let cf_accounts = self.store.cf(CF_ACCOUNTS)?;
        let seq = self.store.next_seq.fetch_add(1, Ordering::SeqCst);
        let mut batch = WriteBatch::default();
        for account in &accounts {
            batch.put_cf(cf_accounts, account.id.as_bytes(), serde_json::to_vec(account)?);
        }
        batch.put_cf(
            transactions,
            seq.to_be_bytes(),
            serde_json::to_vec(&record)?,
        );
        batch.put_cf(
            codes,
            record.code.as_str().as_bytes(),
            seq.to_be_bytes(),
        );
        self.store.db.write(batch)?;
        self.committed = true;
        Ok(())
    }
}
