use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::domain::account::{Account, AccountId, PhoneNumber};
use crate::domain::ports::{AtomicUnit, AtomicUnitBox, LedgerStore};
use crate::domain::transaction::Transaction;
use crate::error::{LedgerError, Result};

/// A thread-safe in-memory ledger store.
///
/// Accounts and the transaction log live in `Arc<RwLock<..>>` maps shared by
/// clones. Exclusivity for atomic units comes from a per-account lock table:
/// [`LedgerStore::begin`] takes each involved account's mutex in ascending
/// id order, so two opposing transfers over the same pair serialize instead
/// of deadlocking.
#[derive(Default, Clone)]
pub struct InMemoryLedger {
    accounts: Arc<RwLock<HashMap<AccountId, Account>>>,
    phone_index: Arc<RwLock<HashMap<PhoneNumber, AccountId>>>,
    log: Arc<RwLock<Vec<Transaction>>>,
    locks: Arc<Mutex<HashMap<AccountId, Arc<Mutex<()>>>>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedger {
    async fn insert_account(&self, account: Account) -> Result<()> {
        let mut phones = self.phone_index.write().await;
        if phones.contains_key(&account.phone_number) {
            return Err(LedgerError::PhoneAlreadyRegistered(
                account.phone_number.to_string(),
            ));
        }
        phones.insert(account.phone_number.clone(), account.id);
        let mut accounts = self.accounts.write().await;
        accounts.insert(account.id, account);
        Ok(())
    }

    async fn find_account(&self, id: &AccountId) -> Result<Option<Account>> {
        let accounts = self.accounts.read().await;
        Ok(accounts.get(id).cloned())
    }

    async fn find_account_by_phone(&self, phone: &PhoneNumber) -> Result<Option<Account>> {
        let id = {
            let phones = self.phone_index.read().await;
            phones.get(phone).copied()
        };
        match id {
            Some(id) => self.find_account(&id).await,
            None => Ok(None),
        }
    }

    async fn history(&self, id: &AccountId, limit: usize) -> Result<Vec<Transaction>> {
        let log = self.log.read().await;
        Ok(log
            .iter()
            .rev()
            .filter(|tx| tx.involves(id))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn begin(&self, ids: &[AccountId]) -> Result<AtomicUnitBox> {
        let mut ids = ids.to_vec();
        ids.sort_unstable();
        ids.dedup();

        // Ids without an account get no lock entry; there is no state to
        // guard and the table must not grow with every unknown id probed.
        {
            let accounts = self.accounts.read().await;
            ids.retain(|id| accounts.contains_key(id));
        }

        // Fixed acquisition order; guards are held until the unit is dropped.
        let mut guards = Vec::with_capacity(ids.len());
        for id in &ids {
            let lock = {
                let mut table = self.locks.lock().await;
                Arc::clone(table.entry(*id).or_default())
            };
            guards.push(lock.lock_owned().await);
        }

        // Snapshot taken after the locks are held: these are the balances
        // the unit's mutations will be validated against.
        let snapshot = {
            let accounts = self.accounts.read().await;
            ids.iter()
                .filter_map(|id| accounts.get(id).cloned())
                .map(|account| (account.id, account))
                .collect()
        };

        Ok(Box::new(InMemoryUnit {
            snapshot,
            accounts: Arc::clone(&self.accounts),
            log: Arc::clone(&self.log),
            _guards: guards,
            committed: false,
        }))
    }
}

struct InMemoryUnit {
    snapshot: HashMap<AccountId, Account>,
    accounts: Arc<RwLock<HashMap<AccountId, Account>>>,
    log: Arc<RwLock<Vec<Transaction>>>,
    _guards: Vec<OwnedMutexGuard<()>>,
    committed: bool,
}

#[async_trait]
impl AtomicUnit for InMemoryUnit {
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

        // Both maps are written while this unit still holds the per-account
        // locks, and the duplicate check happens under the log write lock.
        let mut map = self.accounts.write().await;
        let mut log = self.log.write().await;
        if log.iter().any(|tx| tx.code == record.code) {
            return Err(LedgerError::DuplicateCode(record.code.to_string()));
        }
        for account in accounts {
            map.insert(account.id, account);
        }
        log.push(record);
        self.committed = true;
        Ok(())
    }
}
