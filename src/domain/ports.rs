use async_trait::async_trait;

use crate::domain::account::{Account, AccountId, PhoneNumber};
use crate::domain::transaction::{Transaction, TransactionCode};
use crate::error::Result;

/// Durable home of accounts and the transaction log.
///
/// Reads outside an atomic unit are point-in-time snapshots; every balance
/// mutation goes through [`LedgerStore::begin`] so that the engine re-reads
/// and writes under the unit's isolation.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Registers a new account (provisioning; the engine never calls this).
    /// Fails if the phone number is already registered.
    async fn insert_account(&self, account: Account) -> Result<()>;

    async fn find_account(&self, id: &AccountId) -> Result<Option<Account>>;

    async fn find_account_by_phone(&self, phone: &PhoneNumber) -> Result<Option<Account>>;

    /// The most recent `limit` transactions where the account is sender or
    /// receiver, newest first.
    async fn history(&self, id: &AccountId, limit: usize) -> Result<Vec<Transaction>>;

    /// Opens an atomic unit over the given accounts. Implementations
    /// deduplicate the ids and acquire per-account exclusivity in ascending
    /// id order, so opposing two-account operations cannot deadlock.
    async fn begin(&self, ids: &[AccountId]) -> Result<AtomicUnitBox>;
}

/// A scoped transactional boundary around the store.
///
/// Holds exclusivity over the accounts it was opened for until it is
/// committed or dropped. Dropping without a successful commit aborts: no
/// observer ever sees a partial application.
#[async_trait]
pub trait AtomicUnit: Send {
    /// Reads an account's state as of the start of the unit. The account
    /// must be one the unit was opened for.
    fn account(&self, id: &AccountId) -> Result<Account>;

    /// Atomically applies the updated accounts and appends the transaction
    /// record. Rejects a record whose code already exists in the log with
    /// `DuplicateCode`, leaving all state untouched so the caller can retry
    /// with a fresh code.
    async fn commit(&mut self, accounts: Vec<Account>, record: Transaction) -> Result<()>;
}

/// Produces candidate transaction codes. Uniqueness is the engine's job,
/// enforced at commit; the generator only promises uniform sampling.
pub trait CodeGenerator: Send + Sync {
    fn generate(&self) -> TransactionCode;
}

pub type LedgerStoreBox = Box<dyn LedgerStore>;
pub type AtomicUnitBox = Box<dyn AtomicUnit>;
pub type CodeGeneratorBox = Box<dyn CodeGenerator>;
