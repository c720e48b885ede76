use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::account::AccountId;

pub type Result<T> = std::result::Result<T, LedgerError>;

/// Every failure the ledger core can surface. Validation errors are detected
/// before any mutation and are safe to retry after correcting the input;
/// `StoreUnavailable` is the only transient kind.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("deposit of {amount} exceeds the {limit} ceiling")]
    AmountExceedsLimit { amount: Decimal, limit: Decimal },
    #[error("insufficient funds")]
    InsufficientFunds,
    #[error("balance would exceed the supported precision")]
    BalanceOverflow,
    #[error("cannot send money to yourself")]
    SelfTransfer,
    #[error("account {0} not found")]
    AccountNotFound(AccountId),
    #[error("receiver {0} not found")]
    ReceiverNotFound(String),
    #[error("invalid phone number: {0:?}")]
    InvalidPhone(String),
    #[error("phone number {0} is already registered")]
    PhoneAlreadyRegistered(String),
    #[error("malformed transaction code: {0:?}")]
    InvalidCode(String),
    #[error("transaction code {0} already exists")]
    DuplicateCode(String),
    #[error("could not generate a unique transaction code after {0} attempts")]
    CodeGenerationExhausted(u32),
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("storage error: {0}")]
    Storage(#[from] rocksdb::Error),
}
