use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::account::{AccountId, Amount};
use crate::error::{LedgerError, Result};

/// Length of a transaction code.
pub const CODE_LEN: usize = 12;
/// Alphabet a transaction code is drawn from.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// The unique, human-referenceable identifier of one ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TransactionCode(String);

impl TransactionCode {
    pub fn new(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        if raw.len() != CODE_LEN || !raw.bytes().all(|b| CODE_ALPHABET.contains(&b)) {
            return Err(LedgerError::InvalidCode(raw));
        }
        Ok(Self(raw))
    }

    /// For generators that sample from [`CODE_ALPHABET`] directly.
    pub(crate) fn new_unchecked(raw: String) -> Self {
        debug_assert_eq!(raw.len(), CODE_LEN);
        Self(raw)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TransactionCode {
    type Error = LedgerError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<TransactionCode> for String {
    fn from(code: TransactionCode) -> Self {
        code.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionKind {
    Send,
    Deposit,
    Withdraw,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Send => "SEND",
            Self::Deposit => "DEPOSIT",
            Self::Withdraw => "WITHDRAW",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// One immutable money movement.
///
/// SEND carries both parties, DEPOSIT has no sender, WITHDRAW has no
/// receiver; the constructors below are the only way to build one, so the
/// shape always matches the kind. The core completes movements synchronously,
/// so records are created already `Completed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub code: TransactionCode,
    pub sender: Option<AccountId>,
    pub receiver: Option<AccountId>,
    pub amount: Amount,
    pub kind: TransactionKind,
    pub status: TransactionStatus,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    pub fn send(
        code: TransactionCode,
        sender: AccountId,
        receiver: AccountId,
        amount: Amount,
        description: impl Into<String>,
    ) -> Result<Self> {
        if sender == receiver {
            return Err(LedgerError::SelfTransfer);
        }
        Ok(Self::completed(
            code,
            Some(sender),
            Some(receiver),
            amount,
            TransactionKind::Send,
            description,
        ))
    }

    pub fn deposit(
        code: TransactionCode,
        receiver: AccountId,
        amount: Amount,
        description: impl Into<String>,
    ) -> Self {
        Self::completed(
            code,
            None,
            Some(receiver),
            amount,
            TransactionKind::Deposit,
            description,
        )
    }

    pub fn withdraw(
        code: TransactionCode,
        sender: AccountId,
        amount: Amount,
        description: impl Into<String>,
    ) -> Self {
        Self::completed(
            code,
            Some(sender),
            None,
            amount,
            TransactionKind::Withdraw,
            description,
        )
    }

    fn completed(
        code: TransactionCode,
        sender: Option<AccountId>,
        receiver: Option<AccountId>,
        amount: Amount,
        kind: TransactionKind,
        description: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            code,
            sender,
            receiver,
            amount,
            kind,
            status: TransactionStatus::Completed,
            description: description.into(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the account appears on either side of the movement.
    pub fn involves(&self, id: &AccountId) -> bool {
        self.sender.as_ref() == Some(id) || self.receiver.as_ref() == Some(id)
    }
}
