use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{LedgerError, Result};

pub type AccountId = Uuid;

/// Maximum total digits of any monetary value.
pub const MONEY_MAX_DIGITS: u32 = 12;
/// Maximum fractional digits of any monetary value.
pub const MONEY_SCALE: u32 = 2;

// 12 total digits with 2 fractional leaves 10 integral digits.
fn integral_limit() -> Decimal {
    Decimal::from(10u64.pow(MONEY_MAX_DIGITS - MONEY_SCALE))
}

/// A phone-shaped account handle: an optional leading `+`, an optional `1`
/// country prefix, then 9 to 15 digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PhoneNumber(String);

impl PhoneNumber {
    pub fn new(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        let digits = raw.strip_prefix('+').unwrap_or(&raw);
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(LedgerError::InvalidPhone(raw));
        }
        let len = digits.len();
        let valid = (9..=15).contains(&len) || (digits.starts_with('1') && len == 16);
        if !valid {
            return Err(LedgerError::InvalidPhone(raw));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for PhoneNumber {
    type Error = LedgerError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<PhoneNumber> for String {
    fn from(phone: PhoneNumber) -> Self {
        phone.0
    }
}

/// A strictly positive monetary amount within the ledger's precision:
/// at most 12 total digits, at most 2 fractional.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self> {
        if value <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount(
                "amount must be positive".to_string(),
            ));
        }
        if value.normalize().scale() > MONEY_SCALE {
            return Err(LedgerError::InvalidAmount(format!(
                "at most {MONEY_SCALE} decimal places allowed"
            )));
        }
        if value >= integral_limit() {
            return Err(LedgerError::InvalidAmount(format!(
                "at most {MONEY_MAX_DIGITS} total digits allowed"
            )));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = LedgerError;

    fn try_from(value: Decimal) -> Result<Self> {
        Self::new(value)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A non-negative account balance, same precision as [`Amount`].
///
/// Only the ledger engine mutates balances, via [`Account::credit`] and
/// [`Account::debit`].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(try_from = "Decimal")]
pub struct Balance(Decimal);

impl Balance {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(value: Decimal) -> Result<Self> {
        if value < Decimal::ZERO {
            return Err(LedgerError::InvalidAmount(
                "balance cannot be negative".to_string(),
            ));
        }
        if value.normalize().scale() > MONEY_SCALE {
            return Err(LedgerError::InvalidAmount(format!(
                "at most {MONEY_SCALE} decimal places allowed"
            )));
        }
        if value >= integral_limit() {
            return Err(LedgerError::InvalidAmount(format!(
                "at most {MONEY_MAX_DIGITS} total digits allowed"
            )));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Balance {
    type Error = LedgerError;

    fn try_from(value: Decimal) -> Result<Self> {
        Self::new(value)
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The state of one mobile-money account.
///
/// Accounts are created once at onboarding and soft-deactivated, never
/// deleted. The financial fields are owned by the ledger engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub phone_number: PhoneNumber,
    pub full_name: String,
    pub balance: Balance,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn new(phone_number: PhoneNumber, full_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            phone_number,
            full_name: full_name.into(),
            balance: Balance::ZERO,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Creates an account with an opening balance (seeding and tests).
    pub fn with_balance(
        phone_number: PhoneNumber,
        full_name: impl Into<String>,
        balance: Decimal,
    ) -> Result<Self> {
        let mut account = Self::new(phone_number, full_name);
        account.balance = Balance::new(balance)?;
        Ok(account)
    }

    /// Adds `amount` to the balance, refusing to exceed the supported
    /// precision.
    pub fn credit(&mut self, amount: Amount) -> Result<()> {
        let next = self.balance.0 + amount.0;
        if next >= integral_limit() {
            return Err(LedgerError::BalanceOverflow);
        }
        self.balance = Balance(next);
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Removes `amount` from the balance, refusing to go below zero.
    pub fn debit(&mut self, amount: Amount) -> Result<()> {
        if self.balance.0 < amount.0 {
            return Err(LedgerError::InsufficientFunds);
        }
        self.balance = Balance(self.balance.0 - amount.0);
        self.updated_at = Utc::now();
        Ok(())
    }
}
