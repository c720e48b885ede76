use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

use crate::domain::account::{Account, PhoneNumber};
use crate::error::Result;

/// One row of a seed file: `phone,full_name,balance`.
#[derive(Debug, Deserialize)]
struct AccountRecord {
    phone: String,
    full_name: String,
    balance: Decimal,
}

/// Reads accounts to provision from a CSV source.
///
/// Wraps `csv::Reader` with whitespace trimming and flexible record lengths,
/// yielding `Result<Account>` lazily so large seed files stream.
pub struct AccountReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> AccountReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    pub fn accounts(self) -> impl Iterator<Item = Result<Account>> {
        self.reader.into_deserialize().map(|row| {
            let record: AccountRecord = row?;
            let phone = PhoneNumber::new(record.phone)?;
            Account::with_balance(phone, record.full_name, record.balance)
        })
    }
}
