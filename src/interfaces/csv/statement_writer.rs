use std::io::Write;

use crate::domain::transaction::Transaction;
use crate::error::Result;

/// Writes transaction history as CSV, one row per movement.
pub struct StatementWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> StatementWriter<W> {
    pub fn new(destination: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(destination),
        }
    }

    pub fn write_transactions(&mut self, transactions: &[Transaction]) -> Result<()> {
        self.writer.write_record([
            "code",
            "kind",
            "status",
            "sender",
            "receiver",
            "amount",
            "description",
            "created_at",
        ])?;
        for tx in transactions {
            let sender = tx.sender.map(|id| id.to_string()).unwrap_or_default();
            let receiver = tx.receiver.map(|id| id.to_string()).unwrap_or_default();
            let kind = tx.kind.to_string();
            let status = tx.status.to_string();
            let amount = tx.amount.to_string();
            let created_at = tx.created_at.to_rfc3339();
            self.writer.write_record([
                tx.code.as_str(),
                kind.as_str(),
                status.as_str(),
                sender.as_str(),
                receiver.as_str(),
                amount.as_str(),
                tx.description.as_str(),
                created_at.as_str(),
            ])?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
