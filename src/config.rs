use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Tunables of the ledger engine.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Largest single deposit the engine accepts.
    pub deposit_limit: Decimal,
    /// How many fresh codes the engine tries before giving up on a commit
    /// that keeps colliding.
    pub max_code_attempts: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            deposit_limit: dec!(300000),
            max_code_attempts: 5,
        }
    }
}
