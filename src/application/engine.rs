use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::LedgerConfig;
use crate::domain::account::{Account, AccountId, Amount, Balance, PhoneNumber};
use crate::domain::ports::{AtomicUnitBox, CodeGeneratorBox, LedgerStoreBox};
use crate::domain::transaction::{Transaction, TransactionCode};
use crate::error::{LedgerError, Result};

/// Outcome of a successful balance mutation: the created record plus the
/// caller's balance after commit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Receipt {
    pub transaction: Transaction,
    pub new_balance: Balance,
}

/// Read-only balance snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalanceView {
    pub phone_number: PhoneNumber,
    pub full_name: String,
    pub balance: Balance,
}

/// The transactional balance-mutation engine.
///
/// Owns the write path to account balances and the transaction log. Every
/// mutating operation follows one template: validate the input, open an
/// atomic unit over the involved accounts, re-read balances under that
/// unit's isolation, apply the deltas, and commit the updated accounts
/// together with a freshly coded transaction record. Any failure before
/// commit leaves the store exactly as it was.
pub struct LedgerEngine {
    store: LedgerStoreBox,
    codes: CodeGeneratorBox,
    config: LedgerConfig,
}

impl LedgerEngine {
    pub fn new(store: LedgerStoreBox, codes: CodeGeneratorBox, config: LedgerConfig) -> Self {
        Self {
            store,
            codes,
            config,
        }
    }

    /// Moves `amount` from the authenticated sender to the account behind
    /// `receiver_phone`.
    pub async fn transfer(
        &self,
        sender: AccountId,
        receiver_phone: &PhoneNumber,
        amount: Decimal,
        description: &str,
    ) -> Result<Receipt> {
        let amount = Amount::new(amount)?;

        let receiver = self
            .store
            .find_account_by_phone(receiver_phone)
            .await?
            .filter(|account| account.is_active)
            .ok_or_else(|| LedgerError::ReceiverNotFound(receiver_phone.to_string()))?;
        if receiver.id == sender {
            return Err(LedgerError::SelfTransfer);
        }

        let mut unit = self.store.begin(&[sender, receiver.id]).await?;
        let mut from = self.active_account(&unit, &sender)?;
        let mut to = unit
            .account(&receiver.id)
            .ok()
            .filter(|account| account.is_active)
            .ok_or_else(|| LedgerError::ReceiverNotFound(receiver_phone.to_string()))?;

        from.debit(amount)?;
        to.credit(amount)?;
        let new_balance = from.balance;

        let transaction = self
            .commit_with_code(&mut unit, vec![from, to], |code| {
                Transaction::send(code, sender, receiver.id, amount, description)
            })
            .await?;

        info!(code = %transaction.code, %amount, "transfer completed");
        Ok(Receipt {
            transaction,
            new_balance,
        })
    }

    /// Credits external funds to the account, up to the configured ceiling.
    pub async fn deposit(
        &self,
        account: AccountId,
        amount: Decimal,
        description: &str,
    ) -> Result<Receipt> {
        let amount = Amount::new(amount)?;
        if amount.value() > self.config.deposit_limit {
            return Err(LedgerError::AmountExceedsLimit {
                amount: amount.value(),
                limit: self.config.deposit_limit,
            });
        }

        let mut unit = self.store.begin(&[account]).await?;
        let mut target = self.active_account(&unit, &account)?;
        target.credit(amount)?;
        let new_balance = target.balance;

        let transaction = self
            .commit_with_code(&mut unit, vec![target], |code| {
                Ok(Transaction::deposit(code, account, amount, description))
            })
            .await?;

        info!(code = %transaction.code, %amount, "deposit completed");
        Ok(Receipt {
            transaction,
            new_balance,
        })
    }

    /// Debits external funds from the account.
    pub async fn withdraw(
        &self,
        account: AccountId,
        amount: Decimal,
        description: &str,
    ) -> Result<Receipt> {
        let amount = Amount::new(amount)?;

        let mut unit = self.store.begin(&[account]).await?;
        let mut target = self.active_account(&unit, &account)?;
        target.debit(amount)?;
        let new_balance = target.balance;

        let transaction = self
            .commit_with_code(&mut unit, vec![target], |code| {
                Ok(Transaction::withdraw(code, account, amount, description))
            })
            .await?;

        info!(code = %transaction.code, %amount, "withdrawal completed");
        Ok(Receipt {
            transaction,
            new_balance,
        })
    }

    /// Current balance, name and phone of the account. No side effects.
    pub async fn balance(&self, account: AccountId) -> Result<BalanceView> {
        let account = self.find_active(&account).await?;
        Ok(BalanceView {
            phone_number: account.phone_number,
            full_name: account.full_name,
            balance: account.balance,
        })
    }

    /// The account's most recent transactions, newest first.
    pub async fn history(&self, account: AccountId, limit: usize) -> Result<Vec<Transaction>> {
        let account = self.find_active(&account).await?;
        self.store.history(&account.id, limit).await
    }

    async fn find_active(&self, id: &AccountId) -> Result<Account> {
        self.store
            .find_account(id)
            .await?
            .filter(|account| account.is_active)
            .ok_or(LedgerError::AccountNotFound(*id))
    }

    fn active_account(&self, unit: &AtomicUnitBox, id: &AccountId) -> Result<Account> {
        let account = unit.account(id)?;
        if !account.is_active {
            return Err(LedgerError::AccountNotFound(*id));
        }
        Ok(account)
    }

    /// Commits with a freshly generated code, regenerating on collision up
    /// to the configured cap. The unit stays open across retries, so a
    /// collision costs one extra commit attempt and nothing else.
    async fn commit_with_code<F>(
        &self,
        unit: &mut AtomicUnitBox,
        accounts: Vec<Account>,
        build: F,
    ) -> Result<Transaction>
    where
        F: Fn(TransactionCode) -> Result<Transaction>,
    {
        for attempt in 1..=self.config.max_code_attempts {
            let record = build(self.codes.generate())?;
            match unit.commit(accounts.clone(), record.clone()).await {
                Ok(()) => return Ok(record),
                Err(LedgerError::DuplicateCode(code)) => {
                    debug!(%code, attempt, "transaction code collision, regenerating");
                }
                Err(other) => return Err(other),
            }
        }
        Err(LedgerError::CodeGenerationExhausted(
            self.config.max_code_attempts,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{CodeGenerator, LedgerStore};
    use crate::domain::transaction::{TransactionKind, TransactionStatus};
    use crate::infrastructure::codes::RandomCodeGenerator;
    use crate::infrastructure::in_memory::InMemoryLedger;
    use rust_decimal_macros::dec;

    /// Always emits the same code: every commit after the first collides.
    struct StuckCodeGenerator;

    impl CodeGenerator for StuckCodeGenerator {
        fn generate(&self) -> TransactionCode {
            TransactionCode::new("AAAABBBBCCCC").unwrap()
        }
    }

    /// Emits a scripted sequence of codes, then panics if drained.
    struct ScriptedCodeGenerator(std::sync::Mutex<Vec<&'static str>>);

    impl ScriptedCodeGenerator {
        fn new(codes: &[&'static str]) -> Self {
            let mut codes = codes.to_vec();
            codes.reverse();
            Self(std::sync::Mutex::new(codes))
        }
    }

    impl CodeGenerator for ScriptedCodeGenerator {
        fn generate(&self) -> TransactionCode {
            let code = self.0.lock().unwrap().pop().unwrap();
            TransactionCode::new(code).unwrap()
        }
    }

    fn phone(raw: &str) -> PhoneNumber {
        PhoneNumber::new(raw).unwrap()
    }

    async fn seeded_engine(balances: &[(&str, Decimal)]) -> (LedgerEngine, Vec<Account>) {
        let store = InMemoryLedger::new();
        let mut accounts = Vec::new();
        for (raw, balance) in balances {
            let account = Account::with_balance(phone(raw), "Test User", *balance).unwrap();
            store.insert_account(account.clone()).await.unwrap();
            accounts.push(account);
        }
        let engine = LedgerEngine::new(
            Box::new(store),
            Box::new(RandomCodeGenerator),
            LedgerConfig::default(),
        );
        (engine, accounts)
    }

    #[tokio::test]
    async fn test_transfer_moves_funds_and_records_send() {
        let (engine, accounts) = seeded_engine(&[
            ("+254712345678", dec!(1000.00)),
            ("+254723456789", dec!(500.00)),
        ])
        .await;
        let (a, b) = (&accounts[0], &accounts[1]);

        let receipt = engine
            .transfer(a.id, &b.phone_number, dec!(400.00), "rent")
            .await
            .unwrap();

        assert_eq!(receipt.new_balance.value(), dec!(600.00));
        assert_eq!(receipt.transaction.kind, TransactionKind::Send);
        assert_eq!(receipt.transaction.status, TransactionStatus::Completed);
        assert_eq!(receipt.transaction.amount.value(), dec!(400.00));
        assert_eq!(receipt.transaction.sender, Some(a.id));
        assert_eq!(receipt.transaction.receiver, Some(b.id));

        assert_eq!(engine.balance(a.id).await.unwrap().balance.value(), dec!(600.00));
        assert_eq!(engine.balance(b.id).await.unwrap().balance.value(), dec!(900.00));
    }

    #[tokio::test]
    async fn test_transfer_insufficient_funds_is_side_effect_free() {
        let (engine, accounts) = seeded_engine(&[
            ("+254712345678", dec!(100.00)),
            ("+254723456789", dec!(500.00)),
        ])
        .await;
        let (a, b) = (&accounts[0], &accounts[1]);

        let result = engine
            .transfer(a.id, &b.phone_number, dec!(100.01), "")
            .await;
        assert!(matches!(result, Err(LedgerError::InsufficientFunds)));

        assert_eq!(engine.balance(a.id).await.unwrap().balance.value(), dec!(100.00));
        assert_eq!(engine.balance(b.id).await.unwrap().balance.value(), dec!(500.00));
        assert!(engine.history(a.id, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transfer_to_self_fails_regardless_of_balance() {
        let (engine, accounts) = seeded_engine(&[("+254712345678", dec!(1000.00))]).await;
        let a = &accounts[0];

        let result = engine.transfer(a.id, &a.phone_number, dec!(1.00), "").await;
        assert!(matches!(result, Err(LedgerError::SelfTransfer)));
        assert!(engine.history(a.id, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transfer_to_unknown_phone() {
        let (engine, accounts) = seeded_engine(&[("+254712345678", dec!(1000.00))]).await;

        let result = engine
            .transfer(accounts[0].id, &phone("+254799999999"), dec!(1.00), "")
            .await;
        assert!(matches!(result, Err(LedgerError::ReceiverNotFound(_))));
    }

    #[tokio::test]
    async fn test_transfer_to_deactivated_receiver() {
        let store = InMemoryLedger::new();
        let sender =
            Account::with_balance(phone("+254712345678"), "Sender", dec!(100.00)).unwrap();
        let mut receiver =
            Account::with_balance(phone("+254723456789"), "Receiver", dec!(0)).unwrap();
        receiver.is_active = false;
        store.insert_account(sender.clone()).await.unwrap();
        store.insert_account(receiver.clone()).await.unwrap();

        let engine = LedgerEngine::new(
            Box::new(store),
            Box::new(RandomCodeGenerator),
            LedgerConfig::default(),
        );

        let result = engine
            .transfer(sender.id, &receiver.phone_number, dec!(10.00), "")
            .await;
        assert!(matches!(result, Err(LedgerError::ReceiverNotFound(_))));
    }

    #[tokio::test]
    async fn test_invalid_amounts_rejected_before_any_lookup() {
        let (engine, accounts) = seeded_engine(&[
            ("+254712345678", dec!(1000.00)),
            ("+254723456789", dec!(500.00)),
        ])
        .await;
        let (a, b) = (&accounts[0], &accounts[1]);

        for bad in [dec!(0), dec!(-10), dec!(1.999)] {
            assert!(matches!(
                engine.transfer(a.id, &b.phone_number, bad, "").await,
                Err(LedgerError::InvalidAmount(_))
            ));
            assert!(matches!(
                engine.deposit(a.id, bad, "").await,
                Err(LedgerError::InvalidAmount(_))
            ));
            assert!(matches!(
                engine.withdraw(a.id, bad, "").await,
                Err(LedgerError::InvalidAmount(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_deposit_and_ceiling() {
        let (engine, accounts) = seeded_engine(&[("+254712345678", dec!(0))]).await;
        let a = &accounts[0];

        let receipt = engine.deposit(a.id, dec!(300000), "agent float").await.unwrap();
        assert_eq!(receipt.new_balance.value(), dec!(300000));
        assert_eq!(receipt.transaction.kind, TransactionKind::Deposit);
        assert_eq!(receipt.transaction.sender, None);
        assert_eq!(receipt.transaction.receiver, Some(a.id));

        let result = engine.deposit(a.id, dec!(500000.00), "").await;
        assert!(matches!(result, Err(LedgerError::AmountExceedsLimit { .. })));
        assert_eq!(
            engine.balance(a.id).await.unwrap().balance.value(),
            dec!(300000)
        );
        assert_eq!(engine.history(a.id, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_withdraw_happy_path_and_overdraw() {
        let (engine, accounts) = seeded_engine(&[("+254712345678", dec!(100.00))]).await;
        let a = &accounts[0];

        let result = engine.withdraw(a.id, dec!(150.00), "atm").await;
        assert!(matches!(result, Err(LedgerError::InsufficientFunds)));
        assert_eq!(engine.balance(a.id).await.unwrap().balance.value(), dec!(100.00));
        assert!(engine.history(a.id, 10).await.unwrap().is_empty());

        let receipt = engine.withdraw(a.id, dec!(40.00), "atm").await.unwrap();
        assert_eq!(receipt.new_balance.value(), dec!(60.00));
        assert_eq!(receipt.transaction.kind, TransactionKind::Withdraw);
        assert_eq!(receipt.transaction.receiver, None);
    }

    #[tokio::test]
    async fn test_operations_on_unknown_account() {
        let (engine, _) = seeded_engine(&[]).await;
        let ghost = uuid::Uuid::new_v4();

        assert!(matches!(
            engine.deposit(ghost, dec!(10.00), "").await,
            Err(LedgerError::AccountNotFound(_))
        ));
        assert!(matches!(
            engine.withdraw(ghost, dec!(10.00), "").await,
            Err(LedgerError::AccountNotFound(_))
        ));
        assert!(matches!(
            engine.balance(ghost).await,
            Err(LedgerError::AccountNotFound(_))
        ));
        assert!(matches!(
            engine.history(ghost, 10).await,
            Err(LedgerError::AccountNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_history_newest_first_with_limit() {
        let (engine, accounts) = seeded_engine(&[("+254712345678", dec!(0))]).await;
        let a = &accounts[0];

        engine.deposit(a.id, dec!(1.00), "first").await.unwrap();
        engine.deposit(a.id, dec!(2.00), "second").await.unwrap();
        engine.deposit(a.id, dec!(3.00), "third").await.unwrap();

        let history = engine.history(a.id, 2).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].description, "third");
        assert_eq!(history[1].description, "second");
    }

    #[tokio::test]
    async fn test_deposit_refuses_to_overflow_balance_precision() {
        let (engine, accounts) = seeded_engine(&[("+254712345678", dec!(9999999999.00))]).await;
        let a = &accounts[0];

        // A valid amount that would push the balance past 12 total digits.
        let result = engine.deposit(a.id, dec!(300000.00), "").await;
        assert!(matches!(result, Err(LedgerError::BalanceOverflow)));

        assert_eq!(
            engine.balance(a.id).await.unwrap().balance.value(),
            dec!(9999999999.00)
        );
        assert!(engine.history(a.id, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transfer_refuses_to_overflow_receiver_balance() {
        let (engine, accounts) = seeded_engine(&[
            ("+254712345678", dec!(500000.00)),
            ("+254723456789", dec!(9999999999.00)),
        ])
        .await;
        let (a, b) = (&accounts[0], &accounts[1]);

        let result = engine
            .transfer(a.id, &b.phone_number, dec!(100000.00), "")
            .await;
        assert!(matches!(result, Err(LedgerError::BalanceOverflow)));

        assert_eq!(
            engine.balance(a.id).await.unwrap().balance.value(),
            dec!(500000.00)
        );
        assert_eq!(
            engine.balance(b.id).await.unwrap().balance.value(),
            dec!(9999999999.00)
        );
        assert!(engine.history(a.id, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_code_collision_retries_and_succeeds() {
        let store = InMemoryLedger::new();
        let account = Account::with_balance(phone("+254712345678"), "Test", dec!(0)).unwrap();
        store.insert_account(account.clone()).await.unwrap();

        // The second deposit first draws the already-claimed code, then a
        // fresh one.
        let engine = LedgerEngine::new(
            Box::new(store),
            Box::new(ScriptedCodeGenerator::new(&[
                "AAAABBBBCCCC",
                "AAAABBBBCCCC",
                "DDDDEEEEFFFF",
            ])),
            LedgerConfig::default(),
        );

        engine.deposit(account.id, dec!(10.00), "").await.unwrap();
        let receipt = engine.deposit(account.id, dec!(5.00), "").await.unwrap();

        assert_eq!(receipt.transaction.code.as_str(), "DDDDEEEEFFFF");
        assert_eq!(
            engine.balance(account.id).await.unwrap().balance.value(),
            dec!(15.00)
        );
        assert_eq!(engine.history(account.id, 10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_code_collision_exhausts_after_bounded_retries() {
        let store = InMemoryLedger::new();
        let account = Account::with_balance(phone("+254712345678"), "Test", dec!(0)).unwrap();
        store.insert_account(account.clone()).await.unwrap();

        let engine = LedgerEngine::new(
            Box::new(store),
            Box::new(StuckCodeGenerator),
            LedgerConfig::default(),
        );

        // First deposit claims the only code the generator ever emits.
        engine.deposit(account.id, dec!(10.00), "").await.unwrap();

        let result = engine.deposit(account.id, dec!(5.00), "").await;
        assert!(matches!(
            result,
            Err(LedgerError::CodeGenerationExhausted(_))
        ));

        // The failed deposit left no trace.
        assert_eq!(
            engine.balance(account.id).await.unwrap().balance.value(),
            dec!(10.00)
        );
        assert_eq!(engine.history(account.id, 10).await.unwrap().len(), 1);
    }
}
