use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result, WrapErr, miette};
use rust_decimal::Decimal;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

use sarafu::application::engine::LedgerEngine;
use sarafu::config::LedgerConfig;
use sarafu::domain::account::{Account, PhoneNumber};
use sarafu::domain::ports::LedgerStore;
use sarafu::infrastructure::codes::RandomCodeGenerator;
use sarafu::infrastructure::in_memory::InMemoryLedger;
use sarafu::interfaces::csv::account_reader::AccountReader;
use sarafu::interfaces::csv::statement_writer::StatementWriter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Accounts CSV (`phone,full_name,balance`) to load before running the
    /// command. Mostly useful with the in-memory store.
    #[arg(long)]
    seed_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Register the accounts listed in a CSV seed file
    Seed { file: PathBuf },
    /// Send money to another account
    Transfer {
        /// Phone number of the (authenticated) sender
        #[arg(long)]
        from: String,
        /// Phone number of the receiver
        #[arg(long)]
        to: String,
        amount: Decimal,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Credit external funds to an account
    Deposit {
        #[arg(long)]
        account: String,
        amount: Decimal,
        #[arg(long, default_value = "Deposit")]
        description: String,
    },
    /// Debit external funds from an account
    Withdraw {
        #[arg(long)]
        account: String,
        amount: Decimal,
        #[arg(long, default_value = "Withdrawal")]
        description: String,
    },
    /// Show an account's current balance
    Balance {
        #[arg(long)]
        account: String,
    },
    /// Show an account's most recent transactions, newest first
    History {
        #[arg(long)]
        account: String,
        #[arg(long, default_value_t = 20)]
        limit: usize,
        /// Emit CSV instead of plain lines
        #[arg(long)]
        csv: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    #[cfg(feature = "storage-rocksdb")]
    if let Some(path) = cli.db_path.clone() {
        let store = sarafu::infrastructure::rocksdb::RocksDbLedger::open(&path)
            .into_diagnostic()
            .wrap_err("opening database")?;
        return run(cli, store).await;
    }
    #[cfg(not(feature = "storage-rocksdb"))]
    if cli.db_path.is_some() {
        return Err(miette!(
            "this build has no persistent storage; rebuild with --features storage-rocksdb"
        ));
    }

    run(cli, InMemoryLedger::new()).await
}

async fn run<S>(cli: Cli, store: S) -> Result<()>
where
    S: LedgerStore + Clone + 'static,
{
    if let Some(path) = &cli.seed_file {
        seed_accounts(&store, path).await?;
    }

    let engine = LedgerEngine::new(
        Box::new(store.clone()),
        Box::new(RandomCodeGenerator),
        LedgerConfig::default(),
    );

    match cli.command {
        Command::Seed { file } => {
            let count = seed_accounts(&store, &file).await?;
            println!("Registered {count} accounts");
        }
        Command::Transfer {
            from,
            to,
            amount,
            description,
        } => {
            let sender = resolve(&store, &from).await?;
            let receiver_phone = PhoneNumber::new(to).into_diagnostic()?;
            let receipt = engine
                .transfer(sender.id, &receiver_phone, amount, &description)
                .await
                .into_diagnostic()?;
            println!(
                "{} SEND {} to {} completed. New balance: {}",
                receipt.transaction.code,
                receipt.transaction.amount,
                receiver_phone,
                receipt.new_balance
            );
        }
        Command::Deposit {
            account,
            amount,
            description,
        } => {
            let target = resolve(&store, &account).await?;
            let receipt = engine
                .deposit(target.id, amount, &description)
                .await
                .into_diagnostic()?;
            println!(
                "{} DEPOSIT {} completed. New balance: {}",
                receipt.transaction.code, receipt.transaction.amount, receipt.new_balance
            );
        }
        Command::Withdraw {
            account,
            amount,
            description,
        } => {
            let target = resolve(&store, &account).await?;
            let receipt = engine
                .withdraw(target.id, amount, &description)
                .await
                .into_diagnostic()?;
            println!(
                "{} WITHDRAW {} completed. New balance: {}",
                receipt.transaction.code, receipt.transaction.amount, receipt.new_balance
            );
        }
        Command::Balance { account } => {
            let target = resolve(&store, &account).await?;
            let view = engine.balance(target.id).await.into_diagnostic()?;
            println!("{} ({}): {}", view.full_name, view.phone_number, view.balance);
        }
        Command::History {
            account,
            limit,
            csv,
        } => {
            let target = resolve(&store, &account).await?;
            let transactions = engine.history(target.id, limit).await.into_diagnostic()?;
            if csv {
                let stdout = io::stdout();
                StatementWriter::new(stdout.lock())
                    .write_transactions(&transactions)
                    .into_diagnostic()?;
            } else {
                for tx in &transactions {
                    println!(
                        "{} {} {} {} {} {}",
                        tx.created_at.to_rfc3339(),
                        tx.code,
                        tx.kind,
                        tx.amount,
                        tx.status,
                        tx.description
                    );
                }
            }
        }
    }

    Ok(())
}

async fn resolve<S: LedgerStore>(store: &S, phone: &str) -> Result<Account> {
    let phone = PhoneNumber::new(phone).into_diagnostic()?;
    store
        .find_account_by_phone(&phone)
        .await
        .into_diagnostic()?
        .ok_or_else(|| miette!("no account registered for {phone}"))
}

async fn seed_accounts<S: LedgerStore>(store: &S, path: &Path) -> Result<usize> {
    let file = File::open(path)
        .into_diagnostic()
        .wrap_err_with(|| format!("opening seed file {}", path.display()))?;

    let mut count = 0;
    for account in AccountReader::new(file).accounts() {
        let account = account.into_diagnostic()?;
        info!(phone = %account.phone_number, name = %account.full_name, "registering account");
        store.insert_account(account).await.into_diagnostic()?;
        count += 1;
    }
    Ok(count)
}
