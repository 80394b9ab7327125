use clap::Parser;
use dally::application::service::{LedgerConfig, LedgerService};
use dally::domain::tax::TaxParams;
use dally::domain::transaction::TxId;
use dally::error::{LedgerError, Result as LedgerResult};
use dally::infrastructure::clock::ManualClock;
use dally::infrastructure::payout::RecordingPayouts;
use dally::interfaces::csv::op_reader::{OperationKind, OperationReader, OperationRow};
use dally::interfaces::csv::report_writer::BalanceWriter;
use miette::{IntoDiagnostic, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io;
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input operations CSV file
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Privileged identity allowed to cancel and withdraw protocol tax
    #[arg(long, default_value = "admin")]
    admin: String,

    /// Base tax rate in basis points, stamped into new transactions
    #[arg(long, default_value_t = 100)]
    base_rate_bps: u32,

    /// Ceiling on the effective tax rate in basis points
    #[arg(long, default_value_t = 5000)]
    max_rate_bps: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries only the balance report.
    tracing_subscriber::fmt().with_writer(io::stderr).init();
    let cli = Cli::parse();

    let config = LedgerConfig {
        admin: cli.admin.clone(),
        tax: TaxParams {
            base_rate_bps: cli.base_rate_bps,
            max_rate_bps: cli.max_rate_bps,
        },
    };
    let clock = ManualClock::default();
    let driver_clock = clock.clone();
    let payouts = RecordingPayouts::new();

    #[cfg(feature = "storage-rocksdb")]
    let (service, snapshot_store) = if let Some(db_path) = &cli.db_path {
        let store = dally::infrastructure::rocksdb::SnapshotStore::open(db_path)
            .into_diagnostic()?;
        let state = store.load().into_diagnostic()?.unwrap_or_default();
        let service =
            LedgerService::with_state(state, config, Box::new(clock), Box::new(payouts));
        (service, Some(store))
    } else {
        let service = LedgerService::new(config, Box::new(clock), Box::new(payouts));
        (service, None)
    };

    #[cfg(not(feature = "storage-rocksdb"))]
    let service = {
        if cli.db_path.is_some() {
            eprintln!(
                "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
            );
        }
        LedgerService::new(config, Box::new(clock), Box::new(payouts))
    };

    // Replay the operations
    let file = File::open(&cli.input).into_diagnostic()?;
    let reader = OperationReader::new(file);
    let mut aliases: HashMap<String, TxId> = HashMap::new();
    for row_result in reader.operations() {
        match row_result {
            Ok(row) => {
                if let Err(e) = apply(&service, &driver_clock, &mut aliases, row).await {
                    eprintln!("Error processing operation: {}", e);
                }
            }
            Err(e) => {
                eprintln!("Error reading operation: {}", e);
            }
        }
    }

    #[cfg(feature = "storage-rocksdb")]
    if let Some(store) = snapshot_store {
        store.save(&service.snapshot().await).into_diagnostic()?;
    }

    // Output the final per-owner balance report
    let report = service.balance_report().await;
    let stdout = io::stdout();
    let mut writer = BalanceWriter::new(stdout.lock());
    writer.write_report(report).into_diagnostic()?;

    let info = service.contract_info().await;
    tracing::info!(
        total_held = info.total_held,
        available_tax = info.available_tax,
        user_funds = info.user_funds,
        "ledger summary"
    );

    Ok(())
}

/// Applies one replay row: advances the clock, resolves the transaction
/// reference and dispatches to the service.
async fn apply(
    service: &LedgerService,
    clock: &ManualClock,
    aliases: &mut HashMap<String, TxId>,
    row: OperationRow,
) -> LedgerResult<()> {
    if let Some(at) = row.at {
        clock.advance_to(at);
    }
    match row.op {
        OperationKind::Schedule => {
            let amount = row.amount.unwrap_or(0);
            let deposit = row.deposit.unwrap_or(amount);
            let label = row.label.unwrap_or_default();
            let id = service.schedule(&row.caller, amount, deposit, &label).await?;
            if let Some(alias) = row.r#ref {
                aliases.insert(alias, id);
            }
        }
        OperationKind::Execute => {
            let id = resolve(aliases, row.r#ref.as_deref())?;
            service.execute(&row.caller, &id).await?;
        }
        OperationKind::Cancel => {
            let id = resolve(aliases, row.r#ref.as_deref())?;
            service.cancel(&row.caller, &id).await?;
        }
        OperationKind::Withdraw => {
            service.withdraw_spare(&row.caller).await?;
        }
        OperationKind::WithdrawTax => {
            service.withdraw_tax(&row.caller).await?;
        }
    }
    Ok(())
}

/// Resolves a row's `ref` column: first as an alias defined by an earlier
/// schedule row, then as a literal hex transaction id.
fn resolve(aliases: &HashMap<String, TxId>, reference: Option<&str>) -> LedgerResult<TxId> {
    let reference = reference.ok_or_else(|| LedgerError::UnknownReference(String::new()))?;
    if let Some(id) = aliases.get(reference) {
        return Ok(*id);
    }
    reference
        .parse()
        .map_err(|_| LedgerError::UnknownReference(reference.to_string()))
}
