use crate::domain::transaction::{AccountId, TxId};
use thiserror::Error;

/// Crate-wide error taxonomy.
///
/// Input, authorization, state and invariant errors are rejected synchronously
/// with no state change. Transfer failures surface as hard operation failures
/// after the ledger has been rolled back. No error is retried internally.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("amount must be positive")]
    AmountNotPositive,
    #[error("deposited value {deposited} is less than declared amount {declared}")]
    InsufficientDeposit { declared: u64, deposited: u64 },
    #[error("deposit would overflow the ledger's lifetime counters")]
    DepositOverflow,
    #[error("caller {caller} is not authorized")]
    NotAuthorized { caller: AccountId },
    #[error("transaction {0} not found")]
    TransactionNotFound(TxId),
    #[error("transaction {0} already executed")]
    AlreadyExecuted(TxId),
    #[error("nothing to withdraw for {0}")]
    NothingToWithdraw(AccountId),
    #[error("tax {tax} would consume the escrowed amount {amount}")]
    TaxExceedsPrincipal { tax: u64, amount: u64 },
    #[error("payout transfer failed: {0}")]
    TransferFailed(String),
    #[error("unknown transaction reference {0}")]
    UnknownReference(String),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("storage error: {0}")]
    Storage(#[from] rocksdb::Error),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
