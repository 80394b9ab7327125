use crate::error::{LedgerError, Result};
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Schedule,
    Execute,
    Cancel,
    Withdraw,
    WithdrawTax,
}

/// One replay row: an operation, the caller issuing it, and its parameters.
///
/// `ref` is a row-local alias naming a scheduled transaction — a schedule
/// row defines it, execute/cancel rows resolve it. Identifiers are
/// content-derived, so an input file cannot know them up front. `at` is the
/// unix-seconds timestamp driving the replay clock.
#[derive(Debug, Deserialize, PartialEq, Eq, Clone)]
pub struct OperationRow {
    pub op: OperationKind,
    pub caller: String,
    #[serde(default)]
    pub r#ref: Option<String>,
    #[serde(default)]
    pub amount: Option<u64>,
    #[serde(default)]
    pub deposit: Option<u64>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub at: Option<u64>,
}

/// Reads operations from a CSV source.
///
/// Wraps `csv::Reader` and provides an iterator over `Result<OperationRow>`.
/// Handles whitespace trimming and flexible record lengths automatically.
pub struct OperationReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> OperationReader<R> {
    /// Creates a new `OperationReader` from any `Read` source (e.g. File,
    /// Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads and deserializes rows, so large
    /// files stream without loading the whole dataset into memory.
    pub fn operations(self) -> impl Iterator<Item = Result<OperationRow>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(LedgerError::from))
    }
}
