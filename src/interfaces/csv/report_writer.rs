use crate::domain::ledger::OwnerBalance;
use crate::error::Result;
use std::io::Write;

/// Writes the final per-owner balance report as CSV.
pub struct BalanceWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> BalanceWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    /// Serializes the report rows (header derived from the field names) and
    /// flushes the sink.
    pub fn write_report(&mut self, report: Vec<OwnerBalance>) -> Result<()> {
        for line in report {
            self.writer.serialize(line)?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
