use crate::domain::transaction::AccountId;
use async_trait::async_trait;
use std::io;

/// Source of ledger time, unix seconds. Implementations must be
/// non-decreasing across calls within a session; second-level granularity and
/// caller-observable jumps forward are tolerated.
pub trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

/// External value-transfer primitive used by the paying operations.
///
/// Transfers can fail and can run arbitrary external code; the service
/// invokes them as the last step of a mutating operation, under the same
/// exclusive lock, and rolls the ledger back if they fail.
#[async_trait]
pub trait PayoutSink: Send + Sync {
    async fn pay(&self, to: &AccountId, amount: u64) -> io::Result<()>;
}

pub type ClockBox = Box<dyn Clock>;
pub type PayoutSinkBox = Box<dyn PayoutSink>;
