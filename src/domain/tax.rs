//! The tax engine: pure functions computing the procrastination tax owed by a
//! transaction record at a given time.
//!
//! All arithmetic is integer-only (basis points, widened to `u128` before
//! multiplication) so results are reproducible and overflow-free. The rate
//! curve is `base_rate_bps * days * floor(sqrt(days))`, an integer
//! approximation of `base_rate * days^1.5`, capped at `max_rate_bps`.

use crate::domain::transaction::TransactionRecord;
use serde::{Deserialize, Serialize};

pub const SECONDS_PER_DAY: u64 = 86_400;
pub const BPS_DENOMINATOR: u128 = 10_000;

/// Tax curve parameters, stamped into the ledger configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxParams {
    /// Rate applied per day^1.5 of delay, basis points.
    pub base_rate_bps: u32,
    /// Ceiling on the effective rate, basis points. Keeps tax strictly below
    /// the escrowed principal (10_000 bp would consume it entirely).
    pub max_rate_bps: u32,
}

impl Default for TaxParams {
    fn default() -> Self {
        Self {
            base_rate_bps: 100,  // 1% per day^1.5
            max_rate_bps: 5_000, // 50%
        }
    }
}

/// Integer square root by Newton/Babylonian iteration.
///
/// Returns `floor(sqrt(x))` exactly: `r*r <= x < (r+1)*(r+1)` for all inputs.
pub fn isqrt(x: u128) -> u128 {
    if x < 2 {
        return x;
    }
    let mut r = x;
    let mut next = x / 2 + 1;
    while next < r {
        r = next;
        next = (r + x / r) / 2;
    }
    r
}

/// Whole days elapsed between creation and `now`. Clock jumps backwards are
/// treated as zero elapsed time rather than underflowing.
pub fn days_elapsed(created_at: u64, now: u64) -> u64 {
    now.saturating_sub(created_at) / SECONDS_PER_DAY
}

/// Effective tax rate in basis points after `days` whole days of delay.
pub fn rate_bps(params: &TaxParams, days: u64) -> u32 {
    let raw = params.base_rate_bps as u128 * days as u128 * isqrt(days as u128);
    raw.min(params.max_rate_bps as u128) as u32
}

/// Current tax rate for a record at clock time `now`. Zero once executed.
pub fn current_rate_bps(record: &TransactionRecord, now: u64, params: &TaxParams) -> u32 {
    if record.executed {
        return 0;
    }
    let curve = TaxParams {
        base_rate_bps: record.base_rate_bps,
        max_rate_bps: params.max_rate_bps,
    };
    rate_bps(&curve, days_elapsed(record.created_at, now))
}

/// Tax owed by `record` at clock time `now`.
///
/// Zero for executed records, zero amounts and any execution within the first
/// whole day (the grace period). Monotone non-decreasing in `now` and
/// saturating at the cap; the cap keeps the result strictly below the
/// escrowed amount, so it always narrows back into `u64`.
pub fn tax_for(record: &TransactionRecord, now: u64, params: &TaxParams) -> u64 {
    if record.executed || record.amount == 0 {
        return 0;
    }
    let rate = current_rate_bps(record, now, params);
    (record.amount as u128 * rate as u128 / BPS_DENOMINATOR) as u64
}
