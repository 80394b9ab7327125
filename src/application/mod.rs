//! Application layer orchestrating the domain state machine and the ports.
//!
//! This module defines the `LedgerService`, the primary entry point for all
//! ledger operations. It serializes mutations behind a single lock and drives
//! the external payout sink.

pub mod service;
