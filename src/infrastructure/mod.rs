//! Adapters for the domain ports: clocks, payout sinks and the optional
//! RocksDB snapshot store.

pub mod clock;
pub mod payout;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
