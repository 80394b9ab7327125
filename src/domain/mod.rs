//! Domain layer: the ledger state machine, the tax formula and the ports the
//! application layer depends on. Everything here is deterministic and free of
//! I/O; time and value transfer enter through the `ports` traits.

pub mod ledger;
pub mod ports;
pub mod tax;
pub mod transaction;
