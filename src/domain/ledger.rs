//! The ledger store: the authoritative mapping of transaction records,
//! per-owner indexes, spare balances and the protocol tax pool.
//!
//! `LedgerState` owns every mutation of these structures. Methods take
//! `&mut self`, check their preconditions before touching anything, and
//! append a `LedgerEvent` on commit. Paying operations only adjust internal
//! balances here; the actual transfer (and rollback on transfer failure) is
//! the application layer's job.

use crate::domain::tax::{self, TaxParams};
use crate::domain::transaction::{AccountId, TransactionRecord, TxId};
use crate::error::{LedgerError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Append-only audit log entry, one per committed mutation.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    Scheduled {
        id: TxId,
        owner: AccountId,
        amount: u64,
        label: String,
    },
    Executed {
        id: TxId,
        owner: AccountId,
        tax: u64,
        payout: u64,
    },
    Cancelled {
        id: TxId,
        owner: AccountId,
        refund: u64,
    },
    SpareWithdrawn {
        owner: AccountId,
        amount: u64,
    },
    TaxWithdrawn {
        to: AccountId,
        amount: u64,
    },
}

/// Aggregate balance breakdown. `total_held == available_tax + user_funds`
/// always, as a direct consequence of the conservation invariant.
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
pub struct BalanceBreakdown {
    pub total_held: u64,
    pub available_tax: u64,
    pub user_funds: u64,
}

/// Per-owner balance line for the final report.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct OwnerBalance {
    pub owner: AccountId,
    pub escrowed: u64,
    pub spare: u64,
    pub total: u64,
}

/// Result of an internal execute commit, handed to the application layer so
/// it can perform the payout (and undo the commit if the transfer fails).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub tax: u64,
    pub payout: u64,
}

/// Everything in a `LedgerState` that is neither a transaction record nor a
/// spare balance. Persistence stores this as a single unit alongside the
/// per-record and per-owner entries.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerMeta {
    pub owner_index: BTreeMap<AccountId, Vec<TxId>>,
    pub tax_pool: u64,
    pub sequence: u64,
    pub total_deposited: u64,
    pub total_withdrawn: u64,
    pub events: Vec<LedgerEvent>,
}

/// The shared ledger. One instance per deployment, explicitly owned; every
/// mutating operation takes `&mut self`, so exclusive access is enforced by
/// whoever holds the state (the service wraps it in a single `RwLock`).
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerState {
    /// All transaction records ever created, never deleted.
    records: BTreeMap<TxId, TransactionRecord>,
    /// Append-only enumeration index per owner; not authoritative for
    /// balances.
    owner_index: BTreeMap<AccountId, Vec<TxId>>,
    /// Deposited-but-unscheduled value owed back to each owner.
    spare_balances: BTreeMap<AccountId, u64>,
    /// Tax collected across all executions, pending withdrawal.
    tax_pool: u64,
    /// Running sum of all unexecuted escrowed amounts, maintained
    /// incrementally so the conservation identity stays cheap to assert.
    escrow_total: u64,
    /// Strictly increasing counter feeding identifier derivation.
    sequence: u64,
    /// Lifetime value accepted by `schedule`.
    total_deposited: u64,
    /// Lifetime value paid out by the paying operations.
    total_withdrawn: u64,
    events: Vec<LedgerEvent>,
}

impl LedgerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Escrow `declared_amount` of the `deposited_value` supplied by `owner`
    /// against a new transaction; any excess is credited to the owner's
    /// spare balance.
    pub fn schedule(
        &mut self,
        owner: &AccountId,
        declared_amount: u64,
        deposited_value: u64,
        created_at: u64,
        base_rate_bps: u32,
        label: &str,
    ) -> Result<TxId> {
        if declared_amount == 0 {
            return Err(LedgerError::AmountNotPositive);
        }
        if deposited_value < declared_amount {
            return Err(LedgerError::InsufficientDeposit {
                declared: declared_amount,
                deposited: deposited_value,
            });
        }
        let total_deposited = self
            .total_deposited
            .checked_add(deposited_value)
            .ok_or(LedgerError::DepositOverflow)?;

        let id = TxId::derive(owner, declared_amount, created_at, self.sequence);
        self.sequence += 1;
        self.total_deposited = total_deposited;
        self.records.insert(
            id,
            TransactionRecord {
                owner: owner.clone(),
                amount: declared_amount,
                created_at,
                base_rate_bps,
                executed: false,
                label: label.to_string(),
            },
        );
        self.owner_index.entry(owner.clone()).or_default().push(id);
        self.escrow_total += declared_amount;
        if deposited_value > declared_amount {
            *self.spare_balances.entry(owner.clone()).or_default() +=
                deposited_value - declared_amount;
        }
        self.events.push(LedgerEvent::Scheduled {
            id,
            owner: owner.clone(),
            amount: declared_amount,
            label: label.to_string(),
        });
        debug_assert!(self.holds_identity());
        Ok(id)
    }

    /// Commit an execution: mark the record executed, accrue the tax to the
    /// pool and account the payout as withdrawn. The returned outcome tells
    /// the caller how much to actually transfer.
    pub fn execute(
        &mut self,
        caller: &AccountId,
        id: &TxId,
        now: u64,
        params: &TaxParams,
    ) -> Result<ExecutionOutcome> {
        let record = self
            .records
            .get(id)
            .ok_or(LedgerError::TransactionNotFound(*id))?;
        if record.owner != *caller {
            return Err(LedgerError::NotAuthorized {
                caller: caller.clone(),
            });
        }
        if record.executed {
            return Err(LedgerError::AlreadyExecuted(*id));
        }
        let tax = tax::tax_for(record, now, params);
        if tax >= record.amount {
            // Unreachable while max_rate_bps < 10_000; a misconfigured curve
            // must fail loudly rather than zero the payout.
            return Err(LedgerError::TaxExceedsPrincipal {
                tax,
                amount: record.amount,
            });
        }
        let payout = record.amount - tax;

        let record = self.records.get_mut(id).expect("checked above");
        record.executed = true;
        self.escrow_total -= tax + payout;
        self.tax_pool += tax;
        self.total_withdrawn += payout;
        self.events.push(LedgerEvent::Executed {
            id: *id,
            owner: caller.clone(),
            tax,
            payout,
        });
        debug_assert!(self.holds_identity());
        Ok(ExecutionOutcome { tax, payout })
    }

    /// Administrative cancellation: terminal like execute, but refunds the
    /// full escrowed amount to the owner's spare balance with no tax and no
    /// immediate transfer. Infallible once the preconditions hold.
    pub fn cancel(&mut self, id: &TxId) -> Result<(AccountId, u64)> {
        let record = self
            .records
            .get_mut(id)
            .ok_or(LedgerError::TransactionNotFound(*id))?;
        if record.executed {
            return Err(LedgerError::AlreadyExecuted(*id));
        }
        record.executed = true;
        let owner = record.owner.clone();
        let refund = record.amount;
        self.escrow_total -= refund;
        *self.spare_balances.entry(owner.clone()).or_default() += refund;
        self.events.push(LedgerEvent::Cancelled {
            id: *id,
            owner: owner.clone(),
            refund,
        });
        debug_assert!(self.holds_identity());
        Ok((owner, refund))
    }

    /// Zero the caller's spare balance and account it as withdrawn.
    pub fn withdraw_spare(&mut self, owner: &AccountId) -> Result<u64> {
        let balance = self
            .spare_balances
            .get_mut(owner)
            .filter(|b| **b > 0)
            .ok_or_else(|| LedgerError::NothingToWithdraw(owner.clone()))?;
        let amount = std::mem::take(balance);
        self.total_withdrawn += amount;
        self.events.push(LedgerEvent::SpareWithdrawn {
            owner: owner.clone(),
            amount,
        });
        debug_assert!(self.holds_identity());
        Ok(amount)
    }

    /// Zero the protocol tax pool and account it as withdrawn.
    pub fn withdraw_tax(&mut self, to: &AccountId) -> Result<u64> {
        if self.tax_pool == 0 {
            return Err(LedgerError::NothingToWithdraw(to.clone()));
        }
        let amount = std::mem::take(&mut self.tax_pool);
        self.total_withdrawn += amount;
        self.events.push(LedgerEvent::TaxWithdrawn {
            to: to.clone(),
            amount,
        });
        debug_assert!(self.holds_identity());
        Ok(amount)
    }

    pub fn record(&self, id: &TxId) -> Result<&TransactionRecord> {
        self.records
            .get(id)
            .ok_or(LedgerError::TransactionNotFound(*id))
    }

    pub fn user_transactions(&self, owner: &AccountId) -> Vec<TxId> {
        self.owner_index.get(owner).cloned().unwrap_or_default()
    }

    pub fn spare_balance(&self, owner: &AccountId) -> u64 {
        self.spare_balances.get(owner).copied().unwrap_or(0)
    }

    pub fn tax_pool(&self) -> u64 {
        self.tax_pool
    }

    pub fn events(&self) -> &[LedgerEvent] {
        &self.events
    }

    /// Sum of all unexecuted escrowed amounts.
    pub fn escrow_total(&self) -> u64 {
        self.escrow_total
    }

    pub fn balance_breakdown(&self) -> BalanceBreakdown {
        let spare_total: u64 = self.spare_balances.values().sum();
        let user_funds = self.escrow_total() + spare_total;
        BalanceBreakdown {
            total_held: user_funds + self.tax_pool,
            available_tax: self.tax_pool,
            user_funds,
        }
    }

    /// Per-owner balance lines in `BTreeMap` order, covering every identity
    /// that ever scheduled or holds spare value.
    pub fn balance_report(&self) -> Vec<OwnerBalance> {
        let mut escrowed: BTreeMap<&AccountId, u64> = BTreeMap::new();
        for owner in self.owner_index.keys().chain(self.spare_balances.keys()) {
            escrowed.entry(owner).or_default();
        }
        for record in self.records.values().filter(|r| !r.executed) {
            *escrowed.entry(&record.owner).or_default() += record.amount;
        }
        escrowed
            .into_iter()
            .map(|(owner, escrowed)| {
                let spare = self.spare_balance(owner);
                OwnerBalance {
                    owner: owner.clone(),
                    escrowed,
                    spare,
                    total: escrowed + spare,
                }
            })
            .collect()
    }

    pub fn records(&self) -> &BTreeMap<TxId, TransactionRecord> {
        &self.records
    }

    pub fn spare_balances(&self) -> &BTreeMap<AccountId, u64> {
        &self.spare_balances
    }

    pub fn meta(&self) -> LedgerMeta {
        LedgerMeta {
            owner_index: self.owner_index.clone(),
            tax_pool: self.tax_pool,
            sequence: self.sequence,
            total_deposited: self.total_deposited,
            total_withdrawn: self.total_withdrawn,
            events: self.events.clone(),
        }
    }

    /// Reassemble a state from its persisted parts.
    pub fn from_parts(
        records: BTreeMap<TxId, TransactionRecord>,
        spare_balances: BTreeMap<AccountId, u64>,
        meta: LedgerMeta,
    ) -> Self {
        let escrow_total = records
            .values()
            .filter(|r| !r.executed)
            .map(|r| r.amount)
            .sum();
        Self {
            records,
            owner_index: meta.owner_index,
            spare_balances,
            tax_pool: meta.tax_pool,
            escrow_total,
            sequence: meta.sequence,
            total_deposited: meta.total_deposited,
            total_withdrawn: meta.total_withdrawn,
            events: meta.events,
        }
    }

    /// The conservation invariant: everything the ledger holds is either
    /// unexecuted escrow, spare balance or collected tax, and matches the
    /// lifetime deposit/withdrawal counters exactly. Also recomputes the
    /// escrow sum from the records to verify the running total.
    pub fn check_conservation(&self) -> bool {
        let recomputed: u64 = self
            .records
            .values()
            .filter(|r| !r.executed)
            .map(|r| r.amount)
            .sum();
        recomputed == self.escrow_total && self.holds_identity()
    }

    fn holds_identity(&self) -> bool {
        let spare_total: u64 = self.spare_balances.values().sum();
        self.escrow_total + spare_total + self.tax_pool
            == self.total_deposited - self.total_withdrawn
    }
}
