use crate::domain::ledger::{BalanceBreakdown, LedgerEvent, LedgerState, OwnerBalance};
use crate::domain::ports::{ClockBox, PayoutSinkBox};
use crate::domain::tax::{self, TaxParams};
use crate::domain::transaction::{AccountId, TransactionDetails, TxId};
use crate::error::{LedgerError, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Deployment configuration: the privileged admin identity and the tax curve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    pub admin: AccountId,
    pub tax: TaxParams,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            admin: "admin".to_string(),
            tax: TaxParams::default(),
        }
    }
}

/// The main entry point for ledger operations.
///
/// `LedgerService` wraps the `LedgerState` in a single `RwLock`: the write
/// guard is the global mutual-exclusion scope covering schedule, execute,
/// cancel and the withdrawals, held across the payout await so a transfer
/// can never interleave with another mutating operation. Queries share the
/// read guard. Operations on distinct identifiers are independent; two
/// operations racing on the same identifier resolve so only the first
/// committed one succeeds.
pub struct LedgerService {
    state: RwLock<LedgerState>,
    config: LedgerConfig,
    clock: ClockBox,
    payouts: PayoutSinkBox,
}

impl LedgerService {
    pub fn new(config: LedgerConfig, clock: ClockBox, payouts: PayoutSinkBox) -> Self {
        Self::with_state(LedgerState::new(), config, clock, payouts)
    }

    /// Resume from a previously persisted state.
    pub fn with_state(
        state: LedgerState,
        config: LedgerConfig,
        clock: ClockBox,
        payouts: PayoutSinkBox,
    ) -> Self {
        Self {
            state: RwLock::new(state),
            config,
            clock,
            payouts,
        }
    }

    fn require_admin(&self, caller: &AccountId) -> Result<()> {
        if *caller != self.config.admin {
            return Err(LedgerError::NotAuthorized {
                caller: caller.clone(),
            });
        }
        Ok(())
    }

    /// Escrow `declared_amount` out of `deposited_value` against a new
    /// transaction owned by `caller`.
    pub async fn schedule(
        &self,
        caller: &AccountId,
        declared_amount: u64,
        deposited_value: u64,
        label: &str,
    ) -> Result<TxId> {
        let mut state = self.state.write().await;
        let now = self.clock.now();
        let id = state.schedule(
            caller,
            declared_amount,
            deposited_value,
            now,
            self.config.tax.base_rate_bps,
            label,
        )?;
        info!(owner = %caller, id = %id, amount = declared_amount, label, "scheduled");
        Ok(id)
    }

    /// Execute a transaction: deduct the current tax and pay the remainder
    /// to the owner. Returns the final payout amount.
    ///
    /// The internal commit happens first; the transfer runs as the last step
    /// under the same write guard, and a transfer failure restores the state
    /// taken before the commit, leaving the ledger observably unmodified.
    pub async fn execute(&self, caller: &AccountId, id: &TxId) -> Result<u64> {
        let mut state = self.state.write().await;
        let now = self.clock.now();
        let checkpoint = state.clone();
        let outcome = state.execute(caller, id, now, &self.config.tax)?;
        if let Err(e) = self.payouts.pay(caller, outcome.payout).await {
            *state = checkpoint;
            warn!(owner = %caller, id = %id, error = %e, "payout failed, execution rolled back");
            return Err(LedgerError::TransferFailed(e.to_string()));
        }
        info!(owner = %caller, id = %id, tax = outcome.tax, payout = outcome.payout, "executed");
        Ok(outcome.payout)
    }

    /// Administrative override: terminate an unexecuted transaction and
    /// refund its full escrowed amount to the owner's spare balance. No tax
    /// is charged and no transfer occurs; the owner withdraws later.
    pub async fn cancel(&self, caller: &AccountId, id: &TxId) -> Result<()> {
        self.require_admin(caller)?;
        let mut state = self.state.write().await;
        let (owner, refund) = state.cancel(id)?;
        info!(%owner, id = %id, refund, "cancelled");
        Ok(())
    }

    /// Pay out and zero the caller's spare balance.
    pub async fn withdraw_spare(&self, caller: &AccountId) -> Result<u64> {
        let mut state = self.state.write().await;
        let checkpoint = state.clone();
        let amount = state.withdraw_spare(caller)?;
        if let Err(e) = self.payouts.pay(caller, amount).await {
            *state = checkpoint;
            warn!(owner = %caller, error = %e, "payout failed, withdrawal rolled back");
            return Err(LedgerError::TransferFailed(e.to_string()));
        }
        info!(owner = %caller, amount, "spare balance withdrawn");
        Ok(amount)
    }

    /// Pay out and zero the protocol tax pool. Admin only.
    pub async fn withdraw_tax(&self, caller: &AccountId) -> Result<u64> {
        self.require_admin(caller)?;
        let mut state = self.state.write().await;
        let checkpoint = state.clone();
        let amount = state.withdraw_tax(caller)?;
        if let Err(e) = self.payouts.pay(caller, amount).await {
            *state = checkpoint;
            warn!(error = %e, "payout failed, tax withdrawal rolled back");
            return Err(LedgerError::TransferFailed(e.to_string()));
        }
        info!(to = %caller, amount, "protocol tax withdrawn");
        Ok(amount)
    }

    pub async fn user_transactions(&self, owner: &AccountId) -> Vec<TxId> {
        self.state.read().await.user_transactions(owner)
    }

    /// Full record plus its live-computed current tax.
    pub async fn transaction_details(&self, id: &TxId) -> Result<TransactionDetails> {
        let state = self.state.read().await;
        let record = state.record(id)?;
        Ok(TransactionDetails {
            id: *id,
            record: record.clone(),
            current_tax: tax::tax_for(record, self.clock.now(), &self.config.tax),
        })
    }

    /// Whole days elapsed since the transaction was scheduled.
    pub async fn days_passed(&self, id: &TxId) -> Result<u64> {
        let state = self.state.read().await;
        let record = state.record(id)?;
        Ok(tax::days_elapsed(record.created_at, self.clock.now()))
    }

    /// Current effective tax rate in basis points, capped.
    pub async fn current_tax_rate(&self, id: &TxId) -> Result<u32> {
        let state = self.state.read().await;
        let record = state.record(id)?;
        Ok(tax::current_rate_bps(record, self.clock.now(), &self.config.tax))
    }

    pub async fn contract_info(&self) -> BalanceBreakdown {
        self.state.read().await.balance_breakdown()
    }

    pub async fn balance_report(&self) -> Vec<OwnerBalance> {
        self.state.read().await.balance_report()
    }

    pub async fn events(&self) -> Vec<LedgerEvent> {
        self.state.read().await.events().to_vec()
    }

    /// Clone of the full ledger state, for persistence.
    pub async fn snapshot(&self) -> LedgerState {
        self.state.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tax::SECONDS_PER_DAY;
    use crate::infrastructure::clock::ManualClock;
    use crate::infrastructure::payout::{FailingPayouts, RecordingPayouts};

    fn service_with(clock: ManualClock, payouts: RecordingPayouts) -> LedgerService {
        LedgerService::new(
            LedgerConfig::default(),
            Box::new(clock),
            Box::new(payouts),
        )
    }

    #[tokio::test]
    async fn test_execute_pays_owner_through_sink() {
        let clock = ManualClock::new(1_000);
        let payouts = RecordingPayouts::new();
        let service = service_with(clock.clone(), payouts.clone());
        let alice = "alice".to_string();

        let id = service.schedule(&alice, 1_000, 1_000, "rent").await.unwrap();
        clock.advance_to(1_000 + 2 * SECONDS_PER_DAY);
        let payout = service.execute(&alice, &id).await.unwrap();

        assert_eq!(payout, 980);
        assert_eq!(payouts.payments().await, vec![(alice, 980)]);
        assert_eq!(service.contract_info().await.available_tax, 20);
    }

    #[tokio::test]
    async fn test_failed_payout_leaves_ledger_unmodified() {
        let clock = ManualClock::new(0);
        let service = LedgerService::new(
            LedgerConfig::default(),
            Box::new(clock.clone()),
            Box::new(FailingPayouts),
        );
        let alice = "alice".to_string();

        let id = service.schedule(&alice, 1_000, 1_200, "rent").await.unwrap();
        let before = service.snapshot().await;

        clock.advance_to(2 * SECONDS_PER_DAY);
        let err = service.execute(&alice, &id).await.unwrap_err();
        assert!(matches!(err, LedgerError::TransferFailed(_)));
        assert_eq!(service.snapshot().await, before);

        // The record is still executable once transfers recover.
        assert!(!service.transaction_details(&id).await.unwrap().record.executed);

        let err = service.withdraw_spare(&alice).await.unwrap_err();
        assert!(matches!(err, LedgerError::TransferFailed(_)));
        assert_eq!(service.snapshot().await, before);
    }

    #[tokio::test]
    async fn test_cancel_requires_admin() {
        let service = service_with(ManualClock::new(0), RecordingPayouts::new());
        let alice = "alice".to_string();
        let id = service.schedule(&alice, 300, 300, "").await.unwrap();

        let err = service.cancel(&alice, &id).await.unwrap_err();
        assert!(matches!(err, LedgerError::NotAuthorized { .. }));

        service.cancel(&"admin".to_string(), &id).await.unwrap();
        let report = service.balance_report().await;
        assert_eq!(report[0].spare, 300);
    }

    #[tokio::test]
    async fn test_withdraw_tax_requires_admin() {
        let clock = ManualClock::new(0);
        let payouts = RecordingPayouts::new();
        let service = service_with(clock.clone(), payouts.clone());
        let alice = "alice".to_string();
        let admin = "admin".to_string();

        let id = service.schedule(&alice, 1_000, 1_000, "").await.unwrap();
        clock.advance_to(2 * SECONDS_PER_DAY);
        service.execute(&alice, &id).await.unwrap();

        assert!(matches!(
            service.withdraw_tax(&alice).await,
            Err(LedgerError::NotAuthorized { .. })
        ));
        assert_eq!(service.withdraw_tax(&admin).await.unwrap(), 20);
        assert!(matches!(
            service.withdraw_tax(&admin).await,
            Err(LedgerError::NothingToWithdraw(_))
        ));
    }

    #[tokio::test]
    async fn test_queries_report_live_tax() {
        let clock = ManualClock::new(0);
        let service = service_with(clock.clone(), RecordingPayouts::new());
        let alice = "alice".to_string();
        let id = service.schedule(&alice, 1_000, 1_000, "gym").await.unwrap();

        assert_eq!(service.days_passed(&id).await.unwrap(), 0);
        assert_eq!(service.current_tax_rate(&id).await.unwrap(), 0);
        assert_eq!(service.transaction_details(&id).await.unwrap().current_tax, 0);

        clock.advance_to(2 * SECONDS_PER_DAY);
        assert_eq!(service.days_passed(&id).await.unwrap(), 2);
        assert_eq!(service.current_tax_rate(&id).await.unwrap(), 200);
        let details = service.transaction_details(&id).await.unwrap();
        assert_eq!(details.current_tax, 20);
        assert_eq!(details.record.label, "gym");
    }
}
