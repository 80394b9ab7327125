use crate::domain::ports::PayoutSink;
use crate::domain::transaction::AccountId;
use async_trait::async_trait;
use std::io;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory payout sink that records every transfer it is asked to make.
///
/// `Clone` shares the underlying log, so a handle kept by the caller sees the
/// payments made through the service. Used by the replay binary (where no
/// real transfer backend exists) and by tests.
#[derive(Default, Clone)]
pub struct RecordingPayouts {
    payments: Arc<RwLock<Vec<(AccountId, u64)>>>,
}

impl RecordingPayouts {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn payments(&self) -> Vec<(AccountId, u64)> {
        self.payments.read().await.clone()
    }

    pub async fn total_paid(&self) -> u64 {
        self.payments.read().await.iter().map(|(_, a)| a).sum()
    }
}

#[async_trait]
impl PayoutSink for RecordingPayouts {
    async fn pay(&self, to: &AccountId, amount: u64) -> io::Result<()> {
        self.payments.write().await.push((to.clone(), amount));
        Ok(())
    }
}

/// Payout sink that refuses every transfer. Exercises the rollback paths.
#[derive(Default, Clone, Copy)]
pub struct FailingPayouts;

#[async_trait]
impl PayoutSink for FailingPayouts {
    async fn pay(&self, _to: &AccountId, _amount: u64) -> io::Result<()> {
        Err(io::Error::other("transfer backend unavailable"))
    }
}
