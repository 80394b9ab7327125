use dally::application::service::{LedgerConfig, LedgerService};
use dally::error::LedgerError;
use dally::infrastructure::clock::ManualClock;
use dally::infrastructure::payout::RecordingPayouts;
use std::sync::Arc;

fn shared_service() -> (Arc<LedgerService>, RecordingPayouts) {
    let payouts = RecordingPayouts::new();
    let service = Arc::new(LedgerService::new(
        LedgerConfig::default(),
        Box::new(ManualClock::new(0)),
        Box::new(payouts.clone()),
    ));
    (service, payouts)
}

/// Exactly one of many racing execute/cancel attempts on the same identifier
/// may ever succeed; every loser observes "already executed".
#[tokio::test]
async fn test_race_on_same_id_commits_once() {
    let (service, payouts) = shared_service();
    let alice = "alice".to_string();
    let admin = "admin".to_string();

    let id = service.schedule(&alice, 1_000, 1_000, "race").await.unwrap();

    let mut handles = Vec::new();
    for i in 0..10 {
        let service = Arc::clone(&service);
        let alice = alice.clone();
        let admin = admin.clone();
        handles.push(tokio::spawn(async move {
            if i % 2 == 0 {
                service.execute(&alice, &id).await.map(|_| ())
            } else {
                service.cancel(&admin, &id).await
            }
        }));
    }

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => successes += 1,
            Err(e) => assert!(
                matches!(e, LedgerError::AlreadyExecuted(_)),
                "unexpected loser error: {e}"
            ),
        }
    }
    assert_eq!(successes, 1);

    // Whichever won, the funds moved exactly once.
    let info = service.contract_info().await;
    let paid = payouts.total_paid().await;
    assert_eq!(info.total_held + paid, 1_000);
    assert!(service.snapshot().await.check_conservation());
}

/// Operations on distinct identifiers are independent and may interleave in
/// any order without corrupting the ledger.
#[tokio::test]
async fn test_distinct_ids_process_independently() {
    let (service, payouts) = shared_service();

    let mut handles = Vec::new();
    for i in 0..50u64 {
        let service = Arc::clone(&service);
        handles.push(tokio::spawn(async move {
            let user = format!("user{i}");
            let id = service.schedule(&user, 100, 120, "task").await.unwrap();
            let payout = service.execute(&user, &id).await.unwrap();
            assert_eq!(payout, 100);
            service.withdraw_spare(&user).await.unwrap()
        }));
    }

    for handle in handles {
        assert_eq!(handle.await.unwrap(), 20);
    }

    assert_eq!(payouts.total_paid().await, 50 * 120);
    let info = service.contract_info().await;
    assert_eq!(info.total_held, 0);
    assert!(service.snapshot().await.check_conservation());
}

/// Concurrent schedules never collide on identifiers, even at one timestamp.
#[tokio::test]
async fn test_concurrent_schedules_get_unique_ids() {
    let (service, _payouts) = shared_service();

    let mut handles = Vec::new();
    for _ in 0..100 {
        let service = Arc::clone(&service);
        handles.push(tokio::spawn(async move {
            service
                .schedule(&"alice".to_string(), 100, 100, "same inputs")
                .await
                .unwrap()
        }));
    }

    let mut ids = std::collections::HashSet::new();
    for handle in handles {
        ids.insert(handle.await.unwrap());
    }
    assert_eq!(ids.len(), 100);
    assert_eq!(
        service.user_transactions(&"alice".to_string()).await.len(),
        100
    );
}
