//! Integration tests for the payment confirmation worker
//!
//! Every test runs on a paused clock, so the 3 second poll interval and the
//! 60 second deadline elapse instantly and deterministically.

mod common;

use common::{tx001, MockGateway};
use payconfirm::config::ConfirmationConfig;
use payconfirm::payments::{PaymentParameters, PaymentStatus, TerminalStatus};
use payconfirm::store::{InMemoryStatusStore, StatusStore, WriteOutcome};
use payconfirm::workers::{ConfirmationView, PaymentConfirmation, SessionState};
use payconfirm::ConfirmationError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{sleep, Instant};

fn engine(gateway: &Arc<MockGateway>, store: &Arc<InMemoryStatusStore>) -> PaymentConfirmation {
    PaymentConfirmation::new(
        gateway.clone(),
        store.clone(),
        ConfirmationConfig::default(),
    )
}

fn assert_elapsed(started: Instant, secs: u64) {
    let elapsed = started.elapsed();
    assert!(
        elapsed >= Duration::from_secs(secs) && elapsed < Duration::from_secs(secs + 1),
        "resolved after {:?}, expected {}s",
        elapsed,
        secs
    );
}

/// Let spawned tasks finish their in-flight gateway and store calls
async fn settle() {
    sleep(Duration::from_millis(10)).await;
}

#[tokio::test(start_paused = true)]
async fn test_settles_on_twentieth_poll() {
    let gateway = Arc::new(MockGateway::paid_on(20));
    let store = Arc::new(InMemoryStatusStore::new());
    let started = Instant::now();

    let session = engine(&gateway, &store).start(tx001()).await.unwrap();
    assert_eq!(session.state(), SessionState::Pending);

    let state = session.resolved().await;
    assert_eq!(state, SessionState::Success);
    // Polls run at t=0,3,...,57
    assert_elapsed(started, 57);
    settle().await;

    assert_eq!(gateway.polls(), 20);
    assert_eq!(gateway.expiries(), 0);
    assert_eq!(store.get("TX-001").await.unwrap(), Some(PaymentStatus::Success));
    match session.view() {
        ConfirmationView::Confirmed {
            transaction_code,
            redirect_to,
            already_resolved,
            ..
        } => {
            assert_eq!(transaction_code, "TX-001");
            assert_eq!(redirect_to, "/my-courses");
            assert!(!already_resolved);
        }
        other => panic!("unexpected view: {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_expires_exactly_at_deadline() {
    let gateway = Arc::new(MockGateway::never_paid());
    let store = Arc::new(InMemoryStatusStore::new());
    let started = Instant::now();

    let session = engine(&gateway, &store).start(tx001()).await.unwrap();
    let state = session.resolved().await;
    assert_eq!(state, SessionState::Expired);
    assert_elapsed(started, 60);
    settle().await;

    assert_eq!(gateway.polls(), 20);
    assert_eq!(gateway.expiries(), 1);
    assert_eq!(store.get("TX-001").await.unwrap(), Some(PaymentStatus::Expired));
    assert!(session.view().qr_url().is_none());

    // Nothing keeps ticking after the terminal transition
    sleep(Duration::from_secs(120)).await;
    assert_eq!(gateway.polls(), 20);
    assert_eq!(gateway.expiries(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_early_settlement_stops_polling() {
    let gateway = Arc::new(MockGateway::paid_on(4));
    let store = Arc::new(InMemoryStatusStore::new());
    let started = Instant::now();

    let session = engine(&gateway, &store).start(tx001()).await.unwrap();
    assert_eq!(session.resolved().await, SessionState::Success);
    assert_elapsed(started, 9);

    // The deadline passes without overturning the outcome
    sleep(Duration::from_secs(120)).await;
    assert_eq!(gateway.polls(), 4);
    assert_eq!(gateway.expiries(), 0);
    assert_eq!(session.state(), SessionState::Success);
    assert_eq!(store.get("TX-001").await.unwrap(), Some(PaymentStatus::Success));
}

#[tokio::test(start_paused = true)]
async fn test_poll_errors_keep_polling() {
    let gateway = Arc::new(MockGateway::paid_on(5).failing_until(3));
    let store = Arc::new(InMemoryStatusStore::new());

    let session = engine(&gateway, &store).start(tx001()).await.unwrap();
    assert_eq!(session.resolved().await, SessionState::Success);
    assert_eq!(gateway.polls(), 5);
    assert_eq!(gateway.expiries(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_failed_expiry_call_still_records_outcome() {
    let gateway = Arc::new(MockGateway::never_paid().with_failing_expiry());
    let store = Arc::new(InMemoryStatusStore::new());

    let session = engine(&gateway, &store).start(tx001()).await.unwrap();
    assert_eq!(session.resolved().await, SessionState::Expired);
    settle().await;

    assert_eq!(gateway.expiries(), 1);
    assert_eq!(store.get("TX-001").await.unwrap(), Some(PaymentStatus::Expired));
}

#[tokio::test(start_paused = true)]
async fn test_remount_after_success_does_not_poll() {
    let store = Arc::new(InMemoryStatusStore::new());

    let first_gateway = Arc::new(MockGateway::paid_on(2));
    let first = engine(&first_gateway, &store).start(tx001()).await.unwrap();
    assert_eq!(first.resolved().await, SessionState::Success);
    settle().await;
    first.teardown(true);

    let second_gateway = Arc::new(MockGateway::never_paid());
    let second = engine(&second_gateway, &store).start(tx001()).await.unwrap();
    assert_eq!(
        second.state(),
        SessionState::AlreadyResolved(TerminalStatus::Success)
    );

    let view = second.view();
    assert!(view.qr_url().is_none());
    match view {
        ConfirmationView::Confirmed {
            already_resolved, ..
        } => assert!(already_resolved),
        other => panic!("unexpected view: {:?}", other),
    }

    sleep(Duration::from_secs(90)).await;
    assert_eq!(second_gateway.polls(), 0);
    assert_eq!(second_gateway.expiries(), 0);
    assert_eq!(store.get("TX-001").await.unwrap(), Some(PaymentStatus::Success));
}

#[tokio::test(start_paused = true)]
async fn test_remount_after_expiry_does_not_poll() {
    let store = Arc::new(InMemoryStatusStore::new());
    store.set("TX-001", TerminalStatus::Expired).await.unwrap();

    let gateway = Arc::new(MockGateway::paid_on(1));
    let session = engine(&gateway, &store).start(tx001()).await.unwrap();
    assert_eq!(
        session.resolved().await,
        SessionState::AlreadyResolved(TerminalStatus::Expired)
    );

    sleep(Duration::from_secs(90)).await;
    assert_eq!(gateway.polls(), 0);
    assert_eq!(gateway.expiries(), 0);
    assert!(matches!(
        session.view(),
        ConfirmationView::Expired {
            already_resolved: true,
            ..
        }
    ));
}

#[tokio::test(start_paused = true)]
async fn test_pending_literal_in_store_is_not_resolved() {
    let store = Arc::new(InMemoryStatusStore::new());
    store.insert_raw("payment_status_TX-001", "pending").await;

    let gateway = Arc::new(MockGateway::paid_on(1));
    let session = engine(&gateway, &store).start(tx001()).await.unwrap();
    assert_eq!(session.state(), SessionState::Pending);
    assert_eq!(session.resolved().await, SessionState::Success);
    settle().await;
    assert_eq!(store.get("TX-001").await.unwrap(), Some(PaymentStatus::Success));
}

#[tokio::test(start_paused = true)]
async fn test_teardown_before_first_tick_leaves_no_trace() {
    let gateway = Arc::new(MockGateway::paid_on(1));
    let store = Arc::new(InMemoryStatusStore::new());

    let session = engine(&gateway, &store).start(tx001()).await.unwrap();
    let state_rx = session.subscribe();
    session.teardown(false);

    sleep(Duration::from_secs(120)).await;
    assert_eq!(gateway.polls(), 0);
    assert_eq!(gateway.expiries(), 0);
    assert!(store.is_empty().await);
    assert_eq!(*state_rx.borrow(), SessionState::Pending);
}

#[tokio::test(start_paused = true)]
async fn test_dropping_session_cancels_worker() {
    let gateway = Arc::new(MockGateway::never_paid());
    let store = Arc::new(InMemoryStatusStore::new());

    let session = engine(&gateway, &store).start(tx001()).await.unwrap();
    sleep(Duration::from_secs(10)).await;
    let polls = gateway.polls();
    assert_eq!(polls, 4);
    drop(session);

    sleep(Duration::from_secs(120)).await;
    assert_eq!(gateway.polls(), polls);
    assert_eq!(gateway.expiries(), 0);
    assert!(store.is_empty().await);
}

#[tokio::test(start_paused = true)]
async fn test_abandoning_pending_payment_expires_it() {
    let gateway = Arc::new(MockGateway::never_paid());
    let store = Arc::new(InMemoryStatusStore::new());

    let session = engine(&gateway, &store).start(tx001()).await.unwrap();
    sleep(Duration::from_secs(10)).await;
    let state_rx = session.subscribe();
    session.teardown(true);

    assert_eq!(*state_rx.borrow(), SessionState::Expired);
    settle().await;
    assert_eq!(gateway.expiries(), 1);
    assert_eq!(store.get("TX-001").await.unwrap(), Some(PaymentStatus::Expired));

    // The deadline watcher went away with the worker
    sleep(Duration::from_secs(120)).await;
    assert_eq!(gateway.polls(), 4);
    assert_eq!(gateway.expiries(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_abandoning_resolved_payment_changes_nothing() {
    let gateway = Arc::new(MockGateway::paid_on(1));
    let store = Arc::new(InMemoryStatusStore::new());

    let session = engine(&gateway, &store).start(tx001()).await.unwrap();
    assert_eq!(session.resolved().await, SessionState::Success);
    settle().await;
    session.teardown(true);

    settle().await;
    assert_eq!(gateway.expiries(), 0);
    assert_eq!(store.get("TX-001").await.unwrap(), Some(PaymentStatus::Success));
}

#[tokio::test(start_paused = true)]
async fn test_adopts_outcome_recorded_by_another_session() {
    let gateway = Arc::new(MockGateway::paid_on(3));
    let store = Arc::new(InMemoryStatusStore::new());

    let session = engine(&gateway, &store).start(tx001()).await.unwrap();
    sleep(Duration::from_secs(1)).await;
    // A second tab expired the payment while this one kept polling
    store.set("TX-001", TerminalStatus::Expired).await.unwrap();

    assert_eq!(session.resolved().await, SessionState::Expired);
    settle().await;
    assert_eq!(gateway.polls(), 3);
    assert_eq!(gateway.expiries(), 0);
    assert_eq!(store.get("TX-001").await.unwrap(), Some(PaymentStatus::Expired));
}

#[tokio::test]
async fn test_store_refuses_to_overturn_terminal_value() {
    let store = InMemoryStatusStore::new();

    assert_eq!(
        store.set("TX-1", TerminalStatus::Success).await.unwrap(),
        WriteOutcome::Written
    );
    assert_eq!(
        store.set("TX-1", TerminalStatus::Expired).await.unwrap(),
        WriteOutcome::Conflict {
            existing: TerminalStatus::Success
        }
    );
    assert_eq!(store.get("TX-1").await.unwrap(), Some(PaymentStatus::Success));

    store.set("TX-2", TerminalStatus::Expired).await.unwrap();
    assert_eq!(
        store.set("TX-2", TerminalStatus::Success).await.unwrap(),
        WriteOutcome::Conflict {
            existing: TerminalStatus::Expired
        }
    );
    assert_eq!(store.get("TX-2").await.unwrap(), Some(PaymentStatus::Expired));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_worker_without_writing() {
    let gateway = Arc::new(MockGateway::never_paid());
    let store = Arc::new(InMemoryStatusStore::new());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let session = engine(&gateway, &store)
        .with_shutdown(shutdown_rx)
        .start(tx001())
        .await
        .unwrap();
    sleep(Duration::from_secs(5)).await;
    assert_eq!(gateway.polls(), 2);

    shutdown_tx.send(true).unwrap();
    sleep(Duration::from_secs(120)).await;

    assert_eq!(gateway.polls(), 2);
    assert_eq!(gateway.expiries(), 0);
    assert_eq!(session.state(), SessionState::Pending);
    assert!(store.is_empty().await);
}

#[tokio::test(start_paused = true)]
async fn test_pending_view_counts_down() {
    let gateway = Arc::new(MockGateway::never_paid());
    let store = Arc::new(InMemoryStatusStore::new());

    let session = engine(&gateway, &store).start(tx001()).await.unwrap();
    match session.view() {
        ConfirmationView::AwaitingTransfer(details) => {
            assert_eq!(
                details.qr_url,
                "https://qr.sepay.vn/img?acc=0123456789&bank=TPB&amount=150000&des=TX-001"
            );
            assert_eq!(details.amount, 150000);
            assert_eq!(details.amount_display, "150.000 ₫");
            assert_eq!(details.remaining_secs, 60);
            assert_eq!(details.remaining_display, "01:00");
        }
        other => panic!("unexpected view: {:?}", other),
    }

    sleep(Duration::from_secs(15)).await;
    match session.view() {
        ConfirmationView::AwaitingTransfer(details) => {
            assert_eq!(details.remaining_secs, 45);
            assert_eq!(details.remaining_display, "00:45");
        }
        other => panic!("unexpected view: {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_invalid_parameters_never_start_a_worker() {
    let gateway = Arc::new(MockGateway::paid_on(1));
    let store = Arc::new(InMemoryStatusStore::new());
    let params = PaymentParameters {
        transaction_code: "   ".to_string(),
        ..tx001()
    };

    let err = engine(&gateway, &store).start(params).await.unwrap_err();
    assert!(matches!(err, ConfirmationError::InvalidParameters(_)));
    assert!(err.is_fatal());

    sleep(Duration::from_secs(10)).await;
    assert_eq!(gateway.polls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_oversized_payment_window_is_capped() {
    let gateway = Arc::new(MockGateway::never_paid());
    let store = Arc::new(InMemoryStatusStore::new());
    let config = ConfirmationConfig {
        payment_timeout: Duration::MAX,
        ..ConfirmationConfig::default()
    };

    let session = PaymentConfirmation::new(gateway.clone(), store.clone(), config)
        .start(tx001())
        .await
        .unwrap();
    assert_eq!(session.state(), SessionState::Pending);
    assert_eq!(
        session.remaining(),
        payconfirm::config::MAX_PAYMENT_TIMEOUT
    );
    session.teardown(false);
}
