use engine::{
    CommissionRate, Currency, Engine, EngineError, EntryKind, EntryStatus, PoolSettings, pool,
};
use migration::MigratorTrait;

async fn engine_with_db() -> Engine {
    let settings = PoolSettings {
        max_connections: 1,
        acquire_timeout_secs: 5,
        idle_timeout_secs: None,
    };
    let db = pool::connect("sqlite::memory:", &settings).await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    Engine::builder().database(db).build().await.unwrap()
}

#[tokio::test]
async fn unknown_user_has_empty_wallet_view() {
    let engine = engine_with_db().await;

    assert_eq!(engine.balance("ghost").await.unwrap(), 0);
    assert!(engine.wallet("ghost").await.unwrap().is_none());
    assert!(
        engine
            .transaction_history("ghost", 10)
            .await
            .unwrap()
            .is_empty()
    );
    let err = engine.verify_ledger("ghost").await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}

#[tokio::test]
async fn first_deposit_opens_wallet() {
    let engine = engine_with_db().await;

    let entry = engine.deposit("alice", 10_000, "card").await.unwrap();
    assert_eq!(entry.kind, EntryKind::Deposit);
    assert_eq!(entry.status, EntryStatus::Completed);
    assert_eq!(entry.sequence, 1);
    assert_eq!(entry.balance_before, 0);
    assert_eq!(entry.balance_after, 10_000);
    assert_eq!(entry.method.as_deref(), Some("card"));

    let wallet = engine.wallet("alice").await.unwrap().unwrap();
    assert_eq!(wallet.balance, 10_000);
    assert_eq!(wallet.version, 1);
    assert_eq!(wallet.currency, Currency::Try);
    assert!(wallet.is_active);
    assert_eq!(entry.wallet_id, wallet.id);
}

#[tokio::test]
async fn open_wallet_is_idempotent() {
    let engine = engine_with_db().await;

    let first = engine.open_wallet("alice").await.unwrap();
    engine.deposit("alice", 500, "card").await.unwrap();
    let second = engine.open_wallet("alice").await.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(first.balance, 0);
    assert_eq!(second.balance, 500);

    let err = engine.open_wallet("  ").await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)));
}

#[tokio::test]
async fn amounts_must_be_positive() {
    let engine = engine_with_db().await;

    for amount in [0, -100] {
        let err = engine.deposit("alice", amount, "card").await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
        let err = engine.withdraw("alice", amount, "payout").await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }
    assert!(engine.wallet("alice").await.unwrap().is_none());
}

#[tokio::test]
async fn withdraw_cannot_overdraw() {
    let engine = engine_with_db().await;

    engine.deposit("alice", 10_000, "card").await.unwrap();
    let entry = engine.withdraw("alice", 3_000, "payout").await.unwrap();
    assert_eq!(entry.balance_before, 10_000);
    assert_eq!(entry.balance_after, 7_000);
    assert_eq!(engine.balance("alice").await.unwrap(), 7_000);

    let err = engine.withdraw("alice", 8_000, "payout").await.unwrap_err();
    assert!(matches!(err, EngineError::InsufficientFunds(_)));

    // The failed debit left no trace.
    assert_eq!(engine.balance("alice").await.unwrap(), 7_000);
    let history = engine.transaction_history("alice", 10).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(engine.wallet("alice").await.unwrap().unwrap().version, 2);
}

#[tokio::test]
async fn debit_without_wallet_is_insufficient_funds() {
    let engine = engine_with_db().await;

    let err = engine.payment("bob", 1, "order").await.unwrap_err();
    assert!(matches!(err, EngineError::InsufficientFunds(_)));
    assert!(engine.wallet("bob").await.unwrap().is_none());
}

#[tokio::test]
async fn credits_and_debits_of_every_kind() {
    let engine = engine_with_db().await;

    engine.deposit("alice", 10_000, "card").await.unwrap();
    engine.bonus("alice", 1_500, "welcome").await.unwrap();
    engine.payment("alice", 2_000, "insurance").await.unwrap();
    engine.refund("alice", 500, "insurance partial").await.unwrap();
    engine.withdraw("alice", 4_000, "payout").await.unwrap();

    assert_eq!(engine.balance("alice").await.unwrap(), 6_000);

    let history = engine.transaction_history("alice", 10).await.unwrap();
    assert_eq!(
        history.iter().map(|e| e.kind).collect::<Vec<_>>(),
        vec![
            EntryKind::Withdrawal,
            EntryKind::Refund,
            EntryKind::Payment,
            EntryKind::Bonus,
            EntryKind::Deposit,
        ]
    );
    assert_eq!(
        history.iter().map(|e| e.sequence).collect::<Vec<_>>(),
        vec![5, 4, 3, 2, 1]
    );
    assert!(history.iter().all(|e| e.is_balanced()));
    // Each entry starts where the previous one ended.
    for pair in history.windows(2) {
        assert_eq!(pair[0].balance_before, pair[1].balance_after);
    }
}

#[tokio::test]
async fn history_respects_limit() {
    let engine = engine_with_db().await;
    for _ in 0..5 {
        engine.deposit("alice", 100, "card").await.unwrap();
    }

    let history = engine.transaction_history("alice", 2).await.unwrap();
    assert_eq!(
        history.iter().map(|e| e.sequence).collect::<Vec<_>>(),
        vec![5, 4]
    );

    let err = engine.transaction_history("alice", 0).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)));
}

#[tokio::test]
async fn deduct_commission_scenario() {
    let engine = engine_with_db().await;
    engine.deposit("carrier", 5_000, "card").await.unwrap();

    // 1000.00 at 1% -> 10.00
    let entry = engine
        .deduct_commission("carrier", 100_000, CommissionRate::DEFAULT)
        .await
        .unwrap();
    assert_eq!(entry.kind, EntryKind::Commission);
    assert_eq!(entry.amount_minor, 1_000);
    assert_eq!(engine.balance("carrier").await.unwrap(), 4_000);

    // 0.49 at 1% rounds to zero
    let err = engine
        .deduct_commission("carrier", 49, CommissionRate::DEFAULT)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)));

    let err = engine
        .deduct_commission("carrier", 10_000_000, CommissionRate::DEFAULT)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InsufficientFunds(_)));
    assert_eq!(engine.balance("carrier").await.unwrap(), 4_000);
}

#[tokio::test]
async fn frozen_wallet_rejects_postings() {
    let engine = engine_with_db().await;
    engine.deposit("alice", 1_000, "card").await.unwrap();

    engine.set_wallet_active("alice", false).await.unwrap();
    let err = engine.deposit("alice", 1_000, "card").await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));
    let err = engine.withdraw("alice", 100, "payout").await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));
    assert_eq!(engine.balance("alice").await.unwrap(), 1_000);

    engine.set_wallet_active("alice", true).await.unwrap();
    engine.withdraw("alice", 100, "payout").await.unwrap();
    assert_eq!(engine.balance("alice").await.unwrap(), 900);

    let err = engine.set_wallet_active("nobody", false).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}

#[tokio::test]
async fn ledger_replay_matches_balance() {
    let engine = engine_with_db().await;
    engine.deposit("alice", 20_000, "bank").await.unwrap();
    engine.withdraw("alice", 3_333, "payout").await.unwrap();
    engine.bonus("alice", 1, "rounding").await.unwrap();
    engine
        .deduct_commission("alice", 12_345, "0.025".parse().unwrap())
        .await
        .unwrap();

    let report = engine.verify_ledger("alice").await.unwrap();
    assert!(report.is_consistent());
    assert_eq!(report.entries, 4);
    assert_eq!(report.stored_balance, 20_000 - 3_333 + 1 - 309);
    assert_eq!(report.replayed_balance, report.stored_balance);
}

#[tokio::test]
async fn credit_past_i64_max_is_rejected() {
    let engine = engine_with_db().await;
    engine.deposit("alice", i64::MAX - 10, "bank").await.unwrap();

    let err = engine.bonus("alice", 11, "overflow").await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)));
    assert_eq!(err.http_status(), 400);
    assert_eq!(engine.balance("alice").await.unwrap(), i64::MAX - 10);

    engine.bonus("alice", 10, "to the brim").await.unwrap();
    assert_eq!(engine.balance("alice").await.unwrap(), i64::MAX);
    assert!(engine.verify_ledger("alice").await.unwrap().is_consistent());
}
