use chrono::{Duration, Utc};
use sea_orm::{DatabaseConnection, TransactionTrait};
use tempfile::TempDir;
use tokio::task::JoinSet;

use engine::{
    CreateShipmentCmd, Engine, EngineError, OfferStatus, PoolSettings, ShipmentStatus,
    SubmitOfferCmd, pool,
};
use migration::MigratorTrait;

async fn engine_with_pool(settings: PoolSettings, read_retries: u32) -> (Engine, DatabaseConnection) {
    let db = pool::connect("sqlite::memory:", &settings).await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder()
        .database(db.clone())
        .read_retries(read_retries)
        .build()
        .await
        .unwrap();
    (engine, db)
}

fn single_connection() -> PoolSettings {
    PoolSettings {
        max_connections: 1,
        acquire_timeout_secs: 10,
        idle_timeout_secs: None,
    }
}

/// Engine on an on-disk database behind the default multi-connection pool, so
/// racing operations hold separate connections. Keep the `TempDir` alive.
async fn file_engine() -> (Engine, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("nakliye.db").display());
    let settings = PoolSettings::default();
    assert!(settings.max_connections > 1);
    let db = pool::connect(&url, &settings).await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder().database(db).build().await.unwrap();
    (engine, dir)
}

#[tokio::test]
async fn racing_acceptances_have_one_winner() {
    let (engine, _db) = engine_with_pool(single_connection(), 3).await;
    let shipment_id = engine
        .create_shipment(CreateShipmentCmd::new("alice", "Bursa", "Konya", 5_000, 80_000))
        .await
        .unwrap();
    for carrier in ["carrier-1", "carrier-2"] {
        engine.deposit(carrier, 10_000, "card").await.unwrap();
    }
    let eta = Utc::now() + Duration::days(1);
    let first = engine
        .submit_offer(SubmitOfferCmd::new(shipment_id, "carrier-1", 75_000, eta))
        .await
        .unwrap();
    let second = engine
        .submit_offer(SubmitOfferCmd::new(shipment_id, "carrier-2", 70_000, eta))
        .await
        .unwrap();

    let (a, b) = tokio::join!(
        engine.accept_offer(first, "alice"),
        engine.accept_offer(second, "alice")
    );

    let results = [a, b];
    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);
    assert!(
        results
            .iter()
            .any(|r| matches!(r, Err(EngineError::AlreadyAccepted(_))))
    );

    let offers = engine.list_offers(shipment_id).await.unwrap();
    assert_eq!(
        offers
            .iter()
            .filter(|o| o.status == OfferStatus::Accepted)
            .count(),
        1
    );
    assert_eq!(
        engine.shipment(shipment_id).await.unwrap().status,
        ShipmentStatus::Accepted
    );

    // Only the winning carrier paid commission.
    let total = engine.balance("carrier-1").await.unwrap() + engine.balance("carrier-2").await.unwrap();
    let agreement = engine
        .agreement_for_shipment(shipment_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(total, 20_000 - agreement.commission_minor);
}

#[tokio::test]
async fn accepting_the_same_offer_twice_concurrently() {
    let (engine, _db) = engine_with_pool(single_connection(), 3).await;
    let shipment_id = engine
        .create_shipment(CreateShipmentCmd::new("alice", "Bursa", "Konya", 5_000, 80_000))
        .await
        .unwrap();
    engine.deposit("carrier-1", 10_000, "card").await.unwrap();
    let offer_id = engine
        .submit_offer(SubmitOfferCmd::new(
            shipment_id,
            "carrier-1",
            75_000,
            Utc::now() + Duration::days(1),
        ))
        .await
        .unwrap();

    let (a, b) = tokio::join!(
        engine.accept_offer(offer_id, "alice"),
        engine.accept_offer(offer_id, "alice")
    );
    assert_eq!([&a, &b].iter().filter(|r| r.is_ok()).count(), 1);
    assert!(
        [a, b]
            .iter()
            .any(|r| matches!(r, Err(EngineError::AlreadyAccepted(_))))
    );
    assert_eq!(engine.balance("carrier-1").await.unwrap(), 10_000 - 750);
}

#[tokio::test]
async fn concurrent_debits_never_overdraw() {
    let (engine, _db) = engine_with_pool(single_connection(), 3).await;
    engine.deposit("alice", 10_000, "card").await.unwrap();

    let (a, b) = tokio::join!(
        engine.withdraw("alice", 6_000, "payout"),
        engine.withdraw("alice", 6_000, "payout")
    );

    let results = [a, b];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(
        results
            .iter()
            .any(|r| matches!(r, Err(EngineError::InsufficientFunds(_))))
    );
    assert_eq!(engine.balance("alice").await.unwrap(), 4_000);
    assert!(engine.verify_ledger("alice").await.unwrap().is_consistent());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_deposits_get_distinct_sequences() {
    let (engine, _db) = engine_with_pool(single_connection(), 3).await;
    engine.open_wallet("alice").await.unwrap();

    let mut tasks = JoinSet::new();
    for _ in 0..10 {
        let engine = engine.clone();
        tasks.spawn(async move { engine.deposit("alice", 100, "card").await });
    }
    while let Some(joined) = tasks.join_next().await {
        joined.unwrap().unwrap();
    }

    assert_eq!(engine.balance("alice").await.unwrap(), 1_000);
    let mut sequences: Vec<_> = engine
        .transaction_history("alice", 100)
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.sequence)
        .collect();
    sequences.sort_unstable();
    assert_eq!(sequences, (1..=10).collect::<Vec<i64>>());
    assert!(engine.verify_ledger("alice").await.unwrap().is_consistent());
}

#[tokio::test]
async fn exhausted_pool_reports_resource_exhausted() {
    let settings = PoolSettings {
        max_connections: 1,
        acquire_timeout_secs: 1,
        idle_timeout_secs: None,
    };
    let (engine, db) = engine_with_pool(settings, 1).await;
    engine.deposit("alice", 100, "card").await.unwrap();

    let held = db.begin().await.unwrap();

    let err = engine.balance("alice").await.unwrap_err();
    assert!(matches!(err, EngineError::ResourceExhausted(_)));
    assert_eq!(err.http_status(), 503);
    let err = engine.deposit("alice", 100, "card").await.unwrap_err();
    assert!(matches!(err, EngineError::ResourceExhausted(_)));

    held.rollback().await.unwrap();

    // The handle went back to the pool.
    assert_eq!(engine.balance("alice").await.unwrap(), 100);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_acceptances_on_file_database() {
    let (engine, _dir) = file_engine().await;

    for round in 0..5 {
        let shipment_id = engine
            .create_shipment(CreateShipmentCmd::new("alice", "Bursa", "Konya", 5_000, 80_000))
            .await
            .unwrap();
        let eta = Utc::now() + Duration::days(1);
        let mut offer_ids = Vec::new();
        for n in 0..4 {
            let carrier = format!("carrier-{round}-{n}");
            engine.deposit(&carrier, 10_000, "card").await.unwrap();
            offer_ids.push(
                engine
                    .submit_offer(SubmitOfferCmd::new(shipment_id, &carrier, 70_000, eta))
                    .await
                    .unwrap(),
            );
        }

        let mut tasks = JoinSet::new();
        for offer_id in offer_ids {
            let engine = engine.clone();
            tasks.spawn(async move { engine.accept_offer(offer_id, "alice").await });
        }
        let mut winners = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined.unwrap() {
                Ok(_) => winners += 1,
                Err(err) => assert!(
                    matches!(err, EngineError::AlreadyAccepted(_)),
                    "unexpected error: {err:?}"
                ),
            }
        }
        assert_eq!(winners, 1);

        let accepted = engine
            .list_offers(shipment_id)
            .await
            .unwrap()
            .into_iter()
            .filter(|o| o.status == OfferStatus::Accepted)
            .count();
        assert_eq!(accepted, 1);
        for n in 0..4 {
            let carrier = format!("carrier-{round}-{n}");
            assert!(engine.verify_ledger(&carrier).await.unwrap().is_consistent());
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_withdrawals_on_file_database() {
    let (engine, _dir) = file_engine().await;
    engine.deposit("alice", 10_000, "card").await.unwrap();

    let mut tasks = JoinSet::new();
    for _ in 0..4 {
        let engine = engine.clone();
        tasks.spawn(async move { engine.withdraw("alice", 6_000, "payout").await });
    }
    let mut winners = 0;
    while let Some(joined) = tasks.join_next().await {
        match joined.unwrap() {
            Ok(_) => winners += 1,
            Err(err) => assert!(
                matches!(err, EngineError::InsufficientFunds(_)),
                "unexpected error: {err:?}"
            ),
        }
    }

    assert_eq!(winners, 1);
    assert_eq!(engine.balance("alice").await.unwrap(), 4_000);
    assert!(engine.verify_ledger("alice").await.unwrap().is_consistent());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_deposits_on_file_database() {
    let (engine, _dir) = file_engine().await;

    // No wallet yet: the racers also compete to open it.
    let mut tasks = JoinSet::new();
    for _ in 0..20 {
        let engine = engine.clone();
        tasks.spawn(async move { engine.deposit("alice", 100, "card").await });
    }
    while let Some(joined) = tasks.join_next().await {
        joined.unwrap().unwrap();
    }

    assert_eq!(engine.balance("alice").await.unwrap(), 2_000);
    let mut sequences: Vec<_> = engine
        .transaction_history("alice", 100)
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.sequence)
        .collect();
    sequences.sort_unstable();
    assert_eq!(sequences, (1..=20).collect::<Vec<i64>>());
    assert!(engine.verify_ledger("alice").await.unwrap().is_consistent());
}
