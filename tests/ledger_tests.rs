//! Exposure ledger behaviour against the shared store

mod support;

use periodiq::{
    games::{split_key, GameType},
    ledger::Bet,
    PeriodiqConfig, RawBet, RecordOutcome,
};
use rand::{seq::SliceRandom, Rng, SeedableRng};
use support::{bet, red_from_five_users, round, Cluster};

#[tokio::test]
async fn test_red_bets_split_liability_by_outcome() {
    let cluster = Cluster::new();
    let engine = cluster.engine("w1", PeriodiqConfig::for_testing());
    let round = round(GameType::Wingo, 1);

    red_from_five_users(&engine, &round).await;

    let snapshot = engine.ledger.snapshot(&round).await.unwrap();
    assert_eq!(snapshot.bet_count, 5);
    assert_eq!(snapshot.distinct_bettors, 5);
    assert!((snapshot.gross_volume - 100.0).abs() < 1e-9);
    assert!((snapshot.net_volume - 98.0).abs() < 1e-9);

    for digit in [2u32, 4, 6, 8] {
        let liability = engine.ledger.get_liability(&round, digit).await.unwrap();
        assert!((liability - 196.0).abs() < 1e-6, "digit {} = {}", digit, liability);
    }
    assert!((engine.ledger.get_liability(&round, 0).await.unwrap() - 147.0).abs() < 1e-6);
    for digit in [1u32, 3, 5, 7, 9] {
        assert_eq!(engine.ledger.get_liability(&round, digit).await.unwrap(), 0.0);
    }

    let dashboard = engine.ledger.liability_snapshot(&round).await.unwrap();
    assert_eq!(dashboard.len(), 10);
    assert!((dashboard["0"] - 147.0).abs() < 1e-6);
}

#[tokio::test]
async fn test_large_space_liability_matches_bet_by_bet_total() {
    let cluster = Cluster::new();
    let engine = cluster.engine("w1", PeriodiqConfig::for_testing());
    let round = round(GameType::FiveD, 1);
    let space = engine.spaces.get(GameType::FiveD).unwrap();
    assert!(space.is_large());

    let mut rng = rand::rngs::StdRng::seed_from_u64(7);
    let keys = space.rules().all_keys();
    let mut bets = Vec::new();
    for n in 0..60 {
        let key = keys.choose(&mut rng).unwrap().to_string();
        let (bet_type, bet_value) = split_key(&key).unwrap();
        let raw = RawBet::new(&format!("user-{}", n % 7), bet_type, bet_value, rng.gen_range(1..100) as f64);
        assert_eq!(engine.ledger.record_bet(&round, &raw).await.unwrap(), RecordOutcome::Recorded);
        bets.push(Bet::normalize(&raw, &round, space.rules().as_ref(), engine.config.ledger.fee_rate).unwrap());
    }

    let snapshot = engine.ledger.snapshot(&round).await.unwrap();
    assert_eq!(snapshot.bet_count, 60);
    assert_eq!(snapshot.distinct_bettors, 7);

    let gross: f64 = bets.iter().map(|b| b.gross_amount).sum();
    let net: f64 = bets.iter().map(|b| b.net_amount).sum();
    let fees: f64 = bets.iter().map(|b| b.platform_fee_amount).sum();
    assert!((snapshot.gross_volume - gross).abs() < 1e-6);
    assert!((snapshot.net_volume - net).abs() < 1e-6);
    assert!((gross - net - fees).abs() < 1e-6);

    for index in space.sample(200, &mut rng) {
        let outcome = space.outcome(index);
        let expected: f64 = bets
            .iter()
            .filter_map(|b| Some(b.net_amount * space.rules().odds(&b.key, &outcome)?))
            .sum();
        let recorded = snapshot.liability(&space, index);
        assert!(
            (recorded - expected).abs() < 1e-6,
            "outcome {} recorded {} expected {}",
            outcome.label(),
            recorded,
            expected
        );
    }
}

#[tokio::test]
async fn test_malformed_bets_are_skipped_not_fatal() {
    let cluster = Cluster::new();
    let engine = cluster.engine("w1", PeriodiqConfig::for_testing());
    let round = round(GameType::K3, 1);

    let bad = [
        RawBet::new("u1", "sum", "19", 10.0),
        RawBet::new("u1", "colour", "red", 10.0),
        RawBet::new("u1", "size", "big", -5.0),
        RawBet::new("u1", "size", "big", 10.0).for_round("202403150099"),
    ];
    for raw in &bad {
        assert!(matches!(
            engine.ledger.record_bet(&round, raw).await.unwrap(),
            RecordOutcome::Skipped(_)
        ));
    }

    let from_json: RawBet =
        serde_json::from_str(r#"{"userId": 42, "betType": "sum", "betValue": 10, "betAmount": "50"}"#).unwrap();
    assert_eq!(engine.ledger.record_bet(&round, &from_json).await.unwrap(), RecordOutcome::Recorded);

    let snapshot = engine.ledger.snapshot(&round).await.unwrap();
    assert_eq!(snapshot.bet_count, 1);
    assert_eq!(engine.metrics.snapshot().bets_skipped, 4);
}

#[tokio::test]
async fn test_concurrent_recorders_do_not_lose_increments() {
    let cluster = Cluster::new();
    let a = cluster.engine("w1", PeriodiqConfig::for_testing());
    let b = cluster.engine("w2", PeriodiqConfig::for_testing());
    let round = round(GameType::Wingo, 2);

    let ledger_a = a.ledger.clone();
    let ledger_b = b.ledger.clone();
    let (ra, rb) = (round.clone(), round.clone());
    let first = tokio::spawn(async move {
        for n in 0..50 {
            let raw = RawBet::new(&format!("a{}", n), "number", "3", 10.0);
            ledger_a.record_bet(&ra, &raw).await.unwrap();
        }
    });
    let second = tokio::spawn(async move {
        for n in 0..50 {
            let raw = RawBet::new(&format!("b{}", n), "number", "3", 10.0);
            ledger_b.record_bet(&rb, &raw).await.unwrap();
        }
    });
    first.await.unwrap();
    second.await.unwrap();

    let snapshot = a.ledger.snapshot(&round).await.unwrap();
    assert_eq!(snapshot.bet_count, 100);
    assert_eq!(snapshot.distinct_bettors, 100);
    // 100 x 9.8 net x 9.0 odds
    assert!((snapshot.liability(&a.spaces.get(GameType::Wingo).unwrap(), 3) - 8820.0).abs() < 1e-6);
}

#[tokio::test]
async fn test_reset_clears_round() {
    let cluster = Cluster::new();
    let engine = cluster.engine("w1", PeriodiqConfig::for_testing());
    let round = round(GameType::Wingo, 3);

    engine.ledger.reset(&round).await.unwrap();
    bet(&engine, &round, "u1", "size:big", 10.0).await;
    assert!(engine.ledger.snapshot(&round).await.unwrap().has_bets());

    engine.ledger.reset(&round).await.unwrap();
    let snapshot = engine.ledger.snapshot(&round).await.unwrap();
    assert!(!snapshot.has_bets());
    assert_eq!(snapshot.distinct_bettors, 0);
    assert!(cluster.store.is_empty());
}

#[tokio::test]
async fn test_store_outage_surfaces_as_error() {
    let cluster = Cluster::new();
    let engine = cluster.engine("w1", PeriodiqConfig::for_testing());
    let round = round(GameType::Wingo, 4);

    cluster.store.fail_next(1);
    let raw = RawBet::new("u1", "number", "1", 10.0);
    let err = engine.ledger.record_bet(&round, &raw).await.unwrap_err();
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_retried_bet_is_counted_once() {
    let cluster = Cluster::new();
    let mut config = PeriodiqConfig::for_testing();
    config.ledger.incremental_index = true;
    let engine = cluster.engine("w1", config);
    let round = round(GameType::Wingo, 5);
    let raw = RawBet::new("u1", "number", "3", 100.0);

    cluster.store.fail_next(1);
    assert!(engine.ledger.record_bet(&round, &raw).await.is_err());
    assert_eq!(engine.ledger.record_bet(&round, &raw).await.unwrap(), RecordOutcome::Recorded);

    let snapshot = engine.ledger.snapshot(&round).await.unwrap();
    assert_eq!(snapshot.bet_count, 1);
    assert_eq!(snapshot.distinct_bettors, 1);
    // 98 net x 9.0 odds
    assert!((engine.ledger.get_liability(&round, 3).await.unwrap() - 882.0).abs() < 1e-6);

    // the index absorbed only the successful write and still agrees with the store
    let mut rng = rand::rngs::StdRng::seed_from_u64(3);
    let (index, liability) = engine
        .ledger
        .index()
        .consistent_minimum(&round, snapshot.bet_count, &mut rng)
        .unwrap();
    assert_ne!(index, 3);
    assert_eq!(liability, 0.0);
}
