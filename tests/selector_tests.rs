//! Strategy selection and protection over recorded exposure

mod support;

use periodiq::{
    config::{ParallelConfig, ProtectionConfig},
    games::{split_key, GameType},
    metrics::EngineMetrics,
    protection::ProtectionPolicy,
    selector::ParallelEvaluator,
    OutcomeSelector, PeriodiqConfig, RawBet, StrategyKind,
};
use rand::{seq::SliceRandom, Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use support::{bet, red_from_five_users, round, Cluster};

#[tokio::test]
async fn test_selector_avoids_red_digits() {
    let cluster = Cluster::new();
    let engine = cluster.engine("w1", PeriodiqConfig::for_testing());
    let round = round(GameType::Wingo, 10);
    red_from_five_users(&engine, &round).await;

    let space = engine.spaces.get(GameType::Wingo).unwrap();
    let snapshot = Arc::new(engine.ledger.snapshot(&round).await.unwrap());
    let selector = OutcomeSelector::new(
        engine.config.selector.clone(),
        &engine.config.parallel,
        engine.metrics.clone(),
    );

    for _ in 0..50 {
        let selection = selector.select(space.clone(), snapshot.clone()).await.unwrap();
        let digit = space.outcome(selection.index).values()[0];
        assert!([1, 3, 5, 7, 9].contains(&digit), "picked {}", digit);
        assert_eq!(selection.liability, 0.0);
        assert_eq!(selection.strategy, StrategyKind::FullScan);
    }
}

#[tokio::test]
async fn test_protection_is_uniform_over_zero_liability_set() {
    let cluster = Cluster::new();
    let engine = cluster.engine("w1", PeriodiqConfig::for_testing());
    let round = round(GameType::Wingo, 11);
    bet(&engine, &round, "solo", "color:red", 100.0).await;

    let space = engine.spaces.get(GameType::Wingo).unwrap();
    let snapshot = engine.ledger.snapshot(&round).await.unwrap();
    let policy = ProtectionPolicy::new(engine.config.protection.clone());
    assert!(policy.applies(&snapshot));

    let trials = 2_000;
    let mut counts: HashMap<u8, u32> = HashMap::new();
    for _ in 0..trials {
        let decision = policy.decide(&space, &snapshot).unwrap();
        assert!(decision.is_zero_liability());
        *counts.entry(space.outcome(decision.index).values()[0]).or_default() += 1;
    }

    let mut digits: Vec<_> = counts.keys().copied().collect();
    digits.sort();
    assert_eq!(digits, vec![1, 3, 5, 7, 9]);
    for (digit, count) in counts {
        // expected 400 each, sigma ~18
        assert!((300..=500).contains(&count), "digit {} drawn {} times", digit, count);
    }
}

#[tokio::test]
async fn test_protection_threshold() {
    let cluster = Cluster::new();
    let engine = cluster.engine("w1", PeriodiqConfig::for_testing());
    let space = engine.spaces.get(GameType::Wingo).unwrap();
    let policy = ProtectionPolicy::new(ProtectionConfig {
        min_distinct_bettors: 3,
        ..ProtectionConfig::default()
    });

    let empty = round(GameType::Wingo, 12);
    assert!(!policy.applies(&engine.ledger.snapshot(&empty).await.unwrap()));

    let two = round(GameType::Wingo, 13);
    bet(&engine, &two, "a", "number:1", 10.0).await;
    bet(&engine, &two, "b", "number:2", 10.0).await;
    let snapshot = engine.ledger.snapshot(&two).await.unwrap();
    assert!(policy.applies(&snapshot));
    let decision = policy.decide(&space, &snapshot).unwrap();
    assert!(![1u8, 2].contains(&space.outcome(decision.index).values()[0]));

    bet(&engine, &two, "c", "number:3", 10.0).await;
    assert!(!policy.applies(&engine.ledger.snapshot(&two).await.unwrap()));
}

#[tokio::test]
async fn test_protection_on_large_space_avoids_heavy_sides() {
    let cluster = Cluster::new();
    let engine = cluster.engine("w1", PeriodiqConfig::for_testing());
    let round = round(GameType::FiveD, 14);
    bet(&engine, &round, "solo", "A:big", 500.0).await;
    bet(&engine, &round, "solo", "sum:odd", 300.0).await;
    bet(&engine, &round, "solo", "C:7", 50.0).await;

    let space = engine.spaces.get(GameType::FiveD).unwrap();
    let snapshot = engine.ledger.snapshot(&round).await.unwrap();
    let decision = ProtectionPolicy::new(engine.config.protection.clone())
        .decide(&space, &snapshot)
        .unwrap();

    assert!(decision.is_zero_liability());
    assert_eq!(decision.batches, 1);
    let outcome = space.outcome(decision.index);
    assert!(outcome.values()[0] <= 4);
    assert_eq!(outcome.sum() % 2, 0);
    assert_ne!(outcome.values()[2], 7);
}

#[tokio::test]
async fn test_no_bets_on_large_space_short_circuits() {
    let cluster = Cluster::new();
    let engine = cluster.engine("w1", PeriodiqConfig::for_testing());
    let round = round(GameType::FiveD, 15);
    let space = engine.spaces.get(GameType::FiveD).unwrap();
    let snapshot = Arc::new(engine.ledger.snapshot(&round).await.unwrap());

    let selector = OutcomeSelector::new(
        engine.config.selector.clone(),
        &engine.config.parallel,
        engine.metrics.clone(),
    );
    assert_eq!(selector.plan(&space, &snapshot), vec![StrategyKind::NoExposure]);

    let started = Instant::now();
    let selection = selector.select(space.clone(), snapshot).await.unwrap();
    assert!(started.elapsed() < Duration::from_millis(100));
    assert_eq!(selection.strategy, StrategyKind::NoExposure);
    assert_eq!(selection.liability, 0.0);
    assert!(selection.index < space.len());
}

#[tokio::test]
async fn test_plan_follows_volume() {
    let cluster = Cluster::new();
    let engine = cluster.engine("w1", PeriodiqConfig::for_testing());
    let space = engine.spaces.get(GameType::FiveD).unwrap();
    let selector = OutcomeSelector::new(
        engine.config.selector.clone(),
        &engine.config.parallel,
        Arc::new(EngineMetrics::new()),
    );
    let mut snapshot = engine.ledger.snapshot(&round(GameType::FiveD, 16)).await.unwrap();

    snapshot.bet_count = 50;
    assert_eq!(selector.plan(&space, &snapshot), vec![StrategyKind::FullScan]);

    snapshot.bet_count = 500;
    assert_eq!(
        selector.plan(&space, &snapshot),
        vec![StrategyKind::Parallel, StrategyKind::SmartSampling, StrategyKind::FullScan]
    );

    snapshot.bet_count = 5_000;
    assert_eq!(
        selector.plan(&space, &snapshot),
        vec![StrategyKind::Parallel, StrategyKind::StatisticalSampling, StrategyKind::FullScan]
    );

    let wingo = engine.spaces.get(GameType::Wingo).unwrap();
    assert_eq!(selector.plan(&wingo, &snapshot), vec![StrategyKind::FullScan]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_full_scan_and_parallel_agree() {
    let cluster = Cluster::new();
    let mut config = PeriodiqConfig::for_testing();
    config.selector.full_scan_sample_limit = 100_000;
    config.parallel.enabled = false;
    let engine = cluster.engine("w1", config);
    let round = round(GameType::FiveD, 17);
    let space = engine.spaces.get(GameType::FiveD).unwrap();

    let mut rng = rand::rngs::StdRng::seed_from_u64(11);
    let keys = space.rules().all_keys();
    for n in 0..80 {
        let key = keys.choose(&mut rng).unwrap().to_string();
        let (bet_type, bet_value) = split_key(&key).unwrap();
        let raw = RawBet::new(&format!("user-{}", n), bet_type, bet_value, rng.gen_range(1..200) as f64);
        engine.ledger.record_bet(&round, &raw).await.unwrap();
    }
    let snapshot = Arc::new(engine.ledger.snapshot(&round).await.unwrap());

    let selector = OutcomeSelector::new(
        engine.config.selector.clone(),
        &engine.config.parallel,
        engine.metrics.clone(),
    );
    let scanned = selector.select(space.clone(), snapshot.clone()).await.unwrap();
    assert_eq!(scanned.strategy, StrategyKind::FullScan);

    let evaluator = ParallelEvaluator::new(&ParallelConfig {
        enabled: true,
        workers: 4,
        timeout_ms: 60_000,
    });
    let (index, liability) = evaluator.evaluate(space.clone(), snapshot.clone()).await.unwrap();

    assert!((scanned.liability - liability).abs() < 1e-9);
    assert!((snapshot.liability(&space, index) - liability).abs() < 1e-9);
}

#[tokio::test]
async fn test_incremental_index_matches_full_scan() {
    let cluster = Cluster::new();
    let mut config = PeriodiqConfig::for_testing();
    config.ledger.incremental_index = true;
    let engine = cluster.engine("w1", config);
    let round = round(GameType::K3, 18);

    for (n, key) in ["sum:10", "size:big", "pair:3", "triple:6", "straight:any", "parity:odd"]
        .iter()
        .enumerate()
    {
        bet(&engine, &round, &format!("u{}", n), key, 25.0 + n as f64).await;
    }

    let space = engine.spaces.get(GameType::K3).unwrap();
    let snapshot = Arc::new(engine.ledger.snapshot(&round).await.unwrap());
    let with_index = OutcomeSelector::new(
        engine.config.selector.clone(),
        &engine.config.parallel,
        engine.metrics.clone(),
    )
    .with_index(engine.ledger.index().clone());
    let plain = OutcomeSelector::new(
        engine.config.selector.clone(),
        &engine.config.parallel,
        engine.metrics.clone(),
    );

    let fast = with_index.select(space.clone(), snapshot.clone()).await.unwrap();
    let slow = plain.select(space.clone(), snapshot.clone()).await.unwrap();
    assert_eq!(fast.strategy, StrategyKind::Incremental);
    assert!((fast.liability - slow.liability).abs() < 1e-4);

    // one more bet the snapshot has not seen: the index is ahead and is skipped
    bet(&engine, &round, "late", "sum:11", 5.0).await;
    let stale = with_index.select(space.clone(), snapshot).await.unwrap();
    assert_eq!(stale.strategy, StrategyKind::FullScan);
}

#[tokio::test]
async fn test_protection_without_zero_outcome_takes_minimum() {
    let cluster = Cluster::new();
    let engine = cluster.engine("w1", PeriodiqConfig::for_testing());
    let round = round(GameType::Wingo, 19);
    // every digit covered, digit 0 the lightest
    for digit in 0..10 {
        bet(&engine, &round, "solo", &format!("number:{}", digit), 10.0 + digit as f64).await;
    }

    let space = engine.spaces.get(GameType::Wingo).unwrap();
    let snapshot = engine.ledger.snapshot(&round).await.unwrap();
    let policy = ProtectionPolicy::new(engine.config.protection.clone());
    assert!(policy.applies(&snapshot));

    let minimum = (0..space.len())
        .map(|index| snapshot.liability(&space, index))
        .fold(f64::INFINITY, f64::min);
    for _ in 0..20 {
        let decision = policy.decide(&space, &snapshot).unwrap();
        assert!(!decision.is_zero_liability());
        assert_eq!(space.outcome(decision.index).values()[0], 0);
        assert!((decision.liability - minimum).abs() < 1e-9);
        // 9.8 net x 9.0 odds
        assert!((decision.liability - 88.2).abs() < 1e-6);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_timed_out_parallel_falls_through_to_sampling() {
    let cluster = Cluster::new();
    let engine = cluster.engine("w1", PeriodiqConfig::for_testing());
    let round = round(GameType::FiveD, 20);
    bet(&engine, &round, "a", "A:3", 50.0).await;
    bet(&engine, &round, "b", "sum:big", 20.0).await;

    let space = engine.spaces.get(GameType::FiveD).unwrap();
    let mut snapshot = engine.ledger.snapshot(&round).await.unwrap();
    snapshot.bet_count = 500;
    let snapshot = Arc::new(snapshot);

    let metrics = Arc::new(EngineMetrics::new());
    let selector = OutcomeSelector::new(
        engine.config.selector.clone(),
        &ParallelConfig {
            enabled: true,
            workers: 4,
            timeout_ms: 0,
        },
        metrics.clone(),
    );
    assert_eq!(selector.plan(&space, &snapshot)[0], StrategyKind::Parallel);

    let selection = selector.select(space.clone(), snapshot.clone()).await.unwrap();
    assert_eq!(selection.strategy, StrategyKind::SmartSampling);
    assert_eq!(metrics.snapshot().strategy_failures, 1);
    assert!((snapshot.liability(&space, selection.index) - selection.liability).abs() < 1e-9);
}

#[tokio::test]
async fn test_sampling_strategies_select_through_plan() {
    let cluster = Cluster::new();
    let mut config = PeriodiqConfig::for_testing();
    config.parallel.enabled = false;
    let engine = cluster.engine("w1", config);
    let round = round(GameType::FiveD, 21);
    bet(&engine, &round, "a", "A:3", 40.0).await;
    bet(&engine, &round, "b", "A:4", 40.0).await;
    bet(&engine, &round, "c", "E:9", 10.0).await;

    let space = engine.spaces.get(GameType::FiveD).unwrap();
    let selector = OutcomeSelector::new(
        engine.config.selector.clone(),
        &engine.config.parallel,
        engine.metrics.clone(),
    );
    let mut snapshot = engine.ledger.snapshot(&round).await.unwrap();

    snapshot.bet_count = 500;
    let smart = Arc::new(snapshot.clone());
    assert_eq!(
        selector.plan(&space, &smart),
        vec![StrategyKind::SmartSampling, StrategyKind::FullScan]
    );
    let selection = selector.select(space.clone(), smart.clone()).await.unwrap();
    assert_eq!(selection.strategy, StrategyKind::SmartSampling);
    assert!((smart.liability(&space, selection.index) - selection.liability).abs() < 1e-9);

    snapshot.bet_count = 5_000;
    let statistical = Arc::new(snapshot);
    assert_eq!(
        selector.plan(&space, &statistical),
        vec![StrategyKind::StatisticalSampling, StrategyKind::FullScan]
    );
    for _ in 0..10 {
        let selection = selector.select(space.clone(), statistical.clone()).await.unwrap();
        assert_eq!(selection.strategy, StrategyKind::StatisticalSampling);
        assert_eq!(selection.liability, 0.0);
        let values = space.outcome(selection.index).values().to_vec();
        assert!(values[0] != 3 && values[0] != 4);
        assert_ne!(values[4], 9);
    }
}
