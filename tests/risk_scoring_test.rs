//! Scoring laws and aggregator behavior over the static backend.

use alloy_primitives::Address;
use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use flowtrace::providers::static_backend::StaticSignalProvider;
use flowtrace::{evaluate, RiskAggregator, RiskFlag, RiskLabel, ScoringConfig, TokenRiskSource};

fn token(n: u8) -> Address {
    Address::from_str(&format!("0x{:040x}", n)).unwrap()
}

fn flags(list: &[RiskFlag]) -> BTreeSet<RiskFlag> {
    list.iter().copied().collect()
}

// ==================== SCORING LAWS ====================

#[test]
fn test_scoring_is_idempotent() {
    let cfg = ScoringConfig::default();
    let set = flags(&[
        RiskFlag::SourceUnverified,
        RiskFlag::LiquidityThin,
        RiskFlag::OwnershipRenounced,
    ]);
    let first = evaluate(&set, &cfg);
    let second = evaluate(&set, &cfg);
    assert_eq!(first, second);
}

#[test]
fn test_adding_negative_flag_is_monotone() {
    let cfg = ScoringConfig::default();
    let bases = [
        flags(&[]),
        flags(&[RiskFlag::MintFunction]),
        flags(&[RiskFlag::LpBurned, RiskFlag::SourceVerifiedClean]),
        flags(&[RiskFlag::SellBlocked, RiskFlag::LiquidityThin]),
    ];
    for base in &bases {
        let before = evaluate(base, &cfg).score;
        for flag in RiskFlag::ALL.into_iter().filter(|f| !f.is_positive()) {
            let mut extended = base.clone();
            extended.insert(flag);
            let after = evaluate(&extended, &cfg).score;
            assert!(
                after >= before,
                "adding {:?} to {:?} lowered the score",
                flag,
                base
            );
        }
    }
}

#[test]
fn test_adding_positive_flag_is_antitone() {
    let cfg = ScoringConfig::default();
    let bases = [
        flags(&[]),
        flags(&[RiskFlag::SourceUnverified, RiskFlag::LiquidityThin]),
        flags(&[RiskFlag::SellBlocked]),
    ];
    for base in &bases {
        let before = evaluate(base, &cfg).score;
        for flag in RiskFlag::ALL.into_iter().filter(|f| f.is_positive()) {
            let mut extended = base.clone();
            extended.insert(flag);
            let after = evaluate(&extended, &cfg).score;
            assert!(
                after <= before,
                "adding {:?} to {:?} raised the score",
                flag,
                base
            );
        }
    }
}

#[test]
fn test_scam_override_beats_every_other_flag_set() {
    let cfg = ScoringConfig::default();
    let mut everything: BTreeSet<RiskFlag> = RiskFlag::ALL.into_iter().collect();
    assert_eq!(
        evaluate(&everything, &cfg).label,
        RiskLabel::ScamConfirmed
    );

    everything.remove(&RiskFlag::ScamListMatch);
    assert_ne!(
        evaluate(&everything, &cfg).label,
        RiskLabel::ScamConfirmed,
        "without the curated hit the label comes from the thresholds"
    );
}

#[test]
fn test_high_band_without_curated_hit_is_high_risk() {
    // Weights pushed so unverified source plus a mint function land in
    // the high band on their own.
    let mut cfg = ScoringConfig::default();
    cfg.weights.source_unverified = 40;
    cfg.weights.mint_function = 25;
    cfg.validate().unwrap();

    let out = evaluate(
        &flags(&[RiskFlag::SourceUnverified, RiskFlag::MintFunction]),
        &cfg,
    );
    assert_eq!(out.score, 65);
    assert_eq!(out.label, RiskLabel::HighRisk);
}

// ==================== AGGREGATOR ====================

#[tokio::test]
async fn test_fanout_merges_independent_providers() {
    let source = Arc::new(
        StaticSignalProvider::new("source").with_flags(token(1), vec![RiskFlag::SourceUnverified]),
    );
    let market = Arc::new(
        StaticSignalProvider::new("market").with_flags(
            token(1),
            vec![RiskFlag::LiquidityThin, RiskFlag::SourceUnverified],
        ),
    );
    let agg = RiskAggregator::new(vec![source.clone(), market.clone()], ScoringConfig::default());

    let risk = agg.assess(token(1), 1_700_000_000).await;
    assert_eq!(source.call_count(), 1);
    assert_eq!(market.call_count(), 1);
    assert_eq!(risk.risk_flags.len(), 2, "shared flag counted once");
    assert_eq!(risk.score, 35, "20 unverified + 15 thin liquidity");
    assert_eq!(risk.label, RiskLabel::MediumRisk);

    let signals = risk.signals.expect("audit bag populated");
    assert!(signals.contains_key("source"));
    assert!(signals.contains_key("market"));
}

#[tokio::test]
async fn test_failed_provider_is_a_gap_not_a_penalty() {
    let healthy = Arc::new(
        StaticSignalProvider::new("healthy").with_flags(token(2), vec![RiskFlag::LiquidityThin]),
    );
    let broken = Arc::new(StaticSignalProvider::new("broken").with_failure());
    let agg = RiskAggregator::new(vec![broken, healthy], ScoringConfig::default());

    let risk = agg.assess(token(2), 1_700_000_000).await;
    assert_eq!(risk.risk_flags, flags(&[RiskFlag::LiquidityThin]));
    assert_eq!(risk.score, 15);
    assert!(!risk.signals.unwrap().contains_key("broken"));
}

#[tokio::test]
async fn test_slow_provider_dropped_at_the_timeout() {
    let slow = Arc::new(
        StaticSignalProvider::new("slow")
            .with_flags(token(3), vec![RiskFlag::SellBlocked])
            .with_delay(Duration::from_millis(300)),
    );
    let fast = Arc::new(
        StaticSignalProvider::new("fast").with_flags(token(3), vec![RiskFlag::MintFunction]),
    );
    let agg = RiskAggregator::new(vec![slow, fast], ScoringConfig::default())
        .with_timeout(Duration::from_millis(50));

    let risk = agg.assess(token(3), 1_700_000_000).await;
    assert!(!risk.risk_flags.contains(&RiskFlag::SellBlocked));
    assert!(risk.risk_flags.contains(&RiskFlag::MintFunction));
}

#[tokio::test]
async fn test_concurrent_same_token_requests_collapse() {
    let provider = Arc::new(
        StaticSignalProvider::new("counted").with_flags(token(4), vec![RiskFlag::LiquidityThin]),
    );
    let agg = Arc::new(RiskAggregator::new(
        vec![provider.clone()],
        ScoringConfig::default(),
    ));

    let mut handles = Vec::new();
    for _ in 0..16 {
        let agg = Arc::clone(&agg);
        handles.push(tokio::spawn(
            async move { agg.assess(token(4), 1_700_000_000).await },
        ));
    }
    for handle in handles {
        let risk = handle.await.unwrap();
        assert_eq!(risk.score, 15);
    }

    assert_eq!(provider.call_count(), 1, "sixteen callers, one fan-out");
    assert_eq!(agg.fresh_count(), 1);
}

#[tokio::test]
async fn test_distinct_tokens_get_distinct_fanouts() {
    let provider = Arc::new(StaticSignalProvider::new("counted"));
    let agg = RiskAggregator::new(vec![provider.clone()], ScoringConfig::default());

    agg.assess(token(5), 1_700_000_000).await;
    agg.assess(token(6), 1_700_000_000).await;
    agg.assess(token(5), 1_700_000_000).await;

    assert_eq!(provider.call_count(), 2);
    assert_eq!(agg.fresh_count(), 2);
}

// ==================== SERIALIZED SHAPE ====================

#[tokio::test]
async fn test_token_risk_serializes_to_the_stable_schema() {
    let provider = Arc::new(
        StaticSignalProvider::new("market")
            .with_flags(token(7), vec![RiskFlag::LiquidityThin, RiskFlag::MintFunction]),
    );
    let agg = RiskAggregator::new(vec![provider], ScoringConfig::default());
    let risk = agg.assess(token(7), 1_700_000_000).await;

    let v = serde_json::to_value(&risk).unwrap();
    assert_eq!(v["label"], "LOW_RISK");
    assert_eq!(v["score"], 30);
    let tags: Vec<&str> = v["risk_flags"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f.as_str().unwrap())
        .collect();
    assert_eq!(tags, vec!["MINT_FUNCTION", "LIQUIDITY_THIN"]);
    assert!(v["signals"]["market"].is_object());
}
