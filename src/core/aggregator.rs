//! Composite risk assessment.
//!
//! Fans one token out to every configured signal provider in parallel,
//! merges whatever came back into a single flag set, and scores it.
//! Provider failures and timeouts are logged and excluded; they never
//! penalize the token. Results are memoized per run with a single-flight
//! cell so concurrent assessments of the same token trigger one fan-out.

use alloy_primitives::Address;
use dashmap::DashMap;
use futures_util::future::join_all;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::config::ScoringConfig;
use crate::core::scoring;
use crate::models::types::{RiskFlag, TokenRisk};
use crate::ports::{SignalProvider, TokenRiskSource};
use crate::utils::constants::PROVIDER_TIMEOUT_SECS;

pub struct RiskAggregator {
    providers: Vec<Arc<dyn SignalProvider>>,
    config: ScoringConfig,
    provider_timeout: Duration,
    cache: DashMap<Address, Arc<OnceCell<TokenRisk>>>,
    fresh: AtomicU64,
}

impl RiskAggregator {
    pub fn new(providers: Vec<Arc<dyn SignalProvider>>, config: ScoringConfig) -> Self {
        Self {
            providers,
            config,
            provider_timeout: Duration::from_secs(PROVIDER_TIMEOUT_SECS),
            cache: DashMap::new(),
            fresh: AtomicU64::new(0),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    /// Fan-outs actually executed (cache hits excluded)
    pub fn fresh_count(&self) -> u64 {
        self.fresh.load(Ordering::Relaxed)
    }

    /// One full fan-out: probe every provider, merge, score.
    async fn assess_fresh(&self, token: Address, at_ts: u64) -> TokenRisk {
        self.fresh.fetch_add(1, Ordering::Relaxed);
        debug!(
            "🔍 Probing {} providers for token {}",
            self.providers.len(),
            token
        );

        let probes = self.providers.iter().map(|provider| {
            let provider = Arc::clone(provider);
            async move {
                let name = provider.name();
                match tokio::time::timeout(self.provider_timeout, provider.probe(token, at_ts))
                    .await
                {
                    Ok(Ok(report)) => Some((name, report)),
                    Ok(Err(e)) => {
                        warn!("⚠️ Provider {} failed for {}: {}", name, token, e);
                        None
                    }
                    Err(_) => {
                        warn!(
                            "⚠️ Provider {} timed out for {} after {:?}",
                            name, token, self.provider_timeout
                        );
                        None
                    }
                }
            }
        });

        let mut flags: BTreeSet<RiskFlag> = BTreeSet::new();
        let mut signals: BTreeMap<String, serde_json::Value> = BTreeMap::new();
        for (name, report) in join_all(probes).await.into_iter().flatten() {
            flags.extend(report.flags.iter().copied());
            if !report.raw.is_null() {
                signals.insert(name.to_string(), report.raw);
            }
        }

        let outcome = scoring::evaluate(&flags, &self.config);
        let risk = TokenRisk {
            token_address: token,
            label: outcome.label,
            score: outcome.score,
            risk_flags: flags,
            signals: if signals.is_empty() {
                None
            } else {
                Some(signals)
            },
        };
        info!(
            "📊 Assessed {}: {} {} (score {}, {} flags)",
            token,
            risk.label.emoji(),
            risk.label.as_str(),
            risk.score,
            risk.risk_flags.len()
        );
        risk
    }
}

#[async_trait::async_trait]
impl TokenRiskSource for RiskAggregator {
    async fn assess(&self, token: Address, at_ts: u64) -> TokenRisk {
        // Clone the cell out of the map entry so the shard guard drops
        // before any await point.
        let cell = Arc::clone(
            self.cache
                .entry(token)
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .value(),
        );
        cell.get_or_init(|| self.assess_fresh(token, at_ts))
            .await
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::errors::AppError;
    use crate::models::types::RiskLabel;
    use crate::ports::ProviderReport;
    use std::str::FromStr;
    use std::sync::atomic::AtomicUsize;

    fn token() -> Address {
        Address::from_str("0x00000000000000000000000000000000000000aa").unwrap()
    }

    struct FixedProvider {
        name: &'static str,
        flags: Vec<RiskFlag>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl SignalProvider for FixedProvider {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn probe(&self, _token: Address, _at_ts: u64) -> crate::models::errors::AppResult<ProviderReport> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut report = ProviderReport::new();
            for f in &self.flags {
                report = report.flag(*f);
            }
            Ok(report.with_raw(serde_json::json!({"provider": self.name})))
        }
    }

    struct FailingProvider;

    #[async_trait::async_trait]
    impl SignalProvider for FailingProvider {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn probe(&self, _token: Address, _at_ts: u64) -> crate::models::errors::AppResult<ProviderReport> {
            Err(AppError::provider_unavailable("connection refused"))
        }
    }

    struct SlowProvider;

    #[async_trait::async_trait]
    impl SignalProvider for SlowProvider {
        fn name(&self) -> &'static str {
            "slow"
        }

        async fn probe(&self, _token: Address, _at_ts: u64) -> crate::models::errors::AppResult<ProviderReport> {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok(ProviderReport::new().flag(RiskFlag::SellBlocked))
        }
    }

    #[tokio::test]
    async fn test_merges_flags_across_providers() {
        let calls = Arc::new(AtomicUsize::new(0));
        let agg = RiskAggregator::new(
            vec![
                Arc::new(FixedProvider {
                    name: "source",
                    flags: vec![RiskFlag::MintFunction],
                    calls: calls.clone(),
                }),
                Arc::new(FixedProvider {
                    name: "market",
                    flags: vec![RiskFlag::LiquidityThin, RiskFlag::MintFunction],
                    calls: calls.clone(),
                }),
            ],
            ScoringConfig::default(),
        );

        let risk = agg.assess(token(), 1_700_000_000).await;
        assert_eq!(risk.risk_flags.len(), 2, "repeats collapse in the set");
        assert!(risk.risk_flags.contains(&RiskFlag::MintFunction));
        assert!(risk.risk_flags.contains(&RiskFlag::LiquidityThin));
        let signals = risk.signals.expect("raw payloads kept");
        assert!(signals.contains_key("source"));
        assert!(signals.contains_key("market"));
    }

    #[tokio::test]
    async fn test_provider_failure_contributes_nothing() {
        let calls = Arc::new(AtomicUsize::new(0));
        let agg = RiskAggregator::new(
            vec![
                Arc::new(FailingProvider),
                Arc::new(FixedProvider {
                    name: "market",
                    flags: vec![],
                    calls,
                }),
            ],
            ScoringConfig::default(),
        );

        let risk = agg.assess(token(), 1_700_000_000).await;
        assert_eq!(risk.label, RiskLabel::Unknown);
        assert_eq!(risk.score, 0, "failures never penalize the token");
        let signals = risk.signals.expect("healthy provider payload kept");
        assert!(!signals.contains_key("failing"));
    }

    #[tokio::test]
    async fn test_all_providers_failing_yields_unknown() {
        let agg = RiskAggregator::new(vec![Arc::new(FailingProvider)], ScoringConfig::default());
        let risk = agg.assess(token(), 1_700_000_000).await;
        assert_eq!(risk.label, RiskLabel::Unknown);
        assert_eq!(risk.score, 0);
        assert!(risk.risk_flags.is_empty());
        assert!(risk.signals.is_none());
    }

    #[tokio::test]
    async fn test_slow_provider_excluded_by_timeout() {
        let calls = Arc::new(AtomicUsize::new(0));
        let agg = RiskAggregator::new(
            vec![
                Arc::new(SlowProvider),
                Arc::new(FixedProvider {
                    name: "fast",
                    flags: vec![RiskFlag::LiquidityThin],
                    calls,
                }),
            ],
            ScoringConfig::default(),
        )
        .with_timeout(Duration::from_millis(50));

        let risk = agg.assess(token(), 1_700_000_000).await;
        assert!(!risk.risk_flags.contains(&RiskFlag::SellBlocked));
        assert!(risk.risk_flags.contains(&RiskFlag::LiquidityThin));
    }

    #[tokio::test]
    async fn test_concurrent_assessments_share_one_fanout() {
        let calls = Arc::new(AtomicUsize::new(0));
        let agg = Arc::new(RiskAggregator::new(
            vec![Arc::new(FixedProvider {
                name: "source",
                flags: vec![RiskFlag::MintFunction],
                calls: calls.clone(),
            })],
            ScoringConfig::default(),
        ));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let agg = Arc::clone(&agg);
            handles.push(tokio::spawn(async move {
                agg.assess(token(), 1_700_000_000).await
            }));
        }
        let mut results = Vec::new();
        for h in handles {
            results.push(h.await.unwrap());
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1, "one probe for 8 callers");
        assert_eq!(agg.fresh_count(), 1);
        assert!(results.windows(2).all(|w| w[0].score == w[1].score));
    }

    #[tokio::test]
    async fn test_scam_match_overrides_label() {
        let calls = Arc::new(AtomicUsize::new(0));
        let agg = RiskAggregator::new(
            vec![Arc::new(FixedProvider {
                name: "registry",
                flags: vec![RiskFlag::ScamListMatch],
                calls,
            })],
            ScoringConfig::default(),
        );
        let risk = agg.assess(token(), 1_700_000_000).await;
        assert_eq!(risk.label, RiskLabel::ScamConfirmed);
    }
}
