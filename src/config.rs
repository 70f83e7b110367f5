//! Configuration module for FlowTrace
//! Run-scoped trace limits plus scoring weights and thresholds.
//! Both are explicit immutable values threaded through the engines,
//! never ambient state; env vars are read only at construction time.

use alloy_primitives::Address;
use std::str::FromStr;

use crate::models::errors::{AppError, AppResult};
use crate::models::types::RiskFlag;

/// Configuration for one trace run
#[derive(Debug, Clone)]
pub struct TraceConfig {
    /// Seed address (raw user input, validated before any work)
    pub seed: String,

    /// Lookback window in days
    pub window_days: u64,

    /// Maximum hop depth from the seed
    pub hop_limit: u32,

    /// USD floor; resolved transfers below it are dropped
    pub min_usd: f64,

    /// Per-source-address edge cap (0 = unlimited)
    pub max_edges_per_address: usize,

    /// Global edge budget (0 = unlimited)
    pub max_total_edges: usize,

    /// Keep transfers whose USD value cannot be resolved
    pub ignore_unknown_price: bool,

    /// Capped-out transfers still contribute frontier members.
    /// The per-address cap limits density, not reachability.
    pub expand_capped_neighbors: bool,

    /// Resolve the is-contract flag for expanded addresses (extra lookups)
    pub resolve_contract_flags: bool,

    /// Assess every token referenced by an edge after expansion
    pub assess_tokens: bool,

    /// Concurrent token assessments during the post-expansion phase
    pub max_concurrent_assessments: usize,

    /// Pin "now" for reproducible windows (tests); None = wall clock
    pub now_ts: Option<u64>,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            seed: String::new(),
            window_days: 30,
            hop_limit: 2,
            min_usd: 0.0,
            max_edges_per_address: 0,
            max_total_edges: 0,
            ignore_unknown_price: false,
            expand_capped_neighbors: true,
            resolve_contract_flags: false,
            assess_tokens: true,
            max_concurrent_assessments: 4,
            now_ts: None,
        }
    }
}

impl TraceConfig {
    pub fn new(seed: impl Into<String>) -> Self {
        Self {
            seed: seed.into(),
            ..Self::default()
        }
    }

    /// Validate and parse the seed. Fatal on any violation; this runs
    /// before the first network call.
    pub fn validate(&self) -> AppResult<Address> {
        let raw = self.seed.trim();
        if raw.is_empty() {
            return Err(AppError::invalid_seed("seed address is required"));
        }
        let seed = Address::from_str(raw)
            .map_err(|_| AppError::invalid_seed(format!("unparseable seed address: {}", raw)))?;

        if !self.min_usd.is_finite() || self.min_usd < 0.0 {
            return Err(AppError::invalid_value(format!(
                "min_usd must be finite and non-negative, got {}",
                self.min_usd
            )));
        }
        if self.max_concurrent_assessments == 0 {
            return Err(AppError::invalid_value(
                "max_concurrent_assessments must be at least 1",
            ));
        }

        Ok(seed)
    }

    /// (from_ts, to_ts) of the lookback window in unix seconds
    pub fn window_bounds(&self) -> (u64, u64) {
        let now = self.now_ts.unwrap_or_else(|| {
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0)
        });
        (
            now.saturating_sub(
                self.window_days
                    .saturating_mul(crate::utils::constants::SECS_PER_DAY),
            ),
            now,
        )
    }
}

/// Per-flag weights on the 0-100 score scale.
/// Negative conditions add their weight, positive conditions subtract it.
#[derive(Debug, Clone)]
pub struct RiskWeights {
    pub source_unverified: u8,
    pub mint_function: u8,
    pub blacklist_function: u8,
    pub liquidity_thin: u8,
    pub single_dex_pair_only: u8,
    pub pair_created_recently: u8,
    pub holder_concentration: u8,
    pub lp_unlocked: u8,
    pub buy_tax_excessive: u8,
    pub sell_tax_excessive: u8,
    pub sell_blocked: u8,
    pub scam_list_match: u8,
    pub lp_burned: u8,
    pub ownership_renounced: u8,
    pub source_verified_clean: u8,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            source_unverified: 20,
            mint_function: 15,
            blacklist_function: 15,
            liquidity_thin: 15,
            single_dex_pair_only: 5,
            pair_created_recently: 10,
            holder_concentration: 15,
            lp_unlocked: 15,
            buy_tax_excessive: 15,
            sell_tax_excessive: 20,
            sell_blocked: 60,
            scam_list_match: 100,
            lp_burned: 10,
            ownership_renounced: 10,
            source_verified_clean: 15,
        }
    }
}

impl RiskWeights {
    pub fn weight_of(&self, flag: RiskFlag) -> u8 {
        match flag {
            RiskFlag::SourceUnverified => self.source_unverified,
            RiskFlag::MintFunction => self.mint_function,
            RiskFlag::BlacklistFunction => self.blacklist_function,
            RiskFlag::LiquidityThin => self.liquidity_thin,
            RiskFlag::SingleDexPairOnly => self.single_dex_pair_only,
            RiskFlag::PairCreatedRecently => self.pair_created_recently,
            RiskFlag::HolderConcentration => self.holder_concentration,
            RiskFlag::LpUnlocked => self.lp_unlocked,
            RiskFlag::BuyTaxExcessive => self.buy_tax_excessive,
            RiskFlag::SellTaxExcessive => self.sell_tax_excessive,
            RiskFlag::SellBlocked => self.sell_blocked,
            RiskFlag::ScamListMatch => self.scam_list_match,
            RiskFlag::LpBurned => self.lp_burned,
            RiskFlag::OwnershipRenounced => self.ownership_renounced,
            RiskFlag::SourceVerifiedClean => self.source_verified_clean,
        }
    }
}

/// Weights plus label thresholds for the scoring engine
#[derive(Debug, Clone)]
pub struct ScoringConfig {
    pub weights: RiskWeights,
    /// score >= high_risk_threshold -> HIGH_RISK
    pub high_risk_threshold: u8,
    /// score >= medium_risk_threshold -> MEDIUM_RISK
    pub medium_risk_threshold: u8,
    /// score >= low_risk_threshold -> LOW_RISK, below -> UNKNOWN
    pub low_risk_threshold: u8,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: RiskWeights::default(),
            high_risk_threshold: 60,
            medium_risk_threshold: 35,
            low_risk_threshold: 10,
        }
    }
}

impl ScoringConfig {
    /// Defaults with env overrides for the thresholds
    pub fn from_env() -> Self {
        Self {
            weights: RiskWeights::default(),
            high_risk_threshold: env_u8("RISK_THRESHOLD_HIGH", 60),
            medium_risk_threshold: env_u8("RISK_THRESHOLD_MEDIUM", 35),
            low_risk_threshold: env_u8("RISK_THRESHOLD_LOW", 10),
        }
    }

    /// Thresholds must be total-ordered and non-overlapping so every
    /// score maps to exactly one label. Fatal on violation.
    pub fn validate(&self) -> AppResult<()> {
        if self.low_risk_threshold == 0 {
            return Err(AppError::invalid_thresholds(
                "low threshold must be above 0 (0 is reserved for UNKNOWN)",
            ));
        }
        if self.low_risk_threshold >= self.medium_risk_threshold
            || self.medium_risk_threshold >= self.high_risk_threshold
        {
            return Err(AppError::invalid_thresholds(format!(
                "thresholds must satisfy low < medium < high, got {} / {} / {}",
                self.low_risk_threshold, self.medium_risk_threshold, self.high_risk_threshold
            )));
        }
        if self.high_risk_threshold > 100 {
            return Err(AppError::invalid_thresholds(format!(
                "high threshold above the 100 score cap: {}",
                self.high_risk_threshold
            )));
        }
        for flag in RiskFlag::ALL {
            let w = self.weights.weight_of(flag);
            if w > 100 {
                return Err(AppError::invalid_value(format!(
                    "weight for {} above 100: {}",
                    flag.as_str(),
                    w
                )));
            }
        }
        Ok(())
    }
}

fn env_u8(name: &str, default: u8) -> u8 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_trace_config_needs_seed() {
        let cfg = TraceConfig::default();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_seed_parsing() {
        let cfg = TraceConfig::new("0x000000000000000000000000000000000000dEaD");
        let seed = cfg.validate().expect("checksummed seed should parse");
        let lower = Address::from_str("0x000000000000000000000000000000000000dead").unwrap();
        assert_eq!(seed, lower, "address comparison is case-normalized");

        let bad = TraceConfig::new("not-an-address");
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_min_usd_must_be_finite() {
        let mut cfg = TraceConfig::new("0x000000000000000000000000000000000000dEaD");
        cfg.min_usd = f64::NAN;
        assert!(cfg.validate().is_err());
        cfg.min_usd = -5.0;
        assert!(cfg.validate().is_err());
        cfg.min_usd = 1000.0;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_window_bounds_pinned() {
        let mut cfg = TraceConfig::new("0x000000000000000000000000000000000000dEaD");
        cfg.window_days = 2;
        cfg.now_ts = Some(200_000);
        assert_eq!(cfg.window_bounds(), (200_000 - 2 * 86_400, 200_000));
    }

    #[test]
    fn test_window_bounds_saturate_on_huge_lookback() {
        let mut cfg = TraceConfig::new("0x000000000000000000000000000000000000dEaD");
        cfg.window_days = u64::MAX;
        cfg.now_ts = Some(1_700_000_000);
        assert_eq!(cfg.window_bounds(), (0, 1_700_000_000));
    }

    #[test]
    fn test_scoring_defaults_validate() {
        assert!(ScoringConfig::default().validate().is_ok());
    }

    #[test]
    fn test_overlapping_thresholds_rejected() {
        let mut cfg = ScoringConfig::default();
        cfg.medium_risk_threshold = cfg.high_risk_threshold;
        assert!(cfg.validate().is_err());

        let mut cfg = ScoringConfig::default();
        cfg.low_risk_threshold = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = ScoringConfig::default();
        cfg.low_risk_threshold = 50;
        cfg.medium_risk_threshold = 40;
        assert!(cfg.validate().is_err());
    }
}
