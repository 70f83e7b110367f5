//! Type definitions for FlowTrace
//! Core data structures for token risk classification

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Final severity classification for a token.
/// Variant order is ascending severity; derived `Ord` relies on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLabel {
    /// Insufficient or no negative evidence (not "confirmed safe")
    Unknown,
    /// Some negative evidence, below the medium band
    LowRisk,
    /// Accumulated evidence in the medium band
    MediumRisk,
    /// Accumulated evidence in the high band
    HighRisk,
    /// Curated scam list hit - absolute override
    ScamConfirmed,
}

impl RiskLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLabel::Unknown => "UNKNOWN",
            RiskLabel::LowRisk => "LOW_RISK",
            RiskLabel::MediumRisk => "MEDIUM_RISK",
            RiskLabel::HighRisk => "HIGH_RISK",
            RiskLabel::ScamConfirmed => "SCAM_CONFIRMED",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            RiskLabel::Unknown => "❓",
            RiskLabel::LowRisk => "🟡",
            RiskLabel::MediumRisk => "🟠",
            RiskLabel::HighRisk => "🔴",
            RiskLabel::ScamConfirmed => "💀",
        }
    }
}

/// A single discrete piece of risk evidence, emitted by a signal provider.
/// The serialized tags are a compatibility surface; do not rename.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskFlag {
    // Negative conditions (add weight)
    /// Contract source not verified
    SourceUnverified,
    /// ABI/source exposes a mint function
    MintFunction,
    /// ABI/source exposes a blacklist function
    BlacklistFunction,
    /// Liquidity below floor, missing, or outweighed by volume
    LiquidityThin,
    /// Exactly one DEX pair carries the token
    SingleDexPairOnly,
    /// Newest pair younger than the configured window
    PairCreatedRecently,
    /// Top-10 holders control more than the configured share
    HolderConcentration,
    /// No locked or burned LP found
    LpUnlocked,
    /// Buy tax above the configured ceiling
    BuyTaxExcessive,
    /// Sell tax above the configured ceiling
    SellTaxExcessive,
    /// Sell blocked in simulation (honeypot verdict)
    SellBlocked,
    /// Address present on the curated scam list (label override)
    ScamListMatch,

    // Positive conditions (subtract weight)
    /// LP tokens burned
    LpBurned,
    /// Contract ownership renounced
    OwnershipRenounced,
    /// Source verified and no dangerous functions found
    SourceVerifiedClean,
}

impl RiskFlag {
    /// Every flag the scoring engine knows about
    pub const ALL: [RiskFlag; 15] = [
        RiskFlag::SourceUnverified,
        RiskFlag::MintFunction,
        RiskFlag::BlacklistFunction,
        RiskFlag::LiquidityThin,
        RiskFlag::SingleDexPairOnly,
        RiskFlag::PairCreatedRecently,
        RiskFlag::HolderConcentration,
        RiskFlag::LpUnlocked,
        RiskFlag::BuyTaxExcessive,
        RiskFlag::SellTaxExcessive,
        RiskFlag::SellBlocked,
        RiskFlag::ScamListMatch,
        RiskFlag::LpBurned,
        RiskFlag::OwnershipRenounced,
        RiskFlag::SourceVerifiedClean,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskFlag::SourceUnverified => "SOURCE_UNVERIFIED",
            RiskFlag::MintFunction => "MINT_FUNCTION",
            RiskFlag::BlacklistFunction => "BLACKLIST_FUNCTION",
            RiskFlag::LiquidityThin => "LIQUIDITY_THIN",
            RiskFlag::SingleDexPairOnly => "SINGLE_DEX_PAIR_ONLY",
            RiskFlag::PairCreatedRecently => "PAIR_CREATED_RECENTLY",
            RiskFlag::HolderConcentration => "HOLDER_CONCENTRATION",
            RiskFlag::LpUnlocked => "LP_UNLOCKED",
            RiskFlag::BuyTaxExcessive => "BUY_TAX_EXCESSIVE",
            RiskFlag::SellTaxExcessive => "SELL_TAX_EXCESSIVE",
            RiskFlag::SellBlocked => "SELL_BLOCKED",
            RiskFlag::ScamListMatch => "SCAM_LIST_MATCH",
            RiskFlag::LpBurned => "LP_BURNED",
            RiskFlag::OwnershipRenounced => "OWNERSHIP_RENOUNCED",
            RiskFlag::SourceVerifiedClean => "SOURCE_VERIFIED_CLEAN",
        }
    }

    /// Positive conditions subtract their weight instead of adding it
    pub fn is_positive(&self) -> bool {
        matches!(
            self,
            RiskFlag::LpBurned | RiskFlag::OwnershipRenounced | RiskFlag::SourceVerifiedClean
        )
    }

    pub fn description(&self) -> &'static str {
        match self {
            RiskFlag::SourceUnverified => "Contract source not verified",
            RiskFlag::MintFunction => "Mint function present",
            RiskFlag::BlacklistFunction => "Blacklist function present",
            RiskFlag::LiquidityThin => "Thin or missing liquidity",
            RiskFlag::SingleDexPairOnly => "Single DEX pair only",
            RiskFlag::PairCreatedRecently => "Pair created recently",
            RiskFlag::HolderConcentration => "Holder concentration above threshold",
            RiskFlag::LpUnlocked => "LP not locked or burned",
            RiskFlag::BuyTaxExcessive => "Excessive buy tax",
            RiskFlag::SellTaxExcessive => "Excessive sell tax",
            RiskFlag::SellBlocked => "Sell blocked in simulation",
            RiskFlag::ScamListMatch => "Curated scam list hit",
            RiskFlag::LpBurned => "LP burned",
            RiskFlag::OwnershipRenounced => "Ownership renounced",
            RiskFlag::SourceVerifiedClean => "Verified source, no dangerous functions",
        }
    }
}

/// Composite risk assessment for one token, immutable once created.
/// Serialized shape is part of the stable graph schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRisk {
    /// Token contract address
    pub token_address: Address,
    /// Final severity label
    pub label: RiskLabel,
    /// Accumulated score in [0,100]
    pub score: u8,
    /// Triggered flags, each at most once
    pub risk_flags: BTreeSet<RiskFlag>,
    /// Raw per-provider payloads for audit; never affects control flow
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signals: Option<BTreeMap<String, serde_json::Value>>,
}

impl TokenRisk {
    /// Assessment when no provider answered: no evidence either way
    pub fn unknown(token_address: Address) -> Self {
        Self {
            token_address,
            label: RiskLabel::Unknown,
            score: 0,
            risk_flags: BTreeSet::new(),
            signals: None,
        }
    }

    pub fn is_flagged(&self) -> bool {
        !self.risk_flags.is_empty()
    }

    /// One-line digest for logs
    pub fn summary(&self) -> String {
        format!(
            "{} {} score={} flags=[{}]",
            self.label.emoji(),
            self.label.as_str(),
            self.score,
            self.risk_flags
                .iter()
                .map(|f| f.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )
    }
}

/// What one signal provider reports for one token probe
#[derive(Debug, Clone)]
pub struct ProviderReport {
    /// Triggered flags (duplicates collapse in the aggregator)
    pub flags: Vec<RiskFlag>,
    /// Raw payload preserved for the audit bag
    pub raw: serde_json::Value,
}

impl ProviderReport {
    pub fn new() -> Self {
        Self {
            flags: Vec::new(),
            raw: serde_json::Value::Null,
        }
    }

    pub fn flag(mut self, flag: RiskFlag) -> Self {
        self.flags.push(flag);
        self
    }

    pub fn with_raw(mut self, raw: serde_json::Value) -> Self {
        self.raw = raw;
        self
    }
}

impl Default for ProviderReport {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-run statistics reported by the tracer
#[derive(Debug, Default, Clone)]
pub struct TraceStats {
    pub addresses_expanded: u64,
    pub terminal_nodes: u64,
    pub transfers_seen: u64,
    pub malformed_dropped: u64,
    pub unpriced_dropped: u64,
    pub below_floor_dropped: u64,
    pub duplicates_suppressed: u64,
    pub capped_dropped: u64,
    pub edges_added: u64,
    pub source_gaps: u64,
    pub tokens_assessed: u64,
    pub halted_on_edge_budget: bool,
}
