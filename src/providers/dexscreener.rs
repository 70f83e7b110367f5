//! DexScreener API Client - "The Market Lens"
//!
//! ✅ USED FOR:
//! - Spot prices for tokens with live DEX liquidity
//! - Market-structure risk signals (thin liquidity, single pair,
//!   freshly created pairs, volume/liquidity mismatch)
//!
//! ❌ NOT USED FOR:
//! - Historical prices (DexScreener only serves current quotes)
//! - Contract-level security analysis
//!
//! API: https://api.dexscreener.com/latest/dex/tokens/{tokenAddress}
//! Free, no API key required

use alloy_primitives::Address;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::models::errors::{AppError, AppResult};
use crate::models::types::RiskFlag;
use crate::ports::{ProviderReport, SignalProvider};
use crate::utils::constants::{
    DEFAULT_HTTP_TIMEOUT_SECS, DEXSCREENER_API_URL, DEXSCREENER_CHAIN,
};

/// Combined pair liquidity below this is considered thin
pub const MIN_LIQUIDITY_USD: f64 = 250_000.0;

/// Pairs younger than this are flagged as freshly created
pub const NEW_PAIR_HOURS: u64 = 24;

/// 24h volume above liquidity times this ratio suggests wash trading
pub const VOLUME_LIQUIDITY_RATIO: f64 = 5.0;

// ============================================
// WIRE TYPES
// ============================================

#[derive(Debug, Deserialize)]
struct DexScreenerResponse {
    #[serde(default)]
    pairs: Option<Vec<DexPair>>,
}

/// A trading pair from DexScreener
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DexPair {
    /// Chain ID (e.g., "ethereum", "bsc")
    pub chain_id: String,
    /// DEX identifier (e.g., "uniswap", "sushiswap")
    pub dex_id: String,
    pub pair_address: String,
    pub base_token: DexToken,
    pub quote_token: DexToken,
    pub liquidity: Option<DexLiquidity>,
    /// Price in USD, stringly typed on the wire
    pub price_usd: Option<String>,
    pub volume: Option<DexVolume>,
    /// Milliseconds since epoch
    pub pair_created_at: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DexToken {
    pub address: String,
    pub name: Option<String>,
    pub symbol: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DexLiquidity {
    pub usd: Option<f64>,
    pub base: Option<f64>,
    pub quote: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DexVolume {
    pub h24: Option<f64>,
}

impl DexPair {
    pub fn liquidity_usd(&self) -> f64 {
        self.liquidity.as_ref().and_then(|l| l.usd).unwrap_or(0.0)
    }

    pub fn volume_24h(&self) -> f64 {
        self.volume.as_ref().and_then(|v| v.h24).unwrap_or(0.0)
    }

    pub fn price(&self) -> Option<f64> {
        self.price_usd.as_deref().and_then(|p| p.parse().ok())
    }

    /// Creation time in seconds. DexScreener serves milliseconds;
    /// treat large values as ms.
    pub fn created_at_secs(&self) -> Option<u64> {
        self.pair_created_at.map(|raw| {
            if raw > 10_000_000_000 {
                raw / 1000
            } else {
                raw
            }
        })
    }
}

// ============================================
// CLIENT
// ============================================

/// DexScreener API client
pub struct DexScreenerClient {
    client: reqwest::Client,
    base_url: String,
}

impl Default for DexScreenerClient {
    fn default() -> Self {
        Self::new()
    }
}

impl DexScreenerClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: DEXSCREENER_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Mainnet pairs for a token, sorted by liquidity (highest first)
    pub async fn token_pairs(&self, token: Address) -> AppResult<Vec<DexPair>> {
        let url = format!("{}/tokens/{:?}", self.base_url, token);
        debug!("🔍 DexScreener: Fetching pairs for {}", token);

        let response = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS))
            .send()
            .await?
            .error_for_status()?;

        let data: DexScreenerResponse = response.json().await?;

        let mut pairs: Vec<DexPair> = data
            .pairs
            .unwrap_or_default()
            .into_iter()
            .filter(|p| p.chain_id.eq_ignore_ascii_case(DEXSCREENER_CHAIN))
            .collect();

        pairs.sort_by(|a, b| {
            b.liquidity_usd()
                .partial_cmp(&a.liquidity_usd())
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        debug!("📊 DexScreener: {} mainnet pairs for {}", pairs.len(), token);
        Ok(pairs)
    }

    /// Current USD quote from the deepest pair that reports a price
    pub async fn spot_price(&self, token: Address) -> AppResult<Option<f64>> {
        let pairs = self.token_pairs(token).await?;
        Ok(pairs.iter().find_map(|p| p.price()))
    }
}

// ============================================
// MARKET SIGNAL PROVIDER
// ============================================

/// Flags market-structure risk from the shape of a token's DEX pairs
pub struct MarketSignalProvider {
    client: Arc<DexScreenerClient>,
    min_liquidity_usd: f64,
    new_pair_hours: u64,
}

impl MarketSignalProvider {
    pub fn new(client: Arc<DexScreenerClient>) -> Self {
        Self {
            client,
            min_liquidity_usd: MIN_LIQUIDITY_USD,
            new_pair_hours: NEW_PAIR_HOURS,
        }
    }

    pub fn with_thresholds(mut self, min_liquidity_usd: f64, new_pair_hours: u64) -> Self {
        self.min_liquidity_usd = min_liquidity_usd;
        self.new_pair_hours = new_pair_hours;
        self
    }
}

/// Pure flag derivation, separated from I/O so it is testable
fn market_flags(
    pairs: &[DexPair],
    at_ts: u64,
    min_liquidity_usd: f64,
    new_pair_hours: u64,
) -> (Vec<RiskFlag>, serde_json::Value) {
    let mut total_liquidity = 0.0_f64;
    let mut max_liquidity = 0.0_f64;
    let mut max_volume = 0.0_f64;
    let mut newest_created: Option<u64> = None;

    for pair in pairs {
        total_liquidity += pair.liquidity_usd();
        max_liquidity = max_liquidity.max(pair.liquidity_usd());
        max_volume = max_volume.max(pair.volume_24h());
        if let Some(created) = pair.created_at_secs() {
            newest_created = Some(newest_created.map_or(created, |c| c.max(created)));
        }
    }

    let newest_age_hours =
        newest_created.map(|created| at_ts.saturating_sub(created) as f64 / 3600.0);

    let mut flags = Vec::new();
    if pairs.is_empty() || total_liquidity == 0.0 || total_liquidity < min_liquidity_usd {
        flags.push(RiskFlag::LiquidityThin);
    }
    if max_liquidity > 0.0 && max_volume > max_liquidity * VOLUME_LIQUIDITY_RATIO {
        flags.push(RiskFlag::LiquidityThin);
    }
    if pairs.len() == 1 {
        flags.push(RiskFlag::SingleDexPairOnly);
    }
    if let Some(age) = newest_age_hours {
        if age <= new_pair_hours as f64 {
            flags.push(RiskFlag::PairCreatedRecently);
        }
    }

    let raw = serde_json::json!({
        "pair_count": pairs.len(),
        "total_liquidity_usd": total_liquidity,
        "max_liquidity_usd": max_liquidity,
        "max_volume_24h_usd": max_volume,
        "newest_pair_age_hours": newest_age_hours,
    });

    (flags, raw)
}

#[async_trait]
impl SignalProvider for MarketSignalProvider {
    fn name(&self) -> &'static str {
        "dexscreener"
    }

    async fn probe(&self, token: Address, at_ts: u64) -> AppResult<ProviderReport> {
        let pairs = self
            .client
            .token_pairs(token)
            .await
            .map_err(|e| AppError::provider_unavailable(format!("dexscreener: {}", e)))?;

        let (flags, raw) = market_flags(&pairs, at_ts, self.min_liquidity_usd, self.new_pair_hours);
        info!(
            "📊 DexScreener signals for {}: {} pairs, {} flags",
            token,
            pairs.len(),
            flags.len()
        );

        let mut report = ProviderReport::new();
        for flag in flags {
            report = report.flag(flag);
        }
        Ok(report.with_raw(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    const NOW: u64 = 1_700_000_000;

    fn pair(liquidity: f64, volume: f64, created_secs_ago: u64) -> DexPair {
        DexPair {
            chain_id: "ethereum".to_string(),
            dex_id: "uniswap".to_string(),
            pair_address: "0xpair".to_string(),
            base_token: DexToken {
                address: "0xbase".to_string(),
                name: None,
                symbol: Some("TKN".to_string()),
            },
            quote_token: DexToken {
                address: "0xquote".to_string(),
                name: None,
                symbol: Some("WETH".to_string()),
            },
            liquidity: Some(DexLiquidity {
                usd: Some(liquidity),
                base: None,
                quote: None,
            }),
            price_usd: Some("1.25".to_string()),
            volume: Some(DexVolume { h24: Some(volume) }),
            pair_created_at: Some((NOW - created_secs_ago) * 1000),
        }
    }

    #[test]
    fn test_healthy_market_has_no_flags() {
        let pairs = vec![
            pair(900_000.0, 100_000.0, 90 * 86_400),
            pair(400_000.0, 50_000.0, 60 * 86_400),
        ];
        let (flags, raw) = market_flags(&pairs, NOW, MIN_LIQUIDITY_USD, NEW_PAIR_HOURS);
        assert!(flags.is_empty());
        assert_eq!(raw["pair_count"], 2);
    }

    #[test]
    fn test_no_pairs_is_thin_liquidity() {
        let (flags, _) = market_flags(&[], NOW, MIN_LIQUIDITY_USD, NEW_PAIR_HOURS);
        assert_eq!(flags, vec![RiskFlag::LiquidityThin]);
    }

    #[test]
    fn test_single_fresh_thin_pair_stacks_flags() {
        let pairs = vec![pair(10_000.0, 1_000.0, 3600)];
        let (flags, _) = market_flags(&pairs, NOW, MIN_LIQUIDITY_USD, NEW_PAIR_HOURS);
        assert!(flags.contains(&RiskFlag::LiquidityThin));
        assert!(flags.contains(&RiskFlag::SingleDexPairOnly));
        assert!(flags.contains(&RiskFlag::PairCreatedRecently));
    }

    #[test]
    fn test_volume_spike_flags_thin_liquidity() {
        let pairs = vec![
            pair(300_000.0, 2_000_000.0, 90 * 86_400),
            pair(100_000.0, 0.0, 90 * 86_400),
        ];
        let (flags, _) = market_flags(&pairs, NOW, MIN_LIQUIDITY_USD, NEW_PAIR_HOURS);
        assert!(flags.contains(&RiskFlag::LiquidityThin));
        assert!(!flags.contains(&RiskFlag::SingleDexPairOnly));
    }

    #[test]
    fn test_pair_created_at_ms_normalized() {
        let p = pair(500_000.0, 10_000.0, 7200);
        assert_eq!(p.created_at_secs(), Some(NOW - 7200));
    }

    #[tokio::test]
    #[ignore] // hits the live API; run with --ignored
    async fn test_live_token_pairs() {
        let client = DexScreenerClient::new();
        let usdt = Address::from_str("0xdAC17F958D2ee523a2206206994597C13D831ec7").unwrap();
        let pairs = client.token_pairs(usdt).await;
        assert!(pairs.is_ok());
    }
}
