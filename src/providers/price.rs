//! USD price resolution - "The Appraiser"
//!
//! Resolution ladder, first hit wins:
//! 1. Native asset: configured ETH/USD rate
//! 2. Wrapped native (WETH): same rate
//! 3. Fixed quote table (WBTC)
//! 4. Stablecoins (USDC/USDT/DAI): pinned to $1
//! 5. Per-run cache
//! 6. DexScreener deepest-pair spot quote
//!
//! Spot quotes stand in for historical prices; `at_ts` is accepted so a
//! historical source can slot in without changing the trait.

use alloy_primitives::Address;
use async_trait::async_trait;
use dashmap::DashMap;
use lazy_static::lazy_static;
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

use crate::core::graph::Asset;
use crate::models::errors::{AppError, AppResult};
use crate::ports::PriceResolver;
use crate::providers::dexscreener::DexScreenerClient;
use crate::utils::constants::{
    DAI_ADDRESS, NATIVE_USD_FALLBACK, USDC_ADDRESS, USDT_ADDRESS, WBTC_ADDRESS,
    WBTC_USD_FALLBACK, WETH_ADDRESS,
};

lazy_static! {
    static ref WETH: Address = Address::from_str(WETH_ADDRESS).unwrap();
    static ref STABLECOIN_ADDRESSES: HashSet<Address> = [USDC_ADDRESS, USDT_ADDRESS, DAI_ADDRESS]
        .iter()
        .map(|a| Address::from_str(a).unwrap())
        .collect();
    static ref FIXED_TOKEN_USD: HashMap<Address, f64> =
        HashMap::from([(Address::from_str(WBTC_ADDRESS).unwrap(), WBTC_USD_FALLBACK)]);
}

pub struct MarketPriceResolver {
    dexscreener: Arc<DexScreenerClient>,
    native_usd: f64,
    cache: DashMap<Address, f64>,
}

impl MarketPriceResolver {
    pub fn new(dexscreener: Arc<DexScreenerClient>) -> Self {
        let native_usd = std::env::var("NATIVE_USD_FALLBACK")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(NATIVE_USD_FALLBACK);
        Self {
            dexscreener,
            native_usd,
            cache: DashMap::new(),
        }
    }

    pub fn with_native_rate(mut self, rate: f64) -> Self {
        self.native_usd = rate;
        self
    }

    async fn token_unit_price(&self, token: Address) -> AppResult<Option<f64>> {
        if token == *WETH {
            return Ok(Some(self.native_usd));
        }
        if let Some(fixed) = FIXED_TOKEN_USD.get(&token) {
            return Ok(Some(*fixed));
        }
        if STABLECOIN_ADDRESSES.contains(&token) {
            return Ok(Some(1.0));
        }
        if let Some(cached) = self.cache.get(&token) {
            return Ok(Some(*cached));
        }

        match self.dexscreener.spot_price(token).await {
            Ok(Some(price)) => {
                debug!("💾 Cached spot price for {}: ${}", token, price);
                self.cache.insert(token, price);
                Ok(Some(price))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(AppError::price_unavailable(format!(
                "spot quote for {} failed: {}",
                token, e
            ))),
        }
    }
}

#[async_trait]
impl PriceResolver for MarketPriceResolver {
    async fn price_at(&self, asset: &Asset, amount: f64, _at_ts: u64) -> AppResult<Option<f64>> {
        let unit = match asset {
            Asset::Native => Some(self.native_usd),
            Asset::Token { address, .. } => self.token_unit_price(*address).await?,
        };
        Ok(unit.map(|price| price * amount))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::errors::ErrorCode;

    fn resolver() -> MarketPriceResolver {
        MarketPriceResolver::new(Arc::new(DexScreenerClient::new())).with_native_rate(3000.0)
    }

    #[tokio::test]
    async fn test_native_uses_configured_rate() {
        let value = resolver()
            .price_at(&Asset::Native, 2.0, 1_700_000_000)
            .await
            .unwrap();
        assert_eq!(value, Some(6000.0));
    }

    #[tokio::test]
    async fn test_weth_tracks_native_rate() {
        let weth = Asset::token(
            Address::from_str(WETH_ADDRESS).unwrap(),
            Some("WETH".to_string()),
        );
        let value = resolver().price_at(&weth, 0.5, 1_700_000_000).await.unwrap();
        assert_eq!(value, Some(1500.0));
    }

    #[tokio::test]
    async fn test_stablecoins_pinned_to_one_dollar() {
        let usdc = Asset::token(
            Address::from_str(USDC_ADDRESS).unwrap(),
            Some("USDC".to_string()),
        );
        let value = resolver()
            .price_at(&usdc, 250.0, 1_700_000_000)
            .await
            .unwrap();
        assert_eq!(value, Some(250.0));
    }

    #[tokio::test]
    async fn test_wbtc_uses_fixed_quote() {
        let wbtc = Asset::token(Address::from_str(WBTC_ADDRESS).unwrap(), None);
        let value = resolver().price_at(&wbtc, 1.0, 1_700_000_000).await.unwrap();
        assert_eq!(value, Some(WBTC_USD_FALLBACK));
    }

    #[tokio::test]
    async fn test_unreachable_quote_source_is_an_error() {
        let client = DexScreenerClient::new().with_base_url("http://127.0.0.1:1");
        let resolver = MarketPriceResolver::new(Arc::new(client)).with_native_rate(3000.0);
        let unknown = Asset::token(
            Address::from_str("0x00000000000000000000000000000000000000ff").unwrap(),
            None,
        );
        let err = resolver
            .price_at(&unknown, 1.0, 1_700_000_000)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::PriceUnavailable);
    }
}
