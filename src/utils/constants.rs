//! Constants Module - Single Source of Truth
//!
//! CEO Directive: Semua konstanta, endpoint default, dan fungsi konversi
//! yang digunakan di seluruh aplikasi HARUS didefinisikan di sini.
//! Tidak ada hardcoded values di modul lain!

// ============================================
// APPLICATION CONSTANTS
// ============================================

/// Application name
pub const APP_NAME: &str = "FlowTrace";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// User-Agent for HTTP requests
pub const USER_AGENT: &str = "FlowTrace/0.1.0";

// ============================================
// HTTP CONSTANTS
// ============================================

/// Default timeout for HTTP requests (seconds)
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

/// Budget for a single risk provider probe (seconds)
pub const PROVIDER_TIMEOUT_SECS: u64 = 8;

// Note: Retry constants live in src/providers/etherscan.rs next to the
// rate limiter that uses them:
// - ETHERSCAN_BASE_RETRY_MS = 500
// - ETHERSCAN_MAX_RETRIES = 3 (exponential: 0.5s -> 1s -> 2s)

// ============================================
// API ENDPOINTS - Single Source of Truth
// ============================================

/// Etherscan v2 API (free tier, key required, chainid goes in the query)
pub const ETHERSCAN_API_URL: &str = "https://api.etherscan.io/v2/api";

/// DexScreener API (free, no key)
pub const DEXSCREENER_API_URL: &str = "https://api.dexscreener.com/latest/dex";

/// GoPlus token security API (free, no key)
pub const GOPLUS_API_URL: &str = "https://api.gopluslabs.io/api/v1/token_security";

// ============================================
// CHAIN CONSTANTS
// ============================================

/// Ethereum Mainnet
pub const CHAIN_ID_ETHEREUM: u64 = 1;

/// Chain name DexScreener uses for mainnet pairs
pub const DEXSCREENER_CHAIN: &str = "ethereum";

/// Native token symbol
pub const NATIVE_SYMBOL: &str = "ETH";

// ============================================
// WELL-KNOWN TOKEN ADDRESSES - Single Source of Truth
// ============================================

pub const WETH_ADDRESS: &str = "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2";
pub const WBTC_ADDRESS: &str = "0x2260FAC5E5542a773Aa44fBCfeDf7C193bc2C599";
pub const USDC_ADDRESS: &str = "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48";
pub const USDT_ADDRESS: &str = "0xdAC17F958D2ee523a2206206994597C13D831ec7";
pub const DAI_ADDRESS: &str = "0x6B175474E89094C44Da98b954EedeAC495271d0F";

/// Approximate BTC/USD rate for the fixed WBTC quote.
pub const WBTC_USD_FALLBACK: f64 = 93_000.0;

// ============================================
// PRICING CONSTANTS
// ============================================

/// Approximate ETH/USD rate used when no live quote is configured.
/// Override with NATIVE_USD_FALLBACK.
pub const NATIVE_USD_FALLBACK: f64 = 3000.0;

/// Seconds in one day
pub const SECS_PER_DAY: u64 = 86_400;

// ============================================
// CONVERSION UTILITIES - Single Source of Truth
// ============================================

/// Wei per one native unit
pub const WEI_PER_ETH: f64 = 1e18;

/// Decimals assumed for tokens that do not report theirs
pub const DEFAULT_TOKEN_DECIMALS: u8 = 18;

/// Convert a wei quantity to native units
/// CEO Directive: This is THE ONLY place this function should exist!
#[inline]
pub fn wei_to_eth(wei: f64) -> f64 {
    wei / WEI_PER_ETH
}

/// Scale a raw token quantity down by its decimals
#[inline]
pub fn token_units(raw: f64, decimals: u8) -> f64 {
    raw / 10f64.powi(decimals as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wei_to_eth() {
        assert!((wei_to_eth(1_000_000_000_000_000_000.0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_token_units() {
        assert!((token_units(2_500_000.0, 6) - 2.5).abs() < 1e-9);
        assert!((token_units(1e18, DEFAULT_TOKEN_DECIMALS) - 1.0).abs() < 1e-9);
    }
}
