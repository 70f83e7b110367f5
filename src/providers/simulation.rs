//! Trade simulation signals via GoPlus token_security.
//!
//! GoPlus simulates buys and sells off-chain and reports the outcome
//! with stringly-typed fields ("0"/"1" booleans, fractional taxes as
//! decimal strings). This provider normalizes that into flags covering
//! sellability, taxes, holder concentration, LP custody, and ownership.
//!
//! API: https://api.gopluslabs.io/api/v1/token_security/{chain_id}?contract_addresses={addr}
//! Free, no API key required

use alloy_primitives::Address;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::info;

use crate::models::errors::{AppError, AppResult};
use crate::models::types::RiskFlag;
use crate::ports::{ProviderReport, SignalProvider};
use crate::utils::constants::{CHAIN_ID_ETHEREUM, DEFAULT_HTTP_TIMEOUT_SECS, GOPLUS_API_URL};

/// Buy or sell tax above this fraction is excessive
pub const TAX_LIMIT: f64 = 0.10;

/// A single holder above this fraction of supply is a concentration risk
pub const HOLDER_CONCENTRATION_LIMIT: f64 = 0.70;

/// LP is considered secured when at least this fraction is burned or locked
pub const LP_SECURED_MIN: f64 = 0.50;

const BURN_ADDRESSES: [&str; 3] = [
    "0x0000000000000000000000000000000000000000",
    "0x000000000000000000000000000000000000dead",
    "0xdead000000000000000000042069420694206942",
];

// ============================================
// WIRE TYPES
// ============================================

#[derive(Debug, Deserialize)]
struct GoPlusResponse {
    #[serde(default)]
    result: HashMap<String, TokenSecurityRecord>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenSecurityRecord {
    #[serde(default)]
    pub is_honeypot: Option<String>,
    #[serde(default)]
    pub cannot_sell_all: Option<String>,
    #[serde(default)]
    pub buy_tax: Option<String>,
    #[serde(default)]
    pub sell_tax: Option<String>,
    #[serde(default)]
    pub owner_address: Option<String>,
    #[serde(default)]
    pub holders: Vec<HolderRecord>,
    #[serde(default)]
    pub lp_holders: Vec<HolderRecord>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HolderRecord {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub percent: Option<String>,
    #[serde(default)]
    pub is_locked: Option<u8>,
}

impl HolderRecord {
    fn fraction(&self) -> f64 {
        self.percent
            .as_deref()
            .and_then(|p| p.parse().ok())
            .unwrap_or(0.0)
    }

    fn is_burn(&self) -> bool {
        let addr = self.address.to_lowercase();
        BURN_ADDRESSES.iter().any(|b| *b == addr)
    }
}

fn truthy(field: &Option<String>) -> bool {
    matches!(field.as_deref(), Some("1"))
}

fn tax(field: &Option<String>) -> f64 {
    field.as_deref().and_then(|t| t.parse().ok()).unwrap_or(0.0)
}

/// Pure flag derivation from a security record
fn security_flags(record: &TokenSecurityRecord) -> (Vec<RiskFlag>, serde_json::Value) {
    let mut flags = Vec::new();

    if truthy(&record.is_honeypot) || truthy(&record.cannot_sell_all) {
        flags.push(RiskFlag::SellBlocked);
    }
    let buy_tax = tax(&record.buy_tax);
    let sell_tax = tax(&record.sell_tax);
    if buy_tax > TAX_LIMIT {
        flags.push(RiskFlag::BuyTaxExcessive);
    }
    if sell_tax > TAX_LIMIT {
        flags.push(RiskFlag::SellTaxExcessive);
    }

    let top_holder = record
        .holders
        .iter()
        .map(|h| h.fraction())
        .fold(0.0_f64, f64::max);
    if top_holder > HOLDER_CONCENTRATION_LIMIT {
        flags.push(RiskFlag::HolderConcentration);
    }

    // LP custody: burned majority is a positive signal, neither burned
    // nor locked is a negative one. No LP data leaves both unset.
    let burned: f64 = record
        .lp_holders
        .iter()
        .filter(|h| h.is_burn())
        .map(|h| h.fraction())
        .sum();
    let locked: f64 = record
        .lp_holders
        .iter()
        .filter(|h| !h.is_burn() && h.is_locked == Some(1))
        .map(|h| h.fraction())
        .sum();
    if !record.lp_holders.is_empty() {
        if burned >= LP_SECURED_MIN {
            flags.push(RiskFlag::LpBurned);
        } else if burned + locked < LP_SECURED_MIN {
            flags.push(RiskFlag::LpUnlocked);
        }
    }

    // GoPlus reports renunciation as an empty string or burn-address
    // owner; an absent field is missing data, not a positive signal.
    let renounced = match record.owner_address.as_deref() {
        Some("") => true,
        Some(owner) => {
            let owner = owner.to_lowercase();
            BURN_ADDRESSES.iter().any(|b| *b == owner)
        }
        None => false,
    };
    if renounced {
        flags.push(RiskFlag::OwnershipRenounced);
    }

    let raw = serde_json::json!({
        "is_honeypot": truthy(&record.is_honeypot),
        "cannot_sell_all": truthy(&record.cannot_sell_all),
        "buy_tax": buy_tax,
        "sell_tax": sell_tax,
        "top_holder_fraction": top_holder,
        "lp_burned_fraction": burned,
        "lp_locked_fraction": locked,
        "ownership_renounced": renounced,
    });
    (flags, raw)
}

// ============================================
// PROVIDER
// ============================================

pub struct SimulationProvider {
    client: reqwest::Client,
    base_url: String,
    chain_id: u64,
}

impl Default for SimulationProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulationProvider {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: GOPLUS_API_URL.to_string(),
            chain_id: CHAIN_ID_ETHEREUM,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn fetch_record(&self, token: Address) -> AppResult<Option<TokenSecurityRecord>> {
        let url = format!(
            "{}/{}?contract_addresses={:?}",
            self.base_url, self.chain_id, token
        );

        let response = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS))
            .send()
            .await
            .map_err(|e| AppError::provider_unavailable(format!("goplus: {}", e)))?
            .error_for_status()
            .map_err(|e| AppError::provider_unavailable(format!("goplus: {}", e)))?;

        let data: GoPlusResponse = response
            .json()
            .await
            .map_err(|e| AppError::provider_invalid_response(format!("goplus: {}", e)))?;

        // Records come back keyed by lowercase address
        let key = format!("{:?}", token).to_lowercase();
        Ok(data.result.get(&key).cloned())
    }
}

#[async_trait]
impl SignalProvider for SimulationProvider {
    fn name(&self) -> &'static str {
        "goplus"
    }

    async fn probe(&self, token: Address, _at_ts: u64) -> AppResult<ProviderReport> {
        let record = match self.fetch_record(token).await? {
            Some(r) => r,
            // Unknown to GoPlus: no simulation evidence either way
            None => return Ok(ProviderReport::new()),
        };

        let (flags, raw) = security_flags(&record);
        info!(
            "🧪 Simulation signals for {}: {} flags",
            token,
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

    fn holder(address: &str, percent: &str, locked: u8) -> HolderRecord {
        HolderRecord {
            address: address.to_string(),
            percent: Some(percent.to_string()),
            is_locked: Some(locked),
        }
    }

    #[test]
    fn test_honeypot_flags_sell_blocked() {
        let record = TokenSecurityRecord {
            is_honeypot: Some("1".to_string()),
            ..Default::default()
        };
        let (flags, raw) = security_flags(&record);
        assert!(flags.contains(&RiskFlag::SellBlocked));
        assert_eq!(raw["is_honeypot"], true);
    }

    #[test]
    fn test_excessive_taxes() {
        let record = TokenSecurityRecord {
            buy_tax: Some("0.15".to_string()),
            sell_tax: Some("0.05".to_string()),
            ..Default::default()
        };
        let (flags, _) = security_flags(&record);
        assert!(flags.contains(&RiskFlag::BuyTaxExcessive));
        assert!(!flags.contains(&RiskFlag::SellTaxExcessive));
    }

    #[test]
    fn test_holder_concentration() {
        let record = TokenSecurityRecord {
            holders: vec![
                holder("0xaaa", "0.82", 0),
                holder("0xbbb", "0.05", 0),
            ],
            ..Default::default()
        };
        let (flags, raw) = security_flags(&record);
        assert!(flags.contains(&RiskFlag::HolderConcentration));
        assert_eq!(raw["top_holder_fraction"], 0.82);
    }

    #[test]
    fn test_burned_lp_is_positive() {
        let record = TokenSecurityRecord {
            owner_address: Some("0x1111111111111111111111111111111111111111".to_string()),
            lp_holders: vec![holder(
                "0x000000000000000000000000000000000000dead",
                "0.95",
                0,
            )],
            ..Default::default()
        };
        let (flags, _) = security_flags(&record);
        assert!(flags.contains(&RiskFlag::LpBurned));
        assert!(!flags.contains(&RiskFlag::LpUnlocked));
    }

    #[test]
    fn test_unlocked_lp_flagged() {
        let record = TokenSecurityRecord {
            owner_address: Some("0x1111111111111111111111111111111111111111".to_string()),
            lp_holders: vec![
                holder("0xaaa", "0.60", 0),
                holder("0xbbb", "0.30", 1),
            ],
            ..Default::default()
        };
        let (flags, _) = security_flags(&record);
        assert!(flags.contains(&RiskFlag::LpUnlocked));
    }

    #[test]
    fn test_locked_lp_not_flagged() {
        let record = TokenSecurityRecord {
            owner_address: Some("0x1111111111111111111111111111111111111111".to_string()),
            lp_holders: vec![holder("0xaaa", "0.80", 1)],
            ..Default::default()
        };
        let (flags, _) = security_flags(&record);
        assert!(!flags.contains(&RiskFlag::LpUnlocked));
        assert!(!flags.contains(&RiskFlag::LpBurned));
    }

    #[test]
    fn test_ownership_renounced_positive() {
        let record = TokenSecurityRecord {
            owner_address: Some("0x0000000000000000000000000000000000000000".to_string()),
            ..Default::default()
        };
        let (flags, _) = security_flags(&record);
        assert!(flags.contains(&RiskFlag::OwnershipRenounced));

        let record = TokenSecurityRecord {
            owner_address: Some(String::new()),
            ..Default::default()
        };
        let (flags, _) = security_flags(&record);
        assert!(flags.contains(&RiskFlag::OwnershipRenounced));
    }

    #[test]
    fn test_absent_owner_field_is_neutral() {
        // No owner data at all must not award the positive flag
        let record = TokenSecurityRecord::default();
        let (flags, raw) = security_flags(&record);
        assert!(!flags.contains(&RiskFlag::OwnershipRenounced));
        assert_eq!(raw["ownership_renounced"], false);
    }

    #[test]
    fn test_goplus_response_shape_parses() {
        let body = serde_json::json!({
            "code": 1,
            "message": "ok",
            "result": {
                "0xabc": {
                    "is_honeypot": "0",
                    "buy_tax": "0.01",
                    "sell_tax": "0.01",
                    "owner_address": "0x1111111111111111111111111111111111111111",
                    "holders": [{"address": "0xaaa", "percent": "0.1", "is_locked": 0}],
                    "lp_holders": []
                }
            }
        });
        let parsed: GoPlusResponse = serde_json::from_value(body).unwrap();
        let record = &parsed.result["0xabc"];
        let (flags, _) = security_flags(record);
        assert!(flags.is_empty());
    }
}
