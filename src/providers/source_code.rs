//! Contract source verification signals.
//!
//! Wraps Etherscan's getsourcecode endpoint: unverified source is a
//! flag on its own, verified source gets a shallow scan for privileged
//! functions. Shares the Etherscan client so the key-wide rate limiter
//! covers these calls too.

use alloy_primitives::Address;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::models::errors::{AppError, AppResult};
use crate::models::types::RiskFlag;
use crate::ports::{ProviderReport, SignalProvider};
use crate::providers::etherscan::{ContractSourceRecord, EtherscanClient};

/// Public mint entry points. Internal `_mint` is deliberately not
/// matched: every flattened ERC-20 carries it.
const MINT_PATTERNS: [&str; 2] = ["function mint(", "function mint ("];

const BLACKLIST_PATTERNS: [&str; 3] = ["blacklist", "blocklist", "denylist"];

pub struct ContractSourceProvider {
    client: Arc<EtherscanClient>,
}

impl ContractSourceProvider {
    pub fn new(client: Arc<EtherscanClient>) -> Self {
        Self { client }
    }
}

/// Pure flag derivation from a source record
fn source_flags(record: &ContractSourceRecord) -> (Vec<RiskFlag>, serde_json::Value) {
    if !record.is_verified() {
        let raw = serde_json::json!({ "verified": false });
        return (vec![RiskFlag::SourceUnverified], raw);
    }

    let source = record.source_code.to_lowercase();
    let has_mint = MINT_PATTERNS.iter().any(|p| source.contains(p));
    let has_blacklist = BLACKLIST_PATTERNS.iter().any(|p| source.contains(p));

    let mut flags = Vec::new();
    if has_mint {
        flags.push(RiskFlag::MintFunction);
    }
    if has_blacklist {
        flags.push(RiskFlag::BlacklistFunction);
    }
    if flags.is_empty() {
        flags.push(RiskFlag::SourceVerifiedClean);
    }

    let raw = serde_json::json!({
        "verified": true,
        "contract_name": record.contract_name,
        "mint_detected": has_mint,
        "blacklist_detected": has_blacklist,
    });
    (flags, raw)
}

#[async_trait]
impl SignalProvider for ContractSourceProvider {
    fn name(&self) -> &'static str {
        "contract_source"
    }

    async fn probe(&self, token: Address, _at_ts: u64) -> AppResult<ProviderReport> {
        let record = self
            .client
            .contract_source(token)
            .await
            .map_err(|e| AppError::provider_unavailable(format!("contract source: {}", e)))?;

        let (flags, raw) = source_flags(&record);
        info!(
            "🔍 Source check for {}: verified={}, {} flags",
            token,
            record.is_verified(),
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

    fn verified(source: &str) -> ContractSourceRecord {
        ContractSourceRecord {
            source_code: source.to_string(),
            abi: "[]".to_string(),
            contract_name: "Token".to_string(),
        }
    }

    #[test]
    fn test_unverified_source_flags() {
        let record = ContractSourceRecord {
            source_code: String::new(),
            abi: "Contract source code not verified".to_string(),
            contract_name: String::new(),
        };
        let (flags, raw) = source_flags(&record);
        assert_eq!(flags, vec![RiskFlag::SourceUnverified]);
        assert_eq!(raw["verified"], false);
    }

    #[test]
    fn test_mint_function_detected() {
        let (flags, _) = source_flags(&verified(
            "contract Token { function mint(address to, uint256 amount) external onlyOwner {} }",
        ));
        assert_eq!(flags, vec![RiskFlag::MintFunction]);
    }

    #[test]
    fn test_internal_mint_not_flagged() {
        let (flags, _) = source_flags(&verified(
            "abstract contract ERC20 { function _mint(address account, uint256 amount) internal {} }",
        ));
        assert_eq!(flags, vec![RiskFlag::SourceVerifiedClean]);
    }

    #[test]
    fn test_blacklist_detected() {
        let (flags, _) = source_flags(&verified(
            "contract Token { mapping(address => bool) public isBlacklisted; }",
        ));
        assert_eq!(flags, vec![RiskFlag::BlacklistFunction]);
    }

    #[test]
    fn test_clean_source_is_positive_signal() {
        let (flags, raw) = source_flags(&verified(
            "contract Token { function transfer(address to, uint256 v) external {} }",
        ));
        assert_eq!(flags, vec![RiskFlag::SourceVerifiedClean]);
        assert_eq!(raw["contract_name"], "Token");
    }
}
