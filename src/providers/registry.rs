//! Curated deny/allow list signals.
//!
//! Operators maintain plain text files of token addresses, one per
//! line, `#` for comments. A denylist hit is the single flag that can
//! force the confirmed-scam label; an allowlist hit returns a clean
//! report regardless of the denylist. Lists load once at startup, so
//! probes never touch the filesystem.

use alloy_primitives::Address;
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info, warn};

use crate::models::errors::AppResult;
use crate::models::types::RiskFlag;
use crate::ports::{ProviderReport, SignalProvider};

pub const DENYLIST_ENV: &str = "RISK_DENYLIST_FILE";
pub const ALLOWLIST_ENV: &str = "RISK_ALLOWLIST_FILE";

pub struct CuratedListProvider {
    denylist: HashSet<Address>,
    allowlist: HashSet<Address>,
}

impl CuratedListProvider {
    pub fn new(denylist: HashSet<Address>, allowlist: HashSet<Address>) -> Self {
        Self {
            denylist,
            allowlist,
        }
    }

    /// Load lists from the paths in RISK_DENYLIST_FILE and
    /// RISK_ALLOWLIST_FILE. Unset or unreadable paths mean empty lists.
    pub fn from_env() -> Self {
        let denylist = std::env::var(DENYLIST_ENV)
            .ok()
            .map(|p| load_list(&p))
            .unwrap_or_default();
        let allowlist = std::env::var(ALLOWLIST_ENV)
            .ok()
            .map(|p| load_list(&p))
            .unwrap_or_default();
        info!(
            "📋 Curated lists loaded: {} denied, {} allowed",
            denylist.len(),
            allowlist.len()
        );
        Self::new(denylist, allowlist)
    }

    pub fn is_empty(&self) -> bool {
        self.denylist.is_empty() && self.allowlist.is_empty()
    }
}

fn load_list(path: &str) -> HashSet<Address> {
    let content = match std::fs::read_to_string(Path::new(path)) {
        Ok(c) => c,
        Err(e) => {
            debug!("Curated list {} not readable: {}", path, e);
            return HashSet::new();
        }
    };

    let mut addresses = HashSet::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match Address::from_str(line) {
            Ok(addr) => {
                addresses.insert(addr);
            }
            Err(_) => warn!("⚠️ Skipping bad address in {}: '{}'", path, line),
        }
    }
    addresses
}

#[async_trait]
impl SignalProvider for CuratedListProvider {
    fn name(&self) -> &'static str {
        "curated_lists"
    }

    async fn probe(&self, token: Address, _at_ts: u64) -> AppResult<ProviderReport> {
        if self.allowlist.contains(&token) {
            return Ok(ProviderReport::new().with_raw(serde_json::json!({ "listed": "allow" })));
        }
        if self.denylist.contains(&token) {
            info!("🚫 Denylist match: {}", token);
            return Ok(ProviderReport::new()
                .flag(RiskFlag::ScamListMatch)
                .with_raw(serde_json::json!({ "listed": "deny" })));
        }
        Ok(ProviderReport::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u8) -> Address {
        Address::from_str(&format!("0x{:040x}", n)).unwrap()
    }

    #[tokio::test]
    async fn test_denylist_match() {
        let provider = CuratedListProvider::new([addr(5)].into(), HashSet::new());
        let report = provider.probe(addr(5), 0).await.unwrap();
        assert_eq!(report.flags, vec![RiskFlag::ScamListMatch]);
    }

    #[tokio::test]
    async fn test_allowlist_wins_over_denylist() {
        let provider = CuratedListProvider::new([addr(5)].into(), [addr(5)].into());
        let report = provider.probe(addr(5), 0).await.unwrap();
        assert!(report.flags.is_empty());
        assert_eq!(report.raw["listed"], "allow");
    }

    #[tokio::test]
    async fn test_unlisted_token_is_silent() {
        let provider = CuratedListProvider::new([addr(5)].into(), HashSet::new());
        let report = provider.probe(addr(9), 0).await.unwrap();
        assert!(report.flags.is_empty());
        assert!(report.raw.is_null());
    }

    #[test]
    fn test_load_list_skips_comments_and_garbage() {
        let dir = std::env::temp_dir().join("flowtrace_registry_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("denylist.txt");
        std::fs::write(
            &path,
            "# known drainers\n0x0000000000000000000000000000000000000005\nnot-an-address\n\n",
        )
        .unwrap();

        let list = load_list(path.to_str().unwrap());
        assert_eq!(list.len(), 1);
        assert!(list.contains(&addr(5)));
    }

    #[test]
    fn test_missing_file_is_empty_list() {
        assert!(load_list("/definitely/not/here.txt").is_empty());
    }
}
