//! In-memory backend for tests and offline runs.
//!
//! Deterministic stand-ins for every port: a transfer source backed by
//! a plain Vec, a price resolver backed by a map, and a signal provider
//! with canned flags. All of them count calls so tests can assert on
//! fetch behavior, and all support injected failures for gap handling.

use alloy_primitives::Address;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::core::graph::Asset;
use crate::models::errors::{AppError, AppResult};
use crate::models::types::RiskFlag;
use crate::ports::{PriceResolver, ProviderReport, RawTransfer, SignalProvider, TransferSource};

fn same_address(raw: &str, address: Address) -> bool {
    Address::from_str(raw.trim())
        .map(|a| a == address)
        .unwrap_or(false)
}

// ============================================
// TRANSFER SOURCE
// ============================================

#[derive(Default)]
pub struct StaticTransferSource {
    transfers: Vec<RawTransfer>,
    contracts: HashMap<Address, bool>,
    fail_for: HashSet<Address>,
    calls: AtomicUsize,
}

impl StaticTransferSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_transfers(mut self, transfers: Vec<RawTransfer>) -> Self {
        self.transfers.extend(transfers);
        self
    }

    pub fn with_transfer(mut self, transfer: RawTransfer) -> Self {
        self.transfers.push(transfer);
        self
    }

    pub fn with_contract(mut self, address: Address, is_contract: bool) -> Self {
        self.contracts.insert(address, is_contract);
        self
    }

    /// Listing this address will fail, simulating a source gap
    pub fn with_failure(mut self, address: Address) -> Self {
        self.fail_for.insert(address);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransferSource for StaticTransferSource {
    async fn list_transfers(
        &self,
        address: Address,
        from_ts: u64,
        to_ts: u64,
    ) -> AppResult<Vec<RawTransfer>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_for.contains(&address) {
            return Err(AppError::source_unavailable(format!(
                "static source configured to fail for {}",
                address
            )));
        }

        let mut matches: Vec<RawTransfer> = self
            .transfers
            .iter()
            .filter(|t| t.timestamp >= from_ts && t.timestamp <= to_ts)
            .filter(|t| same_address(&t.from, address) || same_address(&t.to, address))
            .cloned()
            .collect();
        matches.sort_by_key(|t| t.timestamp);
        Ok(matches)
    }

    async fn is_contract(&self, address: Address) -> AppResult<Option<bool>> {
        Ok(self.contracts.get(&address).copied())
    }
}

// ============================================
// PRICE RESOLVER
// ============================================

pub struct StaticPriceResolver {
    native_usd: f64,
    token_usd: HashMap<Address, f64>,
    fail_for: HashSet<Address>,
    calls: AtomicUsize,
}

impl Default for StaticPriceResolver {
    fn default() -> Self {
        Self::new(3000.0)
    }
}

impl StaticPriceResolver {
    pub fn new(native_usd: f64) -> Self {
        Self {
            native_usd,
            token_usd: HashMap::new(),
            fail_for: HashSet::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_token_price(mut self, token: Address, unit_usd: f64) -> Self {
        self.token_usd.insert(token, unit_usd);
        self
    }

    /// Quotes for this token will fail, simulating resolver errors
    pub fn with_failure(mut self, token: Address) -> Self {
        self.fail_for.insert(token);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceResolver for StaticPriceResolver {
    async fn price_at(&self, asset: &Asset, amount: f64, _at_ts: u64) -> AppResult<Option<f64>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match asset {
            Asset::Native => Ok(Some(self.native_usd * amount)),
            Asset::Token { address, .. } => {
                if self.fail_for.contains(address) {
                    return Err(AppError::price_unavailable(format!(
                        "static resolver configured to fail for {}",
                        address
                    )));
                }
                Ok(self.token_usd.get(address).map(|unit| unit * amount))
            }
        }
    }
}

// ============================================
// SIGNAL PROVIDER
// ============================================

pub struct StaticSignalProvider {
    name: &'static str,
    flags_by_token: HashMap<Address, Vec<RiskFlag>>,
    delay: Option<std::time::Duration>,
    fail: bool,
    calls: AtomicUsize,
}

impl StaticSignalProvider {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            flags_by_token: HashMap::new(),
            delay: None,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_flags(mut self, token: Address, flags: Vec<RiskFlag>) -> Self {
        self.flags_by_token.insert(token, flags);
        self
    }

    /// Every probe sleeps first, for exercising aggregator timeouts
    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every probe fails
    pub fn with_failure(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SignalProvider for StaticSignalProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn probe(&self, token: Address, _at_ts: u64) -> AppResult<ProviderReport> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(AppError::provider_unavailable(format!(
                "static provider {} configured to fail",
                self.name
            )));
        }
        let mut report = ProviderReport::new();
        if let Some(flags) = self.flags_by_token.get(&token) {
            for flag in flags {
                report = report.flag(*flag);
            }
            report = report.with_raw(serde_json::json!({ "provider": self.name }));
        }
        Ok(report)
    }
}

// ============================================
// DEMO DATASET
// ============================================

pub const DEMO_SEED: &str = "0x00000000000000000000000000000000000a11ce";
const DEMO_EXCHANGE: &str = "0x00000000000000000000000000000000000e8c00";
const DEMO_BOB: &str = "0x0000000000000000000000000000000000b0b000";
const DEMO_CAROL: &str = "0x00000000000000000000000000000000000ca401";
const DEMO_DAVE: &str = "0x00000000000000000000000000000000000da7e0";

/// Demo token with suspicious market structure
pub const DEMO_TOKEN_SUS: &str = "0xbb519BDa747465D8fD57a540595b391a0540e66c";
/// Demo token with a clean profile
pub const DEMO_TOKEN_CLEAN: &str = "0xed785Af60bEd688baa8990cD5c4166221599A441";

/// Fixed "now" for the demo so runs are reproducible
pub fn demo_now() -> u64 {
    1_700_000_000
}

fn days_ago(days: u64) -> u64 {
    demo_now() - days * 86_400
}

/// Small value-flow story around the demo seed: an exchange funds the
/// seed, the seed fans out ETH and a suspicious token, and a second
/// hop moves value onward.
pub fn demo_dataset() -> (StaticTransferSource, StaticPriceResolver) {
    let source = StaticTransferSource::new()
        .with_transfers(vec![
            RawTransfer::native(
                "0xd1000000000000000000000000000000000000000000000000000000000000aa",
                DEMO_EXCHANGE,
                DEMO_SEED,
                "10000000000000000000",
                days_ago(20),
            ),
            RawTransfer::native(
                "0xd1000000000000000000000000000000000000000000000000000000000000bb",
                DEMO_SEED,
                DEMO_BOB,
                "4000000000000000000",
                days_ago(15),
            ),
            RawTransfer::token(
                "0xd1000000000000000000000000000000000000000000000000000000000000cc",
                DEMO_SEED,
                DEMO_CAROL,
                DEMO_TOKEN_SUS,
                "100000000000000000000000",
                days_ago(10),
            )
            .with_symbol("SUS")
            .with_decimals(18)
            .with_log_index(7),
            RawTransfer::native(
                "0xd1000000000000000000000000000000000000000000000000000000000000dd",
                DEMO_BOB,
                DEMO_CAROL,
                "2000000000000000000",
                days_ago(5),
            ),
            RawTransfer::token(
                "0xd1000000000000000000000000000000000000000000000000000000000000ee",
                DEMO_CAROL,
                DEMO_DAVE,
                DEMO_TOKEN_CLEAN,
                "1000000000000000000000",
                days_ago(2),
            )
            .with_symbol("CLN")
            .with_decimals(18)
            .with_log_index(2),
            // Dust that a min-usd floor should drop
            RawTransfer::native(
                "0xd1000000000000000000000000000000000000000000000000000000000000ff",
                DEMO_SEED,
                DEMO_BOB,
                "5000000000000",
                days_ago(1),
            ),
        ])
        .with_contract(Address::from_str(DEMO_EXCHANGE).unwrap(), true);

    let prices = StaticPriceResolver::new(3000.0)
        .with_token_price(Address::from_str(DEMO_TOKEN_SUS).unwrap(), 2.0)
        .with_token_price(Address::from_str(DEMO_TOKEN_CLEAN).unwrap(), 2.0);

    (source, prices)
}

/// Canned signals matching the demo dataset's tokens
pub fn demo_signal_provider() -> StaticSignalProvider {
    StaticSignalProvider::new("demo_signals")
        .with_flags(
            Address::from_str(DEMO_TOKEN_SUS).unwrap(),
            vec![
                RiskFlag::SourceUnverified,
                RiskFlag::LiquidityThin,
                RiskFlag::PairCreatedRecently,
                RiskFlag::SingleDexPairOnly,
            ],
        )
        .with_flags(
            Address::from_str(DEMO_TOKEN_CLEAN).unwrap(),
            vec![RiskFlag::SourceVerifiedClean, RiskFlag::LpBurned],
        )
}
