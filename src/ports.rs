//! Port traits consumed by the trace engine.
//!
//! Each capability is an async trait with swappable backends: networked
//! adapters under `providers/`, deterministic in-memory implementations in
//! `providers::static_backend` for tests and offline mode. Backends are
//! injected as `Arc<dyn Trait>` at composition time.

use alloy_primitives::Address;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::graph::Asset;
use crate::models::errors::AppResult;
use crate::models::types::TokenRisk;

pub use crate::models::types::ProviderReport;

/// Asset identifier as it arrives from a transfer backend, untrusted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RawAsset {
    /// Chain-native asset; amounts are wei
    Native,
    /// ERC-20 style token; amounts are raw units scaled by `decimals`
    Token {
        address: String,
        symbol: Option<String>,
        decimals: Option<u8>,
    },
}

/// One transfer record as returned by a backend, before validation.
/// Addresses and the amount are untrusted strings; records that fail to
/// parse into the graph model are dropped as malformed with an audit note.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTransfer {
    pub tx_hash: String,
    pub from: String,
    pub to: String,
    pub asset: RawAsset,
    /// Raw integer amount as a decimal string (wei or token base units)
    pub amount: String,
    /// Unix seconds
    pub timestamp: u64,
    /// Event log index, when the backend reports one
    pub log_index: Option<u64>,
}

impl RawTransfer {
    /// Native transfer, amount in wei
    pub fn native(
        tx_hash: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
        amount_wei: impl Into<String>,
        timestamp: u64,
    ) -> Self {
        Self {
            tx_hash: tx_hash.into(),
            from: from.into(),
            to: to.into(),
            asset: RawAsset::Native,
            amount: amount_wei.into(),
            timestamp,
            log_index: None,
        }
    }

    /// Token transfer, amount in raw base units
    pub fn token(
        tx_hash: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
        token_address: impl Into<String>,
        amount_raw: impl Into<String>,
        timestamp: u64,
    ) -> Self {
        Self {
            tx_hash: tx_hash.into(),
            from: from.into(),
            to: to.into(),
            asset: RawAsset::Token {
                address: token_address.into(),
                symbol: None,
                decimals: None,
            },
            amount: amount_raw.into(),
            timestamp,
            log_index: None,
        }
    }

    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        if let RawAsset::Token { symbol: s, .. } = &mut self.asset {
            *s = Some(symbol.into());
        }
        self
    }

    pub fn with_decimals(mut self, decimals: u8) -> Self {
        if let RawAsset::Token { decimals: d, .. } = &mut self.asset {
            *d = Some(decimals);
        }
        self
    }

    pub fn with_log_index(mut self, log_index: u64) -> Self {
        self.log_index = Some(log_index);
        self
    }
}

/// Transfer retrieval capability
#[async_trait]
pub trait TransferSource: Send + Sync {
    /// All transfers touching `address` within `[from_ts, to_ts]`.
    /// An error is treated by the controller as a per-address gap,
    /// never a global abort.
    async fn list_transfers(
        &self,
        address: Address,
        from_ts: u64,
        to_ts: u64,
    ) -> AppResult<Vec<RawTransfer>>;

    /// Whether `address` carries code. `Ok(None)` when the backend
    /// cannot answer; the node flag then stays unknown.
    async fn is_contract(&self, _address: Address) -> AppResult<Option<bool>> {
        Ok(None)
    }
}

/// USD price resolution capability
#[async_trait]
pub trait PriceResolver: Send + Sync {
    /// USD value of `amount` units of `asset` at `at_ts`.
    /// `Ok(None)` means unresolved; an error is a resolver outage and is
    /// treated as unresolved by the controller after logging.
    async fn price_at(&self, asset: &Asset, amount: f64, at_ts: u64) -> AppResult<Option<f64>>;
}

/// Token risk assessment capability
#[async_trait]
pub trait TokenRiskSource: Send + Sync {
    /// Assessment for `token` as of `at_ts`. Total: a fully failed
    /// provider fan-out yields UNKNOWN, never an error.
    async fn assess(&self, token: Address, at_ts: u64) -> TokenRisk;
}

/// One independent risk evidence source behind the aggregator
#[async_trait]
pub trait SignalProvider: Send + Sync {
    /// Stable name, used as the signals-bag key
    fn name(&self) -> &'static str;

    /// Probe one token. A failure costs only this provider's signals.
    async fn probe(&self, token: Address, at_ts: u64) -> AppResult<ProviderReport>;
}
