//! Etherscan API Client - "The Chain Historian"
//!
//! Transfer retrieval and contract detection over the free-tier v2 API.
//! One shared client per process: the min-interval rate limiter and the
//! retry budget are key-wide, so every consumer (transfer listing,
//! bytecode checks, source lookups) goes through the same throttle.
//!
//! Endpoints used:
//! - block/getblocknobytime: timestamp window -> block window
//! - account/txlist: native transfers (failed txs skipped, no value moved)
//! - account/tokentx: ERC-20 transfer events
//! - proxy/eth_getCode: contract detection
//! - contract/getsourcecode: verification status for risk flags

use alloy_primitives::Address;
use async_trait::async_trait;
use dashmap::DashMap;
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_ENCODING, USER_AGENT};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::models::errors::{AppError, AppResult};
use crate::ports::{RawTransfer, TransferSource};
use crate::utils::constants::{
    CHAIN_ID_ETHEREUM, DEFAULT_HTTP_TIMEOUT_SECS, ETHERSCAN_API_URL,
    USER_AGENT as USER_AGENT_CONST,
};

// ============================================
// RATE LIMIT & RETRY CONSTANTS
// ============================================

/// Free tier allows 5 req/s; stay well under it
pub const ETHERSCAN_MIN_INTERVAL_MS: u64 = 500;

/// Base retry delay in milliseconds
pub const ETHERSCAN_BASE_RETRY_MS: u64 = 500;

/// Maximum retry delay in milliseconds
pub const ETHERSCAN_MAX_RETRY_MS: u64 = 8_000;

/// Retries after the first attempt (exponential: 0.5s -> 1s -> 2s)
pub const ETHERSCAN_MAX_RETRIES: u32 = 3;

/// Jitter added to each retry delay to avoid thundering herd
pub const RETRY_JITTER_PERCENT: u64 = 20;

/// Etherscan caps account listings at this many rows per page
pub const ETHERSCAN_PAGE_SIZE: usize = 1000;

// ============================================
// WIRE TYPES
// ============================================

/// Every Etherscan reply wraps its payload in this envelope
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    result: serde_json::Value,
}

impl Envelope {
    /// Rows of a listing reply; empty-result replies ("No transactions
    /// found") come back as status 0 with an empty array.
    fn rows(&self) -> Vec<serde_json::Value> {
        match &self.result {
            serde_json::Value::Array(rows) => rows.clone(),
            _ => Vec::new(),
        }
    }

    fn is_rate_limited(&self) -> bool {
        if self.status != "0" {
            return false;
        }
        let message = self.message.to_lowercase();
        let result = self
            .result
            .as_str()
            .map(|s| s.to_lowercase())
            .unwrap_or_default();
        message.contains("rate") || result.contains("rate")
    }
}

#[derive(Debug, Clone, Deserialize)]
struct NativeTxRecord {
    hash: String,
    from: String,
    #[serde(default)]
    to: String,
    value: String,
    #[serde(rename = "timeStamp")]
    time_stamp: String,
    #[serde(rename = "isError", default)]
    is_error: String,
}

#[derive(Debug, Clone, Deserialize)]
struct TokenTxRecord {
    hash: String,
    from: String,
    #[serde(default)]
    to: String,
    value: String,
    #[serde(rename = "timeStamp")]
    time_stamp: String,
    #[serde(rename = "contractAddress")]
    contract_address: String,
    #[serde(rename = "tokenSymbol", default)]
    token_symbol: String,
    #[serde(rename = "tokenDecimal", default)]
    token_decimal: String,
}

/// contract/getsourcecode record, used by the source-verification
/// risk provider
#[derive(Debug, Clone, Deserialize)]
pub struct ContractSourceRecord {
    #[serde(rename = "SourceCode", default)]
    pub source_code: String,
    #[serde(rename = "ABI", default)]
    pub abi: String,
    #[serde(rename = "ContractName", default)]
    pub contract_name: String,
}

impl ContractSourceRecord {
    pub fn is_verified(&self) -> bool {
        !self.source_code.trim().is_empty()
            && self.abi != "Contract source code not verified"
    }
}

// ============================================
// CLIENT
// ============================================

pub struct EtherscanClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    chain_id: u64,
    /// Last request instant; locked across the pre-request sleep so
    /// concurrent callers queue behind one throttle.
    last_request: Mutex<Option<Instant>>,
    /// (from_ts, to_ts) -> (start_block, end_block)
    block_windows: DashMap<(u64, u64), (u64, u64)>,
    code_cache: DashMap<Address, bool>,
}

impl EtherscanClient {
    pub fn new(api_key: impl Into<String>) -> AppResult<Self> {
        Ok(Self {
            client: build_client()?,
            base_url: ETHERSCAN_API_URL.to_string(),
            api_key: api_key.into(),
            chain_id: CHAIN_ID_ETHEREUM,
            last_request: Mutex::new(None),
            block_windows: DashMap::new(),
            code_cache: DashMap::new(),
        })
    }

    /// Build from ETHERSCAN_API_KEY; fails fast when it is absent.
    /// ETHERSCAN_BASE_URL overrides the default endpoint (mirrors,
    /// proxies, test servers).
    pub fn from_env() -> AppResult<Self> {
        let api_key = std::env::var("ETHERSCAN_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| AppError::missing_api_key("ETHERSCAN_API_KEY"))?;
        let client = Self::new(api_key)?;
        Ok(match std::env::var("ETHERSCAN_BASE_URL") {
            Ok(url) if !url.trim().is_empty() => client.with_base_url(url.trim()),
            _ => client,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Serialize callers through the minimum request interval
    async fn throttle(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(prev) = *last {
            let gap = Duration::from_millis(ETHERSCAN_MIN_INTERVAL_MS);
            let elapsed = prev.elapsed();
            if elapsed < gap {
                tokio::time::sleep(gap - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    /// One API call with rate limiting and exponential backoff.
    /// Rate-limit replies count as retryable failures.
    async fn call(&self, params: &[(&str, String)]) -> AppResult<Envelope> {
        let chain_id = self.chain_id.to_string();
        let mut last_err: Option<AppError> = None;

        for attempt in 0..=ETHERSCAN_MAX_RETRIES {
            if attempt > 0 {
                let base_delay = ETHERSCAN_BASE_RETRY_MS * 2_u64.pow(attempt - 1);
                let capped_delay = base_delay.min(ETHERSCAN_MAX_RETRY_MS);
                let jitter_range = (capped_delay * RETRY_JITTER_PERCENT) / 100;
                let jitter: i64 =
                    rand::thread_rng().gen_range(-(jitter_range as i64)..=(jitter_range as i64));
                let delay = (capped_delay as i64 + jitter).max(100) as u64;
                debug!(
                    "⏳ Etherscan retry {}/{} after {}ms",
                    attempt, ETHERSCAN_MAX_RETRIES, delay
                );
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }

            self.throttle().await;

            let mut query: Vec<(&str, String)> = params.to_vec();
            query.push(("chainid", chain_id.clone()));
            query.push(("apikey", self.api_key.clone()));

            let response = match self.client.get(&self.base_url).query(&query).send().await {
                Ok(r) => r,
                Err(e) => {
                    last_err = Some(AppError::from(e));
                    continue;
                }
            };
            let response = match response.error_for_status() {
                Ok(r) => r,
                Err(e) => {
                    last_err = Some(AppError::from(e));
                    continue;
                }
            };
            let envelope: Envelope = match response.json().await {
                Ok(e) => e,
                Err(e) => {
                    last_err = Some(AppError::from(e));
                    continue;
                }
            };

            if envelope.is_rate_limited() {
                warn!("⚠️ Etherscan rate limited: {}", envelope.message);
                last_err = Some(AppError::source_rate_limited(envelope.message));
                continue;
            }

            return Ok(envelope);
        }

        Err(last_err
            .unwrap_or_else(|| AppError::source_unavailable("Etherscan failed after retries")))
    }

    /// Closest block for a timestamp (`closest` is "before" or "after")
    async fn block_by_time(&self, unix_ts: u64, closest: &str) -> AppResult<u64> {
        let envelope = self
            .call(&[
                ("module", "block".to_string()),
                ("action", "getblocknobytime".to_string()),
                ("timestamp", unix_ts.to_string()),
                ("closest", closest.to_string()),
            ])
            .await?;

        envelope
            .result
            .as_str()
            .and_then(|s| s.parse::<u64>().ok())
            .ok_or_else(|| {
                AppError::source_invalid_response(format!(
                    "invalid block for ts {}: {:?}",
                    unix_ts, envelope.result
                ))
            })
    }

    /// Resolve and memoize the block window for a timestamp window
    async fn block_window(&self, from_ts: u64, to_ts: u64) -> AppResult<(u64, u64)> {
        if let Some(window) = self.block_windows.get(&(from_ts, to_ts)) {
            return Ok(*window);
        }
        let start_block = self.block_by_time(from_ts, "after").await?;
        let end_block = self.block_by_time(to_ts, "before").await?;
        debug!(
            "🔍 Block window [{}, {}] for ts [{}, {}]",
            start_block, end_block, from_ts, to_ts
        );
        self.block_windows
            .insert((from_ts, to_ts), (start_block, end_block));
        Ok((start_block, end_block))
    }

    /// Page through an account listing action until a short page
    async fn paged_rows(
        &self,
        action: &str,
        address: Address,
        start_block: u64,
        end_block: u64,
    ) -> AppResult<Vec<serde_json::Value>> {
        let mut all_rows = Vec::new();
        let mut page: u32 = 1;
        loop {
            let envelope = self
                .call(&[
                    ("module", "account".to_string()),
                    ("action", action.to_string()),
                    ("address", format!("{:?}", address)),
                    ("startblock", start_block.to_string()),
                    ("endblock", end_block.to_string()),
                    ("page", page.to_string()),
                    ("offset", ETHERSCAN_PAGE_SIZE.to_string()),
                    ("sort", "asc".to_string()),
                ])
                .await?;

            let rows = envelope.rows();
            let short_page = rows.len() < ETHERSCAN_PAGE_SIZE;
            all_rows.extend(rows);
            if short_page {
                break;
            }
            page += 1;
        }
        Ok(all_rows)
    }

    /// Verification record for a contract, for the source risk provider
    pub async fn contract_source(&self, address: Address) -> AppResult<ContractSourceRecord> {
        let envelope = self
            .call(&[
                ("module", "contract".to_string()),
                ("action", "getsourcecode".to_string()),
                ("address", format!("{:?}", address)),
            ])
            .await?;

        envelope
            .rows()
            .into_iter()
            .next()
            .and_then(|row| serde_json::from_value(row).ok())
            .ok_or_else(|| {
                AppError::source_invalid_response(format!("no source record for {}", address))
            })
    }
}

fn build_client() -> AppResult<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_CONST));
    headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip"));

    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS))
        .gzip(true)
        .build()
        .map_err(|e| AppError::source_unavailable(format!("failed to build HTTP client: {}", e)))
}

/// txlist row -> raw native transfer. Failed transactions and rows with
/// unparseable timestamps are dropped here; their value never moved.
fn native_transfer_from_row(row: &serde_json::Value) -> Option<RawTransfer> {
    let tx: NativeTxRecord = serde_json::from_value(row.clone()).ok()?;
    if tx.is_error == "1" {
        return None;
    }
    let timestamp = tx.time_stamp.parse().ok()?;
    Some(RawTransfer::native(tx.hash, tx.from, tx.to, tx.value, timestamp))
}

/// tokentx row -> raw token transfer with whatever metadata Etherscan
/// included. Missing decimals stay None; the parser defaults them.
fn token_transfer_from_row(row: &serde_json::Value) -> Option<RawTransfer> {
    let tx: TokenTxRecord = serde_json::from_value(row.clone()).ok()?;
    let timestamp = tx.time_stamp.parse().ok()?;
    let mut transfer = RawTransfer::token(
        tx.hash,
        tx.from,
        tx.to,
        tx.contract_address,
        tx.value,
        timestamp,
    );
    if !tx.token_symbol.is_empty() {
        transfer = transfer.with_symbol(tx.token_symbol);
    }
    if let Ok(decimals) = tx.token_decimal.parse::<u8>() {
        transfer = transfer.with_decimals(decimals);
    }
    Some(transfer)
}

fn code_is_contract(code: &str) -> bool {
    !matches!(code, "" | "0x" | "0x0")
}

#[async_trait]
impl TransferSource for EtherscanClient {
    async fn list_transfers(
        &self,
        address: Address,
        from_ts: u64,
        to_ts: u64,
    ) -> AppResult<Vec<RawTransfer>> {
        let (start_block, end_block) = self.block_window(from_ts, to_ts).await?;

        let mut transfers: Vec<RawTransfer> = self
            .paged_rows("txlist", address, start_block, end_block)
            .await?
            .iter()
            .filter_map(native_transfer_from_row)
            .collect();
        let native_count = transfers.len();

        transfers.extend(
            self.paged_rows("tokentx", address, start_block, end_block)
                .await?
                .iter()
                .filter_map(token_transfer_from_row),
        );

        info!(
            "📥 Etherscan: {} transfers for {} ({} native, {} token)",
            transfers.len(),
            address,
            native_count,
            transfers.len() - native_count
        );
        Ok(transfers)
    }

    async fn is_contract(&self, address: Address) -> AppResult<Option<bool>> {
        if let Some(cached) = self.code_cache.get(&address) {
            return Ok(Some(*cached));
        }

        let envelope = self
            .call(&[
                ("module", "proxy".to_string()),
                ("action", "eth_getCode".to_string()),
                ("address", format!("{:?}", address)),
                ("tag", "latest".to_string()),
            ])
            .await?;

        let code = envelope.result.as_str().unwrap_or("0x");
        let is_contract = code_is_contract(code);
        self.code_cache.insert(address, is_contract);
        Ok(Some(is_contract))
    }
}
