//! Hop-limited value-flow tracer.
//!
//! Breadth-first expansion from a seed address: fetch every transfer
//! touching the frontier address inside the time window, run each one
//! through the filter chain, insert survivors as edges and enqueue
//! unseen counterparties one hop deeper. Addresses at the hop limit are
//! recorded as terminal nodes without fetching. After expansion, every
//! distinct token seen on an edge is assessed through the risk source.

use alloy_primitives::Address;
use futures_util::future::join_all;
use std::collections::{HashMap, HashSet, VecDeque};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::config::TraceConfig;
use crate::core::graph::{Asset, Edge, Graph};
use crate::models::errors::{AppError, AppResult};
use crate::models::types::TraceStats;
use crate::ports::{PriceResolver, RawAsset, RawTransfer, TokenRiskSource, TransferSource};
use crate::utils::constants::{token_units, wei_to_eth, DEFAULT_TOKEN_DECIMALS};

pub struct FlowTracer {
    source: Arc<dyn TransferSource>,
    prices: Arc<dyn PriceResolver>,
    risk: Option<Arc<dyn TokenRiskSource>>,
    config: TraceConfig,
}

impl FlowTracer {
    pub fn new(
        source: Arc<dyn TransferSource>,
        prices: Arc<dyn PriceResolver>,
        config: TraceConfig,
    ) -> Self {
        Self {
            source,
            prices,
            risk: None,
            config,
        }
    }

    pub fn with_risk_source(mut self, risk: Arc<dyn TokenRiskSource>) -> Self {
        self.risk = Some(risk);
        self
    }

    pub fn config(&self) -> &TraceConfig {
        &self.config
    }

    /// Run the full trace and return the finished graph.
    pub async fn build_graph(&self) -> AppResult<Graph> {
        let (graph, _stats) = self.build_graph_with_stats().await?;
        Ok(graph)
    }

    /// Same as [`build_graph`](Self::build_graph) but also returns the
    /// run counters for reporting.
    pub async fn build_graph_with_stats(&self) -> AppResult<(Graph, TraceStats)> {
        // Config problems are fatal before any network work starts
        let seed = self.config.validate()?;
        let (from_ts, to_ts) = self.config.window_bounds();

        info!(
            "🚀 Tracing {} ({} day window, {} hop{})",
            seed,
            self.config.window_days,
            self.config.hop_limit,
            if self.config.hop_limit == 1 { "" } else { "s" }
        );

        let mut graph = Graph::new();
        let mut stats = TraceStats::default();
        let mut queue: VecDeque<(Address, u32)> = VecDeque::new();
        let mut visited: HashSet<Address> = HashSet::new();
        let mut edges_per_source: HashMap<Address, usize> = HashMap::new();

        graph.touch_node(seed);
        visited.insert(seed);
        queue.push_back((seed, 0));

        // ==================== FRONTIER EXPANSION ====================
        'outer: while let Some((address, depth)) = queue.pop_front() {
            if depth >= self.config.hop_limit {
                // Node stays in the graph, its transfers do not
                stats.terminal_nodes += 1;
                continue;
            }

            let transfers = match self.source.list_transfers(address, from_ts, to_ts).await {
                Ok(list) => list,
                Err(e) => {
                    // One unreachable address is a gap, not an abort
                    warn!("⚠️ Source gap at {}: {}", address, e);
                    stats.source_gaps += 1;
                    continue;
                }
            };
            stats.addresses_expanded += 1;
            debug!(
                "🔍 Expanding {} at depth {}: {} transfers",
                address,
                depth,
                transfers.len()
            );

            for raw in transfers {
                stats.transfers_seen += 1;

                let parsed = match parse_transfer(&raw) {
                    Ok(p) => p,
                    Err(e) => {
                        warn!("⚠️ Dropping malformed record: {}", e);
                        stats.malformed_dropped += 1;
                        continue;
                    }
                };

                // Zero-value native transfers carry no flow
                if parsed.asset.is_native() && parsed.amount == 0.0 {
                    continue;
                }

                let usd_value = match self
                    .prices
                    .price_at(&parsed.asset, parsed.amount, parsed.timestamp)
                    .await
                {
                    Ok(v) => v,
                    Err(e) => {
                        warn!(
                            "⚠️ Price lookup failed for {} in {}: {}",
                            parsed.asset.symbol(),
                            parsed.tx_hash,
                            e
                        );
                        None
                    }
                };

                match usd_value {
                    None if !self.config.ignore_unknown_price => {
                        stats.unpriced_dropped += 1;
                        continue;
                    }
                    // Unpriced edges kept by policy bypass the floor
                    Some(v) if v < self.config.min_usd => {
                        stats.below_floor_dropped += 1;
                        continue;
                    }
                    _ => {}
                }

                let edge = Edge {
                    from: parsed.from,
                    to: parsed.to,
                    tx_hash: parsed.tx_hash,
                    timestamp: parsed.timestamp,
                    asset: parsed.asset,
                    amount: parsed.amount,
                    usd_value,
                    log_index: parsed.log_index,
                };

                // Duplicates never count against any cap
                if graph.contains(&edge) {
                    stats.duplicates_suppressed += 1;
                    continue;
                }

                let (from, to) = (edge.from, edge.to);
                let per_source = edges_per_source.entry(from).or_insert(0);
                if self.config.max_edges_per_address > 0
                    && *per_source >= self.config.max_edges_per_address
                {
                    stats.capped_dropped += 1;
                    if self.config.expand_capped_neighbors {
                        enqueue_counterparties(from, to, depth, &mut visited, &mut queue, &mut graph);
                    }
                    continue;
                }

                *per_source += 1;
                if graph.insert_edge(edge) {
                    stats.edges_added += 1;
                }
                enqueue_counterparties(from, to, depth, &mut visited, &mut queue, &mut graph);

                if self.config.max_total_edges > 0
                    && graph.edge_count() >= self.config.max_total_edges
                {
                    info!(
                        "🛑 Edge budget reached ({}), halting expansion",
                        self.config.max_total_edges
                    );
                    stats.halted_on_edge_budget = true;
                    break 'outer;
                }
            }
        }

        // ==================== CONTRACT FLAGS ====================
        if self.config.resolve_contract_flags {
            self.resolve_contract_flags(&mut graph).await;
        }

        // ==================== TOKEN ASSESSMENT ====================
        if self.config.assess_tokens {
            if let Some(risk) = &self.risk {
                self.assess_tokens(&mut graph, &mut stats, risk, to_ts).await;
            }
        }

        info!(
            "✅ Trace complete: {} nodes, {} edges, {} tokens assessed",
            graph.node_count(),
            graph.edge_count(),
            stats.tokens_assessed
        );
        Ok((graph, stats))
    }

    async fn resolve_contract_flags(&self, graph: &mut Graph) {
        let addresses: Vec<Address> = graph.nodes().map(|n| n.address).collect();
        info!("🔍 Resolving contract flags for {} nodes", addresses.len());
        for address in addresses {
            match self.source.is_contract(address).await {
                Ok(Some(flag)) => graph.set_contract_flag(address, flag),
                Ok(None) => {}
                Err(e) => debug!("Contract lookup failed for {}: {}", address, e),
            }
        }
    }

    /// Assess every distinct edge token with bounded parallelism and
    /// attach the results. Repeated sightings share one assessment.
    async fn assess_tokens(
        &self,
        graph: &mut Graph,
        stats: &mut TraceStats,
        risk: &Arc<dyn TokenRiskSource>,
        at_ts: u64,
    ) {
        let tokens = graph.token_addresses();
        if tokens.is_empty() {
            return;
        }
        info!("📊 Assessing {} tokens", tokens.len());

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_assessments.max(1)));
        let assessments = tokens.into_iter().map(|token| {
            let risk = Arc::clone(risk);
            let semaphore = Arc::clone(&semaphore);
            async move {
                let _permit = semaphore.acquire().await.ok()?;
                Some(risk.assess(token, at_ts).await)
            }
        });

        for result in join_all(assessments).await.into_iter().flatten() {
            if graph.attach_token_risk(result) {
                stats.tokens_assessed += 1;
            }
        }
    }
}

/// Record both endpoints and enqueue any not yet visited one hop deeper
fn enqueue_counterparties(
    from: Address,
    to: Address,
    depth: u32,
    visited: &mut HashSet<Address>,
    queue: &mut VecDeque<(Address, u32)>,
    graph: &mut Graph,
) {
    for endpoint in [from, to] {
        if visited.insert(endpoint) {
            graph.touch_node(endpoint);
            queue.push_back((endpoint, depth + 1));
        }
    }
}

/// Validated, normalized form of a raw transfer record
#[derive(Debug)]
struct ParsedTransfer {
    from: Address,
    to: Address,
    tx_hash: String,
    timestamp: u64,
    asset: Asset,
    amount: f64,
    log_index: Option<u64>,
}

/// Validate a raw record and normalize its amount to asset units.
/// Any missing or unparseable required field rejects the whole record.
fn parse_transfer(raw: &RawTransfer) -> AppResult<ParsedTransfer> {
    let tx_hash = raw.tx_hash.trim().to_lowercase();
    if tx_hash.is_empty() {
        return Err(AppError::malformed_record("empty tx hash"));
    }

    let from = Address::from_str(raw.from.trim())
        .map_err(|_| AppError::malformed_record(format!("bad from address '{}'", raw.from)))?;
    let to = Address::from_str(raw.to.trim())
        .map_err(|_| AppError::malformed_record(format!("bad to address '{}'", raw.to)))?;

    let raw_amount: f64 = raw
        .amount
        .trim()
        .parse()
        .map_err(|_| AppError::malformed_record(format!("bad amount '{}'", raw.amount)))?;
    if !raw_amount.is_finite() || raw_amount < 0.0 {
        return Err(AppError::malformed_record(format!(
            "bad amount '{}'",
            raw.amount
        )));
    }

    let (asset, amount) = match &raw.asset {
        RawAsset::Native => (Asset::Native, wei_to_eth(raw_amount)),
        RawAsset::Token {
            address,
            symbol,
            decimals,
        } => {
            let token = Address::from_str(address.trim()).map_err(|_| {
                AppError::malformed_record(format!("bad token address '{}'", address))
            })?;
            (
                Asset::token(token, symbol.clone()),
                token_units(raw_amount, decimals.unwrap_or(DEFAULT_TOKEN_DECIMALS)),
            )
        }
    };

    Ok(ParsedTransfer {
        from,
        to,
        tx_hash,
        timestamp: raw.timestamp,
        asset,
        amount,
        log_index: raw.log_index,
    })
}
