//! Value-flow graph store.
//!
//! Single-writer in-memory structure for one trace run: nodes keyed by
//! address, edges in discovery order, token assessments attached lazily.
//! Serializes to the stable schema downstream tooling depends on
//! (`nodes` array, `edges` array, `tokens` map).

use alloy_primitives::Address;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::{BTreeMap, HashSet};

use crate::models::types::TokenRisk;

/// Asset moved by an edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Asset {
    /// Chain-native asset (ETH)
    Native,
    /// ERC-20 style token
    Token {
        address: Address,
        #[serde(skip_serializing_if = "Option::is_none")]
        symbol: Option<String>,
    },
}

impl Asset {
    pub fn token(address: Address, symbol: Option<String>) -> Self {
        Asset::Token { address, symbol }
    }

    pub fn is_native(&self) -> bool {
        matches!(self, Asset::Native)
    }

    pub fn token_address(&self) -> Option<Address> {
        match self {
            Asset::Native => None,
            Asset::Token { address, .. } => Some(*address),
        }
    }

    /// Display symbol for reports
    pub fn symbol(&self) -> &str {
        match self {
            Asset::Native => "ETH",
            Asset::Token { symbol, .. } => symbol.as_deref().unwrap_or("?"),
        }
    }

    fn id(&self) -> AssetId {
        match self {
            Asset::Native => AssetId::Native,
            Asset::Token { address, .. } => AssetId::Token(*address),
        }
    }
}

/// Identifier component of the edge uniqueness key. The symbol is
/// display metadata and deliberately excluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum AssetId {
    Native,
    Token(Address),
}

/// One address in the graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub address: Address,
    /// Earliest transfer timestamp this address was seen at
    pub first_seen: Option<u64>,
    /// Latest transfer timestamp this address was seen at
    pub last_seen: Option<u64>,
    /// Lazily resolved; stays None when never looked up
    pub is_contract: Option<bool>,
}

impl Node {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            first_seen: None,
            last_seen: None,
            is_contract: None,
        }
    }

    /// Fold a sighting timestamp into the first/last-seen range
    pub fn observe(&mut self, ts: u64) {
        self.first_seen = Some(self.first_seen.map_or(ts, |t| t.min(ts)));
        self.last_seen = Some(self.last_seen.map_or(ts, |t| t.max(ts)));
    }
}

/// One observed transfer; immutable once inserted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub from: Address,
    pub to: Address,
    pub tx_hash: String,
    pub timestamp: u64,
    pub asset: Asset,
    /// Normalized amount (wei/1e18 for native, raw/10^decimals for tokens)
    pub amount: f64,
    /// Absent when pricing stayed unresolved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usd_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_index: Option<u64>,
}

/// Edge uniqueness key. Duplicates from overlapping retrieval windows
/// collapse on (tx hash, asset id, from, to, log index).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct EdgeKey {
    tx_hash: String,
    asset: AssetId,
    from: Address,
    to: Address,
    log_index: Option<u64>,
}

impl EdgeKey {
    fn of(edge: &Edge) -> Self {
        Self {
            tx_hash: edge.tx_hash.clone(),
            asset: edge.asset.id(),
            from: edge.from,
            to: edge.to,
            log_index: edge.log_index,
        }
    }
}

/// The single mutable shared state of a trace run
#[derive(Debug, Default, Serialize)]
pub struct Graph {
    #[serde(serialize_with = "nodes_as_array")]
    nodes: BTreeMap<Address, Node>,
    edges: Vec<Edge>,
    tokens: BTreeMap<Address, TokenRisk>,
    #[serde(skip)]
    edge_keys: HashSet<EdgeKey>,
}

/// The schema exposes nodes as an array; the map is an internal index
fn nodes_as_array<S>(nodes: &BTreeMap<Address, Node>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_seq(nodes.values())
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get-or-create the node for `address`; timestamps stay unset
    /// until an edge observes them.
    pub fn touch_node(&mut self, address: Address) -> &mut Node {
        self.nodes.entry(address).or_insert_with(|| Node::new(address))
    }

    pub fn set_contract_flag(&mut self, address: Address, is_contract: bool) {
        self.touch_node(address).is_contract = Some(is_contract);
    }

    /// True when an edge with the same uniqueness key is already stored
    pub fn contains(&self, edge: &Edge) -> bool {
        self.edge_keys.contains(&EdgeKey::of(edge))
    }

    /// Insert an edge, creating/observing both endpoint nodes.
    /// Returns false (and stores nothing) on a duplicate key.
    pub fn insert_edge(&mut self, edge: Edge) -> bool {
        let key = EdgeKey::of(&edge);
        if !self.edge_keys.insert(key) {
            return false;
        }
        self.touch_node(edge.from).observe(edge.timestamp);
        self.touch_node(edge.to).observe(edge.timestamp);
        self.edges.push(edge);
        true
    }

    /// Insert-if-absent; assessments are immutable once attached.
    /// Returns false when the token was already assessed.
    pub fn attach_token_risk(&mut self, risk: TokenRisk) -> bool {
        if self.tokens.contains_key(&risk.token_address) {
            return false;
        }
        self.tokens.insert(risk.token_address, risk);
        true
    }

    pub fn node(&self, address: &Address) -> Option<&Node> {
        self.nodes.get(address)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn tokens(&self) -> &BTreeMap<Address, TokenRisk> {
        &self.tokens
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    /// Distinct token addresses referenced by edges, in discovery order
    pub fn token_addresses(&self) -> Vec<Address> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for edge in &self.edges {
            if let Some(addr) = edge.asset.token_address() {
                if seen.insert(addr) {
                    out.push(addr);
                }
            }
        }
        out
    }

    /// Sum of resolved USD values across all edges
    pub fn total_usd(&self) -> f64 {
        self.edges.iter().filter_map(|e| e.usd_value).sum()
    }
}
