//! FlowTrace Library
//!
//! Hop-limited value-flow graph tracer with composite token risk
//! scoring:
//! - BFS expansion of native + ERC-20 transfers around a seed address
//! - USD valuation with drop floors, per-address caps, and edge budgets
//! - Multi-provider risk signals merged into a 0-100 score and label
//! - Stable graph.json schema plus an investigator summary

pub mod config;
pub mod core;
pub mod models;
pub mod ports;
pub mod providers;
pub mod utils;

pub use config::{RiskWeights, ScoringConfig, TraceConfig};
pub use models::errors::{AppError, AppResult, ErrorCode};
pub use models::types::{ProviderReport, RiskFlag, RiskLabel, TokenRisk, TraceStats};
pub use ports::{
    PriceResolver, RawAsset, RawTransfer, SignalProvider, TokenRiskSource, TransferSource,
};
pub use self::core::aggregator::RiskAggregator;
pub use self::core::graph::{Asset, Edge, Graph, Node};
pub use self::core::scoring::{evaluate, ScoreOutcome};
pub use self::core::tracer::FlowTracer;
