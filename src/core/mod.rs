//! Core Module - Trace Engine & Risk Scoring
//!
//! Otak aplikasi: frontier expansion, graph store, score aggregation.
//! CEO Directive: Logika inti hanya bicara lewat port traits, tidak
//! boleh menyentuh jaringan secara langsung.

pub mod aggregator;
pub mod graph;
pub mod scoring;
pub mod tracer;

pub use aggregator::*;
pub use graph::*;
pub use scoring::*;
pub use tracer::*;
