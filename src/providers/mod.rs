//! Providers Module - External Data Sources
//!
//! Jalur data: Etherscan, DexScreener, GoPlus, curated lists, plus
//! backend statis untuk offline mode dan testing.
//! CEO Directive: Semua rate limiting dan retry hidup di modul ini.

pub mod dexscreener;
pub mod etherscan;
pub mod price;
pub mod registry;
pub mod simulation;
pub mod source_code;
pub mod static_backend;

pub use dexscreener::*;
pub use etherscan::*;
pub use price::*;
pub use registry::*;
pub use simulation::*;
pub use source_code::*;
pub use static_backend::*;
