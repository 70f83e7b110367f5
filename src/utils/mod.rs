//! Utils Module - Helper Functions & Shared Utilities
//!
//! Konstanta bersama dan penulis laporan.
//! CEO Directive: Single Source of Truth untuk nilai-nilai shared.

pub mod constants;
pub mod report;

pub use constants::*;
pub use report::*;
