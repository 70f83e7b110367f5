//! Models Module - Data Structures & Errors
//!
//! Single source of truth untuk semua tipe data publik.
//! CEO Directive: Skema serialisasi stabil; perubahan di sini adalah
//! breaking change untuk konsumen graph.json.

pub mod errors;
pub mod types;

pub use errors::*;
pub use types::*;
