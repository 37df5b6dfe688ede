//! Core types, errors, and validation for MediBills.
//!
//! This crate provides the foundational types used throughout the ledger:
//! - Identifier newtypes over UUIDs (UserId, BillId, etc.)
//! - The [`Money`] value type and its parse/format rules
//! - Persisted records, expanded views, and write payloads
//! - Field validation shared by the API layer
//! - The [`ErrorCode`] catalog and configuration types

pub mod config;
pub mod error;
pub mod inputs;
pub mod money;
pub mod records;
pub mod types;
pub mod validation;

// Re-export commonly used types at crate root
pub use error::ErrorCode;
pub use money::{Money, MoneyError};
pub use records::*;
pub use types::*;
