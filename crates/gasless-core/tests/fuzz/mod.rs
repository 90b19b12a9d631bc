//! Fuzz tests module
//!
//! Property-based testing using proptest:
//! - Quote arithmetic
//! - Signature recovery

pub mod quote_fuzz;
pub mod signature_fuzz;
