//! Unit tests module
//!
//! - Signing primitives
//! - Routes and quotes
