//! Fuzz tests module
