//! Invariant tests module
