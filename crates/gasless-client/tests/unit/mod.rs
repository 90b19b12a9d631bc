//! Unit tests module

pub mod session_test;
