//! Integration tests module

pub mod update_flow_test;
