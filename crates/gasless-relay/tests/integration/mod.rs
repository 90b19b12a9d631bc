//! Integration tests module

pub mod http_flow_test;
