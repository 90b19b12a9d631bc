//! Response and statistics types for the relay service

use serde::{Deserialize, Serialize};

/// Execution counters
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionStats {
    /// Swaps broadcast successfully
    pub executed: u64,
    /// Requests rejected before co-signing
    pub rejected: u64,
    /// Broadcasts that failed after co-signing
    pub failed: u64,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Address co-signing updates and paying for execution
    pub backend_address: String,
    /// Version
    pub version: String,
    /// Uptime in seconds
    pub uptime_secs: u64,
    pub stats: ExecutionStats,
}
