//! HTTP payloads shared by the relay server and its clients

use crate::route::Route;
use crate::types::StateUpdate;
use serde::{Deserialize, Serialize};

/// `POST /execute-swap` body
///
/// Every field is optional at the serde level so that missing fields surface
/// as `invalid_request` rather than a framework rejection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteSwapRequest {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub user_address: Option<String>,
    #[serde(default)]
    pub signed_state_update: Option<StateUpdate>,
    #[serde(default, alias = "lifiRoute")]
    pub proposed_route: Option<Route>,
}

impl ExecuteSwapRequest {
    pub fn new(
        session_id: impl Into<String>,
        user_address: impl Into<String>,
        update: StateUpdate,
        route: Route,
    ) -> Self {
        Self {
            session_id: Some(session_id.into()),
            user_address: Some(user_address.into()),
            signed_state_update: Some(update),
            proposed_route: Some(route),
        }
    }
}

/// `POST /execute-swap` response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteSwapResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "txHash")]
    pub transaction_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Machine-stable error code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ExecuteSwapResponse {
    pub fn executed(session_id: impl Into<String>, tx_hash: impl Into<String>) -> Self {
        Self {
            success: true,
            session_id: Some(session_id.into()),
            transaction_hash: Some(tx_hash.into()),
            message: Some("Swap executed successfully".into()),
            ..Default::default()
        }
    }

    pub fn failed(code: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            code: Some(code.into()),
            ..Default::default()
        }
    }
}
