//! Request payloads for each [`EventType`](crate::constants::EventType).
//!
//! `log_out` carries no payload and `transact` sends the
//! [`Transaction`](crate::types::Transaction) as-is.

use serde::{Deserialize, Serialize};

use crate::types::Authorization;

/// Lists the authorizations available for a chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetAuthorizationsRequest {
    pub chain_id: String,
}

/// Opens a session for `authorization` identified by `session_uuid`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogInRequest {
    pub session_uuid: String,
    pub authorization: Authorization,
}

/// Asks whether a session is still logged in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IsLoggedInRequest {
    pub session_uuid: String,
}

/// Asks which authorization a session was opened with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentAuthorizationRequest {
    pub session_uuid: String,
}
