use crate::failure::Failure;
use crate::models::ErrorMeta;
use serde::{Deserialize, Serialize};

pub const PROTOCOL_VERSION: &str = "0.1.0";

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum FaultlineRequest {
    Ping,
    Health,
    Capture {
        failure: Failure,
        context: String,
        #[serde(default)]
        meta: Option<ErrorMeta>,
    },
    Lookup {
        id: String,
    },
    Latest {
        limit: Option<u32>,
    },
    Prune {
        days: u32,
    },
    Test {
        #[serde(default)]
        meta: Option<ErrorMeta>,
    },
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct FaultlineResponse {
    pub status: String,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub version: String,
}

impl FaultlineResponse {
    pub fn ok(data: serde_json::Value) -> Self {
        Self {
            status: "ok".to_string(),
            data: Some(data),
            error: None,
            version: PROTOCOL_VERSION.to_string(),
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            data: None,
            error: Some(msg.into()),
            version: PROTOCOL_VERSION.to_string(),
        }
    }

    pub fn pong() -> Self {
        Self::ok(serde_json::json!({"pong": true}))
    }
}
