//! Response envelope shared by every endpoint

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// `{"result": bool, "msg": str, "data": {...}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub result: bool,
    pub msg: String,
    pub data: Value,
}

impl ApiResponse {
    pub fn success(msg: impl Into<String>, data: Value) -> Self {
        Self {
            result: true,
            msg: msg.into(),
            data,
        }
    }

    pub fn failure(msg: impl Into<String>) -> Self {
        Self {
            result: false,
            msg: msg.into(),
            data: json!({}),
        }
    }
}
