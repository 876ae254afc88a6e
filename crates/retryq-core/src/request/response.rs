use serde::{Deserialize, Serialize};

/// `jsonCode` of a successful response.
pub const JSON_CODE_SUCCESS: i64 = 200;

/// Reserved `jsonCode` handed to interactive callers whose request never
/// completed. Callers render an offline state for it instead of inspecting
/// the underlying failure.
pub const JSON_CODE_OFFLINE: i64 = 0;

/// Response delivered to an interactive caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(rename = "jsonCode")]
    pub json_code: i64,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Response {
    pub fn success(payload: serde_json::Value) -> Self {
        Self {
            json_code: JSON_CODE_SUCCESS,
            payload,
        }
    }

    /// The synthetic offline result.
    pub fn offline() -> Self {
        Self {
            json_code: JSON_CODE_OFFLINE,
            payload: serde_json::Value::Null,
        }
    }

    pub fn is_offline(&self) -> bool {
        self.json_code == JSON_CODE_OFFLINE
    }

    /// Build a response from a JSON body. A numeric `jsonCode` field is
    /// lifted out; bodies without one are treated as success.
    pub fn from_body(body: serde_json::Value) -> Self {
        let json_code = body
            .get("jsonCode")
            .and_then(serde_json::Value::as_i64)
            .unwrap_or(JSON_CODE_SUCCESS);
        Self {
            json_code,
            payload: body,
        }
    }
}
