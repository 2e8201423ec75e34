//! Small shared structures: tag/value options and server notices.

use serde::{Deserialize, Serialize};

use crate::errors::ClientError;
use crate::protocol::WARNING_CODES;

// ============================================================================
// TagValue
// ============================================================================

/// Key-value pair used for request options and security-id lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagValue {
    pub tag: String,
    pub value: String,
}

impl TagValue {
    pub fn new(tag: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            value: value.into(),
        }
    }
}

// ============================================================================
// ServerNotice
// ============================================================================

/// An ERR_MSG frame from the server.
///
/// `request_id` is `-1` for connection-wide notices.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerNotice {
    pub request_id: i32,
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub advanced_order_reject_json: String,
}

impl ServerNotice {
    /// Informational codes (farm status and the like) that do not end a request.
    pub fn is_warning(&self) -> bool {
        WARNING_CODES.contains(&self.code)
    }

    pub fn into_error(self) -> ClientError {
        ClientError::Server {
            id: self.request_id,
            code: self.code,
            message: self.message,
            advanced_order_reject_json: self.advanced_order_reject_json,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warning_band() {
        let farm = ServerNotice {
            request_id: -1,
            code: 2104,
            message: "Market data farm connection is OK:usfarm".into(),
            ..Default::default()
        };
        assert!(farm.is_warning());

        let missing = ServerNotice {
            request_id: 9001,
            code: 200,
            message: "No security definition has been found".into(),
            ..Default::default()
        };
        assert!(!missing.is_warning());
        match missing.into_error() {
            ClientError::Server { id, code, .. } => {
                assert_eq!(id, 9001);
                assert_eq!(code, 200);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
