//! Sync error handling
//!
//! Typed errors for the snapshot loader, the event channel and the roster,
//! with a classification into network failures and malformed input.

use thiserror::Error;

/// Errors that can occur while loading or applying remote state
#[derive(Error, Debug)]
pub enum SyncError {
    /// Request could not be sent or no response arrived
    #[error("Failed to reach '{url}': {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Server answered with a non-success status
    #[error("Request to '{url}' failed with HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    /// Response body was not a list of users
    #[error("Failed to decode response from '{url}': {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// Event payload is missing required fields or has the wrong shape
    #[error("Malformed '{event}' event: {reason}")]
    MalformedEvent { event: String, reason: String },

    /// Update referenced an id that is not in the list
    #[error("Update for unknown user id '{id}'")]
    UnknownId { id: String },

    /// Transport failure on the event channel
    #[error("Event channel error: {0}")]
    Channel(String),
}

impl SyncError {
    /// Create a malformed-event error
    pub fn malformed(event: impl Into<String>, reason: impl Into<String>) -> Self {
        SyncError::MalformedEvent {
            event: event.into(),
            reason: reason.into(),
        }
    }

    /// Whether this is a snapshot fetch failure (connectivity, status or decode)
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            SyncError::Request { .. } | SyncError::HttpStatus { .. } | SyncError::Decode { .. }
        )
    }

    /// Whether this error came from an invalid event payload
    pub fn is_malformed(&self) -> bool {
        matches!(self, SyncError::MalformedEvent { .. })
    }

    /// Check if this error is recoverable by trying again later
    pub fn is_recoverable(&self) -> bool {
        match self {
            SyncError::Request { .. } | SyncError::Channel(_) => true,
            SyncError::HttpStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Get a recovery suggestion for this error
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            SyncError::Request { .. } | SyncError::Channel(_) => {
                Some("Check that the server is running and server_url is correct.")
            }
            SyncError::HttpStatus { status, .. } if *status == 404 => {
                Some("The server does not expose /api/users/. Check server_url.")
            }
            SyncError::Decode { .. } => {
                Some("The server response is not a JSON list of users. Check server_url.")
            }
            _ => None,
        }
    }
}

/// Result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_classification() {
        let status = SyncError::HttpStatus {
            url: "http://localhost/api/users/".to_string(),
            status: 502,
        };
        assert!(status.is_network());
        assert!(status.is_recoverable());

        let decode = SyncError::Decode {
            url: "http://localhost/api/users/".to_string(),
            source: serde_json::from_str::<Vec<u8>>("{").unwrap_err(),
        };
        assert!(decode.is_network());
        assert!(!decode.is_recoverable());
        assert!(decode.recovery_suggestion().is_some());
    }

    #[test]
    fn test_malformed_classification() {
        let err = SyncError::malformed("add", "missing field `name`");
        assert!(err.is_malformed());
        assert!(!err.is_network());
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_error_display() {
        let err = SyncError::malformed("delete", "missing field `id`");
        let msg = err.to_string();
        assert!(msg.contains("Malformed 'delete' event"));
        assert!(msg.contains("missing field `id`"));

        let err = SyncError::HttpStatus {
            url: "http://host/api/users/".to_string(),
            status: 404,
        };
        assert!(err.to_string().contains("HTTP 404"));
        assert!(err.recovery_suggestion().unwrap().contains("/api/users/"));
    }
}
