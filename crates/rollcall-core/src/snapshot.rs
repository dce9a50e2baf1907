//! Snapshot loader
//!
//! One-shot bulk read of the user list from `GET /api/users/`.

use std::time::Duration;

use tracing::{debug, info};

use crate::config::Config;
use crate::error::{SyncError, SyncResult};
use crate::models::User;

/// Fetches the full user list from the backend
#[derive(Debug, Clone)]
pub struct SnapshotLoader {
    url: String,
    client: reqwest::Client,
}

impl SnapshotLoader {
    /// Create a loader for a snapshot URL
    pub fn new(url: impl Into<String>, timeout: Duration) -> SyncResult<Self> {
        let url = url.into();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("rollcall/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| SyncError::Request {
                url: url.clone(),
                source,
            })?;

        Ok(Self { url, client })
    }

    /// Create a loader from configuration
    pub fn from_config(config: &Config) -> SyncResult<Self> {
        Self::new(config.users_url(), config.request_timeout())
    }

    /// Snapshot URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch the user list, in server order
    ///
    /// Does not retry.
    pub async fn fetch(&self) -> SyncResult<Vec<User>> {
        debug!("Fetching snapshot from {}", self.url);

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|source| SyncError::Request {
                url: self.url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::HttpStatus {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|source| SyncError::Request {
            url: self.url.clone(),
            source,
        })?;

        let users = parse_snapshot(&body).map_err(|source| SyncError::Decode {
            url: self.url.clone(),
            source,
        })?;

        info!("Loaded {} users from {}", users.len(), self.url);
        Ok(users)
    }
}

/// Decode a snapshot body
fn parse_snapshot(body: &[u8]) -> Result<Vec<User>, serde_json::Error> {
    serde_json::from_slice(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::decode_event;
    use crate::roster::SyncEvent;

    #[test]
    fn test_parse_snapshot_keeps_order() {
        let body = br#"[
            {"_id": "2", "name": "Bob", "email": "bob@example.com"},
            {"_id": "1", "name": "Ann"}
        ]"#;

        let users = parse_snapshot(body).unwrap();
        let ids: Vec<&str> = users.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, ["2", "1"]);
        assert!(users[0].attribute("email").is_some());
    }

    #[test]
    fn test_parse_snapshot_accepts_id_and_mongo_id() {
        // Mongoose with virtuals enabled sends both keys
        let body = br#"[
            {"_id": "1", "id": "1", "name": "Ann"},
            {"_id": "2", "name": "Bob"}
        ]"#;

        let users = parse_snapshot(body).unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].id, "1");
        assert!(users[0].attribute("_id").is_none());

        let event = decode_event("add", serde_json::json!({"_id": "1", "id": "1", "name": "Ann"}))
            .unwrap()
            .unwrap();
        assert_eq!(event, SyncEvent::Added(users[0].clone()));
    }

    #[test]
    fn test_parse_snapshot_rejects_object() {
        assert!(parse_snapshot(br#"{"users": []}"#).is_err());
    }

    #[test]
    fn test_parse_snapshot_rejects_missing_name() {
        assert!(parse_snapshot(br#"[{"_id": "1"}]"#).is_err());
    }

    #[test]
    fn test_loader_from_config() {
        let mut config = Config::default();
        config.server_url = "http://127.0.0.1:9/".to_string();

        let loader = SnapshotLoader::from_config(&config).unwrap();
        assert_eq!(loader.url(), "http://127.0.0.1:9/api/users/");
    }

    #[tokio::test]
    async fn test_fetch_unreachable_is_network_error() {
        // Port 9 (discard) is closed on test machines
        let loader =
            SnapshotLoader::new("http://127.0.0.1:9/api/users/", Duration::from_secs(2)).unwrap();

        let err = loader.fetch().await.unwrap_err();
        assert!(err.is_network());
        assert!(matches!(err, SyncError::Request { .. }));
    }
}
