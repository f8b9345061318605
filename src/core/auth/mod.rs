use async_trait::async_trait;
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const DEFAULT_USERNAME: &str = "Player";

/// Identity handed to the game at launch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub username: String,
    pub uuid: String,
    pub access_token: String,
    pub user_type: String,
    pub xuid: String,
}

impl Default for Session {
    fn default() -> Self {
        Self::offline(DEFAULT_USERNAME)
    }
}

impl Session {
    /// Offline session with the name-derived UUID vanilla servers expect.
    pub fn offline(username: &str) -> Self {
        let username = match username.trim() {
            "" => DEFAULT_USERNAME,
            name => name,
        };
        Self {
            username: username.to_string(),
            uuid: offline_uuid(username).simple().to_string(),
            access_token: "0".into(),
            user_type: "legacy".into(),
            xuid: "0".into(),
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.username.trim().is_empty()
            && !self.uuid.trim().is_empty()
            && !self.access_token.trim().is_empty()
    }
}

/// `UUID v3` of `OfflinePlayer:<name>`.
pub fn offline_uuid(username: &str) -> Uuid {
    let digest = Md5::digest(format!("OfflinePlayer:{username}").as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest);
    uuid::Builder::from_md5_bytes(bytes).into_uuid()
}

/// Source of the session used when launching.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn current_session(&self) -> Option<Session>;
}

/// Always yields an offline session for a fixed username.
#[derive(Debug, Clone)]
pub struct OfflineAuthenticator {
    username: String,
}

impl OfflineAuthenticator {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }
}

impl Default for OfflineAuthenticator {
    fn default() -> Self {
        Self::new(DEFAULT_USERNAME)
    }
}

#[async_trait]
impl Authenticator for OfflineAuthenticator {
    async fn current_session(&self) -> Option<Session> {
        Some(Session::offline(&self.username))
    }
}
