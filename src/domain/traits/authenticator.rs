use async_trait::async_trait;
use crate::application::errors::BotError;

/// Login challenge announced by the server in a `challstr` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub key_id: String,
    pub challenge: String,
}

impl Challenge {
    pub fn new(key_id: impl Into<String>, challenge: impl Into<String>) -> Self {
        Self {
            key_id: key_id.into(),
            challenge: challenge.into(),
        }
    }

    /// The `KEYID|CHALLENGE` form the login server expects
    pub fn as_challstr(&self) -> String {
        format!("{}|{}", self.key_id, self.challenge)
    }
}

/// Authenticator trait - abstraction over the login server handshake
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Resolve a challenge into the command string to send upstream
    /// (typically `|/trn NICK,0,ASSERTION`).
    async fn login(&self, challenge: &Challenge) -> Result<String, BotError>;
}
