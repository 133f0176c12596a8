//! Login server client

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::application::errors::BotError;
use crate::domain::entities::sanitize;
use crate::domain::traits::{Authenticator, Challenge};
use crate::infrastructure::config::Config;

/// Response body of `act=login`, after the leading `]`
#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(default)]
    actionsuccess: bool,
    #[serde(default)]
    assertion: String,
}

/// Authenticates against the Showdown login server over HTTP
pub struct ShowdownLogin {
    client: Client,
    login_url: String,
    nick: String,
    password: String,
}

impl ShowdownLogin {
    pub fn new(
        login_url: impl Into<String>,
        nick: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            login_url: login_url.into(),
            nick: nick.into(),
            password: password.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.server.login_url, &config.bot.nick, &config.bot.password)
    }

    /// Assertion for a name without a password
    async fn guest_assertion(&self, challenge: &Challenge) -> Result<String, BotError> {
        let userid = sanitize(&self.nick);
        let challstr = challenge.as_challstr();
        let response = self.client
            .get(&self.login_url)
            .query(&[
                ("act", "getassertion"),
                ("userid", userid.as_str()),
                ("challstr", challstr.as_str()),
            ])
            .send()
            .await
            .map_err(|e| BotError::Auth(e.to_string()))?;

        let body = response
            .text()
            .await
            .map_err(|e| BotError::Auth(e.to_string()))?;

        check_assertion(&self.nick, body.trim())
    }

    /// Assertion for a registered name
    async fn account_assertion(&self, challenge: &Challenge) -> Result<String, BotError> {
        let challstr = challenge.as_challstr();
        let response = self.client
            .post(&self.login_url)
            .form(&[
                ("act", "login"),
                ("name", self.nick.as_str()),
                ("pass", self.password.as_str()),
                ("challstr", challstr.as_str()),
            ])
            .send()
            .await
            .map_err(|e| BotError::Auth(e.to_string()))?;

        if !response.status().is_success() {
            return Err(BotError::Auth(format!("Login server error: {}", response.status())));
        }

        let body = response
            .text()
            .await
            .map_err(|e| BotError::Auth(e.to_string()))?;

        let assertion = parse_login_response(&body)?;
        check_assertion(&self.nick, &assertion)
    }
}

#[async_trait]
impl Authenticator for ShowdownLogin {
    async fn login(&self, challenge: &Challenge) -> Result<String, BotError> {
        let assertion = if self.password.is_empty() {
            self.guest_assertion(challenge).await?
        } else {
            self.account_assertion(challenge).await?
        };

        tracing::info!("Obtained login assertion for {}", self.nick);
        Ok(format!("|/trn {},0,{}", self.nick, assertion))
    }
}

/// Extract the assertion from an `act=login` response (`]{"assertion":...}`)
pub fn parse_login_response(body: &str) -> Result<String, BotError> {
    let json = body.trim().trim_start_matches(']');
    let response: LoginResponse = serde_json::from_str(json)
        .map_err(|e| BotError::Auth(format!("Unreadable login response: {}", e)))?;

    if !response.actionsuccess || response.assertion.is_empty() {
        return Err(BotError::Auth("Login rejected, check nick and password".to_string()));
    }
    Ok(response.assertion)
}

/// Assertions starting with `;` are error messages from the login server
pub fn check_assertion(nick: &str, assertion: &str) -> Result<String, BotError> {
    if assertion.is_empty() {
        return Err(BotError::Auth("Empty assertion".to_string()));
    }
    if let Some(reason) = assertion.strip_prefix(';') {
        let reason = reason.trim_start_matches(';').trim();
        return Err(BotError::Auth(if reason.is_empty() {
            format!("The name '{}' is registered and needs a password", nick)
        } else {
            reason.to_string()
        }));
    }
    Ok(assertion.to_string())
}
