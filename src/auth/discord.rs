//! Discord as the external identity provider.

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::config::DiscordConfig;

const AUTHORIZE_URL: &str = "https://discord.com/oauth2/authorize";
const TOKEN_URL: &str = "https://discord.com/api/oauth2/token";
const ME_URL: &str = "https://discord.com/api/users/@me";
const SCOPES: &str = "identify email";

/// Profile handed to external enrollment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalProfile {
    pub external_id: String,
    pub username: String,
    pub email: Option<String>,
    pub avatar: Option<String>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Where to send the browser to start the handshake.
    fn authorize_url(&self, state: &str) -> anyhow::Result<String>;
    /// Trade an authorization code for the caller's profile.
    async fn exchange(&self, code: &str) -> anyhow::Result<ExternalProfile>;
}

pub struct DiscordProvider {
    http: reqwest::Client,
    config: DiscordConfig,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct DiscordUser {
    id: String,
    username: String,
    email: Option<String>,
    avatar: Option<String>,
}

impl DiscordProvider {
    pub fn new(config: DiscordConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl IdentityProvider for DiscordProvider {
    fn authorize_url(&self, state: &str) -> anyhow::Result<String> {
        let url = Url::parse_with_params(
            AUTHORIZE_URL,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", SCOPES),
                ("state", state),
            ],
        )?;
        Ok(url.into())
    }

    async fn exchange(&self, code: &str) -> anyhow::Result<ExternalProfile> {
        let token: TokenResponse = self
            .http
            .post(TOKEN_URL)
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.config.redirect_uri.as_str()),
            ])
            .send()
            .await
            .context("discord token request")?
            .error_for_status()
            .context("discord token exchange rejected")?
            .json()
            .await
            .context("discord token response")?;

        let me: DiscordUser = self
            .http
            .get(ME_URL)
            .bearer_auth(&token.access_token)
            .send()
            .await
            .context("discord profile request")?
            .error_for_status()
            .context("discord profile rejected")?
            .json()
            .await
            .context("discord profile response")?;

        debug!(external_id = %me.id, "discord profile fetched");
        Ok(ExternalProfile {
            external_id: me.id,
            username: me.username,
            email: me.email,
            avatar: me.avatar,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorize_url_carries_state_and_scopes() {
        let provider = DiscordProvider::new(DiscordConfig {
            client_id: "123".into(),
            client_secret: "shh".into(),
            redirect_uri: "http://localhost:5000/api/auth/discord/callback".into(),
        });
        let raw = provider.authorize_url("xyz").unwrap();
        let url = Url::parse(&raw).unwrap();
        let params: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();

        assert_eq!(url.host_str(), Some("discord.com"));
        assert_eq!(params["client_id"], "123");
        assert_eq!(params["state"], "xyz");
        assert_eq!(params["scope"], "identify email");
        assert_eq!(params["response_type"], "code");
        assert!(!raw.contains("shh"));
    }
}
