use crate::error::{Error, Result};
use base64::{engine::general_purpose, Engine as _};
use reqwest::Client;
use serde::Deserialize;
use std::env;

pub const API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const ACCESS_TOKEN_ENV: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";
pub const SECRET_MANAGER_BASE_URL: &str = "https://secretmanager.googleapis.com/v1";
pub const SECRET_NAME: &str = "OPENAI_API_KEY";

/// Where the API key comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
    /// `OPENAI_API_KEY`, after loading a `.env` file if one exists.
    Env,
    /// Latest version of the `OPENAI_API_KEY` secret in a Google Cloud project.
    SecretManager { project_id: String },
}

impl KeySource {
    pub async fn resolve(&self) -> Result<String> {
        match self {
            KeySource::Env => {
                if let Err(e) = dotenv::dotenv() {
                    tracing::debug!("No .env file loaded: {}", e);
                }
                read_env_key(API_KEY_ENV)
            }
            KeySource::SecretManager { project_id } => {
                SecretManager::from_env(project_id.clone())?
                    .openai_key()
                    .await
            }
        }
    }
}

fn read_env_key(name: &str) -> Result<String> {
    match env::var(name) {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        _ => Err(Error::Credentials(format!("{} is not set", name))),
    }
}

#[derive(Debug, Deserialize)]
struct AccessSecretVersionResponse {
    payload: SecretPayload,
}

#[derive(Debug, Deserialize)]
struct SecretPayload {
    data: String,
}

/// Minimal Secret Manager reader over the REST API. The caller supplies a
/// ready OAuth access token; it is never refreshed here.
pub struct SecretManager {
    client: Client,
    base_url: String,
    project_id: String,
    access_token: String,
}

impl SecretManager {
    pub fn new(project_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: SECRET_MANAGER_BASE_URL.to_string(),
            project_id: project_id.into(),
            access_token: access_token.into(),
        }
    }

    pub fn from_env(project_id: String) -> Result<Self> {
        let token = read_env_key(ACCESS_TOKEN_ENV)?;
        Ok(Self::new(project_id, token))
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub async fn openai_key(&self) -> Result<String> {
        self.access_secret(SECRET_NAME).await
    }

    pub async fn access_secret(&self, secret: &str) -> Result<String> {
        let url = format!(
            "{}/projects/{}/secrets/{}/versions/latest:access",
            self.base_url.trim_end_matches('/'),
            self.project_id,
            secret
        );
        tracing::debug!(project = %self.project_id, secret, "Accessing secret version");

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Credentials(format!(
                "failed to access secret version {} (status {}): {}",
                secret,
                status.as_u16(),
                body.trim()
            )));
        }

        let parsed: AccessSecretVersionResponse = response.json().await?;
        let bytes = general_purpose::STANDARD
            .decode(parsed.payload.data.trim())
            .map_err(|e| Error::Credentials(format!("secret payload is not base64: {}", e)))?;
        let key = String::from_utf8(bytes)
            .map_err(|e| Error::Credentials(format!("secret payload is not UTF-8: {}", e)))?;

        Ok(key.trim().to_string())
    }
}
