//! HTTP client for the framework advisory service

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, error};

use crate::deploy::classifier::{FrameworkOracle, OracleRequest, OracleSuggestion};
use crate::errors::DeployError;
use crate::storage::settings::OracleSettings;

/// Framework oracle reached over HTTP.
///
/// The service receives an `OracleRequest` as JSON and answers with an `OracleSuggestion`.
pub struct HttpOracle {
    client: Client,
    endpoint: String,
    api_key: Option<SecretString>,
}

impl HttpOracle {
    /// Create a new oracle client. The API key is read from the environment variable
    /// named by `api_key_env`, never from the settings file itself.
    pub fn new(settings: &OracleSettings) -> Result<Self, DeployError> {
        if settings.endpoint.trim().is_empty() {
            return Err(DeployError::ConfigError("Oracle endpoint is empty".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;

        let api_key = match &settings.api_key_env {
            Some(var) => match std::env::var(var) {
                Ok(value) if !value.is_empty() => Some(SecretString::from(value)),
                _ => {
                    return Err(DeployError::ConfigError(format!(
                        "Oracle API key variable {} is not set",
                        var
                    )))
                }
            },
            None => None,
        };

        Ok(Self {
            client,
            endpoint: settings.endpoint.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl FrameworkOracle for HttpOracle {
    async fn suggest(&self, request: &OracleRequest) -> Result<OracleSuggestion, DeployError> {
        debug!("POST {}", self.endpoint);

        let mut builder = self.client.post(&self.endpoint).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.header(
                header::AUTHORIZATION,
                format!("Bearer {}", key.expose_secret()),
            );
        }

        let response = builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Oracle request failed: {} - {}", status, body);
            return Err(DeployError::Internal(format!("Oracle returned {}: {}", status, body)));
        }

        let suggestion = response.json().await?;
        Ok(suggestion)
    }
}
