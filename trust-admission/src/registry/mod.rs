// Copyright (c) 2026 The trust-admission Authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! Exchange of registry credentials for a short lived token accepted by the
//! trust server of the registry.

use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use thiserror::Error;

use crate::{auth::Credential, config::DEFAULT_TOKEN_SERVICE};

#[derive(Error, Debug)]
pub enum TokenError {
    #[error("token request failed")]
    Http(#[from] reqwest::Error),

    #[error("token request rejected with status {0}")]
    Rejected(u16),

    #[error("token endpoint returned an empty token")]
    EmptyToken,
}

/// Obtains content trust tokens scoped to a repository.
#[async_trait]
pub trait TokenExchange: Send + Sync {
    async fn content_trust_token(
        &self,
        credential: &Credential,
        repository: &str,
        registry_url: &str,
    ) -> Result<String, TokenError>;
}

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: String,

    #[serde(default)]
    token: String,
}

/// [`TokenExchange`] using the OAuth password grant of the registry, i.e.
/// `POST <registry>/oauth/token`.
pub struct RegistryClient {
    http_client: reqwest::Client,
    service: String,
}

impl Default for RegistryClient {
    fn default() -> Self {
        Self::new(reqwest::Client::new(), DEFAULT_TOKEN_SERVICE)
    }
}

impl RegistryClient {
    pub fn new(http_client: reqwest::Client, service: &str) -> Self {
        Self {
            http_client,
            service: service.to_string(),
        }
    }

    fn token_form<'a>(
        &'a self,
        credential: &'a Credential,
        scope: &'a str,
    ) -> [(&'a str, &'a str); 6] {
        [
            ("grant_type", "password"),
            ("client_id", "docker"),
            ("service", self.service.as_str()),
            ("scope", scope),
            ("username", credential.username.as_str()),
            ("password", credential.password.as_str()),
        ]
    }
}

#[async_trait]
impl TokenExchange for RegistryClient {
    async fn content_trust_token(
        &self,
        credential: &Credential,
        repository: &str,
        registry_url: &str,
    ) -> Result<String, TokenError> {
        let url = format!("{}/oauth/token", registry_url.trim_end_matches('/'));
        let scope = format!("repository:{repository}:pull");
        debug!("requesting content trust token for {repository} from {url}");

        let res = self
            .http_client
            .post(&url)
            .form(&self.token_form(credential, &scope))
            .send()
            .await?;

        if !res.status().is_success() {
            return Err(TokenError::Rejected(res.status().as_u16()));
        }

        let body = res.json::<TokenResponse>().await?;
        match (body.access_token, body.token) {
            (access_token, _) if !access_token.is_empty() => Ok(access_token),
            (_, token) if !token.is_empty() => Ok(token),
            _ => Err(TokenError::EmptyToken),
        }
    }
}
