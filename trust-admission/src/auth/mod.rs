// Copyright (c) 2026 The trust-admission Authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! Registry credentials held in Kubernetes image pull secrets.

use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    sync::Arc,
};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Key of a `kubernetes.io/dockerconfigjson` secret.
pub const DOCKER_CONFIG_JSON_KEY: &str = ".dockerconfigjson";

/// Key of a legacy `kubernetes.io/dockercfg` secret.
pub const DOCKER_CFG_KEY: &str = ".dockercfg";

/// Decoded `data` of a Kubernetes secret.
pub type SecretData = BTreeMap<String, Vec<u8>>;

/// Read access to the secrets of the cluster.
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn secret(&self, namespace: &str, name: &str) -> anyhow::Result<SecretData>;
}

#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("get secret {namespace}/{name} failed")]
    SecretUnavailable {
        namespace: String,
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("secret {0} is not an image pull secret")]
    NotDockerConfig(String),

    #[error("parse docker config in secret {secret} failed")]
    InvalidDockerConfig {
        secret: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("secret {secret} has no credential for registry {registry}")]
    NoCredentialForRegistry { secret: String, registry: String },

    #[error("malformed auth field for registry {registry}")]
    MalformedAuth {
        registry: String,
        #[source]
        source: Option<base64::DecodeError>,
    },
}

/// Username and password for a registry.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Resolves the credential an image pull secret holds for a registry.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn credential(
        &self,
        namespace: &str,
        secret_name: &str,
        registry: &str,
    ) -> Result<Credential, CredentialError>;
}

#[derive(Deserialize, Serialize, Default)]
pub struct DockerConfigFile {
    #[serde(default)]
    auths: HashMap<String, DockerAuthConfig>,
}

#[derive(Deserialize, Serialize, Default)]
pub struct DockerAuthConfig {
    #[serde(default)]
    username: Option<String>,

    #[serde(default)]
    password: Option<String>,

    /// base64 of `username:password`
    #[serde(default)]
    auth: Option<String>,
}

impl DockerConfigFile {
    /// Parse the data of an image pull secret, either the current
    /// `.dockerconfigjson` layout or the legacy `.dockercfg` one which is the
    /// bare `auths` map.
    pub fn from_secret(secret: &str, data: &SecretData) -> Result<Self, CredentialError> {
        let invalid = |source| CredentialError::InvalidDockerConfig {
            secret: secret.to_string(),
            source,
        };

        if let Some(config) = data.get(DOCKER_CONFIG_JSON_KEY) {
            return serde_json::from_slice(config).map_err(invalid);
        }

        if let Some(config) = data.get(DOCKER_CFG_KEY) {
            let auths = serde_json::from_slice(config).map_err(invalid)?;
            return Ok(Self { auths });
        }

        Err(CredentialError::NotDockerConfig(secret.to_string()))
    }

    /// Get the credential for the registry host. Keys of the `auths` map may
    /// carry a scheme and a path, e.g. `https://registry.example.com/v1/`.
    pub fn credential_for_registry(&self, registry: &str) -> Option<&DockerAuthConfig> {
        self.auths.get(registry).or_else(|| {
            self.auths
                .iter()
                .find(|(key, _)| registry_host(key) == registry)
                .map(|(_, auth)| auth)
        })
    }
}

impl DockerAuthConfig {
    fn to_credential(&self, registry: &str) -> Result<Credential, CredentialError> {
        if let (Some(username), Some(password)) = (&self.username, &self.password) {
            if !username.is_empty() {
                return Ok(Credential {
                    username: username.clone(),
                    password: password.clone(),
                });
            }
        }

        let malformed = |source| CredentialError::MalformedAuth {
            registry: registry.to_string(),
            source,
        };
        let auth = self.auth.as_deref().ok_or_else(|| malformed(None))?;
        let decoded = STANDARD.decode(auth).map_err(|e| malformed(Some(e)))?;
        let decoded = String::from_utf8(decoded).map_err(|_| malformed(None))?;
        let (username, password) = decoded.split_once(':').ok_or_else(|| malformed(None))?;

        Ok(Credential {
            username: username.to_string(),
            password: password.to_string(),
        })
    }
}

fn registry_host(key: &str) -> &str {
    let key = key
        .strip_prefix("https://")
        .or_else(|| key.strip_prefix("http://"))
        .unwrap_or(key);
    key.split('/').next().unwrap_or(key)
}

/// [`CredentialProvider`] reading Docker config image pull secrets.
pub struct SecretCredentialProvider {
    store: Arc<dyn SecretStore>,
}

impl SecretCredentialProvider {
    pub fn new(store: Arc<dyn SecretStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl CredentialProvider for SecretCredentialProvider {
    async fn credential(
        &self,
        namespace: &str,
        secret_name: &str,
        registry: &str,
    ) -> Result<Credential, CredentialError> {
        let data = self
            .store
            .secret(namespace, secret_name)
            .await
            .map_err(|source| CredentialError::SecretUnavailable {
                namespace: namespace.to_string(),
                name: secret_name.to_string(),
                source,
            })?;

        let config = DockerConfigFile::from_secret(secret_name, &data)?;
        let auth = config.credential_for_registry(registry).ok_or_else(|| {
            CredentialError::NoCredentialForRegistry {
                secret: secret_name.to_string(),
                registry: registry.to_string(),
            }
        })?;

        debug!("found credential for {registry} in secret {namespace}/{secret_name}");
        auth.to_credential(registry)
    }
}
