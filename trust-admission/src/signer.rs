// Copyright (c) 2026 The trust-admission Authors
//
// SPDX-License-Identifier: Apache-2.0
//

use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::auth::SecretStore;

/// Key of the signer secret holding the signer (delegation role) name.
pub const SIGNER_NAME_KEY: &str = "name";

/// Key of the signer secret holding the PEM encoded public key.
pub const SIGNER_PUBLIC_KEY_KEY: &str = "publicKey";

#[derive(Error, Debug)]
pub enum SignerError {
    #[error("get secret {namespace}/{name} failed")]
    SecretUnavailable {
        namespace: String,
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("secret {secret} has no {field} entry")]
    MissingField { secret: String, field: &'static str },

    #[error("{field} entry of secret {secret} is not UTF-8")]
    NotUtf8 { secret: String, field: &'static str },
}

/// An identity whose signature over target metadata is accepted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signer {
    name: String,
    public_key: String,
}

impl Signer {
    pub fn new(name: impl Into<String>, public_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            public_key: public_key.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    /// The role the signer signs targets with, `targets/<name>`.
    pub fn role(&self) -> String {
        format!("targets/{}", self.name)
    }

    /// Lowercase hex sha256 of the public key.
    pub fn key_id(&self) -> String {
        hex::encode(Sha256::digest(self.public_key.as_bytes()))
    }
}

#[async_trait]
pub trait SignerResolver: Send + Sync {
    async fn resolve(&self, namespace: &str, secret_name: &str) -> Result<Signer, SignerError>;
}

/// [`SignerResolver`] reading secrets with a `name` and a `publicKey` entry.
pub struct SecretSignerResolver {
    store: Arc<dyn SecretStore>,
}

impl SecretSignerResolver {
    pub fn new(store: Arc<dyn SecretStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl SignerResolver for SecretSignerResolver {
    async fn resolve(&self, namespace: &str, secret_name: &str) -> Result<Signer, SignerError> {
        let data = self
            .store
            .secret(namespace, secret_name)
            .await
            .map_err(|source| SignerError::SecretUnavailable {
                namespace: namespace.to_string(),
                name: secret_name.to_string(),
                source,
            })?;

        let field = |field: &'static str| {
            let value = data.get(field).ok_or_else(|| SignerError::MissingField {
                secret: secret_name.to_string(),
                field,
            })?;
            String::from_utf8(value.clone()).map_err(|_| SignerError::NotUtf8 {
                secret: secret_name.to_string(),
                field,
            })
        };

        Ok(Signer::new(
            field(SIGNER_NAME_KEY)?,
            field(SIGNER_PUBLIC_KEY_KEY)?,
        ))
    }
}
