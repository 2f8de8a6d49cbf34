// Copyright (c) 2026 The trust-admission Authors
//
// SPDX-License-Identifier: Apache-2.0
//

#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use anyhow::anyhow;
use async_trait::async_trait;
use trust_admission::{
    admission::AdmissionRequest,
    auth::{Credential, CredentialError, CredentialProvider},
    config::TrustAdmissionConfig,
    controller::{Collaborators, TrustController},
    pod::{Container, LocalObjectReference, PodSpec, PodSpecError, PodSpecExtractor},
    policy::{EffectivePolicy, PolicyProvider, TrustPolicy},
    registry::{TokenError, TokenExchange},
    signer::{Signer, SignerError, SignerResolver},
    trust::{Digest, TrustError, TrustLookup, TrustRequest},
};

pub const NAMESPACE: &str = "default";

/// `1234567890`, hex encoded in patches as `31323334353637383930`.
pub const DIGEST: &[u8] = b"1234567890";

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Policies keyed by image prefix, the longest matching prefix wins.
#[derive(Default)]
pub struct FakePolicies {
    policies: Vec<(String, Result<EffectivePolicy, String>)>,
}

impl FakePolicies {
    pub fn trust(mut self, prefix: &str, enabled: Option<bool>, trust_server: &str) -> Self {
        let policy = EffectivePolicy {
            trust: TrustPolicy {
                enabled,
                trust_server: trust_server.into(),
                signer_secrets: None,
            },
        };
        self.policies.push((prefix.into(), Ok(policy)));
        self
    }

    pub fn signers(mut self, prefix: &str, signer_secrets: &[&str]) -> Self {
        let policy = EffectivePolicy {
            trust: TrustPolicy {
                enabled: Some(true),
                trust_server: String::new(),
                signer_secrets: Some(
                    signer_secrets
                        .iter()
                        .map(|name| LocalObjectReference::new(*name))
                        .collect(),
                ),
            },
        };
        self.policies.push((prefix.into(), Ok(policy)));
        self
    }

    pub fn failing(mut self, prefix: &str, message: &str) -> Self {
        self.policies.push((prefix.into(), Err(message.into())));
        self
    }
}

#[async_trait]
impl PolicyProvider for FakePolicies {
    async fn policy_to_enforce(
        &self,
        _namespace: &str,
        image: &str,
    ) -> anyhow::Result<Option<EffectivePolicy>> {
        let matched = self
            .policies
            .iter()
            .filter(|(prefix, _)| image.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len());

        match matched {
            None => Ok(None),
            Some((_, Ok(policy))) => Ok(Some(policy.clone())),
            Some((_, Err(message))) => Err(anyhow!("{message}")),
        }
    }
}

/// Every secret resolves to `user-<secret>` unless it is listed as broken.
#[derive(Default)]
pub struct FakeCredentials {
    broken: Vec<String>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeCredentials {
    pub fn broken(secrets: &[&str]) -> Self {
        Self {
            broken: secrets.iter().map(|s| s.to_string()).collect(),
            calls: Mutex::default(),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CredentialProvider for FakeCredentials {
    async fn credential(
        &self,
        _namespace: &str,
        secret_name: &str,
        registry: &str,
    ) -> Result<Credential, CredentialError> {
        self.calls.lock().unwrap().push(secret_name.to_string());
        if self.broken.iter().any(|s| s == secret_name) {
            return Err(CredentialError::NoCredentialForRegistry {
                secret: secret_name.into(),
                registry: registry.into(),
            });
        }

        Ok(Credential {
            username: format!("user-{secret_name}"),
            password: "password".into(),
        })
    }
}

/// Hands out `token-<secret>` for `user-<secret>`, unless the token exchange
/// is set up to fail.
#[derive(Default)]
pub struct FakeTokens {
    pub fail: bool,
}

#[async_trait]
impl TokenExchange for FakeTokens {
    async fn content_trust_token(
        &self,
        credential: &Credential,
        _repository: &str,
        _registry_url: &str,
    ) -> Result<String, TokenError> {
        if self.fail {
            return Err(TokenError::Rejected(401));
        }

        let secret = credential.username.trim_start_matches("user-");
        Ok(format!("token-{secret}"))
    }
}

#[derive(Default)]
pub struct FakeSigners {
    signers: HashMap<String, Signer>,
}

impl FakeSigners {
    pub fn with(mut self, secret: &str, signer: Signer) -> Self {
        self.signers.insert(secret.into(), signer);
        self
    }
}

#[async_trait]
impl SignerResolver for FakeSigners {
    async fn resolve(&self, _namespace: &str, secret_name: &str) -> Result<Signer, SignerError> {
        self.signers
            .get(secret_name)
            .cloned()
            .ok_or_else(|| SignerError::MissingField {
                secret: secret_name.into(),
                field: "name",
            })
    }
}

/// What the fake trust server was asked.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrustCall {
    pub server: String,
    pub repository: String,
    pub token: String,
    pub tag: String,
    pub signers: Vec<String>,
}

type Responder = Box<dyn Fn(&TrustRequest<'_>) -> Result<Digest, TrustError> + Send + Sync>;

pub struct FakeTrust {
    respond: Responder,
    hang: bool,
    pub calls: Mutex<Vec<TrustCall>>,
}

impl FakeTrust {
    pub fn responding(
        respond: impl Fn(&TrustRequest<'_>) -> Result<Digest, TrustError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            respond: Box::new(respond),
            hang: false,
            calls: Mutex::default(),
        }
    }

    pub fn signed() -> Self {
        Self::responding(|_| Ok(Digest::new(DIGEST)))
    }

    pub fn failing(error: TrustError) -> Self {
        Self::responding(move |_| Err(error.clone()))
    }

    /// Never answers.
    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Self::signed()
        }
    }

    pub fn calls(&self) -> Vec<TrustCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TrustLookup for FakeTrust {
    async fn signed_digest(&self, request: &TrustRequest<'_>) -> Result<Digest, TrustError> {
        self.calls.lock().unwrap().push(TrustCall {
            server: request.server.into(),
            repository: request.repository.into(),
            token: request.token.into(),
            tag: request.tag.into(),
            signers: request.signers.iter().map(|s| s.name().to_string()).collect(),
        });

        if self.hang {
            std::future::pending::<()>().await;
        }

        (self.respond)(request)
    }
}

/// Serves a fixed result for every admission request.
pub struct FakePodSpecs(pub fn() -> Result<(String, PodSpec), PodSpecError>);

#[async_trait]
impl PodSpecExtractor for FakePodSpecs {
    async fn pod_spec(
        &self,
        _request: &AdmissionRequest,
    ) -> Result<(String, PodSpec), PodSpecError> {
        (self.0)()
    }
}

pub struct Harness {
    pub credentials: Arc<FakeCredentials>,
    pub trust: Arc<FakeTrust>,
    pub controller: TrustController,
}

pub struct HarnessBuilder {
    pub policies: FakePolicies,
    pub credentials: FakeCredentials,
    pub tokens: FakeTokens,
    pub signers: FakeSigners,
    pub trust: FakeTrust,
    pub pod_specs: FakePodSpecs,
    pub config: TrustAdmissionConfig,
}

impl HarnessBuilder {
    pub fn new(policies: FakePolicies, trust: FakeTrust) -> Self {
        init_logger();
        Self {
            policies,
            credentials: FakeCredentials::default(),
            tokens: FakeTokens::default(),
            signers: FakeSigners::default(),
            trust,
            pod_specs: FakePodSpecs(|| Err(PodSpecError::Other("no pod spec".into()))),
            config: TrustAdmissionConfig::default(),
        }
    }

    pub fn build(self) -> Harness {
        let credentials = Arc::new(self.credentials);
        let trust = Arc::new(self.trust);
        let collaborators = Collaborators {
            pod_specs: Arc::new(self.pod_specs),
            policies: Arc::new(self.policies),
            credentials: credentials.clone(),
            tokens: Arc::new(self.tokens),
            signers: Arc::new(self.signers),
            trust: trust.clone(),
        };

        Harness {
            credentials,
            trust,
            controller: TrustController::new(collaborators, self.config),
        }
    }
}

pub fn containers(images: &[&str]) -> Vec<Container> {
    images
        .iter()
        .enumerate()
        .map(|(i, image)| Container {
            name: format!("container-{i}"),
            image: image.to_string(),
        })
        .collect()
}

pub fn pull_secrets(names: &[&str]) -> Vec<LocalObjectReference> {
    names.iter().map(|n| LocalObjectReference::new(*n)).collect()
}

pub fn pod(images: &[&str], secrets: &[&str]) -> PodSpec {
    PodSpec {
        init_containers: Vec::new(),
        containers: containers(images),
        image_pull_secrets: pull_secrets(secrets),
    }
}
