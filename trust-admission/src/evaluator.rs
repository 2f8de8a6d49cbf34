// Copyright (c) 2026 The trust-admission Authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! Content trust evaluation of one container image.
//!
//! The image pull secrets of the pod are tried in declaration order and the
//! first one that yields a signed digest wins. Failures are handled depending
//! on what they say about the remaining secrets:
//!
//! - credential and token failures, and tokens the trust server rejects, only
//!   rule out the current secret;
//! - unresolvable signers and missing signed content deny the container;
//! - an unreachable trust server aborts the whole admission request.

use std::{future::Future, sync::Arc, time::Duration};

use log::{error, info, warn};
use thiserror::Error;

use crate::{
    admission::{ContainerVerdict, JsonPatchOperation},
    auth::CredentialProvider,
    config::TrustAdmissionConfig,
    error::{Error, Result},
    image::{ImageReference, TrustServerError},
    pod::LocalObjectReference,
    policy::TrustPolicy,
    registry::TokenExchange,
    signer::{Signer, SignerResolver},
    trust::{Digest, TrustError, TrustLookup, TrustRequest},
};

/// The trust server could not be reached. No further secret or container
/// should be evaluated against it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct TrustServerUnavailable {
    /// Denial message for the container that hit the outage.
    pub message: String,
}

/// A container image and where its `image` field lives in the admitted object.
#[derive(Debug)]
pub struct ContainerTarget<'a> {
    pub namespace: &'a str,

    /// The image string currently in the pod specification.
    pub raw_image: &'a str,

    pub image: &'a ImageReference,

    /// JSON pointer of the container's `image` field.
    pub patch_path: String,
}

pub struct ContainerTrustEvaluator {
    credentials: Arc<dyn CredentialProvider>,
    tokens: Arc<dyn TokenExchange>,
    signers: Arc<dyn SignerResolver>,
    trust: Arc<dyn TrustLookup>,
    config: TrustAdmissionConfig,
}

impl ContainerTrustEvaluator {
    pub fn new(
        credentials: Arc<dyn CredentialProvider>,
        tokens: Arc<dyn TokenExchange>,
        signers: Arc<dyn SignerResolver>,
        trust: Arc<dyn TrustLookup>,
        config: TrustAdmissionConfig,
    ) -> Self {
        Self {
            credentials,
            tokens,
            signers,
            trust,
            config,
        }
    }

    /// Evaluate the container against `policy`, trying `pull_secrets` in order.
    pub async fn evaluate(
        &self,
        target: &ContainerTarget<'_>,
        policy: &TrustPolicy,
        pull_secrets: &[LocalObjectReference],
    ) -> std::result::Result<ContainerVerdict, TrustServerUnavailable> {
        let image = target.image;
        let server = match self.trust_server(image, policy) {
            Ok(server) => server,
            Err(e) => {
                return Ok(ContainerVerdict::Denied(format!(
                    "Trust Server/Image Configuration Error: {:#}",
                    anyhow::Error::from(e)
                )))
            }
        };

        let mut signers: Option<Vec<Signer>> = None;
        for secret in pull_secrets {
            let res = self
                .digest_with_secret(target, policy, &server, &secret.name, &mut signers)
                .await;

            let e = match res {
                Ok(digest) => return Ok(self.allow(target, &digest)),
                Err(e) => e,
            };

            if e.is_retryable() {
                warn!(
                    "image pull secret {} cannot be used for {image}: {:#}",
                    secret.name,
                    anyhow::Error::from(e)
                );
                continue;
            }

            return match e {
                Error::Trust(TrustError::ServerUnavailable(_)) => {
                    error!("Trust server unavailable: {e}");
                    Err(TrustServerUnavailable {
                        message: trust_denial(image, &e),
                    })
                }
                Error::Signer(source) => Ok(ContainerVerdict::Denied(format!(
                    "Deny \"{image}\", could not get signerSecret from your cluster, {:#}",
                    anyhow::Error::from(source)
                ))),
                e => {
                    warn!("Failed to get trust information for {image:?}: {e}");
                    Ok(ContainerVerdict::Denied(trust_denial(image, &e)))
                }
            };
        }

        Ok(ContainerVerdict::Denied(format!(
            "Deny \"{image}\", no valid ImagePullSecret defined for {}",
            image.hostname()
        )))
    }

    fn trust_server(
        &self,
        image: &ImageReference,
        policy: &TrustPolicy,
    ) -> std::result::Result<String, TrustServerError> {
        if !policy.trust_server.is_empty() {
            return Ok(policy.trust_server.clone());
        }

        image.content_trust_url(self.config.trust_server_port)
    }

    /// One attempt with one image pull secret. Signers are resolved on the
    /// first attempt that gets that far and reused by later attempts.
    async fn digest_with_secret(
        &self,
        target: &ContainerTarget<'_>,
        policy: &TrustPolicy,
        server: &str,
        secret: &str,
        signers: &mut Option<Vec<Signer>>,
    ) -> Result<Digest> {
        let image = target.image;
        let repository = image.name_without_tag();

        let credential = bounded(
            "credential resolution",
            self.config.credential_timeout(),
            self.credentials
                .credential(target.namespace, secret, image.hostname()),
        )
        .await??;

        let token = bounded(
            "token exchange",
            self.config.token_timeout(),
            self.tokens
                .content_trust_token(&credential, &repository, &image.registry_url()),
        )
        .await??;

        if signers.is_none() {
            *signers = Some(self.resolve_signers(target.namespace, policy).await?);
        }

        let request = TrustRequest {
            server,
            repository: &repository,
            token: &token,
            tag: image.tag(),
            signers: signers.as_deref().unwrap_or_default(),
        };

        info!("getting signed image...");
        let timeout = self.config.trust_lookup_timeout();
        let digest = tokio::time::timeout(timeout, self.trust.signed_digest(&request))
            .await
            .unwrap_or_else(|_| {
                Err(TrustError::ServerUnavailable(format!(
                    "no response from {server} within {timeout:?}"
                )))
            })?;

        Ok(digest)
    }

    async fn resolve_signers(&self, namespace: &str, policy: &TrustPolicy) -> Result<Vec<Signer>> {
        let mut signers = Vec::new();
        for secret in policy.signer_secrets.iter().flatten() {
            signers.push(self.signers.resolve(namespace, &secret.name).await?);
        }

        Ok(signers)
    }

    fn allow(&self, target: &ContainerTarget<'_>, digest: &Digest) -> ContainerVerdict {
        let image = target.image;

        // Only pin the reference that was checked.
        if ImageReference::parse(target.raw_image).ok().as_ref() != Some(image) {
            warn!(
                "image {:?} no longer matches {image}, leaving it unpinned",
                target.raw_image
            );
            return ContainerVerdict::Allowed(None);
        }

        // A digest reference is never retargeted, it must be the signed one.
        if let Some(pinned) = image.digest() {
            let signed = format!("sha256:{digest}");
            if pinned != signed {
                warn!(
                    "{image} is pinned to {pinned}, but {} is signed as {signed}",
                    image.tag()
                );
                return ContainerVerdict::Denied(format!(
                    "Deny \"{image}\", digest {pinned} is not the signed digest for tag {}",
                    image.tag()
                ));
            }

            info!("{image} is pinned to its signed digest");
            return ContainerVerdict::Allowed(None);
        }

        let pinned = image.pinned(&digest.to_string());
        info!("Mutated to: {pinned}");
        ContainerVerdict::Allowed(Some(JsonPatchOperation::replace(
            target.patch_path.clone(),
            pinned,
        )))
    }
}

async fn bounded<T, E>(
    operation: &'static str,
    after: Duration,
    fut: impl Future<Output = std::result::Result<T, E>>,
) -> Result<std::result::Result<T, E>> {
    tokio::time::timeout(after, fut)
        .await
        .map_err(|_| Error::Timeout { operation, after })
}

fn trust_denial(image: &ImageReference, e: &Error) -> String {
    format!("Deny \"{image}\", failed to get content trust information: {e}")
}
