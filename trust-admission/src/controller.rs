// Copyright (c) 2026 The trust-admission Authors
//
// SPDX-License-Identifier: Apache-2.0
//

use std::sync::Arc;

use log::{error, info};
use tokio_util::sync::CancellationToken;

use crate::{
    admission::{
        AdmissionOutcome, AdmissionRequest, AdmissionResponder, AdmissionResponse,
        ContainerVerdict,
    },
    auth::{CredentialProvider, SecretCredentialProvider, SecretStore},
    config::TrustAdmissionConfig,
    evaluator::{ContainerTarget, ContainerTrustEvaluator, TrustServerUnavailable},
    image::ImageReference,
    pod::{
        image_path, Container, ContainerKind, LocalObjectReference, PodSpec, PodSpecError,
        PodSpecExtractor,
    },
    policy::PolicyProvider,
    registry::{RegistryClient, TokenExchange},
    signer::{SecretSignerResolver, SignerResolver},
    trust::TrustLookup,
};

/// The services a [`TrustController`] consults.
pub struct Collaborators {
    pub pod_specs: Arc<dyn PodSpecExtractor>,
    pub policies: Arc<dyn PolicyProvider>,
    pub credentials: Arc<dyn CredentialProvider>,
    pub tokens: Arc<dyn TokenExchange>,
    pub signers: Arc<dyn SignerResolver>,
    pub trust: Arc<dyn TrustLookup>,
}

/// Decides content trust admission for whole pod specifications.
pub struct TrustController {
    pod_specs: Arc<dyn PodSpecExtractor>,
    policies: Arc<dyn PolicyProvider>,
    evaluator: ContainerTrustEvaluator,
}

impl TrustController {
    pub fn new(collaborators: Collaborators, config: TrustAdmissionConfig) -> Self {
        let evaluator = ContainerTrustEvaluator::new(
            collaborators.credentials,
            collaborators.tokens,
            collaborators.signers,
            collaborators.trust,
            config,
        );

        Self {
            pod_specs: collaborators.pod_specs,
            policies: collaborators.policies,
            evaluator,
        }
    }

    /// Controller reading image pull secrets and signer secrets from `secrets`
    /// and exchanging tokens with the registries directly.
    pub fn with_secret_store(
        secrets: Arc<dyn SecretStore>,
        pod_specs: Arc<dyn PodSpecExtractor>,
        policies: Arc<dyn PolicyProvider>,
        trust: Arc<dyn TrustLookup>,
        config: TrustAdmissionConfig,
    ) -> Self {
        let tokens = RegistryClient::new(reqwest::Client::new(), &config.token_service);
        let collaborators = Collaborators {
            pod_specs,
            policies,
            credentials: Arc::new(SecretCredentialProvider::new(secrets.clone())),
            tokens: Arc::new(tokens),
            signers: Arc::new(SecretSignerResolver::new(secrets)),
            trust,
        };

        Self::new(collaborators, config)
    }

    /// Handle one admission request.
    pub async fn admit(&self, request: &AdmissionRequest) -> AdmissionResponse {
        info!(
            "Processing Trust Admission Request for {} on {}",
            request.operation, request.name
        );

        let outcome = match self.pod_specs.pod_spec(request).await {
            Ok((path, spec)) => self.evaluate(&request.namespace, &path, &spec).await,
            Err(PodSpecError::HasParents | PodSpecError::ZeroReplicas) => {
                AdmissionOutcome::allowed()
            }
            Err(e) => AdmissionOutcome::denied(e.to_string()),
        };

        outcome.into_response(request.uid.clone())
    }

    /// Evaluate every container of `pod`, init containers first, in order.
    ///
    /// `base_path` is the JSON pointer of the pod specification in the
    /// admitted object; patches address images below it.
    pub async fn evaluate(
        &self,
        namespace: &str,
        base_path: &str,
        pod: &PodSpec,
    ) -> AdmissionOutcome {
        let mut responder = AdmissionResponder::default();

        for (kind, containers) in pod.containers_by_kind() {
            for (index, container) in containers.iter().enumerate() {
                let verdict = self
                    .evaluate_container(
                        namespace,
                        base_path,
                        kind,
                        index,
                        container,
                        &pod.image_pull_secrets,
                    )
                    .await;

                match verdict {
                    Ok(verdict) => responder.record(verdict),
                    Err(TrustServerUnavailable { message }) => {
                        return AdmissionOutcome::denied(message)
                    }
                }
            }
        }

        responder.flush()
    }

    /// Like [`TrustController::evaluate`], but gives up as soon as `cancel`
    /// fires. A cancelled evaluation is denied and never carries a patch.
    pub async fn evaluate_with_cancellation(
        &self,
        namespace: &str,
        base_path: &str,
        pod: &PodSpec,
        cancel: &CancellationToken,
    ) -> AdmissionOutcome {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                error!("admission request for namespace {namespace} was cancelled");
                AdmissionOutcome::denied(format!(
                    "admission request for namespace \"{namespace}\" was cancelled"
                ))
            }
            outcome = self.evaluate(namespace, base_path, pod) => outcome,
        }
    }

    async fn evaluate_container(
        &self,
        namespace: &str,
        base_path: &str,
        kind: ContainerKind,
        index: usize,
        container: &Container,
        pull_secrets: &[LocalObjectReference],
    ) -> Result<ContainerVerdict, TrustServerUnavailable> {
        let image = match ImageReference::parse(&container.image) {
            Ok(image) => image,
            Err(e) => {
                error!("{e}");
                return Ok(ContainerVerdict::Denied(format!(
                    "Deny \"{}\", invalid image name",
                    container.image
                )));
            }
        };

        info!("Container Image: {image}   Namespace: {namespace}");
        let policy = match self
            .policies
            .policy_to_enforce(namespace, &image.to_string())
            .await
        {
            Ok(Some(policy)) if policy.trust.is_enforced() => policy,
            Ok(_) => return Ok(ContainerVerdict::Allowed(None)),
            Err(e) => return Ok(ContainerVerdict::Denied(format!("{e:#}"))),
        };

        info!("Trust is enforced");
        if pull_secrets.is_empty() {
            return Ok(ContainerVerdict::Denied(format!(
                "Deny \"{image}\", no ImagePullSecret defined for {}",
                image.hostname()
            )));
        }

        info!("Evaluating {kind} #{}: {image}", index + 1);
        let target = ContainerTarget {
            namespace,
            raw_image: &container.image,
            image: &image,
            patch_path: image_path(base_path, kind, index),
        };

        self.evaluator
            .evaluate(&target, &policy.trust, pull_secrets)
            .await
    }
}
