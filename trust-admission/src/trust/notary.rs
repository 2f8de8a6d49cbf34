// Copyright (c) 2026 The trust-admission Authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! Digest selection over notary (TUF) target metadata.
//!
//! A notary repository may hold several signed targets for one tag, one per
//! delegation role that signed it. Without configured signers the release
//! signature is used (`targets/releases`, falling back to the top level
//! `targets` role). With signers every signer must have signed the tag under
//! its own role with its own key, and all of them must agree on the digest.

use async_trait::async_trait;
use log::debug;

use super::{Digest, TrustError, TrustLookup, TrustRequest};
use crate::signer::Signer;

pub const RELEASES_ROLE: &str = "targets/releases";
pub const TARGETS_ROLE: &str = "targets";

/// One signed target for a tag, as found in the metadata of `role`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedTarget {
    pub role: String,

    /// IDs of the keys of the role that signed the target.
    pub key_ids: Vec<String>,

    pub digest: Digest,
}

/// Raw access to the target metadata of a notary repository.
#[async_trait]
pub trait TrustRepository: Send + Sync {
    async fn targets(
        &self,
        server: &str,
        repository: &str,
        token: &str,
        tag: &str,
    ) -> Result<Vec<SignedTarget>, TrustError>;
}

/// [`TrustLookup`] enforcing signer constraints on notary target metadata.
pub struct NotaryTrust<R> {
    repository: R,
}

impl<R: TrustRepository> NotaryTrust<R> {
    pub fn new(repository: R) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl<R: TrustRepository> TrustLookup for NotaryTrust<R> {
    async fn signed_digest(&self, request: &TrustRequest<'_>) -> Result<Digest, TrustError> {
        debug!(
            "looking up {}:{} on {} ({} signers)",
            request.repository,
            request.tag,
            request.server,
            request.signers.len()
        );
        let targets = self
            .repository
            .targets(request.server, request.repository, request.token, request.tag)
            .await?;

        if targets.is_empty() {
            return Err(TrustError::Other(format!(
                "no signed targets found for {}",
                request.tag
            )));
        }

        let Some((first, others)) = request.signers.split_first() else {
            return release_digest(&targets, request.tag);
        };

        let digest = signed_by(&targets, first)?;
        for signer in others {
            if signed_by(&targets, signer)? != digest {
                return Err(TrustError::Other(format!(
                    "signers disagree on the digest for {}",
                    request.tag
                )));
            }
        }

        Ok(digest.clone())
    }
}

/// Digest of the target `signer` signed under its own role with its own key.
fn signed_by<'a>(targets: &'a [SignedTarget], signer: &Signer) -> Result<&'a Digest, TrustError> {
    let role = signer.role();
    let key_id = signer.key_id();
    targets
        .iter()
        .find(|t| t.role == role && t.key_ids.contains(&key_id))
        .map(|t| &t.digest)
        .ok_or_else(|| TrustError::Other(format!("no signature for signer {}", signer.name())))
}

fn release_digest(targets: &[SignedTarget], tag: &str) -> Result<Digest, TrustError> {
    [RELEASES_ROLE, TARGETS_ROLE]
        .iter()
        .find_map(|role| targets.iter().find(|t| t.role == *role))
        .map(|t| t.digest.clone())
        .ok_or_else(|| {
            TrustError::Other(format!(
                "no trust data for {tag} in {RELEASES_ROLE} or {TARGETS_ROLE}"
            ))
        })
}
