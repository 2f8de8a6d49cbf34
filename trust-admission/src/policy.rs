// Copyright (c) 2026 The trust-admission Authors
//
// SPDX-License-Identifier: Apache-2.0
//

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::pod::LocalObjectReference;

/// The policy that applies to one image after namespace and cluster scoped
/// policies have been merged.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct EffectivePolicy {
    #[serde(default)]
    pub trust: TrustPolicy,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TrustPolicy {
    /// Unset is treated the same as `false`.
    pub enabled: Option<bool>,

    /// Trust server to query. Empty means the server next to the image's
    /// registry.
    #[serde(default)]
    pub trust_server: String,

    /// Secrets holding the signers whose signatures are accepted.
    pub signer_secrets: Option<Vec<LocalObjectReference>>,
}

impl TrustPolicy {
    pub fn is_enforced(&self) -> bool {
        self.enabled == Some(true)
    }
}

/// Resolves the policy to enforce for an image in a namespace.
#[async_trait]
pub trait PolicyProvider: Send + Sync {
    /// `Ok(None)` means that no policy applies to the image, so it is admitted
    /// without any trust enforcement.
    async fn policy_to_enforce(
        &self,
        namespace: &str,
        image: &str,
    ) -> anyhow::Result<Option<EffectivePolicy>>;
}
