// Copyright (c) 2026 The trust-admission Authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! Admission request and response types, and the responder accumulating the
//! per container outcomes of one admission request.

use base64::{engine::general_purpose::STANDARD, Engine};
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::Display;

/// `patchType` of an admission response carrying a JSON Patch.
pub const PATCH_TYPE_JSON_PATCH: &str = "JSONPatch";

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct GroupVersionKind {
    #[serde(default)]
    pub group: String,

    #[serde(default)]
    pub version: String,

    #[serde(default)]
    pub kind: String,
}

/// The fields of a Kubernetes `AdmissionRequest` used for trust admission.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionRequest {
    pub uid: String,

    #[serde(default)]
    pub kind: GroupVersionKind,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub namespace: String,

    #[serde(default)]
    pub operation: String,

    #[serde(default)]
    pub object: Value,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Status {
    pub message: String,
}

/// A Kubernetes `AdmissionResponse`.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionResponse {
    pub uid: String,

    pub allowed: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,

    /// base64 of the JSON Patch document
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch_type: Option<String>,
}

#[derive(Display, Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PatchOp {
    Replace,
}

/// One RFC 6902 operation.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct JsonPatchOperation {
    pub op: PatchOp,
    pub path: String,
    pub value: String,
}

impl JsonPatchOperation {
    pub fn replace(path: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            op: PatchOp::Replace,
            path: path.into(),
            value: value.into(),
        }
    }
}

/// The outcome of evaluating one container.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContainerVerdict {
    /// Admitted, pinned by the patch if there is one.
    Allowed(Option<JsonPatchOperation>),

    Denied(String),
}

/// Accumulates container verdicts of one admission request. It is consumed by
/// [`AdmissionResponder::flush`], so nothing can be read mid-construction.
#[derive(Debug, Default)]
pub struct AdmissionResponder {
    denials: Vec<String>,
    patches: Vec<JsonPatchOperation>,
}

impl AdmissionResponder {
    pub fn deny(&mut self, message: impl Into<String>) {
        self.denials.push(message.into());
    }

    pub fn record(&mut self, verdict: ContainerVerdict) {
        match verdict {
            ContainerVerdict::Allowed(Some(patch)) => self.patches.push(patch),
            ContainerVerdict::Allowed(None) => {}
            ContainerVerdict::Denied(message) => self.deny(message),
        }
    }

    pub fn has_denials(&self) -> bool {
        !self.denials.is_empty()
    }

    /// Render the final decision, serializing patches with `serde_json`.
    pub fn flush(self) -> AdmissionOutcome {
        self.flush_with(|patches| serde_json::to_vec(patches))
    }

    /// Render the final decision with the given patch encoder.
    ///
    /// Any denial discards all patches. A patch that cannot be encoded turns
    /// the decision into a denial.
    pub fn flush_with<F, E>(self, encode: F) -> AdmissionOutcome
    where
        F: FnOnce(&[JsonPatchOperation]) -> Result<Vec<u8>, E>,
        E: std::fmt::Display,
    {
        if self.has_denials() {
            return AdmissionOutcome::denied(self.denials.join("\n"));
        }

        if self.patches.is_empty() {
            return AdmissionOutcome::allowed();
        }

        match encode(&self.patches) {
            Ok(document) => {
                info!("Mutation patch: {}", String::from_utf8_lossy(&document));
                AdmissionOutcome {
                    allowed: true,
                    message: String::new(),
                    patches: self.patches,
                    patch_document: Some(document),
                }
            }
            Err(e) => AdmissionOutcome::denied(format!("Invalid Patch: {e}")),
        }
    }
}

/// Final decision for one admission request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdmissionOutcome {
    pub allowed: bool,

    /// Newline separated denial messages, empty when allowed.
    pub message: String,

    pub patches: Vec<JsonPatchOperation>,

    patch_document: Option<Vec<u8>>,
}

impl AdmissionOutcome {
    pub fn allowed() -> Self {
        Self {
            allowed: true,
            message: String::new(),
            patches: Vec::new(),
            patch_document: None,
        }
    }

    pub fn denied(message: impl Into<String>) -> Self {
        Self {
            allowed: false,
            message: message.into(),
            patches: Vec::new(),
            patch_document: None,
        }
    }

    /// The serialized JSON Patch document, if the decision mutates the object.
    pub fn patch_document(&self) -> Option<&[u8]> {
        self.patch_document.as_deref()
    }

    pub fn into_response(self, uid: impl Into<String>) -> AdmissionResponse {
        let status = (!self.allowed).then(|| Status {
            message: self.message,
        });
        let patch = self.patch_document.map(|document| STANDARD.encode(document));
        let patch_type = patch.as_ref().map(|_| PATCH_TYPE_JSON_PATCH.to_string());

        AdmissionResponse {
            uid: uid.into(),
            allowed: self.allowed,
            status,
            patch,
            patch_type,
        }
    }
}
