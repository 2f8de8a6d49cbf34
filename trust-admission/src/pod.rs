// Copyright (c) 2026 The trust-admission Authors
//
// SPDX-License-Identifier: Apache-2.0
//

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{AsRefStr, Display};
use thiserror::Error;

use crate::admission::AdmissionRequest;

/// JSON pointer of the pod specification inside a `Pod` object.
pub const POD_SPEC_PATH: &str = "/spec";

/// The parts of a Kubernetes `PodSpec` relevant to image admission.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PodSpec {
    #[serde(default)]
    pub init_containers: Vec<Container>,

    #[serde(default)]
    pub containers: Vec<Container>,

    #[serde(default)]
    pub image_pull_secrets: Vec<LocalObjectReference>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Container {
    pub name: String,

    #[serde(default)]
    pub image: String,
}

/// Reference to a secret in the namespace of the admitted object.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct LocalObjectReference {
    #[serde(default)]
    pub name: String,
}

impl LocalObjectReference {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// The container lists of a pod, named after their field in the `PodSpec`.
#[derive(AsRefStr, Display, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContainerKind {
    #[strum(serialize = "initContainers")]
    Init,
    #[strum(serialize = "containers")]
    Regular,
}

impl PodSpec {
    /// Init containers first, then regular containers, each in declaration order.
    pub fn containers_by_kind(&self) -> [(ContainerKind, &[Container]); 2] {
        [
            (ContainerKind::Init, self.init_containers.as_slice()),
            (ContainerKind::Regular, self.containers.as_slice()),
        ]
    }
}

/// JSON pointer to the `image` field of one container.
pub fn image_path(base: &str, kind: ContainerKind, index: usize) -> String {
    format!("{base}/{kind}/{index}/image")
}

#[derive(Error, Debug)]
pub enum PodSpecError {
    /// The object is owned by another object whose pod template has already
    /// been admitted.
    #[error("object has parent objects")]
    HasParents,

    /// The object will not create any pod.
    #[error("object has zero replicas")]
    ZeroReplicas,

    #[error("{0}")]
    Other(String),
}

/// Locates the pod specification inside an admitted object.
#[async_trait]
pub trait PodSpecExtractor: Send + Sync {
    /// Returns the JSON pointer of the pod specification inside the object
    /// together with the specification itself.
    async fn pod_spec(
        &self,
        request: &AdmissionRequest,
    ) -> std::result::Result<(String, PodSpec), PodSpecError>;
}

/// Extractor for bare `Pod` objects. Pods owned by a controller are reported
/// as [`PodSpecError::HasParents`].
#[derive(Default)]
pub struct PodExtractor;

#[async_trait]
impl PodSpecExtractor for PodExtractor {
    async fn pod_spec(
        &self,
        request: &AdmissionRequest,
    ) -> std::result::Result<(String, PodSpec), PodSpecError> {
        if request.kind.kind != "Pod" {
            return Err(PodSpecError::Other(format!(
                "unsupported kind {:?}",
                request.kind.kind
            )));
        }

        let owners = request
            .object
            .pointer("/metadata/ownerReferences")
            .and_then(Value::as_array);
        if owners.is_some_and(|owners| !owners.is_empty()) {
            return Err(PodSpecError::HasParents);
        }

        let spec = request
            .object
            .get("spec")
            .cloned()
            .ok_or_else(|| PodSpecError::Other("pod has no spec".into()))?;
        let spec: PodSpec = serde_json::from_value(spec)
            .map_err(|e| PodSpecError::Other(format!("invalid pod spec: {e}")))?;

        Ok((POD_SPEC_PATH.to_string(), spec))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::admission::GroupVersionKind;

    fn pod_request(object: Value) -> AdmissionRequest {
        AdmissionRequest {
            uid: "uid".into(),
            kind: GroupVersionKind {
                group: String::new(),
                version: "v1".into(),
                kind: "Pod".into(),
            },
            name: "hello".into(),
            namespace: "default".into(),
            operation: "CREATE".into(),
            object,
        }
    }

    #[test]
    fn image_paths() {
        assert_eq!(
            image_path("/spec", ContainerKind::Init, 0),
            "/spec/initContainers/0/image"
        );
        assert_eq!(
            image_path("/spec/template/spec", ContainerKind::Regular, 2),
            "/spec/template/spec/containers/2/image"
        );
    }

    #[tokio::test]
    async fn extract_pod_spec() {
        let request = pod_request(json!({
            "metadata": { "name": "hello" },
            "spec": {
                "initContainers": [{ "name": "init", "image": "registry.example.com/init" }],
                "containers": [{ "name": "main", "image": "registry.example.com/hello" }],
                "imagePullSecrets": [{ "name": "regsecret" }]
            }
        }));

        let (path, spec) = PodExtractor.pod_spec(&request).await.expect("pod spec");
        assert_eq!(path, "/spec");
        assert_eq!(spec.init_containers[0].image, "registry.example.com/init");
        assert_eq!(spec.containers[0].name, "main");
        assert_eq!(
            spec.image_pull_secrets,
            vec![LocalObjectReference::new("regsecret")]
        );
    }

    #[tokio::test]
    async fn owned_pod_has_parents() {
        let request = pod_request(json!({
            "metadata": { "ownerReferences": [{ "kind": "ReplicaSet", "name": "hello-1" }] },
            "spec": { "containers": [] }
        }));

        let err = PodExtractor.pod_spec(&request).await.unwrap_err();
        assert!(matches!(err, PodSpecError::HasParents));
    }

    #[tokio::test]
    async fn unsupported_kind() {
        let mut request = pod_request(json!({ "spec": {} }));
        request.kind.kind = "Deployment".into();

        let err = PodExtractor.pod_spec(&request).await.unwrap_err();
        assert!(matches!(err, PodSpecError::Other(_)));
    }
}
