// Copyright (c) 2026 The trust-admission Authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! Container image references as they appear in a pod specification.
//!
//! Splitting the registry host from the repository path follows the Docker
//! reference rules implemented by [`oci_client::Reference`]: the first path
//! component is a host only if it contains a `.` or a `:` or is `localhost`,
//! otherwise the image lives on `docker.io` (and single component names gain
//! the `library/` namespace). Policy matching and trust server derivation both
//! key off the resolved host, so this rule must not be re-derived here.

use std::{fmt, str::FromStr};

use oci_client::Reference;
use thiserror::Error;

/// Tag assumed when an image reference does not carry one.
pub const DEFAULT_TAG: &str = "latest";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid image reference {reference:?}: {reason}")]
pub struct ParseError {
    reference: String,
    reason: String,
}

#[derive(Error, Debug)]
#[error("cannot derive a trust server from registry {host:?}")]
pub struct TrustServerError {
    host: String,
    #[source]
    source: url::ParseError,
}

/// Parsed form of a raw container image string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageReference {
    host: String,
    repository: String,
    tag: Option<String>,
    digest: Option<String>,
}

impl ImageReference {
    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        let reference = Reference::from_str(raw).map_err(|e| ParseError {
            reference: raw.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            host: reference.registry().to_string(),
            repository: reference.repository().to_string(),
            tag: explicit_tag(raw).map(str::to_string),
            digest: reference.digest().map(str::to_string),
        })
    }

    /// Registry host, including the port if one was given.
    pub fn hostname(&self) -> &str {
        &self.host
    }

    /// Repository path on the registry, without host and tag.
    pub fn repository(&self) -> &str {
        &self.repository
    }

    /// The tag of the image, [`DEFAULT_TAG`] when none was given.
    pub fn tag(&self) -> &str {
        self.tag.as_deref().unwrap_or(DEFAULT_TAG)
    }

    pub fn digest(&self) -> Option<&str> {
        self.digest.as_deref()
    }

    /// `<host>/<repository>`
    pub fn name_without_tag(&self) -> String {
        format!("{}/{}", self.host, self.repository)
    }

    /// `<host>/<repository>:<tag>`, using [`DEFAULT_TAG`] when no tag was given.
    pub fn name_with_tag(&self) -> String {
        format!("{}:{}", self.name_without_tag(), self.tag())
    }

    /// Image reference pinned to the given hex encoded sha256 digest.
    pub fn pinned(&self, digest_hex: &str) -> String {
        format!("{}@sha256:{digest_hex}", self.name_without_tag())
    }

    /// URL the registry's token endpoint lives under.
    pub fn registry_url(&self) -> String {
        format!("https://{}", self.host)
    }

    /// Trust server assumed to sit next to the registry, `https://<host>:<port>`.
    pub fn content_trust_url(&self, port: u16) -> Result<String, TrustServerError> {
        let server = format!("https://{}:{port}", self.host);
        url::Url::parse(&server).map_err(|source| TrustServerError {
            host: self.host.clone(),
            source,
        })?;
        Ok(server)
    }
}

impl FromStr for ImageReference {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Canonical form: `<host>/<repository>[:<tag>][@<digest>]`, keeping the tag
/// only if the raw reference spelled one out.
impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.host, self.repository)?;
        if let Some(tag) = &self.tag {
            write!(f, ":{tag}")?;
        }
        if let Some(digest) = &self.digest {
            write!(f, "@{digest}")?;
        }
        Ok(())
    }
}

fn explicit_tag(raw: &str) -> Option<&str> {
    let name = raw.split('@').next().unwrap_or(raw);
    let last = name.rsplit('/').next().unwrap_or(name);
    last.split_once(':').map(|(_, tag)| tag)
}
