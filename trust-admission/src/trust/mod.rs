// Copyright (c) 2026 The trust-admission Authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! Lookup of the digest a trust server attests for an image tag.

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

use crate::signer::Signer;

pub mod notary;

pub use notary::{NotaryTrust, SignedTarget, TrustRepository};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrustError {
    /// The trust server did not accept the token.
    #[error("unauthorized")]
    Unauthorized,

    /// The trust server cannot be reached.
    #[error("unable to reach trust server at this time: {0}.")]
    ServerUnavailable(String),

    /// Any other failure, e.g. no signed content for the tag.
    #[error("{0}")]
    Other(String),
}

/// Content digest of a signed target.
#[derive(Clone, PartialEq, Eq)]
pub struct Digest(Vec<u8>);

impl Digest {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn from_hex(digest: &str) -> Result<Self, hex::FromHexError> {
        hex::decode(digest).map(Self)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Lowercase hex, as used in `@sha256:<digest>` references.
impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0))
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({self})")
    }
}

/// Everything a trust lookup for one tag needs.
#[derive(Clone, Copy, Debug)]
pub struct TrustRequest<'a> {
    /// URL of the trust server.
    pub server: &'a str,

    /// Repository name without tag, e.g. `registry.example.com/hello`.
    pub repository: &'a str,

    /// Token accepted by the trust server.
    pub token: &'a str,

    pub tag: &'a str,

    /// Signers the digest must be signed by. Empty accepts the repository's
    /// release signature.
    pub signers: &'a [Signer],
}

#[async_trait]
pub trait TrustLookup: Send + Sync {
    async fn signed_digest(&self, request: &TrustRequest<'_>) -> Result<Digest, TrustError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_renders_hex() {
        let digest = Digest::new(b"1234567890".to_vec());
        assert_eq!(digest.to_string(), "31323334353637383930");
        assert_eq!(Digest::from_hex("31323334353637383930").unwrap(), digest);
    }

    #[test]
    fn server_unavailable_message() {
        assert_eq!(
            TrustError::ServerUnavailable("0".into()).to_string(),
            "unable to reach trust server at this time: 0."
        );
    }
}
