// Copyright (c) 2026 The trust-admission Authors
//
// SPDX-License-Identifier: Apache-2.0
//

use std::time::Duration;

use thiserror::Error;

use crate::{auth::CredentialError, registry::TokenError, signer::SignerError, trust::TrustError};

pub type Result<T> = std::result::Result<T, Error>;

/// Failures of a single attempt to obtain a signed digest for one container
/// image with one image pull secret.
#[derive(Error, Debug)]
pub enum Error {
    #[error("resolve registry credential failed")]
    Credential(#[from] CredentialError),

    #[error("exchange content trust token failed")]
    Token(#[from] TokenError),

    #[error("resolve signer failed")]
    Signer(#[from] SignerError),

    #[error(transparent)]
    Trust(#[from] TrustError),

    #[error("{operation} did not finish within {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },
}

impl Error {
    /// Whether another image pull secret may still succeed after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Credential(_)
                | Error::Token(_)
                | Error::Timeout { .. }
                | Error::Trust(TrustError::Unauthorized)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Error::Trust(TrustError::Unauthorized), true)]
    #[case(Error::Token(TokenError::EmptyToken), true)]
    #[case(Error::Timeout { operation: "token exchange", after: Duration::from_secs(1) }, true)]
    #[case(Error::Trust(TrustError::ServerUnavailable("0".into())), false)]
    #[case(Error::Trust(TrustError::Other("no signed targets".into())), false)]
    #[case(Error::Signer(SignerError::MissingField { secret: "s".into(), field: "name" }), false)]
    fn retryable_errors(#[case] error: Error, #[case] retryable: bool) {
        assert_eq!(error.is_retryable(), retryable, "{error}");
    }
}
