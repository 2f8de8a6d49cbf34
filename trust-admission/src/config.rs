// Copyright (c) 2026 The trust-admission Authors
//
// SPDX-License-Identifier: Apache-2.0
//

use std::{path::Path, time::Duration};

use anyhow::{bail, Context, Result};
use config::{Config, File};
use log::info;
use serde::Deserialize;

/// Port of the trust server derived from a registry host when a policy does
/// not name a trust server explicitly.
pub const DEFAULT_TRUST_SERVER_PORT: u16 = 4443;

/// Default bound for each network call made while evaluating one image pull secret.
pub const DEFAULT_NETWORK_TIMEOUT_MS: u64 = 10_000;

/// OAuth service the content trust token is requested for.
pub const DEFAULT_TOKEN_SERVICE: &str = "notary";

/// `trust-admission` configuration information.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct TrustAdmissionConfig {
    /// Port used for `https://<registry host>:<port>` when a trust policy
    /// leaves `trustServer` empty.
    ///
    /// This defaults to [`DEFAULT_TRUST_SERVER_PORT`].
    #[serde(default = "default_trust_server_port")]
    pub trust_server_port: u16,

    /// Bound on resolving the registry credential of one image pull secret.
    #[serde(default = "default_network_timeout_ms")]
    pub credential_timeout_ms: u64,

    /// Bound on exchanging a registry credential for a content trust token.
    #[serde(default = "default_network_timeout_ms")]
    pub token_timeout_ms: u64,

    /// Bound on the trust server lookup. Hitting it is handled exactly like
    /// an unreachable trust server.
    #[serde(default = "default_network_timeout_ms")]
    pub trust_lookup_timeout_ms: u64,

    /// Service name sent along with the token exchange.
    ///
    /// This defaults to [`DEFAULT_TOKEN_SERVICE`].
    #[serde(default = "default_token_service")]
    pub token_service: String,
}

macro_rules! __default_deserialization_value {
    ($name: ident, $type: ident, $value: expr) => {
        fn $name() -> $type {
            $value
        }
    };
}

__default_deserialization_value!(default_trust_server_port, u16, DEFAULT_TRUST_SERVER_PORT);
__default_deserialization_value!(default_network_timeout_ms, u64, DEFAULT_NETWORK_TIMEOUT_MS);
__default_deserialization_value!(default_token_service, String, DEFAULT_TOKEN_SERVICE.into());

impl Default for TrustAdmissionConfig {
    fn default() -> Self {
        Self {
            trust_server_port: DEFAULT_TRUST_SERVER_PORT,
            credential_timeout_ms: DEFAULT_NETWORK_TIMEOUT_MS,
            token_timeout_ms: DEFAULT_NETWORK_TIMEOUT_MS,
            trust_lookup_timeout_ms: DEFAULT_NETWORK_TIMEOUT_MS,
            token_service: DEFAULT_TOKEN_SERVICE.into(),
        }
    }
}

impl TrustAdmissionConfig {
    /// Load `TrustAdmissionConfig` from a configuration file. Supported formats
    /// are all formats supported by the `config` crate, e.g.
    /// ```toml
    /// trust_server_port = 4443
    /// trust_lookup_timeout_ms = 5000
    /// ```
    pub fn from_file(config_path: &str) -> Result<Self> {
        info!("Use configuration file {config_path}");
        if !Path::new(config_path).exists() {
            bail!("Config file {config_path} not found.")
        }

        let c = Config::builder()
            .add_source(File::with_name(config_path))
            .build()?;

        let config: Self = c.try_deserialize().context("invalid config")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration object.
    pub fn validate(&self) -> Result<()> {
        if self.trust_server_port == 0 {
            bail!("trust_server_port must not be 0");
        }

        if self.credential_timeout_ms == 0
            || self.token_timeout_ms == 0
            || self.trust_lookup_timeout_ms == 0
        {
            bail!("network timeouts must be greater than 0");
        }

        Ok(())
    }

    pub fn credential_timeout(&self) -> Duration {
        Duration::from_millis(self.credential_timeout_ms)
    }

    pub fn token_timeout(&self) -> Duration {
        Duration::from_millis(self.token_timeout_ms)
    }

    pub fn trust_lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.trust_lookup_timeout_ms)
    }
}
