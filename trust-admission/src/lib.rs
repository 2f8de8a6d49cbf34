// Copyright (c) 2026 The trust-admission Authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! Content trust admission decisions for Kubernetes workloads.
//!
//! For every container of an admitted pod specification the
//! [`controller::TrustController`] resolves the trust policy that applies to
//! the container image, looks up the digest a trust server attests for the
//! image tag and, when the image is allowed, pins it by digest through a JSON
//! Patch carried in the admission response.

pub mod admission;
pub mod auth;
pub mod config;
pub mod controller;
pub mod error;
pub mod evaluator;
pub mod image;
pub mod pod;
pub mod policy;
pub mod registry;
pub mod signer;
pub mod trust;

pub use error::{Error, Result};
