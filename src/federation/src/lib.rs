// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Google Cloud Client Libraries for Rust - Workload Identity Federation
//!
//! **WARNING:** this crate is under active development. We expect multiple
//! breaking changes in the upcoming releases. We welcome feedback about the
//! APIs, documentation, missing features, bugs, etc.
//!
//! This crate contains the building blocks used to exchange a credential
//! issued outside of Google Cloud for a short-lived Google access token,
//! as described in [Workload Identity Federation]:
//!
//! * [aws] shapes the AWS-signed `GetCallerIdentity` request used as a
//!   subject token, including the exact timestamp formats used by SigV4.
//! * [sts_exchange] models an [RFC 8693] token exchange request and sends it
//!   to a Security Token Service.
//! * [jwt_claims] and [jwt_credentials] mint self-signed JWT credentials.
//! * [id_token] wraps tokens that are already in JWT form.
//! * [cloud_shell] talks to the local credential broker available in
//!   Cloud Shell.
//!
//! [Workload Identity Federation]: https://cloud.google.com/iam/docs/workload-identity-federation
//! [RFC 8693]: https://datatracker.ietf.org/doc/html/rfc8693

pub mod errors;

/// Types and functions to federate AWS workloads.
pub mod aws;

/// Client for the Cloud Shell credential broker.
pub mod cloud_shell;

/// OIDC ID tokens and other tokens in JWT form.
pub mod id_token;

pub mod jws;

/// Claims for self-signed JWT credentials.
pub mod jwt_claims;

pub mod jwt_credentials;

pub mod signer;

/// OAuth 2.0 Token Exchange ([RFC 8693]) requests.
///
/// [RFC 8693]: https://datatracker.ietf.org/doc/html/rfc8693
pub mod sts_exchange;

/// Types and functions to work with auth [Tokens].
///
/// [Tokens]: https://cloud.google.com/docs/authentication#token
pub mod token;

pub(crate) mod constants;

/// A `Result` alias where the `Err` case is
/// `google_cloud_auth_federation::errors::Error`.
pub type Result<T> = std::result::Result<T, crate::errors::Error>;
