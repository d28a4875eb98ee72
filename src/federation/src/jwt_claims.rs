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

use crate::Result;
use crate::errors::Error;
use base64::prelude::{BASE64_URL_SAFE_NO_PAD, Engine as _};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use time::OffsetDateTime;

const SCOPE_CLAIM: &str = "scope";
const RESERVED_CLAIMS: [&str; 5] = ["iss", "sub", "aud", "iat", "exp"];

/// The claims of a self-signed JWT.
///
/// A set of claims is [complete][JwtClaims::is_complete] when it has an
/// issuer, a subject, and either an audience or a non-empty `scope` claim.
///
/// # Example
/// ```
/// # use google_cloud_auth_federation::jwt_claims::JwtClaims;
/// let base = JwtClaims::builder()
///     .with_issuer("sa@example.iam.gserviceaccount.com")
///     .with_subject("sa@example.iam.gserviceaccount.com")
///     .build();
/// assert!(!base.is_complete());
///
/// let overrides = JwtClaims::builder()
///     .with_audience("https://pubsub.googleapis.com/")
///     .build();
/// assert!(base.merge(&overrides).is_complete());
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct JwtClaims {
    audience: Option<String>,
    issuer: Option<String>,
    subject: Option<String>,
    additional_claims: HashMap<String, String>,
}

impl JwtClaims {
    pub fn builder() -> Builder {
        Builder::default()
    }

    pub fn audience(&self) -> Option<&str> {
        self.audience.as_deref()
    }

    pub fn issuer(&self) -> Option<&str> {
        self.issuer.as_deref()
    }

    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    pub fn additional_claims(&self) -> &HashMap<String, String> {
        &self.additional_claims
    }

    /// Returns the claims in `self`, overridden by any claim set in `other`.
    ///
    /// Scalar claims come from `other` when set, and from `self` otherwise.
    /// The additional claims are the union of both maps, on conflicts the
    /// value in `other` wins.
    pub fn merge(&self, other: &JwtClaims) -> JwtClaims {
        let mut additional_claims = self.additional_claims.clone();
        additional_claims.extend(
            other
                .additional_claims
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        JwtClaims {
            audience: other.audience.clone().or_else(|| self.audience.clone()),
            issuer: other.issuer.clone().or_else(|| self.issuer.clone()),
            subject: other.subject.clone().or_else(|| self.subject.clone()),
            additional_claims,
        }
    }

    /// Returns `true` if the claims are sufficient to mint a token.
    pub fn is_complete(&self) -> bool {
        let has_scope = self
            .additional_claims
            .get(SCOPE_CLAIM)
            .is_some_and(|s| !s.is_empty());
        self.issuer.is_some() && self.subject.is_some() && (self.audience.is_some() || has_scope)
    }

    /// Encodes the claims as the (base64url) payload of a JWT.
    ///
    /// The registered claims (`iss`, `sub`, `aud`, `iat`, `exp`) take
    /// precedence over additional claims with the same name.
    pub fn encode(&self, issued_at: OffsetDateTime, expires_at: OffsetDateTime) -> Result<String> {
        let (Some(issuer), Some(subject)) = (&self.issuer, &self.subject) else {
            let field = if self.issuer.is_none() { "issuer" } else { "subject" };
            return Err(Error::missing_field(field));
        };
        if !self.is_complete() {
            return Err(Error::missing_field("audience"));
        }
        if expires_at < issued_at {
            return Err(Error::configuration(format!(
                "expiration time {expires_at:?}, must be later than issued time {issued_at:?}"
            )));
        }
        let payload = Payload {
            iss: issuer,
            sub: subject,
            aud: self.audience.as_deref(),
            iat: issued_at,
            exp: expires_at,
            additional: self
                .additional_claims
                .iter()
                .filter(|(k, _)| !RESERVED_CLAIMS.contains(&k.as_str()))
                .map(|(k, v)| (k.as_str(), v.as_str()))
                .collect(),
        };
        let json = serde_json::to_string(&payload).map_err(Error::format)?;
        Ok(BASE64_URL_SAFE_NO_PAD.encode(json.as_bytes()))
    }
}

#[derive(Serialize)]
struct Payload<'a> {
    iss: &'a str,
    sub: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    aud: Option<&'a str>,
    #[serde(with = "time::serde::timestamp")]
    iat: OffsetDateTime,
    #[serde(with = "time::serde::timestamp")]
    exp: OffsetDateTime,
    #[serde(flatten)]
    additional: BTreeMap<&'a str, &'a str>,
}

/// A builder for [JwtClaims].
#[derive(Clone, Debug, Default)]
pub struct Builder {
    audience: Option<String>,
    issuer: Option<String>,
    subject: Option<String>,
    additional_claims: Option<HashMap<String, String>>,
}

impl Builder {
    pub fn with_audience<T: Into<String>>(mut self, v: T) -> Self {
        self.audience = Some(v.into());
        self
    }

    pub fn with_issuer<T: Into<String>>(mut self, v: T) -> Self {
        self.issuer = Some(v.into());
        self
    }

    pub fn with_subject<T: Into<String>>(mut self, v: T) -> Self {
        self.subject = Some(v.into());
        self
    }

    /// Replaces the additional claims.
    pub fn with_additional_claims<I, K, V>(mut self, v: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.additional_claims = Some(v.into_iter().map(|(k, v)| (k.into(), v.into())).collect());
        self
    }

    pub fn build(self) -> JwtClaims {
        JwtClaims {
            audience: self.audience,
            issuer: self.issuer,
            subject: self.subject,
            additional_claims: self.additional_claims.unwrap_or_default(),
        }
    }
}
