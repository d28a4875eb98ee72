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

//! Self-signed JWT credentials.
//!
//! [JwtCredentials] mint a JWT from a complete [JwtClaims] set and an
//! application-provided [Signer]. The JWT is used directly as a bearer token,
//! no token exchange takes place.
//!
//! # Example
//! ```
//! # use google_cloud_auth_federation::jwt_claims::JwtClaims;
//! # use google_cloud_auth_federation::jwt_credentials::Builder;
//! # use google_cloud_auth_federation::signer::Signer;
//! # fn sample(signer: Signer) -> google_cloud_auth_federation::Result<()> {
//! let claims = JwtClaims::builder()
//!     .with_issuer("sa@my-project.iam.gserviceaccount.com")
//!     .with_subject("sa@my-project.iam.gserviceaccount.com")
//!     .with_audience("https://pubsub.googleapis.com/")
//!     .build();
//! let credentials = Builder::new(claims, signer).build()?;
//! # Ok(()) }
//! ```

use crate::Result;
use crate::errors::Error;
use crate::jws::JwsHeader;
use crate::jwt_claims::JwtClaims;
use crate::signer::Signer;
use crate::token::{Token, TokenProvider};
use base64::prelude::{BASE64_URL_SAFE_NO_PAD, Engine as _};
use std::time::Duration;
use time::OffsetDateTime;

/// The default lifetime for self-signed JWTs.
pub const DEFAULT_LIFETIME: Duration = Duration::from_secs(3600);

const JWT_TYPE: &str = "JWT";

/// A [TokenProvider] minting self-signed JWTs.
#[derive(Clone, Debug)]
pub struct JwtCredentials {
    claims: JwtClaims,
    signer: Signer,
    lifetime: Duration,
}

impl JwtCredentials {
    pub fn claims(&self) -> &JwtClaims {
        &self.claims
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Returns new credentials with `overrides` merged into the claims.
    ///
    /// The signer and lifetime are shared with `self`. Fails if the merged
    /// claims are not complete.
    pub fn with_claims(&self, overrides: &JwtClaims) -> Result<Self> {
        Builder::new(self.claims.merge(overrides), self.signer.clone())
            .with_lifetime(self.lifetime)
            .build()
    }

    async fn mint(&self) -> Result<Token> {
        // JWT timestamps have second granularity.
        let now = OffsetDateTime::now_utc()
            .replace_nanosecond(0)
            .map_err(Error::format)?;
        let expires_at = expiration(now, self.lifetime).ok_or_else(|| {
            Error::configuration(format!(
                "lifetime {:?} overflows the expiration time",
                self.lifetime
            ))
        })?;
        let header = JwsHeader {
            alg: self.signer.algorithm(),
            typ: JWT_TYPE.to_string(),
            kid: self.signer.key_id(),
        };
        let content = format!(
            "{}.{}",
            header.encode()?,
            self.claims.encode(now, expires_at)?
        );
        let signature = self.signer.sign(content.as_bytes()).await?;
        tracing::debug!(
            issuer = self.claims.issuer(),
            audience = self.claims.audience(),
            %expires_at,
            "minted self-signed JWT"
        );
        Ok(Token {
            token: format!("{content}.{}", BASE64_URL_SAFE_NO_PAD.encode(signature)),
            token_type: "Bearer".to_string(),
            expires_at: Some(expires_at),
            metadata: None,
        })
    }
}

fn expiration(now: OffsetDateTime, lifetime: Duration) -> Option<OffsetDateTime> {
    time::Duration::try_from(lifetime)
        .ok()
        .and_then(|d| now.checked_add(d))
}

#[async_trait::async_trait]
impl TokenProvider for JwtCredentials {
    async fn token(&self) -> Result<Token> {
        self.mint().await
    }
}

/// A builder for [JwtCredentials].
#[derive(Debug)]
pub struct Builder {
    claims: JwtClaims,
    signer: Signer,
    lifetime: Option<Duration>,
}

impl Builder {
    pub fn new<S: Into<Signer>>(claims: JwtClaims, signer: S) -> Self {
        Self {
            claims,
            signer: signer.into(),
            lifetime: None,
        }
    }

    /// Sets the lifetime of the minted tokens.
    ///
    /// Defaults to [DEFAULT_LIFETIME].
    pub fn with_lifetime(mut self, v: Duration) -> Self {
        self.lifetime = Some(v);
        self
    }

    /// Returns the credentials.
    ///
    /// Fails with a missing field error if the claims are not complete, and
    /// with a configuration error if the lifetime is shorter than one second
    /// or too large to represent an expiration time.
    pub fn build(self) -> Result<JwtCredentials> {
        if self.claims.issuer().is_none() {
            return Err(Error::missing_field("issuer"));
        }
        if self.claims.subject().is_none() {
            return Err(Error::missing_field("subject"));
        }
        if !self.claims.is_complete() {
            return Err(Error::missing_field("audience"));
        }
        let lifetime = self.lifetime.unwrap_or(DEFAULT_LIFETIME);
        if lifetime.as_secs() == 0 {
            return Err(Error::configuration(
                "the lifetime of self-signed JWTs must be at least one second",
            ));
        }
        if expiration(OffsetDateTime::now_utc(), lifetime).is_none() {
            return Err(Error::configuration(format!(
                "the lifetime of self-signed JWTs is out of range: {lifetime:?}"
            )));
        }
        Ok(JwtCredentials {
            claims: self.claims,
            signer: self.signer,
            lifetime,
        })
    }
}
