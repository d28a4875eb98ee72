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

//! Parsed OIDC identity tokens.
//!
//! An [IdToken] keeps the raw compact serialization next to its decoded
//! header and payload. Only the raw string is persisted, deserializing an
//! [IdToken] parses the string again.
//!
//! Signatures are *not* verified. Use a JWT verification library before
//! trusting any claim.

use crate::Result;
use crate::errors::Error;
use crate::token::Token;
use base64::Engine as _;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use serde_json::{Map, Value};
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use time::OffsetDateTime;

// Some issuers pad their JWT segments, accept both forms.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// The decoded segments of a compact JWS.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JsonWebSignature {
    header: Map<String, Value>,
    payload: Map<String, Value>,
    signature: Vec<u8>,
}

impl JsonWebSignature {
    /// Splits and decodes `raw`. The signature is not verified.
    pub fn parse(raw: &str) -> Result<Self> {
        let parts: Vec<&str> = raw.split('.').collect();
        let [header, payload, signature] = parts.as_slice() else {
            return Err(Error::format(format!(
                "expected a JWS with 3 segments, got {}",
                parts.len()
            )));
        };
        Ok(Self {
            header: decode_object(header, "header")?,
            payload: decode_object(payload, "payload")?,
            signature: URL_SAFE_LENIENT.decode(signature).map_err(Error::format)?,
        })
    }

    /// The JOSE header.
    pub fn header(&self) -> &Map<String, Value> {
        &self.header
    }

    /// The claims.
    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    pub fn signature(&self) -> &[u8] {
        &self.signature
    }
}

fn decode_object(segment: &str, name: &str) -> Result<Map<String, Value>> {
    let bytes = URL_SAFE_LENIENT.decode(segment).map_err(Error::format)?;
    match serde_json::from_slice(&bytes).map_err(Error::format)? {
        Value::Object(map) => Ok(map),
        _ => Err(Error::format(format!(
            "the JWS {name} is not a JSON object"
        ))),
    }
}

// `Map` is ordered by key, so equal maps have the same serialization.
fn canonical(map: &Map<String, Value>) -> String {
    serde_json::to_string(map).unwrap_or_default()
}

/// An OIDC identity token.
///
/// Two tokens are equal when their raw strings, headers, and payloads are
/// equal. The token serializes as its raw string.
///
/// # Example
/// ```
/// # use google_cloud_auth_federation::id_token::IdToken;
/// // {"alg":"RS256"} . {"exp":1700000000} . "sig"
/// let raw = "eyJhbGciOiJSUzI1NiJ9.eyJleHAiOjE3MDAwMDAwMDB9.c2ln";
/// let token = IdToken::new(raw)?;
/// assert_eq!(token.raw_value(), raw);
/// assert_eq!(token.expires_at().map(|t| t.unix_timestamp()), Some(1700000000));
/// # Ok::<(), google_cloud_auth_federation::errors::Error>(())
/// ```
#[derive(Clone, serde::Serialize, serde::Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct IdToken {
    raw: String,
    jws: JsonWebSignature,
    expires_at: Option<OffsetDateTime>,
}

impl IdToken {
    /// Parses `raw` as a compact JWS.
    ///
    /// Fails if `raw` does not have three segments, if a segment is not valid
    /// base64url, if the header or payload is not a JSON object, or if the
    /// `exp` claim is present but not a number.
    pub fn new<T: Into<String>>(raw: T) -> Result<Self> {
        let raw = raw.into();
        let jws = JsonWebSignature::parse(&raw)?;
        let expires_at = match jws.payload().get("exp") {
            None | Some(Value::Null) => None,
            Some(exp) => Some(expiration(exp)?),
        };
        Ok(Self {
            raw,
            jws,
            expires_at,
        })
    }

    /// The token as received.
    pub fn raw_value(&self) -> &str {
        &self.raw
    }

    pub fn json_web_signature(&self) -> &JsonWebSignature {
        &self.jws
    }

    /// The expiration time from the `exp` claim, if present.
    pub fn expires_at(&self) -> Option<OffsetDateTime> {
        self.expires_at
    }

    /// Returns the token as a bearer [Token].
    pub fn token(&self) -> Token {
        Token {
            expires_at: self.expires_at,
            ..Token::bearer(self.raw.clone())
        }
    }
}

fn expiration(exp: &Value) -> Result<OffsetDateTime> {
    let seconds = exp
        .as_i64()
        .or_else(|| exp.as_f64().map(|f| f as i64))
        .ok_or_else(|| Error::format(format!("the `exp` claim is not a number: {exp}")))?;
    OffsetDateTime::from_unix_timestamp(seconds).map_err(Error::format)
}

impl PartialEq for IdToken {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
            && self.jws.header == other.jws.header
            && self.jws.payload == other.jws.payload
    }
}

impl Eq for IdToken {}

impl Hash for IdToken {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
        canonical(&self.jws.header).hash(state);
        canonical(&self.jws.payload).hash(state);
    }
}

impl std::fmt::Debug for IdToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdToken")
            .field("raw", &"[censored]")
            .field("header", &self.jws.header)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl FromStr for IdToken {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for IdToken {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<IdToken> for String {
    fn from(value: IdToken) -> Self {
        value.raw
    }
}

impl From<&IdToken> for Token {
    fn from(value: &IdToken) -> Self {
        value.token()
    }
}
