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
use crate::token::Token;
use base64::Engine;
use serde::Deserialize;
use time::OffsetDateTime;

/// Token Exchange grant type for a sts exchange.
pub const TOKEN_EXCHANGE_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:token-exchange";
/// Access Token OAuth Token Type
pub const ACCESS_TOKEN_TYPE: &str = "urn:ietf:params:oauth:token-type:access_token";
/// JWT OAuth Token Type
pub const JWT_TOKEN_TYPE: &str = "urn:ietf:params:oauth:token-type:jwt";
/// OIDC ID Token OAuth Token Type
pub const ID_TOKEN_TYPE: &str = "urn:ietf:params:oauth:token-type:id_token";
/// SAML2 Token OAuth Token Type
pub const SAML2_TOKEN_TYPE: &str = "urn:ietf:params:oauth:token-type:saml2";
/// Token type for serialized AWS `GetCallerIdentity` requests.
pub const AWS4_REQUEST_TOKEN_TYPE: &str = "urn:ietf:params:aws:token-type:aws4_request";

/// A token representing the acting party in a delegation scenario.
///
/// See [RFC 8693 section 1.1](https://datatracker.ietf.org/doc/html/rfc8693#section-1.1).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActingParty {
    actor_token: String,
    actor_token_type: String,
}

impl ActingParty {
    pub fn new<T, U>(actor_token: T, actor_token_type: U) -> Self
    where
        T: Into<String>,
        U: Into<String>,
    {
        Self {
            actor_token: actor_token.into(),
            actor_token_type: actor_token_type.into(),
        }
    }

    pub fn actor_token(&self) -> &str {
        &self.actor_token
    }

    pub fn actor_token_type(&self) -> &str {
        &self.actor_token_type
    }
}

/// An OAuth 2.0 Token Exchange request.
///
/// The optional fields are reported as present only when they hold a
/// non-empty value. A field explicitly set to `""` (or an empty list of
/// scopes) is omitted from the request, exactly like an unset field.
///
/// # Example
/// ```
/// # use google_cloud_auth_federation::sts_exchange::*;
/// let request = ExchangeTokenRequest::builder()
///     .with_subject_token("a-subject-token")
///     .with_subject_token_type(JWT_TOKEN_TYPE)
///     .with_audience("//iam.googleapis.com/projects/123/locations/global/workloadIdentityPools/p/providers/q")
///     .with_scopes(["https://www.googleapis.com/auth/cloud-platform"])
///     .build()?;
/// assert!(request.has_audience());
/// assert!(!request.has_resource());
/// # Ok::<(), google_cloud_auth_federation::errors::Error>(())
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct ExchangeTokenRequest {
    subject_token: String,
    subject_token_type: String,
    acting_party: Option<ActingParty>,
    scopes: Option<Vec<String>>,
    resource: Option<String>,
    audience: Option<String>,
    requested_token_type: Option<String>,
    internal_options: Option<String>,
}

impl ExchangeTokenRequest {
    /// Returns a builder without any fields set.
    pub fn builder() -> Builder {
        Builder::default()
    }

    /// Always [TOKEN_EXCHANGE_GRANT_TYPE].
    pub fn grant_type(&self) -> &str {
        TOKEN_EXCHANGE_GRANT_TYPE
    }

    pub fn subject_token(&self) -> &str {
        &self.subject_token
    }

    pub fn subject_token_type(&self) -> &str {
        &self.subject_token_type
    }

    pub fn acting_party(&self) -> Option<&ActingParty> {
        self.acting_party.as_ref()
    }

    pub fn scopes(&self) -> Option<&[String]> {
        self.scopes.as_deref()
    }

    pub fn resource(&self) -> Option<&str> {
        self.resource.as_deref()
    }

    pub fn audience(&self) -> Option<&str> {
        self.audience.as_deref()
    }

    pub fn requested_token_type(&self) -> Option<&str> {
        self.requested_token_type.as_deref()
    }

    /// Google-specific extensions, serialized as a JSON object.
    pub fn internal_options(&self) -> Option<&str> {
        self.internal_options.as_deref()
    }

    pub fn has_acting_party(&self) -> bool {
        self.acting_party
            .as_ref()
            .is_some_and(|p| !p.actor_token.is_empty())
    }

    pub fn has_scopes(&self) -> bool {
        self.scopes.as_ref().is_some_and(|s| !s.is_empty())
    }

    pub fn has_resource(&self) -> bool {
        is_present(&self.resource)
    }

    pub fn has_audience(&self) -> bool {
        is_present(&self.audience)
    }

    pub fn has_requested_token_type(&self) -> bool {
        is_present(&self.requested_token_type)
    }

    pub fn has_internal_options(&self) -> bool {
        is_present(&self.internal_options)
    }

    /// The form parameters sent to the Security Token Service.
    ///
    /// Optional parameters are included only when their `has_*` predicate
    /// holds. Scopes are joined with spaces.
    pub fn form_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("grant_type", TOKEN_EXCHANGE_GRANT_TYPE.to_string()),
            ("subject_token", self.subject_token.clone()),
            ("subject_token_type", self.subject_token_type.clone()),
        ];
        if let Some(party) = self.acting_party.as_ref().filter(|_| self.has_acting_party()) {
            params.push(("actor_token", party.actor_token.clone()));
            params.push(("actor_token_type", party.actor_token_type.clone()));
        }
        if let Some(scopes) = self.scopes.as_ref().filter(|_| self.has_scopes()) {
            params.push(("scope", scopes.join(" ")));
        }
        let optional = [
            ("resource", &self.resource),
            ("audience", &self.audience),
            ("requested_token_type", &self.requested_token_type),
            ("options", &self.internal_options),
        ];
        for (name, value) in optional {
            if let Some(value) = value.as_ref().filter(|v| !v.is_empty()) {
                params.push((name, value.clone()));
            }
        }
        params
    }
}

impl std::fmt::Debug for ExchangeTokenRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeTokenRequest")
            .field("subject_token", &"[censored]")
            .field("subject_token_type", &self.subject_token_type)
            .field(
                "acting_party",
                &self
                    .acting_party
                    .as_ref()
                    .map(|p| ("[censored]", &p.actor_token_type)),
            )
            .field("scopes", &self.scopes)
            .field("resource", &self.resource)
            .field("audience", &self.audience)
            .field("requested_token_type", &self.requested_token_type)
            .field("internal_options", &self.internal_options)
            .finish()
    }
}

fn is_present(value: &Option<String>) -> bool {
    value.as_ref().is_some_and(|v| !v.is_empty())
}

/// A builder for [ExchangeTokenRequest].
///
/// The subject token and its type are required, [build][Builder::build]
/// fails if either is missing. No other validation is performed.
#[derive(Clone, Debug, Default)]
pub struct Builder {
    subject_token: Option<String>,
    subject_token_type: Option<String>,
    acting_party: Option<ActingParty>,
    scopes: Option<Vec<String>>,
    resource: Option<String>,
    audience: Option<String>,
    requested_token_type: Option<String>,
    internal_options: Option<String>,
}

impl Builder {
    /// Creates a builder with the required fields set.
    pub fn new<T, U>(subject_token: T, subject_token_type: U) -> Self
    where
        T: Into<String>,
        U: Into<String>,
    {
        Self::default()
            .with_subject_token(subject_token)
            .with_subject_token_type(subject_token_type)
    }

    pub fn with_subject_token<T: Into<String>>(mut self, v: T) -> Self {
        self.subject_token = Some(v.into());
        self
    }

    pub fn with_subject_token_type<T: Into<String>>(mut self, v: T) -> Self {
        self.subject_token_type = Some(v.into());
        self
    }

    pub fn with_acting_party(mut self, v: ActingParty) -> Self {
        self.acting_party = Some(v);
        self
    }

    /// Sets the scopes. The order is preserved.
    pub fn with_scopes<I, S>(mut self, v: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = Some(v.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_resource<T: Into<String>>(mut self, v: T) -> Self {
        self.resource = Some(v.into());
        self
    }

    pub fn with_audience<T: Into<String>>(mut self, v: T) -> Self {
        self.audience = Some(v.into());
        self
    }

    pub fn with_requested_token_type<T: Into<String>>(mut self, v: T) -> Self {
        self.requested_token_type = Some(v.into());
        self
    }

    pub fn with_internal_options<T: Into<String>>(mut self, v: T) -> Self {
        self.internal_options = Some(v.into());
        self
    }

    pub fn build(self) -> Result<ExchangeTokenRequest> {
        Ok(ExchangeTokenRequest {
            subject_token: self
                .subject_token
                .ok_or_else(|| Error::missing_field("subject_token"))?,
            subject_token_type: self
                .subject_token_type
                .ok_or_else(|| Error::missing_field("subject_token_type"))?,
            acting_party: self.acting_party,
            scopes: self.scopes,
            resource: self.resource,
            audience: self.audience,
            requested_token_type: self.requested_token_type,
            internal_options: self.internal_options,
        })
    }
}

/// Authentication style via headers or form params.
/// See https://datatracker.ietf.org/doc/html/rfc6749#section-2.3.1.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ClientAuthStyle {
    #[default]
    InParams,
    InHeader,
}

/// ClientAuthentication represents an OAuth client ID and secret and the
/// mechanism for passing these credentials as stated
/// in https://datatracker.ietf.org/doc/html/rfc6749#section-2.3.1.
#[derive(Clone, Default)]
pub struct ClientAuthentication {
    auth_style: ClientAuthStyle,
    client_id: Option<String>,
    client_secret: Option<String>,
}

impl std::fmt::Debug for ClientAuthentication {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientAuthentication")
            .field("auth_style", &self.auth_style)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "[censored]"))
            .finish()
    }
}

impl ClientAuthentication {
    pub fn new<T, U>(auth_style: ClientAuthStyle, client_id: T, client_secret: U) -> Self
    where
        T: Into<String>,
        U: Into<String>,
    {
        Self {
            auth_style,
            client_id: Some(client_id.into()),
            client_secret: Some(client_secret.into()),
        }
    }

    // Add authentication to a Secure Token Service exchange request.
    // Modifies either the passed headers or form parameters
    // depending on the desired authentication format.
    fn inject_auth(&self, headers: &mut http::HeaderMap, params: &mut Vec<(&str, String)>) {
        let (Some(client_id), Some(client_secret)) = (&self.client_id, &self.client_secret)
        else {
            return;
        };
        match self.auth_style {
            ClientAuthStyle::InHeader => {
                let plain = format!("{client_id}:{client_secret}");
                let encoded = base64::engine::general_purpose::STANDARD.encode(plain);
                if let Ok(mut value) = http::HeaderValue::from_str(&format!("Basic {encoded}")) {
                    value.set_sensitive(true);
                    headers.insert(http::header::AUTHORIZATION, value);
                }
            }
            ClientAuthStyle::InParams => {
                params.push(("client_id", client_id.clone()));
                params.push(("client_secret", client_secret.clone()));
            }
        }
    }
}

/// TokenResponse is used to decode the remote server response during
/// an oauth2 token exchange.
///
/// See [RFC 8693 section 2.2.1](https://datatracker.ietf.org/doc/html/rfc8693#section-2.2.1).
#[derive(Clone, Deserialize, Default, PartialEq, Eq)]
pub struct TokenResponse {
    pub access_token: String,
    pub issued_token_type: String,
    pub token_type: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl std::fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"[censored]")
            .field("issued_token_type", &self.issued_token_type)
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("scope", &self.scope)
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[censored]"))
            .finish()
    }
}

impl TokenResponse {
    /// Converts the response into a [Token], with the expiration relative to
    /// `now`.
    ///
    /// Fails with a format error if `expires_in` puts the expiration outside
    /// the range of [OffsetDateTime].
    pub fn into_token(self, now: OffsetDateTime) -> Result<Token> {
        let expires_at = match self.expires_in {
            None => None,
            Some(secs) => Some(
                i64::try_from(secs)
                    .ok()
                    .and_then(|secs| now.checked_add(time::Duration::seconds(secs)))
                    .ok_or_else(|| {
                        Error::format(format!("expires_in={secs} is out of range"))
                    })?,
            ),
        };
        Ok(Token {
            token: self.access_token,
            token_type: self.token_type,
            expires_at,
            metadata: None,
        })
    }
}

/// Sends token exchange requests to a Security Token Service.
///
/// The handler performs exactly one HTTP request per call, it does not retry.
#[derive(Clone, Debug, Default)]
pub struct StsHandler {
    client: reqwest::Client,
}

impl StsHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `client` for all requests.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Performs an oauth2 token exchange against `token_url`.
    pub async fn exchange_token(
        &self,
        token_url: &str,
        request: &ExchangeTokenRequest,
        client_auth: &ClientAuthentication,
        headers: http::HeaderMap,
    ) -> Result<TokenResponse> {
        let mut headers = headers;
        let mut params = request.form_params();
        client_auth.inject_auth(&mut headers, &mut params);

        tracing::debug!(
            token_url,
            subject_token_type = request.subject_token_type(),
            "sending token exchange request"
        );
        let response = self
            .client
            .post(token_url)
            .headers(headers)
            .form(&params)
            .send()
            .await
            .map_err(Error::io)?;

        let status = response.status();
        tracing::debug!(token_url, %status, "received token exchange response");
        if !status.is_success() {
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => format!("<failed to read body: {e}>"),
            };
            return Err(Error::exchange(status, body));
        }
        let body = response.bytes().await.map_err(Error::io)?;
        serde_json::from_slice::<TokenResponse>(&body).map_err(Error::format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httptest::{Expectation, Server, matchers::*, responders::*};
    use std::time::Duration;
    use test_case::test_case;

    type TestResult = anyhow::Result<()>;

    const RESPONSE_BODY: &str = r#"{"access_token":"an_example_token","issued_token_type":"urn:ietf:params:oauth:token-type:access_token","token_type":"Bearer","expires_in":3600,"scope":"https://www.googleapis.com/auth/cloud-platform"}"#;

    fn minimal() -> ExchangeTokenRequest {
        Builder::new("an_example_token", JWT_TOKEN_TYPE)
            .build()
            .expect("required fields are set")
    }

    #[test]
    fn defaults() {
        let request = minimal();
        assert_eq!(request.grant_type(), TOKEN_EXCHANGE_GRANT_TYPE);
        assert_eq!(request.subject_token(), "an_example_token");
        assert_eq!(request.subject_token_type(), JWT_TOKEN_TYPE);
        assert!(!request.has_acting_party(), "{request:?}");
        assert!(!request.has_scopes(), "{request:?}");
        assert!(!request.has_resource(), "{request:?}");
        assert!(!request.has_audience(), "{request:?}");
        assert!(!request.has_requested_token_type(), "{request:?}");
        assert!(!request.has_internal_options(), "{request:?}");
        assert!(request.scopes().is_none(), "{request:?}");
        assert!(request.acting_party().is_none(), "{request:?}");
    }

    #[test]
    fn full() -> TestResult {
        let request = ExchangeTokenRequest::builder()
            .with_subject_token("subject")
            .with_subject_token_type(ID_TOKEN_TYPE)
            .with_acting_party(ActingParty::new("actor", ACCESS_TOKEN_TYPE))
            .with_scopes(["scope1", "scope2"])
            .with_resource("https://resource.example.com")
            .with_audience("test-audience")
            .with_requested_token_type(ACCESS_TOKEN_TYPE)
            .with_internal_options(r#"{"userProject":"p"}"#)
            .build()?;
        assert!(request.has_acting_party(), "{request:?}");
        assert!(request.has_scopes(), "{request:?}");
        assert!(request.has_resource(), "{request:?}");
        assert!(request.has_audience(), "{request:?}");
        assert!(request.has_requested_token_type(), "{request:?}");
        assert!(request.has_internal_options(), "{request:?}");

        assert_eq!(
            request.acting_party(),
            Some(&ActingParty::new("actor", ACCESS_TOKEN_TYPE))
        );
        assert_eq!(
            request.scopes(),
            Some(["scope1".to_string(), "scope2".to_string()].as_slice())
        );
        assert_eq!(request.resource(), Some("https://resource.example.com"));
        assert_eq!(request.audience(), Some("test-audience"));
        assert_eq!(request.requested_token_type(), Some(ACCESS_TOKEN_TYPE));
        assert_eq!(request.internal_options(), Some(r#"{"userProject":"p"}"#));
        Ok(())
    }

    #[test]
    fn empty_values_are_absent() -> TestResult {
        let request = Builder::new("subject", JWT_TOKEN_TYPE)
            .with_acting_party(ActingParty::new("", ACCESS_TOKEN_TYPE))
            .with_scopes(Vec::<String>::new())
            .with_resource("")
            .with_audience("")
            .with_requested_token_type("")
            .with_internal_options("")
            .build()?;
        assert!(!request.has_acting_party(), "{request:?}");
        assert!(!request.has_scopes(), "{request:?}");
        assert!(!request.has_resource(), "{request:?}");
        assert!(!request.has_audience(), "{request:?}");
        assert!(!request.has_requested_token_type(), "{request:?}");
        assert!(!request.has_internal_options(), "{request:?}");
        // The values are still recorded, only the predicates report them absent.
        assert_eq!(request.resource(), Some(""));

        assert_eq!(request.form_params(), minimal_params("subject"));
        Ok(())
    }

    fn minimal_params(subject: &str) -> Vec<(&'static str, String)> {
        vec![
            ("grant_type", TOKEN_EXCHANGE_GRANT_TYPE.to_string()),
            ("subject_token", subject.to_string()),
            ("subject_token_type", JWT_TOKEN_TYPE.to_string()),
        ]
    }

    #[test_case(Builder::default(), "subject_token")]
    #[test_case(Builder::default().with_subject_token("s"), "subject_token_type")]
    #[test_case(Builder::default().with_subject_token_type(JWT_TOKEN_TYPE), "subject_token")]
    fn missing_required(builder: Builder, field: &str) {
        let err = builder.build().unwrap_err();
        assert!(err.is_missing_field(), "{err:?}");
        assert!(err.to_string().contains(field), "{err}");
    }

    #[test]
    fn form_params_minimal() {
        assert_eq!(minimal().form_params(), minimal_params("an_example_token"));
    }

    #[test]
    fn form_params_full() -> TestResult {
        let request = Builder::new("subject", JWT_TOKEN_TYPE)
            .with_acting_party(ActingParty::new("actor", ACCESS_TOKEN_TYPE))
            .with_scopes(["scope1", "scope2"])
            .with_resource("test-resource")
            .with_audience("test-audience")
            .with_requested_token_type(ACCESS_TOKEN_TYPE)
            .with_internal_options(r#"{"userProject":"p"}"#)
            .build()?;
        let mut want = minimal_params("subject");
        want.extend([
            ("actor_token", "actor".to_string()),
            ("actor_token_type", ACCESS_TOKEN_TYPE.to_string()),
            ("scope", "scope1 scope2".to_string()),
            ("resource", "test-resource".to_string()),
            ("audience", "test-audience".to_string()),
            ("requested_token_type", ACCESS_TOKEN_TYPE.to_string()),
            ("options", r#"{"userProject":"p"}"#.to_string()),
        ]);
        assert_eq!(request.form_params(), want);
        Ok(())
    }

    #[test]
    fn debug_censors_tokens() -> TestResult {
        let request = Builder::new("test-only-subject", JWT_TOKEN_TYPE)
            .with_acting_party(ActingParty::new("test-only-actor", ACCESS_TOKEN_TYPE))
            .build()?;
        let got = format!("{request:?}");
        assert!(!got.contains("test-only-subject"), "{got}");
        assert!(!got.contains("test-only-actor"), "{got}");
        assert!(got.contains(JWT_TOKEN_TYPE), "{got}");

        let auth = ClientAuthentication::new(ClientAuthStyle::InHeader, "id", "test-only-secret");
        let got = format!("{auth:?}");
        assert!(!got.contains("test-only-secret"), "{got}");
        Ok(())
    }

    #[test]
    fn token_response_into_token() -> TestResult {
        let response: TokenResponse = serde_json::from_str(RESPONSE_BODY)?;
        let now = OffsetDateTime::now_utc();
        let token = response.into_token(now)?;
        assert_eq!(token.token, "an_example_token");
        assert_eq!(token.token_type, "Bearer");
        assert_eq!(token.expires_at, Some(now + Duration::from_secs(3600)));

        let response: TokenResponse = serde_json::from_str(
            r#"{"access_token":"a","issued_token_type":"b","token_type":"Bearer"}"#,
        )?;
        assert!(response.into_token(now)?.expires_at.is_none());
        Ok(())
    }

    #[test_case(u64::MAX; "u64 max")]
    #[test_case(i64::MAX as u64; "i64 max")]
    #[test_case(400_000_000_000; "past year 9999")]
    fn token_response_expires_in_out_of_range(expires_in: u64) -> TestResult {
        let body = format!(
            r#"{{"access_token":"a","issued_token_type":"b","token_type":"Bearer","expires_in":{expires_in}}}"#
        );
        let response: TokenResponse = serde_json::from_str(&body)?;
        let err = response.into_token(OffsetDateTime::now_utc()).unwrap_err();
        assert!(err.is_format(), "{err:?}");
        assert!(err.to_string().contains(&expires_in.to_string()), "{err}");
        Ok(())
    }

    #[tokio::test]
    async fn exchange_token() -> TestResult {
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("POST", "/sts"),
                request::body(url_decoded(contains((
                    "grant_type",
                    TOKEN_EXCHANGE_GRANT_TYPE
                )))),
                request::body(url_decoded(contains(("subject_token", "an_example_token")))),
                request::body(url_decoded(contains((
                    "requested_token_type",
                    ACCESS_TOKEN_TYPE
                )))),
                request::body(url_decoded(contains((
                    "subject_token_type",
                    JWT_TOKEN_TYPE
                )))),
                request::body(url_decoded(contains((
                    "audience",
                    "32555940559.apps.googleusercontent.com"
                )))),
                request::body(url_decoded(contains((
                    "scope",
                    "https://www.googleapis.com/auth/cloud-platform"
                )))),
                request::body(url_decoded(not(contains(key("resource"))))),
                request::headers(contains((
                    "authorization",
                    "Basic Y2xpZW50X2lkOnN1cGVyc2VjcmV0"
                ))),
                request::headers(contains((
                    "content-type",
                    "application/x-www-form-urlencoded"
                ))),
            ])
            .respond_with(status_code(200).body(RESPONSE_BODY)),
        );

        let request = Builder::new("an_example_token", JWT_TOKEN_TYPE)
            .with_audience("32555940559.apps.googleusercontent.com")
            .with_scopes(["https://www.googleapis.com/auth/cloud-platform"])
            .with_requested_token_type(ACCESS_TOKEN_TYPE)
            .with_resource("")
            .build()?;
        let client_auth = ClientAuthentication::new(ClientAuthStyle::InHeader, "client_id", "supersecret");
        let handler = StsHandler::new();
        let url = server.url("/sts").to_string();
        let resp = handler
            .exchange_token(&url, &request, &client_auth, http::HeaderMap::new())
            .await?;

        assert_eq!(
            resp,
            TokenResponse {
                access_token: "an_example_token".to_string(),
                refresh_token: None,
                issued_token_type: ACCESS_TOKEN_TYPE.to_string(),
                token_type: "Bearer".to_string(),
                expires_in: Some(3600),
                scope: Some("https://www.googleapis.com/auth/cloud-platform".to_string()),
            }
        );
        Ok(())
    }

    #[tokio::test]
    async fn exchange_token_auth_in_params() -> TestResult {
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("POST", "/sts"),
                request::body(url_decoded(contains(("client_id", "client_id")))),
                request::body(url_decoded(contains(("client_secret", "supersecret")))),
                request::headers(not(contains(key("authorization")))),
            ])
            .respond_with(status_code(200).body(RESPONSE_BODY)),
        );

        let client_auth = ClientAuthentication::new(ClientAuthStyle::InParams, "client_id", "supersecret");
        let url = server.url("/sts").to_string();
        let resp = StsHandler::new()
            .exchange_token(&url, &minimal(), &client_auth, http::HeaderMap::new())
            .await?;
        assert_eq!(resp.access_token, "an_example_token");
        Ok(())
    }

    #[tokio::test]
    async fn exchange_token_err() -> TestResult {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("POST", "/fail"))
                .respond_with(status_code(400).body(r#"{"error":"bad request"}"#)),
        );

        let url = server.url("/fail").to_string();
        let err = StsHandler::new()
            .exchange_token(
                &url,
                &minimal(),
                &ClientAuthentication::default(),
                http::HeaderMap::new(),
            )
            .await
            .unwrap_err();
        assert!(err.is_exchange(), "{err:?}");
        assert!(!err.is_retryable(), "{err:?}");
        assert_eq!(err.http_status_code(), Some(http::StatusCode::BAD_REQUEST));
        assert!(err.to_string().contains("bad request"), "{err}");
        Ok(())
    }

    #[tokio::test]
    async fn exchange_token_retryable_err() -> TestResult {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("POST", "/sts"))
                .respond_with(status_code(503)),
        );

        let url = server.url("/sts").to_string();
        let err = StsHandler::new()
            .exchange_token(
                &url,
                &minimal(),
                &ClientAuthentication::default(),
                http::HeaderMap::new(),
            )
            .await
            .unwrap_err();
        assert!(err.is_retryable(), "{err:?}");
        Ok(())
    }

    #[tokio::test]
    async fn exchange_token_bad_body() -> TestResult {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("POST", "/sts"))
                .respond_with(status_code(200).body("not json")),
        );

        let url = server.url("/sts").to_string();
        let err = StsHandler::new()
            .exchange_token(
                &url,
                &minimal(),
                &ClientAuthentication::default(),
                http::HeaderMap::new(),
            )
            .await
            .unwrap_err();
        assert!(err.is_format(), "{err:?}");
        Ok(())
    }

    #[tokio::test]
    async fn exchange_token_err_truncated_body() -> TestResult {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let url = format!("http://{}/sts", listener.local_addr()?);
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept connection");
            // Consume the request head and body before answering.
            let mut request = Vec::new();
            let mut buf = [0_u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.expect("read request");
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request);
                if let Some((head, body)) = text.split_once("\r\n\r\n") {
                    let length = head
                        .lines()
                        .find_map(|l| {
                            let (name, value) = l.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if body.len() >= length {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            // Promise more bytes than are sent, then close the connection.
            socket
                .write_all(b"HTTP/1.1 500 Internal Server Error\r\ncontent-length: 100\r\n\r\npartial")
                .await
                .expect("write response");
        });

        let err = StsHandler::new()
            .exchange_token(
                &url,
                &minimal(),
                &ClientAuthentication::default(),
                http::HeaderMap::new(),
            )
            .await
            .unwrap_err();
        assert!(err.is_exchange(), "{err:?}");
        assert_eq!(
            err.http_status_code(),
            Some(http::StatusCode::INTERNAL_SERVER_ERROR)
        );
        assert!(err.to_string().contains("failed to read body"), "{err}");
        Ok(())
    }
}
