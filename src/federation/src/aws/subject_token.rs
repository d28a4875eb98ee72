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

use super::credentials::{AwsSecurityCredentials, AwsSecurityCredentialsSource, SupplierContext};
use super::dates::AwsDates;
use crate::Result;
use crate::constants::{
    AWS_AUTHORIZATION_HEADER, AWS_DATE_HEADER, AWS_HOST_HEADER, AWS_SECURITY_TOKEN_HEADER,
    GOOGLE_TARGET_RESOURCE_HEADER,
};
use crate::errors::Error;
use serde::Serialize;
use std::collections::BTreeMap;

const GET_CALLER_IDENTITY_METHOD: &str = "POST";
const GET_CALLER_IDENTITY_QUERY: &str = "Action=GetCallerIdentity&Version=2011-06-15";

/// An unsigned AWS `GetCallerIdentity` request.
///
/// The request carries everything an AWS Signature Version 4 signer needs:
/// the region, the credentials, the timestamp, and the headers to sign. Once
/// the caller computes the `Authorization` header value,
/// [into_subject_token][AwsRequest::into_subject_token] produces the subject
/// token expected by the Security Token Service.
///
/// See [AIP-4117] for the subject token format.
///
/// [AIP-4117]: https://google.aip.dev/auth/4117#determining-the-subject-token-in-aws
#[derive(Clone, Debug)]
pub struct AwsRequest {
    url: String,
    region: String,
    date: AwsDates,
    credentials: AwsSecurityCredentials,
    headers: BTreeMap<String, String>,
}

impl AwsRequest {
    /// Creates the `GetCallerIdentity` request for `region`.
    ///
    /// `target_resource` is the audience of the token exchange, it is bound
    /// into the signature through the `x-goog-cloud-target-resource` header.
    pub fn get_caller_identity<R, T>(
        region: R,
        credentials: AwsSecurityCredentials,
        date: AwsDates,
        target_resource: T,
    ) -> Self
    where
        R: Into<String>,
        T: Into<String>,
    {
        let region = region.into();
        let host = format!("sts.{region}.amazonaws.com");
        let mut headers = BTreeMap::from([
            (AWS_HOST_HEADER.to_string(), host.clone()),
            (AWS_DATE_HEADER.to_string(), date.x_amz_date().to_string()),
            (
                GOOGLE_TARGET_RESOURCE_HEADER.to_string(),
                target_resource.into(),
            ),
        ]);
        if let Some(token) = credentials.session_token() {
            headers.insert(AWS_SECURITY_TOKEN_HEADER.to_string(), token.to_string());
        }
        Self {
            url: format!("https://{host}?{GET_CALLER_IDENTITY_QUERY}"),
            region,
            date,
            credentials,
            headers,
        }
    }

    /// Fetches the region and credentials from `source` and creates the
    /// `GetCallerIdentity` request.
    ///
    /// The context audience is used as the target resource.
    pub async fn from_source(
        source: &AwsSecurityCredentialsSource,
        context: &SupplierContext,
        date: AwsDates,
    ) -> Result<Self> {
        let region = source.region(context).await?;
        let credentials = source.credentials(context).await?;
        Ok(Self::get_caller_identity(
            region,
            credentials,
            date,
            context.audience(),
        ))
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn method(&self) -> &str {
        GET_CALLER_IDENTITY_METHOD
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn date(&self) -> &AwsDates {
        &self.date
    }

    pub fn credentials(&self) -> &AwsSecurityCredentials {
        &self.credentials
    }

    /// The headers to sign, keyed by their lowercase names.
    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// Serializes the signed request as a subject token.
    ///
    /// `authorization` is the SigV4 `Authorization` header value computed
    /// over this request. The result is URL-encoded JSON.
    pub fn into_subject_token<T: Into<String>>(mut self, authorization: T) -> Result<String> {
        let authorization = authorization.into();
        if authorization.is_empty() {
            return Err(Error::missing_field("authorization"));
        }
        self.headers
            .insert(AWS_AUTHORIZATION_HEADER.to_string(), authorization);
        let token = SubjectToken {
            url: &self.url,
            method: GET_CALLER_IDENTITY_METHOD,
            headers: self
                .headers
                .iter()
                .map(|(key, value)| Header { key, value })
                .collect(),
        };
        let json = serde_json::to_string(&token).map_err(Error::format)?;
        Ok(url::form_urlencoded::byte_serialize(json.as_bytes()).collect())
    }
}

#[derive(Serialize)]
struct SubjectToken<'a> {
    url: &'a str,
    method: &'a str,
    headers: Vec<Header<'a>>,
}

#[derive(Serialize)]
struct Header<'a> {
    key: &'a str,
    value: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::credentials::tests::FakeSupplier;
    use serde_json::{Value, json};

    const AUDIENCE: &str = "//iam.googleapis.com/projects/123/locations/global/workloadIdentityPools/pool/providers/aws";

    fn decode(token: &str) -> anyhow::Result<Value> {
        let decoded: String = url::form_urlencoded::parse(format!("t={token}").as_bytes())
            .map(|(_, v)| v.into_owned())
            .collect();
        Ok(serde_json::from_str(&decoded)?)
    }

    #[test]
    fn headers_without_session_token() -> anyhow::Result<()> {
        let creds = AwsSecurityCredentials::new("test-key-id", "test-secret", None);
        let date = AwsDates::from_x_amz_date("20200811T065522Z")?;
        let request = AwsRequest::get_caller_identity("us-east-2", creds.clone(), date, AUDIENCE);

        assert_eq!(
            request.url(),
            "https://sts.us-east-2.amazonaws.com?Action=GetCallerIdentity&Version=2011-06-15"
        );
        assert_eq!(request.method(), "POST");
        assert_eq!(request.region(), "us-east-2");
        assert_eq!(request.date().formatted_date(), "20200811");
        assert_eq!(request.credentials(), &creds);
        let want = BTreeMap::from(
            [
                ("host", "sts.us-east-2.amazonaws.com"),
                ("x-amz-date", "20200811T065522Z"),
                ("x-goog-cloud-target-resource", AUDIENCE),
            ]
            .map(|(k, v)| (k.to_string(), v.to_string())),
        );
        assert_eq!(request.headers(), &want);
        Ok(())
    }

    #[test]
    fn headers_with_session_token() -> anyhow::Result<()> {
        let creds =
            AwsSecurityCredentials::new("test-key-id", "test-secret", Some("test-session".into()));
        let date = AwsDates::from_x_amz_date("20200811T065522Z")?;
        let request = AwsRequest::get_caller_identity("us-east-2", creds, date, AUDIENCE);
        assert_eq!(
            request.headers().get("x-amz-security-token").map(String::as_str),
            Some("test-session")
        );
        Ok(())
    }

    #[test]
    fn subject_token() -> anyhow::Result<()> {
        let creds =
            AwsSecurityCredentials::new("test-key-id", "test-secret", Some("test-session".into()));
        let date = AwsDates::from_x_amz_date("20200811T065522Z")?;
        let request = AwsRequest::get_caller_identity("us-east-2", creds, date, AUDIENCE);
        let token = request.into_subject_token("AWS4-HMAC-SHA256 Credential=test-only")?;
        assert!(!token.contains('{'), "{token}");
        assert!(!token.contains(' '), "{token}");

        let got = decode(&token)?;
        let want = json!({
            "url": "https://sts.us-east-2.amazonaws.com?Action=GetCallerIdentity&Version=2011-06-15",
            "method": "POST",
            "headers": [
                {"key": "authorization", "value": "AWS4-HMAC-SHA256 Credential=test-only"},
                {"key": "host", "value": "sts.us-east-2.amazonaws.com"},
                {"key": "x-amz-date", "value": "20200811T065522Z"},
                {"key": "x-amz-security-token", "value": "test-session"},
                {"key": "x-goog-cloud-target-resource", "value": AUDIENCE},
            ],
        });
        assert_eq!(got, want);
        Ok(())
    }

    #[test]
    fn subject_token_requires_authorization() -> anyhow::Result<()> {
        let creds = AwsSecurityCredentials::new("test-key-id", "test-secret", None);
        let request =
            AwsRequest::get_caller_identity("us-east-2", creds, AwsDates::now(), AUDIENCE);
        let err = request.into_subject_token("").unwrap_err();
        assert!(err.is_missing_field(), "{err:?}");
        Ok(())
    }

    #[tokio::test]
    async fn from_source() -> anyhow::Result<()> {
        let creds = AwsSecurityCredentials::new("test-key-id", "test-secret", None);
        let source = AwsSecurityCredentialsSource::from(FakeSupplier {
            region: "eu-west-1".into(),
            credentials: Some(creds.clone()),
            ..FakeSupplier::default()
        });
        let context = SupplierContext::new(AUDIENCE, "urn:ietf:params:aws:token-type:aws4_request");
        let date = AwsDates::from_x_amz_date("20200811T065522Z")?;
        let request = AwsRequest::from_source(&source, &context, date).await?;
        assert_eq!(request.region(), "eu-west-1");
        assert_eq!(request.credentials(), &creds);
        assert_eq!(
            request
                .headers()
                .get("x-goog-cloud-target-resource")
                .map(String::as_str),
            Some(AUDIENCE)
        );
        Ok(())
    }

    #[tokio::test]
    async fn from_source_error() {
        let source = AwsSecurityCredentialsSource::from(FakeSupplier {
            region: "eu-west-1".into(),
            ..FakeSupplier::default()
        });
        let context = SupplierContext::new(AUDIENCE, "urn:ietf:params:aws:token-type:aws4_request");
        let err = AwsRequest::from_source(&source, &context, AwsDates::now())
            .await
            .unwrap_err();
        assert!(err.is_io(), "{err:?}");
    }
}
