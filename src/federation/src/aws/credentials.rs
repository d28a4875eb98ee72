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
use crate::constants::{
    AWS_ACCESS_KEY_ID_VAR, AWS_DEFAULT_REGION_VAR, AWS_REGION_VAR, AWS_SECRET_ACCESS_KEY_VAR,
    AWS_SESSION_TOKEN_VAR,
};
use crate::errors::Error;
use http::Extensions;
use std::future::Future;
use std::sync::Arc;

/// A snapshot of AWS security credentials.
///
/// The values are used by the caller to sign AWS requests. They are never
/// included in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct AwsSecurityCredentials {
    access_key_id: String,
    secret_access_key: String,
    session_token: Option<String>,
}

impl AwsSecurityCredentials {
    /// Creates a new snapshot.
    ///
    /// # Example
    /// ```
    /// # use google_cloud_auth_federation::aws::credentials::AwsSecurityCredentials;
    /// let credentials = AwsSecurityCredentials::new("AKIDEXAMPLE", "secret", None);
    /// assert!(credentials.session_token().is_none());
    /// ```
    pub fn new<K, S>(access_key_id: K, secret_access_key: S, session_token: Option<String>) -> Self
    where
        K: Into<String>,
        S: Into<String>,
    {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token,
        }
    }

    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    pub fn secret_access_key(&self) -> &str {
        &self.secret_access_key
    }

    /// The session token, only present for temporary credentials.
    pub fn session_token(&self) -> Option<&str> {
        self.session_token.as_deref()
    }
}

impl std::fmt::Debug for AwsSecurityCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsSecurityCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[censored]")
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "[censored]"),
            )
            .finish()
    }
}

/// Information about the credential flow requesting AWS credentials.
///
/// Suppliers may use this to decide which credentials to return. The
/// `extensions` carry any additional values the calling flow wants to make
/// available, such as a shared HTTP client.
#[derive(Clone, Debug, Default)]
pub struct SupplierContext {
    audience: String,
    subject_token_type: String,
    extensions: Extensions,
}

impl SupplierContext {
    pub fn new<A, T>(audience: A, subject_token_type: T) -> Self
    where
        A: Into<String>,
        T: Into<String>,
    {
        Self {
            audience: audience.into(),
            subject_token_type: subject_token_type.into(),
            extensions: Extensions::new(),
        }
    }

    pub fn with_extensions(mut self, extensions: Extensions) -> Self {
        self.extensions = extensions;
        self
    }

    /// The workload identity pool provider the token is requested for.
    pub fn audience(&self) -> &str {
        &self.audience
    }

    pub fn subject_token_type(&self) -> &str {
        &self.subject_token_type
    }

    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }
}

/// A source of AWS regions and AWS security credentials.
///
/// Implement this trait to federate workloads whose AWS credentials are not
/// available through the environment. For example, credentials provided by a
/// sidecar or retrieved with the AWS SDK.
///
/// The methods may be called many times, often once per signed request, and
/// may be called concurrently. Implementations that wrap expensive or
/// rate-limited sources should cache internally.
pub trait AwsSecurityCredentialsSupplier: std::fmt::Debug {
    /// Returns the AWS region, e.g. `us-east-1`.
    fn region(&self, context: &SupplierContext) -> impl Future<Output = Result<String>> + Send;

    /// Returns the AWS security credentials.
    fn credentials(
        &self,
        context: &SupplierContext,
    ) -> impl Future<Output = Result<AwsSecurityCredentials>> + Send;
}

/// A type-erased [AwsSecurityCredentialsSupplier].
///
/// # Example
/// ```
/// # use google_cloud_auth_federation::aws::credentials::*;
/// # tokio_test::block_on(async {
/// let source = AwsSecurityCredentialsSource::from(EnvironmentSupplier);
/// let context = SupplierContext::new("//iam.googleapis.com/my-provider", "urn:ietf:params:aws:token-type:aws4_request");
/// let region = source.region(&context).await;
/// # });
/// ```
#[derive(Clone, Debug)]
pub struct AwsSecurityCredentialsSource {
    inner: Arc<dyn dynamic::AwsSecurityCredentialsSupplier>,
}

impl<T> From<T> for AwsSecurityCredentialsSource
where
    T: AwsSecurityCredentialsSupplier + Send + Sync + 'static,
{
    fn from(value: T) -> Self {
        Self {
            inner: Arc::new(value),
        }
    }
}

impl AwsSecurityCredentialsSource {
    pub async fn region(&self, context: &SupplierContext) -> Result<String> {
        self.inner.region(context).await
    }

    pub async fn credentials(&self, context: &SupplierContext) -> Result<AwsSecurityCredentials> {
        self.inner.credentials(context).await
    }
}

pub(crate) mod dynamic {
    use super::{AwsSecurityCredentials, SupplierContext};
    use crate::Result;

    /// A dyn-compatible, crate-private version of `AwsSecurityCredentialsSupplier`.
    #[async_trait::async_trait]
    pub trait AwsSecurityCredentialsSupplier: Send + Sync + std::fmt::Debug {
        async fn region(&self, context: &SupplierContext) -> Result<String>;
        async fn credentials(&self, context: &SupplierContext) -> Result<AwsSecurityCredentials>;
    }

    /// The public `AwsSecurityCredentialsSupplier` implements the dyn-compatible version.
    #[async_trait::async_trait]
    impl<T> AwsSecurityCredentialsSupplier for T
    where
        T: super::AwsSecurityCredentialsSupplier + Send + Sync,
    {
        async fn region(&self, context: &SupplierContext) -> Result<String> {
            T::region(self, context).await
        }

        async fn credentials(&self, context: &SupplierContext) -> Result<AwsSecurityCredentials> {
            T::credentials(self, context).await
        }
    }
}

/// Reads the region and credentials from the standard AWS environment
/// variables.
///
/// The region is taken from `AWS_REGION`, falling back to
/// `AWS_DEFAULT_REGION`. The credentials require `AWS_ACCESS_KEY_ID` and
/// `AWS_SECRET_ACCESS_KEY`, `AWS_SESSION_TOKEN` is optional. The variables are
/// read on every call.
#[derive(Clone, Copy, Debug, Default)]
pub struct EnvironmentSupplier;

impl AwsSecurityCredentialsSupplier for EnvironmentSupplier {
    async fn region(&self, _context: &SupplierContext) -> Result<String> {
        non_empty_var(AWS_REGION_VAR)
            .or_else(|| non_empty_var(AWS_DEFAULT_REGION_VAR))
            .ok_or_else(|| {
                Error::configuration(format!(
                    "neither {AWS_REGION_VAR} nor {AWS_DEFAULT_REGION_VAR} is set"
                ))
            })
    }

    async fn credentials(&self, _context: &SupplierContext) -> Result<AwsSecurityCredentials> {
        let required = |name: &'static str| {
            non_empty_var(name)
                .ok_or_else(|| Error::configuration(format!("{name} is not set")))
        };
        Ok(AwsSecurityCredentials {
            access_key_id: required(AWS_ACCESS_KEY_ID_VAR)?,
            secret_access_key: required(AWS_SECRET_ACCESS_KEY_VAR)?,
            session_token: non_empty_var(AWS_SESSION_TOKEN_VAR),
        })
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}
