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

//! Signers for self-signed JWTs.
//!
//! This crate does not compute signatures. Applications provide an
//! implementation of [SigningProvider] backed by their key material, a KMS,
//! or the IAM `signBlob` API.

use crate::Result;
use std::sync::Arc;

/// Computes signatures for JWTs.
#[async_trait::async_trait]
pub trait SigningProvider: Send + Sync + std::fmt::Debug {
    /// The JWS algorithm name, e.g. `RS256`.
    fn algorithm(&self) -> String;

    /// The identifier of the signing key, used as the `kid` header.
    fn key_id(&self) -> Option<String>;

    /// Signs `content` and returns the raw signature bytes.
    async fn sign(&self, content: &[u8]) -> Result<Vec<u8>>;
}

/// A type-erased [SigningProvider].
#[derive(Clone, Debug)]
pub struct Signer {
    inner: Arc<dyn SigningProvider>,
}

impl<T> std::convert::From<T> for Signer
where
    T: SigningProvider + 'static,
{
    fn from(value: T) -> Self {
        Self {
            inner: Arc::new(value),
        }
    }
}

impl Signer {
    pub fn algorithm(&self) -> String {
        self.inner.algorithm()
    }

    pub fn key_id(&self) -> Option<String> {
        self.inner.key_id()
    }

    pub async fn sign(&self, content: &[u8]) -> Result<Vec<u8>> {
        self.inner.sign(content).await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    // Used by tests in other modules.
    mockall::mock! {
        #[derive(Debug)]
        pub SigningProvider { }

        #[async_trait::async_trait]
        impl SigningProvider for SigningProvider {
            fn algorithm(&self) -> String;
            fn key_id(&self) -> Option<String>;
            async fn sign(&self, content: &[u8]) -> Result<Vec<u8>>;
        }
    }

    #[tokio::test]
    async fn signer_forwards() -> anyhow::Result<()> {
        let mut mock = MockSigningProvider::new();
        mock.expect_algorithm().return_const("RS256".to_string());
        mock.expect_key_id().return_const(Some("test-kid".to_string()));
        mock.expect_sign()
            .withf(|content| content == b"test-content")
            .times(1)
            .returning(|_| Ok(b"test-signature".to_vec()));

        let signer = Signer::from(mock);
        assert_eq!(signer.algorithm(), "RS256");
        assert_eq!(signer.key_id().as_deref(), Some("test-kid"));
        assert_eq!(signer.sign(b"test-content").await?, b"test-signature");
        Ok(())
    }
}
