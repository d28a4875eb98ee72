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
use std::collections::HashMap;
use time::OffsetDateTime;

/// Represents an auth token.
#[derive(Clone, PartialEq)]
pub struct Token {
    /// The actual token string.
    ///
    /// This is the value used in `Authorization:` header.
    pub token: String,

    /// The type of the token.
    ///
    /// The most common type is `"Bearer"` but other types may appear in the
    /// future.
    pub token_type: String,

    /// The point in time at which the token expires.
    ///
    /// If `None`, the expiration is unknown. Callers must not assume the
    /// token is valid forever, some sources (like the Cloud Shell broker)
    /// simply do not report an expiration.
    pub expires_at: Option<OffsetDateTime>,

    /// Optional metadata associated with the token.
    ///
    /// This might include information like granted scopes or other claims.
    pub metadata: Option<HashMap<String, String>>,
}

impl Token {
    /// Creates a `"Bearer"` token without expiration or metadata.
    pub fn bearer<T: Into<String>>(token: T) -> Self {
        Self {
            token: token.into(),
            token_type: "Bearer".to_string(),
            expires_at: None,
            metadata: None,
        }
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("token", &"[censored]")
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .field("metadata", &self.metadata)
            .finish()
    }
}

/// Produces access tokens.
///
/// Implementations do not cache or refresh tokens, each call performs a new
/// request to the underlying source.
#[async_trait::async_trait]
pub trait TokenProvider: std::fmt::Debug + Send + Sync {
    async fn token(&self) -> Result<Token>;
}
