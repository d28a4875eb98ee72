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

//! Cloud Shell runs a credential broker on a local TCP port, advertised in
//! the `DEVSHELL_CLIENT_PORT` environment variable.
//!
//! The protocol is line oriented. The client sends a length-prefixed empty
//! JSON array (`2\n[]\n`). The broker answers with a length line followed by
//! a JSON array, the element at index 2 is the access token. The broker does
//! not report an expiration time.
//!
//! Each exchange uses a fresh connection, and every I/O step (connect, write,
//! read) is bounded by a 5 second timeout. Responses larger than 64 KiB are
//! rejected.
//!
//! # Example
//! ```no_run
//! # use google_cloud_auth_federation::cloud_shell::Builder;
//! # use google_cloud_auth_federation::token::TokenProvider;
//! # tokio_test::block_on(async {
//! let credentials = Builder::from_env()?.build();
//! let token = credentials.token().await?;
//! println!("token type: {}", token.token_type);
//! # Ok::<(), google_cloud_auth_federation::errors::Error>(())
//! # });
//! ```

use crate::Result;
use crate::constants::{
    CLOUD_SHELL_ACCESS_TOKEN_INDEX, CLOUD_SHELL_AUTH_TOKEN_REQUEST,
    CLOUD_SHELL_MAX_RESPONSE_BYTES, CLOUD_SHELL_READ_TIMEOUT, DEVSHELL_CLIENT_PORT_VAR,
};
use crate::errors::Error;
use crate::token::{Token, TokenProvider};
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

const BROKER_HOST: &str = "localhost";

/// A [TokenProvider] backed by the Cloud Shell credential broker.
#[derive(Clone, Debug)]
pub struct CloudShellCredentials {
    port: u16,
    timeout: Duration,
}

impl CloudShellCredentials {
    pub fn port(&self) -> u16 {
        self.port
    }

    async fn fetch(&self) -> Result<Token> {
        tracing::debug!(port = self.port, "requesting token from Cloud Shell broker");
        let stream = self
            .step(TcpStream::connect((BROKER_HOST, self.port)))
            .await?;
        let mut reader = BufReader::new(stream);
        self.step(reader.get_mut().write_all(CLOUD_SHELL_AUTH_TOKEN_REQUEST))
            .await?;

        // The length line is informational, the body is delimited by the JSON
        // value itself.
        let mut length = String::new();
        if self.step(reader.read_line(&mut length)).await? == 0 {
            return Err(Error::protocol(
                "the Cloud Shell broker closed the connection before responding",
            ));
        }

        let mut body = Vec::new();
        let response = loop {
            let n = self.step(reader.read_buf(&mut body)).await?;
            if body.len() > CLOUD_SHELL_MAX_RESPONSE_BYTES {
                return Err(Error::protocol(format!(
                    "the Cloud Shell broker response exceeds {CLOUD_SHELL_MAX_RESPONSE_BYTES} bytes"
                )));
            }
            match serde_json::from_slice::<Value>(&body) {
                Ok(v) => break v,
                Err(e) if e.is_eof() && n != 0 => continue,
                Err(e) => return Err(Error::format(e)),
            }
        };
        // Dropping `reader` closes the connection on all paths.
        drop(reader);

        let Value::Array(mut fields) = response else {
            return Err(Error::protocol(
                "the Cloud Shell broker response is not a JSON array",
            ));
        };
        if fields.len() <= CLOUD_SHELL_ACCESS_TOKEN_INDEX {
            return Err(Error::protocol(format!(
                "the Cloud Shell broker response has {} elements, expected at least {}",
                fields.len(),
                CLOUD_SHELL_ACCESS_TOKEN_INDEX + 1
            )));
        }
        let token = match fields.swap_remove(CLOUD_SHELL_ACCESS_TOKEN_INDEX) {
            Value::String(s) => s,
            other => other.to_string(),
        };
        tracing::debug!(port = self.port, "received token from Cloud Shell broker");
        Ok(Token::bearer(token))
    }

    async fn step<F, T>(&self, io: F) -> Result<T>
    where
        F: Future<Output = std::io::Result<T>>,
    {
        tokio::time::timeout(self.timeout, io)
            .await
            .map_err(Error::io)?
            .map_err(Error::io)
    }
}

#[async_trait::async_trait]
impl TokenProvider for CloudShellCredentials {
    async fn token(&self) -> Result<Token> {
        self.fetch().await
    }
}

/// A builder for [CloudShellCredentials].
#[derive(Clone, Debug)]
pub struct Builder {
    port: u16,
}

impl Builder {
    /// Creates a builder for a broker listening on `port`.
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    /// Creates a builder using the port in `DEVSHELL_CLIENT_PORT`.
    ///
    /// Returns a configuration error if the variable is unset, or if it does
    /// not contain a port number.
    pub fn from_env() -> Result<Self> {
        let value = std::env::var(DEVSHELL_CLIENT_PORT_VAR).map_err(|e| {
            Error::configuration(format!("cannot read {DEVSHELL_CLIENT_PORT_VAR}: {e}"))
        })?;
        let port = value.trim().parse::<u16>().map_err(|e| {
            Error::configuration(format!(
                "{DEVSHELL_CLIENT_PORT_VAR}={value:?} is not a valid port: {e}"
            ))
        })?;
        Ok(Self::new(port))
    }

    pub fn build(self) -> CloudShellCredentials {
        CloudShellCredentials {
            port: self.port,
            timeout: CLOUD_SHELL_READ_TIMEOUT,
        }
    }
}
