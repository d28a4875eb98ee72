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

//! Errors created while shaping or exchanging federated credentials.

use http::StatusCode;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error type for this crate.
///
/// Every error is scoped to a single request or exchange attempt. None of them
/// is fatal to the process, and the crate never retries on its own. Use
/// [Error::is_retryable] as a hint when implementing a retry loop.
#[derive(thiserror::Error, Debug)]
#[error(transparent)]
pub struct Error(ErrorKind);

impl Error {
    /// A value (timestamp, token, response body) is not in the expected format.
    pub fn is_format(&self) -> bool {
        matches!(self.0, ErrorKind::Format(_))
    }

    /// A required field was missing from a builder.
    pub fn is_missing_field(&self) -> bool {
        matches!(self.0, ErrorKind::MissingField(_))
    }

    /// A problem connecting, reading, or writing. Includes timeouts.
    pub fn is_io(&self) -> bool {
        matches!(self.0, ErrorKind::Io(_))
    }

    /// A credential supplier is not configured correctly.
    pub fn is_configuration(&self) -> bool {
        matches!(self.0, ErrorKind::Configuration(_))
    }

    /// The peer answered, but not with the expected message shape.
    pub fn is_protocol(&self) -> bool {
        matches!(self.0, ErrorKind::Protocol(_))
    }

    /// The Security Token Service rejected the exchange.
    pub fn is_exchange(&self) -> bool {
        matches!(self.0, ErrorKind::Exchange { .. })
    }

    /// The HTTP status code returned by the Security Token Service, if any.
    pub fn http_status_code(&self) -> Option<StatusCode> {
        match &self.0 {
            ErrorKind::Exchange { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns `true` if a new attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        match &self.0 {
            ErrorKind::Io(_) => true,
            ErrorKind::Exchange { status, .. } => is_retryable(*status),
            _ => false,
        }
    }

    /// Creates an error representing an I/O problem.
    ///
    /// Implementations of [AwsSecurityCredentialsSupplier] may use this to
    /// report failures reaching their credential source.
    ///
    /// [AwsSecurityCredentialsSupplier]: crate::aws::credentials::AwsSecurityCredentialsSupplier
    pub fn io<T>(source: T) -> Error
    where
        T: Into<BoxError>,
    {
        Error(ErrorKind::Io(source.into()))
    }

    /// Creates an error representing a misconfigured credential source.
    pub fn configuration<T>(source: T) -> Error
    where
        T: Into<BoxError>,
    {
        Error(ErrorKind::Configuration(source.into()))
    }

    pub(crate) fn format<T>(source: T) -> Error
    where
        T: Into<BoxError>,
    {
        Error(ErrorKind::Format(source.into()))
    }

    pub(crate) fn missing_field(field: &'static str) -> Error {
        Error(ErrorKind::MissingField(field))
    }

    pub(crate) fn protocol<T>(source: T) -> Error
    where
        T: Into<BoxError>,
    {
        Error(ErrorKind::Protocol(source.into()))
    }

    pub(crate) fn exchange(status: StatusCode, body: String) -> Error {
        Error(ErrorKind::Exchange { status, body })
    }
}

#[derive(thiserror::Error, Debug)]
enum ErrorKind {
    #[error("invalid format: {0}")]
    Format(#[source] BoxError),
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("i/o error: {0}")]
    Io(#[source] BoxError),
    #[error("invalid configuration: {0}")]
    Configuration(#[source] BoxError),
    #[error("unexpected response from peer: {0}")]
    Protocol(#[source] BoxError),
    #[error("token exchange failed with status {status}: {body}")]
    Exchange { status: StatusCode, body: String },
}

pub(crate) fn is_retryable(c: StatusCode) -> bool {
    match c {
        // Internal server errors do not indicate that there is anything wrong
        // with our request, so we retry them.
        StatusCode::INTERNAL_SERVER_ERROR
        | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::REQUEST_TIMEOUT
        | StatusCode::TOO_MANY_REQUESTS => true,
        _ => false,
    }
}
