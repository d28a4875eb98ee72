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

use std::time::Duration;

/// Environment variable holding the port of the Cloud Shell credential broker.
pub(crate) const DEVSHELL_CLIENT_PORT_VAR: &str = "DEVSHELL_CLIENT_PORT";
/// Bounds every I/O step of a Cloud Shell broker exchange.
pub(crate) const CLOUD_SHELL_READ_TIMEOUT: Duration = Duration::from_millis(5000);
/// A two character length prefix, then an empty JSON array.
pub(crate) const CLOUD_SHELL_AUTH_TOKEN_REQUEST: &[u8] = b"2\n[]\n";
/// Position of the access token in the broker response array.
pub(crate) const CLOUD_SHELL_ACCESS_TOKEN_INDEX: usize = 2;
/// Upper bound on the broker response body.
pub(crate) const CLOUD_SHELL_MAX_RESPONSE_BYTES: usize = 64 * 1024;

pub(crate) const AWS_REGION_VAR: &str = "AWS_REGION";
pub(crate) const AWS_DEFAULT_REGION_VAR: &str = "AWS_DEFAULT_REGION";
pub(crate) const AWS_ACCESS_KEY_ID_VAR: &str = "AWS_ACCESS_KEY_ID";
pub(crate) const AWS_SECRET_ACCESS_KEY_VAR: &str = "AWS_SECRET_ACCESS_KEY";
pub(crate) const AWS_SESSION_TOKEN_VAR: &str = "AWS_SESSION_TOKEN";

pub(crate) const AWS_HOST_HEADER: &str = "host";
pub(crate) const AWS_DATE_HEADER: &str = "x-amz-date";
pub(crate) const AWS_SECURITY_TOKEN_HEADER: &str = "x-amz-security-token";
pub(crate) const AWS_AUTHORIZATION_HEADER: &str = "authorization";
pub(crate) const GOOGLE_TARGET_RESOURCE_HEADER: &str = "x-goog-cloud-target-resource";
