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

//! AWS workloads federate with Google Cloud by signing a `GetCallerIdentity`
//! request with their AWS credentials, and presenting the serialized request
//! as the subject token of a token exchange. See
//! [Workload Identity Federation with AWS] for the details.
//!
//! The types in this module produce everything needed to sign such a request,
//! the signature itself is computed by the caller.
//!
//! [Workload Identity Federation with AWS]: https://cloud.google.com/iam/docs/workload-identity-federation-with-other-clouds

/// Timestamps in the formats used by AWS request signing.
pub mod dates;

/// AWS security credentials and the suppliers that produce them.
pub mod credentials;

/// The `GetCallerIdentity` request used as a subject token.
pub mod subject_token;
