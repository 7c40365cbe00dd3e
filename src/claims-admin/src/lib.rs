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

//! Sets custom authorization claims on identity-service user accounts.
//!
//! The crate wraps the two remote calls needed to grant a role to a user of
//! [Firebase Authentication]: an OAuth2 token exchange using a
//! [service account key], followed by an `accounts:update` request to the
//! [Identity Toolkit API] carrying the new custom claims.
//!
//! ```no_run
//! # use claims_admin::client::AuthClient;
//! # use claims_admin::claims::CustomClaims;
//! # use claims_admin::credentials;
//! # tokio_test::block_on(async {
//! let credential = credentials::from_file("serviceAccountKey.json")?;
//! let client = AuthClient::builder()
//!     .with_project_id("my-project")
//!     .build(credential)?;
//! client
//!     .set_custom_user_claims("some-uid", Some(CustomClaims::driver()))
//!     .await?;
//! # Ok::<(), claims_admin::Error>(())
//! # });
//! ```
//!
//! [Firebase Authentication]: https://firebase.google.com/docs/auth
//! [Identity Toolkit API]: https://cloud.google.com/identity-platform/docs/reference/rest
//! [service account key]: https://google.aip.dev/auth/4112

pub mod claims;
pub mod cli;
pub mod client;
pub(crate) mod constants;
pub mod credentials;
pub mod errors;
pub mod token;
pub(crate) mod token_cache;

pub use errors::Error;

/// The result type for operations in this crate.
pub type Result<T> = std::result::Result<T, Error>;
