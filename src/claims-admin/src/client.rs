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

//! A client for the user-management surface of the [Identity Toolkit API].
//!
//! [Identity Toolkit API]: https://cloud.google.com/identity-platform/docs/reference/rest

use crate::claims::{ClaimRequest, CustomClaims};
use crate::constants::IDENTITY_TOOLKIT_ENDPOINT;
use crate::credentials::Credential;
use crate::errors::ErrorCode;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Sets custom claims on user accounts.
///
/// Create one client per process with [AuthClient::builder]. The client
/// holds the [Credential], so the access token is fetched once and reused
/// across calls.
#[derive(Clone, Debug)]
pub struct AuthClient {
    inner: reqwest::Client,
    endpoint: String,
    project_id: String,
    credential: Credential,
}

/// A builder for [AuthClient].
#[derive(Debug, Default)]
pub struct Builder {
    endpoint: Option<String>,
    emulator_host: Option<String>,
    project_id: Option<String>,
}

impl Builder {
    /// Overrides the service endpoint, e.g. `https://identitytoolkit.googleapis.com/v1`.
    pub fn with_endpoint<S: Into<String>>(mut self, endpoint: S) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Targets the Auth emulator listening on `host` (`host:port`).
    ///
    /// Takes precedence over [Builder::with_endpoint].
    pub fn with_emulator_host<S: Into<String>>(mut self, host: S) -> Self {
        self.emulator_host = Some(host.into());
        self
    }

    /// Sets the project that owns the user accounts.
    ///
    /// Defaults to the project of the credential.
    pub fn with_project_id<S: Into<String>>(mut self, project_id: S) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn build(self, credential: Credential) -> Result<AuthClient> {
        let project_id = self
            .project_id
            .or_else(|| credential.project_id())
            .filter(|p| !p.is_empty())
            .ok_or(Error::MissingProjectId)?;
        let endpoint = match (self.emulator_host, self.endpoint) {
            (Some(host), _) => format!("http://{host}/identitytoolkit.googleapis.com/v1"),
            (None, Some(endpoint)) => endpoint,
            (None, None) => IDENTITY_TOOLKIT_ENDPOINT.to_string(),
        };
        Ok(AuthClient {
            inner: reqwest::Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            project_id,
            credential,
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateAccountRequest<'a> {
    local_id: &'a str,
    custom_attributes: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateAccountResponse {
    local_id: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl AuthClient {
    pub fn builder() -> Builder {
        Builder::default()
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Replaces the custom claims of the user identified by `uid`.
    ///
    /// Passing `None` clears all custom claims. The claims are validated
    /// locally before any request is sent.
    pub async fn set_custom_user_claims(
        &self,
        uid: &str,
        claims: Option<CustomClaims>,
    ) -> Result<()> {
        let request = ClaimRequest::new(uid, claims.as_ref())?;
        self.update(&request).await
    }

    /// Sends a validated [ClaimRequest].
    pub async fn update(&self, request: &ClaimRequest) -> Result<()> {
        let url = format!(
            "{}/projects/{}/accounts:update",
            self.endpoint, self.project_id
        );
        let mut builder = self.inner.post(&url).json(&UpdateAccountRequest {
            local_id: request.uid(),
            custom_attributes: request.payload(),
        });
        for (name, value) in self.credential.headers().await? {
            builder = builder.header(name, value);
        }

        tracing::debug!(%url, uid = request.uid(), "updating custom claims");
        let response = builder.send().await.map_err(Error::Transport)?;
        let status = response.status();
        let body = response.text().await.map_err(Error::Transport)?;
        if !status.is_success() {
            let (code, message) = match serde_json::from_str::<ErrorResponse>(&body) {
                Ok(e) => ErrorCode::parse(&e.error.message),
                Err(_) => (ErrorCode::Unknown("UNKNOWN_ERROR".to_string()), body),
            };
            return Err(Error::Service {
                status,
                code,
                message,
            });
        }

        let updated = serde_json::from_str::<UpdateAccountResponse>(&body)
            .ok()
            .and_then(|r| r.local_id);
        if updated.is_none() {
            return Err(Error::Service {
                status,
                code: ErrorCode::Internal,
                message: "unable to set custom user claims".to_string(),
            });
        }
        tracing::debug!(uid = request.uid(), "custom claims updated");
        Ok(())
    }
}
