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

//! Credentials used to authorize the admin requests.
//!
//! Two kinds are supported: a [service account key] loaded from a local JSON
//! file, and the static credential accepted by the local Auth emulator.
//!
//! [service account key]: https://google.aip.dev/auth/4112

pub mod service_account;

use crate::constants::EMULATOR_TOKEN;
use crate::errors::CredentialError;
use crate::token::Token;
use http::header::{AUTHORIZATION, HeaderName, HeaderValue};
use std::path::Path;
use std::sync::Arc;

pub type Result<T> = std::result::Result<T, CredentialError>;

/// Represents a [Credential] used to obtain auth tokens and the headers
/// derived from them.
///
/// Cloning is cheap, clones share the token cache.
#[derive(Clone, Debug)]
pub struct Credential {
    inner: Arc<dyn dynamic::CredentialTrait>,
}

impl Credential {
    /// Returns an access token, reusing a cached one if it is still valid.
    pub async fn token(&self) -> Result<Token> {
        self.inner.token().await
    }

    /// Returns the headers that authorize a request.
    pub async fn headers(&self) -> Result<Vec<(HeaderName, HeaderValue)>> {
        self.inner.headers().await
    }

    /// The project the credential belongs to, if known.
    pub fn project_id(&self) -> Option<String> {
        self.inner.project_id()
    }
}

pub(crate) mod dynamic {
    use super::{HeaderName, HeaderValue, Result, Token};

    #[async_trait::async_trait]
    pub trait CredentialTrait: std::fmt::Debug + Send + Sync {
        async fn token(&self) -> Result<Token>;

        async fn headers(&self) -> Result<Vec<(HeaderName, HeaderValue)>>;

        fn project_id(&self) -> Option<String> {
            None
        }
    }
}

/// Loads a [Credential] from a JSON key file.
///
/// Only `service_account` keys are supported. The file is read and parsed
/// eagerly, so any problem with it is reported here, before the first remote
/// call.
pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Credential> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|e| {
        CredentialError::non_retryable_from_str(format!(
            "failed to read credential file {}: {e}",
            path.display()
        ))
    })?;
    from_json(&contents).map_err(|e| {
        CredentialError::from_str(
            e.is_retryable(),
            format!("failed to load credential file {}: {e}", path.display()),
        )
    })
}

/// Loads a [Credential] from the contents of a JSON key file.
pub fn from_json(contents: &str) -> Result<Credential> {
    let js: serde_json::Value =
        serde_json::from_str(contents).map_err(CredentialError::non_retryable)?;
    let cred_type = js
        .get("type")
        .ok_or_else(|| CredentialError::non_retryable_from_str("missing `type` field"))?
        .as_str()
        .ok_or_else(|| CredentialError::non_retryable_from_str("`type` field is not a string"))?;
    match cred_type {
        "service_account" => service_account::creds_from(js),
        other => Err(CredentialError::non_retryable_from_str(format!(
            "unsupported credential type {other:?}, expected \"service_account\""
        ))),
    }
}

/// Returns the [Credential] accepted by the Auth emulator.
///
/// The emulator does not validate tokens, it only requires the static
/// `owner` bearer token to grant admin access.
pub fn emulator() -> Credential {
    Credential {
        inner: Arc::new(EmulatorCredential),
    }
}

#[derive(Debug)]
struct EmulatorCredential;

#[async_trait::async_trait]
impl dynamic::CredentialTrait for EmulatorCredential {
    async fn token(&self) -> Result<Token> {
        Ok(Token {
            token: EMULATOR_TOKEN.to_string(),
            token_type: "Bearer".to_string(),
            expires_at: None,
        })
    }

    async fn headers(&self) -> Result<Vec<(HeaderName, HeaderValue)>> {
        let token = self.token().await?;
        let value = HeaderValue::from_str(&token.header_value())
            .map_err(CredentialError::non_retryable)?;
        Ok(vec![(AUTHORIZATION, value)])
    }
}
