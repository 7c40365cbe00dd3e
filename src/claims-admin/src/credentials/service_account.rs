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

//! [Service Account] credentials.
//!
//! A service account key grants administrative rights over the project's
//! users. The key is a JSON document in the format described by [aip/4112].
//! It contains the service account email and an RSA private key, treat it as
//! any other secret.
//!
//! The credential signs a JWT with the private key and exchanges it for an
//! OAuth2 access token at the key's `token_uri`, using the JWT-bearer grant
//! from [RFC 7523].
//!
//! [aip/4112]: https://google.aip.dev/auth/4112
//! [RFC 7523]: https://datatracker.ietf.org/doc/html/rfc7523
//! [Service Account]: https://cloud.google.com/iam/docs/service-account-creds

mod jws;

use crate::constants::{ADMIN_SCOPES, DEFAULT_TOKEN_URI, JWT_BEARER_GRANT_TYPE};
use crate::credentials::dynamic::CredentialTrait;
use crate::credentials::{Credential, Result};
use crate::errors::{self, CredentialError};
use crate::token::{Token, TokenProvider};
use crate::token_cache::TokenCache;
use base64::prelude::{BASE64_URL_SAFE_NO_PAD, Engine as _};
use http::header::{AUTHORIZATION, HeaderName, HeaderValue};
use jws::{CLOCK_SKEW_FUDGE, DEFAULT_TOKEN_TIMEOUT, JwsClaims, JwsHeader};
use rustls::crypto::CryptoProvider;
use rustls::sign::Signer;
use rustls_pki_types::PrivateKeyDer;
use rustls_pki_types::pem::{self, PemObject};
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::time::Instant;

pub(crate) fn creds_from(js: serde_json::Value) -> Result<Credential> {
    let service_account_key =
        serde_json::from_value::<ServiceAccountKey>(js).map_err(CredentialError::non_retryable)?;
    Ok(Builder::new(service_account_key).build())
}

/// A builder for service account [Credential]s.
#[derive(Debug)]
pub struct Builder {
    service_account_key: ServiceAccountKey,
    scopes: Vec<String>,
}

impl Builder {
    /// Creates a builder for the given [service account key].
    ///
    /// [service account key]: https://cloud.google.com/iam/docs/keys-create-delete#creating
    pub fn new(service_account_key: ServiceAccountKey) -> Self {
        Self {
            service_account_key,
            scopes: ADMIN_SCOPES.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Replaces the [scopes] requested for the access token.
    ///
    /// [scopes]: https://developers.google.com/identity/protocols/oauth2/scopes
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Returns a [Credential] instance with the configured settings.
    pub fn build(self) -> Credential {
        let project_id = self.service_account_key.project_id.clone();
        let token_provider = ServiceAccountTokenProvider {
            service_account_key: self.service_account_key,
            scopes: self.scopes.join(" "),
            client: reqwest::Client::new(),
        };
        Credential {
            inner: Arc::new(ServiceAccountCredential {
                token_provider: TokenCache::new(token_provider),
                project_id,
            }),
        }
    }
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// A representation of a [service account key] in the format described by [aip/4112].
///
/// [aip/4112]: https://google.aip.dev/auth/4112
/// [service account key]: https://cloud.google.com/iam/docs/keys-create-delete#creating
#[derive(serde::Deserialize, Clone)]
pub struct ServiceAccountKey {
    /// The client email address of the service account.
    pub client_email: String,
    /// ID of the service account's private key.
    pub private_key_id: String,
    /// The PEM-encoded PKCS#8 private key.
    pub private_key: String,
    /// The project id the service account belongs to.
    pub project_id: Option<String>,
    /// The OAuth2 endpoint that exchanges signed assertions for access tokens.
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key_id", &self.private_key_id)
            .field("private_key", &"[censored]")
            .field("project_id", &self.project_id)
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

impl ServiceAccountKey {
    // Creates a signer using the private key stored in the service account file.
    fn signer(&self) -> Result<Box<dyn Signer>> {
        let key_provider = CryptoProvider::get_default().map_or_else(
            || rustls::crypto::aws_lc_rs::default_provider().key_provider,
            |p| p.key_provider,
        );

        let private_key = match PrivateKeyDer::from_pem_slice(self.private_key.as_bytes()) {
            Ok(key) => key,
            Err(pem::Error::NoItemsFound) => {
                return Err(CredentialError::non_retryable_from_str(
                    "missing PEM section in service account key",
                ));
            }
            Err(e) => return Err(CredentialError::non_retryable(e)),
        };
        if !matches!(private_key, PrivateKeyDer::Pkcs8(_)) {
            return Err(unexpected_private_key_error(&private_key));
        }
        let sk = key_provider
            .load_private_key(private_key)
            .map_err(CredentialError::non_retryable)?;

        sk.choose_scheme(&[rustls::SignatureScheme::RSA_PKCS1_SHA256])
            .ok_or_else(|| {
                CredentialError::non_retryable_from_str(
                    "unable to choose RSA_PKCS1_SHA256 signing scheme, the key is not an RSA key",
                )
            })
    }
}

fn unexpected_private_key_error(key: &PrivateKeyDer<'_>) -> CredentialError {
    let found = match key {
        PrivateKeyDer::Pkcs1(_) => "PKCS1",
        PrivateKeyDer::Sec1(_) => "SEC1",
        _ => "an unknown format",
    };
    CredentialError::non_retryable_from_str(format!(
        "expected key to be in form of PKCS8, found {found}"
    ))
}

#[derive(Debug)]
struct ServiceAccountCredential<T>
where
    T: TokenProvider,
{
    token_provider: T,
    project_id: Option<String>,
}

#[derive(Debug)]
struct ServiceAccountTokenProvider {
    service_account_key: ServiceAccountKey,
    scopes: String,
    client: reqwest::Client,
}

/// The response of a JWT-bearer token exchange.
#[derive(serde::Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "bearer")]
    token_type: String,
    expires_in: Option<u64>,
}

fn bearer() -> String {
    "Bearer".to_string()
}

impl ServiceAccountTokenProvider {
    /// Creates the signed assertion sent to the token endpoint.
    fn assertion(&self, now: OffsetDateTime) -> Result<String> {
        let key = &self.service_account_key;
        let signer = key.signer()?;

        let iat = now - CLOCK_SKEW_FUDGE;
        let claims = JwsClaims {
            iss: &key.client_email,
            scope: &self.scopes,
            aud: &key.token_uri,
            exp: iat + DEFAULT_TOKEN_TIMEOUT,
            iat,
        };
        let header = JwsHeader {
            alg: "RS256",
            typ: "JWT",
            kid: Some(&key.private_key_id),
        };
        let encoded_header_claims = format!("{}.{}", header.encode()?, claims.encode()?);
        let sig = signer
            .sign(encoded_header_claims.as_bytes())
            .map_err(CredentialError::non_retryable)?;
        Ok(format!(
            "{}.{}",
            encoded_header_claims,
            BASE64_URL_SAFE_NO_PAD.encode(sig)
        ))
    }
}

#[async_trait::async_trait]
impl TokenProvider for ServiceAccountTokenProvider {
    async fn token(&self) -> Result<Token> {
        let assertion = self.assertion(OffsetDateTime::now_utc())?;
        let token_uri = &self.service_account_key.token_uri;
        tracing::debug!(
            %token_uri,
            client_email = %self.service_account_key.client_email,
            "exchanging service account assertion"
        );

        let response = self
            .client
            .post(token_uri)
            .form(&[
                ("grant_type", JWT_BEARER_GRANT_TYPE),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .map_err(CredentialError::retryable)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CredentialError::from_str(
                errors::is_retryable(status),
                format!("token exchange failed with status {status}: {body}"),
            ));
        }

        let response = response
            .json::<TokenResponse>()
            .await
            .map_err(CredentialError::non_retryable)?;
        let token = Token {
            token: response.access_token,
            token_type: response.token_type,
            // A lifetime past the clock's range never expires.
            expires_at: response
                .expires_in
                .and_then(|secs| Instant::now().checked_add(Duration::from_secs(secs))),
        };
        Ok(token)
    }
}

#[async_trait::async_trait]
impl<T> CredentialTrait for ServiceAccountCredential<T>
where
    T: TokenProvider,
{
    async fn token(&self) -> Result<Token> {
        self.token_provider.token().await
    }

    async fn headers(&self) -> Result<Vec<(HeaderName, HeaderValue)>> {
        let token = self.token().await?;
        let mut value =
            HeaderValue::from_str(&token.header_value()).map_err(CredentialError::non_retryable)?;
        value.set_sensitive(true);
        Ok(vec![(AUTHORIZATION, value)])
    }

    fn project_id(&self) -> Option<String> {
        self.project_id.clone()
    }
}
