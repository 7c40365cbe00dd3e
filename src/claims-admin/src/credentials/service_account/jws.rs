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

use crate::credentials::Result;
use crate::errors::CredentialError;
use base64::prelude::{BASE64_URL_SAFE_NO_PAD, Engine as _};
use serde::Serialize;
use std::time::Duration;
use time::OffsetDateTime;

// The token endpoint rejects assertions with `iat` in the future. The local
// clock may be a few seconds ahead of the server, so backdate the assertion.
pub(crate) const CLOCK_SKEW_FUDGE: Duration = Duration::from_secs(10);
pub(crate) const DEFAULT_TOKEN_TIMEOUT: Duration = Duration::from_secs(3600);

/// The claims of a JWT-bearer assertion, see RFC 7523 section 3.
#[derive(Serialize)]
pub(crate) struct JwsClaims<'a> {
    pub iss: &'a str,
    pub scope: &'a str,
    pub aud: &'a str,
    #[serde(with = "time::serde::timestamp")]
    pub exp: OffsetDateTime,
    #[serde(with = "time::serde::timestamp")]
    pub iat: OffsetDateTime,
}

impl JwsClaims<'_> {
    pub(crate) fn encode(&self) -> Result<String> {
        if self.exp < self.iat {
            return Err(CredentialError::non_retryable_from_str(format!(
                "expiration time {:?}, must be later than issued time {:?}",
                self.exp, self.iat
            )));
        }
        let json = serde_json::to_string(&self).map_err(CredentialError::non_retryable)?;
        Ok(BASE64_URL_SAFE_NO_PAD.encode(json.as_bytes()))
    }
}

/// The header that describes who, what, and how a token was created.
#[derive(Serialize)]
pub(crate) struct JwsHeader<'a> {
    pub alg: &'a str,
    pub typ: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<&'a str>,
}

impl JwsHeader<'_> {
    pub(crate) fn encode(&self) -> Result<String> {
        let json = serde_json::to_string(&self).map_err(CredentialError::non_retryable)?;
        Ok(BASE64_URL_SAFE_NO_PAD.encode(json.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn decode(encoded: String) -> Value {
        let decoded = BASE64_URL_SAFE_NO_PAD.decode(encoded).unwrap();
        serde_json::from_slice(&decoded).unwrap()
    }

    #[test]
    fn claims_encode() {
        let now = OffsetDateTime::now_utc();
        let then = now + DEFAULT_TOKEN_TIMEOUT;
        let claims = JwsClaims {
            iss: "test-iss",
            scope: "scope1 scope2",
            aud: "https://test-aud/token",
            exp: then,
            iat: now,
        };

        let v = decode(claims.encode().unwrap());
        assert_eq!(v["iss"], "test-iss");
        assert_eq!(v["scope"], "scope1 scope2");
        assert_eq!(v["aud"], "https://test-aud/token");
        assert_eq!(v["iat"], now.unix_timestamp());
        assert_eq!(v["exp"], then.unix_timestamp());
        assert_eq!(v.get("sub"), None);
    }

    #[test]
    fn claims_encode_exp_before_iat() {
        let now = OffsetDateTime::now_utc();
        let claims = JwsClaims {
            iss: "test-iss",
            scope: "scope",
            aud: "test-aud",
            exp: now - Duration::from_secs(1),
            iat: now,
        };
        let err = claims.encode().unwrap_err();
        assert!(
            err.to_string().contains("must be later than issued time"),
            "{err}"
        );
        assert!(!err.is_retryable());
    }

    #[test]
    fn header_encode() {
        let header = JwsHeader {
            alg: "RS256",
            typ: "JWT",
            kid: Some("some-key-id"),
        };
        let v = decode(header.encode().unwrap());
        assert_eq!(v["alg"], "RS256");
        assert_eq!(v["typ"], "JWT");
        assert_eq!(v["kid"], "some-key-id");
    }

    #[test]
    fn header_encode_no_kid() {
        let header = JwsHeader {
            alg: "RS256",
            typ: "JWT",
            kid: None,
        };
        let v = decode(header.encode().unwrap());
        assert_eq!(v["alg"], "RS256");
        assert_eq!(v.get("kid"), None);
    }
}
