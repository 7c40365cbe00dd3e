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

//! Custom claims and the validated request that carries them.

use crate::constants::{MAX_CLAIMS_PAYLOAD_SIZE, MAX_UID_LENGTH, RESERVED_CLAIMS};
use crate::{Error, Result};
use serde_json::{Map, Value};

/// The claim that grants the driver role.
pub const DRIVER_CLAIM: &str = "driver";

/// A set of developer-defined claims attached to a user's ID tokens.
///
/// ```
/// # use claims_admin::claims::CustomClaims;
/// let claims = CustomClaims::new().with("driver", true).with("level", 3);
/// assert_eq!(claims.to_json(), r#"{"driver":true,"level":3}"#);
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CustomClaims(Map<String, Value>);

impl CustomClaims {
    pub fn new() -> Self {
        Self::default()
    }

    /// The claims granting the driver role, `{"driver": true}`.
    pub fn driver() -> Self {
        Self::new().with(DRIVER_CLAIM, true)
    }

    /// Sets `name` to `value`, replacing any previous value.
    pub fn with<K: Into<String>, V: Into<Value>>(mut self, name: K, value: V) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    /// Parses claims from a JSON object.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value =
            serde_json::from_str(json).map_err(|e| Error::InvalidClaims(e.to_string()))?;
        Self::try_from(value)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Serializes the claims the way the identity service stores them.
    pub fn to_json(&self) -> String {
        Value::Object(self.0.clone()).to_string()
    }
}

impl TryFrom<Value> for CustomClaims {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(Error::InvalidClaims(format!(
                "custom claims must be a JSON object, got {other}"
            ))),
        }
    }
}

/// A validated request to replace the custom claims of one user.
///
/// Setting claims is an overwrite: the stored claims become exactly the
/// claims in the request. A request without claims clears them.
#[derive(Clone, Debug, PartialEq)]
pub struct ClaimRequest {
    uid: String,
    payload: String,
}

impl ClaimRequest {
    pub fn new<U: Into<String>>(uid: U, claims: Option<&CustomClaims>) -> Result<Self> {
        let uid = uid.into();
        if uid.is_empty() || uid.encode_utf16().count() > MAX_UID_LENGTH {
            return Err(Error::InvalidUid(uid));
        }
        let Some(claims) = claims else {
            return Ok(Self {
                uid,
                payload: "{}".to_string(),
            });
        };
        if let Some(reserved) = claims.names().find(|n| RESERVED_CLAIMS.contains(n)) {
            return Err(Error::ReservedClaim(reserved.to_string()));
        }
        let payload = claims.to_json();
        // Limits are in UTF-16 code units.
        let size = payload.encode_utf16().count();
        if size > MAX_CLAIMS_PAYLOAD_SIZE {
            return Err(Error::ClaimsTooLarge(size));
        }
        Ok(Self { uid, payload })
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    /// The claims serialized as a JSON object.
    pub fn payload(&self) -> &str {
        &self.payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    #[test]
    fn driver() {
        let claims = CustomClaims::driver();
        assert_eq!(claims.get(DRIVER_CLAIM), Some(&Value::Bool(true)));
        assert_eq!(claims.to_json(), r#"{"driver":true}"#);
    }

    #[test]
    fn from_json() {
        let claims = CustomClaims::from_json(r#"{"admin": false, "tier": "gold"}"#).unwrap();
        assert_eq!(claims.get("admin"), Some(&json!(false)));
        assert_eq!(claims.get("tier"), Some(&json!("gold")));
        assert!(!claims.is_empty());
    }

    #[test_case("[1, 2]")]
    #[test_case("true")]
    #[test_case("null")]
    #[test_case("not-json")]
    fn from_json_not_an_object(input: &str) {
        let err = CustomClaims::from_json(input).unwrap_err();
        assert!(matches!(err, Error::InvalidClaims(_)), "{err:?}");
    }

    #[test]
    fn request() {
        let request = ClaimRequest::new("some-uid", Some(&CustomClaims::driver())).unwrap();
        assert_eq!(request.uid(), "some-uid");
        assert_eq!(request.payload(), r#"{"driver":true}"#);
    }

    #[test]
    fn request_without_claims_clears() {
        let request = ClaimRequest::new("some-uid", None).unwrap();
        assert_eq!(request.payload(), "{}");
        let request = ClaimRequest::new("some-uid", Some(&CustomClaims::new())).unwrap();
        assert_eq!(request.payload(), "{}");
    }

    #[test]
    fn request_is_deterministic() {
        let claims = CustomClaims::driver();
        let a = ClaimRequest::new("some-uid", Some(&claims)).unwrap();
        let b = ClaimRequest::new("some-uid", Some(&claims)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn request_invalid_uid() {
        let err = ClaimRequest::new("", Some(&CustomClaims::driver())).unwrap_err();
        assert!(matches!(err, Error::InvalidUid(_)), "{err:?}");

        let uid = "a".repeat(MAX_UID_LENGTH);
        assert!(ClaimRequest::new(uid.as_str(), None).is_ok());
        let uid = "a".repeat(MAX_UID_LENGTH + 1);
        let err = ClaimRequest::new(uid, None).unwrap_err();
        assert!(matches!(err, Error::InvalidUid(_)), "{err:?}");
    }

    #[test_case("sub")]
    #[test_case("iss")]
    #[test_case("firebase")]
    #[test_case("auth_time")]
    fn request_reserved_claim(name: &str) {
        let claims = CustomClaims::driver().with(name, "value");
        let err = ClaimRequest::new("some-uid", Some(&claims)).unwrap_err();
        match err {
            Error::ReservedClaim(got) => assert_eq!(got, name),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn request_claims_too_large() {
        // `{"k":"` + value + `"}` is 8 characters of overhead.
        let claims = CustomClaims::new().with("k", "x".repeat(MAX_CLAIMS_PAYLOAD_SIZE - 8));
        assert!(ClaimRequest::new("some-uid", Some(&claims)).is_ok());

        let claims = CustomClaims::new().with("k", "x".repeat(MAX_CLAIMS_PAYLOAD_SIZE - 7));
        let err = ClaimRequest::new("some-uid", Some(&claims)).unwrap_err();
        assert!(
            matches!(err, Error::ClaimsTooLarge(n) if n == MAX_CLAIMS_PAYLOAD_SIZE + 1),
            "{err:?}"
        );
    }

    #[test]
    fn request_limits_count_utf16_units() {
        // Each emoji is a surrogate pair, two UTF-16 code units.
        let uid = "\u{1F600}".repeat(MAX_UID_LENGTH / 2);
        assert!(ClaimRequest::new(uid, None).is_ok());
        let uid = "\u{1F600}".repeat(MAX_UID_LENGTH / 2 + 1);
        let err = ClaimRequest::new(uid, None).unwrap_err();
        assert!(matches!(err, Error::InvalidUid(_)), "{err:?}");

        let count = (MAX_CLAIMS_PAYLOAD_SIZE - 8) / 2;
        let claims = CustomClaims::new().with("k", "\u{1F600}".repeat(count));
        assert!(ClaimRequest::new("some-uid", Some(&claims)).is_ok());
        let claims = CustomClaims::new().with("k", "\u{1F600}".repeat(count + 1));
        let err = ClaimRequest::new("some-uid", Some(&claims)).unwrap_err();
        assert!(
            matches!(err, Error::ClaimsTooLarge(n) if n == MAX_CLAIMS_PAYLOAD_SIZE + 2),
            "{err:?}"
        );
    }
}
