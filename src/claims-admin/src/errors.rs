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

//! Errors returned by this crate.

use crate::constants::{MAX_CLAIMS_PAYLOAD_SIZE, MAX_UID_LENGTH};
use http::StatusCode;
use std::error::Error as StdError;
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

/// Represents an error creating or using a [Credential](crate::credentials::Credential).
///
/// Loading the key file, signing the assertion, and exchanging it for an
/// access token all report failures with this type.
#[derive(Clone, Debug)]
pub struct CredentialError {
    /// If `true`, the operation that resulted in this error might succeed
    /// upon retry. This crate never retries, the flag is informational.
    is_retryable: bool,
    source: CredentialErrorImpl,
}

#[derive(Clone, Debug)]
enum CredentialErrorImpl {
    SimpleMessage(String),
    Source(Arc<dyn StdError + Send + Sync>),
}

impl CredentialError {
    pub(crate) fn new<T: StdError + Send + Sync + 'static>(is_retryable: bool, source: T) -> Self {
        CredentialError {
            is_retryable,
            source: CredentialErrorImpl::Source(Arc::new(source)),
        }
    }

    /// Creates a new `CredentialError` from a message.
    pub fn from_str<T: Into<String>>(is_retryable: bool, message: T) -> Self {
        CredentialError {
            is_retryable,
            source: CredentialErrorImpl::SimpleMessage(message.into()),
        }
    }

    /// Returns `true` if the error is retryable; otherwise returns `false`.
    pub fn is_retryable(&self) -> bool {
        self.is_retryable
    }

    pub(crate) fn retryable<T: StdError + Send + Sync + 'static>(source: T) -> Self {
        CredentialError::new(true, source)
    }

    pub(crate) fn non_retryable<T: StdError + Send + Sync + 'static>(source: T) -> Self {
        CredentialError::new(false, source)
    }

    pub(crate) fn non_retryable_from_str<T: Into<String>>(message: T) -> Self {
        CredentialError::from_str(false, message)
    }
}

impl StdError for CredentialError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match &self.source {
            CredentialErrorImpl::SimpleMessage(_) => None,
            CredentialErrorImpl::Source(source) => Some(source.as_ref()),
        }
    }
}

const RETRYABLE_MSG: &str = "but future attempts may succeed";
const NON_RETRYABLE_MSG: &str = "and future attempts will not succeed";

impl Display for CredentialError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let msg = if self.is_retryable {
            RETRYABLE_MSG
        } else {
            NON_RETRYABLE_MSG
        };
        match &self.source {
            CredentialErrorImpl::SimpleMessage(m) => {
                write!(f, "cannot obtain admin credentials, {msg}: {m}")
            }
            CredentialErrorImpl::Source(s) => {
                write!(f, "cannot obtain admin credentials, {msg}: {s}")
            }
        }
    }
}

/// The error type for claim validation and the remote update.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error(
        "the uid must be a non-empty string with at most {max} characters, got {0:?}",
        max = MAX_UID_LENGTH
    )]
    InvalidUid(String),

    #[error("invalid custom claims: {0}")]
    InvalidClaims(String),

    #[error("claim {0:?} is reserved and cannot be set as a custom claim")]
    ReservedClaim(String),

    #[error(
        "custom claims payload must not exceed {max} characters, got {0}",
        max = MAX_CLAIMS_PAYLOAD_SIZE
    )]
    ClaimsTooLarge(usize),

    #[error(
        "no project id configured, set GOOGLE_CLOUD_PROJECT or use a key file with `project_id`"
    )]
    MissingProjectId,

    #[error(transparent)]
    Credentials(#[from] CredentialError),

    #[error("cannot send request to the identity service: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("the identity service rejected the request ({status}): {code}{}", detail(.message))]
    Service {
        status: StatusCode,
        code: ErrorCode,
        message: String,
    },
}

fn detail(message: &str) -> String {
    if message.is_empty() {
        String::new()
    } else {
        format!(": {message}")
    }
}

impl Error {
    /// The provider error code, if the identity service rejected the request.
    pub fn code(&self) -> Option<&ErrorCode> {
        match self {
            Error::Service { code, .. } => Some(code),
            _ => None,
        }
    }
}

/// Error codes reported by the identity service for `accounts:update`.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorCode {
    UserNotFound,
    InvalidClaims,
    ClaimsTooLarge,
    ForbiddenClaim,
    InvalidUid,
    InsufficientPermission,
    ProjectNotFound,
    ConfigurationNotFound,
    /// The service accepted the request but the response did not identify
    /// the updated user.
    Internal,
    Unknown(String),
}

impl ErrorCode {
    /// Splits a service message of the form `CODE : detail`.
    pub(crate) fn parse(message: &str) -> (ErrorCode, String) {
        let (code, detail) = match message.split_once(':') {
            Some((code, detail)) => (code.trim(), detail.trim()),
            None => (message.trim(), ""),
        };
        let code = match code {
            "USER_NOT_FOUND" => ErrorCode::UserNotFound,
            "INVALID_CLAIMS" => ErrorCode::InvalidClaims,
            "CLAIMS_TOO_LARGE" => ErrorCode::ClaimsTooLarge,
            "FORBIDDEN_CLAIM" => ErrorCode::ForbiddenClaim,
            "INVALID_UID" => ErrorCode::InvalidUid,
            "INSUFFICIENT_PERMISSION" => ErrorCode::InsufficientPermission,
            "PROJECT_NOT_FOUND" => ErrorCode::ProjectNotFound,
            "CONFIGURATION_NOT_FOUND" => ErrorCode::ConfigurationNotFound,
            other => ErrorCode::Unknown(other.to_string()),
        };
        (code, detail.to_string())
    }
}

impl Display for ErrorCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorCode::UserNotFound => "USER_NOT_FOUND",
            ErrorCode::InvalidClaims => "INVALID_CLAIMS",
            ErrorCode::ClaimsTooLarge => "CLAIMS_TOO_LARGE",
            ErrorCode::ForbiddenClaim => "FORBIDDEN_CLAIM",
            ErrorCode::InvalidUid => "INVALID_UID",
            ErrorCode::InsufficientPermission => "INSUFFICIENT_PERMISSION",
            ErrorCode::ProjectNotFound => "PROJECT_NOT_FOUND",
            ErrorCode::ConfigurationNotFound => "CONFIGURATION_NOT_FOUND",
            ErrorCode::Internal => "INTERNAL_ERROR",
            ErrorCode::Unknown(s) => s.as_str(),
        };
        f.write_str(s)
    }
}

pub(crate) fn is_retryable(c: StatusCode) -> bool {
    // Server errors do not indicate that there is anything wrong with our
    // request.
    c.is_server_error() || c == StatusCode::REQUEST_TIMEOUT || c == StatusCode::TOO_MANY_REQUESTS
}
