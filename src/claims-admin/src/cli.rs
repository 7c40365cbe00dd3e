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

//! Command-line configuration and the entry point of `set-driver-claim`.
//!
//! Every option can be set through an environment variable, the binary is
//! normally invoked without arguments:
//!
//! ```sh
//! DRIVER_UID=some-uid set-driver-claim
//! ```

use crate::claims::{ClaimRequest, CustomClaims};
use crate::client::AuthClient;
use crate::credentials;
use crate::Result;
use clap::Parser;
use std::path::PathBuf;

/// Grants the driver role to one user account.
#[derive(Debug, Parser)]
#[command(name = "set-driver-claim", version, about)]
pub struct Args {
    /// The uid of the user to update.
    #[arg(long, env = "DRIVER_UID")]
    pub uid: Option<String>,

    /// Path to the service account key file.
    #[arg(
        long,
        env = "GOOGLE_APPLICATION_CREDENTIALS",
        default_value = "serviceAccountKey.json"
    )]
    pub credentials: PathBuf,

    /// The project that owns the users, defaults to the key's `project_id`.
    #[arg(long, env = "GOOGLE_CLOUD_PROJECT")]
    pub project_id: Option<String>,

    /// Send requests to the Auth emulator at `host:port` instead.
    #[arg(long, env = "FIREBASE_AUTH_EMULATOR_HOST")]
    pub emulator_host: Option<String>,

    /// Override the Identity Toolkit endpoint.
    #[arg(long, env = "IDENTITY_TOOLKIT_ENDPOINT")]
    pub endpoint: Option<String>,
}

impl Args {
    fn emulator_host(&self) -> Option<&str> {
        self.emulator_host.as_deref().filter(|h| !h.is_empty())
    }
}

/// Creates the client described by `args`.
///
/// Outside the emulator this loads the key file, any problem with it is
/// reported before a request is sent.
pub fn client(args: &Args) -> Result<AuthClient> {
    let mut builder = AuthClient::builder();
    if let Some(project_id) = &args.project_id {
        builder = builder.with_project_id(project_id);
    }
    if let Some(endpoint) = &args.endpoint {
        builder = builder.with_endpoint(endpoint);
    }
    let credential = match args.emulator_host() {
        Some(host) => {
            tracing::debug!(host, "using the Auth emulator");
            builder = builder.with_emulator_host(host);
            credentials::emulator()
        }
        None => credentials::from_file(&args.credentials)?,
    };
    builder.build(credential)
}

/// Sets the driver claim on the configured user, returning its uid.
pub async fn run(args: &Args) -> Result<String> {
    let client = client(args)?;
    let uid = args.uid.clone().unwrap_or_default();
    let request = ClaimRequest::new(uid, Some(&CustomClaims::driver()))?;
    client.update(&request).await?;
    Ok(request.uid().to_string())
}

/// Prints the outcome of [run] and returns the process exit status.
pub fn report(result: &Result<String>) -> u8 {
    match result {
        Ok(uid) => {
            println!("Custom claims set for user: {uid}");
            0
        }
        Err(e) => {
            eprintln!("Error setting custom claims: {}", error_chain(e));
            1
        }
    }
}

// Appends the causes that the top-level message does not already include.
fn error_chain(e: &(dyn std::error::Error + 'static)) -> String {
    let mut msg = e.to_string();
    let mut source = e.source();
    while let Some(s) = source {
        let cause = s.to_string();
        if !msg.contains(&cause) {
            msg.push_str(": ");
            msg.push_str(&cause);
        }
        source = s.source();
    }
    msg
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::errors::CredentialError;
    use httptest::{Expectation, Server, matchers::*, responders::*};
    use scoped_env::ScopedEnv;
    use serde_json::json;
    use std::io::Write;

    type TestResult = anyhow::Result<()>;

    const ENV_VARS: &[&str] = &[
        "DRIVER_UID",
        "GOOGLE_APPLICATION_CREDENTIALS",
        "GOOGLE_CLOUD_PROJECT",
        "FIREBASE_AUTH_EMULATOR_HOST",
        "IDENTITY_TOOLKIT_ENDPOINT",
    ];

    fn clear_env() -> Vec<ScopedEnv<&'static str>> {
        ENV_VARS.iter().map(|v| ScopedEnv::remove(*v)).collect()
    }

    #[test]
    #[serial_test::serial]
    fn defaults() -> TestResult {
        let _env = clear_env();
        let args = Args::try_parse_from(["set-driver-claim"])?;
        assert_eq!(args.uid, None);
        assert_eq!(args.credentials, PathBuf::from("serviceAccountKey.json"));
        assert_eq!(args.project_id, None);
        assert_eq!(args.emulator_host(), None);
        assert_eq!(args.endpoint, None);
        Ok(())
    }

    #[test]
    #[serial_test::serial]
    fn from_env() -> TestResult {
        let _env = clear_env();
        let _uid = ScopedEnv::set("DRIVER_UID", "env-uid");
        let _creds = ScopedEnv::set("GOOGLE_APPLICATION_CREDENTIALS", "/tmp/key.json");
        let _project = ScopedEnv::set("GOOGLE_CLOUD_PROJECT", "env-project");
        let _emulator = ScopedEnv::set("FIREBASE_AUTH_EMULATOR_HOST", "localhost:9099");
        let args = Args::try_parse_from(["set-driver-claim"])?;
        assert_eq!(args.uid.as_deref(), Some("env-uid"));
        assert_eq!(args.credentials, PathBuf::from("/tmp/key.json"));
        assert_eq!(args.project_id.as_deref(), Some("env-project"));
        assert_eq!(args.emulator_host(), Some("localhost:9099"));
        Ok(())
    }

    #[test]
    #[serial_test::serial]
    fn flags_override_env() -> TestResult {
        let _env = clear_env();
        let _uid = ScopedEnv::set("DRIVER_UID", "env-uid");
        let args = Args::try_parse_from(["set-driver-claim", "--uid", "flag-uid"])?;
        assert_eq!(args.uid.as_deref(), Some("flag-uid"));
        Ok(())
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn run_with_emulator() -> TestResult {
        let _env = clear_env();
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path(
                    "POST",
                    "/identitytoolkit.googleapis.com/v1/projects/test-project/accounts:update"
                ),
                request::headers(contains(("authorization", "Bearer owner"))),
                request::body(json_decoded(eq(json!({
                    "localId": "some-uid",
                    "customAttributes": r#"{"driver":true}"#,
                })))),
            ])
            .respond_with(json_encoded(json!({"localId": "some-uid"}))),
        );

        let host = server.addr().to_string();
        let args = Args::try_parse_from([
            "set-driver-claim",
            "--uid",
            "some-uid",
            "--project-id",
            "test-project",
            "--emulator-host",
            host.as_str(),
            "--credentials",
            "file-does-not-exist.json",
        ])?;
        let uid = run(&args).await?;
        assert_eq!(uid, "some-uid");
        Ok(())
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn run_missing_credentials() -> TestResult {
        let _env = clear_env();
        let args = Args::try_parse_from([
            "set-driver-claim",
            "--uid",
            "some-uid",
            "--credentials",
            "file-does-not-exist.json",
        ])?;
        let err = run(&args).await.unwrap_err();
        assert!(matches!(err, Error::Credentials(_)), "{err:?}");
        assert!(err.to_string().contains("file-does-not-exist.json"), "{err}");
        Ok(())
    }

    #[tokio::test]
    async fn run_corrupt_credentials() -> TestResult {
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(b"{\"type\": \"service_account\"")?;
        let args = Args {
            uid: Some("some-uid".into()),
            credentials: file.path().to_path_buf(),
            project_id: Some("test-project".into()),
            emulator_host: None,
            endpoint: None,
        };
        let err = run(&args).await.unwrap_err();
        assert!(matches!(err, Error::Credentials(_)), "{err:?}");
        Ok(())
    }

    #[tokio::test]
    async fn run_missing_uid() -> TestResult {
        // No expectations, a request would fail the test.
        let server = Server::run();
        let args = Args {
            uid: None,
            credentials: PathBuf::from("unused.json"),
            project_id: Some("test-project".into()),
            emulator_host: Some(server.addr().to_string()),
            endpoint: None,
        };
        let err = run(&args).await.unwrap_err();
        assert!(matches!(err, Error::InvalidUid(_)), "{err:?}");
        Ok(())
    }

    #[test]
    fn report_status() {
        assert_eq!(report(&Ok("some-uid".to_string())), 0);
        assert_eq!(report(&Err(Error::InvalidUid(String::new()))), 1);
    }

    #[test]
    fn error_chain_includes_causes() {
        let io = std::io::Error::other("test-only-root-cause");
        let e = Error::Credentials(CredentialError::non_retryable(io));
        let msg = error_chain(&e);
        assert_eq!(str::matches(&msg, "test-only-root-cause").count(), 1, "{msg}");
    }
}
