// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::path::Path;

use reqwest::multipart;
use serde::Serialize;
use serde_json::{json, Value};
use snafu::ResultExt;
use tracing::warn;

use crate::{
    digest,
    error::{self, ManagerClientError, Result},
};

/// Thin wrapper over the manager's HTTP API: base-URL composition, digest
/// signing of mutating requests, and a connection pool sized for
/// `num_executors` concurrent result uploads.
#[derive(Clone)]
pub struct ManagerClient {
    http: reqwest::Client,
    manager_url: String,
    digest_secret: Option<Vec<u8>>,
}

impl ManagerClient {
    pub fn new(manager_url: impl Into<String>, num_executors: usize, digest_secret: Option<String>) -> Self {
        let manager_url = manager_url.into();
        let manager_url = manager_url.trim_end_matches('/').to_string();
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(num_executors.max(1))
            .build()
            .expect("reqwest client with static TLS config never fails to build");
        Self {
            http,
            manager_url,
            digest_secret: digest_secret.map(String::into_bytes),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1{path}", self.manager_url)
    }

    fn sign(&self, body: &[u8]) -> Option<String> {
        self.digest_secret.as_deref().map(|secret| digest::sign(secret, body))
    }

    /// Registers this worker with the manager. Returns the assigned
    /// `worker_id`.
    pub async fn register(&self, host: &str, port: u16, num_executors: usize, session_id: &str) -> Result<i64> {
        let body = json!({
            "worker": format!("{host}:{port}"),
            "num_executors": num_executors,
            "session_id": session_id,
        });
        let response = self
            .http
            .post(self.url("/worker"))
            .json(&body)
            .send()
            .await
            .context(error::TransportSnafu)?;
        let response = ensure_success(response).await?;
        let parsed: Value = response.json().await.context(error::TransportSnafu)?;
        match parsed.get("worker_id").and_then(Value::as_i64) {
            Some(worker_id) => Ok(worker_id),
            None => error::RejectedSnafu {
                status: 200u16,
                body: "response missing integer worker_id".to_string(),
            }
            .fail(),
        }
    }

    /// PUTs a state-change notification. Failures are fatal and propagate —
    /// the caller decides whether to escalate to shutdown.
    pub async fn notify_state(&self, worker_id: i64, state: &str) -> Result<()> {
        let body = serde_json::to_vec(&json!({ "worker": { "state": state } })).context(error::SerializationSnafu)?;
        self.put_signed(&format!("/worker/{worker_id}"), body).await
    }

    /// POSTs a heartbeat. Per the spec's preserved behavior, an HTTP-level
    /// rejection (manager answered, just not happily) is logged and treated
    /// as a non-failure; only a transport-level fault is returned as `Err`
    /// so the heartbeat loop's consecutive-failure counter increments.
    pub async fn heartbeat(&self, worker_id: i64) -> Result<()> {
        let body =
            serde_json::to_vec(&json!({ "worker": { "heartbeat": true } })).context(error::SerializationSnafu)?;
        match self.post_signed(&format!("/worker/{worker_id}/heartbeat"), body).await {
            Ok(()) => Ok(()),
            Err(err @ ManagerClientError::Rejected { .. }) => {
                warn!(error = %err, "heartbeat rejected by manager, not counted as a transport failure");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Uploads a subjob's results artifact as multipart form data.
    pub async fn upload_result(&self, build_id: i64, subjob_id: i64, result_path: &Path, data: Value) -> Result<()> {
        let bytes = tokio::fs::read(result_path)
            .await
            .with_context(|_| error::ReadResultFileSnafu {
                path: result_path.display().to_string(),
            })?;
        let file_part = multipart::Part::bytes(bytes)
            .file_name("payload")
            .mime_str("application/x-compressed")
            .expect("static mime string always parses");
        let form = multipart::Form::new()
            .text("data", data.to_string())
            .part("file", file_part);

        let response = self
            .http
            .post(self.url(&format!("/build/{build_id}/subjob/{subjob_id}/result")))
            .multipart(form)
            .send()
            .await
            .context(error::TransportSnafu)?;
        ensure_success(response).await?;
        Ok(())
    }

    /// Unsigned GET used to probe whether the manager is currently
    /// reachable before sending a best-effort notification.
    pub async fn probe_responsive(&self) -> bool {
        self.http.get(self.url("/")).send().await.is_ok()
    }

    async fn put_signed(&self, path: &str, body: Vec<u8>) -> Result<()> {
        let mut request = self.http.put(self.url(path));
        if let Some(digest) = self.sign(&body) {
            request = request.header(digest::DIGEST_HEADER, digest);
        }
        let response = request
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .context(error::TransportSnafu)?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn post_signed(&self, path: &str, body: Vec<u8>) -> Result<()> {
        let mut request = self.http.post(self.url(path));
        if let Some(digest) = self.sign(&body) {
            request = request.header(digest::DIGEST_HEADER, digest);
        }
        let response = request
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .context(error::TransportSnafu)?;
        ensure_success(response).await?;
        Ok(())
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    error::RejectedSnafu { status, body }.fail()
}

/// Helper type used by callers composing the `data` field of a result
/// upload; kept generic instead of fixed-shape since the Core does not
/// otherwise need to depend on serde derive macros for it.
pub fn upload_data<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_composes_under_the_v1_prefix() {
        let client = ManagerClient::new("http://localhost:43000", 4, None);
        assert_eq!(client.url("/worker"), "http://localhost:43000/v1/worker");
    }

    #[test]
    fn trailing_slash_on_manager_url_is_tolerated() {
        let client = ManagerClient::new("http://localhost:43000/", 4, None);
        assert_eq!(client.url("/worker"), "http://localhost:43000/v1/worker");
    }

    #[test]
    fn no_signing_header_without_a_secret() {
        let client = ManagerClient::new("http://localhost:43000", 4, None);
        assert!(client.sign(b"body").is_none());
    }

    #[test]
    fn signing_header_present_with_a_secret() {
        let client = ManagerClient::new("http://localhost:43000", 4, Some("shh".to_string()));
        assert!(client.sign(b"body").is_some());
    }
}
