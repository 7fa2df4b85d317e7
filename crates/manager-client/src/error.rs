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

use snafu::Snafu;

/// Errors from outbound calls to the manager.
///
/// The `Transport` / `Rejected` split matters to callers: the heartbeat loop
/// counts only `Transport` failures toward its fail-fast threshold (§4.3).
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ManagerClientError {
    #[snafu(display("transport error contacting manager: {source}"))]
    Transport {
        source: reqwest::Error,
        #[snafu(implicit)]
        loc: snafu::Location,
    },

    #[snafu(display("manager rejected request with status {status}: {body}"))]
    Rejected {
        status: u16,
        body: String,
        #[snafu(implicit)]
        loc: snafu::Location,
    },

    #[snafu(display("failed to serialize request body: {source}"))]
    Serialization {
        source: serde_json::Error,
        #[snafu(implicit)]
        loc: snafu::Location,
    },

    #[snafu(display("failed to read result artifact {path}: {source}"))]
    ReadResultFile {
        path: String,
        source: std::io::Error,
        #[snafu(implicit)]
        loc: snafu::Location,
    },
}

impl ManagerClientError {
    /// True for connection/timeout-class failures, as opposed to the
    /// manager having answered with a non-2xx status.
    pub fn is_transport(&self) -> bool {
        matches!(self, ManagerClientError::Transport { .. })
    }
}

pub type Result<T> = std::result::Result<T, ManagerClientError>;
