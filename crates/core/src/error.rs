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

use std::any::Any;

use forge_worker_error::{ErrorExt, StatusCode};
use snafu::Snafu;

/// Errors raised by the lifecycle controller and its collaborators.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum CoreError {
    /// The manager sent a request inconsistent with the current worker state.
    #[snafu(display("bad request: {message}"))]
    BadRequest {
        message: String,
        #[snafu(implicit)]
        loc: snafu::Location,
    },

    /// An internal invariant was violated, indicating a manager-side protocol
    /// bug (e.g. setup requested while the executor pool is not full).
    #[snafu(display("invalid state: {message}"))]
    InvalidState {
        message: String,
        #[snafu(implicit)]
        loc: snafu::Location,
    },

    /// The project type failed to prepare the build during setup.
    #[snafu(display("setup failed: {source}"))]
    SetupFailure {
        source: Box<dyn std::error::Error + Send + Sync>,
        #[snafu(implicit)]
        loc: snafu::Location,
    },

    /// Any other unexpected failure.
    #[snafu(display("internal error: {message}"))]
    Internal {
        message: String,
        #[snafu(implicit)]
        loc: snafu::Location,
    },
}

impl ErrorExt for CoreError {
    fn status_code(&self) -> StatusCode {
        match self {
            CoreError::BadRequest { .. } => StatusCode::BadRequest,
            CoreError::InvalidState { .. } => StatusCode::InvalidState,
            CoreError::SetupFailure { .. } => StatusCode::InvalidState,
            CoreError::Internal { .. } => StatusCode::Internal,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
