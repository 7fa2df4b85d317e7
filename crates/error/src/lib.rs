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

//! Shared error taxonomy for the worker agent.
//!
//! Every crate in this workspace maps its errors onto [`StatusCode`] so the
//! control endpoint can translate them into HTTP responses uniformly instead
//! of each handler inventing its own status mapping.

use std::{any::Any, error::Error as StdError};

use http::StatusCode as HttpStatusCode;
use serde::Serialize;
use strum::EnumProperty;

/// Coarse error classification shared across the agent (§7 of the design).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, strum::EnumProperty, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StatusCode {
    /// Manager sent a request inconsistent with worker state.
    #[strum(props(http_status = "400"))]
    BadRequest,
    /// Internal invariant violation (manager-side protocol bug).
    #[strum(props(http_status = "409"))]
    InvalidState,
    /// Resource referenced by the request does not exist.
    #[strum(props(http_status = "404"))]
    NotFound,
    #[strum(props(http_status = "500"))]
    Internal,
}

impl StatusCode {
    pub fn http_status(self) -> HttpStatusCode {
        self.get_str("http_status")
            .and_then(|value| value.parse::<u16>().ok())
            .and_then(|value| HttpStatusCode::from_u16(value).ok())
            .unwrap_or(HttpStatusCode::INTERNAL_SERVER_ERROR)
    }
}

/// Implemented by every crate-local error enum so it can be rendered as a
/// uniform API error body.
pub trait ErrorExt: StdError {
    fn status_code(&self) -> StatusCode;

    fn as_any(&self) -> &dyn Any;
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: StatusCode,
    pub message: String,
}
