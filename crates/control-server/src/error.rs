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

use axum::{response::IntoResponse, Json};
use forge_worker_core::CoreError;
use forge_worker_error::{ErrorBody, ErrorExt};

/// Wraps [`CoreError`] so the handlers in this crate can return it directly
/// and have axum render it through the shared [`ErrorExt`] status mapping.
pub struct ApiError(pub CoreError);

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status_code = self.0.status_code();
        let body = ErrorBody {
            code: status_code,
            message: self.0.to_string(),
        };
        (status_code.http_status(), Json(body)).into_response()
    }
}
