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

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use forge_worker_core::WorkerController;
use serde::Deserialize;
use serde_json::Value;

use crate::error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<WorkerController>,
    pub port: u16,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/worker", get(get_worker))
        .route("/v1/setup", post(post_setup))
        .route("/v1/teardown", post(post_teardown))
        .route("/v1/build/{build_id}/subjob/{subjob_id}", post(post_subjob))
        .route("/status", get(get_status))
        .route("/metrics", get(get_metrics))
        .with_state(state)
}

async fn get_worker(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.controller.api_representation())
}

async fn get_status(State(state): State<AppState>) -> String {
    format!("Worker service is up. <Port: {}>", state.port)
}

async fn get_metrics() -> String {
    forge_worker_core::metrics::render()
}

#[derive(Debug, Deserialize)]
struct SetupRequest {
    build_id: i64,
    #[serde(default)]
    project_type_params: Value,
    #[serde(default)]
    base_executor_index: i64,
}

async fn post_setup(State(state): State<AppState>, Json(request): Json<SetupRequest>) -> Result<(), ApiError> {
    state
        .controller
        .setup_build(request.build_id, request.project_type_params, request.base_executor_index)
        .await?;
    Ok(())
}

#[derive(Debug, Deserialize)]
struct TeardownRequest {
    #[serde(default)]
    build_id: Option<i64>,
}

async fn post_teardown(State(state): State<AppState>, Json(request): Json<TeardownRequest>) -> Result<(), ApiError> {
    state.controller.teardown_build(request.build_id).await?;
    Ok(())
}

#[derive(Debug, Deserialize)]
struct SubjobRequest {
    #[serde(default)]
    atomic_commands: Vec<String>,
}

async fn post_subjob(
    State(state): State<AppState>,
    Path((build_id, subjob_id)): Path<(i64, i64)>,
    Json(request): Json<SubjobRequest>,
) -> Result<Json<Value>, ApiError> {
    let executor_id = state
        .controller
        .start_subjob(build_id, subjob_id, request.atomic_commands)
        .await?;
    Ok(Json(serde_json::json!({ "executor_id": executor_id })))
}
