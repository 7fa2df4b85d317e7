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

use serde::Serialize;
use serde_json::Value;

use crate::{coin::SingleUseCoin, traits::ProjectType};

/// Per-build state, replaced wholesale on every `SetupBuild`.
pub struct BuildContext {
    pub build_id: i64,
    pub project_type: Arc<dyn ProjectType>,
    pub teardown_coin: SingleUseCoin,
    pub base_executor_index: i64,
}

impl BuildContext {
    pub fn new(build_id: i64, project_type: Arc<dyn ProjectType>, base_executor_index: i64) -> Self {
        Self {
            build_id,
            project_type,
            teardown_coin: SingleUseCoin::new(),
            base_executor_index,
        }
    }
}

/// JSON shape returned from `GET /v1/worker`.
#[derive(Serialize)]
pub struct WorkerApiRepresentation {
    pub is_alive: bool,
    pub manager_url: String,
    pub current_build_id: Option<i64>,
    pub worker_id: Option<i64>,
    pub executors: Vec<Value>,
    pub session_id: String,
}
