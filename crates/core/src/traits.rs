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

use std::{path::PathBuf, time::Duration};

use async_trait::async_trait;
use serde_json::Value;

pub type AdapterError = Box<dyn std::error::Error + Send + Sync>;
pub type AdapterResult<T> = std::result::Result<T, AdapterError>;

/// A single executor slot capable of running one subjob's atomic commands.
///
/// Implementations own whatever per-executor working state they need
/// (working directory, child process handle, ...). `execute_subjob` is
/// called with exclusive ownership guaranteed by the [`ExecutorPool`];
/// callers never invoke it concurrently on the same executor.
///
/// [`ExecutorPool`]: crate::executor_pool::ExecutorPool
#[async_trait]
pub trait SubjobExecutor: Send + Sync {
    fn executor_id(&self) -> usize;

    /// Prepares this executor for a freshly-started build.
    async fn configure(&self, project_type_params: &Value) -> AdapterResult<()>;

    /// Runs `atomic_commands` in order, fail-fast, and returns a path to a
    /// results artifact (caller owns deleting it once uploaded).
    async fn execute_subjob(
        &self,
        build_id: i64,
        subjob_id: i64,
        atomic_commands: &[String],
        base_executor_index: i64,
    ) -> AdapterResult<PathBuf>;

    /// Terminates any in-flight command. Safe to call when idle.
    async fn kill(&self);

    /// JSON representation returned from `GET /v1/worker`.
    fn api_representation(&self) -> Value;
}

/// Constructs a [`ProjectType`] from the manager-supplied parameter bag sent
/// with `SetupBuild`. Kept separate from `ProjectType` itself so a fresh
/// instance is built per build without the controller knowing the concrete
/// adapter type.
pub trait ProjectTypeFactory: Send + Sync {
    fn create(&self, project_type_params: &Value) -> AdapterResult<std::sync::Arc<dyn ProjectType>>;
}

/// Opaque workspace abstraction: checkout, per-build setup, teardown.
#[async_trait]
pub trait ProjectType: Send + Sync {
    async fn fetch_project(&self) -> AdapterResult<()>;

    async fn run_job_config_setup(&self) -> AdapterResult<()>;

    async fn teardown_build(&self, timeout: Duration) -> AdapterResult<()>;

    /// Per-executor configuration hook, run once per executor during setup.
    async fn configure(
        &self,
        executor: &dyn SubjobExecutor,
        project_type_params: &Value,
    ) -> AdapterResult<()> {
        executor.configure(project_type_params).await
    }
}
