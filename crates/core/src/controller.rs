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

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use bon::Builder;
use forge_worker_manager_client::ManagerClient;
use once_cell::sync::OnceCell;
use serde_json::Value;
use snafu::ResultExt;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    error::{self, Result},
    executor_pool::ExecutorPool,
    metrics,
    model::{BuildContext, WorkerApiRepresentation},
    shutdown,
    state::WorkerState,
    traits::ProjectTypeFactory,
};

const DEFAULT_MANAGER_URL: &str = "localhost:43000";
const TEARDOWN_POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Timeout applied to the project teardown reached via an ordinary,
/// manager-triggered `TeardownBuild`. Generous rather than unbounded, since
/// `tokio::time::timeout` needs a concrete bound, but long enough that a
/// slow-disk checkout removal is never force-abandoned in the common case.
const BUILD_TEARDOWN_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);
/// Timeout applied only to the teardown reached via the Shutdown
/// Coordinator's own teardown callback (process exit path), where bounding
/// the wait actually matters.
const SHUTDOWN_TEARDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Construction-time options for [`WorkerController`].
#[derive(Debug, Clone, Builder)]
pub struct WorkerControllerOptions {
    pub host: String,
    pub port: u16,
}

/// Owns the worker state machine and serializes all build-scoped work.
///
/// `current_build` is the "current-build group" called out in the
/// concurrency model: it is guarded by a single async mutex so setup and
/// teardown, which both read and mutate it, never interleave even though
/// each runs as its own spawned task.
pub struct WorkerController {
    host: String,
    port: u16,
    session_id: String,
    worker_id: OnceCell<i64>,
    is_alive: AtomicBool,
    manager_url: AsyncMutex<String>,
    current_build: AsyncMutex<Option<Arc<BuildContext>>>,
    pool: Arc<ExecutorPool>,
    manager_client: ManagerClient,
    project_type_factory: Arc<dyn ProjectTypeFactory>,
}

impl WorkerController {
    pub fn new(
        options: WorkerControllerOptions,
        pool: Arc<ExecutorPool>,
        manager_client: ManagerClient,
        project_type_factory: Arc<dyn ProjectTypeFactory>,
    ) -> Arc<Self> {
        Arc::new(Self {
            host: options.host,
            port: options.port,
            session_id: Uuid::new_v4().to_string(),
            worker_id: OnceCell::new(),
            is_alive: AtomicBool::new(false),
            manager_url: AsyncMutex::new(String::new()),
            current_build: AsyncMutex::new(None),
            pool,
            manager_client,
            project_type_factory,
        })
    }

    pub fn worker_id(&self) -> Option<i64> {
        self.worker_id.get().copied()
    }

    /// Idempotent-per-process registration with the manager. Registers the
    /// shutdown callbacks that wire disconnect-before-teardown into any
    /// fatal exit path.
    pub async fn connect_to_manager(self: &Arc<Self>, manager_url: &str) -> Result<i64> {
        let manager_url = if manager_url.is_empty() {
            DEFAULT_MANAGER_URL
        } else {
            manager_url
        };
        *self.manager_url.lock().await = manager_url.to_string();
        self.is_alive.store(true, Ordering::SeqCst);

        if let Some(worker_id) = self.worker_id.get() {
            return Ok(*worker_id);
        }

        let worker_id = self
            .manager_client
            .register(&self.host, self.port, self.pool.capacity(), &self.session_id)
            .await
            .map_err(|source| {
                error::InternalSnafu {
                    message: format!("registration failed: {source}"),
                }
                .build()
            })?;
        self.worker_id
            .set(worker_id)
            .expect("worker_id is assigned exactly once per process lifetime");
        info!(worker_id, %manager_url, "registered with manager");

        // Reverse registration order means disconnect runs before local
        // build teardown on any fatal exit path (O3).
        let teardown_self = self.clone();
        shutdown::global()
            .add_teardown_callback(move || {
                let this = teardown_self.clone();
                async move {
                    if let Err(err) = this.do_build_teardown_and_reset(Some(SHUTDOWN_TEARDOWN_TIMEOUT)).await {
                        error!(error = %err, "build teardown failed during shutdown");
                    }
                    // No follow-up notification here regardless of the
                    // return value: disconnect_from_manager is the
                    // notification that matters on the shutdown path, and it
                    // runs as its own, separately-registered callback.
                }
            })
            .await;

        let disconnect_self = self.clone();
        shutdown::global()
            .add_teardown_callback(move || {
                let this = disconnect_self.clone();
                async move { this.disconnect_from_manager().await }
            })
            .await;

        Ok(worker_id)
    }

    /// Schedules an asynchronous build setup. Returns once the build context
    /// has been created and admission preconditions verified.
    pub async fn setup_build(
        self: &Arc<Self>,
        build_id: i64,
        project_type_params: Value,
        base_executor_index: i64,
    ) -> Result<()> {
        let mut current_build = self.current_build.lock().await;
        if current_build.is_some() {
            return error::InvalidStateSnafu {
                message: "setup requested while a build is already active".to_string(),
            }
            .fail();
        }
        if !self.pool.is_full() {
            return error::InvalidStateSnafu {
                message: "setup requested while the executor pool is not full".to_string(),
            }
            .fail();
        }

        let project_type = self
            .project_type_factory
            .create(&project_type_params)
            .context(error::SetupFailureSnafu)?;

        let context = Arc::new(BuildContext::new(build_id, project_type, base_executor_index));
        *current_build = Some(context.clone());
        drop(current_build);

        let this = self.clone();
        let params = project_type_params;
        shutdown::spawn_supervised(async move {
            this.run_setup(context, params).await;
        });

        Ok(())
    }

    async fn run_setup(self: Arc<Self>, context: Arc<BuildContext>, project_type_params: Value) {
        let result: std::result::Result<(), crate::traits::AdapterError> = async {
            context.project_type.fetch_project().await?;
            for executor in self.pool.for_each() {
                context
                    .project_type
                    .configure(executor.as_ref(), &project_type_params)
                    .await?;
            }
            context.project_type.run_job_config_setup().await?;
            Ok(())
        }
        .await;

        match result {
            Ok(()) => {
                info!(build_id = context.build_id, "build setup completed");
                self.notify_state_fatal_on_failure(WorkerState::SetupCompleted).await;
            }
            Err(err) => {
                error!(build_id = context.build_id, error = %err, "build setup failed");
                self.notify_state_fatal_on_failure(WorkerState::SetupFailed).await;
            }
        }
    }

    /// Admits a subjob: acquires an executor (blocking the caller if none
    /// are idle) and returns its id once claimed. The rest of the subjob
    /// runs in a detached task.
    pub async fn start_subjob(self: &Arc<Self>, build_id: i64, subjob_id: i64, atomic_commands: Vec<String>) -> Result<i64> {
        let context = {
            let current_build = self.current_build.lock().await;
            match current_build.as_ref() {
                Some(context) if context.build_id == build_id => context.clone(),
                _ => {
                    return error::BadRequestSnafu {
                        message: format!("no active build matches build_id {build_id}"),
                    }
                    .fail();
                }
            }
        };

        let executor = self.pool.acquire().await;
        let executor_id = executor.executor_id() as i64;
        metrics::SUBJOBS_STARTED.inc();

        let this = self.clone();
        shutdown::spawn_supervised(async move {
            info!(build_id, subjob_id, executor_id, "subjob execution start");
            let outcome = executor
                .execute_subjob(build_id, subjob_id, &atomic_commands, context.base_executor_index)
                .await;
            info!(build_id, subjob_id, executor_id, "subjob execution finish");

            this.pool.release(executor).await;
            metrics::SUBJOBS_FINISHED.inc();

            match outcome {
                Ok(results_path) => {
                    let data = serde_json::json!({ "executor_id": executor_id });
                    if let Err(err) = this
                        .manager_client
                        .upload_result(build_id, subjob_id, &results_path, data)
                        .await
                    {
                        error!(build_id, subjob_id, error = %err, "result upload failed, not retrying");
                    }
                }
                Err(err) => {
                    error!(build_id, subjob_id, error = %err, "subjob execution failed");
                }
            }
        });

        Ok(executor_id)
    }

    /// Schedules teardown: kills executors, tears down the project,
    /// resets build state, waits for the pool to refill, then notifies
    /// `IDLE`.
    pub async fn teardown_build(self: &Arc<Self>, build_id: Option<i64>) -> Result<()> {
        {
            let current_build = self.current_build.lock().await;
            match current_build.as_ref() {
                None => {
                    return error::BadRequestSnafu {
                        message: "teardown requested with no active build".to_string(),
                    }
                    .fail();
                }
                Some(context) => {
                    if let Some(build_id) = build_id {
                        if build_id != context.build_id {
                            return error::BadRequestSnafu {
                                message: format!(
                                    "teardown for build {build_id} does not match active build {}",
                                    context.build_id
                                ),
                            }
                            .fail();
                        }
                    }
                }
            }
        }

        let this = self.clone();
        shutdown::spawn_supervised(async move {
            match this.do_build_teardown_and_reset(None).await {
                Ok(true) => {
                    // Only the call that actually performed the teardown
                    // waits for the pool to refill and sends the single
                    // IDLE notification; a racing call that found the coin
                    // already spent has nothing further to do.
                    let mut interval = tokio::time::interval(TEARDOWN_POLL_INTERVAL);
                    while !this.pool.is_full() {
                        interval.tick().await;
                    }
                    this.notify_idle_or_disconnect(WorkerState::Idle).await;
                }
                Ok(false) => {
                    info!("build teardown already performed by a concurrent call");
                }
                Err(err) => {
                    error!(error = %err, "build teardown failed");
                }
            }
        });

        Ok(())
    }

    /// Idempotent via the build context's single-use teardown coin: kills
    /// every executor unconditionally, then spends the coin to gate the
    /// (at-most-once) project teardown and state reset. Returns `true` only
    /// for the call that won the coin and actually performed the teardown —
    /// callers use this to decide whether they, specifically, are
    /// responsible for any follow-up notification.
    pub async fn do_build_teardown_and_reset(&self, timeout: Option<Duration>) -> Result<bool> {
        for executor in self.pool.for_each() {
            executor.kill().await;
        }

        let context = {
            let current_build = self.current_build.lock().await;
            current_build.clone()
        };
        let Some(context) = context else {
            return Ok(false);
        };
        if !context.teardown_coin.spend() {
            return Ok(false);
        }

        if let Err(source) = context
            .project_type
            .teardown_build(timeout.unwrap_or(BUILD_TEARDOWN_TIMEOUT))
            .await
        {
            error!(build_id = context.build_id, error = %source, "project teardown failed");
        }

        *self.current_build.lock().await = None;
        Ok(true)
    }

    /// Marks the worker dead and, if the manager is reachable, reports
    /// `DISCONNECTED`. Silently returns otherwise.
    pub async fn disconnect_from_manager(&self) {
        self.is_alive.store(false, Ordering::SeqCst);
        self.notify_idle_or_disconnect(WorkerState::Disconnected).await;
    }

    /// Runs shutdown callbacks and exits the process with success status.
    pub async fn kill(&self) -> ! {
        shutdown::global().run_teardown().await;
        std::process::exit(0);
    }

    pub fn api_representation(&self) -> WorkerApiRepresentation {
        WorkerApiRepresentation {
            is_alive: self.is_alive.load(Ordering::SeqCst),
            manager_url: self
                .manager_url
                .try_lock()
                .map(|guard| guard.clone())
                .unwrap_or_default(),
            current_build_id: self
                .current_build
                .try_lock()
                .ok()
                .and_then(|guard| guard.as_ref().map(|context| context.build_id)),
            worker_id: self.worker_id.get().copied(),
            executors: self.pool.for_each().map(|e| e.api_representation()).collect(),
            session_id: self.session_id.clone(),
        }
    }

    async fn notify_state_fatal_on_failure(&self, state: WorkerState) {
        let Some(worker_id) = self.worker_id.get().copied() else {
            warn!("cannot notify state before registration");
            return;
        };
        if let Err(err) = self.manager_client.notify_state(worker_id, state.as_str()).await {
            error!(%state, error = %err, "state-change notification failed, escalating");
            self.kill().await;
        }
    }

    async fn notify_idle_or_disconnect(&self, state: WorkerState) {
        let Some(worker_id) = self.worker_id.get().copied() else {
            return;
        };
        if !self.manager_client.probe_responsive().await {
            warn!(%state, "manager unresponsive, skipping notification");
            return;
        }
        if let Err(err) = self.manager_client.notify_state(worker_id, state.as_str()).await {
            warn!(%state, error = %err, "notification failed, skipping silently");
        }
    }
}
