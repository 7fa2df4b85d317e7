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

mod config;

use std::{sync::Arc, time::Duration};

use clap::Parser;
use config::CliArgs;
use forge_worker_control_server::start_control_server;
use forge_worker_core::{shutdown, ExecutorPool, HeartbeatLoop, SubjobExecutor, WorkerController, WorkerControllerOptions};
use forge_worker_executor::ShellSubjobExecutor;
use forge_worker_manager_client::ManagerClient;
use forge_worker_project_type::DefaultProjectTypeFactory;
use forge_worker_runtime::RuntimeOptions;
use forge_worker_telemetry::{logging::init_global_logging, LoggingOptions};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

fn main() {
    let cli = CliArgs::parse();
    let config = cli.resolve().unwrap_or_else(|err| {
        eprintln!("configuration error: {err}");
        std::process::exit(1);
    });

    let runtime = RuntimeOptions::builder()
        .thread_name("forge-worker".to_string())
        .build()
        .create()
        .expect("failed to build the tokio runtime");

    runtime.block_on(run(config));
}

async fn run(config: config::AgentConfig) {
    let logging_opts = LoggingOptions {
        dir: config.log_dir.clone(),
        level: config.log_level.clone(),
        log_format: config.log_format,
        append_stdout: true,
    };
    let _guards = init_global_logging("forge-worker-agent", &logging_opts);

    let digest_secret = config.resolve_digest_secret().unwrap_or_else(|err| {
        error!(error = %err, "failed to resolve digest secret");
        std::process::exit(1);
    });

    info!(
        host = %config.host,
        port = config.port,
        num_executors = config.num_executors,
        manager_url = %config.manager_url,
        "starting worker agent"
    );

    let executors: Vec<Arc<dyn SubjobExecutor>> = (0..config.num_executors)
        .map(|id| Arc::new(ShellSubjobExecutor::new(id, config.workspaces_dir())) as Arc<dyn SubjobExecutor>)
        .collect();
    let pool = Arc::new(ExecutorPool::new(executors));

    let manager_client = ManagerClient::new(config.manager_url.clone(), config.num_executors, digest_secret);
    let project_type_factory = Arc::new(DefaultProjectTypeFactory::new(config.workspaces_dir()));

    let controller_options = WorkerControllerOptions::builder()
        .host(config.host.clone())
        .port(config.port)
        .build();
    let controller = WorkerController::new(controller_options, pool, manager_client.clone(), project_type_factory);

    if let Err(err) = controller.connect_to_manager(&config.manager_url).await {
        error!(error = %err, "failed to register with the manager");
        std::process::exit(1);
    }

    let heartbeat_cancel = CancellationToken::new();
    if let Some(worker_id) = controller.worker_id() {
        let heartbeat = HeartbeatLoop::new(
            worker_id,
            Duration::from_secs(config.heartbeat_interval_secs),
            config.heartbeat_failure_threshold,
        );
        let heartbeat_cancel_clone = heartbeat_cancel.clone();
        let controller_for_death = controller.clone();
        shutdown::spawn_supervised(async move {
            heartbeat
                .run(manager_client, heartbeat_cancel_clone, move || {
                    let controller = controller_for_death.clone();
                    shutdown::spawn_supervised(async move {
                        error!("heartbeat failure threshold reached, killing worker");
                        controller.kill().await;
                    });
                })
                .await;
        });
    }

    let mut server_handle = start_control_server(&config.host, config.port, controller.clone())
        .await
        .unwrap_or_else(|err| {
            error!(error = %err, "failed to bind the control endpoint");
            std::process::exit(1);
        });
    server_handle.wait_for_start().await;
    info!(host = %config.host, port = config.port, "control endpoint ready");

    shutdown_signal().await;
    info!("shutdown signal received");

    heartbeat_cancel.cancel();
    server_handle.shutdown();
    server_handle.wait_for_stop().await;
    shutdown::global().run_teardown().await;
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("received Ctrl+C"); },
        () = terminate => { info!("received SIGTERM"); },
    }
}
