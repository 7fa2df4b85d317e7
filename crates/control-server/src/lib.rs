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

//! Inbound HTTP surface the manager calls: setup, teardown, subjob
//! dispatch, worker status and Prometheus exposition.

mod error;
mod routes;

use std::sync::Arc;

use forge_worker_core::WorkerController;
use tokio::{sync::oneshot, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

pub use routes::AppState;

/// Handle for the running control server: cancel to begin graceful
/// shutdown, await `wait_for_stop` to know the listener has released its
/// socket.
pub struct ControlServerHandle {
    join_handle: JoinHandle<()>,
    cancellation_token: CancellationToken,
    started_rx: Option<oneshot::Receiver<()>>,
}

impl ControlServerHandle {
    pub async fn wait_for_start(&mut self) {
        if let Some(rx) = self.started_rx.take() {
            let _ = rx.await;
        }
    }

    pub async fn wait_for_stop(self) {
        let _ = self.join_handle.await;
    }

    pub fn shutdown(&self) {
        self.cancellation_token.cancel();
    }
}

/// Binds the control endpoint at `host:port` and serves it in the
/// background until `shutdown()` is called on the returned handle.
pub async fn start_control_server(
    host: &str,
    port: u16,
    controller: Arc<WorkerController>,
) -> std::io::Result<ControlServerHandle> {
    let state = AppState { controller, port };
    let router = routes::router(state).layer(
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    );

    let listener = tokio::net::TcpListener::bind((host, port)).await?;
    let bound_addr = listener.local_addr()?;

    let cancellation_token = CancellationToken::new();
    let (started_tx, started_rx) = oneshot::channel();
    let cancel_for_task = cancellation_token.clone();

    let join_handle = tokio::spawn(async move {
        let result = axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = started_tx.send(());
                info!(%bound_addr, "control server started");
                cancel_for_task.cancelled().await;
                info!(%bound_addr, "control server received shutdown signal");
            })
            .await;
        if let Err(err) = result {
            tracing::error!(error = %err, "control server task ended with an error");
        }
    });

    Ok(ControlServerHandle {
        join_handle,
        cancellation_token,
        started_rx: Some(started_rx),
    })
}
