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

use std::{future::Future, pin::Pin, sync::Arc};

use once_cell::sync::OnceCell;
use tokio::{sync::Mutex, task::JoinHandle};
use tracing::error;

type TeardownCallback = Box<dyn Fn() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Process-wide registry of teardown callbacks, run in reverse registration
/// order on any fatal exit path.
///
/// There is exactly one [`Worker`](crate::controller::WorkerController) per
/// process, so a singleton is the natural fit: callers reach it through
/// [`global`] rather than threading a handle everywhere a panic could occur.
#[derive(Default)]
pub struct ShutdownCoordinator {
    callbacks: Mutex<Vec<TeardownCallback>>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a teardown callback. Callbacks run last-registered-first.
    pub async fn add_teardown_callback<F, Fut>(&self, callback: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let boxed: TeardownCallback = Box::new(move || Box::pin(callback()));
        self.callbacks.lock().await.push(boxed);
    }

    /// Runs every registered callback in reverse order. A panicking callback
    /// is caught and logged so later callbacks still run.
    pub async fn run_teardown(&self) {
        let mut callbacks = self.callbacks.lock().await;
        for callback in callbacks.drain(..).rev() {
            if let Err(join_err) = tokio::spawn(callback()).await {
                error!(error = ?join_err, "shutdown callback panicked");
            }
        }
    }
}

static GLOBAL: OnceCell<Arc<ShutdownCoordinator>> = OnceCell::new();

/// Returns the process-wide shutdown coordinator, creating it on first use.
pub fn global() -> Arc<ShutdownCoordinator> {
    GLOBAL
        .get_or_init(|| Arc::new(ShutdownCoordinator::new()))
        .clone()
}

/// Spawns `future` as a detached task, watched by a small supervisor task
/// that awaits its `JoinHandle`. A panic inside `future` is caught there and
/// routed into [`ShutdownCoordinator::run_teardown`] instead of vanishing
/// silently — this is how fire-and-forget tasks (build setup, subjob
/// execution, build teardown, the heartbeat loop) honor the Fatal error
/// taxonomy without each call site reimplementing the catch.
pub fn spawn_supervised<F>(future: F) -> JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let handle = tokio::spawn(future);
    tokio::spawn(async move {
        if let Err(join_err) = handle.await {
            error!(error = ?join_err, "spawned task panicked, escalating to shutdown coordinator");
            global().run_teardown().await;
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicBool, Ordering as AtomicOrdering},
        Arc, Mutex as StdMutex,
    };

    use super::*;

    #[tokio::test]
    async fn callbacks_run_in_reverse_order() {
        let coordinator = ShutdownCoordinator::new();
        let order = Arc::new(StdMutex::new(Vec::new()));

        for i in 0..3 {
            let order = order.clone();
            coordinator
                .add_teardown_callback(move || {
                    let order = order.clone();
                    async move {
                        order.lock().unwrap().push(i);
                    }
                })
                .await;
        }

        coordinator.run_teardown().await;
        assert_eq!(*order.lock().unwrap(), vec![2, 1, 0]);
    }

    #[tokio::test]
    async fn a_panicking_callback_does_not_block_the_rest() {
        let coordinator = ShutdownCoordinator::new();
        let order = Arc::new(StdMutex::new(Vec::new()));

        coordinator
            .add_teardown_callback(|| async { panic!("boom") })
            .await;
        let order_clone = order.clone();
        coordinator
            .add_teardown_callback(move || {
                let order = order_clone.clone();
                async move {
                    order.lock().unwrap().push(1);
                }
            })
            .await;

        coordinator.run_teardown().await;
        assert_eq!(*order.lock().unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn a_panicking_supervised_task_runs_the_global_teardown() {
        let ran = Arc::new(AtomicBool::new(false));
        let ran_clone = ran.clone();
        global()
            .add_teardown_callback(move || {
                let ran = ran_clone.clone();
                async move {
                    ran.store(true, AtomicOrdering::SeqCst);
                }
            })
            .await;

        let handle = spawn_supervised(async { panic!("boom") });
        handle.await.unwrap();

        assert!(ran.load(AtomicOrdering::SeqCst));
    }
}
