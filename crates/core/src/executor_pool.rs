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

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use tokio::sync::Mutex as AsyncMutex;
use tokio::sync::mpsc;

use crate::{metrics, traits::SubjobExecutor};

/// A fixed-size pool of `num_executors` executors with blocking take/put
/// admission control.
///
/// Backed by a bounded `mpsc` channel: `Acquire` is a channel receive (blocks
/// when the idle set is empty), `Release` is a channel send. `idle` tracks
/// the channel's current occupancy since `Receiver` exposes no `len()`.
pub struct ExecutorPool {
    all: Vec<Arc<dyn SubjobExecutor>>,
    idle_tx: mpsc::Sender<Arc<dyn SubjobExecutor>>,
    idle_rx: AsyncMutex<mpsc::Receiver<Arc<dyn SubjobExecutor>>>,
    idle: AtomicUsize,
    capacity: usize,
}

impl ExecutorPool {
    pub fn new(executors: Vec<Arc<dyn SubjobExecutor>>) -> Self {
        let capacity = executors.len();
        let (idle_tx, idle_rx) = mpsc::channel(capacity.max(1));
        for executor in &executors {
            idle_tx
                .try_send(executor.clone())
                .expect("pool channel capacity equals executor count");
        }
        Self {
            all: executors,
            idle_tx,
            idle_rx: AsyncMutex::new(idle_rx),
            idle: AtomicUsize::new(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Removes one executor from the idle set, blocking when none are idle.
    pub async fn acquire(&self) -> Arc<dyn SubjobExecutor> {
        let executor = {
            let mut rx = self.idle_rx.lock().await;
            rx.recv()
                .await
                .expect("sender is held by self and never dropped while pool is alive")
        };
        self.idle.fetch_sub(1, Ordering::SeqCst);
        metrics::EXECUTOR_ACQUIRES.inc();
        metrics::EXECUTORS_IN_FLIGHT.inc();
        executor
    }

    /// Returns a previously-acquired executor to the idle set.
    pub async fn release(&self, executor: Arc<dyn SubjobExecutor>) {
        self.idle_tx
            .send(executor)
            .await
            .expect("pool channel outlives every acquired handle");
        self.idle.fetch_add(1, Ordering::SeqCst);
        metrics::EXECUTOR_RELEASES.inc();
        metrics::EXECUTORS_IN_FLIGHT.dec();
    }

    /// True when every executor is idle.
    pub fn is_full(&self) -> bool {
        self.idle.load(Ordering::SeqCst) == self.capacity
    }

    /// Iterates every executor regardless of idle state, e.g. for `KillAll`.
    pub fn for_each(&self) -> impl Iterator<Item = &Arc<dyn SubjobExecutor>> {
        self.all.iter()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::{json, Value};

    use super::*;
    use crate::traits::AdapterResult;

    struct FakeExecutor {
        id: usize,
    }

    #[async_trait]
    impl SubjobExecutor for FakeExecutor {
        fn executor_id(&self) -> usize {
            self.id
        }

        async fn configure(&self, _project_type_params: &Value) -> AdapterResult<()> {
            Ok(())
        }

        async fn execute_subjob(
            &self,
            _build_id: i64,
            _subjob_id: i64,
            _atomic_commands: &[String],
            _base_executor_index: i64,
        ) -> AdapterResult<std::path::PathBuf> {
            Ok(std::path::PathBuf::from("/tmp/fake"))
        }

        async fn kill(&self) {}

        fn api_representation(&self) -> Value {
            json!({ "executor_id": self.id })
        }
    }

    fn pool(n: usize) -> ExecutorPool {
        let executors: Vec<Arc<dyn SubjobExecutor>> = (0..n)
            .map(|id| Arc::new(FakeExecutor { id }) as Arc<dyn SubjobExecutor>)
            .collect();
        ExecutorPool::new(executors)
    }

    #[tokio::test]
    async fn starts_full_and_drains_on_acquire() {
        let pool = pool(2);
        assert!(pool.is_full());
        let a = pool.acquire().await;
        assert!(!pool.is_full());
        pool.release(a).await;
        assert!(pool.is_full());
    }

    #[tokio::test]
    async fn acquire_blocks_until_release() {
        let pool = Arc::new(pool(1));
        let first = pool.acquire().await;
        assert!(!pool.is_full());

        let pool2 = pool.clone();
        let waiter = tokio::spawn(async move { pool2.acquire().await });

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        pool.release(first).await;
        let second = tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .expect("waiter should resolve once released")
            .unwrap();
        assert_eq!(second.executor_id(), 0);
    }

    #[tokio::test]
    async fn for_each_sees_every_executor_regardless_of_idle_state() {
        let pool = pool(3);
        let _acquired = pool.acquire().await;
        assert_eq!(pool.for_each().count(), 3);
    }
}
