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

use std::time::Duration;

use async_trait::async_trait;
use forge_worker_manager_client::{ManagerClient, ManagerClientError};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::metrics;

/// Narrow view of [`ManagerClient`] the heartbeat loop needs, so tests can
/// substitute a fake transport without spinning up HTTP plumbing.
#[async_trait]
pub trait HeartbeatTransport: Send + Sync {
    async fn heartbeat(&self, worker_id: i64) -> Result<(), ManagerClientError>;
}

#[async_trait]
impl HeartbeatTransport for ManagerClient {
    async fn heartbeat(&self, worker_id: i64) -> Result<(), ManagerClientError> {
        ManagerClient::heartbeat(self, worker_id).await
    }
}

/// Periodic outbound heartbeat with a bounded consecutive-failure counter.
///
/// Only transport-level faults count toward `failure_threshold` — an
/// HTTP-level rejection is already folded into `Ok(())` by
/// [`HeartbeatTransport::heartbeat`]'s implementation on `ManagerClient`.
pub struct HeartbeatLoop {
    worker_id: i64,
    interval: Duration,
    failure_threshold: u32,
    consecutive_failures: u32,
}

impl HeartbeatLoop {
    pub fn new(worker_id: i64, interval: Duration, failure_threshold: u32) -> Self {
        Self {
            worker_id,
            interval,
            failure_threshold,
            consecutive_failures: 0,
        }
    }

    /// Runs one heartbeat attempt. Returns `true` when the consecutive
    /// failure count has just reached the configured threshold, i.e. the
    /// caller should invoke `Kill()`.
    pub async fn tick(&mut self, transport: &dyn HeartbeatTransport) -> bool {
        match transport.heartbeat(self.worker_id).await {
            Ok(()) => {
                self.consecutive_failures = 0;
                metrics::HEARTBEAT_SUCCESSES.inc();
                false
            }
            Err(err) => {
                self.consecutive_failures += 1;
                metrics::HEARTBEAT_FAILURES.inc();
                info!(worker_id = self.worker_id, failures = self.consecutive_failures, error = %err, "heartbeat failed");
                self.consecutive_failures >= self.failure_threshold
            }
        }
    }

    /// Runs the loop until `cancel` fires or a heartbeat death is declared,
    /// invoking `on_death` exactly once in the latter case.
    pub async fn run(
        mut self,
        transport: impl HeartbeatTransport + 'static,
        cancel: CancellationToken,
        on_death: impl Fn() + Send + 'static,
    ) {
        loop {
            if self.tick(&transport).await {
                error!(
                    worker_id = self.worker_id,
                    threshold = self.failure_threshold,
                    "heartbeat failure threshold reached, killing worker"
                );
                on_death();
                return;
            }
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use forge_worker_manager_client::TransportSnafu;
    use snafu::ResultExt;

    use super::*;

    struct FlakyTransport {
        fail_first_n: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl HeartbeatTransport for FlakyTransport {
        async fn heartbeat(&self, _worker_id: i64) -> Result<(), ManagerClientError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_first_n {
                // An empty URL fails request-building without a real network
                // call; good enough to synthesize a transport-class fault.
                let source = reqwest::Client::new().get("").build().unwrap_err();
                return Err(source).context(TransportSnafu);
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn resets_counter_on_success() {
        let transport = FlakyTransport {
            fail_first_n: 2,
            calls: AtomicUsize::new(0),
        };
        let mut hb = HeartbeatLoop::new(1, Duration::from_millis(1), 3);
        assert!(!hb.tick(&transport).await);
        assert!(!hb.tick(&transport).await);
        assert!(!hb.tick(&transport).await);
        assert_eq!(hb.consecutive_failures, 0);
    }

    #[tokio::test]
    async fn reaches_threshold_after_consecutive_failures() {
        let transport = FlakyTransport {
            fail_first_n: 10,
            calls: AtomicUsize::new(0),
        };
        let mut hb = HeartbeatLoop::new(1, Duration::from_millis(1), 3);
        assert!(!hb.tick(&transport).await);
        assert!(!hb.tick(&transport).await);
        assert!(hb.tick(&transport).await);
    }

    #[tokio::test]
    async fn run_invokes_on_death_exactly_once() {
        let transport = FlakyTransport {
            fail_first_n: 100,
            calls: AtomicUsize::new(0),
        };
        let hb = HeartbeatLoop::new(1, Duration::from_millis(1), 2);
        let cancel = CancellationToken::new();
        let deaths = Arc::new(AtomicUsize::new(0));
        let deaths_clone = deaths.clone();
        hb.run(transport, cancel, move || {
            deaths_clone.fetch_add(1, Ordering::SeqCst);
        })
        .await;
        assert_eq!(deaths.load(Ordering::SeqCst), 1);
    }
}
