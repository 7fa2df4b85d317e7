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

use lazy_static::lazy_static;
use prometheus::{IntCounter, IntGauge, register_int_counter, register_int_gauge};

lazy_static! {
    pub static ref EXECUTOR_ACQUIRES: IntCounter = register_int_counter!(
        "forge_worker_executor_acquires_total",
        "Number of executors handed out of the pool"
    )
    .unwrap();
    pub static ref EXECUTOR_RELEASES: IntCounter = register_int_counter!(
        "forge_worker_executor_releases_total",
        "Number of executors returned to the pool"
    )
    .unwrap();
    pub static ref EXECUTORS_IN_FLIGHT: IntGauge = register_int_gauge!(
        "forge_worker_executors_in_flight",
        "Executors currently claimed by an in-flight subjob"
    )
    .unwrap();
    pub static ref HEARTBEAT_SUCCESSES: IntCounter = register_int_counter!(
        "forge_worker_heartbeat_successes_total",
        "Heartbeats the manager acknowledged"
    )
    .unwrap();
    pub static ref HEARTBEAT_FAILURES: IntCounter = register_int_counter!(
        "forge_worker_heartbeat_failures_total",
        "Heartbeats that failed at the transport level"
    )
    .unwrap();
    pub static ref SUBJOBS_STARTED: IntCounter = register_int_counter!(
        "forge_worker_subjobs_started_total",
        "Subjobs admitted by the lifecycle controller"
    )
    .unwrap();
    pub static ref SUBJOBS_FINISHED: IntCounter = register_int_counter!(
        "forge_worker_subjobs_finished_total",
        "Subjobs whose executor finished and was released"
    )
    .unwrap();
}

/// Renders all registered metrics in Prometheus text exposition format.
pub fn render() -> String {
    use prometheus::{Encoder, TextEncoder};

    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    encoder.encode(&metric_families, &mut buffer).ok();
    String::from_utf8(buffer).unwrap_or_default()
}
