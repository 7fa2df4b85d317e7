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

use forge_worker_control_server::start_control_server;
use forge_worker_core::{ExecutorPool, SubjobExecutor, WorkerController, WorkerControllerOptions};
use forge_worker_executor::ShellSubjobExecutor;
use forge_worker_manager_client::ManagerClient;
use forge_worker_project_type::DefaultProjectTypeFactory;
use serde_json::json;

fn controller(num_executors: usize) -> Arc<WorkerController> {
    let executors: Vec<Arc<dyn SubjobExecutor>> = (0..num_executors)
        .map(|id| Arc::new(ShellSubjobExecutor::new(id, std::env::temp_dir())) as Arc<dyn SubjobExecutor>)
        .collect();
    let pool = Arc::new(ExecutorPool::new(executors));
    let manager_client = ManagerClient::new("http://127.0.0.1:1", num_executors, None);
    let factory = Arc::new(DefaultProjectTypeFactory::new(std::env::temp_dir()));
    let options = WorkerControllerOptions::builder().host("127.0.0.1".to_string()).port(0).build();
    WorkerController::new(options, pool, manager_client, factory)
}

async fn available_port() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

#[tokio::test]
async fn status_and_worker_and_metrics_endpoints_respond() {
    let port = available_port().await;
    let controller = controller(2);
    let mut handle = start_control_server("127.0.0.1", port, controller).await.unwrap();
    handle.wait_for_start().await;

    let client = reqwest::Client::new();
    let base = format!("http://127.0.0.1:{port}");

    let status = client.get(format!("{base}/status")).send().await.unwrap();
    assert_eq!(status.status(), 200);
    assert!(status.text().await.unwrap().contains(&port.to_string()));

    let worker = client.get(format!("{base}/v1/worker")).send().await.unwrap();
    assert_eq!(worker.status(), 200);
    let body: serde_json::Value = worker.json().await.unwrap();
    assert_eq!(body["executors"].as_array().unwrap().len(), 2);

    let metrics = client.get(format!("{base}/metrics")).send().await.unwrap();
    assert_eq!(metrics.status(), 200);

    handle.shutdown();
    handle.wait_for_stop().await;
}

#[tokio::test]
async fn setup_with_a_null_project_type_completes_and_then_subjob_and_teardown_work() {
    let port = available_port().await;
    let controller = controller(1);
    let mut handle = start_control_server("127.0.0.1", port, controller).await.unwrap();
    handle.wait_for_start().await;

    let client = reqwest::Client::new();
    let base = format!("http://127.0.0.1:{port}");

    let setup = client
        .post(format!("{base}/v1/setup"))
        .json(&json!({ "build_id": 42, "project_type_params": { "type": "unknown" }, "base_executor_index": 0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(setup.status(), 200);

    // Setup runs asynchronously; give the spawned task a moment to land.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let subjob = client
        .post(format!("{base}/v1/build/42/subjob/1"))
        .json(&json!({ "atomic_commands": ["echo hi"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(subjob.status(), 200);

    let teardown = client
        .post(format!("{base}/v1/teardown"))
        .json(&json!({ "build_id": 42 }))
        .send()
        .await
        .unwrap();
    assert_eq!(teardown.status(), 200);

    handle.shutdown();
    handle.wait_for_stop().await;
}

#[tokio::test]
async fn teardown_without_an_active_build_is_a_bad_request() {
    let port = available_port().await;
    let controller = controller(1);
    let mut handle = start_control_server("127.0.0.1", port, controller).await.unwrap();
    handle.wait_for_start().await;

    let client = reqwest::Client::new();
    let response = client
        .post(format!("http://127.0.0.1:{port}/v1/teardown"))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    handle.shutdown();
    handle.wait_for_stop().await;
}
