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
    path::PathBuf,
    process::Stdio,
    sync::atomic::{AtomicU32, Ordering},
};

use async_trait::async_trait;
use forge_worker_core::{AdapterError, AdapterResult, CommandRecord, SubjobExecutor};
use serde_json::{json, Value};
use tokio::{process::Command, sync::Mutex as AsyncMutex};
use tracing::{info, warn};

/// Default `SubjobExecutor`: runs each atomic command with
/// `tokio::process::Command`, fails fast on the first non-zero exit, and
/// writes a zstd-compressed JSON archive of the command records as the
/// results artifact.
pub struct ShellSubjobExecutor {
    id: usize,
    workdir: AsyncMutex<PathBuf>,
    current_pid: AtomicU32,
}

impl ShellSubjobExecutor {
    pub fn new(id: usize, default_workdir: PathBuf) -> Self {
        Self {
            id,
            workdir: AsyncMutex::new(default_workdir),
            current_pid: AtomicU32::new(0),
        }
    }

    async fn run_one(&self, command: &str, cwd: &std::path::Path) -> AdapterResult<CommandRecord> {
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(cwd)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| -> AdapterError { Box::new(err) })?;

        if let Some(pid) = child.id() {
            self.current_pid.store(pid, Ordering::SeqCst);
        }
        let output = child
            .wait_with_output()
            .await
            .map_err(|err| -> AdapterError { Box::new(err) })?;
        self.current_pid.store(0, Ordering::SeqCst);

        Ok(CommandRecord {
            command: command.to_string(),
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[async_trait]
impl SubjobExecutor for ShellSubjobExecutor {
    fn executor_id(&self) -> usize {
        self.id
    }

    async fn configure(&self, project_type_params: &Value) -> AdapterResult<()> {
        if let Some(workdir) = project_type_params.get("workdir").and_then(Value::as_str) {
            let dir = PathBuf::from(workdir).join(format!("executor-{}", self.id));
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|err| -> AdapterError { Box::new(err) })?;
            *self.workdir.lock().await = dir;
        }
        Ok(())
    }

    async fn execute_subjob(
        &self,
        build_id: i64,
        subjob_id: i64,
        atomic_commands: &[String],
        _base_executor_index: i64,
    ) -> AdapterResult<PathBuf> {
        let cwd = self.workdir.lock().await.clone();
        let mut records = Vec::with_capacity(atomic_commands.len());
        let mut failed = false;

        for command in atomic_commands {
            let record = self.run_one(command, &cwd).await?;
            failed = record.exit_code != 0;
            let is_failure = failed;
            records.push(record);
            if is_failure {
                break;
            }
        }

        let payload = json!({
            "build_id": build_id,
            "subjob_id": subjob_id,
            "executor_id": self.id,
            "failed": failed,
            "commands": records,
        });
        let json_bytes = serde_json::to_vec(&payload).map_err(|err| -> AdapterError { Box::new(err) })?;
        let compressed = zstd::encode_all(json_bytes.as_slice(), 0).map_err(|err| -> AdapterError { Box::new(err) })?;

        let results_path = std::env::temp_dir().join(format!(
            "forge-worker-subjob-{build_id}-{subjob_id}-{}.zst",
            uuid::Uuid::new_v4()
        ));
        tokio::fs::write(&results_path, compressed)
            .await
            .map_err(|err| -> AdapterError { Box::new(err) })?;

        info!(build_id, subjob_id, executor_id = self.id, failed, "subjob results archived");
        Ok(results_path)
    }

    async fn kill(&self) {
        let pid = self.current_pid.swap(0, Ordering::SeqCst);
        if pid == 0 {
            return;
        }
        if let Err(err) = Command::new("kill").args(["-9", &pid.to_string()]).status().await {
            warn!(executor_id = self.id, pid, error = %err, "failed to signal in-flight command");
        }
    }

    fn api_representation(&self) -> Value {
        json!({ "executor_id": self.id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn executes_commands_and_produces_a_compressed_archive() {
        let tmp = tempfile::tempdir().unwrap();
        let executor = ShellSubjobExecutor::new(0, tmp.path().to_path_buf());
        let commands = vec!["echo hello".to_string()];
        let path = executor.execute_subjob(1, 2, &commands, 0).await.unwrap();
        assert!(path.exists());
        let bytes = tokio::fs::read(&path).await.unwrap();
        let decompressed = zstd::decode_all(bytes.as_slice()).unwrap();
        let value: Value = serde_json::from_slice(&decompressed).unwrap();
        assert_eq!(value["failed"], false);
        tokio::fs::remove_file(path).await.unwrap();
    }

    #[tokio::test]
    async fn stops_after_the_first_failing_command() {
        let tmp = tempfile::tempdir().unwrap();
        let executor = ShellSubjobExecutor::new(0, tmp.path().to_path_buf());
        let commands = vec!["exit 3".to_string(), "echo never".to_string()];
        let path = executor.execute_subjob(1, 2, &commands, 0).await.unwrap();
        let bytes = tokio::fs::read(&path).await.unwrap();
        let decompressed = zstd::decode_all(bytes.as_slice()).unwrap();
        let value: Value = serde_json::from_slice(&decompressed).unwrap();
        assert_eq!(value["failed"], true);
        assert_eq!(value["commands"].as_array().unwrap().len(), 1);
        tokio::fs::remove_file(path).await.unwrap();
    }

    #[tokio::test]
    async fn kill_without_an_in_flight_command_is_a_no_op() {
        let executor = ShellSubjobExecutor::new(0, std::env::temp_dir());
        executor.kill().await;
    }
}
