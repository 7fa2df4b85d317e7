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

use std::path::Path;

use serde::Serialize;
use tokio::process::Command;

use crate::traits::{AdapterError, AdapterResult};

/// Outcome of one atomic command, captured for the results artifact.
#[derive(Debug, Clone, Serialize)]
pub struct CommandRecord {
    pub command: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Runs `commands` in order inside `working_dir`, stopping at the first
/// non-zero exit (mirrors shell `set -e`). Shared between the default
/// `SubjobExecutor` and the default `ProjectType`'s job-config setup so both
/// adapters fail fast the same way.
pub async fn run_atomic_commands(commands: &[String], working_dir: &Path) -> AdapterResult<Vec<CommandRecord>> {
    let mut records = Vec::with_capacity(commands.len());
    for command in commands {
        let output = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(working_dir)
            .output()
            .await
            .map_err(|err| -> AdapterError { Box::new(err) })?;

        let exit_code = output.status.code().unwrap_or(-1);
        records.push(CommandRecord {
            command: command.clone(),
            exit_code,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });

        if exit_code != 0 {
            return Err(format!("command `{command}` exited with status {exit_code}").into());
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn runs_commands_in_order_and_captures_output() {
        let dir = std::env::temp_dir();
        let records = run_atomic_commands(&["echo one".to_string(), "echo two".to_string()], &dir)
            .await
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].stdout.trim(), "one");
        assert_eq!(records[1].stdout.trim(), "two");
        assert_eq!(records[0].exit_code, 0);
    }

    #[tokio::test]
    async fn fails_fast_on_first_non_zero_exit() {
        let dir = std::env::temp_dir();
        let result = run_atomic_commands(
            &[
                "echo first".to_string(),
                "exit 7".to_string(),
                "echo never".to_string(),
            ],
            &dir,
        )
        .await;
        assert!(result.is_err());
    }
}
