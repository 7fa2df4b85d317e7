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

use std::{path::PathBuf, time::Duration};

use async_trait::async_trait;
use forge_worker_core::{run_atomic_commands, AdapterError, AdapterResult, ProjectType};
use tokio::process::Command;
use tracing::info;

/// `git`-backed default `ProjectType`: shallow-clones the build's repository
/// into a build-scoped directory and tears it down by deleting it.
pub struct GitProjectType {
    build_dir: PathBuf,
    repo_url: String,
    setup_commands: Vec<String>,
}

impl GitProjectType {
    pub fn new(build_dir: PathBuf, repo_url: String, setup_commands: Vec<String>) -> Self {
        Self {
            build_dir,
            repo_url,
            setup_commands,
        }
    }
}

#[async_trait]
impl ProjectType for GitProjectType {
    async fn fetch_project(&self) -> AdapterResult<()> {
        if self.build_dir.join(".git").exists() {
            info!(dir = %self.build_dir.display(), "workspace already checked out, fetching");
            run_git(&["fetch", "--depth", "1", "origin"], &self.build_dir).await?;
            run_git(&["checkout", "FETCH_HEAD"], &self.build_dir).await?;
            return Ok(());
        }

        tokio::fs::create_dir_all(&self.build_dir)
            .await
            .map_err(|err| -> AdapterError { Box::new(err) })?;
        info!(dir = %self.build_dir.display(), url = %self.repo_url, "cloning workspace");
        let status = Command::new("git")
            .args(["clone", "--depth", "1", &self.repo_url])
            .arg(&self.build_dir)
            .status()
            .await
            .map_err(|err| -> AdapterError { Box::new(err) })?;
        if !status.success() {
            return Err(format!("git clone into {} failed: {status}", self.build_dir.display()).into());
        }
        Ok(())
    }

    async fn run_job_config_setup(&self) -> AdapterResult<()> {
        if self.setup_commands.is_empty() {
            return Ok(());
        }
        run_atomic_commands(&self.setup_commands, &self.build_dir).await?;
        Ok(())
    }

    async fn teardown_build(&self, timeout: Duration) -> AdapterResult<()> {
        let dir = self.build_dir.clone();
        tokio::time::timeout(timeout, tokio::fs::remove_dir_all(dir))
            .await
            .map_err(|_| -> AdapterError {
                format!("teardown of {} did not finish within {timeout:?}", self.build_dir.display()).into()
            })?
            .or_else(|err| {
                if err.kind() == std::io::ErrorKind::NotFound {
                    Ok(())
                } else {
                    Err(Box::new(err) as AdapterError)
                }
            })
    }
}

async fn run_git(args: &[&str], cwd: &std::path::Path) -> AdapterResult<()> {
    let status = Command::new("git")
        .args(args)
        .current_dir(cwd)
        .status()
        .await
        .map_err(|err| -> AdapterError { Box::new(err) })?;
    if !status.success() {
        return Err(format!("git {args:?} in {} failed: {status}", cwd.display()).into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn teardown_removes_the_build_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let build_dir = tmp.path().join("build-42");
        tokio::fs::create_dir_all(&build_dir).await.unwrap();
        tokio::fs::write(build_dir.join("marker"), b"x").await.unwrap();

        let project_type = GitProjectType::new(build_dir.clone(), "unused".to_string(), vec![]);
        project_type.teardown_build(Duration::from_secs(5)).await.unwrap();
        assert!(!build_dir.exists());
    }

    #[tokio::test]
    async fn teardown_of_a_missing_directory_is_not_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let build_dir = tmp.path().join("never-created");
        let project_type = GitProjectType::new(build_dir, "unused".to_string(), vec![]);
        project_type.teardown_build(Duration::from_secs(5)).await.unwrap();
    }

    #[tokio::test]
    async fn run_job_config_setup_is_a_no_op_with_no_commands() {
        let tmp = tempfile::tempdir().unwrap();
        let project_type = GitProjectType::new(tmp.path().to_path_buf(), "unused".to_string(), vec![]);
        project_type.run_job_config_setup().await.unwrap();
    }
}
