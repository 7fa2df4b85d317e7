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
use forge_worker_core::{traits::AdapterResult, ProjectType};

/// No-op adapter used in tests and for project types the manager does not
/// otherwise describe.
#[derive(Debug, Default)]
pub struct NullProjectType;

#[async_trait]
impl ProjectType for NullProjectType {
    async fn fetch_project(&self) -> AdapterResult<()> {
        Ok(())
    }

    async fn run_job_config_setup(&self) -> AdapterResult<()> {
        Ok(())
    }

    async fn teardown_build(&self, _timeout: Duration) -> AdapterResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_step_is_a_no_op_success() {
        let project_type = NullProjectType;
        project_type.fetch_project().await.unwrap();
        project_type.run_job_config_setup().await.unwrap();
        project_type.teardown_build(Duration::from_secs(1)).await.unwrap();
    }
}
