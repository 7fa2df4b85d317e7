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

use std::{path::PathBuf, sync::Arc};

use forge_worker_core::{traits::ProjectTypeFactory, AdapterResult, ProjectType};
use serde_json::Value;
use uuid::Uuid;

use crate::{git::GitProjectType, null::NullProjectType};

/// Builds a [`ProjectType`] from the manager's `project_type_params` bag.
///
/// Recognizes `{"type": "git", "url": "...", "setup_commands": [...]}` and
/// falls back to [`NullProjectType`] for anything else, matching the
/// source's tolerance of project types it does not itself describe.
pub struct DefaultProjectTypeFactory {
    workspaces_dir: PathBuf,
}

impl DefaultProjectTypeFactory {
    pub fn new(workspaces_dir: PathBuf) -> Self {
        Self { workspaces_dir }
    }
}

impl ProjectTypeFactory for DefaultProjectTypeFactory {
    fn create(&self, project_type_params: &Value) -> AdapterResult<Arc<dyn ProjectType>> {
        let kind = project_type_params.get("type").and_then(Value::as_str).unwrap_or("null");

        match kind {
            "git" => {
                let url = project_type_params
                    .get("url")
                    .and_then(Value::as_str)
                    .ok_or("git project type requires a \"url\" field")?
                    .to_string();
                let setup_commands = project_type_params
                    .get("setup_commands")
                    .and_then(Value::as_array)
                    .map(|commands| {
                        commands
                            .iter()
                            .filter_map(Value::as_str)
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default();
                let build_dir = self.workspaces_dir.join(Uuid::new_v4().to_string());
                Ok(Arc::new(GitProjectType::new(build_dir, url, setup_commands)))
            }
            _ => Ok(Arc::new(NullProjectType)),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn unknown_type_falls_back_to_null_project_type() {
        let factory = DefaultProjectTypeFactory::new(PathBuf::from("/tmp"));
        let project_type = factory.create(&json!({"type": "unknown"})).unwrap();
        // NullProjectType has no observable state; constructing without
        // error is the contract under test.
        drop(project_type);
    }

    #[test]
    fn git_type_without_url_is_rejected() {
        let factory = DefaultProjectTypeFactory::new(PathBuf::from("/tmp"));
        assert!(factory.create(&json!({"type": "git"})).is_err());
    }
}
