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

use std::fmt;

use serde::Serialize;

/// The worker's lifecycle state, reported to the manager verbatim.
///
/// `SETUP_COMPLETED` serializes to the literal `"SETUP_COMPLETE"` — the
/// manager's wire contract is one letter short of the variant name.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub enum WorkerState {
    Disconnected,
    Shutdown,
    Idle,
    SetupCompleted,
    SetupFailed,
}

impl WorkerState {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkerState::Disconnected => "DISCONNECTED",
            WorkerState::Shutdown => "SHUTDOWN",
            WorkerState::Idle => "IDLE",
            WorkerState::SetupCompleted => "SETUP_COMPLETE",
            WorkerState::SetupFailed => "SETUP_FAILED",
        }
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_completed_serializes_to_setup_complete() {
        assert_eq!(WorkerState::SetupCompleted.as_str(), "SETUP_COMPLETE");
        assert_eq!(WorkerState::SetupFailed.as_str(), "SETUP_FAILED");
        assert_eq!(WorkerState::Disconnected.as_str(), "DISCONNECTED");
        assert_eq!(WorkerState::Shutdown.as_str(), "SHUTDOWN");
        assert_eq!(WorkerState::Idle.as_str(), "IDLE");
    }
}
