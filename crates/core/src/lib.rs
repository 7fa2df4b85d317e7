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

//! Worker lifecycle state machine, executor pool and shutdown coordination.

pub mod coin;
pub mod command;
pub mod controller;
pub mod error;
pub mod executor_pool;
pub mod heartbeat;
pub mod metrics;
pub mod model;
pub mod shutdown;
pub mod state;
pub mod traits;

pub use coin::SingleUseCoin;
pub use command::{run_atomic_commands, CommandRecord};
pub use controller::{WorkerController, WorkerControllerOptions};
pub use error::{CoreError, Result};
pub use executor_pool::ExecutorPool;
pub use heartbeat::HeartbeatLoop;
pub use model::{BuildContext, WorkerApiRepresentation};
pub use state::WorkerState;
pub use traits::{AdapterError, AdapterResult, ProjectType, SubjobExecutor};
