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

use std::{env, io::IsTerminal, sync::Once};

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_log::LogTracer;
use tracing_subscriber::{filter, layer::SubscriberExt, prelude::*, EnvFilter, Registry};

/// Output format for log lines.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Json,
    #[default]
    Text,
}

/// Configuration for the worker agent's logging system.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, SmartDefault)]
#[serde(default)]
pub struct LoggingOptions {
    /// Directory for rotated log files. Empty disables file logging.
    #[default = ""]
    pub dir: String,
    /// `tracing_subscriber::EnvFilter`-compatible level string.
    pub level: Option<String>,
    pub log_format: LogFormat,
    #[default = true]
    pub append_stdout: bool,
}

const DEFAULT_LOG_TARGETS: &str = "info";

static INIT: Once = Once::new();
static GUARDS: OnceCell<Vec<WorkerGuard>> = OnceCell::new();

/// Initialize tracing with default settings: stdout, text format, `info`
/// level unless overridden by `RUST_LOG`.
#[must_use]
pub fn init_tracing_subscriber(app_name: &str) -> Vec<WorkerGuard> {
    init_global_logging(app_name, &LoggingOptions::default())
}

/// Initialize the global `tracing` subscriber. Safe to call more than once;
/// only the first call takes effect.
#[must_use]
pub fn init_global_logging(_app_name: &str, opts: &LoggingOptions) -> Vec<WorkerGuard> {
    let mut guards = Vec::new();

    INIT.call_once(|| {
        let _ = LogTracer::init();

        let stdout_layer = if opts.append_stdout {
            let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());
            guards.push(guard);
            if opts.log_format == LogFormat::Json {
                Some(
                    tracing_subscriber::fmt::Layer::new()
                        .json()
                        .with_writer(writer)
                        .with_ansi(std::io::stdout().is_terminal())
                        .boxed(),
                )
            } else {
                Some(
                    tracing_subscriber::fmt::Layer::new()
                        .with_writer(writer)
                        .with_ansi(std::io::stdout().is_terminal())
                        .boxed(),
                )
            }
        } else {
            None
        };

        let file_layer = if opts.dir.is_empty() {
            None
        } else {
            let appender = RollingFileAppender::builder()
                .rotation(Rotation::HOURLY)
                .filename_prefix("forge-worker")
                .build(&opts.dir)
                .unwrap_or_else(|e| panic!("initializing log directory {} failed: {e}", opts.dir));
            let (writer, guard) = tracing_appender::non_blocking(appender);
            guards.push(guard);
            Some(
                tracing_subscriber::fmt::Layer::new()
                    .with_writer(writer)
                    .with_ansi(false)
                    .boxed(),
            )
        };

        let filter = opts
            .level
            .as_deref()
            .or(env::var(EnvFilter::DEFAULT_ENV).ok().as_deref())
            .unwrap_or(DEFAULT_LOG_TARGETS)
            .parse::<filter::Targets>()
            .expect("error parsing log level string");

        let subscriber = Registry::default()
            .with(filter)
            .with(stdout_layer)
            .with(file_layer);

        tracing::subscriber::set_global_default(subscriber)
            .expect("error setting global tracing subscriber");
    });

    let _ = GUARDS.set(Vec::new());
    guards
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_text_format_and_stdout() {
        let opts = LoggingOptions::default();
        assert_eq!(opts.log_format, LogFormat::Text);
        assert!(opts.append_stdout);
        assert!(opts.dir.is_empty());
    }
}
