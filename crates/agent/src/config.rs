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

use std::path::PathBuf;

use clap::Parser;
use forge_worker_telemetry::LogFormat;
use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;
use snafu::{ResultExt, Snafu};

/// Fully-resolved agent configuration: built-in defaults, overridden by a
/// TOML config file, overridden by CLI flags.
#[derive(Debug, Clone, Serialize, Deserialize, SmartDefault)]
#[serde(default)]
pub struct AgentConfig {
    #[default = "0.0.0.0"]
    pub host: String,
    #[default = 7420]
    pub port: u16,
    #[default = 4]
    pub num_executors: usize,
    #[default = "localhost:43000"]
    pub manager_url: String,
    #[default = 10]
    pub heartbeat_interval_secs: u64,
    #[default = 3]
    pub heartbeat_failure_threshold: u32,
    pub digest_secret: Option<String>,
    pub digest_secret_file: Option<String>,
    pub workspaces_dir: Option<String>,
    pub log_level: Option<String>,
    pub log_format: LogFormat,
    #[default = ""]
    pub log_dir: String,
}

impl AgentConfig {
    /// Resolves the digest secret, reading `digest_secret_file` if
    /// `digest_secret` was not set directly.
    pub fn resolve_digest_secret(&self) -> Result<Option<String>> {
        if let Some(secret) = &self.digest_secret {
            return Ok(Some(secret.clone()));
        }
        if let Some(path) = &self.digest_secret_file {
            let contents = std::fs::read_to_string(path).context(ReadDigestSecretSnafu { path: path.clone() })?;
            return Ok(Some(contents.trim().to_string()));
        }
        Ok(None)
    }

    pub fn workspaces_dir(&self) -> PathBuf {
        self.workspaces_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join("forge-worker-workspaces"))
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("failed to read config file {path}: {source}"))]
    ReadConfigFile { path: String, source: std::io::Error },
    #[snafu(display("failed to parse config file {path}: {source}"))]
    ParseConfigFile { path: String, source: toml::de::Error },
    #[snafu(display("failed to read digest secret file {path}: {source}"))]
    ReadDigestSecret { path: String, source: std::io::Error },
}

pub type Result<T> = std::result::Result<T, Error>;

/// CLI flags. Every field is optional so a flag only overrides the config
/// file (or built-in default) when the operator actually passes it.
#[derive(Parser, Debug)]
#[command(name = "forge-worker-agent", version, about = "Distributed build worker agent")]
pub struct CliArgs {
    /// Path to a TOML config file.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[arg(long)]
    pub host: Option<String>,
    #[arg(long)]
    pub port: Option<u16>,
    #[arg(long)]
    pub num_executors: Option<usize>,
    #[arg(long)]
    pub manager_url: Option<String>,
    #[arg(long)]
    pub heartbeat_interval_secs: Option<u64>,
    #[arg(long)]
    pub heartbeat_failure_threshold: Option<u32>,
    #[arg(long)]
    pub digest_secret: Option<String>,
    #[arg(long)]
    pub digest_secret_file: Option<String>,
    #[arg(long)]
    pub workspaces_dir: Option<String>,
    #[arg(long)]
    pub log_level: Option<String>,
}

impl CliArgs {
    /// Builds the effective [`AgentConfig`]: defaults, then the config file
    /// named by `--config` (if any), then these flags.
    pub fn resolve(self) -> Result<AgentConfig> {
        let mut config = match &self.config {
            Some(path) => load_file(path)?,
            None => AgentConfig::default(),
        };

        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(num_executors) = self.num_executors {
            config.num_executors = num_executors;
        }
        if let Some(manager_url) = self.manager_url {
            config.manager_url = manager_url;
        }
        if let Some(heartbeat_interval_secs) = self.heartbeat_interval_secs {
            config.heartbeat_interval_secs = heartbeat_interval_secs;
        }
        if let Some(heartbeat_failure_threshold) = self.heartbeat_failure_threshold {
            config.heartbeat_failure_threshold = heartbeat_failure_threshold;
        }
        if self.digest_secret.is_some() {
            config.digest_secret = self.digest_secret;
        }
        if self.digest_secret_file.is_some() {
            config.digest_secret_file = self.digest_secret_file;
        }
        if self.workspaces_dir.is_some() {
            config.workspaces_dir = self.workspaces_dir;
        }
        if self.log_level.is_some() {
            config.log_level = self.log_level;
        }

        Ok(config)
    }
}

fn load_file(path: &PathBuf) -> Result<AgentConfig> {
    let text = std::fs::read_to_string(path).context(ReadConfigFileSnafu {
        path: path.display().to_string(),
    })?;
    toml::from_str(&text).context(ParseConfigFileSnafu {
        path: path.display().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_values() {
        let config = AgentConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 7420);
        assert_eq!(config.num_executors, 4);
        assert_eq!(config.manager_url, "localhost:43000");
        assert_eq!(config.heartbeat_interval_secs, 10);
        assert_eq!(config.heartbeat_failure_threshold, 3);
    }

    #[test]
    fn cli_flags_override_file_values() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "port = 9000\nnum_executors = 8\n").unwrap();

        let cli = CliArgs {
            config: Some(tmp.path().to_path_buf()),
            host: None,
            port: Some(9100),
            num_executors: None,
            manager_url: None,
            heartbeat_interval_secs: None,
            heartbeat_failure_threshold: None,
            digest_secret: None,
            digest_secret_file: None,
            workspaces_dir: None,
            log_level: None,
        };
        let config = cli.resolve().unwrap();
        assert_eq!(config.port, 9100);
        assert_eq!(config.num_executors, 8);
    }

    #[test]
    fn digest_secret_file_is_read_and_trimmed() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "shh-secret\n").unwrap();

        let config = AgentConfig {
            digest_secret_file: Some(tmp.path().display().to_string()),
            ..AgentConfig::default()
        };
        assert_eq!(config.resolve_digest_secret().unwrap(), Some("shh-secret".to_string()));
    }
}
