//
// Copyright (c) The RINA Daemon Contributors
//
// SPDX-License-Identifier: MIT
//

use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub user: String,
    pub admin_socket: String,
    pub persist_path: String,
    pub max_pending_invoke_ids: usize,
    pub spf_debounce_ms: u64,
    pub lfdb_age_max_secs: u64,
    pub lfdb_age_tick_secs: u64,
    pub flow_timeout_secs: u64,
    pub enrollment_timeout_secs: u64,
    pub logging: Logging,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Logging {
    pub file: LoggingFile,
    pub stdout: LoggingStdout,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingFile {
    pub enabled: bool,
    pub dir: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingStdout {
    pub enabled: bool,
}

impl Config {
    const DFLT_FILEPATH: &'static str = "/etc/rinad.toml";

    pub fn load(config_file: Option<&str>) -> Config {
        let config_file = config_file.unwrap_or(Config::DFLT_FILEPATH);

        match std::fs::read_to_string(config_file) {
            Ok(config_str) => toml::from_str(&config_str)
                .expect("failed to parse configuration file"),
            Err(err) => {
                eprintln!("failed to load configuration file: {err}");
                eprintln!("falling back to default configuration...");
                Config::default()
            }
        }
    }

    pub fn spf_debounce(&self) -> Duration {
        Duration::from_millis(self.spf_debounce_ms)
    }

    pub fn lfdb_age_max(&self) -> Duration {
        Duration::from_secs(self.lfdb_age_max_secs)
    }

    pub fn lfdb_age_tick(&self) -> Duration {
        Duration::from_secs(self.lfdb_age_tick_secs)
    }

    pub fn flow_timeout(&self) -> Duration {
        Duration::from_secs(self.flow_timeout_secs)
    }

    pub fn enrollment_timeout(&self) -> Duration {
        Duration::from_secs(self.enrollment_timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Config {
        Config {
            user: "rina".to_owned(),
            admin_socket: "/run/rinad.sock".to_owned(),
            persist_path: "/var/lib/rinad/ipcps".to_owned(),
            max_pending_invoke_ids: rina_cdap::connection::DEFAULT_MAX_PENDING,
            spf_debounce_ms: 100,
            lfdb_age_max_secs: 300,
            lfdb_age_tick_secs: 10,
            flow_timeout_secs: 5,
            enrollment_timeout_secs: 10,
            logging: Default::default(),
        }
    }
}

impl Default for Logging {
    fn default() -> Logging {
        Logging {
            file: Default::default(),
            stdout: Default::default(),
        }
    }
}

impl Default for LoggingFile {
    fn default() -> LoggingFile {
        LoggingFile {
            enabled: true,
            dir: "/var/log".to_owned(),
            name: "rinad.log".to_owned(),
        }
    }
}

impl Default for LoggingStdout {
    fn default() -> LoggingStdout {
        LoggingStdout { enabled: false }
    }
}
