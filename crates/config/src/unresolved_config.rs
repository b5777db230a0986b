/*
 * Copyright 2024 Fluence Labs Limited
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use std::path::PathBuf;
use std::time::Duration;

use eyre::ensure;
use serde::Deserialize;
use serde::Serialize;

use super::defaults::*;
use crate::*;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UnresolvedHwPowerConfig {
    #[serde(default)]
    pub logs: UnresolvedLogs,
    #[serde(default)]
    pub msr: UnresolvedMsr,
    #[serde(default)]
    pub occ: UnresolvedOcc,
    #[serde(default)]
    pub opal: UnresolvedOpal,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UnresolvedLogs {
    #[serde(default = "default_log_level")]
    pub log_level: LogLevel,

    #[serde(default = "default_verbose")]
    pub verbose: bool,
}

impl Default for UnresolvedLogs {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            verbose: default_verbose(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UnresolvedMsr {
    #[serde(default = "default_device_root")]
    pub device_root: PathBuf,

    #[serde(default = "default_batch_device")]
    pub batch_device: PathBuf,

    #[serde(default = "default_allowlist")]
    pub allowlist: PathBuf,

    #[serde(default = "default_use_batch")]
    pub use_batch: bool,
}

impl Default for UnresolvedMsr {
    fn default() -> Self {
        Self {
            device_root: default_device_root(),
            batch_device: default_batch_device(),
            allowlist: default_allowlist(),
            use_batch: default_use_batch(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UnresolvedOcc {
    #[serde(default = "default_sensors_path")]
    pub sensors_path: PathBuf,

    #[serde(default = "default_block_size")]
    pub block_size: usize,
}

impl Default for UnresolvedOcc {
    fn default() -> Self {
        Self {
            sensors_path: default_sensors_path(),
            block_size: default_block_size(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UnresolvedOpal {
    #[serde(default = "default_powercap_dir")]
    pub powercap_dir: PathBuf,

    #[serde(default = "default_psr_dir")]
    pub psr_dir: PathBuf,

    #[serde(default = "default_verify_delay_ms")]
    pub verify_delay_ms: u64,
}

impl Default for UnresolvedOpal {
    fn default() -> Self {
        Self {
            powercap_dir: default_powercap_dir(),
            psr_dir: default_psr_dir(),
            verify_delay_ms: default_verify_delay_ms(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl UnresolvedHwPowerConfig {
    pub fn resolve(self) -> eyre::Result<HwPowerConfig> {
        let config = HwPowerConfig {
            logs: self.logs.resolve(),
            msr: self.msr.resolve(),
            occ: self.occ.resolve()?,
            opal: self.opal.resolve(),
        };
        Ok(config)
    }
}

impl LogLevel {
    pub fn to_tracing_filter(&self) -> tracing_subscriber::filter::LevelFilter {
        use tracing_subscriber::filter::LevelFilter;

        match self {
            LogLevel::Off => LevelFilter::OFF,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

impl UnresolvedLogs {
    pub fn resolve(self) -> Logs {
        Logs {
            log_level: self.log_level.to_tracing_filter(),
            verbose: self.verbose,
        }
    }
}

impl UnresolvedMsr {
    pub fn resolve(self) -> Msr {
        Msr {
            device_root: self.device_root,
            batch_device: self.use_batch.then_some(self.batch_device),
            allowlist: self.allowlist,
        }
    }
}

impl UnresolvedOcc {
    pub fn resolve(self) -> eyre::Result<Occ> {
        ensure!(self.block_size > 0, "occ block-size must be positive");

        Ok(Occ {
            sensors_path: self.sensors_path,
            block_size: self.block_size,
        })
    }
}

impl UnresolvedOpal {
    pub fn resolve(self) -> Opal {
        Opal {
            powercap_dir: self.powercap_dir,
            psr_dir: self.psr_dir,
            verify_delay: Duration::from_millis(self.verify_delay_ms),
        }
    }
}
