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

use crate::defaults::*;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HwPowerConfig {
    pub logs: Logs,
    pub msr: Msr,
    pub occ: Occ,
    pub opal: Opal,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Logs {
    pub log_level: tracing_subscriber::filter::LevelFilter,
    /// Log the entry of every high level operation.
    pub verbose: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Msr {
    pub device_root: PathBuf,
    /// `None` when batching is switched off.
    pub batch_device: Option<PathBuf>,
    pub allowlist: PathBuf,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Occ {
    pub sensors_path: PathBuf,
    pub block_size: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Opal {
    pub powercap_dir: PathBuf,
    pub psr_dir: PathBuf,
    /// Wait between setting the node power cap and reading it back.
    pub verify_delay: Duration,
}

impl Default for Logs {
    fn default() -> Self {
        Self {
            log_level: default_log_level().to_tracing_filter(),
            verbose: default_verbose(),
        }
    }
}

impl Default for Msr {
    fn default() -> Self {
        Self {
            device_root: default_device_root(),
            batch_device: Some(default_batch_device()),
            allowlist: default_allowlist(),
        }
    }
}

impl Default for Occ {
    fn default() -> Self {
        Self {
            sensors_path: default_sensors_path(),
            block_size: default_block_size(),
        }
    }
}

impl Default for Opal {
    fn default() -> Self {
        Self {
            powercap_dir: default_powercap_dir(),
            psr_dir: default_psr_dir(),
            verify_delay: Duration::from_millis(default_verify_delay_ms()),
        }
    }
}
