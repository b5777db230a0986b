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

use crate::unresolved_config::LogLevel;

pub(crate) fn default_log_level() -> LogLevel {
    LogLevel::Info
}

pub(crate) fn default_verbose() -> bool {
    false
}

pub(crate) fn default_device_root() -> PathBuf {
    PathBuf::from("/dev/cpu")
}

pub(crate) fn default_batch_device() -> PathBuf {
    PathBuf::from("/dev/cpu/msr_batch")
}

pub(crate) fn default_allowlist() -> PathBuf {
    PathBuf::from("/dev/cpu/msr_allowlist")
}

pub(crate) fn default_use_batch() -> bool {
    true
}

pub(crate) fn default_sensors_path() -> PathBuf {
    PathBuf::from("/sys/firmware/opal/exports/occ_inband_sensors")
}

pub(crate) fn default_block_size() -> usize {
    0x25800
}

pub(crate) fn default_powercap_dir() -> PathBuf {
    PathBuf::from("/sys/firmware/opal/powercap/system-powercap")
}

pub(crate) fn default_psr_dir() -> PathBuf {
    PathBuf::from("/sys/firmware/opal/psr")
}

pub(crate) fn default_verify_delay_ms() -> u64 {
    10
}
