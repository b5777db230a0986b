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

use tracing_subscriber::filter::LevelFilter;

use crate::config_loader::load_config;
use crate::HwPowerConfig;
use crate::Logs;
use crate::Msr;
use crate::Occ;
use crate::Opal;
use crate::UnresolvedHwPowerConfig;

#[test]
fn parse_basic_config() {
    let mut manifest_path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    manifest_path.push("src/tests/default.toml");

    let actual_config = load_config(manifest_path.as_os_str().to_str().unwrap()).unwrap();

    let expected_config = HwPowerConfig {
        logs: Logs {
            log_level: LevelFilter::WARN,
            verbose: true,
        },
        msr: Msr {
            device_root: "/tmp/cpu".into(),
            batch_device: None,
            allowlist: "/dev/cpu/msr_allowlist".into(),
        },
        occ: Occ {
            sensors_path: "/sys/firmware/opal/exports/occ_inband_sensors".into(),
            block_size: 4096,
        },
        opal: Opal {
            powercap_dir: "/sys/firmware/opal/powercap/system-powercap".into(),
            psr_dir: "/tmp/psr".into(),
            verify_delay: Duration::from_millis(25),
        },
    };

    assert_eq!(actual_config, expected_config);
}

#[test]
fn empty_config_resolves_to_defaults() {
    let config = UnresolvedHwPowerConfig::default().resolve().unwrap();

    assert_eq!(config, HwPowerConfig::default());
    assert_eq!(
        config.msr.batch_device,
        Some(PathBuf::from("/dev/cpu/msr_batch"))
    );
    assert_eq!(config.occ.block_size, 0x25800);
}

#[test]
fn zero_block_size_is_rejected() {
    let mut config = UnresolvedHwPowerConfig::default();
    config.occ.block_size = 0;

    assert!(config.resolve().is_err());
}

#[test]
fn missing_file_is_an_error() {
    assert!(load_config("/nonexistent/hwpower.toml").is_err());
}
