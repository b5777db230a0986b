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

use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use hwp_shared::types::SocketId;

use crate::GpuPowerRatio;
use crate::HwPowerError;
use crate::HwPowerResult;
use crate::NodePowerCap;
use crate::WriteFailure;
use crate::WriteSummary;
use crate::WriteTarget;

const POWERCAP_CURRENT: &str = "powercap-current";
const POWERCAP_MAX: &str = "powercap-max";
const POWERCAP_MIN: &str = "powercap-min";
/// Power shifting ratio files, one per processor chip in socket order.
const PSR_FILES: [&str; 2] = ["cpu_to_gpu_0", "cpu_to_gpu_8"];
const MAX_RATIO_PERCENT: u64 = 100;

/// Firmware managed node power cap and CPU to GPU power shifting ratios,
/// exposed by OPAL as plain numbers in sysfs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Opal {
    powercap_dir: PathBuf,
    psr_dir: PathBuf,
    verify_delay: Duration,
}

impl Opal {
    pub fn new(
        powercap_dir: impl Into<PathBuf>,
        psr_dir: impl Into<PathBuf>,
        verify_delay: Duration,
    ) -> Self {
        Self {
            powercap_dir: powercap_dir.into(),
            psr_dir: psr_dir.into(),
            verify_delay,
        }
    }

    pub fn from_config(config: &hwp_config::Opal) -> Self {
        Self::new(
            config.powercap_dir.clone(),
            config.psr_dir.clone(),
            config.verify_delay,
        )
    }

    pub fn powercap(&self, sockets: u32) -> NodePowerCap {
        let gpu_ratios = (0..sockets)
            .map(SocketId::new)
            .filter_map(|socket| {
                let path = self.psr_path(socket)?;
                Some(GpuPowerRatio {
                    socket,
                    percent: read_number(&path).into(),
                })
            })
            .collect();

        NodePowerCap {
            current_watts: read_number(&self.powercap_dir.join(POWERCAP_CURRENT)).into(),
            min_watts: read_number(&self.powercap_dir.join(POWERCAP_MIN)).into(),
            max_watts: read_number(&self.powercap_dir.join(POWERCAP_MAX)).into(),
            gpu_ratios,
        }
    }

    /// Sets the node power cap and reads it back after the firmware had time
    /// to apply it.
    pub fn set_powercap(&self, watts: u64) -> HwPowerResult<WriteSummary> {
        let min = read_number(&self.powercap_dir.join(POWERCAP_MIN))?;
        let max = read_number(&self.powercap_dir.join(POWERCAP_MAX))?;
        if watts < min || watts > max {
            return Err(HwPowerError::out_of_range(
                "node power cap in watts",
                watts as f64,
                min as f64,
                max as f64,
            ));
        }

        let current = self.powercap_dir.join(POWERCAP_CURRENT);
        write_number(&current, watts)?;
        std::thread::sleep(self.verify_delay);

        let actual = read_number(&current)?;
        if actual != watts {
            return Err(HwPowerError::CapNotApplied {
                requested: watts,
                actual,
            });
        }

        log::debug!("node power cap is {actual} W");
        Ok(WriteSummary::new(1, Vec::new()))
    }

    /// Writes the share of power shifted from processors to GPUs on every
    /// socket.
    pub fn set_gpu_ratio(&self, percent: u64, sockets: u32) -> HwPowerResult<WriteSummary> {
        if percent > MAX_RATIO_PERCENT {
            return Err(HwPowerError::out_of_range(
                "GPU power ratio in percent",
                percent as f64,
                0.0,
                MAX_RATIO_PERCENT as f64,
            ));
        }

        let targets = (0..sockets)
            .map(SocketId::new)
            .filter_map(|socket| self.psr_path(socket).map(|path| (socket, path)))
            .collect::<Vec<_>>();

        let failures = targets
            .iter()
            .filter_map(|(socket, path)| {
                write_number(path, percent).err().map(|error| WriteFailure {
                    target: WriteTarget::Socket(*socket),
                    reason: error.to_string(),
                })
            })
            .collect();

        WriteSummary::finish("set-gpu-power-ratio", targets.len(), failures)
    }

    pub fn files(&self) -> Vec<PathBuf> {
        [POWERCAP_CURRENT, POWERCAP_MIN, POWERCAP_MAX]
            .iter()
            .map(|name| self.powercap_dir.join(name))
            .chain(PSR_FILES.iter().map(|name| self.psr_dir.join(name)))
            .collect()
    }

    fn psr_path(&self, socket: SocketId) -> Option<PathBuf> {
        PSR_FILES
            .get(usize::from(socket))
            .map(|name| self.psr_dir.join(name))
    }
}

fn read_number(path: &Path) -> HwPowerResult<u64> {
    let content = fs::read_to_string(path).map_err(|io_error| HwPowerError::sysfs(path, io_error))?;
    match content.trim().parse() {
        Ok(value) => Ok(value),
        Err(_) => Err(HwPowerError::SysfsParse {
            path: path.to_path_buf(),
            content,
        }),
    }
}

fn write_number(path: &Path, value: u64) -> HwPowerResult<()> {
    fs::write(path, value.to_string()).map_err(|io_error| HwPowerError::sysfs(path, io_error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use crate::Measurement;

    fn opal_tree(root: &Path) -> Opal {
        let powercap = root.join("powercap");
        let psr = root.join("psr");
        fs::create_dir_all(&powercap).unwrap();
        fs::create_dir_all(&psr).unwrap();

        fs::write(powercap.join(POWERCAP_CURRENT), "3050\n").unwrap();
        fs::write(powercap.join(POWERCAP_MIN), "500\n").unwrap();
        fs::write(powercap.join(POWERCAP_MAX), "3050\n").unwrap();
        fs::write(psr.join("cpu_to_gpu_0"), "100\n").unwrap();
        fs::write(psr.join("cpu_to_gpu_8"), "100\n").unwrap();

        Opal::new(powercap, psr, Duration::ZERO)
    }

    #[test]
    fn reads_cap_and_ratios() {
        let root = tempfile::tempdir().unwrap();
        let opal = opal_tree(root.path());

        let cap = opal.powercap(2);
        assert_eq!(cap.current_watts, Measurement::Value(3050));
        assert_eq!(cap.min_watts, Measurement::Value(500));
        assert_eq!(cap.max_watts, Measurement::Value(3050));
        assert_eq!(cap.gpu_ratios.len(), 2);
        assert_eq!(cap.gpu_ratios[1].socket, SocketId::new(1));
        assert_eq!(cap.gpu_ratios[1].percent, Measurement::Value(100));
    }

    #[test]
    fn sets_cap_within_bounds() {
        let root = tempfile::tempdir().unwrap();
        let opal = opal_tree(root.path());

        let summary = opal.set_powercap(2000).unwrap();
        assert!(summary.is_complete());
        assert_eq!(opal.powercap(2).current_watts, Measurement::Value(2000));

        let error = opal.set_powercap(100).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Range);
        assert_eq!(opal.powercap(2).current_watts, Measurement::Value(2000));
    }

    #[test]
    fn garbage_in_sysfs_is_reported() {
        let root = tempfile::tempdir().unwrap();
        let opal = opal_tree(root.path());
        fs::write(root.path().join("powercap").join(POWERCAP_MIN), "n/a").unwrap();

        assert!(opal.powercap(2).min_watts.is_failed());
        assert!(matches!(
            opal.set_powercap(2000),
            Err(HwPowerError::SysfsParse { .. })
        ));
    }

    #[test]
    fn sets_ratio_on_every_chip() {
        let root = tempfile::tempdir().unwrap();
        let opal = opal_tree(root.path());

        let summary = opal.set_gpu_ratio(40, 2).unwrap();
        assert_eq!(summary.attempted, 2);
        let cap = opal.powercap(2);
        assert!(cap
            .gpu_ratios
            .iter()
            .all(|ratio| ratio.percent == Measurement::Value(40)));

        let error = opal.set_gpu_ratio(101, 2).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Range);
    }

    #[test]
    fn missing_psr_directory_fails_the_request() {
        let root = tempfile::tempdir().unwrap();
        let opal = Opal::new(root.path().join("powercap"), root.path().join("psr"), Duration::ZERO);

        let error = opal.set_gpu_ratio(40, 2).unwrap_err();
        assert!(matches!(error, HwPowerError::NoSocketSucceeded { .. }));
    }
}
