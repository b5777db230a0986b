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

use std::fs::File;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use nix::errno::Errno;

use hwp_shared::types::LogicalProcessorId;
use hwp_shared::types::RegisterAddress;
use hwp_topology::Topology;

use super::ioctl;
use super::utils;
use crate::device::BatchSubmission;
use crate::device::RegisterDevice;
use crate::wire::MsrBatchOp;
use crate::MSRError;
use crate::MSRResult;

/// Where the kernel exposes register devices.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MsrDevicePaths {
    /// Directory holding one `<logical processor>/msr` entry per processor.
    pub device_root: PathBuf,
    /// The `msr_batch` device, `None` disables batching entirely.
    pub batch_device: Option<PathBuf>,
    /// Its presence signals the msr_safe module is loaded.
    pub allowlist: PathBuf,
}

impl Default for MsrDevicePaths {
    fn default() -> Self {
        Self {
            device_root: PathBuf::from("/dev/cpu"),
            batch_device: Some(PathBuf::from("/dev/cpu/msr_batch")),
            allowlist: PathBuf::from("/dev/cpu/msr_allowlist"),
        }
    }
}

/// Kernel module serving the per processor register files.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MsrModule {
    /// msr_safe, reads and writes are filtered by an allowlist.
    Safe,
    /// The stock msr module, needs CAP_SYS_RAWIO.
    Stock,
}

impl MsrModule {
    fn detect(allowlist: &Path) -> Self {
        match File::open(allowlist) {
            Ok(_) => MsrModule::Safe,
            Err(_) => MsrModule::Stock,
        }
    }

    fn file_name(&self) -> &'static str {
        match self {
            MsrModule::Safe => "msr_safe",
            MsrModule::Stock => "msr",
        }
    }

    fn remediation_hint(&self) -> &'static str {
        match self {
            MsrModule::Safe => "check that the register is in the msr_safe allowlist and the device is readable and writable by this user",
            MsrModule::Stock => "load the msr kernel module and run as root or with CAP_SYS_RAWIO",
        }
    }
}

/// Register device backed by `/dev/cpu/<n>/msr_safe` or `/dev/cpu/<n>/msr`,
/// optionally batched through `/dev/cpu/msr_batch`.
#[derive(Debug)]
pub struct MsrDevice {
    module: MsrModule,
    files: Vec<File>,
    batch: Option<File>,
}

impl MsrDevice {
    /// Opens one register file per logical processor of `topology`.
    ///
    /// msr_safe is preferred when its allowlist is present; if any of its
    /// files can't be opened, every processor is retried once with the stock
    /// module.
    pub fn open(paths: &MsrDevicePaths, topology: &Topology) -> MSRResult<Self> {
        let preferred = MsrModule::detect(&paths.allowlist);

        let (module, files) = match open_all(paths, topology, preferred) {
            Ok(files) => (preferred, files),
            Err(error) if preferred == MsrModule::Safe => {
                tracing::warn!("msr_safe devices aren't usable ({error}), retrying with msr");
                let files = open_all(paths, topology, MsrModule::Stock)?;
                (MsrModule::Stock, files)
            }
            Err(error) => return Err(error),
        };

        let batch = match (module, paths.batch_device.as_deref()) {
            (MsrModule::Safe, Some(path)) => open_batch(path),
            _ => None,
        };

        tracing::info!(
            "opened {} {} devices, batch device {}",
            files.len(),
            module.file_name(),
            if batch.is_some() { "present" } else { "absent" }
        );

        Ok(Self {
            module,
            files,
            batch,
        })
    }

    pub fn module(&self) -> MsrModule {
        self.module
    }

    pub fn has_batch_device(&self) -> bool {
        self.batch.is_some()
    }

    fn file(&self, processor: LogicalProcessorId) -> MSRResult<&File> {
        self.files
            .get(usize::from(processor))
            .ok_or(MSRError::NoDeviceForProcessor { processor })
    }
}

impl RegisterDevice for MsrDevice {
    fn read(
        &mut self,
        processor: LogicalProcessorId,
        register: RegisterAddress,
    ) -> MSRResult<u64> {
        let file = self.file(processor)?;
        utils::read_msr(file, register, processor)
    }

    fn write(
        &mut self,
        processor: LogicalProcessorId,
        register: RegisterAddress,
        value: u64,
    ) -> MSRResult<()> {
        let file = self.file(processor)?;
        utils::write_msr(file, register, value, processor)
    }

    fn submit_batch(&mut self, ops: &mut [MsrBatchOp]) -> MSRResult<BatchSubmission> {
        let Some(batch) = self.batch.as_ref() else {
            return Ok(BatchSubmission::Unavailable);
        };

        match ioctl::submit_batch(batch, ops) {
            Ok(()) => Ok(BatchSubmission::Submitted),
            Err(errno @ (Errno::EACCES | Errno::EPERM | Errno::ENOTTY)) => {
                tracing::warn!("msr_batch refused the request ({errno:?}), disabling it");
                self.batch = None;
                Ok(BatchSubmission::Unavailable)
            }
            // the driver fails the whole call when any single op fails
            Err(_) if ops.iter().any(|op| op.err != 0) => Ok(BatchSubmission::Submitted),
            Err(errno) => Err(MSRError::BatchIoctl { errno }),
        }
    }
}

fn open_all(
    paths: &MsrDevicePaths,
    topology: &Topology,
    module: MsrModule,
) -> MSRResult<Vec<File>> {
    topology
        .all_logical_ids()
        .map(|processor| {
            let path = paths
                .device_root
                .join(processor.to_string())
                .join(module.file_name());
            utils::open_read_write(&path).map_err(|io_error| open_error(path, io_error, module))
        })
        .collect()
}

fn open_batch(path: &Path) -> Option<File> {
    match utils::open_read_write(path) {
        Ok(file) => Some(file),
        Err(error) => {
            tracing::debug!("batch device {path:?} can't be opened: {error}");
            None
        }
    }
}

fn open_error(path: PathBuf, io_error: io::Error, module: MsrModule) -> MSRError {
    match io_error.kind() {
        io::ErrorKind::PermissionDenied => MSRError::PermissionDenied {
            path,
            hint: module.remediation_hint(),
        },
        _ => MSRError::OpenForReadWrite { path, io_error },
    }
}
