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

use hwp_shared::types::LogicalProcessorId;
use hwp_shared::types::RegisterAddress;
use hwp_topology::Topology;

use crate::device::BatchSubmission;
use crate::device::RegisterDevice;
use crate::wire::MsrBatchOp;
use crate::MSRError;
use crate::MSRResult;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MsrDevicePaths {
    pub device_root: PathBuf,
    pub batch_device: Option<PathBuf>,
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

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MsrModule {
    Safe,
    Stock,
}

/// Register devices don't exist on this target, opening always fails.
#[derive(Debug)]
pub struct MsrDevice {
    module: MsrModule,
}

impl MsrDevice {
    pub fn open(_paths: &MsrDevicePaths, _topology: &Topology) -> MSRResult<Self> {
        Err(MSRError::UnsupportedTarget)
    }

    pub fn module(&self) -> MsrModule {
        self.module
    }

    pub fn has_batch_device(&self) -> bool {
        false
    }
}

impl RegisterDevice for MsrDevice {
    fn read(
        &mut self,
        _processor: LogicalProcessorId,
        _register: RegisterAddress,
    ) -> MSRResult<u64> {
        Err(MSRError::UnsupportedTarget)
    }

    fn write(
        &mut self,
        _processor: LogicalProcessorId,
        _register: RegisterAddress,
        _value: u64,
    ) -> MSRResult<()> {
        Err(MSRError::UnsupportedTarget)
    }

    fn submit_batch(&mut self, _ops: &mut [MsrBatchOp]) -> MSRResult<BatchSubmission> {
        Ok(BatchSubmission::Unavailable)
    }
}
