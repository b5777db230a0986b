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

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;

use nix::errno::Errno;
use parking_lot::Mutex;

use hwp_shared::types::LogicalProcessorId;
use hwp_shared::types::RegisterAddress;

use crate::device::BatchSubmission;
use crate::device::RegisterDevice;
use crate::wire::MsrBatchOp;
use crate::MSRError;
use crate::MSRResult;

/// In-process register file. Reading a register that was never set fails
/// with `EIO`, the same way the kernel reports a register a SKU lacks.
///
/// Clones share the same registers, so a handle kept outside of an engine
/// observes the writes that engine issues.
#[derive(Clone, Debug, Default)]
pub struct MemoryDevice {
    state: Arc<Mutex<MemoryState>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    registers: HashMap<(LogicalProcessorId, RegisterAddress), u64>,
    faulty: HashSet<(LogicalProcessorId, RegisterAddress)>,
    batch_disabled: bool,
    accesses: usize,
    submissions: usize,
}

impl MemoryDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// A device without a transactional path, as a node without `msr_batch`.
    pub fn without_batch() -> Self {
        let device = Self::default();
        device.state.lock().batch_disabled = true;
        device
    }

    pub fn set(&self, processor: LogicalProcessorId, register: RegisterAddress, value: u64) {
        self.state
            .lock()
            .registers
            .insert((processor, register), value);
    }

    pub fn get(&self, processor: LogicalProcessorId, register: RegisterAddress) -> Option<u64> {
        self.state
            .lock()
            .registers
            .get(&(processor, register))
            .copied()
    }

    /// Makes every access to the register fail with `EIO`.
    pub fn inject_fault(&self, processor: LogicalProcessorId, register: RegisterAddress) {
        self.state.lock().faulty.insert((processor, register));
    }

    /// Number of register accesses served so far, batched or not.
    pub fn accesses(&self) -> usize {
        self.state.lock().accesses
    }

    /// Number of transactional submissions served so far.
    pub fn submissions(&self) -> usize {
        self.state.lock().submissions
    }
}

impl MemoryState {
    fn read(&mut self, processor: LogicalProcessorId, register: RegisterAddress) -> MSRResult<u64> {
        self.accesses += 1;
        let key = (processor, register);
        if self.faulty.contains(&key) {
            return Err(MSRError::read_w_no_err(register, processor, Errno::EIO));
        }

        self.registers
            .get(&key)
            .copied()
            .ok_or_else(|| MSRError::read_w_no_err(register, processor, Errno::EIO))
    }

    fn write(
        &mut self,
        processor: LogicalProcessorId,
        register: RegisterAddress,
        value: u64,
    ) -> MSRResult<()> {
        self.accesses += 1;
        let key = (processor, register);
        if self.faulty.contains(&key) {
            return Err(MSRError::write_w_no_err(
                value,
                register,
                processor,
                Errno::EIO,
            ));
        }

        self.registers.insert(key, value);
        Ok(())
    }
}

impl RegisterDevice for MemoryDevice {
    fn read(
        &mut self,
        processor: LogicalProcessorId,
        register: RegisterAddress,
    ) -> MSRResult<u64> {
        self.state.lock().read(processor, register)
    }

    fn write(
        &mut self,
        processor: LogicalProcessorId,
        register: RegisterAddress,
        value: u64,
    ) -> MSRResult<()> {
        self.state.lock().write(processor, register, value)
    }

    fn submit_batch(&mut self, ops: &mut [MsrBatchOp]) -> MSRResult<BatchSubmission> {
        let mut state = self.state.lock();
        if state.batch_disabled {
            return Ok(BatchSubmission::Unavailable);
        }

        state.submissions += 1;
        for op in ops.iter_mut() {
            let processor = LogicalProcessorId::new(op.cpu as u32);
            let register = RegisterAddress::new(op.msr);

            let result = if op.is_read() {
                state.read(processor, register).map(|value| op.msrdata = value)
            } else {
                let value = match state.registers.get(&(processor, register)) {
                    Some(&old) if op.wmask != MsrBatchOp::NO_MASK => {
                        (op.msrdata & op.wmask) | (old & !op.wmask)
                    }
                    _ => op.msrdata,
                };
                state.write(processor, register, value)
            };

            op.err = match result {
                Ok(()) => 0,
                Err(error) => -(error.errno() as i32),
            };
        }

        Ok(BatchSubmission::Submitted)
    }
}
