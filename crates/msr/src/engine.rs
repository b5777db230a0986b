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

use hwp_shared::types::CoreId;
use hwp_shared::types::LogicalProcessorId;
use hwp_shared::types::RegisterAddress;
use hwp_shared::types::SocketId;
use hwp_shared::types::ThreadId;
use hwp_topology::Topology;

use crate::batch::Access;
use crate::batch::Batch;
use crate::device::BatchSubmission;
use crate::device::RegisterDevice;
use crate::wire::MsrBatchOp;
use crate::BatchKind;
use crate::BatchReport;
use crate::BatchSlot;
use crate::MSRError;
use crate::MSRResult;
use crate::RegisterWrite;

/// Owns the register device and every batch of a node.
///
/// Batches are allocated once, populated once and then submitted as many
/// times as needed. The engine is not internally synchronized, callers that
/// sample from several threads have to serialize whole
/// allocate/load/submit/read cycles behind one lock.
pub struct BatchEngine {
    device: Box<dyn RegisterDevice>,
    topology: Topology,
    batches: HashMap<BatchKind, Batch>,
    compatibility_warned: bool,
}

impl BatchEngine {
    pub fn new(device: Box<dyn RegisterDevice>, topology: Topology) -> Self {
        Self {
            device,
            topology,
            batches: HashMap::new(),
            compatibility_warned: false,
        }
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn is_allocated(&self, kind: BatchKind) -> bool {
        self.batches.contains_key(&kind)
    }

    /// Drops `kind` with everything loaded into it, so it can be allocated
    /// again. Returns whether it was allocated.
    pub fn release(&mut self, kind: BatchKind) -> bool {
        self.batches.remove(&kind).is_some()
    }

    /// Reserves `size` operation slots for `kind`.
    pub fn allocate(&mut self, kind: BatchKind, size: usize) -> MSRResult<()> {
        if self.batches.contains_key(&kind) {
            return Err(MSRError::BatchAlreadyAllocated { kind });
        }

        tracing::debug!("allocating batch {kind:?} with {size} slots");
        self.batches.insert(kind, Batch::with_capacity(size));
        Ok(())
    }

    /// Appends one read of `register` per processor and returns the slots
    /// the results will land in, in the order of `processors`.
    ///
    /// Nothing is appended when the batch can't hold all of them.
    pub fn load(
        &mut self,
        kind: BatchKind,
        register: RegisterAddress,
        processors: &[LogicalProcessorId],
    ) -> MSRResult<Vec<BatchSlot>> {
        let topology = self.topology;
        let batch = self
            .batches
            .get_mut(&kind)
            .ok_or_else(|| MSRError::batch_not_allocated(kind))?;

        let requested = batch.ops.len() + processors.len();
        if requested > batch.capacity {
            return Err(MSRError::BatchFull {
                kind,
                capacity: batch.capacity,
                requested,
            });
        }

        let ops = processors
            .iter()
            .map(|&processor| {
                topology.check_logical_id(processor)?;
                let cpu = u16::try_from(processor.get())
                    .map_err(|_| MSRError::ProcessorIdTooBig { processor })?;
                Ok(MsrBatchOp::read(cpu, register.get()))
            })
            .collect::<MSRResult<Vec<_>>>()?;

        let first = batch.ops.len();
        batch.ops.extend(ops);

        let slots = (first..batch.ops.len())
            .map(|index| BatchSlot { kind, index })
            .collect();
        Ok(slots)
    }

    /// Loads `register` once per socket, on the first thread of its first
    /// core. Slot `i` belongs to socket `i`.
    pub fn load_socket_leaders(
        &mut self,
        kind: BatchKind,
        register: RegisterAddress,
    ) -> MSRResult<Vec<BatchSlot>> {
        let leaders = self.topology.socket_leaders();
        self.load(kind, register, &leaders)
    }

    /// Loads `register` on every logical processor. Slot `i` belongs to
    /// logical processor `i`.
    pub fn load_all_threads(
        &mut self,
        kind: BatchKind,
        register: RegisterAddress,
    ) -> MSRResult<Vec<BatchSlot>> {
        let processors = self.topology.all_logical_ids().collect::<Vec<_>>();
        self.load(kind, register, &processors)
    }

    /// Reads every register of the batch. Results become available through
    /// [`BatchEngine::value`].
    pub fn read(&mut self, kind: BatchKind) -> MSRResult<BatchReport> {
        self.submit(kind, Access::Read)
    }

    /// Writes the staged value of every operation of the batch.
    pub fn write(&mut self, kind: BatchKind) -> MSRResult<BatchReport> {
        self.submit(kind, Access::Write)
    }

    pub fn value(&self, slot: BatchSlot) -> MSRResult<u64> {
        self.op(slot).map(|op| op.msrdata)
    }

    pub fn set_value(&mut self, slot: BatchSlot, value: u64) -> MSRResult<()> {
        self.op_mut(slot).map(|op| op.msrdata = value)
    }

    /// Limits a later write through `slot` to the bits set in `mask`.
    pub fn set_write_mask(&mut self, slot: BatchSlot, mask: u64) -> MSRResult<()> {
        self.op_mut(slot).map(|op| op.wmask = mask)
    }

    /// Every loaded slot of `kind`, in load order.
    pub fn slots(&self, kind: BatchKind) -> MSRResult<Vec<BatchSlot>> {
        let batch = self
            .batches
            .get(&kind)
            .ok_or_else(|| MSRError::batch_not_allocated(kind))?;

        Ok((0..batch.ops.len())
            .map(|index| BatchSlot { kind, index })
            .collect())
    }

    pub fn processor(&self, slot: BatchSlot) -> MSRResult<LogicalProcessorId> {
        self.op(slot)
            .map(|op| LogicalProcessorId::new(op.cpu as u32))
    }

    /// Reads one register outside of any batch.
    pub fn read_register(
        &mut self,
        processor: LogicalProcessorId,
        register: RegisterAddress,
    ) -> MSRResult<u64> {
        self.topology.check_logical_id(processor)?;
        self.device.read(processor, register)
    }

    /// Writes one register outside of any batch, merging with the current
    /// value when the write is masked.
    pub fn write_register(
        &mut self,
        processor: LogicalProcessorId,
        item: RegisterWrite,
    ) -> MSRResult<()> {
        self.topology.check_logical_id(processor)?;

        let value_to_write = if item.is_masked() {
            let old_value = self.device.read(processor, item.register())?;
            RegisterWrite::masked_value(old_value, item.value(), item.mask())
        } else {
            item.value()
        };

        tracing::debug!(
            "write register {} value {:#X} at logical processor {}",
            item.register(),
            value_to_write,
            processor
        );
        self.device.write(processor, item.register(), value_to_write)
    }

    pub fn read_by_coord(
        &mut self,
        socket: SocketId,
        core: CoreId,
        thread: ThreadId,
        register: RegisterAddress,
    ) -> MSRResult<u64> {
        let processor = self.topology.logical_id(socket, core, thread)?;
        self.read_register(processor, register)
    }

    pub fn write_by_coord(
        &mut self,
        socket: SocketId,
        core: CoreId,
        thread: ThreadId,
        item: RegisterWrite,
    ) -> MSRResult<()> {
        let processor = self.topology.logical_id(socket, core, thread)?;
        self.write_register(processor, item)
    }

    fn submit(&mut self, kind: BatchKind, access: Access) -> MSRResult<BatchReport> {
        let batch = self
            .batches
            .get_mut(&kind)
            .ok_or_else(|| MSRError::batch_not_allocated(kind))?;
        if batch.ops.is_empty() {
            return Err(MSRError::EmptyBatch { kind });
        }

        batch.retag(access);
        let compatibility_mode = match self.device.submit_batch(&mut batch.ops)? {
            BatchSubmission::Submitted => false,
            BatchSubmission::Unavailable => {
                if !self.compatibility_warned {
                    tracing::warn!(
                        "batch device is unavailable, falling back to one syscall per register; \
                         batch results are no longer a simultaneous snapshot"
                    );
                    self.compatibility_warned = true;
                }
                submit_one_by_one(self.device.as_mut(), &mut batch.ops, access);
                true
            }
        };

        let report = BatchReport::collect(kind, &batch.ops, compatibility_mode);
        for failure in report.failures.iter() {
            tracing::debug!("batch {kind:?}: {failure}");
        }

        Ok(report)
    }

    fn op(&self, slot: BatchSlot) -> MSRResult<&MsrBatchOp> {
        self.batches
            .get(&slot.kind)
            .ok_or_else(|| MSRError::batch_not_allocated(slot.kind))?
            .ops
            .get(slot.index)
            .ok_or_else(|| MSRError::unknown_slot(slot.kind, slot.index))
    }

    fn op_mut(&mut self, slot: BatchSlot) -> MSRResult<&mut MsrBatchOp> {
        self.batches
            .get_mut(&slot.kind)
            .ok_or_else(|| MSRError::batch_not_allocated(slot.kind))?
            .ops
            .get_mut(slot.index)
            .ok_or_else(|| MSRError::unknown_slot(slot.kind, slot.index))
    }
}

fn submit_one_by_one(device: &mut dyn RegisterDevice, ops: &mut [MsrBatchOp], access: Access) {
    for op in ops.iter_mut() {
        let processor = LogicalProcessorId::new(op.cpu as u32);
        let register = RegisterAddress::new(op.msr);

        let result = match access {
            Access::Read => device
                .read(processor, register)
                .map(|value| op.msrdata = value),
            Access::Write if op.wmask != MsrBatchOp::NO_MASK => device
                .read(processor, register)
                .and_then(|old_value| {
                    let value = RegisterWrite::masked_value(old_value, op.msrdata, op.wmask);
                    device.write(processor, register, value)
                }),
            Access::Write => device.write(processor, register, op.msrdata),
        };

        op.err = match result {
            Ok(()) => 0,
            Err(error) => -(error.errno() as i32),
        };
    }
}

impl std::fmt::Debug for BatchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchEngine")
            .field("topology", &self.topology)
            .field("batches", &self.batches)
            .field("compatibility_warned", &self.compatibility_warned)
            .finish()
    }
}

#[cfg(test)]
mod tests;
