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

use nix::errno::Errno;

use hwp_shared::types::LogicalProcessorId;
use hwp_shared::types::RegisterAddress;

use crate::wire::MsrBatchOp;

/// Named batches an engine can hold, one per register set that is sampled
/// together.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BatchKind {
    RaplData,
    RaplUnit,
    FixedCountersData,
    FixedCountersCtrl,
    ClocksData,
    PerfData,
    PerfCtrl,
    ThermStatus,
    PkgThermStatus,
    TempTarget,
    PlatformInfo,
    MiscEnable,
}

/// Location of one operation inside a batch. Returned by `BatchEngine::load`
/// and used to read back the result or to stage a value for writing.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct BatchSlot {
    pub(crate) kind: BatchKind,
    pub(crate) index: usize,
}

impl BatchSlot {
    pub fn kind(&self) -> BatchKind {
        self.kind
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

/// A single operation of a batch that the kernel refused.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct OperationError {
    pub slot: BatchSlot,
    pub processor: LogicalProcessorId,
    pub register: RegisterAddress,
    pub errno: Errno,
}

impl std::fmt::Display for OperationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "register {} of logical processor {} failed with {:?}",
            self.register, self.processor, self.errno
        )
    }
}

/// Outcome of one batch submission. Operations that are not listed in
/// `failures` hold valid results.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub failures: Vec<OperationError>,
    /// The batch was served one operation at a time instead of as a single
    /// kernel transaction, so results are not a simultaneous snapshot.
    pub compatibility_mode: bool,
}

impl BatchReport {
    pub(crate) fn collect(kind: BatchKind, ops: &[MsrBatchOp], compatibility_mode: bool) -> Self {
        let failures = ops
            .iter()
            .enumerate()
            .filter(|(_, op)| op.err != 0)
            .map(|(index, op)| OperationError {
                slot: BatchSlot { kind, index },
                processor: LogicalProcessorId::new(op.cpu as u32),
                register: RegisterAddress::new(op.msr),
                errno: Errno::from_i32(op.err.wrapping_abs()),
            })
            .collect();

        Self {
            failures,
            compatibility_mode,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failure_for(&self, slot: BatchSlot) -> Option<&OperationError> {
        self.failures.iter().find(|failure| failure.slot == slot)
    }
}

#[derive(Debug)]
pub(crate) struct Batch {
    pub(crate) capacity: usize,
    pub(crate) ops: Vec<MsrBatchOp>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Access {
    Read,
    Write,
}

impl Batch {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ops: Vec::with_capacity(capacity),
        }
    }

    /// Switches every operation to `access` and clears errors of the previous
    /// submission.
    pub(crate) fn retag(&mut self, access: Access) {
        let is_read = match access {
            Access::Read => 1,
            Access::Write => 0,
        };

        for op in self.ops.iter_mut() {
            op.isrdmsr = is_read;
            op.err = 0;
        }
    }
}
