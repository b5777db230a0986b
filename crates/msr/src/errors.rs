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

use nix::errno::Errno;
use thiserror::Error as ThisError;

use hwp_shared::types::LogicalProcessorId;
use hwp_shared::types::RegisterAddress;
use hwp_topology::TopologyError;

use crate::BatchKind;

#[derive(ThisError, Debug)]
pub enum MSRError {
    #[error("opening MSR file '{path:?}' for read and write there is an error: {io_error:?}")]
    OpenForReadWrite {
        path: PathBuf,
        io_error: std::io::Error,
    },

    #[error("access to '{path:?}' is denied, {hint}")]
    PermissionDenied { path: PathBuf, hint: &'static str },

    #[error(
        "reading from register {register} of logical processor {processor} there is an error: {errno:?}"
    )]
    ReadWNoErr {
        register: RegisterAddress,
        processor: LogicalProcessorId,
        errno: Errno,
    },

    #[error(
        "writing value {value:#X} for register {register} of logical processor {processor} there is an error: {errno:?}"
    )]
    WriteWNoErr {
        value: u64,
        register: RegisterAddress,
        processor: LogicalProcessorId,
        errno: Errno,
    },

    #[error("register {register} of logical processor {processor} transferred {bytes} bytes instead of 8")]
    ShortAccess {
        register: RegisterAddress,
        processor: LogicalProcessorId,
        bytes: usize,
    },

    #[error("no MSR device is open for logical processor {processor}")]
    NoDeviceForProcessor { processor: LogicalProcessorId },

    #[error("logical processor {processor} doesn't fit into the 16 bit batch cpu field")]
    ProcessorIdTooBig { processor: LogicalProcessorId },

    #[error("msr_batch ioctl failed: {errno:?}")]
    BatchIoctl { errno: Errno },

    #[error("batch {kind:?} is already allocated")]
    BatchAlreadyAllocated { kind: BatchKind },

    #[error("batch {kind:?} isn't allocated")]
    BatchNotAllocated { kind: BatchKind },

    #[error("batch {kind:?} holds at most {capacity} operations, {requested} requested")]
    BatchFull {
        kind: BatchKind,
        capacity: usize,
        requested: usize,
    },

    #[error("batch {kind:?} has no operations to submit")]
    EmptyBatch { kind: BatchKind },

    #[error("slot {index} doesn't exist in batch {kind:?}")]
    UnknownSlot { kind: BatchKind, index: usize },

    #[error(transparent)]
    Topology(#[from] TopologyError),

    #[error("model-specific registers aren't accessible on this target")]
    UnsupportedTarget,
}

impl MSRError {
    /// Kernel error code that best describes this failure.
    pub fn errno(&self) -> Errno {
        match self {
            Self::OpenForReadWrite { io_error, .. } => io_error
                .raw_os_error()
                .map(Errno::from_i32)
                .unwrap_or(Errno::EIO),
            Self::PermissionDenied { .. } => Errno::EACCES,
            Self::ReadWNoErr { errno, .. }
            | Self::WriteWNoErr { errno, .. }
            | Self::BatchIoctl { errno } => *errno,
            Self::NoDeviceForProcessor { .. } => Errno::ENODEV,
            Self::UnsupportedTarget => Errno::ENOSYS,
            _ => Errno::EINVAL,
        }
    }

    pub fn is_permission_error(&self) -> bool {
        matches!(self, Self::PermissionDenied { .. })
    }

    pub(crate) fn read_w_no_err(
        register: RegisterAddress,
        processor: LogicalProcessorId,
        errno: Errno,
    ) -> Self {
        Self::ReadWNoErr {
            register,
            processor,
            errno,
        }
    }

    pub(crate) fn write_w_no_err(
        value: u64,
        register: RegisterAddress,
        processor: LogicalProcessorId,
        errno: Errno,
    ) -> Self {
        Self::WriteWNoErr {
            value,
            register,
            processor,
            errno,
        }
    }

    pub(crate) fn batch_not_allocated(kind: BatchKind) -> Self {
        Self::BatchNotAllocated { kind }
    }

    pub(crate) fn unknown_slot(kind: BatchKind, index: usize) -> Self {
        Self::UnknownSlot { kind, index }
    }
}
