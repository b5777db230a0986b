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

//! Layouts shared with the `msr_batch` driver. They must stay bit-compatible
//! with `struct msr_batch_op` and `struct msr_batch_array`.

/// `struct msr_batch_op`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[repr(C)]
pub struct MsrBatchOp {
    pub cpu: u16,
    pub isrdmsr: u16,
    pub err: i32,
    pub msr: u32,
    pub msrdata: u64,
    pub wmask: u64,
}

/// `struct msr_batch_array`.
#[derive(Debug)]
#[repr(C)]
pub struct MsrBatchArray {
    pub numops: u32,
    pub ops: *mut MsrBatchOp,
}

impl MsrBatchOp {
    pub const NO_MASK: u64 = u64::MAX;

    pub fn read(cpu: u16, msr: u32) -> Self {
        Self {
            cpu,
            isrdmsr: 1,
            err: 0,
            msr,
            msrdata: 0,
            wmask: Self::NO_MASK,
        }
    }

    pub fn is_read(&self) -> bool {
        self.isrdmsr != 0
    }
}
