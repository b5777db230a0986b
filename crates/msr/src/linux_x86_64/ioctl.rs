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
use std::os::fd::AsRawFd;

use nix::errno::Errno;

use crate::wire::MsrBatchArray;
use crate::wire::MsrBatchOp;

// X86_IOC_MSR_BATCH
nix::ioctl_readwrite!(msr_batch_ioctl, b'c', 0xA2, MsrBatchArray);

pub(crate) fn submit_batch(file: &File, ops: &mut [MsrBatchOp]) -> nix::Result<()> {
    let numops = u32::try_from(ops.len()).map_err(|_| Errno::EINVAL)?;
    let mut array = MsrBatchArray {
        numops,
        ops: ops.as_mut_ptr(),
    };

    // SAFETY: `array` points to `numops` initialized ops that stay borrowed
    // for the duration of the call.
    unsafe { msr_batch_ioctl(file.as_raw_fd(), &mut array) }.map(|_| ())
}
