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

use hwp_shared::types::LogicalProcessorId;
use hwp_shared::types::RegisterAddress;

use crate::MSRError;
use crate::MSRResult;

const REGISTER_SIZE: usize = 8;

pub(crate) fn read_msr(
    file: &File,
    register: RegisterAddress,
    processor: LogicalProcessorId,
) -> MSRResult<u64> {
    use nix::sys::uio::pread;

    let mut value = [0u8; REGISTER_SIZE];
    let bytes = pread(file, &mut value, register.get() as i64)
        .map_err(|errno| MSRError::read_w_no_err(register, processor, errno))?;
    if bytes != REGISTER_SIZE {
        return Err(MSRError::ShortAccess {
            register,
            processor,
            bytes,
        });
    }
    let result = u64::from_le_bytes(value);

    tracing::trace!("read register {register} value {result:#X} at logical processor {processor}");

    Ok(result)
}

pub(crate) fn write_msr(
    file: &File,
    register: RegisterAddress,
    value: u64,
    processor: LogicalProcessorId,
) -> MSRResult<()> {
    use nix::sys::uio::pwrite;

    let value_as_bytes = value.to_le_bytes();
    let bytes = pwrite(file, &value_as_bytes, register.get() as i64)
        .map_err(|errno| MSRError::write_w_no_err(value, register, processor, errno))?;
    if bytes != REGISTER_SIZE {
        return Err(MSRError::ShortAccess {
            register,
            processor,
            bytes,
        });
    }

    Ok(())
}

pub(crate) fn open_read_write(path: &Path) -> io::Result<File> {
    use std::fs::OpenOptions;

    OpenOptions::new().read(true).write(true).open(path)
}
