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

use hwp_shared::types::LogicalProcessorId;
use hwp_shared::types::RegisterAddress;

use crate::wire::MsrBatchOp;
use crate::MSRResult;

/// Result of handing a batch to a device.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BatchSubmission {
    /// The batch went down as one transaction, per-operation errors are in
    /// the `err` field of every op.
    Submitted,
    /// The device has no transactional path, the caller has to issue the
    /// operations one by one.
    Unavailable,
}

/// Register file of a node, addressed by logical processor and register.
pub trait RegisterDevice: Send {
    fn read(&mut self, processor: LogicalProcessorId, register: RegisterAddress)
        -> MSRResult<u64>;

    fn write(
        &mut self,
        processor: LogicalProcessorId,
        register: RegisterAddress,
        value: u64,
    ) -> MSRResult<()>;

    /// Submits all `ops` as a single transaction. Reads update `msrdata` in
    /// place.
    fn submit_batch(&mut self, ops: &mut [MsrBatchOp]) -> MSRResult<BatchSubmission>;
}
