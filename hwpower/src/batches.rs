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

use hwp_msr::BatchEngine;
use hwp_msr::BatchKind;
use hwp_msr::BatchReport;
use hwp_msr::BatchSlot;
use hwp_msr::MSRResult;
use itertools::Itertools;

use crate::HwPowerError;
use crate::HwPowerResult;
use crate::Measurement;
use crate::WriteFailure;
use crate::WriteTarget;

/// Allocates `kind` and fills it through `load` on first use. Later calls
/// hand out the slots loaded back then.
///
/// A batch whose load fails is released again, and a batch holding other
/// than `size` slots is an error, so callers can index every slot.
pub(crate) fn ensure_batch(
    msr: &mut BatchEngine,
    kind: BatchKind,
    size: usize,
    load: impl FnOnce(&mut BatchEngine) -> MSRResult<()>,
) -> HwPowerResult<Vec<BatchSlot>> {
    if !msr.is_allocated(kind) {
        msr.allocate(kind, size)?;
        if let Err(error) = load(msr) {
            msr.release(kind);
            return Err(error.into());
        }
    }

    let slots = msr.slots(kind)?;
    if slots.len() != size {
        msr.release(kind);
        return Err(HwPowerError::IncompleteBatch {
            kind,
            expected: size,
            loaded: slots.len(),
        });
    }

    Ok(slots)
}

/// Result of one slot after a submission, failed operations are kept as
/// data.
pub(crate) fn measure(
    msr: &BatchEngine,
    report: &BatchReport,
    slot: BatchSlot,
) -> Measurement<u64> {
    match report.failure_for(slot) {
        Some(failure) => Measurement::Failed(failure.to_string()),
        None => msr.value(slot).into(),
    }
}

/// Restricts a following write to `mask`, or to nothing when the slot
/// couldn't be read and its staged value is meaningless.
pub(crate) fn stage_masked(
    msr: &mut BatchEngine,
    report: &BatchReport,
    slot: BatchSlot,
    update: impl FnOnce(u64) -> u64,
    mask: u64,
) -> HwPowerResult<()> {
    if report.failure_for(slot).is_some() {
        msr.set_write_mask(slot, 0)?;
        return Ok(());
    }

    let current = msr.value(slot)?;
    msr.set_value(slot, update(current))?;
    msr.set_write_mask(slot, mask)?;
    Ok(())
}

/// Failed operations of a read-modify-write cycle, one entry per logical
/// processor.
pub(crate) fn processor_failures(reports: &[&BatchReport]) -> Vec<WriteFailure> {
    reports
        .iter()
        .flat_map(|report| report.failures.iter())
        .sorted_by_key(|failure| failure.processor)
        .dedup_by(|left, right| left.processor == right.processor)
        .map(|failure| WriteFailure {
            target: WriteTarget::Processor(failure.processor),
            reason: failure.to_string(),
        })
        .collect()
}
