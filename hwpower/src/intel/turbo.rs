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

use hwp_msr::BatchKind;
use hwp_msr::BatchSlot;
use hwp_shared::bits::extract_bits;
use hwp_shared::bits::insert_bits;

use super::registers::*;
use super::IntelCpu;
use crate::batches::ensure_batch;
use crate::batches::measure;
use crate::batches::processor_failures;
use crate::batches::stage_masked;
use crate::HwPowerResult;
use crate::Measurement;
use crate::SocketTurbo;
use crate::WriteSummary;

const TURBO_DISABLE_BIT: u32 = 38;

impl IntelCpu {
    pub(crate) fn turbo(&mut self) -> HwPowerResult<Vec<SocketTurbo>> {
        let topology = self.topology();
        let slots = self.misc_enable_slots()?;
        let report = self.msr.read(BatchKind::MiscEnable)?;

        let sockets = topology
            .socket_ids()
            .zip(topology.socket_leaders())
            .map(|(socket, leader)| {
                // slots follow logical processor order
                let enabled = match slots.get(usize::from(leader)) {
                    Some(&slot) => measure(&self.msr, &report, slot).map(|raw| {
                        extract_bits(raw, TURBO_DISABLE_BIT, TURBO_DISABLE_BIT) == 0
                    }),
                    None => Measurement::Unavailable,
                };
                SocketTurbo { socket, enabled }
            })
            .collect();

        Ok(sockets)
    }

    pub(crate) fn set_turbo(&mut self, enabled: bool) -> HwPowerResult<WriteSummary> {
        let slots = self.misc_enable_slots()?;
        let read_report = self.msr.read(BatchKind::MiscEnable)?;

        let disable = u64::from(!enabled);
        for &slot in slots.iter() {
            stage_masked(
                &mut self.msr,
                &read_report,
                slot,
                |raw| insert_bits(raw, disable, TURBO_DISABLE_BIT, TURBO_DISABLE_BIT),
                1 << TURBO_DISABLE_BIT,
            )?;
        }

        let write_report = self.msr.write(BatchKind::MiscEnable)?;
        let failures = processor_failures(&[&read_report, &write_report]);
        let what = if enabled {
            "enable-turbo"
        } else {
            "disable-turbo"
        };
        WriteSummary::finish(what, slots.len(), failures)
    }

    fn misc_enable_slots(&mut self) -> HwPowerResult<Vec<BatchSlot>> {
        let threads = self.topology().total_threads() as usize;
        ensure_batch(&mut self.msr, BatchKind::MiscEnable, threads, |msr| {
            msr.load_all_threads(BatchKind::MiscEnable, MISC_ENABLE)
                .map(drop)
        })
    }
}
