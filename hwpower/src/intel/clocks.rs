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
use std::time::Instant;

use hwp_msr::BatchKind;
use hwp_shared::bits::extract_bits;
use hwp_shared::types::LogicalProcessorId;
use hwp_shared::types::SocketId;

use super::registers::*;
use super::IntelCpu;
use crate::batches::ensure_batch;
use crate::batches::measure;
use crate::batches::processor_failures;
use crate::HwPowerError;
use crate::HwPowerResult;
use crate::Measurement;
use crate::SocketClocks;
use crate::ThreadClocks;
use crate::WriteSummary;

const MHZ_PER_RATIO: u64 = 100;
const MAX_RATIO: u64 = 0xFF;
const PERF_CTL_MASK: u64 = 0xFFFF;

#[derive(Copy, Clone, Debug, PartialEq)]
struct ClockSnapshot {
    aperf: u64,
    mperf: u64,
    tsc: u64,
    at: Instant,
}

/// Previous APERF, MPERF and TSC values of every logical processor.
#[derive(Debug, Default)]
pub(crate) struct ClockTracker {
    previous: HashMap<LogicalProcessorId, ClockSnapshot>,
}

impl ClockTracker {
    /// Effective and TSC frequency since the previous snapshot, both
    /// unavailable on the first one.
    fn update(
        &mut self,
        processor: LogicalProcessorId,
        snapshot: ClockSnapshot,
        base_mhz: f64,
    ) -> (Measurement<f64>, Measurement<f64>) {
        let Some(previous) = self.previous.insert(processor, snapshot) else {
            return (Measurement::Unavailable, Measurement::Unavailable);
        };

        let aperf = snapshot.aperf.wrapping_sub(previous.aperf);
        let mperf = snapshot.mperf.wrapping_sub(previous.mperf);
        let tsc = snapshot.tsc.wrapping_sub(previous.tsc);
        let elapsed = snapshot
            .at
            .saturating_duration_since(previous.at)
            .as_secs_f64();

        let effective = match mperf {
            0 => Measurement::Unavailable,
            mperf => Measurement::Value(base_mhz * aperf as f64 / mperf as f64),
        };
        let tsc_mhz = if elapsed > 0.0 {
            Measurement::Value(tsc as f64 / elapsed / 1e6)
        } else {
            Measurement::Unavailable
        };

        (effective, tsc_mhz)
    }
}

impl IntelCpu {
    /// Maximum non-turbo frequency, which every socket has to agree on.
    pub(crate) fn base_frequency(&mut self) -> HwPowerResult<f64> {
        let sockets = self.topology().sockets() as usize;
        let slots = ensure_batch(&mut self.msr, BatchKind::PlatformInfo, sockets, |msr| {
            msr.load_socket_leaders(BatchKind::PlatformInfo, PLATFORM_INFO)
                .map(drop)
        })?;

        let report = self.msr.read(BatchKind::PlatformInfo)?;
        if let Some(failure) = report.failures.first() {
            return Err(HwPowerError::Operation(*failure));
        }

        let mut expected = None;
        for (socket, slot) in slots.into_iter().enumerate() {
            let ratio = extract_bits(self.msr.value(slot)?, 15, 8);
            match expected {
                None => expected = Some(ratio),
                Some(expected) if expected != ratio => {
                    return Err(HwPowerError::SocketMismatch {
                        what: "maximum non-turbo ratio",
                        socket: SocketId::new(socket as u32),
                        expected,
                        actual: ratio,
                    })
                }
                Some(_) => {}
            }
        }

        Ok((expected.unwrap_or_default() * MHZ_PER_RATIO) as f64)
    }

    pub(crate) fn frequencies(&mut self) -> HwPowerResult<Vec<SocketClocks>> {
        let topology = self.topology();
        let sockets = topology.sockets() as usize;
        let threads = topology.total_threads() as usize;
        let base_mhz = self.base_frequency()?;

        let perf_slots = ensure_batch(&mut self.msr, BatchKind::PerfData, sockets, |msr| {
            msr.load_socket_leaders(BatchKind::PerfData, PERF_STATUS)
                .map(drop)
        })?;
        let clock_slots = ensure_batch(&mut self.msr, BatchKind::ClocksData, 3 * threads, |msr| {
            msr.load_all_threads(BatchKind::ClocksData, APERF)?;
            msr.load_all_threads(BatchKind::ClocksData, MPERF)?;
            msr.load_all_threads(BatchKind::ClocksData, TIME_STAMP_COUNTER)?;
            Ok(())
        })?;

        let perf_report = self.msr.read(BatchKind::PerfData)?;
        let clock_report = self.msr.read(BatchKind::ClocksData)?;
        let now = Instant::now();

        let mut clocks = topology
            .socket_ids()
            .zip(perf_slots)
            .map(|(socket, slot)| SocketClocks {
                socket,
                base_mhz,
                pstate_mhz: measure(&self.msr, &perf_report, slot)
                    .map(|raw| (extract_bits(raw, 15, 8) * MHZ_PER_RATIO) as f64),
                threads: Vec::with_capacity(threads / sockets),
            })
            .collect::<Vec<_>>();

        let (aperf, rest) = clock_slots.split_at(threads);
        let (mperf, tsc) = rest.split_at(threads);
        for (index, processor) in topology.all_logical_ids().enumerate() {
            let coordinates = topology.coordinates(processor)?;
            let read = |slots: &[_]| measure(&self.msr, &clock_report, slots[index]);

            let (effective_mhz, tsc_mhz) = match (read(aperf), read(mperf), read(tsc)) {
                (Measurement::Value(aperf), Measurement::Value(mperf), Measurement::Value(tsc)) => {
                    let snapshot = ClockSnapshot {
                        aperf,
                        mperf,
                        tsc,
                        at: now,
                    };
                    self.clocks.update(processor, snapshot, base_mhz)
                }
                (Measurement::Failed(reason), _, _)
                | (_, Measurement::Failed(reason), _)
                | (_, _, Measurement::Failed(reason)) => (
                    Measurement::Failed(reason.clone()),
                    Measurement::Failed(reason),
                ),
                _ => (Measurement::Unavailable, Measurement::Unavailable),
            };

            if let Some(socket) = clocks.get_mut(usize::from(coordinates.socket)) {
                socket.threads.push(ThreadClocks {
                    processor,
                    core: coordinates.core,
                    thread: coordinates.thread,
                    effective_mhz,
                    tsc_mhz,
                });
            }
        }

        Ok(clocks)
    }

    /// Requests `mhz` on every logical processor through its P-state
    /// control register.
    pub(crate) fn set_core_frequency(&mut self, mhz: u64) -> HwPowerResult<WriteSummary> {
        let ratio = mhz / MHZ_PER_RATIO;
        if ratio == 0 || ratio > MAX_RATIO {
            return Err(HwPowerError::out_of_range(
                "core frequency in MHz",
                mhz as f64,
                MHZ_PER_RATIO as f64,
                (MAX_RATIO * MHZ_PER_RATIO) as f64,
            ));
        }

        let threads = self.topology().total_threads() as usize;
        let slots = ensure_batch(&mut self.msr, BatchKind::PerfCtrl, threads, |msr| {
            msr.load_all_threads(BatchKind::PerfCtrl, PERF_CTL).map(drop)
        })?;

        for slot in slots.iter().copied() {
            self.msr.set_value(slot, ratio << 8)?;
            self.msr.set_write_mask(slot, PERF_CTL_MASK)?;
        }
        let report = self.msr.write(BatchKind::PerfCtrl)?;

        let failures = processor_failures(&[&report]);
        WriteSummary::finish("set-core-frequency", slots.len(), failures)
    }
}
