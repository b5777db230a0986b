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

use super::registers::*;
use super::IntelCpu;
use crate::batches::ensure_batch;
use crate::batches::measure;
use crate::batches::processor_failures;
use crate::batches::stage_masked;
use crate::HwPowerResult;
use crate::ThreadCounters;
use crate::WriteSummary;

/// OS and user ring counting plus any-thread for each of the three fixed
/// counters.
const FIXED_CTR_ENABLE: u64 = 0x777;
const FIXED_CTR_MASK: u64 = 0xFFF;
const GLOBAL_FIXED_ENABLE: u64 = 0x7 << 32;

impl IntelCpu {
    /// Instructions retired, unhalted core cycles and unhalted reference
    /// cycles of every logical processor.
    pub(crate) fn counters(&mut self) -> HwPowerResult<Vec<ThreadCounters>> {
        let topology = self.topology();
        let threads = topology.total_threads() as usize;
        let slots = ensure_batch(&mut self.msr, BatchKind::FixedCountersData, 3 * threads, |msr| {
            for counter in FIXED_COUNTERS {
                msr.load_all_threads(BatchKind::FixedCountersData, counter)?;
            }
            Ok(())
        })?;

        let report = self.msr.read(BatchKind::FixedCountersData)?;
        let (instructions, rest) = slots.split_at(threads);
        let (core_cycles, reference_cycles) = rest.split_at(threads);

        let counters = topology
            .all_logical_ids()
            .zip(instructions.iter().zip(core_cycles.iter().zip(reference_cycles)))
            .map(|(processor, (&instructions, (&core, &reference)))| ThreadCounters {
                processor,
                instructions_retired: measure(&self.msr, &report, instructions),
                core_cycles: measure(&self.msr, &report, core),
                reference_cycles: measure(&self.msr, &report, reference),
            })
            .collect();

        Ok(counters)
    }

    /// Starts the fixed counters on every logical processor, leaving the
    /// other bits of both control registers as they are.
    pub(crate) fn enable_counters(&mut self) -> HwPowerResult<WriteSummary> {
        let threads = self.topology().total_threads() as usize;
        let slots = ensure_batch(&mut self.msr, BatchKind::FixedCountersCtrl, 2 * threads, |msr| {
            msr.load_all_threads(BatchKind::FixedCountersCtrl, PERF_GLOBAL_CTRL)?;
            msr.load_all_threads(BatchKind::FixedCountersCtrl, FIXED_CTR_CTRL)?;
            Ok(())
        })?;

        let read_report = self.msr.read(BatchKind::FixedCountersCtrl)?;
        let (global, fixed) = slots.split_at(threads);
        for &slot in global {
            stage_masked(
                &mut self.msr,
                &read_report,
                slot,
                |raw| raw | GLOBAL_FIXED_ENABLE,
                GLOBAL_FIXED_ENABLE,
            )?;
        }
        for &slot in fixed {
            stage_masked(
                &mut self.msr,
                &read_report,
                slot,
                |raw| raw | FIXED_CTR_ENABLE,
                FIXED_CTR_MASK,
            )?;
        }

        let write_report = self.msr.write(BatchKind::FixedCountersCtrl)?;
        let failures = processor_failures(&[&read_report, &write_report]);
        WriteSummary::finish("enable-counters", threads, failures)
    }
}

#[cfg(test)]
mod tests {
    use hwp_shared::types::LogicalProcessorId;
    use hwp_shared::types::RegisterAddress;
    use hwp_test_utils::*;

    use super::*;
    use crate::Measurement;
    use crate::WriteTarget;

    #[test]
    fn enabling_sets_global_and_fixed_control_bits() {
        let topology = two_sockets();
        let device = intel_registers(&topology);
        set_on_threads(&device, &topology, 0x38D, 0x8);
        let mut cpu = IntelCpu::new(Box::new(device.clone()), topology, 0x55);

        let summary = cpu.enable_counters().unwrap();
        assert!(summary.is_complete());

        for processor in 0..8 {
            assert_eq!(get_on(&device, processor, 0x38F), Some(0x7_0000_000F));
            assert_eq!(get_on(&device, processor, 0x38D), Some(0x77F));
        }
    }

    #[test]
    fn unreadable_control_register_is_reported_once() {
        let topology = two_sockets();
        let device = intel_registers(&topology);
        device.inject_fault(LogicalProcessorId::new(6), RegisterAddress::new(0x38D));
        let mut cpu = IntelCpu::new(Box::new(device.clone()), topology, 0x55);

        let summary = cpu.enable_counters().unwrap();
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(
            summary.failures[0].target,
            WriteTarget::Processor(LogicalProcessorId::new(6))
        );
        assert_eq!(get_on(&device, 0, 0x38D), Some(0x777));
    }

    #[test]
    fn reads_fixed_counters_per_thread() {
        let topology = two_sockets();
        let device = intel_registers(&topology);
        device.set(LogicalProcessorId::new(5), RegisterAddress::new(0x309), 1_000);
        device.set(LogicalProcessorId::new(5), RegisterAddress::new(0x30A), 2_000);
        device.set(LogicalProcessorId::new(5), RegisterAddress::new(0x30B), 3_000);
        let mut cpu = IntelCpu::new(Box::new(device), topology, 0x55);

        let counters = cpu.counters().unwrap();
        assert_eq!(counters.len(), 8);
        assert_eq!(counters[5].processor, LogicalProcessorId::new(5));
        assert_eq!(counters[5].instructions_retired, Measurement::Value(1_000));
        assert_eq!(counters[5].core_cycles, Measurement::Value(2_000));
        assert_eq!(counters[5].reference_cycles, Measurement::Value(3_000));
        assert_eq!(counters[0].instructions_retired, Measurement::Value(0));
    }
}
