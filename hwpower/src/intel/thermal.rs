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
use hwp_shared::bits::extract_bits;

use super::registers::*;
use super::IntelCpu;
use crate::batches::ensure_batch;
use crate::batches::measure;
use crate::HwPowerResult;
use crate::Measurement;
use crate::SocketThermals;
use crate::ThreadThermal;

const READING_VALID_BIT: u32 = 31;

impl IntelCpu {
    /// Package and per thread temperatures. Readouts count degrees below the
    /// TCC activation target of their socket.
    pub(crate) fn thermals(&mut self) -> HwPowerResult<Vec<SocketThermals>> {
        let topology = self.topology();
        let sockets = topology.sockets() as usize;
        let threads = topology.total_threads() as usize;

        let target_slots = ensure_batch(&mut self.msr, BatchKind::TempTarget, sockets, |msr| {
            msr.load_socket_leaders(BatchKind::TempTarget, TEMPERATURE_TARGET)
                .map(drop)
        })?;
        let package_slots = ensure_batch(&mut self.msr, BatchKind::PkgThermStatus, sockets, |msr| {
            msr.load_socket_leaders(BatchKind::PkgThermStatus, PACKAGE_THERM_STATUS)
                .map(drop)
        })?;
        let thread_slots = ensure_batch(&mut self.msr, BatchKind::ThermStatus, threads, |msr| {
            msr.load_all_threads(BatchKind::ThermStatus, THERM_STATUS)
                .map(drop)
        })?;

        let target_report = self.msr.read(BatchKind::TempTarget)?;
        let package_report = self.msr.read(BatchKind::PkgThermStatus)?;
        let thread_report = self.msr.read(BatchKind::ThermStatus)?;

        let mut thermals = topology
            .socket_ids()
            .zip(target_slots.iter().zip(package_slots.iter()))
            .map(|(socket, (&target_slot, &package_slot))| {
                let target = measure(&self.msr, &target_report, target_slot)
                    .map(|raw| extract_bits(raw, 23, 16));
                let package = measure(&self.msr, &package_report, package_slot);
                let package_celsius = below_target(&target, &package, false);

                SocketThermals {
                    socket,
                    tcc_target_celsius: target,
                    package_celsius,
                    threads: Vec::with_capacity(threads / sockets),
                }
            })
            .collect::<Vec<_>>();

        for (processor, slot) in topology.all_logical_ids().zip(thread_slots) {
            let coordinates = topology.coordinates(processor)?;
            let Some(socket) = thermals.get_mut(usize::from(coordinates.socket)) else {
                continue;
            };

            let status = measure(&self.msr, &thread_report, slot);
            socket.threads.push(ThreadThermal {
                processor,
                core: coordinates.core,
                thread: coordinates.thread,
                celsius: below_target(&socket.tcc_target_celsius, &status, true),
            });
        }

        Ok(thermals)
    }
}

fn below_target(
    target: &Measurement<u64>,
    status: &Measurement<u64>,
    check_valid: bool,
) -> Measurement<u64> {
    match (target, status) {
        (Measurement::Value(target), Measurement::Value(raw)) => {
            if check_valid && extract_bits(*raw, READING_VALID_BIT, READING_VALID_BIT) == 0 {
                return Measurement::Unavailable;
            }
            Measurement::Value(target.saturating_sub(extract_bits(*raw, 22, 16)))
        }
        (Measurement::Failed(reason), _) | (_, Measurement::Failed(reason)) => {
            Measurement::Failed(reason.clone())
        }
        _ => Measurement::Unavailable,
    }
}

#[cfg(test)]
mod tests {
    use hwp_shared::types::LogicalProcessorId;
    use hwp_shared::types::RegisterAddress;
    use hwp_test_utils::*;

    use super::*;

    #[test]
    fn temperatures_are_relative_to_tcc_target() {
        let topology = two_sockets();
        let device = intel_registers(&topology);
        let mut cpu = IntelCpu::new(Box::new(device), topology, 0x55);

        let thermals = cpu.thermals().unwrap();
        assert_eq!(thermals.len(), 2);
        for socket in thermals.iter() {
            assert_eq!(socket.tcc_target_celsius, Measurement::Value(100));
            assert_eq!(socket.package_celsius, Measurement::Value(65));
            assert_eq!(socket.threads.len(), 4);
            assert!(socket
                .threads
                .iter()
                .all(|thread| thread.celsius == Measurement::Value(60)));
        }

        let processors = thermals[1]
            .threads
            .iter()
            .map(|thread| thread.processor.get())
            .collect::<Vec<_>>();
        assert_eq!(processors, vec![2, 3, 6, 7]);
    }

    #[test]
    fn invalid_readout_is_unavailable() {
        let topology = two_sockets();
        let device = intel_registers(&topology);
        device.set(
            LogicalProcessorId::new(5),
            RegisterAddress::new(0x19C),
            0x0028_0000,
        );
        let mut cpu = IntelCpu::new(Box::new(device), topology, 0x55);

        let thermals = cpu.thermals().unwrap();
        let thread = thermals[0]
            .threads
            .iter()
            .find(|thread| thread.processor.get() == 5)
            .unwrap();
        assert_eq!(thread.celsius, Measurement::Unavailable);
    }

    #[test]
    fn missing_target_fails_the_whole_socket() {
        let topology = two_sockets();
        let device = intel_registers(&topology);
        device.inject_fault(LogicalProcessorId::new(2), RegisterAddress::new(0x1A2));
        let mut cpu = IntelCpu::new(Box::new(device), topology, 0x55);

        let thermals = cpu.thermals().unwrap();
        assert!(thermals[1].tcc_target_celsius.is_failed());
        assert!(thermals[1].package_celsius.is_failed());
        assert!(thermals[1].threads.iter().all(|thread| thread.celsius.is_failed()));
        assert_eq!(thermals[0].package_celsius, Measurement::Value(65));
    }
}
