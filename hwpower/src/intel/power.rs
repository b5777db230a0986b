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

use std::time::Instant;

use hwp_msr::BatchKind;
use hwp_msr::RegisterWrite;
use hwp_units::PackagePowerLimits;
use hwp_units::PowerInfo;
use hwp_units::PowerLimit;

use super::registers::*;
use super::IntelCpu;
use crate::batches::ensure_batch;
use crate::rapl::EnergyCounter;
use crate::HwPowerResult;
use crate::PowerDomain;
use crate::SocketPower;
use crate::SocketPowerLimits;
use crate::WriteFailure;
use crate::WriteSummary;
use crate::WriteTarget;

impl IntelCpu {
    /// Package and DRAM power of every socket, from one submission of the
    /// energy counters.
    pub(crate) fn power(&mut self) -> HwPowerResult<Vec<SocketPower>> {
        let topology = self.topology();
        let sockets = topology.sockets() as usize;
        let slots = ensure_batch(&mut self.msr, BatchKind::RaplData, 2 * sockets, |msr| {
            msr.load_socket_leaders(BatchKind::RaplData, PKG_ENERGY_STATUS)?;
            msr.load_socket_leaders(BatchKind::RaplData, DRAM_ENERGY_STATUS)?;
            Ok(())
        })?;

        let report = self.msr.read(BatchKind::RaplData)?;
        let now = Instant::now();

        let (package, dram) = slots.split_at(sockets);
        let counters = topology
            .socket_ids()
            .zip(package.iter().zip(dram))
            .flat_map(|(socket, (&package, &dram))| {
                [
                    EnergyCounter {
                        socket,
                        domain: PowerDomain::Package,
                        slot: package,
                    },
                    EnergyCounter {
                        socket,
                        domain: PowerDomain::Dram,
                        slot: dram,
                    },
                ]
            })
            .collect::<Vec<_>>();

        self.rapl.power(&mut self.msr, &counters, &report, now)
    }

    pub(crate) fn power_limits(&mut self) -> HwPowerResult<Vec<SocketPowerLimits>> {
        let topology = self.topology();
        let mut limits = Vec::with_capacity(topology.sockets() as usize);

        for (socket, leader) in topology.socket_ids().zip(topology.socket_leaders()) {
            let scale = self.rapl.unit_scale(&mut self.msr, socket)?;
            let mut read = |register| self.msr.read_register(leader, register);

            let package = read(PKG_POWER_LIMIT).map(|raw| PackagePowerLimits::decode(raw, &scale));
            let package_info = read(PKG_POWER_INFO).map(|raw| PowerInfo::decode(raw, &scale));
            let dram = read(DRAM_POWER_LIMIT).map(|raw| PowerLimit::decode(raw, 0, &scale));
            let dram_info = read(DRAM_POWER_INFO).map(|raw| PowerInfo::decode(raw, &scale));

            limits.push(SocketPowerLimits {
                socket,
                package: package.into(),
                package_info: package_info.into(),
                dram: dram.into(),
                dram_info: dram_info.into(),
            });
        }

        Ok(limits)
    }

    /// Sets the first package limit of every socket to `watts`, keeping its
    /// time window and the second limit. Every value is encoded before the
    /// first write, so an out of range request changes nothing.
    pub(crate) fn set_socket_power_limit(&mut self, watts: f64) -> HwPowerResult<WriteSummary> {
        let topology = self.topology();
        let thresholds = *self.rapl.table().window_thresholds();
        let mut failures = Vec::new();
        let mut staged = Vec::new();

        for (socket, leader) in topology.socket_ids().zip(topology.socket_leaders()) {
            let scale = self.rapl.unit_scale(&mut self.msr, socket)?;
            let target = WriteTarget::Socket(socket);

            let raw = match self.msr.read_register(leader, PKG_POWER_LIMIT) {
                Ok(raw) => raw,
                Err(error) => {
                    failures.push(WriteFailure {
                        target,
                        reason: error.to_string(),
                    });
                    continue;
                }
            };

            let current = PackagePowerLimits::decode(raw, &scale);
            if current.locked {
                failures.push(WriteFailure {
                    target,
                    reason: "package power limit is locked until reset".to_string(),
                });
                continue;
            }

            let limit1 = PowerLimit::enforced(watts, current.limit1.seconds);
            let value = PackagePowerLimits::replace_limit1(raw, &limit1, &scale, &thresholds)?;
            staged.push((target, leader, value));
        }

        for (target, leader, value) in staged {
            log::debug!("{target:?}: package power limit {value:#X}");
            let write = RegisterWrite::new(PKG_POWER_LIMIT, value);
            if let Err(error) = self.msr.write_register(leader, write) {
                failures.push(WriteFailure {
                    target,
                    reason: error.to_string(),
                });
            }
        }

        WriteSummary::finish("set-socket-power-limit", topology.sockets() as usize, failures)
    }
}
