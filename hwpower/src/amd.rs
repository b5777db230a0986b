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

//! AMD Zen backend: package and per core power from the RAPL energy
//! registers.

use std::time::Instant;

use hwp_msr::BatchEngine;
use hwp_msr::BatchKind;
use hwp_msr::RegisterDevice;
use hwp_shared::types::LogicalProcessorId;
use hwp_shared::types::RegisterAddress;
use hwp_topology::Topology;
use hwp_units::UnitTable;

use crate::batches::ensure_batch;
use crate::rapl::EnergyCounter;
use crate::rapl::Rapl;
use crate::HwPowerResult;
use crate::PowerDomain;
use crate::RegisterEntry;
use crate::SocketPower;

const RAPL_POWER_UNIT: RegisterAddress = RegisterAddress::new(0xC001_0299);
const CORE_ENERGY_STATUS: RegisterAddress = RegisterAddress::new(0xC001_029A);
const PKG_ENERGY_STATUS: RegisterAddress = RegisterAddress::new(0xC001_029B);

#[derive(Debug)]
pub(crate) struct AmdCpu {
    msr: BatchEngine,
    rapl: Rapl,
}

impl AmdCpu {
    pub(crate) fn new(device: Box<dyn RegisterDevice>, topology: Topology, model: u32) -> Self {
        Self {
            msr: BatchEngine::new(device, topology),
            rapl: Rapl::new(RAPL_POWER_UNIT, UnitTable::for_model(model)),
        }
    }

    /// Package power per socket followed by the power of each of its cores.
    /// Core counters are read on the first hardware thread of every core.
    pub(crate) fn power(&mut self) -> HwPowerResult<Vec<SocketPower>> {
        let topology = *self.msr.topology();
        let sockets = topology.sockets() as usize;
        let cores = topology.total_cores() as usize;
        let core_threads = (0..topology.total_cores())
            .map(LogicalProcessorId::new)
            .collect::<Vec<_>>();

        let slots = ensure_batch(&mut self.msr, BatchKind::RaplData, sockets + cores, |msr| {
            msr.load_socket_leaders(BatchKind::RaplData, PKG_ENERGY_STATUS)?;
            msr.load(BatchKind::RaplData, CORE_ENERGY_STATUS, &core_threads)?;
            Ok(())
        })?;

        let report = self.msr.read(BatchKind::RaplData)?;
        let now = Instant::now();

        let (package, core) = slots.split_at(sockets);
        let mut counters = topology
            .socket_ids()
            .zip(package.iter().copied())
            .map(|(socket, slot)| EnergyCounter {
                socket,
                domain: PowerDomain::Package,
                slot,
            })
            .collect::<Vec<_>>();
        for (processor, &slot) in core_threads.iter().zip(core) {
            let coordinates = topology.coordinates(*processor)?;
            counters.push(EnergyCounter {
                socket: coordinates.socket,
                domain: PowerDomain::Core(coordinates.core),
                slot,
            });
        }

        self.rapl.power(&mut self.msr, &counters, &report, now)
    }
}

pub(crate) fn register_map() -> Vec<RegisterEntry> {
    vec![
        RegisterEntry {
            name: "MSR_RAPL_PWR_UNIT",
            address: RAPL_POWER_UNIT,
        },
        RegisterEntry {
            name: "MSR_CORE_ENERGY_STAT",
            address: CORE_ENERGY_STATUS,
        },
        RegisterEntry {
            name: "MSR_PKG_ENERGY_STAT",
            address: PKG_ENERGY_STATUS,
        },
    ]
}
