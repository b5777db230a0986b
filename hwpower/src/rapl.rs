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

use std::collections::BTreeMap;
use std::time::Instant;

use hwp_msr::BatchEngine;
use hwp_msr::BatchKind;
use hwp_msr::BatchReport;
use hwp_msr::BatchSlot;
use hwp_shared::types::RegisterAddress;
use hwp_shared::types::SocketId;
use hwp_units::EnergyDomain;
use hwp_units::EnergyTracker;
use hwp_units::ScaleSource;
use hwp_units::UnitScale;
use hwp_units::UnitScaleCache;
use hwp_units::UnitTable;

use crate::batches::ensure_batch;
use crate::DomainPower;
use crate::HwPowerError;
use crate::HwPowerResult;
use crate::Measurement;
use crate::PowerDomain;
use crate::SocketPower;

/// An energy counter loaded into a data batch.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct EnergyCounter {
    pub(crate) socket: SocketId,
    pub(crate) domain: PowerDomain,
    pub(crate) slot: BatchSlot,
}

/// Unit scales and previous energy samples of the RAPL domains of a node.
#[derive(Debug)]
pub(crate) struct Rapl {
    unit_register: RegisterAddress,
    table: UnitTable,
    scales: UnitScaleCache,
    energy: EnergyTracker<(SocketId, PowerDomain)>,
}

impl Rapl {
    pub(crate) fn new(unit_register: RegisterAddress, table: UnitTable) -> Self {
        Self {
            unit_register,
            table,
            scales: UnitScaleCache::new(),
            energy: EnergyTracker::new(),
        }
    }

    pub(crate) fn table(&self) -> &UnitTable {
        &self.table
    }

    pub(crate) fn unit_scale(
        &mut self,
        msr: &mut BatchEngine,
        socket: SocketId,
    ) -> HwPowerResult<UnitScale> {
        let mut source = UnitRegisters {
            msr,
            register: self.unit_register,
        };
        self.scales.get_unit_scale(socket, &mut source)
    }

    /// Turns counters read by one submission into power per socket. The
    /// first call for a counter only sets its baseline.
    pub(crate) fn power(
        &mut self,
        msr: &mut BatchEngine,
        counters: &[EnergyCounter],
        report: &BatchReport,
        now: Instant,
    ) -> HwPowerResult<Vec<SocketPower>> {
        let mut sockets = msr
            .topology()
            .socket_ids()
            .map(|socket| SocketPower {
                socket,
                domains: Vec::new(),
                sensor_energy_joules: BTreeMap::new(),
            })
            .collect::<Vec<_>>();

        for counter in counters {
            let energy_domain = energy_domain(counter.domain);
            let scale = self.unit_scale(msr, counter.socket)?;
            let scale = self.table.scale_for(energy_domain, &scale);

            let domain = match report.failure_for(counter.slot) {
                Some(failure) => DomainPower {
                    domain: counter.domain,
                    watts: Measurement::Failed(failure.to_string()),
                    energy: None,
                },
                None => {
                    let raw = msr.value(counter.slot)?;
                    let reading = self.energy.update(
                        (counter.socket, counter.domain),
                        raw,
                        self.table.counter_max(energy_domain),
                        &scale,
                        now,
                    );
                    DomainPower {
                        domain: counter.domain,
                        watts: Measurement::Value(reading.watts),
                        energy: Some(reading),
                    }
                }
            };

            if let Some(socket) = sockets.get_mut(usize::from(counter.socket)) {
                socket.domains.push(domain);
            }
        }

        Ok(sockets)
    }
}

fn energy_domain(domain: PowerDomain) -> EnergyDomain {
    match domain {
        PowerDomain::Package | PowerDomain::Processor => EnergyDomain::Package,
        PowerDomain::Dram | PowerDomain::Memory => EnergyDomain::Dram,
        PowerDomain::Core(_) => EnergyDomain::Core,
        PowerDomain::Node | PowerDomain::Gpu => EnergyDomain::Platform,
    }
}

/// Reads the unit register of every socket through the unit batch.
struct UnitRegisters<'engine> {
    msr: &'engine mut BatchEngine,
    register: RegisterAddress,
}

impl ScaleSource for UnitRegisters<'_> {
    type Error = HwPowerError;

    fn read_scale_registers(&mut self) -> HwPowerResult<Vec<u64>> {
        let register = self.register;
        let sockets = self.msr.topology().sockets() as usize;
        let slots = ensure_batch(self.msr, BatchKind::RaplUnit, sockets, |msr| {
            msr.load_socket_leaders(BatchKind::RaplUnit, register)
                .map(drop)
        })?;

        let report = self.msr.read(BatchKind::RaplUnit)?;
        if let Some(failure) = report.failures.first() {
            return Err(HwPowerError::Operation(*failure));
        }

        slots
            .into_iter()
            .map(|slot| self.msr.value(slot).map_err(Into::into))
            .collect()
    }
}
