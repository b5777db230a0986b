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

//! Intel backend: RAPL power and limits, digital thermal sensors, clock
//! counters, P-states, fixed performance counters and turbo control, all
//! through model-specific registers.

mod clocks;
mod counters;
mod power;
pub(crate) mod registers;
mod thermal;
mod turbo;

use hwp_msr::BatchEngine;
use hwp_msr::RegisterDevice;
use hwp_topology::Topology;
use hwp_units::UnitTable;

use crate::rapl::Rapl;
use clocks::ClockTracker;

#[derive(Debug)]
pub(crate) struct IntelCpu {
    msr: BatchEngine,
    rapl: Rapl,
    clocks: ClockTracker,
}

impl IntelCpu {
    pub(crate) fn new(device: Box<dyn RegisterDevice>, topology: Topology, model: u32) -> Self {
        if !registers::VALIDATED_MODELS.contains(&model) {
            log::warn!("Intel model {model:#X} isn't validated, register layouts may differ");
        }

        Self {
            msr: BatchEngine::new(device, topology),
            rapl: Rapl::new(registers::RAPL_POWER_UNIT, UnitTable::for_model(model)),
            clocks: ClockTracker::default(),
        }
    }

    fn topology(&self) -> Topology {
        *self.msr.topology()
    }
}
