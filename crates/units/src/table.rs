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

use serde::Serialize;

use crate::EnergyDomain;
use crate::UnitScale;
use crate::WindowThresholds;

/// Models whose DRAM energy counter uses a fixed 15.3 uJ unit instead of the
/// one advertised in the unit register.
const FIXED_DRAM_UNIT_MODELS: &[u32] = &[0x3F, 0x4F];
const FIXED_DRAM_ENERGY_EXPONENT: u8 = 16;

const ENERGY_COUNTER_BITS: u32 = 32;

/// Per processor model deviations from the generic RAPL encoding.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct UnitTable {
    model: u32,
    dram_energy_exponent: Option<u8>,
    counter_bits: u32,
    thresholds: WindowThresholds,
}

impl UnitTable {
    pub fn for_model(model: u32) -> Self {
        let dram_energy_exponent = FIXED_DRAM_UNIT_MODELS
            .contains(&model)
            .then_some(FIXED_DRAM_ENERGY_EXPONENT);

        Self {
            model,
            dram_energy_exponent,
            counter_bits: ENERGY_COUNTER_BITS,
            thresholds: WindowThresholds::default(),
        }
    }

    pub fn model(&self) -> u32 {
        self.model
    }

    /// Scale to use for counters of `domain`.
    pub fn scale_for(&self, domain: EnergyDomain, scale: &UnitScale) -> UnitScale {
        match (domain, self.dram_energy_exponent) {
            (EnergyDomain::Dram, Some(exponent)) => scale.with_energy_exponent(exponent),
            _ => *scale,
        }
    }

    /// Largest raw value of the energy counter of `domain` before it wraps.
    pub fn counter_max(&self, _domain: EnergyDomain) -> u64 {
        (1u64 << self.counter_bits) - 1
    }

    pub fn window_thresholds(&self) -> &WindowThresholds {
        &self.thresholds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dram_unit_is_fixed_on_listed_models() {
        let scale = UnitScale::new(3, 14, 10);

        for model in [0x3F, 0x4F] {
            let table = UnitTable::for_model(model);
            assert_eq!(table.scale_for(EnergyDomain::Dram, &scale).energy_exponent(), 16);
            assert_eq!(table.scale_for(EnergyDomain::Package, &scale), scale);
        }
    }

    #[test]
    fn other_models_use_advertised_unit() {
        let scale = UnitScale::new(3, 14, 10);
        let table = UnitTable::for_model(0x55);

        assert_eq!(table.scale_for(EnergyDomain::Dram, &scale), scale);
        assert_eq!(table.counter_max(EnergyDomain::Package), u32::MAX as u64);
        assert_eq!(*table.window_thresholds(), WindowThresholds::default());
    }
}
