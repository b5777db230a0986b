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

use hwp_shared::bits::extract_bits;
use hwp_shared::types::SocketId;

use crate::UnitsError;

/// Power, energy and time resolution of a RAPL domain.
///
/// Only the exponents are kept; each unit is `1 / 2^exponent` and is computed
/// where it is used, which keeps every unit an exact power of two.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct UnitScale {
    power_exponent: u8,
    energy_exponent: u8,
    time_exponent: u8,
}

impl UnitScale {
    pub const fn new(power_exponent: u8, energy_exponent: u8, time_exponent: u8) -> Self {
        Self {
            power_exponent,
            energy_exponent,
            time_exponent,
        }
    }

    /// Decodes a raw power unit register: power in bits 3:0, energy in 12:8
    /// and time in 19:16.
    pub fn from_raw(raw: u64) -> Self {
        Self {
            power_exponent: extract_bits(raw, 3, 0) as u8,
            energy_exponent: extract_bits(raw, 12, 8) as u8,
            time_exponent: extract_bits(raw, 19, 16) as u8,
        }
    }

    pub fn with_energy_exponent(self, energy_exponent: u8) -> Self {
        Self {
            energy_exponent,
            ..self
        }
    }

    pub fn power_exponent(&self) -> u8 {
        self.power_exponent
    }

    pub fn energy_exponent(&self) -> u8 {
        self.energy_exponent
    }

    pub fn time_exponent(&self) -> u8 {
        self.time_exponent
    }

    pub fn watts_per_bit(&self) -> f64 {
        inverse_power_of_two(self.power_exponent)
    }

    pub fn joules_per_bit(&self) -> f64 {
        inverse_power_of_two(self.energy_exponent)
    }

    pub fn seconds_per_bit(&self) -> f64 {
        inverse_power_of_two(self.time_exponent)
    }
}

fn inverse_power_of_two(exponent: u8) -> f64 {
    2f64.powi(-i32::from(exponent))
}

/// Supplies raw unit registers, one per socket in socket order.
pub trait ScaleSource {
    type Error: From<UnitsError>;

    fn read_scale_registers(&mut self) -> Result<Vec<u64>, Self::Error>;
}

/// Unit scales of every socket, read once.
#[derive(Clone, Debug, Default)]
pub struct UnitScaleCache {
    scales: Option<Vec<UnitScale>>,
}

impl UnitScaleCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loaded(&self) -> bool {
        self.scales.is_some()
    }

    /// Returns the scale of `socket`, reading the unit registers of all
    /// sockets on the first call. Sockets must agree on their scale.
    pub fn get_unit_scale<S: ScaleSource>(
        &mut self,
        socket: SocketId,
        source: &mut S,
    ) -> Result<UnitScale, S::Error> {
        if self.scales.is_none() {
            let raw = source.read_scale_registers()?;
            let scales = consistent_scales(&raw)?;
            tracing::debug!("unit scale {:?} on {} sockets", scales.first(), scales.len());
            self.scales = Some(scales);
        }

        self.scales
            .as_ref()
            .and_then(|scales| scales.get(usize::from(socket)))
            .copied()
            .ok_or_else(|| UnitsError::MissingScale { socket }.into())
    }
}

fn consistent_scales(raw: &[u64]) -> Result<Vec<UnitScale>, UnitsError> {
    let scales = raw
        .iter()
        .copied()
        .map(UnitScale::from_raw)
        .collect::<Vec<_>>();

    let expected = scales.first().copied().ok_or(UnitsError::MissingScale {
        socket: SocketId::new(0),
    })?;

    for (socket, actual) in scales.iter().enumerate() {
        if *actual != expected {
            return Err(UnitsError::InconsistentScale {
                socket: SocketId::new(socket as u32),
                expected,
                actual: *actual,
            });
        }
    }

    Ok(scales)
}
