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

use crate::UnitScale;
use crate::UnitsError;
use crate::UnitsResult;

pub fn bits_to_watts(raw: u64, scale: &UnitScale) -> f64 {
    raw as f64 * scale.watts_per_bit()
}

/// Truncates to the encoding resolution.
pub fn watts_to_bits(watts: f64, scale: &UnitScale) -> UnitsResult<u64> {
    to_bits("watts", watts, scale.watts_per_bit())
}

pub fn bits_to_joules(raw: u64, scale: &UnitScale) -> f64 {
    raw as f64 * scale.joules_per_bit()
}

pub fn joules_to_bits(joules: f64, scale: &UnitScale) -> UnitsResult<u64> {
    to_bits("joules", joules, scale.joules_per_bit())
}

pub fn bits_to_seconds(raw: u64, scale: &UnitScale) -> f64 {
    raw as f64 * scale.seconds_per_bit()
}

pub fn seconds_to_bits(seconds: f64, scale: &UnitScale) -> UnitsResult<u64> {
    to_bits("seconds", seconds, scale.seconds_per_bit())
}

fn to_bits(quantity: &'static str, value: f64, unit: f64) -> UnitsResult<u64> {
    if !value.is_finite() || value < 0.0 {
        return Err(UnitsError::invalid_quantity(quantity, value));
    }

    let bits = value / unit;
    if bits >= u64::MAX as f64 {
        return Err(UnitsError::invalid_quantity(quantity, value));
    }
    Ok(bits as u64)
}
