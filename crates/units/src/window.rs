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

//! Time windows are stored as `2^y * (1 + z/4)` time units, with `y` in bits
//! 4:0 and `z` in bits 6:5 of a 7 bit field. Encoding takes `y` as the integer
//! part of `log2(units)` and picks `z` from its fractional part.

use serde::Serialize;

use crate::UnitScale;
use crate::UnitsError;
use crate::UnitsResult;

const EXPONENT_MASK: u64 = 0x1F;
const MANTISSA_MASK: u64 = 0x60;
const MANTISSA_SHIFT: u32 = 5;
const MAX_EXPONENT: i64 = 31;

/// Thresholds on the fractional part of `log2(units)` selecting the window
/// mantissa.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct WindowThresholds {
    pub quarter: f64,
    pub half: f64,
    pub three_quarters: f64,
}

impl Default for WindowThresholds {
    fn default() -> Self {
        Self {
            quarter: 0.15,
            half: 0.45,
            three_quarters: 0.7,
        }
    }
}

/// Picks `z` for the fractional part of `log2(units)`.
pub fn window_mantissa(remainder: f64, thresholds: &WindowThresholds) -> u64 {
    if remainder > thresholds.three_quarters {
        3
    } else if remainder > thresholds.half {
        2
    } else if remainder > thresholds.quarter {
        1
    } else {
        0
    }
}

pub fn bits_to_seconds_std(bits: u64, scale: &UnitScale) -> f64 {
    let y = (bits & EXPONENT_MASK) as i32;
    let z = ((bits & MANTISSA_MASK) >> MANTISSA_SHIFT) as f64;

    (1.0 + 0.25 * z) * 2f64.powi(y) * scale.seconds_per_bit()
}

pub fn seconds_to_bits_std(
    seconds: f64,
    scale: &UnitScale,
    thresholds: &WindowThresholds,
) -> UnitsResult<u64> {
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(UnitsError::invalid_quantity("seconds", seconds));
    }

    let units = seconds / scale.seconds_per_bit();
    if units < 1.0 {
        return Err(UnitsError::TimeWindowOutOfRange { seconds });
    }

    let y = binary_exponent(units);
    if y > MAX_EXPONENT {
        return Err(UnitsError::TimeWindowOutOfRange { seconds });
    }

    let remainder = units.log2() - y as f64;
    let z = window_mantissa(remainder, thresholds);

    Ok((y as u64) | (z << MANTISSA_SHIFT))
}

// floor(log2(value)) for a normal, positive value
fn binary_exponent(value: f64) -> i64 {
    ((value.to_bits() >> 52) & 0x7FF) as i64 - 1023
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    fn scale() -> UnitScale {
        UnitScale::new(3, 14, 10)
    }

    #[test]
    fn mantissa_thresholds_are_exclusive() {
        let thresholds = WindowThresholds::default();

        assert_eq!(window_mantissa(0.0, &thresholds), 0);
        assert_eq!(window_mantissa(0.15, &thresholds), 0);
        assert_eq!(window_mantissa(0.15 + EPSILON, &thresholds), 1);
        assert_eq!(window_mantissa(0.45 - EPSILON, &thresholds), 1);
        assert_eq!(window_mantissa(0.45, &thresholds), 1);
        assert_eq!(window_mantissa(0.45 + EPSILON, &thresholds), 2);
        assert_eq!(window_mantissa(0.7 - EPSILON, &thresholds), 2);
        assert_eq!(window_mantissa(0.7, &thresholds), 2);
        assert_eq!(window_mantissa(0.7 + EPSILON, &thresholds), 3);
        assert_eq!(window_mantissa(0.99, &thresholds), 3);
    }

    #[test]
    fn encodes_around_threshold_boundaries() {
        let scale = scale();
        let thresholds = WindowThresholds::default();
        let encode = |seconds| seconds_to_bits_std(seconds, &scale, &thresholds).unwrap();
        // one second is 2^10 time units, so log2(units) = 10 + log2(seconds)
        let at = |fraction: f64| 2f64.powf(fraction);
        let step = 1e-6;

        assert_eq!(encode(1.0), 10);
        assert_eq!(encode(at(0.15 - step)), 10);
        assert_eq!(encode(at(0.15 + step)), 10 | 1 << 5);
        assert_eq!(encode(at(0.45 - step)), 10 | 1 << 5);
        assert_eq!(encode(at(0.45 + step)), 10 | 2 << 5);
        assert_eq!(encode(at(0.7 - step)), 10 | 2 << 5);
        assert_eq!(encode(at(0.7 + step)), 10 | 3 << 5);
        assert_eq!(encode(at(0.99)), 10 | 3 << 5);

        // the boundaries move with the exponent
        assert_eq!(encode(8.0 * at(0.45 - step)), 13 | 1 << 5);
        assert_eq!(encode(8.0 * at(0.45 + step)), 13 | 2 << 5);
    }

    #[test]
    fn mantissa_follows_log_remainder() {
        // one time unit per second
        let scale = UnitScale::new(3, 14, 0);
        let thresholds = WindowThresholds::default();

        // log2(1.4) = 0.485, above the 0.45 threshold although 1.4 - 1 isn't
        let bits = seconds_to_bits_std(1.4, &scale, &thresholds).unwrap();
        assert_eq!(bits, 2 << 5);
        assert_eq!(bits_to_seconds_std(bits, &scale), 1.5);

        // log2(1.1) = 0.1375 stays on the plain power of two
        assert_eq!(seconds_to_bits_std(1.1, &scale, &thresholds).unwrap(), 0);
        // log2(1.15) = 0.2016 already takes the first quarter
        assert_eq!(seconds_to_bits_std(1.15, &scale, &thresholds).unwrap(), 1 << 5);
    }

    #[test]
    fn every_encoding_round_trips() {
        let scale = scale();
        let thresholds = WindowThresholds::default();

        for y in 0..=31u64 {
            for z in 0..=3u64 {
                let bits = y | z << 5;
                let seconds = bits_to_seconds_std(bits, &scale);
                let back = seconds_to_bits_std(seconds, &scale, &thresholds).unwrap();
                assert_eq!(back, bits, "y {y} z {z} seconds {seconds}");
            }
        }
    }

    #[test]
    fn decodes_known_window() {
        // y = 3, z = 2 -> 1.5 * 8 units of 1/1024 s
        let seconds = bits_to_seconds_std(3 | 2 << 5, &scale());
        assert_eq!(seconds, 12.0 / 1024.0);
    }

    #[test]
    fn rejects_unencodable_windows() {
        let scale = scale();
        let thresholds = WindowThresholds::default();

        assert!(matches!(
            seconds_to_bits_std(0.0, &scale, &thresholds),
            Err(UnitsError::TimeWindowOutOfRange { .. })
        ));
        assert!(matches!(
            seconds_to_bits_std(1e12, &scale, &thresholds),
            Err(UnitsError::TimeWindowOutOfRange { .. })
        ));
        assert!(matches!(
            seconds_to_bits_std(f64::NAN, &scale, &thresholds),
            Err(UnitsError::InvalidQuantity { .. })
        ));
        assert!(matches!(
            seconds_to_bits_std(-1.0, &scale, &thresholds),
            Err(UnitsError::InvalidQuantity { .. })
        ));
    }
}
