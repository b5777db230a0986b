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
use hwp_shared::bits::insert_bits;

use crate::bits_to_seconds_std;
use crate::bits_to_watts;
use crate::seconds_to_bits_std;
use crate::watts_to_bits;
use crate::UnitScale;
use crate::UnitsError;
use crate::UnitsResult;
use crate::WindowThresholds;

const WATTS_HIGH: u32 = 14;
const ENABLE_BIT: u32 = 15;
const CLAMP_BIT: u32 = 16;
const WINDOW_HIGH: u32 = 23;
const WINDOW_LOW: u32 = 17;
const MAX_WATTS_BITS: u64 = (1 << 15) - 1;
const LOCK_BIT: u32 = 63;

/// Offset of the second limit inside a package limit register.
pub const SECOND_LIMIT_OFFSET: u32 = 32;

/// One power limit as laid out in 32 bits of a RAPL limit register.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct PowerLimit {
    pub watts: f64,
    pub seconds: f64,
    pub enabled: bool,
    pub clamped: bool,
}

impl PowerLimit {
    /// A limit that is enabled and clamped, the way limits are set on request.
    pub fn enforced(watts: f64, seconds: f64) -> Self {
        Self {
            watts,
            seconds,
            enabled: true,
            clamped: true,
        }
    }

    pub fn decode(raw: u64, offset: u32, scale: &UnitScale) -> Self {
        let field = |high, low| extract_bits(raw, high + offset, low + offset);

        Self {
            watts: bits_to_watts(field(WATTS_HIGH, 0), scale),
            seconds: bits_to_seconds_std(field(WINDOW_HIGH, WINDOW_LOW), scale),
            enabled: field(ENABLE_BIT, ENABLE_BIT) == 1,
            clamped: field(CLAMP_BIT, CLAMP_BIT) == 1,
        }
    }

    /// Writes the limit into `raw` at `offset`, leaving every other bit as is.
    ///
    /// Fails before touching anything when the watts don't fit in 15 bits.
    pub fn encode_into(
        &self,
        raw: u64,
        offset: u32,
        scale: &UnitScale,
        thresholds: &WindowThresholds,
    ) -> UnitsResult<u64> {
        let watts_bits = watts_to_bits(self.watts, scale)?;
        if watts_bits > MAX_WATTS_BITS {
            return Err(UnitsError::LimitTooLarge {
                watts: self.watts,
                bits: watts_bits,
                max: MAX_WATTS_BITS,
            });
        }
        let window_bits = seconds_to_bits_std(self.seconds, scale, thresholds)?;

        let raw = insert_bits(raw, watts_bits, WATTS_HIGH + offset, offset);
        let raw = insert_bits(raw, self.enabled as u64, ENABLE_BIT + offset, ENABLE_BIT + offset);
        let raw = insert_bits(raw, self.clamped as u64, CLAMP_BIT + offset, CLAMP_BIT + offset);
        let raw = insert_bits(raw, window_bits, WINDOW_HIGH + offset, WINDOW_LOW + offset);
        Ok(raw)
    }
}

/// Both limits of a package limit register.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct PackagePowerLimits {
    pub limit1: PowerLimit,
    pub limit2: PowerLimit,
    /// Register is locked until the next reset.
    pub locked: bool,
}

impl PackagePowerLimits {
    pub fn decode(raw: u64, scale: &UnitScale) -> Self {
        Self {
            limit1: PowerLimit::decode(raw, 0, scale),
            limit2: PowerLimit::decode(raw, SECOND_LIMIT_OFFSET, scale),
            locked: extract_bits(raw, LOCK_BIT, LOCK_BIT) == 1,
        }
    }

    /// Replaces the first limit, keeping the second one and the lock bit.
    pub fn replace_limit1(
        raw: u64,
        limit1: &PowerLimit,
        scale: &UnitScale,
        thresholds: &WindowThresholds,
    ) -> UnitsResult<u64> {
        limit1.encode_into(raw, 0, scale, thresholds)
    }
}

/// Power range a package or DRAM domain supports.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct PowerInfo {
    pub thermal_spec_watts: f64,
    pub min_watts: f64,
    pub max_watts: f64,
    pub max_window_seconds: f64,
}

impl PowerInfo {
    pub fn decode(raw: u64, scale: &UnitScale) -> Self {
        Self {
            thermal_spec_watts: bits_to_watts(extract_bits(raw, 14, 0), scale),
            min_watts: bits_to_watts(extract_bits(raw, 30, 16), scale),
            max_watts: bits_to_watts(extract_bits(raw, 46, 32), scale),
            max_window_seconds: bits_to_seconds_std(extract_bits(raw, 54, 48), scale),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scale() -> UnitScale {
        UnitScale::new(3, 14, 10)
    }

    // limit1: 100 W, enabled, clamped, 1 s; limit2: 120 W, enabled, 1/1024 s
    const PACKAGE_LIMIT: u64 = 0x0000_83C0_0015_8320;

    #[test]
    fn decodes_both_package_limits() {
        let limits = PackagePowerLimits::decode(PACKAGE_LIMIT, &scale());

        assert_eq!(
            limits.limit1,
            PowerLimit {
                watts: 100.0,
                seconds: 1.0,
                enabled: true,
                clamped: true,
            }
        );
        assert_eq!(limits.limit2.watts, 120.0);
        assert!(limits.limit2.enabled);
        assert!(!limits.limit2.clamped);
        assert_eq!(limits.limit2.seconds, 1.0 / 1024.0);
        assert!(!limits.locked);
    }

    #[test]
    fn replacing_limit1_keeps_upper_half() {
        let scale = scale();
        let thresholds = WindowThresholds::default();
        let raw = PACKAGE_LIMIT | 1 << 63;

        let updated = PackagePowerLimits::replace_limit1(
            raw,
            &PowerLimit::enforced(80.0, 1.0),
            &scale,
            &thresholds,
        )
        .unwrap();

        assert_eq!(updated >> 32, raw >> 32);
        let limits = PackagePowerLimits::decode(updated, &scale);
        assert_eq!(limits.limit1, PowerLimit::enforced(80.0, 1.0));
        assert!(limits.locked);
    }

    #[test]
    fn encodes_at_second_offset() {
        let scale = scale();
        let thresholds = WindowThresholds::default();
        let limit = PowerLimit::enforced(50.0, 0.5);

        let raw = limit
            .encode_into(0, SECOND_LIMIT_OFFSET, &scale, &thresholds)
            .unwrap();

        assert_eq!(raw & 0xFFFF_FFFF, 0);
        assert_eq!(PowerLimit::decode(raw, SECOND_LIMIT_OFFSET, &scale), limit);
    }

    #[test]
    fn oversized_limit_is_rejected() {
        let scale = scale();
        let thresholds = WindowThresholds::default();

        // 2^15 units of 1/8 W
        let result = PowerLimit::enforced(4096.0, 1.0).encode_into(0, 0, &scale, &thresholds);
        assert_eq!(
            result,
            Err(UnitsError::LimitTooLarge {
                watts: 4096.0,
                bits: 1 << 15,
                max: (1 << 15) - 1,
            })
        );

        let largest = PowerLimit::enforced(4095.875, 1.0).encode_into(0, 0, &scale, &thresholds);
        assert!(largest.is_ok());
    }

    #[test]
    fn decodes_power_info() {
        // tdp 125 W, min 40 W, max 250 W, max window y = 10, z = 0
        let raw = 0x000A_07D0_0140_03E8;
        let info = PowerInfo::decode(raw, &scale());

        assert_eq!(info.thermal_spec_watts, 125.0);
        assert_eq!(info.min_watts, 40.0);
        assert_eq!(info.max_watts, 250.0);
        assert_eq!(info.max_window_seconds, 1.0);
    }
}
