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

//! Bit range helpers for register values. Ranges are inclusive and bit 0 is
//! the least significant bit. A range with `low > high` or `high > 63` selects
//! nothing.

pub fn mask_bits(high: u32, low: u32) -> u64 {
    if low > high || high > 63 {
        return 0;
    }

    let width = high - low + 1;
    let ones = if width == 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    };
    ones << low
}

pub fn extract_bits(value: u64, high: u32, low: u32) -> u64 {
    let mask = mask_bits(high, low);
    if mask == 0 {
        return 0;
    }
    (value & mask) >> low
}

/// Replaces bits `high..=low` of `value` with the low bits of `field`.
pub fn insert_bits(value: u64, field: u64, high: u32, low: u32) -> u64 {
    let mask = mask_bits(high, low);
    if mask == 0 {
        return value;
    }
    (value & !mask) | ((field << low) & mask)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_boundary_bits() {
        let value = 0x8000_0000_0000_0001u64;

        assert_eq!(extract_bits(value, 0, 0), 1);
        assert_eq!(extract_bits(value, 63, 63), 1);
        assert_eq!(extract_bits(value, 62, 1), 0);
        assert_eq!(extract_bits(value, 63, 0), value);
    }

    #[test]
    fn extracts_rapl_unit_fields() {
        let raw = 0x000A_1003u64;

        assert_eq!(extract_bits(raw, 3, 0), 0x3);
        assert_eq!(extract_bits(raw, 12, 8), 0x10);
        assert_eq!(extract_bits(raw, 19, 16), 0xA);
    }

    #[test]
    fn full_width_mask() {
        assert_eq!(mask_bits(63, 0), u64::MAX);
        assert_eq!(mask_bits(0, 0), 1);
        assert_eq!(mask_bits(63, 63), 1 << 63);
    }

    #[test]
    fn invalid_range_selects_nothing() {
        assert_eq!(mask_bits(3, 4), 0);
        assert_eq!(mask_bits(64, 0), 0);
        assert_eq!(extract_bits(u64::MAX, 2, 5), 0);
        assert_eq!(insert_bits(0xFF, 1, 2, 5), 0xFF);
    }

    #[test]
    fn insert_replaces_only_the_range() {
        let value = 0xFFFF_0000_FFFF_FFFFu64;
        let result = insert_bits(value, 0x1F, 23, 17);

        assert_eq!(extract_bits(result, 23, 17), 0x1F);
        assert_eq!(extract_bits(result, 16, 0), 0x1FFFF);
        assert_eq!(extract_bits(result, 31, 24), 0xFF);
        assert_eq!(extract_bits(result, 63, 32), 0xFFFF_0000);
    }

    #[test]
    fn insert_truncates_wide_fields() {
        assert_eq!(insert_bits(0, 0xFF, 3, 0), 0xF);
        assert_eq!(insert_bits(0, 1, 63, 63), 1 << 63);
    }
}
