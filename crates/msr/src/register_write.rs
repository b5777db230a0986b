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

use hwp_shared::types::RegisterAddress;

/// A value to store into a register, optionally restricted to the bits set
/// in `mask`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegisterWrite {
    register: RegisterAddress,
    value: u64,
    mask: u64,
}

impl RegisterWrite {
    pub const NO_MASK: u64 = u64::MAX;

    pub fn new(register: RegisterAddress, value: u64) -> Self {
        Self {
            register,
            value,
            mask: Self::NO_MASK,
        }
    }

    pub fn with_mask(register: RegisterAddress, value: u64, mask: u64) -> Self {
        Self {
            register,
            value,
            mask,
        }
    }

    pub fn register(&self) -> RegisterAddress {
        self.register
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn mask(&self) -> u64 {
        self.mask
    }

    pub fn is_masked(&self) -> bool {
        self.mask != Self::NO_MASK
    }

    pub fn masked_value(old_value: u64, new_value: u64, mask: u64) -> u64 {
        (new_value & mask) | (old_value & !mask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masked_value_keeps_bits_outside_mask() {
        let old = 0xFFFF_FFFF_0000_0000;
        let new = 0x0000_0000_0001_8064;

        let merged = RegisterWrite::masked_value(old, new, 0x0000_0000_FFFF_FFFF);
        assert_eq!(merged, 0xFFFF_FFFF_0001_8064);
    }

    #[test]
    fn unmasked_write_replaces_everything() {
        let write = RegisterWrite::new(RegisterAddress::new(0x199), 0x1800);

        assert!(!write.is_masked());
        assert_eq!(
            RegisterWrite::masked_value(u64::MAX, write.value(), write.mask()),
            0x1800
        );
    }
}
