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

use crate::RegisterEntry;

pub(crate) const TIME_STAMP_COUNTER: RegisterAddress = RegisterAddress::new(0x10);
pub(crate) const PLATFORM_INFO: RegisterAddress = RegisterAddress::new(0xCE);
pub(crate) const MPERF: RegisterAddress = RegisterAddress::new(0xE7);
pub(crate) const APERF: RegisterAddress = RegisterAddress::new(0xE8);
pub(crate) const PERF_STATUS: RegisterAddress = RegisterAddress::new(0x198);
pub(crate) const PERF_CTL: RegisterAddress = RegisterAddress::new(0x199);
pub(crate) const THERM_STATUS: RegisterAddress = RegisterAddress::new(0x19C);
pub(crate) const MISC_ENABLE: RegisterAddress = RegisterAddress::new(0x1A0);
pub(crate) const TEMPERATURE_TARGET: RegisterAddress = RegisterAddress::new(0x1A2);
pub(crate) const PACKAGE_THERM_STATUS: RegisterAddress = RegisterAddress::new(0x1B1);
pub(crate) const FIXED_COUNTERS: [RegisterAddress; 3] = [
    RegisterAddress::new(0x309),
    RegisterAddress::new(0x30A),
    RegisterAddress::new(0x30B),
];
pub(crate) const FIXED_CTR_CTRL: RegisterAddress = RegisterAddress::new(0x38D);
pub(crate) const PERF_GLOBAL_CTRL: RegisterAddress = RegisterAddress::new(0x38F);
pub(crate) const RAPL_POWER_UNIT: RegisterAddress = RegisterAddress::new(0x606);
pub(crate) const PKG_POWER_LIMIT: RegisterAddress = RegisterAddress::new(0x610);
pub(crate) const PKG_ENERGY_STATUS: RegisterAddress = RegisterAddress::new(0x611);
pub(crate) const PKG_POWER_INFO: RegisterAddress = RegisterAddress::new(0x614);
pub(crate) const DRAM_POWER_LIMIT: RegisterAddress = RegisterAddress::new(0x618);
pub(crate) const DRAM_ENERGY_STATUS: RegisterAddress = RegisterAddress::new(0x619);
pub(crate) const DRAM_POWER_INFO: RegisterAddress = RegisterAddress::new(0x61C);

/// Display models the register layout above was validated on: Sandy Bridge
/// EP, Ivy Bridge EP, Haswell EP, Broadwell EP, Skylake/Cascade Lake SP, Ice
/// Lake SP and Sapphire Rapids.
pub(crate) const VALIDATED_MODELS: &[u32] = &[0x2D, 0x3E, 0x3F, 0x4F, 0x55, 0x6A, 0x8F];

pub(crate) fn register_map() -> Vec<RegisterEntry> {
    [
        ("IA32_TIME_STAMP_COUNTER", TIME_STAMP_COUNTER),
        ("MSR_PLATFORM_INFO", PLATFORM_INFO),
        ("IA32_MPERF", MPERF),
        ("IA32_APERF", APERF),
        ("IA32_PERF_STATUS", PERF_STATUS),
        ("IA32_PERF_CTL", PERF_CTL),
        ("IA32_THERM_STATUS", THERM_STATUS),
        ("IA32_MISC_ENABLE", MISC_ENABLE),
        ("MSR_TEMPERATURE_TARGET", TEMPERATURE_TARGET),
        ("IA32_PACKAGE_THERM_STATUS", PACKAGE_THERM_STATUS),
        ("IA32_FIXED_CTR0", FIXED_COUNTERS[0]),
        ("IA32_FIXED_CTR1", FIXED_COUNTERS[1]),
        ("IA32_FIXED_CTR2", FIXED_COUNTERS[2]),
        ("IA32_FIXED_CTR_CTRL", FIXED_CTR_CTRL),
        ("IA32_PERF_GLOBAL_CTRL", PERF_GLOBAL_CTRL),
        ("MSR_RAPL_POWER_UNIT", RAPL_POWER_UNIT),
        ("MSR_PKG_POWER_LIMIT", PKG_POWER_LIMIT),
        ("MSR_PKG_ENERGY_STATUS", PKG_ENERGY_STATUS),
        ("MSR_PKG_POWER_INFO", PKG_POWER_INFO),
        ("MSR_DRAM_POWER_LIMIT", DRAM_POWER_LIMIT),
        ("MSR_DRAM_ENERGY_STATUS", DRAM_ENERGY_STATUS),
        ("MSR_DRAM_POWER_INFO", DRAM_POWER_INFO),
    ]
    .into_iter()
    .map(|(name, address)| RegisterEntry { name, address })
    .collect()
}
