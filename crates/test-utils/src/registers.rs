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

use hwp_msr::MemoryDevice;
use hwp_shared::types::LogicalProcessorId;
use hwp_shared::types::RegisterAddress;
use hwp_topology::Topology;

/// Power unit 1/8 W, energy unit 1/1024 J, time unit 1/1024 s.
pub const INTEL_RAPL_UNIT: u64 = 0x000A_0A03;
/// Limit 1: 150 W over 1 s, enabled and clamped. Limit 2: 180 W over
/// 1/128 s, enabled.
pub const INTEL_PKG_POWER_LIMIT: u64 = 0x0006_85A0_0015_84B0;
/// 165 W thermal spec, 70 W min, 250 W max.
pub const INTEL_PKG_POWER_INFO: u64 = 0x0014_07D0_0230_0528;
/// Base ratio 24, 2400 MHz.
pub const INTEL_PLATFORM_INFO: u64 = 0x0000_1800;
/// TCC activation at 100 C.
pub const INTEL_TEMPERATURE_TARGET: u64 = 0x0064_0000;
/// Valid readout, 40 C below the TCC target.
pub const INTEL_THERM_STATUS: u64 = 0x8028_0000;
/// 35 C below the TCC target.
pub const INTEL_PACKAGE_THERM_STATUS: u64 = 0x8023_0000;
/// Current ratio 26, 2600 MHz.
pub const INTEL_PERF_STATUS: u64 = 0x0000_1A00;
/// Turbo is enabled, bit 38 clear.
pub const INTEL_MISC_ENABLE: u64 = 0x0085_0089;

/// Power unit 1/8 W, energy unit 1/65536 J, time unit 1/1024 s.
pub const AMD_RAPL_UNIT: u64 = 0x000A_1003;

/// Sets `register` on the first thread of the first core of every socket.
pub fn set_on_sockets(device: &MemoryDevice, topology: &Topology, register: u32, value: u64) {
    for processor in topology.socket_leaders() {
        device.set(processor, RegisterAddress::new(register), value);
    }
}

/// Sets `register` on every logical processor.
pub fn set_on_threads(device: &MemoryDevice, topology: &Topology, register: u32, value: u64) {
    for processor in topology.all_logical_ids() {
        device.set(processor, RegisterAddress::new(register), value);
    }
}

pub fn get_on(device: &MemoryDevice, processor: u32, register: u32) -> Option<u64> {
    device.get(
        LogicalProcessorId::new(processor),
        RegisterAddress::new(register),
    )
}

/// Register file of an Intel server node with every register the Intel
/// backend touches populated.
pub fn intel_registers(topology: &Topology) -> MemoryDevice {
    let device = MemoryDevice::new();

    set_on_sockets(&device, topology, 0x606, INTEL_RAPL_UNIT);
    set_on_sockets(&device, topology, 0x610, INTEL_PKG_POWER_LIMIT);
    set_on_sockets(&device, topology, 0x611, 0x1000);
    set_on_sockets(&device, topology, 0x614, INTEL_PKG_POWER_INFO);
    set_on_sockets(&device, topology, 0x618, 0);
    set_on_sockets(&device, topology, 0x619, 0x800);
    set_on_sockets(&device, topology, 0x61C, 0);
    set_on_sockets(&device, topology, 0xCE, INTEL_PLATFORM_INFO);
    set_on_sockets(&device, topology, 0x1A2, INTEL_TEMPERATURE_TARGET);
    set_on_sockets(&device, topology, 0x1B1, INTEL_PACKAGE_THERM_STATUS);
    set_on_sockets(&device, topology, 0x198, INTEL_PERF_STATUS);

    set_on_threads(&device, topology, 0x10, 0);
    set_on_threads(&device, topology, 0xE7, 0);
    set_on_threads(&device, topology, 0xE8, 0);
    set_on_threads(&device, topology, 0x199, 0x1800);
    set_on_threads(&device, topology, 0x19C, INTEL_THERM_STATUS);
    set_on_threads(&device, topology, 0x1A0, INTEL_MISC_ENABLE);
    for register in [0x309, 0x30A, 0x30B, 0x38D] {
        set_on_threads(&device, topology, register, 0);
    }
    set_on_threads(&device, topology, 0x38F, 0xF);

    device
}

/// Register file of an AMD Zen node.
pub fn amd_registers(topology: &Topology) -> MemoryDevice {
    let device = MemoryDevice::new();

    set_on_sockets(&device, topology, 0xC001_0299, AMD_RAPL_UNIT);
    set_on_sockets(&device, topology, 0xC001_029B, 0x10_0000);
    for core in 0..topology.total_cores() {
        device.set(
            LogicalProcessorId::new(core),
            RegisterAddress::new(0xC001_029A),
            0x1_0000,
        );
    }

    device
}
