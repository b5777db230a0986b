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

use std::fmt;

use bitflags::bitflags;
use serde::Serialize;

use hwp_shared::types::PlatformId;

use crate::HwPowerError;
use crate::HwPowerResult;

/// Processor families with a backend.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Platform {
    IntelCpu,
    AmdCpu,
    IbmPower9,
}

impl Platform {
    pub fn id(&self) -> PlatformId {
        match self {
            Platform::IntelCpu => PlatformId::IntelCpu,
            Platform::AmdCpu => PlatformId::AmdCpu,
            Platform::IbmPower9 => PlatformId::IbmCpu,
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        match self {
            Platform::IntelCpu => {
                Capabilities::all()
                    - Capabilities::SET_NODE_POWER_LIMIT
                    - Capabilities::SET_GPU_POWER_RATIO
            }
            Platform::AmdCpu => Capabilities::GET_POWER | Capabilities::FEATURES,
            Platform::IbmPower9 => {
                Capabilities::GET_POWER
                    | Capabilities::GET_POWER_LIMITS
                    | Capabilities::SET_NODE_POWER_LIMIT
                    | Capabilities::SET_GPU_POWER_RATIO
                    | Capabilities::GET_THERMALS
                    | Capabilities::GET_FREQUENCIES
                    | Capabilities::FEATURES
            }
        }
    }

    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities().contains(capability.flag())
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Platform::IntelCpu => "intel-cpu",
            Platform::AmdCpu => "amd-cpu",
            Platform::IbmPower9 => "ibm-power9",
        };
        f.write_str(name)
    }
}

/// One operation of the uniform interface every platform answers.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    GetPower,
    GetPowerLimits,
    SetSocketPowerLimit,
    SetNodePowerLimit,
    SetGpuPowerRatio,
    GetThermals,
    GetFrequencies,
    SetCoreFrequency,
    GetCounters,
    EnableCounters,
    GetTurbo,
    EnableTurbo,
    DisableTurbo,
    Features,
}

impl Capability {
    pub fn flag(&self) -> Capabilities {
        match self {
            Capability::GetPower => Capabilities::GET_POWER,
            Capability::GetPowerLimits => Capabilities::GET_POWER_LIMITS,
            Capability::SetSocketPowerLimit => Capabilities::SET_SOCKET_POWER_LIMIT,
            Capability::SetNodePowerLimit => Capabilities::SET_NODE_POWER_LIMIT,
            Capability::SetGpuPowerRatio => Capabilities::SET_GPU_POWER_RATIO,
            Capability::GetThermals => Capabilities::GET_THERMALS,
            Capability::GetFrequencies => Capabilities::GET_FREQUENCIES,
            Capability::SetCoreFrequency => Capabilities::SET_CORE_FREQUENCY,
            Capability::GetCounters => Capabilities::GET_COUNTERS,
            Capability::EnableCounters => Capabilities::ENABLE_COUNTERS,
            Capability::GetTurbo => Capabilities::GET_TURBO,
            Capability::EnableTurbo => Capabilities::ENABLE_TURBO,
            Capability::DisableTurbo => Capabilities::DISABLE_TURBO,
            Capability::Features => Capabilities::FEATURES,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Capability::GetPower => "get-power",
            Capability::GetPowerLimits => "get-power-limits",
            Capability::SetSocketPowerLimit => "set-socket-power-limit",
            Capability::SetNodePowerLimit => "set-node-power-limit",
            Capability::SetGpuPowerRatio => "set-gpu-power-ratio",
            Capability::GetThermals => "get-thermals",
            Capability::GetFrequencies => "get-frequencies",
            Capability::SetCoreFrequency => "set-core-frequency",
            Capability::GetCounters => "get-counters",
            Capability::EnableCounters => "enable-counters",
            Capability::GetTurbo => "get-turbo",
            Capability::EnableTurbo => "enable-turbo",
            Capability::DisableTurbo => "disable-turbo",
            Capability::Features => "features",
        };
        f.write_str(name)
    }
}

bitflags! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub struct Capabilities: u32 {
        const GET_POWER = 1 << 0;
        const GET_POWER_LIMITS = 1 << 1;
        const SET_SOCKET_POWER_LIMIT = 1 << 2;
        const SET_NODE_POWER_LIMIT = 1 << 3;
        const SET_GPU_POWER_RATIO = 1 << 4;
        const GET_THERMALS = 1 << 5;
        const GET_FREQUENCIES = 1 << 6;
        const SET_CORE_FREQUENCY = 1 << 7;
        const GET_COUNTERS = 1 << 8;
        const ENABLE_COUNTERS = 1 << 9;
        const GET_TURBO = 1 << 10;
        const ENABLE_TURBO = 1 << 11;
        const DISABLE_TURBO = 1 << 12;
        const FEATURES = 1 << 13;
    }
}

/// Detected processor: platform plus the display family and model.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Architecture {
    pub platform: Platform,
    pub family: u32,
    pub model: u32,
}

/// Zen and later expose the RAPL energy registers.
const FIRST_AMD_RAPL_FAMILY: u32 = 0x17;

impl Architecture {
    #[cfg(target_arch = "x86_64")]
    pub fn detect() -> HwPowerResult<Self> {
        use raw_cpuid::CpuId;

        let cpuid = CpuId::new();
        let vendor = cpuid
            .get_vendor_info()
            .map(|info| info.as_str().to_string())
            .unwrap_or_default();
        let (family, model) = cpuid
            .get_feature_info()
            .map(|info| (info.family_id() as u32, info.model_id() as u32))
            .unwrap_or_default();

        Self::from_cpuid(&vendor, family, model)
    }

    #[cfg(target_arch = "powerpc64")]
    pub fn detect() -> HwPowerResult<Self> {
        Ok(Self {
            platform: Platform::IbmPower9,
            family: 0,
            model: 9,
        })
    }

    #[cfg(not(any(target_arch = "x86_64", target_arch = "powerpc64")))]
    pub fn detect() -> HwPowerResult<Self> {
        Err(HwPowerError::UnsupportedArchitecture {
            description: std::env::consts::ARCH.to_string(),
        })
    }

    /// Maps a cpuid vendor string and display family and model to a
    /// platform.
    pub fn from_cpuid(vendor: &str, family: u32, model: u32) -> HwPowerResult<Self> {
        let platform = match vendor {
            "GenuineIntel" => Platform::IntelCpu,
            "AuthenticAMD" | "HygonGenuine" if family >= FIRST_AMD_RAPL_FAMILY => Platform::AmdCpu,
            _ => {
                return Err(HwPowerError::UnsupportedArchitecture {
                    description: format!("{vendor} family {family:#X} model {model:#X}"),
                })
            }
        };

        Ok(Self {
            platform,
            family,
            model,
        })
    }
}
