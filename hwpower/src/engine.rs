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

use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;

use hwp_config::HwPowerConfig;
use hwp_msr::MsrDevice;
use hwp_msr::MsrDevicePaths;
use hwp_msr::RegisterDevice;
use hwp_occ::SensorBlobReader;
use hwp_topology::HwlocSource;
use hwp_topology::Topology;
use hwp_topology::TopologyResolver;

use crate::amd;
use crate::amd::AmdCpu;
use crate::ibm::IbmPower9;
use crate::intel::registers;
use crate::intel::IntelCpu;
use crate::verbose::EntryLog;
use crate::Architecture;
use crate::Capability;
use crate::CounterSample;
use crate::Features;
use crate::Frequencies;
use crate::FrequencySample;
use crate::HwPowerError;
use crate::HwPowerResult;
use crate::Opal;
use crate::Platform;
use crate::PowerLimits;
use crate::PowerLimitsSample;
use crate::PowerSample;
use crate::ThermalSample;
use crate::Thermals;
use crate::TurboSample;
use crate::WriteSummary;

/// An engine shared between sampling threads. Every operation runs under the
/// lock, so a whole submit and read cycle is never interleaved with another.
pub type SharedEngine = Arc<Mutex<Engine>>;

#[derive(Debug)]
enum Backend {
    Intel(IntelCpu),
    Amd(AmdCpu),
    Ibm(IbmPower9),
}

/// Handle to the telemetry of this node. Owns the devices, batches, unit
/// scales and previous samples of the detected platform.
#[derive(Debug)]
pub struct Engine {
    architecture: Architecture,
    topology: Topology,
    backend: Backend,
    entry_log: EntryLog,
}

impl Engine {
    /// Detects the processor and topology and opens the devices of its
    /// platform. Fails when the node can't be described or its devices
    /// can't be opened.
    pub fn init(config: &HwPowerConfig) -> HwPowerResult<Self> {
        let architecture = Architecture::detect()?;
        let platform = architecture.platform;
        let topology = TopologyResolver::new(HwlocSource).resolve(platform.id())?;

        let backend = match platform {
            Platform::IntelCpu | Platform::AmdCpu => {
                let paths = MsrDevicePaths {
                    device_root: config.msr.device_root.clone(),
                    batch_device: config.msr.batch_device.clone(),
                    allowlist: config.msr.allowlist.clone(),
                };
                let device = Box::new(MsrDevice::open(&paths, &topology)?);
                if platform == Platform::IntelCpu {
                    Backend::Intel(IntelCpu::new(device, topology, architecture.model))
                } else {
                    Backend::Amd(AmdCpu::new(device, topology, architecture.model))
                }
            }
            Platform::IbmPower9 => {
                let reader =
                    SensorBlobReader::open(&config.occ.sensors_path, config.occ.block_size)?;
                let opal = Opal::from_config(&config.opal);
                Backend::Ibm(IbmPower9::new(reader, opal, topology.sockets()))
            }
        };

        log::info!(
            "initialized {platform} family {:#X} model {:#X}: {} sockets, {} cores, {} threads",
            architecture.family,
            architecture.model,
            topology.sockets(),
            topology.total_cores(),
            topology.total_threads()
        );

        Ok(Self {
            architecture,
            topology,
            backend,
            entry_log: EntryLog::new(config.logs.verbose),
        })
    }

    /// An Intel engine over an already opened register device.
    pub fn intel(device: Box<dyn RegisterDevice>, topology: Topology, model: u32) -> Self {
        let architecture = Architecture {
            platform: Platform::IntelCpu,
            family: 6,
            model,
        };
        let backend = Backend::Intel(IntelCpu::new(device, topology, model));
        Self::with_backend(architecture, topology, backend)
    }

    pub fn amd(
        device: Box<dyn RegisterDevice>,
        topology: Topology,
        family: u32,
        model: u32,
    ) -> Self {
        let architecture = Architecture {
            platform: Platform::AmdCpu,
            family,
            model,
        };
        let backend = Backend::Amd(AmdCpu::new(device, topology, model));
        Self::with_backend(architecture, topology, backend)
    }

    pub fn ibm(reader: SensorBlobReader, opal: Opal, topology: Topology) -> Self {
        let architecture = Architecture {
            platform: Platform::IbmPower9,
            family: 0,
            model: 9,
        };
        let backend = Backend::Ibm(IbmPower9::new(reader, opal, topology.sockets()));
        Self::with_backend(architecture, topology, backend)
    }

    fn with_backend(architecture: Architecture, topology: Topology, backend: Backend) -> Self {
        Self {
            architecture,
            topology,
            backend,
            entry_log: EntryLog::new(false),
        }
    }

    pub fn into_shared(self) -> SharedEngine {
        Arc::new(Mutex::new(self))
    }

    pub fn architecture(&self) -> Architecture {
        self.architecture
    }

    pub fn platform(&self) -> Platform {
        self.architecture.platform
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn get_power(&mut self) -> HwPowerResult<PowerSample> {
        self.enter(Capability::GetPower);
        let sockets = match &mut self.backend {
            Backend::Intel(intel) => intel.power()?,
            Backend::Amd(amd) => amd.power()?,
            Backend::Ibm(ibm) => ibm.power()?,
        };

        Ok(PowerSample {
            timestamp: Utc::now(),
            sockets,
        })
    }

    pub fn get_power_limits(&mut self) -> HwPowerResult<PowerLimitsSample> {
        let capability = Capability::GetPowerLimits;
        let platform = self.enter(capability);
        let limits = match &mut self.backend {
            Backend::Intel(intel) => PowerLimits::Sockets(intel.power_limits()?),
            Backend::Ibm(ibm) => PowerLimits::Node(ibm.power_limits()),
            Backend::Amd(_) => return Err(HwPowerError::unsupported(capability, platform)),
        };

        Ok(PowerLimitsSample {
            timestamp: Utc::now(),
            limits,
        })
    }

    /// Sets the long term package limit of every socket to `watts`.
    pub fn set_socket_power_limit(&mut self, watts: f64) -> HwPowerResult<WriteSummary> {
        let capability = Capability::SetSocketPowerLimit;
        let platform = self.enter(capability);
        match &mut self.backend {
            Backend::Intel(intel) => intel.set_socket_power_limit(watts),
            _ => Err(HwPowerError::unsupported(capability, platform)),
        }
    }

    /// Sets the firmware managed power cap of the whole node.
    pub fn set_node_power_limit(&mut self, watts: u64) -> HwPowerResult<WriteSummary> {
        let capability = Capability::SetNodePowerLimit;
        let platform = self.enter(capability);
        match &self.backend {
            Backend::Ibm(ibm) => ibm.set_node_power_limit(watts),
            _ => Err(HwPowerError::unsupported(capability, platform)),
        }
    }

    /// Sets the share of power shifted from processors to GPUs, in percent.
    pub fn set_gpu_power_ratio(&mut self, percent: u64) -> HwPowerResult<WriteSummary> {
        let capability = Capability::SetGpuPowerRatio;
        let platform = self.enter(capability);
        match &self.backend {
            Backend::Ibm(ibm) => ibm.set_gpu_power_ratio(percent),
            _ => Err(HwPowerError::unsupported(capability, platform)),
        }
    }

    pub fn get_thermals(&mut self) -> HwPowerResult<ThermalSample> {
        let capability = Capability::GetThermals;
        let platform = self.enter(capability);
        let thermals = match &mut self.backend {
            Backend::Intel(intel) => Thermals::Cores(intel.thermals()?),
            Backend::Ibm(ibm) => Thermals::Sensors(ibm.thermals()?),
            Backend::Amd(_) => return Err(HwPowerError::unsupported(capability, platform)),
        };

        Ok(ThermalSample {
            timestamp: Utc::now(),
            thermals,
        })
    }

    pub fn get_frequencies(&mut self) -> HwPowerResult<FrequencySample> {
        let capability = Capability::GetFrequencies;
        let platform = self.enter(capability);
        let frequencies = match &mut self.backend {
            Backend::Intel(intel) => Frequencies::Clocks(intel.frequencies()?),
            Backend::Ibm(ibm) => Frequencies::Sensors(ibm.frequencies()?),
            Backend::Amd(_) => return Err(HwPowerError::unsupported(capability, platform)),
        };

        Ok(FrequencySample {
            timestamp: Utc::now(),
            frequencies,
        })
    }

    pub fn set_core_frequency(&mut self, mhz: u64) -> HwPowerResult<WriteSummary> {
        let capability = Capability::SetCoreFrequency;
        let platform = self.enter(capability);
        match &mut self.backend {
            Backend::Intel(intel) => intel.set_core_frequency(mhz),
            _ => Err(HwPowerError::unsupported(capability, platform)),
        }
    }

    pub fn get_counters(&mut self) -> HwPowerResult<CounterSample> {
        let capability = Capability::GetCounters;
        let platform = self.enter(capability);
        let threads = match &mut self.backend {
            Backend::Intel(intel) => intel.counters()?,
            _ => return Err(HwPowerError::unsupported(capability, platform)),
        };

        Ok(CounterSample {
            timestamp: Utc::now(),
            threads,
        })
    }

    pub fn enable_counters(&mut self) -> HwPowerResult<WriteSummary> {
        let capability = Capability::EnableCounters;
        let platform = self.enter(capability);
        match &mut self.backend {
            Backend::Intel(intel) => intel.enable_counters(),
            _ => Err(HwPowerError::unsupported(capability, platform)),
        }
    }

    pub fn get_turbo(&mut self) -> HwPowerResult<TurboSample> {
        let capability = Capability::GetTurbo;
        let platform = self.enter(capability);
        let sockets = match &mut self.backend {
            Backend::Intel(intel) => intel.turbo()?,
            _ => return Err(HwPowerError::unsupported(capability, platform)),
        };

        Ok(TurboSample {
            timestamp: Utc::now(),
            sockets,
        })
    }

    pub fn enable_turbo(&mut self) -> HwPowerResult<WriteSummary> {
        self.set_turbo(Capability::EnableTurbo, true)
    }

    pub fn disable_turbo(&mut self) -> HwPowerResult<WriteSummary> {
        self.set_turbo(Capability::DisableTurbo, false)
    }

    pub fn features(&self) -> Features {
        let platform = self.enter(Capability::Features);
        let (registers, files) = match &self.backend {
            Backend::Intel(_) => (registers::register_map(), Vec::new()),
            Backend::Amd(_) => (amd::register_map(), Vec::new()),
            Backend::Ibm(ibm) => (Vec::new(), ibm.files()),
        };

        Features {
            platform,
            family: self.architecture.family,
            model: self.architecture.model,
            topology: self.topology,
            registers,
            files,
        }
    }

    fn set_turbo(&mut self, capability: Capability, enabled: bool) -> HwPowerResult<WriteSummary> {
        let platform = self.enter(capability);
        match &mut self.backend {
            Backend::Intel(intel) => intel.set_turbo(enabled),
            _ => Err(HwPowerError::unsupported(capability, platform)),
        }
    }

    fn enter(&self, capability: Capability) -> Platform {
        let platform = self.architecture.platform;
        self.entry_log.enter(capability, platform);
        platform
    }
}

#[cfg(test)]
mod tests;
