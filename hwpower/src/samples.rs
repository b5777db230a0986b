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

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::DateTime;
use chrono::Utc;
use serde::Serialize;

use hwp_occ::SensorValue;
use hwp_shared::types::CoreId;
use hwp_shared::types::LogicalProcessorId;
use hwp_shared::types::RegisterAddress;
use hwp_shared::types::SocketId;
use hwp_shared::types::ThreadId;
use hwp_topology::Topology;
use hwp_units::EnergyReading;
use hwp_units::PackagePowerLimits;
use hwp_units::PowerInfo;
use hwp_units::PowerLimit;

use crate::HwPowerError;
use crate::HwPowerResult;
use crate::Platform;

/// Outcome of reading one value. A failed read is kept as data so that the
/// rest of a sample stays usable.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "status", content = "value")]
pub enum Measurement<T> {
    Value(T),
    /// The hardware has nothing to report yet.
    Unavailable,
    Failed(String),
}

impl<T> Measurement<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Measurement::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Measurement::Failed(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Measurement<U> {
        match self {
            Measurement::Value(value) => Measurement::Value(f(value)),
            Measurement::Unavailable => Measurement::Unavailable,
            Measurement::Failed(reason) => Measurement::Failed(reason),
        }
    }

    pub(crate) fn from_option(value: Option<T>) -> Self {
        value.map_or(Measurement::Unavailable, Measurement::Value)
    }
}

impl<T, E: std::fmt::Display> From<Result<T, E>> for Measurement<T> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Measurement::Value(value),
            Err(error) => Measurement::Failed(error.to_string()),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PowerDomain {
    Package,
    Dram,
    Core(CoreId),
    Node,
    Processor,
    Memory,
    Gpu,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DomainPower {
    pub domain: PowerDomain,
    pub watts: Measurement<f64>,
    /// Counter state behind `watts` on backends that derive power from
    /// energy counters.
    pub energy: Option<EnergyReading>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SocketPower {
    pub socket: SocketId,
    pub domains: Vec<DomainPower>,
    /// Energy accumulated by each firmware power sensor, by sensor name.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub sensor_energy_joules: BTreeMap<String, f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PowerSample {
    pub timestamp: DateTime<Utc>,
    pub sockets: Vec<SocketPower>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SocketPowerLimits {
    pub socket: SocketId,
    pub package: Measurement<PackagePowerLimits>,
    pub package_info: Measurement<PowerInfo>,
    pub dram: Measurement<PowerLimit>,
    pub dram_info: Measurement<PowerInfo>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GpuPowerRatio {
    pub socket: SocketId,
    pub percent: Measurement<u64>,
}

/// Node wide power cap managed by firmware.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NodePowerCap {
    pub current_watts: Measurement<u64>,
    pub min_watts: Measurement<u64>,
    pub max_watts: Measurement<u64>,
    pub gpu_ratios: Vec<GpuPowerRatio>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PowerLimits {
    Sockets(Vec<SocketPowerLimits>),
    Node(NodePowerCap),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PowerLimitsSample {
    pub timestamp: DateTime<Utc>,
    pub limits: PowerLimits,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ThreadThermal {
    pub processor: LogicalProcessorId,
    pub core: CoreId,
    pub thread: ThreadId,
    pub celsius: Measurement<u64>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SocketThermals {
    pub socket: SocketId,
    pub tcc_target_celsius: Measurement<u64>,
    pub package_celsius: Measurement<u64>,
    pub threads: Vec<ThreadThermal>,
}

/// Named sensors of one socket as reported by on-chip firmware.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SocketSensors {
    pub socket: SocketId,
    pub sensors: Measurement<Vec<SensorValue>>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Thermals {
    Cores(Vec<SocketThermals>),
    Sensors(Vec<SocketSensors>),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ThermalSample {
    pub timestamp: DateTime<Utc>,
    pub thermals: Thermals,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ThreadClocks {
    pub processor: LogicalProcessorId,
    pub core: CoreId,
    pub thread: ThreadId,
    /// Average frequency while not halted since the previous sample.
    pub effective_mhz: Measurement<f64>,
    /// Time stamp counter rate since the previous sample.
    pub tsc_mhz: Measurement<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SocketClocks {
    pub socket: SocketId,
    pub base_mhz: f64,
    pub pstate_mhz: Measurement<f64>,
    pub threads: Vec<ThreadClocks>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Frequencies {
    Clocks(Vec<SocketClocks>),
    Sensors(Vec<SocketSensors>),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FrequencySample {
    pub timestamp: DateTime<Utc>,
    pub frequencies: Frequencies,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ThreadCounters {
    pub processor: LogicalProcessorId,
    pub instructions_retired: Measurement<u64>,
    pub core_cycles: Measurement<u64>,
    pub reference_cycles: Measurement<u64>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CounterSample {
    pub timestamp: DateTime<Utc>,
    pub threads: Vec<ThreadCounters>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SocketTurbo {
    pub socket: SocketId,
    pub enabled: Measurement<bool>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TurboSample {
    pub timestamp: DateTime<Utc>,
    pub sockets: Vec<SocketTurbo>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum WriteTarget {
    Socket(SocketId),
    Processor(LogicalProcessorId),
    Node,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WriteFailure {
    pub target: WriteTarget,
    pub reason: String,
}

/// Result of a setting applied to several targets. Targets not listed in
/// `failures` hold the new setting.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WriteSummary {
    pub timestamp: DateTime<Utc>,
    pub attempted: usize,
    pub failures: Vec<WriteFailure>,
}

impl WriteSummary {
    pub(crate) fn new(attempted: usize, failures: Vec<WriteFailure>) -> Self {
        Self {
            timestamp: Utc::now(),
            attempted,
            failures,
        }
    }

    /// Fails when not a single target took the setting.
    pub(crate) fn finish(
        what: &'static str,
        attempted: usize,
        failures: Vec<WriteFailure>,
    ) -> HwPowerResult<Self> {
        if attempted > 0 && failures.len() >= attempted {
            let reason = failures
                .first()
                .map(|failure| failure.reason.clone())
                .unwrap_or_default();
            return Err(HwPowerError::NoSocketSucceeded { what, reason });
        }

        Ok(Self::new(attempted, failures))
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RegisterEntry {
    pub name: &'static str,
    pub address: RegisterAddress,
}

/// What the engine talks to on this node.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Features {
    pub platform: Platform,
    pub family: u32,
    pub model: u32,
    pub topology: Topology,
    pub registers: Vec<RegisterEntry>,
    pub files: Vec<PathBuf>,
}
