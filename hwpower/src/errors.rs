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

use std::path::PathBuf;

use thiserror::Error as ThisError;

use hwp_msr::BatchKind;
use hwp_msr::MSRError;
use hwp_msr::OperationError;
use hwp_occ::OccError;
use hwp_shared::types::SocketId;
use hwp_topology::TopologyError;
use hwp_units::UnitsError;

use crate::Capability;
use crate::Platform;

#[derive(ThisError, Debug)]
pub enum HwPowerError {
    #[error(transparent)]
    Topology(#[from] TopologyError),

    #[error(transparent)]
    Msr(#[from] MSRError),

    #[error(transparent)]
    Units(#[from] UnitsError),

    #[error(transparent)]
    Occ(#[from] OccError),

    #[error("{0}")]
    Operation(OperationError),

    #[error("no supported architecture detected: {description}")]
    UnsupportedArchitecture { description: String },

    #[error("{capability} isn't supported on {platform}")]
    Unsupported {
        capability: Capability,
        platform: Platform,
    },

    #[error("sockets disagree on {what}: socket {socket} reports {actual}, socket 0 reports {expected}")]
    SocketMismatch {
        what: &'static str,
        socket: SocketId,
        expected: u64,
        actual: u64,
    },

    #[error("{what} of {value} is outside of {min}..={max}")]
    OutOfRange {
        what: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("{what} failed on every socket: {reason}")]
    NoSocketSucceeded { what: &'static str, reason: String },

    #[error("failed to access {path:?}: {io_error}")]
    Sysfs {
        path: PathBuf,
        io_error: std::io::Error,
    },

    #[error("{path:?} holds {content:?} instead of a number")]
    SysfsParse { path: PathBuf, content: String },

    #[error("node power cap reads back as {actual} W after setting {requested} W")]
    CapNotApplied { requested: u64, actual: u64 },

    #[error("{devices} vendor devices can't be split evenly across {sockets} sockets")]
    DevicesNotDivisible { devices: u32, sockets: u32 },

    #[error("vendor library failed: {reason}")]
    Vendor { reason: String },

    #[error("batch {kind:?} holds {loaded} operations instead of {expected}")]
    IncompleteBatch {
        kind: BatchKind,
        expected: usize,
        loaded: usize,
    },
}

/// Coarse classes of failures that decide how a caller reacts.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The node description or the requested setup is inconsistent, stop.
    Configuration,
    /// A device exists but can't be accessed by this user.
    Permission,
    /// A device is missing.
    DeviceUnavailable,
    /// A value doesn't fit its register field, nothing was written.
    Range,
    /// The hardware refused a single operation, retrying may succeed.
    TransientHardware,
    /// A sensor block was shorter than expected, the next sample may succeed.
    ShortRead,
    Unsupported,
    Io,
}

impl HwPowerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Topology(_) => ErrorKind::Configuration,
            Self::Msr(error) => msr_error_kind(error),
            Self::Units(error) => match error {
                UnitsError::LimitTooLarge { .. }
                | UnitsError::TimeWindowOutOfRange { .. }
                | UnitsError::InvalidQuantity { .. } => ErrorKind::Range,
                UnitsError::InconsistentScale { .. } | UnitsError::MissingScale { .. } => {
                    ErrorKind::Configuration
                }
            },
            Self::Occ(error) => match error {
                OccError::ShortRead { .. } | OccError::OutOfBounds { .. } => ErrorKind::ShortRead,
                OccError::Open { io_error, .. } => io_error_kind(io_error),
                OccError::Read { .. } | OccError::UnknownStructureType { .. } => ErrorKind::Io,
            },
            Self::UnsupportedArchitecture { .. }
            | Self::SocketMismatch { .. }
            | Self::DevicesNotDivisible { .. }
            | Self::IncompleteBatch { .. } => ErrorKind::Configuration,
            Self::Vendor { .. } => ErrorKind::DeviceUnavailable,
            Self::Unsupported { .. } => ErrorKind::Unsupported,
            Self::OutOfRange { .. } => ErrorKind::Range,
            Self::Operation(_) | Self::NoSocketSucceeded { .. } | Self::CapNotApplied { .. } => {
                ErrorKind::TransientHardware
            }
            Self::Sysfs { io_error, .. } => io_error_kind(io_error),
            Self::SysfsParse { .. } => ErrorKind::Io,
        }
    }

    pub(crate) fn unsupported(capability: Capability, platform: Platform) -> Self {
        Self::Unsupported {
            capability,
            platform,
        }
    }

    pub(crate) fn out_of_range(what: &'static str, value: f64, min: f64, max: f64) -> Self {
        Self::OutOfRange {
            what,
            value,
            min,
            max,
        }
    }

    pub(crate) fn sysfs(path: impl Into<PathBuf>, io_error: std::io::Error) -> Self {
        Self::Sysfs {
            path: path.into(),
            io_error,
        }
    }
}

fn msr_error_kind(error: &MSRError) -> ErrorKind {
    match error {
        MSRError::PermissionDenied { .. } => ErrorKind::Permission,
        MSRError::OpenForReadWrite { io_error, .. } => io_error_kind(io_error),
        MSRError::ReadWNoErr { .. } | MSRError::WriteWNoErr { .. } => {
            ErrorKind::TransientHardware
        }
        MSRError::ShortAccess { .. } | MSRError::BatchIoctl { .. } => ErrorKind::Io,
        MSRError::UnsupportedTarget => ErrorKind::Unsupported,
        MSRError::NoDeviceForProcessor { .. }
        | MSRError::ProcessorIdTooBig { .. }
        | MSRError::BatchAlreadyAllocated { .. }
        | MSRError::BatchNotAllocated { .. }
        | MSRError::BatchFull { .. }
        | MSRError::EmptyBatch { .. }
        | MSRError::UnknownSlot { .. }
        | MSRError::Topology(_) => ErrorKind::Configuration,
    }
}

fn io_error_kind(error: &std::io::Error) -> ErrorKind {
    match error.kind() {
        std::io::ErrorKind::PermissionDenied => ErrorKind::Permission,
        std::io::ErrorKind::NotFound => ErrorKind::DeviceUnavailable,
        _ => ErrorKind::Io,
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use hwp_msr::BatchKind;

    use super::*;

    #[test]
    fn classifies_lower_layer_errors() {
        let error = HwPowerError::from(MSRError::PermissionDenied {
            path: "/dev/cpu/0/msr".into(),
            hint: "run as root",
        });
        assert_eq!(error.kind(), ErrorKind::Permission);

        let error = HwPowerError::from(MSRError::BatchFull {
            kind: BatchKind::RaplData,
            capacity: 4,
            requested: 5,
        });
        assert_eq!(error.kind(), ErrorKind::Configuration);

        let error = HwPowerError::from(UnitsError::LimitTooLarge {
            watts: 5000.0,
            bits: 40000,
            max: 32767,
        });
        assert_eq!(error.kind(), ErrorKind::Range);

        let error = HwPowerError::from(OccError::ShortRead {
            socket: SocketId::new(1),
            expected: 10,
            actual: 3,
        });
        assert_eq!(error.kind(), ErrorKind::ShortRead);

        let error = HwPowerError::from(TopologyError::ZeroSockets);
        assert_eq!(error.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn missing_files_are_unavailable_devices() {
        let error = HwPowerError::sysfs(
            "/sys/firmware/opal",
            io::Error::from(io::ErrorKind::NotFound),
        );
        assert_eq!(error.kind(), ErrorKind::DeviceUnavailable);

        let error = HwPowerError::sysfs(
            "/sys/firmware/opal",
            io::Error::from(io::ErrorKind::PermissionDenied),
        );
        assert_eq!(error.kind(), ErrorKind::Permission);
    }

    #[test]
    fn unsupported_names_capability_and_platform() {
        let error = HwPowerError::unsupported(Capability::SetCoreFrequency, Platform::AmdCpu);

        assert_eq!(error.kind(), ErrorKind::Unsupported);
        assert_eq!(
            error.to_string(),
            "set-core-frequency isn't supported on amd-cpu"
        );
    }
}
