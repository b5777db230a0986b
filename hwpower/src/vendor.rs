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

//! Boundary to vendor management libraries for devices that aren't register
//! addressable, accelerators mostly. Bindings implement [`VendorDevices`] and
//! get socket mapping and unit conversion from here.

use std::fmt::Display;

use chrono::DateTime;
use chrono::Utc;
use serde::Serialize;

use hwp_shared::types::SocketId;

use crate::HwPowerError;
use crate::HwPowerResult;
use crate::Measurement;

/// Synchronous accessors of a vendor library, addressed by the library's
/// flat device index and returning the library's native units.
pub trait VendorDevices {
    type Error: Display;

    fn device_count(&mut self) -> Result<u32, Self::Error>;

    fn power_milliwatts(&mut self, device: u32) -> Result<u64, Self::Error>;

    fn temperature_millicelsius(&mut self, device: u32) -> Result<i64, Self::Error>;

    fn clock_mhz(&mut self, device: u32) -> Result<u64, Self::Error>;
}

/// Maps `(socket, device within socket)` to a vendor's flat device index.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DeviceIndex {
    devices_per_socket: u32,
}

impl DeviceIndex {
    pub fn new(devices: u32, sockets: u32) -> HwPowerResult<Self> {
        if sockets == 0 || devices % sockets != 0 {
            return Err(HwPowerError::DevicesNotDivisible { devices, sockets });
        }

        Ok(Self {
            devices_per_socket: devices / sockets,
        })
    }

    pub fn devices_per_socket(&self) -> u32 {
        self.devices_per_socket
    }

    /// `None` when `local` doesn't exist on a socket.
    pub fn flat(&self, socket: SocketId, local: u32) -> Option<u32> {
        if local >= self.devices_per_socket {
            return None;
        }

        Some(u32::from(socket) * self.devices_per_socket + local)
    }

    pub fn split(&self, flat: u32) -> (SocketId, u32) {
        (
            SocketId::new(flat / self.devices_per_socket),
            flat % self.devices_per_socket,
        )
    }
}

pub fn milliwatts_to_watts(milliwatts: u64) -> f64 {
    milliwatts as f64 / 1e3
}

pub fn microwatts_to_watts(microwatts: u64) -> f64 {
    microwatts as f64 / 1e6
}

pub fn microjoules_to_joules(microjoules: u64) -> f64 {
    microjoules as f64 / 1e6
}

pub fn millicelsius_to_celsius(millicelsius: i64) -> f64 {
    millicelsius as f64 / 1e3
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DeviceReading {
    pub socket: SocketId,
    pub device: u32,
    pub watts: Measurement<f64>,
    pub celsius: Measurement<f64>,
    pub mhz: Measurement<u64>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DeviceSample {
    pub timestamp: DateTime<Utc>,
    pub devices: Vec<DeviceReading>,
}

/// Reads every device of a vendor library. A failing device keeps its
/// failure in the sample, only a failing enumeration fails the call.
pub fn sample_devices<D: VendorDevices>(
    devices: &mut D,
    sockets: u32,
) -> HwPowerResult<DeviceSample> {
    let count = devices
        .device_count()
        .map_err(|error| HwPowerError::Vendor {
            reason: error.to_string(),
        })?;
    let index = DeviceIndex::new(count, sockets)?;

    let readings = (0..count)
        .map(|flat| {
            let (socket, device) = index.split(flat);
            DeviceReading {
                socket,
                device,
                watts: Measurement::from(devices.power_milliwatts(flat))
                    .map(milliwatts_to_watts),
                celsius: Measurement::from(devices.temperature_millicelsius(flat))
                    .map(millicelsius_to_celsius),
                mhz: devices.clock_mhz(flat).into(),
            }
        })
        .collect();

    Ok(DeviceSample {
        timestamp: Utc::now(),
        devices: readings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeGpus {
        power: Vec<Option<u64>>,
    }

    impl VendorDevices for FakeGpus {
        type Error = String;

        fn device_count(&mut self) -> Result<u32, Self::Error> {
            Ok(self.power.len() as u32)
        }

        fn power_milliwatts(&mut self, device: u32) -> Result<u64, Self::Error> {
            self.power[device as usize].ok_or_else(|| format!("device {device} is gone"))
        }

        fn temperature_millicelsius(&mut self, _device: u32) -> Result<i64, Self::Error> {
            Ok(45_500)
        }

        fn clock_mhz(&mut self, _device: u32) -> Result<u64, Self::Error> {
            Ok(1530)
        }
    }

    #[test]
    fn flat_index_round_trips_through_sockets() {
        let index = DeviceIndex::new(6, 2).unwrap();

        assert_eq!(index.devices_per_socket(), 3);
        assert_eq!(index.flat(SocketId::new(1), 2), Some(5));
        assert_eq!(index.flat(SocketId::new(1), 3), None);
        assert_eq!(index.split(4), (SocketId::new(1), 1));
    }

    #[test]
    fn uneven_devices_are_rejected() {
        assert!(matches!(
            DeviceIndex::new(5, 2),
            Err(HwPowerError::DevicesNotDivisible { devices: 5, sockets: 2 })
        ));
        assert!(DeviceIndex::new(4, 0).is_err());
    }

    #[test]
    fn unit_helpers() {
        assert_eq!(milliwatts_to_watts(250_000), 250.0);
        assert_eq!(microwatts_to_watts(1_500_000), 1.5);
        assert_eq!(microjoules_to_joules(2_000_000), 2.0);
        assert_eq!(millicelsius_to_celsius(-5_000), -5.0);
    }

    #[test]
    fn failing_device_stays_in_sample() {
        let mut gpus = FakeGpus {
            power: vec![Some(300_000), None, Some(150_000), Some(0)],
        };

        let sample = sample_devices(&mut gpus, 2).unwrap();

        assert_eq!(sample.devices.len(), 4);
        assert_eq!(sample.devices[0].watts, Measurement::Value(300.0));
        assert_eq!(
            sample.devices[1].watts,
            Measurement::Failed("device 1 is gone".to_string())
        );
        assert_eq!(sample.devices[2].socket, SocketId::new(1));
        assert_eq!(sample.devices[2].device, 0);
        assert_eq!(sample.devices[3].celsius, Measurement::Value(45.5));
        assert_eq!(sample.devices[3].mhz, Measurement::Value(1530));
    }
}
