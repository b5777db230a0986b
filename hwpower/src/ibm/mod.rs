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

//! IBM POWER9 backend: sensors decoded from the on-chip controller export,
//! power cap and power shifting ratios through OPAL sysfs files.

mod opal;

use std::collections::BTreeMap;
use std::path::PathBuf;

use hwp_occ::FrequencyView;
use hwp_occ::PowerView;
use hwp_occ::Sensor;
use hwp_occ::SensorBlob;
use hwp_occ::SensorBlobReader;
use hwp_occ::SensorValue;
use hwp_occ::ThermalView;
use hwp_shared::types::SocketId;

use crate::DomainPower;
use crate::HwPowerResult;
use crate::Measurement;
use crate::NodePowerCap;
use crate::PowerDomain;
use crate::SocketPower;
use crate::SocketSensors;
use crate::WriteSummary;

pub use opal::Opal;

#[derive(Debug)]
pub(crate) struct IbmPower9 {
    reader: SensorBlobReader,
    opal: Opal,
    sockets: u32,
}

impl IbmPower9 {
    pub(crate) fn new(reader: SensorBlobReader, opal: Opal, sockets: u32) -> Self {
        Self {
            reader,
            opal,
            sockets,
        }
    }

    /// Reads the sensor block of every socket. A failed read aborts the
    /// sample, a block that doesn't decode only fails its socket.
    fn sample(&mut self) -> HwPowerResult<Vec<(SocketId, Measurement<Vec<Sensor>>)>> {
        let mut sample = Vec::with_capacity(self.sockets as usize);

        for socket in (0..self.sockets).map(SocketId::new) {
            let block = self.reader.read_socket(socket)?;
            let sensors = SensorBlob::parse(&block).and_then(|blob| blob.sensors());
            if let Err(error) = &sensors {
                log::warn!("sensor block of socket {socket} doesn't decode: {error}");
            }
            sample.push((socket, sensors.into()));
        }

        Ok(sample)
    }

    pub(crate) fn power(&mut self) -> HwPowerResult<Vec<SocketPower>> {
        let power = self
            .sample()?
            .into_iter()
            .map(|(socket, sensors)| match sensors {
                Measurement::Value(sensors) => {
                    let view = PowerView::from_sensors(&sensors);
                    let domains = [
                        (PowerDomain::Node, view.node_watts),
                        (PowerDomain::Processor, view.processor_watts),
                        (PowerDomain::Memory, view.memory_watts),
                        (PowerDomain::Gpu, view.gpu_watts),
                    ]
                    .into_iter()
                    .map(|(domain, watts)| DomainPower {
                        domain,
                        watts: Measurement::from_option(watts),
                        energy: None,
                    })
                    .collect();
                    SocketPower {
                        socket,
                        domains,
                        sensor_energy_joules: view.energy_joules,
                    }
                }
                failed => SocketPower {
                    socket,
                    domains: vec![DomainPower {
                        domain: PowerDomain::Node,
                        watts: failed.map(|_| 0.0),
                        energy: None,
                    }],
                    sensor_energy_joules: BTreeMap::new(),
                },
            })
            .collect();

        Ok(power)
    }

    pub(crate) fn thermals(&mut self) -> HwPowerResult<Vec<SocketSensors>> {
        self.sensor_values(|sensors| ThermalView::from_sensors(sensors).sensors)
    }

    pub(crate) fn frequencies(&mut self) -> HwPowerResult<Vec<SocketSensors>> {
        self.sensor_values(|sensors| FrequencyView::from_sensors(sensors).sensors)
    }

    pub(crate) fn power_limits(&self) -> NodePowerCap {
        self.opal.powercap(self.sockets)
    }

    pub(crate) fn set_node_power_limit(&self, watts: u64) -> HwPowerResult<WriteSummary> {
        self.opal.set_powercap(watts)
    }

    pub(crate) fn set_gpu_power_ratio(&self, percent: u64) -> HwPowerResult<WriteSummary> {
        self.opal.set_gpu_ratio(percent, self.sockets)
    }

    pub(crate) fn files(&self) -> Vec<PathBuf> {
        let mut files = vec![self.reader.path().to_path_buf()];
        files.extend(self.opal.files());
        files
    }

    fn sensor_values(
        &mut self,
        view: impl Fn(&[Sensor]) -> Vec<SensorValue>,
    ) -> HwPowerResult<Vec<SocketSensors>> {
        let sensors = self
            .sample()?
            .into_iter()
            .map(|(socket, sensors)| SocketSensors {
                socket,
                sensors: sensors.map(|sensors| view(&sensors)),
            })
            .collect();

        Ok(sensors)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::time::Duration;

    use hwp_test_utils::*;

    use super::*;

    const BLOCK: usize = 0x1000;
    const POWER: u16 = 0x80;
    const TEMPERATURE: u16 = 0x08;
    const FREQUENCY: u16 = 0x40;
    // mantissa 1, decimal exponent 0
    const UNIT_SCALE: u32 = 0x100;

    fn socket_block(node_watts: u16) -> Vec<u8> {
        SensorBlobBuilder::new()
            .sensor(BlobSensor::full("PWRSYS", POWER, node_watts, UNIT_SCALE))
            .sensor(BlobSensor::full("PWRPROC", POWER, 180, UNIT_SCALE))
            .sensor(BlobSensor::full("TEMPPROCTHRM", TEMPERATURE, 61, UNIT_SCALE).with_units("C"))
            .sensor(BlobSensor::full("FREQA", FREQUENCY, 3200, UNIT_SCALE).with_units("MHz"))
            .sensor(BlobSensor::counter("PWRSYSACC", 5000, UNIT_SCALE))
            .block_size(BLOCK)
            .build()
    }

    fn backend(blocks: &[Vec<u8>]) -> (tempfile::TempDir, IbmPower9) {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join("occ_inband_sensors");
        let mut file = std::fs::File::create(&path).unwrap();
        for block in blocks {
            file.write_all(block).unwrap();
        }

        let reader = SensorBlobReader::open(&path, BLOCK).unwrap();
        let opal = Opal::new(root.path().join("powercap"), root.path().join("psr"), Duration::ZERO);
        (root, IbmPower9::new(reader, opal, blocks.len() as u32))
    }

    #[test]
    fn node_power_per_socket() {
        let (_root, mut ibm) = backend(&[socket_block(500), socket_block(0)]);

        let power = ibm.power().unwrap();
        assert_eq!(power.len(), 2);
        assert_eq!(power[0].domains[0].domain, PowerDomain::Node);
        assert_eq!(power[0].domains[0].watts, Measurement::Value(500.0));
        assert_eq!(power[0].domains[1].watts, Measurement::Value(180.0));
        assert_eq!(power[0].domains[2].watts, Measurement::Unavailable);
        assert_eq!(power[1].domains[0].watts, Measurement::Value(0.0));
    }

    #[test]
    fn power_sensors_report_accumulated_energy() {
        let block = SensorBlobBuilder::new()
            .sensor(
                BlobSensor::full("PWRSYS", POWER, 500, UNIT_SCALE)
                    .with_accumulator(6000)
                    .with_freq(0x400),
            )
            .sensor(
                BlobSensor::full("PWRAPSSCH0", POWER, 40, UNIT_SCALE)
                    .with_accumulator(900)
                    .with_freq(0x300),
            )
            .sensor(BlobSensor::full("PWRPROC", POWER, 180, UNIT_SCALE))
            .block_size(BLOCK)
            .build();
        let (_root, mut ibm) = backend(&[block, socket_block(500)]);

        let power = ibm.power().unwrap();
        let energy = &power[0].sensor_energy_joules;
        assert_eq!(energy.len(), 2);
        assert_eq!(energy["PWRSYS"], 1500.0);
        assert_eq!(energy["PWRAPSSCH0"], 300.0);
        assert!(power[1].sensor_energy_joules.is_empty());
    }

    #[test]
    fn typed_sensor_views() {
        let (_root, mut ibm) = backend(&[socket_block(500)]);

        let thermals = ibm.thermals().unwrap();
        let sensors = thermals[0].sensors.value().unwrap();
        assert_eq!(sensors.len(), 1);
        assert_eq!(sensors[0].name, "TEMPPROCTHRM");
        assert_eq!(sensors[0].value, Some(61.0));

        let frequencies = ibm.frequencies().unwrap();
        let sensors = frequencies[0].sensors.value().unwrap();
        assert_eq!(sensors[0].units, "MHz");
        assert_eq!(sensors[0].value, Some(3200.0));
    }

    #[test]
    fn invalid_buffers_yield_unavailable_power() {
        let block = SensorBlobBuilder::new()
            .sensor(BlobSensor::full("PWRSYS", POWER, 500, UNIT_SCALE))
            .ping_valid(false)
            .pong_valid(false)
            .block_size(BLOCK)
            .build();
        let (_root, mut ibm) = backend(&[block]);

        let power = ibm.power().unwrap();
        assert!(power[0]
            .domains
            .iter()
            .all(|domain| domain.watts == Measurement::Unavailable));
    }

    #[test]
    fn truncated_export_is_a_short_read() {
        let (_root, mut ibm) = backend(&[socket_block(500)]);
        ibm.sockets = 2;

        let error = ibm.power().unwrap_err();
        assert_eq!(error.kind(), crate::ErrorKind::ShortRead);
    }

    #[test]
    fn undecodable_block_fails_only_its_socket() {
        let mut garbage = vec![0u8; BLOCK];
        garbage[0] = 1;
        garbage[2..4].copy_from_slice(&0x0100u16.to_be_bytes());
        garbage[8..12].copy_from_slice(&0x0FF0u32.to_be_bytes());
        let (_root, mut ibm) = backend(&[socket_block(500), garbage]);

        let power = ibm.power().unwrap();
        assert_eq!(power[0].domains[0].watts, Measurement::Value(500.0));
        assert!(power[1].domains[0].watts.is_failed());
    }
}
