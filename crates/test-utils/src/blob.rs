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

use byteorder::BigEndian;
use byteorder::ByteOrder;

const DESCRIPTOR_SIZE: usize = 48;
const RECORD_SLOT: usize = 48;
// first bytes of each buffer hold the valid flag
const BUFFER_PREFIX: usize = 8;
const NAMES_OFFSET: usize = 32;

const FULL: u8 = 0x01;
const COUNTER: u8 = 0x02;

/// Per buffer content of one sensor record.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct RecordValues {
    pub timestamp: u64,
    pub sample: u16,
    pub accumulator: u64,
}

/// One sensor of a synthetic OCC block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlobSensor {
    pub name: String,
    pub units: String,
    pub gsid: u16,
    pub sensor_type: u16,
    pub location: u16,
    pub structure_type: u8,
    pub scale: u32,
    pub freq: u32,
    pub ping: RecordValues,
    pub pong: RecordValues,
}

impl BlobSensor {
    /// A full record sensor holding `sample` in both buffers.
    pub fn full(name: &str, sensor_type: u16, sample: u16, scale: u32) -> Self {
        let values = RecordValues {
            timestamp: 1,
            sample,
            accumulator: 0,
        };
        Self::new(name, sensor_type, FULL, scale, values)
    }

    /// A counter sensor holding `accumulator` in both buffers.
    pub fn counter(name: &str, accumulator: u64, scale: u32) -> Self {
        let values = RecordValues {
            timestamp: 1,
            sample: 0,
            accumulator,
        };
        Self::new(name, 0x0001, COUNTER, scale, values)
    }

    pub fn with_accumulator(mut self, accumulator: u64) -> Self {
        self.ping.accumulator = accumulator;
        self.pong.accumulator = accumulator;
        self
    }

    /// Update frequency in the same fixed point format as the scale.
    pub fn with_freq(mut self, freq: u32) -> Self {
        self.freq = freq;
        self
    }

    pub fn with_units(mut self, units: &str) -> Self {
        self.units = units.to_string();
        self
    }

    fn new(
        name: &str,
        sensor_type: u16,
        structure_type: u8,
        scale: u32,
        values: RecordValues,
    ) -> Self {
        Self {
            name: name.to_string(),
            units: String::new(),
            gsid: 0,
            sensor_type,
            location: 0,
            structure_type,
            scale,
            freq: 0,
            ping: values,
            pong: values,
        }
    }
}

/// Lays out an OCC sensor block: header, names table, then the ping and pong
/// buffers, each record in a 48 byte slot.
#[derive(Clone, Debug)]
pub struct SensorBlobBuilder {
    sensors: Vec<BlobSensor>,
    header_valid: bool,
    ping_valid: bool,
    pong_valid: bool,
    block_size: Option<usize>,
}

impl Default for SensorBlobBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorBlobBuilder {
    pub fn new() -> Self {
        Self {
            sensors: Vec::new(),
            header_valid: true,
            ping_valid: true,
            pong_valid: true,
            block_size: None,
        }
    }

    pub fn sensor(mut self, sensor: BlobSensor) -> Self {
        self.sensors.push(sensor);
        self
    }

    pub fn header_valid(mut self, valid: bool) -> Self {
        self.header_valid = valid;
        self
    }

    pub fn ping_valid(mut self, valid: bool) -> Self {
        self.ping_valid = valid;
        self
    }

    pub fn pong_valid(mut self, valid: bool) -> Self {
        self.pong_valid = valid;
        self
    }

    /// Pads the block with zeroes up to `size` bytes.
    pub fn block_size(mut self, size: usize) -> Self {
        self.block_size = Some(size);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let count = self.sensors.len();
        let buffer_size = BUFFER_PREFIX + count * RECORD_SLOT;
        let ping_offset = align(NAMES_OFFSET + count * DESCRIPTOR_SIZE);
        let pong_offset = align(ping_offset + buffer_size);
        let total = pong_offset + buffer_size;

        let mut blob = vec![0u8; self.block_size.unwrap_or(total).max(total)];

        blob[0] = self.header_valid as u8;
        blob[1] = 1;
        BigEndian::write_u16(&mut blob[2..], count as u16);
        blob[4] = 1;
        BigEndian::write_u32(&mut blob[8..], NAMES_OFFSET as u32);
        blob[12] = 1;
        blob[13] = DESCRIPTOR_SIZE as u8;
        BigEndian::write_u32(&mut blob[16..], ping_offset as u32);
        BigEndian::write_u32(&mut blob[20..], pong_offset as u32);

        blob[ping_offset] = self.ping_valid as u8;
        blob[pong_offset] = self.pong_valid as u8;

        for (index, sensor) in self.sensors.iter().enumerate() {
            let reading_offset = BUFFER_PREFIX + index * RECORD_SLOT;
            let descriptor = NAMES_OFFSET + index * DESCRIPTOR_SIZE;
            write_descriptor(&mut blob[descriptor..], sensor, reading_offset as u32);

            let ping = ping_offset + reading_offset;
            write_record(&mut blob[ping..], sensor, &sensor.ping);
            let pong = pong_offset + reading_offset;
            write_record(&mut blob[pong..], sensor, &sensor.pong);
        }

        blob
    }
}

fn align(offset: usize) -> usize {
    (offset + 15) & !15
}

fn write_descriptor(out: &mut [u8], sensor: &BlobSensor, reading_offset: u32) {
    copy_padded(&mut out[0..16], &sensor.name);
    copy_padded(&mut out[16..20], &sensor.units);
    BigEndian::write_u16(&mut out[20..], sensor.gsid);
    BigEndian::write_u32(&mut out[22..], sensor.freq);
    BigEndian::write_u32(&mut out[26..], sensor.scale);
    BigEndian::write_u16(&mut out[30..], sensor.sensor_type);
    BigEndian::write_u16(&mut out[32..], sensor.location);
    out[34] = sensor.structure_type;
    BigEndian::write_u32(&mut out[35..], reading_offset);
}

fn write_record(out: &mut [u8], sensor: &BlobSensor, values: &RecordValues) {
    BigEndian::write_u16(&mut out[0..], sensor.gsid);
    BigEndian::write_u64(&mut out[2..], values.timestamp);

    if sensor.structure_type == COUNTER {
        BigEndian::write_u64(&mut out[10..], values.accumulator);
        out[18] = values.sample as u8;
    } else {
        BigEndian::write_u16(&mut out[10..], values.sample);
        BigEndian::write_u16(&mut out[12..], values.sample);
        BigEndian::write_u16(&mut out[14..], values.sample);
        BigEndian::write_u64(&mut out[28..], values.accumulator);
    }
}

fn copy_padded(out: &mut [u8], text: &str) {
    let bytes = text.as_bytes();
    let len = bytes.len().min(out.len());
    out[..len].copy_from_slice(&bytes[..len]);
}
