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

use serde::Serialize;

use crate::fixed_point;
use crate::BeCursor;
use crate::CounterRecord;
use crate::FullRecord;
use crate::OccResult;
use crate::SensorDescriptor;
use crate::SensorTableHeader;
use crate::SensorType;
use crate::StructureType;

/// Value of one sensor taken from the live buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum SensorReading {
    /// Neither buffer holds valid data yet.
    Unavailable,
    Full(FullRecord),
    Counter(CounterRecord),
}

impl SensorReading {
    fn timestamp(&self) -> Option<u64> {
        match self {
            Self::Unavailable => None,
            Self::Full(record) => Some(record.timestamp),
            Self::Counter(record) => Some(record.timestamp),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Sensor {
    pub descriptor: SensorDescriptor,
    pub reading: SensorReading,
}

impl Sensor {
    /// Sample of a full record or accumulator of a counter, scaled to the
    /// sensor units.
    pub fn value(&self) -> Option<f64> {
        let raw = match self.reading {
            SensorReading::Unavailable => return None,
            SensorReading::Full(record) => record.sample as f64,
            SensorReading::Counter(record) => record.accumulator as f64,
        };
        Some(raw * fixed_point(self.descriptor.scale))
    }

    /// Energy accumulated by a full power sensor.
    pub fn energy_joules(&self) -> Option<f64> {
        let SensorReading::Full(record) = self.reading else {
            return None;
        };
        if self.descriptor.sensor_type != SensorType::Power {
            return None;
        }

        let frequency = fixed_point(self.descriptor.freq);
        if frequency == 0.0 {
            return None;
        }
        Some(record.accumulator as f64 / frequency)
    }
}

/// Parsed view of the sensor block of one socket. The underlying bytes are
/// never modified.
#[derive(Clone, Debug)]
pub struct SensorBlob<'a> {
    cursor: BeCursor<'a>,
    header: SensorTableHeader,
}

impl<'a> SensorBlob<'a> {
    pub fn parse(bytes: &'a [u8]) -> OccResult<Self> {
        let cursor = BeCursor::new(bytes);
        let header = SensorTableHeader::parse(&cursor)?;

        Ok(Self { cursor, header })
    }

    pub fn header(&self) -> &SensorTableHeader {
        &self.header
    }

    pub fn descriptors(&self) -> OccResult<Vec<SensorDescriptor>> {
        let stride = self.header.descriptor_stride();
        let count = usize::from(self.header.sensor_count);
        let table = self.cursor.sub(
            "names table",
            self.header.names_offset as usize,
            count.saturating_mul(stride),
        )?;

        (0..count)
            .map(|index| {
                let entry = table.sub("descriptor", index * stride, stride)?;
                SensorDescriptor::parse(&entry)
            })
            .collect()
    }

    /// Reads the record of `descriptor` from whichever of ping and pong is
    /// live. With both valid the newer timestamp wins, pong on a tie.
    pub fn reading(&self, descriptor: &SensorDescriptor) -> OccResult<SensorReading> {
        if !self.header.valid {
            return Ok(SensorReading::Unavailable);
        }

        let ping = self.buffer_reading(self.header.ping_offset, descriptor)?;
        let pong = self.buffer_reading(self.header.pong_offset, descriptor)?;

        let reading = match (ping.timestamp(), pong.timestamp()) {
            (Some(ping_ts), Some(pong_ts)) if ping_ts > pong_ts => ping,
            (Some(_), Some(_)) => pong,
            (Some(_), None) => ping,
            (None, _) => pong,
        };
        Ok(reading)
    }

    pub fn sensors(&self) -> OccResult<Vec<Sensor>> {
        self.descriptors()?
            .into_iter()
            .map(|descriptor| {
                let reading = self.reading(&descriptor)?;
                Ok(Sensor {
                    descriptor,
                    reading,
                })
            })
            .collect()
    }

    fn buffer_reading(
        &self,
        buffer_offset: u32,
        descriptor: &SensorDescriptor,
    ) -> OccResult<SensorReading> {
        let buffer_offset = buffer_offset as usize;
        if self.cursor.u8_at("buffer valid", buffer_offset)? == 0 {
            return Ok(SensorReading::Unavailable);
        }

        let structure = descriptor.structure_type;
        let record = self.cursor.sub(
            "sensor record",
            buffer_offset.saturating_add(descriptor.reading_offset as usize),
            structure.record_size(),
        )?;

        let reading = match structure {
            StructureType::Full => SensorReading::Full(FullRecord::parse(&record)?),
            StructureType::Counter => SensorReading::Counter(CounterRecord::parse(&record)?),
        };
        Ok(reading)
    }
}
