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

//! Packed big-endian structures of the OCC sensor blob.

use serde::Serialize;

use crate::BeCursor;
use crate::OccError;
use crate::OccResult;

pub const HEADER_SIZE: usize = 24;
pub const DESCRIPTOR_SIZE: usize = 48;
pub const FULL_RECORD_SIZE: usize = 48;
pub const COUNTER_RECORD_SIZE: usize = 24;

const NAME_LENGTH: usize = 16;
const UNITS_LENGTH: usize = 4;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SensorTableHeader {
    pub valid: bool,
    pub version: u8,
    pub sensor_count: u16,
    pub reading_version: u8,
    pub names_offset: u32,
    pub names_version: u8,
    /// Size of one descriptor, zero on old firmware.
    pub name_length: u8,
    pub ping_offset: u32,
    pub pong_offset: u32,
}

impl SensorTableHeader {
    pub fn parse(cursor: &BeCursor<'_>) -> OccResult<Self> {
        let header = cursor.sub("header", 0, HEADER_SIZE)?;

        Ok(Self {
            valid: header.u8_at("header valid", 0)? != 0,
            version: header.u8_at("header version", 1)?,
            sensor_count: header.u16_at("sensor count", 2)?,
            reading_version: header.u8_at("reading version", 4)?,
            names_offset: header.u32_at("names offset", 8)?,
            names_version: header.u8_at("names version", 12)?,
            name_length: header.u8_at("name length", 13)?,
            ping_offset: header.u32_at("ping offset", 16)?,
            pong_offset: header.u32_at("pong offset", 20)?,
        })
    }

    pub fn descriptor_stride(&self) -> usize {
        match self.name_length {
            0 => DESCRIPTOR_SIZE,
            length => usize::from(length),
        }
    }
}

/// Kind of quantity a sensor measures.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum SensorType {
    Generic,
    Current,
    Voltage,
    Temperature,
    Utilization,
    Time,
    Frequency,
    Power,
    Performance,
    Other(u16),
}

impl SensorType {
    pub fn from_code(code: u16) -> Self {
        match code {
            0x0001 => Self::Generic,
            0x0002 => Self::Current,
            0x0004 => Self::Voltage,
            0x0008 => Self::Temperature,
            0x0010 => Self::Utilization,
            0x0020 => Self::Time,
            0x0040 => Self::Frequency,
            0x0080 => Self::Power,
            0x0200 => Self::Performance,
            other => Self::Other(other),
        }
    }

    pub fn code(&self) -> u16 {
        match self {
            Self::Generic => 0x0001,
            Self::Current => 0x0002,
            Self::Voltage => 0x0004,
            Self::Temperature => 0x0008,
            Self::Utilization => 0x0010,
            Self::Time => 0x0020,
            Self::Frequency => 0x0040,
            Self::Power => 0x0080,
            Self::Performance => 0x0200,
            Self::Other(code) => *code,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum StructureType {
    /// Instantaneous sample with min/max history and an accumulator.
    Full,
    /// Monotonic accumulator only.
    Counter,
}

impl StructureType {
    pub const FULL_CODE: u8 = 0x01;
    pub const COUNTER_CODE: u8 = 0x02;

    pub fn record_size(&self) -> usize {
        match self {
            Self::Full => FULL_RECORD_SIZE,
            Self::Counter => COUNTER_RECORD_SIZE,
        }
    }
}

/// Entry of the names table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SensorDescriptor {
    pub name: String,
    pub units: String,
    pub gsid: u16,
    /// Update frequency, fixed point.
    pub freq: u32,
    /// Scale factor, fixed point.
    pub scale: u32,
    pub sensor_type: SensorType,
    pub location: u16,
    pub structure_type: StructureType,
    /// Offset of the record inside the ping and pong buffers.
    pub reading_offset: u32,
    pub sensor_data: u8,
}

impl SensorDescriptor {
    pub fn parse(cursor: &BeCursor<'_>) -> OccResult<Self> {
        let name = cursor.str_at("sensor name", 0, NAME_LENGTH)?;
        let structure_code = cursor.u8_at("structure type", 34)?;
        let structure_type = match structure_code {
            StructureType::FULL_CODE => StructureType::Full,
            StructureType::COUNTER_CODE => StructureType::Counter,
            code => return Err(OccError::UnknownStructureType { name, code }),
        };

        Ok(Self {
            units: cursor.str_at("sensor units", 16, UNITS_LENGTH)?,
            gsid: cursor.u16_at("gsid", 20)?,
            freq: cursor.u32_at("freq", 22)?,
            scale: cursor.u32_at("scale", 26)?,
            sensor_type: SensorType::from_code(cursor.u16_at("sensor type", 30)?),
            location: cursor.u16_at("location", 32)?,
            structure_type,
            reading_offset: cursor.u32_at("reading offset", 35)?,
            sensor_data: cursor.u8_at("sensor data", 39)?,
            name,
        })
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FullRecord {
    pub gsid: u16,
    pub timestamp: u64,
    pub sample: u16,
    pub sample_min: u16,
    pub sample_max: u16,
    pub accumulator: u64,
    pub update_tag: u32,
}

impl FullRecord {
    pub fn parse(cursor: &BeCursor<'_>) -> OccResult<Self> {
        Ok(Self {
            gsid: cursor.u16_at("record gsid", 0)?,
            timestamp: cursor.u64_at("record timestamp", 2)?,
            sample: cursor.u16_at("record sample", 10)?,
            sample_min: cursor.u16_at("record sample min", 12)?,
            sample_max: cursor.u16_at("record sample max", 14)?,
            accumulator: cursor.u64_at("record accumulator", 28)?,
            update_tag: cursor.u32_at("record update tag", 36)?,
        })
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CounterRecord {
    pub gsid: u16,
    pub timestamp: u64,
    pub accumulator: u64,
    pub sample: u8,
}

impl CounterRecord {
    pub fn parse(cursor: &BeCursor<'_>) -> OccResult<Self> {
        Ok(Self {
            gsid: cursor.u16_at("counter gsid", 0)?,
            timestamp: cursor.u64_at("counter timestamp", 2)?,
            accumulator: cursor.u64_at("counter accumulator", 10)?,
            sample: cursor.u8_at("counter sample", 18)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_header_fields() {
        let mut bytes = vec![0u8; HEADER_SIZE];
        bytes[0] = 1;
        bytes[1] = 1;
        bytes[2..4].copy_from_slice(&336u16.to_be_bytes());
        bytes[8..12].copy_from_slice(&0x40u32.to_be_bytes());
        bytes[13] = 48;
        bytes[16..20].copy_from_slice(&0xDC00u32.to_be_bytes());
        bytes[20..24].copy_from_slice(&0x18C00u32.to_be_bytes());

        let header = SensorTableHeader::parse(&BeCursor::new(&bytes)).unwrap();

        assert!(header.valid);
        assert_eq!(header.sensor_count, 336);
        assert_eq!(header.names_offset, 0x40);
        assert_eq!(header.descriptor_stride(), 48);
        assert_eq!(header.ping_offset, 0xDC00);
        assert_eq!(header.pong_offset, 0x18C00);
    }

    #[test]
    fn truncated_header_is_out_of_bounds() {
        let bytes = [1u8; HEADER_SIZE - 1];
        let result = SensorTableHeader::parse(&BeCursor::new(&bytes));

        assert!(matches!(result, Err(OccError::OutOfBounds { .. })));
    }

    #[test]
    fn unknown_structure_type_is_rejected() {
        let mut bytes = [0u8; DESCRIPTOR_SIZE];
        bytes[..4].copy_from_slice(b"TEMP");
        bytes[34] = 7;

        let result = SensorDescriptor::parse(&BeCursor::new(&bytes));
        assert!(matches!(
            result,
            Err(OccError::UnknownStructureType { code: 7, ref name }) if name == "TEMP"
        ));
    }

    #[test]
    fn sensor_type_codes_round_trip() {
        for code in [0x01, 0x08, 0x40, 0x80, 0x200, 0x1234] {
            assert_eq!(SensorType::from_code(code).code(), code);
        }
        assert_eq!(SensorType::from_code(0x80), SensorType::Power);
    }
}
