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

use crate::OccError;
use crate::OccResult;

/// Bounds-checked big-endian view over a borrowed byte slice. Offsets are
/// relative to the start of the view.
#[derive(Copy, Clone, Debug)]
pub struct BeCursor<'a> {
    bytes: &'a [u8],
}

impl<'a> BeCursor<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// A view of `len` bytes starting at `offset`.
    pub fn sub(&self, what: &'static str, offset: usize, len: usize) -> OccResult<BeCursor<'a>> {
        self.bytes(what, offset, len).map(BeCursor::new)
    }

    pub fn bytes(&self, what: &'static str, offset: usize, len: usize) -> OccResult<&'a [u8]> {
        offset
            .checked_add(len)
            .and_then(|end| self.bytes.get(offset..end))
            .ok_or_else(|| OccError::out_of_bounds(what, offset, len, self.bytes.len()))
    }

    pub fn u8_at(&self, what: &'static str, offset: usize) -> OccResult<u8> {
        self.bytes(what, offset, 1).map(|bytes| bytes[0])
    }

    pub fn u16_at(&self, what: &'static str, offset: usize) -> OccResult<u16> {
        self.bytes(what, offset, 2).map(BigEndian::read_u16)
    }

    pub fn u32_at(&self, what: &'static str, offset: usize) -> OccResult<u32> {
        self.bytes(what, offset, 4).map(BigEndian::read_u32)
    }

    pub fn u64_at(&self, what: &'static str, offset: usize) -> OccResult<u64> {
        self.bytes(what, offset, 8).map(BigEndian::read_u64)
    }

    /// A NUL padded string field, cut at the first NUL.
    pub fn str_at(&self, what: &'static str, offset: usize, len: usize) -> OccResult<String> {
        let bytes = self.bytes(what, offset, len)?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_big_endian_fields() {
        let bytes = [0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC, 0xDE, 0xF0, 0x01];
        let cursor = BeCursor::new(&bytes);

        assert_eq!(cursor.u8_at("byte", 8).unwrap(), 0x01);
        assert_eq!(cursor.u16_at("short", 0).unwrap(), 0x1234);
        assert_eq!(cursor.u32_at("word", 1).unwrap(), 0x3456_789A);
        assert_eq!(cursor.u64_at("long", 0).unwrap(), 0x1234_5678_9ABC_DEF0);
    }

    #[test]
    fn rejects_reads_past_the_end() {
        let bytes = [0u8; 4];
        let cursor = BeCursor::new(&bytes);

        assert!(cursor.u32_at("word", 0).is_ok());
        let error = cursor.u32_at("word", 1).unwrap_err();
        assert!(matches!(
            error,
            OccError::OutOfBounds {
                what: "word",
                offset: 1,
                len: 4,
                available: 4
            }
        ));
        assert!(cursor.bytes("huge", usize::MAX, 2).is_err());
    }

    #[test]
    fn sub_views_are_relative() {
        let bytes = [0, 0, 0xAB, 0xCD];
        let cursor = BeCursor::new(&bytes).sub("tail", 2, 2).unwrap();

        assert_eq!(cursor.len(), 2);
        assert_eq!(cursor.u16_at("value", 0).unwrap(), 0xABCD);
        assert!(cursor.u8_at("value", 2).is_err());
    }

    #[test]
    fn strings_stop_at_nul() {
        let bytes = *b"PWRSYS\0\0garbage!";
        let cursor = BeCursor::new(&bytes);

        assert_eq!(cursor.str_at("name", 0, 16).unwrap(), "PWRSYS");
        assert_eq!(cursor.str_at("name", 8, 8).unwrap(), "garbage!");
    }
}
