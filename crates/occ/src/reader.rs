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

use std::fs::File;
use std::io::ErrorKind;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::path::Path;
use std::path::PathBuf;

use hwp_shared::types::SocketId;

use crate::OccError;
use crate::OccResult;

pub const DEFAULT_SENSORS_PATH: &str = "/sys/firmware/opal/exports/occ_inband_sensors";
/// Size of the sensor block of one OCC.
pub const DEFAULT_BLOCK_SIZE: usize = 0x25800;

/// Reads the per socket sensor blocks out of the OCC sensor export, where
/// socket `n` occupies `block_size` bytes at offset `n * block_size`.
#[derive(Debug)]
pub struct SensorBlobReader {
    path: PathBuf,
    file: File,
    block_size: usize,
}

impl SensorBlobReader {
    pub fn open(path: impl AsRef<Path>, block_size: usize) -> OccResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|io_error| OccError::Open {
            path: path.clone(),
            io_error,
        })?;

        Ok(Self {
            path,
            file,
            block_size,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// One seek and a full read of the block of `socket`. Fewer bytes than a
    /// full block is a `ShortRead`.
    pub fn read_socket(&mut self, socket: SocketId) -> OccResult<Vec<u8>> {
        let read_error = |io_error| OccError::Read {
            path: self.path.clone(),
            socket,
            io_error,
        };

        let offset = (usize::from(socket) as u64) * (self.block_size as u64);
        self.file
            .seek(SeekFrom::Start(offset))
            .map_err(read_error)?;

        let mut block = vec![0u8; self.block_size];
        let mut filled = 0;
        while filled < block.len() {
            match self.file.read(&mut block[filled..]) {
                Ok(0) => break,
                Ok(read) => filled += read,
                Err(error) if error.kind() == ErrorKind::Interrupted => continue,
                Err(error) => return Err(read_error(error)),
            }
        }

        if filled < self.block_size {
            return Err(OccError::ShortRead {
                socket,
                expected: self.block_size,
                actual: filled,
            });
        }

        tracing::debug!("read {filled} sensor bytes of socket {socket}");
        Ok(block)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const BLOCK: usize = 64;

    fn export(blocks: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for (socket, marker) in blocks.iter().enumerate() {
            let mut block = vec![*marker; BLOCK];
            block[0] = socket as u8;
            file.write_all(&block).unwrap();
        }
        file.flush().unwrap();
        file
    }

    #[test]
    fn reads_the_block_of_each_socket() {
        let file = export(&[0xAA, 0xBB]);
        let mut reader = SensorBlobReader::open(file.path(), BLOCK).unwrap();

        let second = reader.read_socket(SocketId::new(1)).unwrap();
        let first = reader.read_socket(SocketId::new(0)).unwrap();

        assert_eq!(first.len(), BLOCK);
        assert_eq!(first[0], 0);
        assert_eq!(first[1], 0xAA);
        assert_eq!(second[0], 1);
        assert_eq!(second[BLOCK - 1], 0xBB);
    }

    #[test]
    fn truncated_block_is_a_short_read() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[1u8; BLOCK + BLOCK / 2]).unwrap();
        file.flush().unwrap();
        let mut reader = SensorBlobReader::open(file.path(), BLOCK).unwrap();

        assert!(reader.read_socket(SocketId::new(0)).is_ok());
        let result = reader.read_socket(SocketId::new(1));
        assert!(matches!(
            result,
            Err(OccError::ShortRead {
                expected: BLOCK,
                actual,
                ..
            }) if actual == BLOCK / 2
        ));
    }

    #[test]
    fn missing_export_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let result = SensorBlobReader::open(dir.path().join("occ_inband_sensors"), BLOCK);

        assert!(matches!(result, Err(OccError::Open { .. })));
    }
}
