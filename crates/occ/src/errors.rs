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

use hwp_shared::types::SocketId;

#[derive(ThisError, Debug)]
pub enum OccError {
    #[error("{what} at offset {offset:#X} with length {len} runs past the {available} bytes of the blob")]
    OutOfBounds {
        what: &'static str,
        offset: usize,
        len: usize,
        available: usize,
    },

    #[error("sensor {name} has unknown structure type {code}")]
    UnknownStructureType { name: String, code: u8 },

    #[error("read {actual} of {expected} bytes of the sensor block of socket {socket}")]
    ShortRead {
        socket: SocketId,
        expected: usize,
        actual: usize,
    },

    #[error("failed to open sensor blob {path:?}: {io_error}")]
    Open {
        path: PathBuf,
        io_error: std::io::Error,
    },

    #[error("failed to read the sensor block of socket {socket} from {path:?}: {io_error}")]
    Read {
        path: PathBuf,
        socket: SocketId,
        io_error: std::io::Error,
    },
}

impl OccError {
    pub(crate) fn out_of_bounds(
        what: &'static str,
        offset: usize,
        len: usize,
        available: usize,
    ) -> Self {
        Self::OutOfBounds {
            what,
            offset,
            len,
            available,
        }
    }
}
