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

use thiserror::Error as ThisError;

use hwp_shared::types::CoreId;
use hwp_shared::types::LogicalProcessorId;
use hwp_shared::types::SocketId;
use hwp_shared::types::ThreadId;

#[derive(Debug, ThisError)]
pub enum TopologyError {
    #[error(transparent)]
    RawHwlocError(#[from] hwlocality::errors::RawHwlocError),

    #[error("no sockets detected")]
    ZeroSockets,

    #[error("no cores detected")]
    ZeroCores,

    #[error("{total_cores} cores can't be evenly divided between {sockets} sockets")]
    CoresNotDivisible { total_cores: u32, sockets: u32 },

    #[error("{total_threads} threads can't be evenly divided between {total_cores} cores")]
    ThreadsNotDivisible { total_threads: u32, total_cores: u32 },

    #[error("socket {socket} is out of range, node has {sockets} sockets")]
    SocketOutOfRange { socket: SocketId, sockets: u32 },

    #[error("core {core} is out of range, socket has {cores_per_socket} cores")]
    CoreOutOfRange { core: CoreId, cores_per_socket: u32 },

    #[error("thread {thread} is out of range, core has {threads_per_core} threads")]
    ThreadOutOfRange { thread: ThreadId, threads_per_core: u32 },

    #[error("logical processor {id} is out of range, node has {total_threads} threads")]
    LogicalProcessorOutOfRange {
        id: LogicalProcessorId,
        total_threads: u32,
    },
}

impl TopologyError {
    pub(crate) fn socket_out_of_range(socket: SocketId, sockets: u32) -> Self {
        Self::SocketOutOfRange { socket, sockets }
    }

    pub(crate) fn core_out_of_range(core: CoreId, cores_per_socket: u32) -> Self {
        Self::CoreOutOfRange {
            core,
            cores_per_socket,
        }
    }

    pub(crate) fn thread_out_of_range(thread: ThreadId, threads_per_core: u32) -> Self {
        Self::ThreadOutOfRange {
            thread,
            threads_per_core,
        }
    }

    pub(crate) fn logical_processor_out_of_range(
        id: LogicalProcessorId,
        total_threads: u32,
    ) -> Self {
        Self::LogicalProcessorOutOfRange { id, total_threads }
    }
}
