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

use hwp_shared::types::CoreId;
use hwp_shared::types::LogicalProcessorId;
use hwp_shared::types::SocketId;
use hwp_shared::types::ThreadId;

use crate::TopologyError;
use crate::TopologyResult;

/// Shape of the node: how many sockets, cores and hardware threads it has.
///
/// Logical processors are numbered thread-major:
/// `thread * total_cores + socket * cores_per_socket + core`, so ids
/// `0..total_cores` are the first hardware thread of every core and the
/// first core of socket `s` is `s * cores_per_socket`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Topology {
    sockets: u32,
    total_cores: u32,
    total_threads: u32,
}

/// Position of a logical processor inside the topology.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Coordinates {
    pub socket: SocketId,
    pub core: CoreId,
    pub thread: ThreadId,
}

impl Topology {
    pub fn new(sockets: u32, total_cores: u32, total_threads: u32) -> TopologyResult<Self> {
        if sockets == 0 {
            return Err(TopologyError::ZeroSockets);
        }
        if total_cores == 0 {
            return Err(TopologyError::ZeroCores);
        }
        if total_cores % sockets != 0 {
            return Err(TopologyError::CoresNotDivisible {
                total_cores,
                sockets,
            });
        }
        if total_threads == 0 || total_threads % total_cores != 0 {
            return Err(TopologyError::ThreadsNotDivisible {
                total_threads,
                total_cores,
            });
        }

        Ok(Self {
            sockets,
            total_cores,
            total_threads,
        })
    }

    pub fn sockets(&self) -> u32 {
        self.sockets
    }

    pub fn total_cores(&self) -> u32 {
        self.total_cores
    }

    pub fn total_threads(&self) -> u32 {
        self.total_threads
    }

    pub fn cores_per_socket(&self) -> u32 {
        self.total_cores / self.sockets
    }

    pub fn threads_per_core(&self) -> u32 {
        self.total_threads / self.total_cores
    }

    pub fn has_hyperthreading(&self) -> bool {
        self.threads_per_core() > 1
    }

    pub fn logical_id(
        &self,
        socket: SocketId,
        core: CoreId,
        thread: ThreadId,
    ) -> TopologyResult<LogicalProcessorId> {
        self.check_socket(socket)?;

        let cores_per_socket = self.cores_per_socket();
        if core.get() >= cores_per_socket {
            return Err(TopologyError::core_out_of_range(core, cores_per_socket));
        }

        let threads_per_core = self.threads_per_core();
        if thread.get() >= threads_per_core {
            return Err(TopologyError::thread_out_of_range(thread, threads_per_core));
        }

        let id = thread.get() * self.total_cores + socket.get() * cores_per_socket + core.get();
        Ok(LogicalProcessorId::new(id))
    }

    pub fn coordinates(&self, id: LogicalProcessorId) -> TopologyResult<Coordinates> {
        self.check_logical_id(id)?;

        let cores_per_socket = self.cores_per_socket();
        let thread = id.get() / self.total_cores;
        let within_thread = id.get() % self.total_cores;

        Ok(Coordinates {
            socket: SocketId::new(within_thread / cores_per_socket),
            core: CoreId::new(within_thread % cores_per_socket),
            thread: ThreadId::new(thread),
        })
    }

    pub fn socket_of(&self, id: LogicalProcessorId) -> TopologyResult<SocketId> {
        self.coordinates(id).map(|coordinates| coordinates.socket)
    }

    pub fn socket_ids(&self) -> impl Iterator<Item = SocketId> {
        (0..self.sockets).map(SocketId::new)
    }

    /// First thread of the first core of every socket, in socket order.
    pub fn socket_leaders(&self) -> Vec<LogicalProcessorId> {
        let cores_per_socket = self.cores_per_socket();
        (0..self.sockets)
            .map(|socket| LogicalProcessorId::new(socket * cores_per_socket))
            .collect()
    }

    pub fn all_logical_ids(&self) -> impl Iterator<Item = LogicalProcessorId> {
        (0..self.total_threads).map(LogicalProcessorId::new)
    }

    pub fn check_socket(&self, socket: SocketId) -> TopologyResult<()> {
        if socket.get() >= self.sockets {
            return Err(TopologyError::socket_out_of_range(socket, self.sockets));
        }
        Ok(())
    }

    pub fn check_logical_id(&self, id: LogicalProcessorId) -> TopologyResult<()> {
        if id.get() >= self.total_threads {
            return Err(TopologyError::logical_processor_out_of_range(
                id,
                self.total_threads,
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn two_socket_node() -> Topology {
        Topology::new(2, 8, 16).unwrap()
    }

    #[test]
    fn derived_counts() {
        let topology = two_socket_node();

        assert_eq!(topology.cores_per_socket(), 4);
        assert_eq!(topology.threads_per_core(), 2);
        assert!(topology.has_hyperthreading());
    }

    #[test]
    fn rejects_self_contradictory_shapes() {
        assert!(matches!(
            Topology::new(0, 8, 16),
            Err(TopologyError::ZeroSockets)
        ));
        assert!(matches!(
            Topology::new(3, 8, 16),
            Err(TopologyError::CoresNotDivisible { .. })
        ));
        assert!(matches!(
            Topology::new(2, 8, 12),
            Err(TopologyError::ThreadsNotDivisible { .. })
        ));
        assert!(matches!(
            Topology::new(2, 0, 0),
            Err(TopologyError::ZeroCores)
        ));
    }

    #[test]
    fn logical_id_follows_thread_major_layout() {
        let topology = two_socket_node();

        let id = |s, c, t| {
            topology
                .logical_id(SocketId::new(s), CoreId::new(c), ThreadId::new(t))
                .unwrap()
                .get()
        };

        assert_eq!(id(0, 0, 0), 0);
        assert_eq!(id(0, 3, 0), 3);
        assert_eq!(id(1, 0, 0), 4);
        assert_eq!(id(1, 3, 0), 7);
        assert_eq!(id(0, 0, 1), 8);
        assert_eq!(id(1, 3, 1), 15);
    }

    #[test]
    fn coordinates_invert_logical_id() {
        let topology = two_socket_node();
        let mut seen = HashSet::new();

        for id in topology.all_logical_ids() {
            let coordinates = topology.coordinates(id).unwrap();
            let back = topology
                .logical_id(coordinates.socket, coordinates.core, coordinates.thread)
                .unwrap();
            assert_eq!(back, id);
            assert!(seen.insert(coordinates));
        }

        assert_eq!(seen.len(), 16);
    }

    #[test]
    fn socket_leaders_step_by_cores_per_socket() {
        let topology = Topology::new(4, 16, 32).unwrap();
        let leaders = topology
            .socket_leaders()
            .into_iter()
            .map(LogicalProcessorId::get)
            .collect::<Vec<_>>();

        assert_eq!(leaders, vec![0, 4, 8, 12]);
    }

    #[test]
    fn out_of_range_coordinates_are_rejected() {
        let topology = two_socket_node();

        let result = topology.logical_id(SocketId::new(2), CoreId::new(0), ThreadId::new(0));
        assert!(matches!(result, Err(TopologyError::SocketOutOfRange { .. })));

        let result = topology.logical_id(SocketId::new(0), CoreId::new(4), ThreadId::new(0));
        assert!(matches!(result, Err(TopologyError::CoreOutOfRange { .. })));

        let result = topology.logical_id(SocketId::new(0), CoreId::new(0), ThreadId::new(2));
        assert!(matches!(result, Err(TopologyError::ThreadOutOfRange { .. })));

        let result = topology.coordinates(LogicalProcessorId::new(16));
        assert!(matches!(
            result,
            Err(TopologyError::LogicalProcessorOutOfRange { .. })
        ));
    }

    #[test]
    fn single_threaded_node() {
        let topology = Topology::new(1, 4, 4).unwrap();

        assert!(!topology.has_hyperthreading());
        assert_eq!(
            topology.socket_of(LogicalProcessorId::new(3)).unwrap(),
            SocketId::new(0)
        );
    }
}
