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

use hwp_topology::Topology;

/// 1 socket, 4 cores, no hyperthreading.
pub fn single_socket() -> Topology {
    Topology::new(1, 4, 4).unwrap()
}

/// 2 sockets, 2 cores per socket, 2 threads per core.
pub fn two_sockets() -> Topology {
    Topology::new(2, 4, 8).unwrap()
}

/// 2 sockets, 22 cores per socket, 4 threads per core, a POWER9 node.
pub fn power9_node() -> Topology {
    Topology::new(2, 44, 176).unwrap()
}
