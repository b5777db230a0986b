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

use hwlocality::object::types::ObjectType;

use crate::resolver::TopologySource;
use crate::Topology;
use crate::TopologyResult;

/// Detects the node shape through hwloc by counting packages, cores and
/// processing units.
#[derive(Copy, Clone, Debug, Default)]
pub struct HwlocSource;

impl TopologySource for HwlocSource {
    fn detect(&self) -> TopologyResult<Topology> {
        let topology = hwlocality::Topology::new()?;

        let sockets = count_objects(&topology, ObjectType::Package);
        let total_cores = count_objects(&topology, ObjectType::Core);
        let total_threads = count_objects(&topology, ObjectType::PU);
        tracing::debug!(
            "hwloc reported {sockets} packages, {total_cores} cores, {total_threads} PUs"
        );

        Topology::new(sockets, total_cores, total_threads)
    }
}

fn count_objects(topology: &hwlocality::Topology, object_type: ObjectType) -> u32 {
    topology.objects_with_type(object_type).count() as u32
}
