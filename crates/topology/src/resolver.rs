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

use std::collections::HashMap;

use hwp_shared::types::PlatformId;

use crate::Topology;
use crate::TopologyResult;

/// Something able to describe the node shape.
pub trait TopologySource {
    fn detect(&self) -> TopologyResult<Topology>;
}

/// A topology known up front, e.g. taken from configuration.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FixedSource(pub Topology);

impl TopologySource for FixedSource {
    fn detect(&self) -> TopologyResult<Topology> {
        Ok(self.0)
    }
}

/// Resolves a topology once per platform and hands out the cached value
/// afterwards, a topology never changes for the lifetime of the process.
#[derive(Debug)]
pub struct TopologyResolver<S> {
    source: S,
    resolved: HashMap<PlatformId, Topology>,
}

impl<S: TopologySource> TopologyResolver<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            resolved: HashMap::new(),
        }
    }

    pub fn resolve(&mut self, platform: PlatformId) -> TopologyResult<Topology> {
        if let Some(topology) = self.resolved.get(&platform) {
            return Ok(*topology);
        }

        let topology = self.source.detect()?;
        tracing::info!(
            "{platform} topology: {} sockets, {} cores, {} threads",
            topology.sockets(),
            topology.total_cores(),
            topology.total_threads()
        );
        self.resolved.insert(platform, topology);

        Ok(topology)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::TopologyError;

    struct CountingSource {
        topology: (u32, u32, u32),
        calls: Cell<usize>,
    }

    impl TopologySource for CountingSource {
        fn detect(&self) -> TopologyResult<Topology> {
            self.calls.set(self.calls.get() + 1);
            let (sockets, cores, threads) = self.topology;
            Topology::new(sockets, cores, threads)
        }
    }

    #[test]
    fn resolve_detects_once_per_platform() {
        let source = CountingSource {
            topology: (2, 8, 16),
            calls: Cell::new(0),
        };
        let mut resolver = TopologyResolver::new(source);

        let first = resolver.resolve(PlatformId::IntelCpu).unwrap();
        let second = resolver.resolve(PlatformId::IntelCpu).unwrap();

        assert_eq!(first, second);
        assert_eq!(resolver.source.calls.get(), 1);

        resolver.resolve(PlatformId::IbmCpu).unwrap();
        assert_eq!(resolver.source.calls.get(), 2);
    }

    #[test]
    fn fixed_source_hands_out_its_topology() {
        let topology = Topology::new(1, 4, 8).unwrap();
        let mut resolver = TopologyResolver::new(FixedSource(topology));

        assert_eq!(resolver.resolve(PlatformId::AmdCpu).unwrap(), topology);
    }

    #[test]
    fn failed_detection_is_not_cached() {
        let source = CountingSource {
            topology: (0, 8, 16),
            calls: Cell::new(0),
        };
        let mut resolver = TopologyResolver::new(source);

        let result = resolver.resolve(PlatformId::IntelCpu);
        assert!(matches!(result, Err(TopologyError::ZeroSockets)));

        let result = resolver.resolve(PlatformId::IntelCpu);
        assert!(result.is_err());
        assert_eq!(resolver.source.calls.get(), 2);
    }
}
