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

use nix::errno::Errno;

use hwp_shared::types::CoreId;
use hwp_shared::types::LogicalProcessorId;
use hwp_shared::types::RegisterAddress;
use hwp_shared::types::SocketId;
use hwp_shared::types::ThreadId;
use hwp_topology::Topology;

use super::BatchEngine;
use crate::BatchKind;
use crate::MSRError;
use crate::MemoryDevice;
use crate::RegisterWrite;

const PKG_ENERGY: RegisterAddress = RegisterAddress::new(0x611);
const DRAM_ENERGY: RegisterAddress = RegisterAddress::new(0x619);
const PERF_CTL: RegisterAddress = RegisterAddress::new(0x199);

fn lp(id: u32) -> LogicalProcessorId {
    LogicalProcessorId::new(id)
}

// 2 sockets, 2 cores per socket, 2 threads per core: leaders are 0 and 2.
fn topology() -> Topology {
    Topology::new(2, 4, 8).unwrap()
}

fn engine_with(device: &MemoryDevice) -> BatchEngine {
    BatchEngine::new(Box::new(device.clone()), topology())
}

fn energy_device() -> MemoryDevice {
    let device = MemoryDevice::new();
    device.set(lp(0), PKG_ENERGY, 1000);
    device.set(lp(2), PKG_ENERGY, 2000);
    device.set(lp(0), DRAM_ENERGY, 300);
    device.set(lp(2), DRAM_ENERGY, 400);
    device
}

#[test]
fn allocate_is_once_per_kind() {
    let device = MemoryDevice::new();
    let mut engine = engine_with(&device);

    engine.allocate(BatchKind::RaplData, 4).unwrap();
    let result = engine.allocate(BatchKind::RaplData, 8);

    assert!(matches!(
        result,
        Err(MSRError::BatchAlreadyAllocated {
            kind: BatchKind::RaplData
        })
    ));
    assert!(engine.is_allocated(BatchKind::RaplData));
    assert!(!engine.is_allocated(BatchKind::ClocksData));
}

#[test]
fn released_batch_can_be_allocated_again() {
    let device = energy_device();
    let mut engine = engine_with(&device);

    engine.allocate(BatchKind::RaplData, 1).unwrap();
    engine.load(BatchKind::RaplData, PKG_ENERGY, &[lp(0)]).unwrap();

    assert!(engine.release(BatchKind::RaplData));
    assert!(!engine.is_allocated(BatchKind::RaplData));
    assert!(!engine.release(BatchKind::RaplData));

    engine.allocate(BatchKind::RaplData, 2).unwrap();
    assert!(engine.slots(BatchKind::RaplData).unwrap().is_empty());
}

#[test]
fn full_batch_populates_every_slot_and_rejects_overflow() {
    let _ = env_logger::builder().is_test(true).try_init();

    let device = energy_device();
    let mut engine = engine_with(&device);

    engine.allocate(BatchKind::RaplData, 4).unwrap();
    let pkg = engine
        .load_socket_leaders(BatchKind::RaplData, PKG_ENERGY)
        .unwrap();
    let dram = engine
        .load_socket_leaders(BatchKind::RaplData, DRAM_ENERGY)
        .unwrap();

    let report = engine.read(BatchKind::RaplData).unwrap();
    assert!(report.is_clean());
    assert!(!report.compatibility_mode);

    let values = pkg
        .iter()
        .chain(dram.iter())
        .map(|slot| engine.value(*slot).unwrap())
        .collect::<Vec<_>>();
    assert_eq!(values, vec![1000, 2000, 300, 400]);

    let result = engine.load(BatchKind::RaplData, PKG_ENERGY, &[lp(1)]);
    assert!(matches!(
        result,
        Err(MSRError::BatchFull {
            capacity: 4,
            requested: 5,
            ..
        })
    ));

    // the rejected load left the batch as it was
    device.set(lp(0), PKG_ENERGY, 1100);
    engine.read(BatchKind::RaplData).unwrap();
    assert_eq!(engine.value(pkg[0]).unwrap(), 1100);
    assert_eq!(engine.value(dram[1]).unwrap(), 400);
    assert_eq!(device.submissions(), 2);
    assert_eq!(device.accesses(), 8);
}

#[test]
fn load_that_overflows_appends_nothing() {
    let device = energy_device();
    let mut engine = engine_with(&device);

    engine.allocate(BatchKind::ClocksData, 3).unwrap();
    engine
        .load(BatchKind::ClocksData, PKG_ENERGY, &[lp(0)])
        .unwrap();

    let result = engine.load_socket_leaders(BatchKind::ClocksData, PKG_ENERGY);
    assert!(result.is_ok());
    let result = engine.load(BatchKind::ClocksData, PKG_ENERGY, &[lp(0), lp(2)]);
    assert!(matches!(result, Err(MSRError::BatchFull { .. })));

    engine.read(BatchKind::ClocksData).unwrap();
    assert_eq!(device.accesses(), 3);
}

#[test]
fn load_rejects_unknown_processor() {
    let device = energy_device();
    let mut engine = engine_with(&device);

    engine.allocate(BatchKind::RaplData, 2).unwrap();
    let result = engine.load(BatchKind::RaplData, PKG_ENERGY, &[lp(0), lp(8)]);
    assert!(matches!(result, Err(MSRError::Topology(_))));

    let result = engine.read(BatchKind::RaplData);
    assert!(matches!(result, Err(MSRError::EmptyBatch { .. })));
}

#[test]
fn unallocated_batch_is_an_error() {
    let device = energy_device();
    let mut engine = engine_with(&device);

    let result = engine.load(BatchKind::ThermStatus, PKG_ENERGY, &[lp(0)]);
    assert!(matches!(result, Err(MSRError::BatchNotAllocated { .. })));

    let result = engine.read(BatchKind::ThermStatus);
    assert!(matches!(result, Err(MSRError::BatchNotAllocated { .. })));
}

#[test]
fn compatibility_mode_gives_same_results() {
    let device = MemoryDevice::without_batch();
    device.set(lp(0), PKG_ENERGY, 1000);
    device.set(lp(2), PKG_ENERGY, 2000);
    let mut engine = engine_with(&device);

    engine.allocate(BatchKind::RaplData, 2).unwrap();
    let slots = engine
        .load_socket_leaders(BatchKind::RaplData, PKG_ENERGY)
        .unwrap();

    let report = engine.read(BatchKind::RaplData).unwrap();
    assert!(report.compatibility_mode);
    assert!(report.is_clean());
    assert_eq!(engine.value(slots[0]).unwrap(), 1000);
    assert_eq!(engine.value(slots[1]).unwrap(), 2000);
    assert_eq!(device.submissions(), 0);

    engine.read(BatchKind::RaplData).unwrap();
    assert_eq!(device.accesses(), 4);
}

#[test]
fn failing_operation_is_isolated() {
    for device in [MemoryDevice::new(), MemoryDevice::without_batch()] {
        device.set(lp(0), PKG_ENERGY, 1000);
        device.set(lp(2), PKG_ENERGY, 2000);
        device.inject_fault(lp(2), PKG_ENERGY);
        let mut engine = engine_with(&device);

        engine.allocate(BatchKind::RaplData, 2).unwrap();
        let slots = engine
            .load_socket_leaders(BatchKind::RaplData, PKG_ENERGY)
            .unwrap();

        let report = engine.read(BatchKind::RaplData).unwrap();
        assert_eq!(report.failures.len(), 1);

        let failure = report.failure_for(slots[1]).unwrap();
        assert_eq!(failure.processor, lp(2));
        assert_eq!(failure.register, PKG_ENERGY);
        assert_eq!(failure.errno, Errno::EIO);

        assert!(report.failure_for(slots[0]).is_none());
        assert_eq!(engine.value(slots[0]).unwrap(), 1000);
    }
}

#[test]
fn same_batch_reads_then_writes() {
    for device in [MemoryDevice::new(), MemoryDevice::without_batch()] {
        for id in 0..8 {
            device.set(lp(id), PERF_CTL, 0xFFFF_0000_0000_1000);
        }
        let mut engine = engine_with(&device);

        engine.allocate(BatchKind::PerfCtrl, 8).unwrap();
        let slots = engine
            .load_all_threads(BatchKind::PerfCtrl, PERF_CTL)
            .unwrap();
        engine.read(BatchKind::PerfCtrl).unwrap();

        for slot in slots.iter() {
            let value = engine.value(*slot).unwrap();
            engine.set_value(*slot, (value & !0xFFFF) | 0x1800).unwrap();
        }
        let report = engine.write(BatchKind::PerfCtrl).unwrap();
        assert!(report.is_clean());

        for id in 0..8 {
            assert_eq!(device.get(lp(id), PERF_CTL), Some(0xFFFF_0000_0000_1800));
        }

        // back to reads without reloading
        device.set(lp(5), PERF_CTL, 0x2000);
        engine.read(BatchKind::PerfCtrl).unwrap();
        assert_eq!(engine.value(slots[5]).unwrap(), 0x2000);
    }
}

#[test]
fn masked_batch_write_keeps_other_bits() {
    for device in [MemoryDevice::new(), MemoryDevice::without_batch()] {
        device.set(lp(0), PERF_CTL, 0xAAAA_0000_0000_0000);
        let mut engine = engine_with(&device);

        engine.allocate(BatchKind::PerfCtrl, 1).unwrap();
        let slots = engine.load(BatchKind::PerfCtrl, PERF_CTL, &[lp(0)]).unwrap();
        engine.set_value(slots[0], 0x1234).unwrap();
        engine.set_write_mask(slots[0], 0xFFFF).unwrap();
        engine.write(BatchKind::PerfCtrl).unwrap();

        assert_eq!(device.get(lp(0), PERF_CTL), Some(0xAAAA_0000_0000_1234));
    }
}

#[test]
fn single_register_access_by_coordinates() {
    let device = energy_device();
    let mut engine = engine_with(&device);

    let value = engine
        .read_by_coord(SocketId::new(1), CoreId::new(0), ThreadId::new(0), PKG_ENERGY)
        .unwrap();
    assert_eq!(value, 2000);

    let item = RegisterWrite::with_mask(PKG_ENERGY, 0x5, 0xF);
    engine
        .write_by_coord(SocketId::new(1), CoreId::new(0), ThreadId::new(0), item)
        .unwrap();
    assert_eq!(device.get(lp(2), PKG_ENERGY), Some((2000 & !0xF) | 0x5));

    let result = engine.read_by_coord(
        SocketId::new(2),
        CoreId::new(0),
        ThreadId::new(0),
        PKG_ENERGY,
    );
    assert!(matches!(result, Err(MSRError::Topology(_))));
}

#[test]
fn unknown_slot_is_reported() {
    let device = energy_device();
    let mut engine = engine_with(&device);
    let mut other = engine_with(&device);

    engine.allocate(BatchKind::RaplData, 1).unwrap();
    other.allocate(BatchKind::RaplData, 2).unwrap();
    let slots = other
        .load_socket_leaders(BatchKind::RaplData, PKG_ENERGY)
        .unwrap();

    let result = engine.value(slots[1]);
    assert!(matches!(result, Err(MSRError::UnknownSlot { index: 1, .. })));
}

#[test]
fn slots_follow_load_order() {
    let device = energy_device();
    let mut engine = engine_with(&device);

    engine.allocate(BatchKind::RaplData, 4).unwrap();
    let pkg = engine
        .load_socket_leaders(BatchKind::RaplData, PKG_ENERGY)
        .unwrap();
    let dram = engine
        .load_socket_leaders(BatchKind::RaplData, DRAM_ENERGY)
        .unwrap();

    let slots = engine.slots(BatchKind::RaplData).unwrap();
    assert_eq!(slots, [pkg, dram].concat());
    assert!(engine.slots(BatchKind::PerfCtrl).is_err());
}
