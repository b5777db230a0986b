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

use std::fs;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use hwp_msr::MemoryDevice;
use hwp_shared::types::SocketId;
use hwp_test_utils::*;
use maplit::btreemap;
use test_log::test;

use super::*;
use crate::ErrorKind;
use crate::Measurement;
use crate::PowerDomain;

const POWER_SENSOR: u16 = 0x80;
const UNIT_SCALE: u32 = 0x100;

fn intel_engine() -> (MemoryDevice, Engine) {
    let topology = two_sockets();
    let device = intel_registers(&topology);
    let engine = Engine::intel(Box::new(device.clone()), topology, 0x55);
    (device, engine)
}

fn ibm_engine(root: &Path) -> Engine {
    let block = SensorBlobBuilder::new()
        .sensor(
            BlobSensor::full("PWRSYS", POWER_SENSOR, 1200, UNIT_SCALE)
                .with_accumulator(48_000)
                .with_freq(0x800),
        )
        .sensor(BlobSensor::full("PWRGPU", POWER_SENSOR, 600, UNIT_SCALE))
        .block_size(0x1000)
        .build();
    let sensors = root.join("occ_inband_sensors");
    let mut file = fs::File::create(&sensors).unwrap();
    file.write_all(&block).unwrap();
    file.write_all(&block).unwrap();

    let powercap = root.join("powercap");
    let psr = root.join("psr");
    fs::create_dir_all(&powercap).unwrap();
    fs::create_dir_all(&psr).unwrap();
    let files = btreemap! {
        powercap.join("powercap-current") => "3050\n",
        powercap.join("powercap-min") => "1000\n",
        powercap.join("powercap-max") => "3050\n",
        psr.join("cpu_to_gpu_0") => "100\n",
        psr.join("cpu_to_gpu_8") => "100\n",
    };
    for (path, content) in files {
        fs::write(path, content).unwrap();
    }

    let reader = SensorBlobReader::open(&sensors, 0x1000).unwrap();
    let opal = Opal::new(powercap, psr, Duration::ZERO);
    Engine::ibm(reader, opal, power9_node())
}

#[test]
fn intel_power_starts_from_a_baseline() {
    let (device, mut engine) = intel_engine();

    let first = engine.get_power().unwrap();
    assert_eq!(first.sockets.len(), 2);
    let package = &first.sockets[1].domains[0];
    assert_eq!(package.domain, PowerDomain::Package);
    assert_eq!(package.watts, Measurement::Value(0.0));
    assert_eq!(package.energy.unwrap().joules, 4.0);

    set_on_sockets(&device, engine.topology(), 0x611, 0x1400);
    let second = engine.get_power().unwrap();
    let energy = second.sockets[0].domains[0].energy.unwrap();
    assert_eq!(energy.delta_joules, 1.0);
}

#[test]
fn intel_limits_and_clock_control() {
    let (device, mut engine) = intel_engine();

    let limits = engine.get_power_limits().unwrap();
    let PowerLimits::Sockets(sockets) = limits.limits else {
        panic!("expected per socket limits");
    };
    let package = sockets[0].package.value().unwrap();
    assert_eq!(package.limit1.watts, 150.0);
    assert_eq!(package.limit2.watts, 180.0);

    let summary = engine.set_core_frequency(2000).unwrap();
    assert!(summary.is_complete());
    assert_eq!(summary.attempted, 8);
    for processor in 0..8 {
        assert_eq!(get_on(&device, processor, 0x199), Some(0x1400));
    }
}

#[test]
fn intel_turbo_round_trip() {
    let (device, mut engine) = intel_engine();

    engine.disable_turbo().unwrap();
    let turbo = engine.get_turbo().unwrap();
    assert!(turbo
        .sockets
        .iter()
        .all(|socket| socket.enabled == Measurement::Value(false)));
    assert_eq!(get_on(&device, 3, 0x1A0), Some(INTEL_MISC_ENABLE | 1 << 38));

    engine.enable_turbo().unwrap();
    assert_eq!(get_on(&device, 3, 0x1A0), Some(INTEL_MISC_ENABLE));
}

#[test]
fn intel_rejects_node_level_operations() {
    let (_, mut engine) = intel_engine();

    let error = engine.set_node_power_limit(500).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Unsupported);

    let error = engine.set_gpu_power_ratio(50).unwrap_err();
    assert!(matches!(
        error,
        HwPowerError::Unsupported {
            capability: Capability::SetGpuPowerRatio,
            platform: Platform::IntelCpu,
        }
    ));
}

#[test]
fn amd_only_reports_power() {
    let topology = single_socket();
    let device = amd_registers(&topology);
    let mut engine = Engine::amd(Box::new(device), topology, 0x19, 0x01);

    let power = engine.get_power().unwrap();
    assert_eq!(power.sockets[0].domains.len(), 5);

    for result in [
        engine.get_thermals().map(drop),
        engine.get_frequencies().map(drop),
        engine.get_power_limits().map(drop),
        engine.set_socket_power_limit(100.0).map(drop),
        engine.get_counters().map(drop),
        engine.enable_turbo().map(drop),
    ] {
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Unsupported);
    }

    let features = engine.features();
    assert_eq!(features.platform, Platform::AmdCpu);
    assert!(features
        .registers
        .iter()
        .any(|entry| entry.address.get() == 0xC001_029B));
}

#[test]
fn ibm_power_and_node_cap() {
    let root = tempfile::tempdir().unwrap();
    let mut engine = ibm_engine(root.path());

    let power = engine.get_power().unwrap();
    assert_eq!(power.sockets.len(), 2);
    assert_eq!(power.sockets[1].socket, SocketId::new(1));
    assert_eq!(power.sockets[1].domains[0].watts, Measurement::Value(1200.0));
    assert_eq!(power.sockets[1].domains[3].domain, PowerDomain::Gpu);
    assert_eq!(power.sockets[1].domains[3].watts, Measurement::Value(600.0));
    assert_eq!(
        power.sockets[0].sensor_energy_joules,
        btreemap! { "PWRSYS".to_string() => 6000.0 }
    );

    engine.set_node_power_limit(2000).unwrap();
    let limits = engine.get_power_limits().unwrap();
    let PowerLimits::Node(cap) = limits.limits else {
        panic!("expected a node cap");
    };
    assert_eq!(cap.current_watts, Measurement::Value(2000));
    assert_eq!(cap.gpu_ratios.len(), 2);

    let error = engine.set_node_power_limit(4000).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Range);

    let error = engine.set_core_frequency(2000).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Unsupported);
}

#[test]
fn ibm_features_list_files() {
    let root = tempfile::tempdir().unwrap();
    let engine = ibm_engine(root.path());

    let features = engine.features();
    assert_eq!(features.platform, Platform::IbmPower9);
    assert!(features.registers.is_empty());
    assert_eq!(features.files[0], root.path().join("occ_inband_sensors"));
    assert!(features
        .files
        .contains(&root.path().join("psr").join("cpu_to_gpu_8")));
}

#[test]
fn shared_engine_serializes_samples() {
    let (_, engine) = intel_engine();
    let shared = engine.into_shared();

    let handles = (0..4)
        .map(|_| {
            let shared = shared.clone();
            std::thread::spawn(move || shared.lock().get_thermals().map(drop))
        })
        .collect::<Vec<_>>();

    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    let thermals = shared.lock().get_thermals().unwrap();
    let Thermals::Cores(sockets) = thermals.thermals else {
        panic!("expected core thermals");
    };
    assert_eq!(sockets[0].tcc_target_celsius, Measurement::Value(100));
    assert_eq!(sockets[0].package_celsius, Measurement::Value(65));
    assert_eq!(sockets[0].threads[0].celsius, Measurement::Value(60));
}
