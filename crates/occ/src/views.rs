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

use std::collections::BTreeMap;

use serde::Serialize;

use crate::Sensor;
use crate::SensorReading;
use crate::SensorType;

const NODE_POWER: &str = "PWRSYS";
const PROCESSOR_POWER: &str = "PWRPROC";
const MEMORY_POWER: &str = "PWRMEM";
const GPU_POWER: &str = "PWRGPU";

/// Power of one socket's view of the node, in watts.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct PowerView {
    pub node_watts: Option<f64>,
    pub processor_watts: Option<f64>,
    pub memory_watts: Option<f64>,
    pub gpu_watts: Option<f64>,
    /// Accumulated energy of every full power sensor, by sensor name.
    pub energy_joules: BTreeMap<String, f64>,
}

impl PowerView {
    /// Only full records feed the view, counters and unknown names are
    /// skipped.
    pub fn from_sensors(sensors: &[Sensor]) -> Self {
        let mut view = Self::default();

        for sensor in sensors {
            if !matches!(sensor.reading, SensorReading::Full(_)) {
                continue;
            }

            if let Some(joules) = sensor.energy_joules() {
                view.energy_joules
                    .insert(sensor.descriptor.name.clone(), joules);
            }

            let slot = match sensor.descriptor.name.as_str() {
                NODE_POWER => &mut view.node_watts,
                PROCESSOR_POWER => &mut view.processor_watts,
                MEMORY_POWER => &mut view.memory_watts,
                GPU_POWER => &mut view.gpu_watts,
                _ => continue,
            };
            *slot = sensor.value();
        }

        view
    }
}

/// A decoded sensor with its identifying metadata.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SensorValue {
    pub name: String,
    pub units: String,
    pub location: u16,
    pub value: Option<f64>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ThermalView {
    pub sensors: Vec<SensorValue>,
}

impl ThermalView {
    pub fn from_sensors(sensors: &[Sensor]) -> Self {
        Self {
            sensors: values_of_type(sensors, SensorType::Temperature),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct FrequencyView {
    pub sensors: Vec<SensorValue>,
}

impl FrequencyView {
    pub fn from_sensors(sensors: &[Sensor]) -> Self {
        Self {
            sensors: values_of_type(sensors, SensorType::Frequency),
        }
    }
}

fn values_of_type(sensors: &[Sensor], sensor_type: SensorType) -> Vec<SensorValue> {
    sensors
        .iter()
        .filter(|sensor| sensor.descriptor.sensor_type == sensor_type)
        .map(|sensor| SensorValue {
            name: sensor.descriptor.name.clone(),
            units: sensor.descriptor.units.clone(),
            location: sensor.descriptor.location,
            value: sensor.value(),
        })
        .collect()
}
