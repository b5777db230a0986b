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
use std::hash::Hash;
use std::time::Instant;

use serde::Serialize;

use crate::bits_to_joules;
use crate::UnitScale;

/// Accounting domain of an energy counter.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EnergyDomain {
    Package,
    Dram,
    Core,
    Platform,
}

/// Raw counter increase between two reads of a counter that wraps after
/// `max_raw`.
pub fn delta(prev_raw: u64, now_raw: u64, max_raw: u64) -> u64 {
    if now_raw >= prev_raw {
        return now_raw - prev_raw;
    }

    max_raw
        .wrapping_sub(prev_raw)
        .wrapping_add(now_raw)
        .wrapping_add(1)
}

/// Average power over `elapsed_seconds`, zero when no time has passed.
pub fn rate(delta_joules: f64, elapsed_seconds: f64) -> f64 {
    if !elapsed_seconds.is_finite() || elapsed_seconds <= 0.0 {
        return 0.0;
    }
    delta_joules / elapsed_seconds
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct EnergySample {
    pub raw_bits: u64,
    pub joules: f64,
    pub timestamp: Instant,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct EnergyReading {
    /// Counter value converted to joules.
    pub joules: f64,
    pub delta_joules: f64,
    pub watts: f64,
    pub elapsed_seconds: f64,
}

/// Keeps the previous sample of every counter so that each update yields
/// the energy and average power since the last one.
#[derive(Clone, Debug)]
pub struct EnergyTracker<K> {
    previous: HashMap<K, EnergySample>,
}

impl<K: Copy + Eq + Hash> EnergyTracker<K> {
    pub fn new() -> Self {
        Self {
            previous: HashMap::new(),
        }
    }

    pub fn previous(&self, key: K) -> Option<&EnergySample> {
        self.previous.get(&key)
    }

    /// The first update of a key only sets the baseline and reports 0 W.
    pub fn update(
        &mut self,
        key: K,
        raw_bits: u64,
        max_raw: u64,
        scale: &UnitScale,
        now: Instant,
    ) -> EnergyReading {
        let sample = EnergySample {
            raw_bits,
            joules: bits_to_joules(raw_bits, scale),
            timestamp: now,
        };

        match self.previous.insert(key, sample) {
            None => EnergyReading {
                joules: sample.joules,
                delta_joules: 0.0,
                watts: 0.0,
                elapsed_seconds: 0.0,
            },
            Some(previous) => {
                let delta_raw = delta(previous.raw_bits, raw_bits, max_raw);
                let delta_joules = bits_to_joules(delta_raw, scale);
                let elapsed_seconds = now
                    .saturating_duration_since(previous.timestamp)
                    .as_secs_f64();

                EnergyReading {
                    joules: sample.joules,
                    delta_joules,
                    watts: rate(delta_joules, elapsed_seconds),
                    elapsed_seconds,
                }
            }
        }
    }
}

impl<K: Copy + Eq + Hash> Default for EnergyTracker<K> {
    fn default() -> Self {
        Self::new()
    }
}
