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

#![warn(rust_2018_idioms)]
#![warn(rust_2021_compatibility)]
#![deny(
    dead_code,
    nonstandard_style,
    unused_imports,
    unused_mut,
    unused_variables,
    unused_unsafe,
    unreachable_patterns
)]

mod counter;
mod errors;
mod limits;
mod scale;
mod table;
mod translate;
mod window;

pub use counter::delta;
pub use counter::rate;
pub use counter::EnergyDomain;
pub use counter::EnergyReading;
pub use counter::EnergySample;
pub use counter::EnergyTracker;
pub use errors::UnitsError;
pub use limits::PackagePowerLimits;
pub use limits::PowerInfo;
pub use limits::PowerLimit;
pub use limits::SECOND_LIMIT_OFFSET;
pub use scale::ScaleSource;
pub use scale::UnitScale;
pub use scale::UnitScaleCache;
pub use table::UnitTable;
pub use translate::*;
pub use window::bits_to_seconds_std;
pub use window::seconds_to_bits_std;
pub use window::window_mantissa;
pub use window::WindowThresholds;

pub type UnitsResult<T> = Result<T, UnitsError>;
