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

mod blob;
mod cursor;
mod errors;
mod fixed_point;
mod layout;
mod reader;
mod views;

pub use blob::Sensor;
pub use blob::SensorBlob;
pub use blob::SensorReading;
pub use cursor::BeCursor;
pub use errors::OccError;
pub use fixed_point::fixed_point;
pub use layout::*;
pub use reader::SensorBlobReader;
pub use reader::DEFAULT_BLOCK_SIZE;
pub use reader::DEFAULT_SENSORS_PATH;
pub use views::FrequencyView;
pub use views::PowerView;
pub use views::SensorValue;
pub use views::ThermalView;

pub type OccResult<T> = Result<T, OccError>;
