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

mod amd;
mod batches;
mod engine;
mod errors;
mod ibm;
mod intel;
mod platform;
mod rapl;
mod samples;
mod verbose;
pub mod vendor;

pub use engine::Engine;
pub use engine::SharedEngine;
pub use errors::ErrorKind;
pub use errors::HwPowerError;
pub use ibm::Opal;
pub use platform::Architecture;
pub use platform::Capabilities;
pub use platform::Capability;
pub use platform::Platform;
pub use samples::*;
pub use verbose::VERBOSE_ENV;

pub type HwPowerResult<T> = Result<T, HwPowerError>;
