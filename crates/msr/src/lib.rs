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

//! Model-specific register access for x86_64 Linux: per logical processor
//! `msr`/`msr_safe` device files plus the `msr_batch` transactional ioctl.
//! On every other target opening the device fails and callers are expected
//! to use a different backend.

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

#[cfg(all(target_arch = "x86_64", target_os = "linux"))]
#[path = "linux_x86_64/mod.rs"]
mod msr_impl;
#[cfg(not(all(target_arch = "x86_64", target_os = "linux")))]
#[path = "other/mod.rs"]
mod msr_impl;

mod batch;
mod device;
mod engine;
mod errors;
mod memory_device;
mod register_write;
pub mod wire;

pub use batch::BatchKind;
pub use batch::BatchReport;
pub use batch::BatchSlot;
pub use batch::OperationError;
pub use device::BatchSubmission;
pub use device::RegisterDevice;
pub use engine::BatchEngine;
pub use errors::MSRError;
pub use memory_device::MemoryDevice;
pub use msr_impl::MsrDevice;
pub use msr_impl::MsrDevicePaths;
pub use msr_impl::MsrModule;
pub use register_write::RegisterWrite;

pub type MSRResult<T> = Result<T, MSRError>;
