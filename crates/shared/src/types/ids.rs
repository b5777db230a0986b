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

use newtype_derive::newtype_fmt;
use serde::Deserialize;
use serde::Serialize;

pub type IdType = u32;

/// Index into the flat `0..total_threads` space of logical processors.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct LogicalProcessorId(IdType);

/// A processor package.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct SocketId(IdType);

/// A physical core index within its socket.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct CoreId(IdType);

/// A hardware thread index within its core.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct ThreadId(IdType);

/// An architecture specific register offset, opaque to the register engine.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct RegisterAddress(u32);

newtype_derive::NewtypeFrom! { () pub struct LogicalProcessorId(IdType); }
newtype_derive::NewtypeDisplay! { () pub struct LogicalProcessorId(IdType); }

newtype_derive::NewtypeFrom! { () pub struct SocketId(IdType); }
newtype_derive::NewtypeDisplay! { () pub struct SocketId(IdType); }

newtype_derive::NewtypeFrom! { () pub struct CoreId(IdType); }
newtype_derive::NewtypeDisplay! { () pub struct CoreId(IdType); }

newtype_derive::NewtypeFrom! { () pub struct ThreadId(IdType); }
newtype_derive::NewtypeDisplay! { () pub struct ThreadId(IdType); }

newtype_derive::NewtypeFrom! { () pub struct RegisterAddress(u32); }

impl std::fmt::Display for RegisterAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#X}", self.0)
    }
}

impl LogicalProcessorId {
    pub const fn new(id: IdType) -> Self {
        Self(id)
    }

    pub const fn get(self) -> IdType {
        self.0
    }
}

impl SocketId {
    pub const fn new(id: IdType) -> Self {
        Self(id)
    }

    pub const fn get(self) -> IdType {
        self.0
    }
}

impl CoreId {
    pub const fn new(id: IdType) -> Self {
        Self(id)
    }

    pub const fn get(self) -> IdType {
        self.0
    }
}

impl ThreadId {
    pub const fn new(id: IdType) -> Self {
        Self(id)
    }

    pub const fn get(self) -> IdType {
        self.0
    }
}

impl RegisterAddress {
    pub const fn new(address: u32) -> Self {
        Self(address)
    }

    pub const fn get(self) -> u32 {
        self.0
    }
}

impl From<LogicalProcessorId> for usize {
    fn from(value: LogicalProcessorId) -> usize {
        value.0 as usize
    }
}

impl From<SocketId> for usize {
    fn from(value: SocketId) -> usize {
        value.0 as usize
    }
}

impl From<CoreId> for usize {
    fn from(value: CoreId) -> usize {
        value.0 as usize
    }
}

impl From<ThreadId> for usize {
    fn from(value: ThreadId) -> usize {
        value.0 as usize
    }
}
