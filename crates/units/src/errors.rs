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

use thiserror::Error as ThisError;

use hwp_shared::types::SocketId;

use crate::UnitScale;

#[derive(ThisError, Debug, Clone, PartialEq)]
pub enum UnitsError {
    #[error("power limit of {watts} W needs {bits} units, the field holds at most {max}")]
    LimitTooLarge { watts: f64, bits: u64, max: u64 },

    #[error("time window of {seconds} s can't be encoded")]
    TimeWindowOutOfRange { seconds: f64 },

    #[error("{quantity} must be a finite non-negative number, got {value}")]
    InvalidQuantity { quantity: &'static str, value: f64 },

    #[error("socket {socket} reports unit scale {actual:?}, socket 0 reports {expected:?}")]
    InconsistentScale {
        socket: SocketId,
        expected: UnitScale,
        actual: UnitScale,
    },

    #[error("no unit scale is known for socket {socket}")]
    MissingScale { socket: SocketId },
}

impl UnitsError {
    pub(crate) fn invalid_quantity(quantity: &'static str, value: f64) -> Self {
        Self::InvalidQuantity { quantity, value }
    }
}
