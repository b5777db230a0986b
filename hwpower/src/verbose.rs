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

use once_cell::sync::Lazy;

use crate::Capability;
use crate::Platform;

pub const VERBOSE_ENV: &str = "HWPOWER_LOG";

static VERBOSE_FROM_ENV: Lazy<bool> = Lazy::new(|| is_enabled(std::env::var(VERBOSE_ENV).ok()));

fn is_enabled(value: Option<String>) -> bool {
    value.as_deref().map(str::trim) == Some("1")
}

/// Logs the entry of every dispatched operation when enabled by
/// configuration or by `HWPOWER_LOG=1`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct EntryLog {
    enabled: bool,
}

impl EntryLog {
    pub(crate) fn new(configured: bool) -> Self {
        Self {
            enabled: configured || *VERBOSE_FROM_ENV,
        }
    }

    pub(crate) fn enter(&self, capability: Capability, platform: Platform) {
        if self.enabled {
            log::info!("entering {capability} on {platform}");
        }
    }
}
