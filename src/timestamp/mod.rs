// peerdex - Peer-to-peer file sharing with a centralized directory over a minimal binary protocol
// Copyright (C) 2025  peerdex developers

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use async_trait::async_trait;

use crate::config::TimeService;
use crate::error::PeerdexResult;

mod local;
mod remote;

pub use local::LocalClock;
pub use remote::RemoteClock;

/// Producer of the opaque timestamp string prepended to every directory
/// request.
///
/// The directory forwards nothing of it into its state machine; whatever
/// this returns travels the wire verbatim.
#[async_trait]
pub trait TimeSource: Send + Sync {
    async fn now(&self) -> PeerdexResult<String>;
}

/// Pick the provider the config asks for: the remote service when an
/// endpoint is configured, the local clock otherwise.
pub fn from_config(cfg: &TimeService) -> Box<dyn TimeSource> {
    match &cfg.endpoint {
        Some(endpoint) => Box::new(RemoteClock::new(endpoint.clone())),
        None => Box::new(LocalClock),
    }
}
