// peerdex - Peer-to-peer file sharing with a centralized directory over a minimal binary protocol
// Copyright (C) 2025  peerdex developers
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use async_trait::async_trait;

use reqwest::Client;

use crate::error::PeerdexResult;

use super::TimeSource;

/// Time-stamp service reached over HTTP.
///
/// The response body is the timestamp; it is trimmed and otherwise passed
/// through untouched.
pub struct RemoteClock {
    endpoint: String,
}

impl RemoteClock {
    pub fn new(endpoint: String) -> Self {
        Self { endpoint }
    }
}

#[async_trait]
impl TimeSource for RemoteClock {
    async fn now(&self) -> PeerdexResult<String> {
        let body = Client::new().get(&self.endpoint).send().await?.text().await?;

        Ok(body.trim().to_string())
    }
}
