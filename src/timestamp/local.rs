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

use chrono::Local;

use crate::error::PeerdexResult;

use super::TimeSource;

/// System-clock fallback, formatted the way the remote service formats its
/// answers.
pub struct LocalClock;

#[async_trait]
impl TimeSource for LocalClock {
    async fn now(&self) -> PeerdexResult<String> {
        Ok(Local::now().format("%d/%m/%Y %H:%M:%S").to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn formats_a_plausible_stamp() {
        let stamp = LocalClock.now().await.unwrap();

        // dd/mm/yyyy hh:mm:ss
        assert_eq!(stamp.len(), 19);
        assert_eq!(&stamp[2..3], "/");
        assert_eq!(&stamp[5..6], "/");
        assert_eq!(&stamp[10..11], " ");
    }
}
