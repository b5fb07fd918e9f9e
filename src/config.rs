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

use std::env::var;
use std::path::PathBuf;

use serde::Deserialize;

use crate::error::PeerdexResult;

/// Client-side knobs. The directory address itself is mandatory CLI input;
/// everything here is optional and defaults sensibly, so a missing file is
/// not an error.
#[derive(Deserialize, Debug, Default)]
pub struct Config {
    #[serde(default)]
    pub time_service: TimeService,

    #[serde(default)]
    pub transfer: Transfer,
}

#[derive(Deserialize, Debug, Default)]
pub struct TimeService {
    /// HTTP endpoint of the time-stamp service. Absent means the local
    /// clock stands in.
    pub endpoint: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct Transfer {
    /// Where multi-seeder downloads park their segment files. Absent means
    /// next to the output file.
    pub segment_dir: Option<PathBuf>,
}

impl Config {
    /// Load from `$PEERDEX_CONFIG`, falling back to `peerdex.toml` in the
    /// working directory, falling back to defaults.
    pub fn load() -> PeerdexResult<Self> {
        let loc = var("PEERDEX_CONFIG").unwrap_or_else(|_| "peerdex.toml".into());

        match std::fs::read(&loc) {
            Ok(raw) => Ok(toml::from_slice(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Config::default()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_config() {
        let raw = br#"
            [time_service]
            endpoint = "http://127.0.0.1:8000/now"

            [transfer]
            segment_dir = "/tmp"
        "#;

        let cfg: Config = toml::from_slice(raw).unwrap();

        assert_eq!(
            cfg.time_service.endpoint.as_deref(),
            Some("http://127.0.0.1:8000/now")
        );
        assert_eq!(cfg.transfer.segment_dir, Some(PathBuf::from("/tmp")));
    }

    #[test]
    fn empty_config_defaults() {
        let cfg: Config = toml::from_slice(b"").unwrap();

        assert!(cfg.time_service.endpoint.is_none());
        assert!(cfg.transfer.segment_dir.is_none());
    }
}
