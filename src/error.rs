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

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PeerdexError {
    #[error("IO error {0}")]
    IoError(#[from] std::io::Error),

    #[error("Reqwest error {0}")]
    ReqwestError(#[from] reqwest::Error),

    #[error("Config error {0}")]
    ConfigError(#[from] toml::de::Error),

    #[error("Malformed payload")]
    MalformedPayload,

    #[error("Unknown verb {0}")]
    UnknownVerb(String),

    #[error("Unexpected status byte {0}")]
    UnexpectedStatus(u8),

    #[error("Invalid UTF-8 in wire string")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    #[error("Missing download segment {0}")]
    MissingSegment(usize),

    #[error("Download task panicked {0}")]
    JoinError(#[from] tokio::task::JoinError),
}

pub type PeerdexResult<T> = std::result::Result<T, PeerdexError>;
