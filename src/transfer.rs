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

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use futures::future::try_join_all;

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::{PeerdexError, PeerdexResult};
use crate::protocol::{FileRequest, PeerStatus, RangeRequest, SeederEntry};

/// Fetch a whole file from one peer.
///
/// Returns the peer's status byte; the local file is written only on `0`.
pub async fn download_file(
    addr: SocketAddr,
    remote_path: &str,
    local: &Path,
) -> PeerdexResult<u8> {
    let mut stream = TcpStream::connect(addr).await?;

    stream
        .write_all(&FileRequest { path: remote_path }.to_bytes())
        .await?;

    let status = stream.read_u8().await?;

    if status != PeerStatus::Ok as u8 {
        return Ok(status);
    }

    let mut file = File::create(local).await?;

    tokio::io::copy(&mut stream, &mut file).await?;
    file.flush().await?;

    debug!("Downloaded file (addr = {}) (path = {})", addr, remote_path);

    Ok(status)
}

/// Fetch one seeder's byte range into a segment file.
async fn download_range(
    addr: SocketAddr,
    remote_path: String,
    seeder_id: usize,
    total_seeders: usize,
    segment: PathBuf,
) -> PeerdexResult<()> {
    let mut stream = TcpStream::connect(addr).await?;

    stream
        .write_all(
            &RangeRequest {
                path: &remote_path,
                seeder_id,
                total_seeders,
            }
            .to_bytes(),
        )
        .await?;

    let status = stream.read_u8().await?;

    if status != PeerStatus::Ok as u8 {
        return Err(PeerdexError::UnexpectedStatus(status));
    }

    let mut file = File::create(&segment).await?;

    tokio::io::copy(&mut stream, &mut file).await?;
    file.flush().await?;

    debug!(
        "Downloaded segment (addr = {}) (seeder = {}/{})",
        addr, seeder_id, total_seeders
    );

    Ok(())
}

/// Multi-seeder download coordinator.
///
/// Spawns one range download per seeder, joins them all, then concatenates
/// the segments in seeder order into `local` and removes them. Any failed
/// task fails the whole operation; there is no retry and no partial
/// delivery.
pub async fn fetch_multi(
    seeders: Vec<SeederEntry>,
    local: &Path,
    segment_dir: Option<&Path>,
) -> PeerdexResult<()> {
    let total = seeders.len();

    let tasks: Vec<_> = seeders
        .into_iter()
        .enumerate()
        .map(|(i, s)| {
            let segment = segment_path(local, segment_dir, i);

            tokio::spawn(download_range(
                SocketAddr::new(s.ip, s.port),
                s.path,
                i,
                total,
                segment,
            ))
        })
        .collect();

    for result in try_join_all(tasks).await? {
        result?;
    }

    let mut out = File::create(local).await?;

    for i in 0..total {
        let segment = segment_path(local, segment_dir, i);

        let mut file = match File::open(&segment).await {
            Ok(f) => f,
            Err(_) => return Err(PeerdexError::MissingSegment(i)),
        };

        tokio::io::copy(&mut file, &mut out).await?;
        tokio::fs::remove_file(&segment).await?;
    }

    out.flush().await?;

    info!("Reassembled {} segments into {}", total, local.display());

    Ok(())
}

fn segment_path(local: &Path, segment_dir: Option<&Path>, seeder_id: usize) -> PathBuf {
    let name = format!(
        "{}.part{}",
        local
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("download"),
        seeder_id
    );

    match segment_dir {
        Some(dir) => dir.join(name),
        None => local.with_file_name(name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_beside_output_by_default() {
        assert_eq!(
            segment_path(Path::new("/tmp/out"), None, 1),
            PathBuf::from("/tmp/out.part1")
        );
    }

    #[test]
    fn segment_in_configured_dir() {
        assert_eq!(
            segment_path(Path::new("/home/u/out"), Some(Path::new("/var/cache")), 0),
            PathBuf::from("/var/cache/out.part0")
        );
    }
}
