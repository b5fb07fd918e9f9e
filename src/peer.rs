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

use std::convert::TryFrom;
use std::io::SeekFrom;

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};

use crate::error::PeerdexResult;
use crate::protocol::{read_cstring, write_status, PeerStatus, Verb};

/// Accept poll interval of the peer endpoint.
///
/// Bounds how long shutdown can lag behind the stop signal.
pub const ACCEPT_POLL: Duration = Duration::from_millis(200);

/// The listening endpoint a connected client runs for inbound peer requests.
///
/// Binds an ephemeral port chosen by the OS. The accept loop polls with a
/// short timeout so it observes the shutdown channel between accepts; each
/// accepted connection is served on its own task.
pub struct PeerListener {
    /// Port the OS handed out, advertised to the directory via CONNECT.
    port: u16,

    /// Loop shutdown sender. The loop drains within one poll interval.
    tx_shutdown: watch::Sender<bool>,

    handle: JoinHandle<()>,
}

impl PeerListener {
    pub async fn spawn() -> PeerdexResult<Self> {
        let listener = TcpListener::bind(("0.0.0.0", 0)).await?;
        let port = listener.local_addr()?.port();

        let (tx_shutdown, rx_shutdown) = watch::channel(false);

        info!("Peer endpoint listening (port = {})", port);

        let handle = tokio::spawn(accept_loop(listener, rx_shutdown));

        Ok(Self {
            port,
            tx_shutdown,
            handle,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Cooperative shutdown: signal the loop and wait for it to drain.
    pub async fn stop(self) {
        let _ = self.tx_shutdown.send(true);
        let _ = self.handle.await;
    }
}

async fn accept_loop(listener: TcpListener, rx_shutdown: watch::Receiver<bool>) {
    loop {
        if *rx_shutdown.borrow() {
            break;
        }

        match timeout(ACCEPT_POLL, listener.accept()).await {
            Ok(Ok((stream, addr))) => {
                debug!("Peer has connected (addr = {})", addr);

                tokio::spawn(async move {
                    if let Err(e) = serve(stream).await {
                        warn!("Peer request failed (addr = {}): {}", addr, e);
                    }
                });
            }
            Ok(Err(e)) => {
                debug!("Accept error, stopping peer endpoint: {}", e);
                break;
            }
            // Poll expired with no connection; re-check the shutdown flag.
            Err(_) => continue,
        }
    }

    debug!("Peer endpoint stopped");
}

/// Serve one inbound peer request.
///
/// `GET_FILE` streams the whole file; `GET_MULTIFILE` streams the byte range
/// the partition rule assigns to the requesting seeder slot. Anything else
/// is refused with the generic status.
async fn serve(mut stream: TcpStream) -> PeerdexResult<()> {
    let verb_s = read_cstring(&mut stream).await?;

    let verb = match Verb::try_from(verb_s.as_str()) {
        Ok(v) if v == Verb::GetFile || v == Verb::GetMultifile => v,
        _ => {
            warn!("Refused peer request (verb = {})", verb_s);
            write_status(&mut stream, PeerStatus::Refused as u8).await?;
            return Ok(());
        }
    };

    let path = read_cstring(&mut stream).await?;

    let file_size = match tokio::fs::metadata(&path).await {
        Ok(m) if m.is_file() => m.len(),
        _ => {
            warn!("Requested file not found (path = {})", path);
            write_status(&mut stream, PeerStatus::MissingFile as u8).await?;
            return Ok(());
        }
    };

    match verb {
        Verb::GetFile => {
            write_status(&mut stream, PeerStatus::Ok as u8).await?;

            let mut file = File::open(&path).await?;

            if let Err(e) = tokio::io::copy(&mut file, &mut stream).await {
                // Mid-stream failure; the receiver may discard this byte.
                let _ = write_status(&mut stream, PeerStatus::Refused as u8).await;
                return Err(e.into());
            }

            debug!("Served file (path = {}) (length = {})", path, file_size);
        }
        _ => {
            let seeder_id = read_cstring(&mut stream).await?;
            let total_seeders = read_cstring(&mut stream).await?;

            let (offset, length) =
                match (seeder_id.parse::<u64>(), total_seeders.parse::<u64>()) {
                    (Ok(id), Ok(total)) if total >= 1 && id < total => {
                        segment_range(file_size, id, total)
                    }
                    _ => {
                        warn!(
                            "Refused range request (id = {}) (total = {})",
                            seeder_id, total_seeders
                        );
                        write_status(&mut stream, PeerStatus::Refused as u8).await?;
                        return Ok(());
                    }
                };

            write_status(&mut stream, PeerStatus::Ok as u8).await?;

            let mut file = File::open(&path).await?;
            file.seek(SeekFrom::Start(offset)).await?;
            let mut part = file.take(length);

            if let Err(e) = tokio::io::copy(&mut part, &mut stream).await {
                let _ = write_status(&mut stream, PeerStatus::Refused as u8).await;
                return Err(e.into());
            }

            debug!(
                "Served range (path = {}) (offset = {}) (length = {})",
                path, offset, length
            );
        }
    }

    Ok(())
}

/// Byte range assigned to `seeder_id` of `total_seeders` for a file of
/// `file_size` bytes.
///
/// Every seeder gets `file_size / total_seeders` bytes at the matching
/// offset; the last one also absorbs the division remainder. The ranges of
/// all ids `0..total_seeders` tile the file exactly.
pub fn segment_range(file_size: u64, seeder_id: u64, total_seeders: u64) -> (u64, u64) {
    let part_size = file_size / total_seeders;
    let offset = seeder_id * part_size;

    let length = if seeder_id == total_seeders - 1 {
        file_size - offset
    } else {
        part_size
    };

    (offset, length)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_tile_the_file() {
        let sizes = [0u64, 1, 2, 9, 15, 1024, 10_003, 65_537, 1_000_000];

        for &size in &sizes {
            for total in 1..=16u64 {
                let mut expected_offset = 0;

                for id in 0..total {
                    let (offset, length) = segment_range(size, id, total);

                    assert_eq!(offset, expected_offset, "size {} total {} id {}", size, total, id);
                    expected_offset += length;
                }

                assert_eq!(expected_offset, size, "size {} total {}", size, total);
            }
        }
    }

    #[test]
    fn last_range_absorbs_remainder() {
        assert_eq!(segment_range(10_003, 0, 2), (0, 5001));
        assert_eq!(segment_range(10_003, 1, 2), (5001, 5002));
    }

    #[test]
    fn single_seeder_takes_whole_file() {
        assert_eq!(segment_range(4096, 0, 1), (0, 4096));
    }
}
