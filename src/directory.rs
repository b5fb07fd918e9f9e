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
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::{BufMut, BytesMut};

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::select;

use crate::error::{PeerdexError, PeerdexResult};
use crate::protocol::{put_cstr, read_cstring, ConnectStatus, Verb};
use crate::store::Directory;

/// The directory TCP server.
///
/// Each accepted connection carries exactly one request/response exchange
/// and is then closed. Connections are handled on independent tasks; the
/// store's lock is the only serialization point between them.
pub struct DirectoryServer {
    listener: TcpListener,

    /// Shared user/session/publication table.
    store: Arc<Directory>,
}

impl DirectoryServer {
    pub async fn bind<A>(addr: A, store: Arc<Directory>) -> PeerdexResult<Self>
    where
        A: ToSocketAddrs,
    {
        Ok(Self {
            listener: TcpListener::bind(addr).await?,
            store,
        })
    }

    /// Address the listener actually bound, for callers that bound port 0.
    pub fn local_addr(&self) -> PeerdexResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept loop. Runs until ctrl-c.
    pub async fn up(&mut self) -> PeerdexResult<()> {
        info!("Started processing connections");

        loop {
            select! {
                _ = tokio::signal::ctrl_c() => {
                    // Exit to main
                    return Ok(());
                }
                res = self.listener.accept() => {
                    let (stream, addr) = res?;

                    debug!("Client has connected (addr = {})", addr);

                    let store = self.store.clone();

                    tokio::spawn(async move {
                        if let Err(e) = handle_exchange(stream, addr, store).await {
                            debug!("Exchange aborted (addr = {}): {}", addr, e);
                        }
                    });
                }
            }
        }
    }
}

/// Run one request/response exchange.
///
/// The request body is read into locals first, the store performs the
/// in-memory transition, and only then is the response written, so the
/// table's critical section never waits on this socket. Read failures close
/// the connection without a reply.
async fn handle_exchange(
    mut stream: TcpStream,
    addr: SocketAddr,
    store: Arc<Directory>,
) -> PeerdexResult<()> {
    let verb = Verb::try_from(read_cstring(&mut stream).await?.as_str())?;

    // Opaque timestamp, read and discarded without interpretation.
    let _ts = read_cstring(&mut stream).await?;

    let user = read_cstring(&mut stream).await?;

    debug!("Received request (verb = {}) (user = {}) (addr = {})", verb, user, addr);

    let response = match verb {
        Verb::Register => single(store.register(&user).await as u8),
        Verb::Unregister => single(store.unregister(&user).await as u8),
        Verb::Connect => {
            let port = read_cstring(&mut stream).await?;

            match port.parse::<u16>() {
                Ok(port) => single(store.connect(&user, addr.ip(), port).await as u8),
                Err(_) => {
                    warn!("Unparseable listen port (user = {}) (port = {})", user, port);

                    single(ConnectStatus::Internal as u8)
                }
            }
        }
        Verb::Disconnect => single(store.disconnect(&user).await as u8),
        Verb::Publish => {
            let path = read_cstring(&mut stream).await?;
            let description = read_cstring(&mut stream).await?;

            single(store.publish(&user, &path, &description).await as u8)
        }
        Verb::Delete => {
            let path = read_cstring(&mut stream).await?;

            single(store.delete(&user, &path).await as u8)
        }
        Verb::ListUsers => match store.list_users(&user).await {
            Ok(users) => {
                let mut buf = BytesMut::new();

                buf.put_u8(0);
                put_cstr(&mut buf, &users.len().to_string());

                for u in &users {
                    put_cstr(&mut buf, &u.name);
                    put_cstr(&mut buf, &u.ip.to_string());
                    put_cstr(&mut buf, &u.port.to_string());
                }

                buf
            }
            Err(status) => single(status as u8),
        },
        Verb::ListContent => {
            let target = read_cstring(&mut stream).await?;

            match store.list_content(&user, &target).await {
                Ok(paths) => {
                    let mut buf = BytesMut::new();

                    buf.put_u8(0);
                    put_cstr(&mut buf, &paths.len().to_string());

                    for path in &paths {
                        put_cstr(&mut buf, path);
                    }

                    buf
                }
                Err(status) => single(status as u8),
            }
        }
        Verb::GetMultifile => {
            let path = read_cstring(&mut stream).await?;

            match store.seeders(&path).await {
                Ok(seeders) => {
                    let mut buf = BytesMut::new();

                    buf.put_u8(0);
                    buf.put_u8(seeders.len() as u8);

                    for s in &seeders {
                        put_cstr(&mut buf, &s.ip.to_string());
                        put_cstr(&mut buf, &s.port.to_string());
                        put_cstr(&mut buf, &s.path);
                    }

                    buf
                }
                Err(status) => single(status as u8),
            }
        }
        // Peer-to-peer verb; the directory has no answer for it.
        Verb::GetFile => return Err(PeerdexError::MalformedPayload),
    };

    stream.write_all(&response).await?;

    Ok(())
}

fn single(code: u8) -> BytesMut {
    let mut buf = BytesMut::with_capacity(1);

    buf.put_u8(code);

    buf
}
