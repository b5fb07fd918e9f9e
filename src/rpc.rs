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

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::{PeerdexError, PeerdexResult};
use crate::peer::PeerListener;
use crate::protocol::{
    parse_content_listing, parse_seeder_listing, parse_user_listing, put_cstr, RequestHeader,
    SeederEntry, UserEntry, Verb, MAX_FIELD_LEN,
};
use crate::timestamp::TimeSource;
use crate::transfer;

/// Outcome category of one stub call, mirroring the three error classes the
/// protocol distinguishes end-to-end.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Outcome {
    /// Status byte 0; the printed line ends in OK.
    Ok,

    /// Predictable protocol-level rejection. Specific message, no retry.
    UserError,

    /// Transport failure, malformed reply, or the verb's generic failure
    /// code.
    Error,
}

/// The connected sub-state of the client: the session's user name and the
/// peer listening endpoint advertised for it.
struct ClientSession {
    user: String,
    listener: PeerListener,
}

/// Directory RPC stubs plus the client's session state. One value owns
/// everything the shell needs; there are no process-wide globals.
///
/// Every stub opens a fresh connection, writes one request, reads the status
/// byte and any payload, prints the user-facing line, and returns the
/// outcome. Reply payloads are parsed from the remainder of the stream,
/// which is complete because the directory closes after one exchange.
pub struct Client {
    server: SocketAddr,

    /// Producer of the opaque `ts` field.
    clock: Box<dyn TimeSource>,

    session: Option<ClientSession>,

    /// Where multi-seeder segment files go; `None` places them beside the
    /// output file.
    segment_dir: Option<PathBuf>,
}

impl Client {
    pub fn new(
        server: SocketAddr,
        clock: Box<dyn TimeSource>,
        segment_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            server,
            clock,
            session: None,
            segment_dir,
        }
    }

    pub fn connected_user(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.user.as_str())
    }

    pub async fn register(&mut self, user: &str) -> Outcome {
        if !valid_user(user) {
            println!("Error: Invalid username length");
            return Outcome::UserError;
        }

        match self.simple_exchange(Verb::Register, user, &[]).await {
            Ok(0) => {
                println!("c> REGISTER OK");
                Outcome::Ok
            }
            Ok(1) => {
                println!("c> USERNAME IN USE");
                Outcome::UserError
            }
            Ok(2) => {
                println!("c> REGISTER FAIL");
                Outcome::Error
            }
            Ok(other) => unknown_response(other),
            Err(e) => client_error("REGISTER", e),
        }
    }

    pub async fn unregister(&mut self, user: &str) -> Outcome {
        if !valid_user(user) {
            println!("Error: Invalid username length");
            return Outcome::UserError;
        }

        match self.simple_exchange(Verb::Unregister, user, &[]).await {
            Ok(0) => {
                // The directory dropped the session with the record; stop
                // serving for it locally as well.
                if self.connected_user() == Some(user) {
                    if let Some(session) = self.session.take() {
                        session.listener.stop().await;
                    }
                }

                println!("c> UNREGISTER OK");
                Outcome::Ok
            }
            Ok(1) => {
                println!("c> USER DOES NOT EXIST");
                Outcome::UserError
            }
            Ok(2) => {
                println!("c> UNREGISTER FAIL");
                Outcome::Error
            }
            Ok(other) => unknown_response(other),
            Err(e) => client_error("UNREGISTER", e),
        }
    }

    /// Start the peer endpoint first so its port can travel in the request;
    /// tear it down again if the directory says no.
    pub async fn connect(&mut self, user: &str) -> Outcome {
        if !valid_user(user) {
            println!("Error: Invalid username length");
            return Outcome::UserError;
        }

        let listener = match PeerListener::spawn().await {
            Ok(l) => l,
            Err(e) => return client_error("CONNECT", e),
        };

        let port = listener.port().to_string();

        let outcome = match self.simple_exchange(Verb::Connect, user, &[&port]).await {
            Ok(0) => {
                println!("c> CONNECT OK");
                Outcome::Ok
            }
            Ok(1) => {
                println!("c> CONNECT FAIL, USER DOES NOT EXIST");
                Outcome::UserError
            }
            Ok(2) => {
                println!("c> USER ALREADY CONNECTED");
                Outcome::UserError
            }
            Ok(3) => {
                println!("c> CONNECT FAIL");
                Outcome::Error
            }
            Ok(other) => unknown_response(other),
            Err(e) => client_error("CONNECT", e),
        };

        if outcome == Outcome::Ok {
            // Replacing a session another user held: stop its endpoint.
            if let Some(old) = self.session.take() {
                old.listener.stop().await;
            }

            self.session = Some(ClientSession {
                user: user.to_string(),
                listener,
            });
        } else {
            listener.stop().await;
        }

        outcome
    }

    pub async fn disconnect(&mut self, user: &str) -> Outcome {
        self.disconnect_with(user, true).await
    }

    /// Best-effort session teardown for process exit: a quiet DISCONNECT of
    /// the current user, if any.
    pub async fn shutdown(&mut self) {
        if let Some(user) = self.connected_user().map(str::to_string) {
            self.disconnect_with(&user, false).await;
        }
    }

    async fn disconnect_with(&mut self, user: &str, verbose: bool) -> Outcome {
        if !valid_user(user) {
            if verbose {
                println!("Error: Invalid username length");
            }
            return Outcome::UserError;
        }

        match self.simple_exchange(Verb::Disconnect, user, &[]).await {
            Ok(0) => {
                if self.connected_user() == Some(user) {
                    if let Some(session) = self.session.take() {
                        session.listener.stop().await;
                    }
                }

                if verbose {
                    println!("c> DISCONNECT OK");
                }
                Outcome::Ok
            }
            Ok(1) => {
                if verbose {
                    println!("c> DISCONNECT FAIL, USER DOES NOT EXIST");
                }
                Outcome::UserError
            }
            Ok(2) => {
                if verbose {
                    println!("c> DISCONNECT FAIL, USER NOT CONNECTED");
                }
                Outcome::UserError
            }
            Ok(3) => {
                if verbose {
                    println!("c> DISCONNECT FAIL");
                }
                Outcome::Error
            }
            Ok(other) => {
                if verbose {
                    println!("c> UNKNOWN RESPONSE FROM SERVER: {}", other);
                }
                Outcome::Error
            }
            Err(e) => {
                if verbose {
                    println!("c> DISCONNECT CLIENT ERROR - {}", e);
                }
                Outcome::Error
            }
        }
    }

    pub async fn publish(&mut self, path: &str, description: &str) -> Outcome {
        let path = match resolve_local_path(path) {
            Ok(p) => p,
            Err(outcome) => return outcome,
        };

        if description.len() > MAX_FIELD_LEN {
            println!("Error: Invalid description length");
            return Outcome::UserError;
        }

        let user = match self.connected_user().map(str::to_string) {
            Some(u) => u,
            None => {
                println!("c> PUBLISH FAIL, USER NOT CONNECTED");
                return Outcome::UserError;
            }
        };

        match self
            .simple_exchange(Verb::Publish, &user, &[&path, description])
            .await
        {
            Ok(0) => {
                println!("c> PUBLISH OK");
                Outcome::Ok
            }
            Ok(1) => {
                println!("c> PUBLISH FAIL, USER DOES NOT EXIST");
                Outcome::UserError
            }
            Ok(2) => {
                println!("c> PUBLISH FAIL, USER NOT CONNECTED");
                Outcome::UserError
            }
            Ok(3) => {
                println!("c> PUBLISH FAIL, CONTENT ALREADY PUBLISHED");
                Outcome::UserError
            }
            Ok(4) => {
                println!("c> PUBLISH FAIL");
                Outcome::Error
            }
            Ok(other) => unknown_response(other),
            Err(e) => client_error("PUBLISH", e),
        }
    }

    pub async fn delete(&mut self, path: &str) -> Outcome {
        let path = match resolve_local_path(path) {
            Ok(p) => p,
            Err(outcome) => return outcome,
        };

        let user = match self.connected_user().map(str::to_string) {
            Some(u) => u,
            None => {
                println!("c> DELETE FAIL, USER NOT CONNECTED");
                return Outcome::UserError;
            }
        };

        match self.simple_exchange(Verb::Delete, &user, &[&path]).await {
            Ok(0) => {
                println!("c> DELETE OK");
                Outcome::Ok
            }
            Ok(1) => {
                println!("c> DELETE FAIL, USER DOES NOT EXIST");
                Outcome::UserError
            }
            Ok(2) => {
                println!("c> DELETE FAIL, USER NOT CONNECTED");
                Outcome::UserError
            }
            Ok(3) => {
                println!("c> DELETE FAIL, CONTENT NOT PUBLISHED");
                Outcome::UserError
            }
            Ok(4) => {
                println!("c> DELETE FAIL");
                Outcome::Error
            }
            Ok(other) => unknown_response(other),
            Err(e) => client_error("DELETE", e),
        }
    }

    pub async fn list_users(&mut self) -> Outcome {
        let user = match self.connected_user().map(str::to_string) {
            Some(u) => u,
            None => {
                println!("c> LIST_USERS FAIL, USER NOT CONNECTED");
                return Outcome::UserError;
            }
        };

        match self.fetch_users(&user).await {
            Ok(Ok(users)) => {
                println!("c> LIST_USERS OK");

                for (i, u) in users.iter().enumerate() {
                    println!("\tUSER{}: {} {} {}", i, u.name, u.ip, u.port);
                }

                Outcome::Ok
            }
            Ok(Err(1)) => {
                println!("c> LIST_USERS FAIL, USER DOES NOT EXIST");
                Outcome::UserError
            }
            Ok(Err(2)) => {
                println!("c> LIST_USERS FAIL, USER NOT CONNECTED");
                Outcome::UserError
            }
            Ok(Err(3)) => {
                println!("c> LIST_USERS FAIL");
                Outcome::Error
            }
            Ok(Err(other)) => unknown_response(other),
            Err(e) => client_error("LIST_USERS", e),
        }
    }

    pub async fn list_content(&mut self, target: &str) -> Outcome {
        if !valid_user(target) {
            println!("Error: Invalid username length");
            return Outcome::UserError;
        }

        let user = match self.connected_user().map(str::to_string) {
            Some(u) => u,
            None => {
                println!("c> LIST_CONTENT FAIL, USER NOT CONNECTED");
                return Outcome::UserError;
            }
        };

        match self.fetch_content(&user, target).await {
            Ok(Ok(paths)) => {
                println!("c> LIST_CONTENT OK");

                for (i, path) in paths.iter().enumerate() {
                    println!("\tFILE{}: {}", i, path);
                }

                Outcome::Ok
            }
            Ok(Err(1)) => {
                println!("c> LIST_CONTENT FAIL, USER DOES NOT EXIST");
                Outcome::UserError
            }
            Ok(Err(2)) => {
                println!("c> LIST_CONTENT FAIL, USER NOT CONNECTED");
                Outcome::UserError
            }
            Ok(Err(3)) => {
                println!("c> LIST_CONTENT FAIL, REMOTE USER DOES NOT EXIST");
                Outcome::UserError
            }
            Ok(Err(4)) => {
                println!("c> LIST_CONTENT FAIL");
                Outcome::Error
            }
            Ok(Err(other)) => unknown_response(other),
            Err(e) => client_error("LIST_CONTENT", e),
        }
    }

    /// Whole-file fetch from one named peer, located via the user listing.
    pub async fn get_file(&mut self, user: &str, remote_path: &str, local_path: &str) -> Outcome {
        if remote_path.len() > MAX_FIELD_LEN {
            println!("Error: Invalid filename length");
            return Outcome::UserError;
        }

        let caller = match self.connected_user().map(str::to_string) {
            Some(u) => u,
            None => {
                println!("c> GET_FILE FAIL, USER NOT CONNECTED");
                return Outcome::UserError;
            }
        };

        let users = match self.fetch_users(&caller).await {
            Ok(Ok(users)) => users,
            Ok(Err(_)) => {
                println!("c> GET_FILE FAIL, LIST_USERS ERROR");
                return Outcome::Error;
            }
            Err(e) => return client_error("GET_FILE", e),
        };

        let target = match users.iter().find(|u| u.name == user) {
            Some(t) => t,
            None => {
                println!("c> GET_FILE FAIL, USER {} NOT FOUND", user);
                return Outcome::UserError;
            }
        };

        let addr = SocketAddr::new(target.ip, target.port);

        match transfer::download_file(addr, remote_path, Path::new(local_path)).await {
            Ok(0) => {
                println!("c> GET_FILE OK");
                Outcome::Ok
            }
            Ok(1) => {
                println!("c> GET_FILE FAIL, FILE DOES NOT EXIST");
                Outcome::UserError
            }
            Ok(2) => {
                println!("c> GET_FILE FAIL");
                Outcome::Error
            }
            Ok(other) => unknown_response(other),
            Err(e) => client_error("GET_FILE", e),
        }
    }

    /// Parallel fetch from every seeder the directory knows for the path.
    pub async fn get_multifile(&mut self, remote_path: &str, local_path: &str) -> Outcome {
        if remote_path.len() > MAX_FIELD_LEN {
            println!("Error: Invalid filename length");
            return Outcome::UserError;
        }

        let user = match self.connected_user().map(str::to_string) {
            Some(u) => u,
            None => {
                println!("c> GET_MULTIFILE FAIL, USER NOT CONNECTED");
                return Outcome::UserError;
            }
        };

        let seeders = match self.fetch_seeders(&user, remote_path).await {
            Ok(Ok(seeders)) => seeders,
            Ok(Err(1)) => {
                println!("c> GET_MULTIFILE FAIL, NO USER CONNECTED HAVE FILE");
                return Outcome::UserError;
            }
            Ok(Err(2)) => {
                println!("c> GET_MULTIFILE FAIL");
                return Outcome::Error;
            }
            Ok(Err(other)) => return unknown_response(other),
            Err(e) => return client_error("GET_MULTIFILE", e),
        };

        match transfer::fetch_multi(
            seeders,
            Path::new(local_path),
            self.segment_dir.as_deref(),
        )
        .await
        {
            Ok(()) => {
                println!("c> GET_MULTIFILE OK");
                Outcome::Ok
            }
            Err(e) => client_error("GET_MULTIFILE", e),
        }
    }

    /// One request/response exchange whose reply is just the status byte.
    async fn simple_exchange(
        &self,
        verb: Verb,
        user: &str,
        extra: &[&str],
    ) -> PeerdexResult<u8> {
        let ts = self.clock.now().await?;

        let mut buf = RequestHeader {
            verb,
            ts: &ts,
            user,
        }
        .to_bytes();

        for field in extra {
            put_cstr(&mut buf, field);
        }

        let mut stream = TcpStream::connect(self.server).await?;
        stream.write_all(&buf).await?;

        Ok(stream.read_u8().await?)
    }

    /// LIST_USERS exchange returning structured entries. Inner `Err` is the
    /// non-zero status byte.
    async fn fetch_users(&self, user: &str) -> PeerdexResult<Result<Vec<UserEntry>, u8>> {
        let ts = self.clock.now().await?;

        let buf = RequestHeader {
            verb: Verb::ListUsers,
            ts: &ts,
            user,
        }
        .to_bytes();

        let mut stream = TcpStream::connect(self.server).await?;
        stream.write_all(&buf).await?;

        let status = stream.read_u8().await?;
        if status != 0 {
            return Ok(Err(status));
        }

        let mut rest = Vec::new();
        stream.read_to_end(&mut rest).await?;

        let (_, users) =
            parse_user_listing(&rest).map_err(|_| PeerdexError::MalformedPayload)?;

        Ok(Ok(users))
    }

    async fn fetch_content(
        &self,
        user: &str,
        target: &str,
    ) -> PeerdexResult<Result<Vec<String>, u8>> {
        let ts = self.clock.now().await?;

        let mut buf = RequestHeader {
            verb: Verb::ListContent,
            ts: &ts,
            user,
        }
        .to_bytes();
        put_cstr(&mut buf, target);

        let mut stream = TcpStream::connect(self.server).await?;
        stream.write_all(&buf).await?;

        let status = stream.read_u8().await?;
        if status != 0 {
            return Ok(Err(status));
        }

        let mut rest = Vec::new();
        stream.read_to_end(&mut rest).await?;

        let (_, paths) =
            parse_content_listing(&rest).map_err(|_| PeerdexError::MalformedPayload)?;

        Ok(Ok(paths))
    }

    async fn fetch_seeders(
        &self,
        user: &str,
        path: &str,
    ) -> PeerdexResult<Result<Vec<SeederEntry>, u8>> {
        let ts = self.clock.now().await?;

        let mut buf = RequestHeader {
            verb: Verb::GetMultifile,
            ts: &ts,
            user,
        }
        .to_bytes();
        put_cstr(&mut buf, path);

        let mut stream = TcpStream::connect(self.server).await?;
        stream.write_all(&buf).await?;

        let status = stream.read_u8().await?;
        if status != 0 {
            return Ok(Err(status));
        }

        let mut rest = Vec::new();
        stream.read_to_end(&mut rest).await?;

        let (_, seeders) =
            parse_seeder_listing(&rest).map_err(|_| PeerdexError::MalformedPayload)?;

        Ok(Ok(seeders))
    }
}

fn valid_user(user: &str) -> bool {
    !user.is_empty() && user.len() <= MAX_FIELD_LEN
}

/// Validate a PUBLISH/DELETE path and resolve it to the absolute form that
/// travels on the wire. Prints the rejection reason itself.
fn resolve_local_path(path: &str) -> Result<String, Outcome> {
    if path.is_empty() || path.len() > MAX_FIELD_LEN {
        println!("Error: Invalid filename length");
        return Err(Outcome::UserError);
    }

    if path.contains(' ') {
        println!("Error: Invalid filename, blank spaces not allowed");
        return Err(Outcome::UserError);
    }

    let p = Path::new(path);

    if !p.is_file() {
        println!("Error: File does not exist");
        return Err(Outcome::UserError);
    }

    let absolute = if p.is_absolute() {
        p.to_path_buf()
    } else {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(p),
            Err(_) => {
                println!("Error: File does not exist");
                return Err(Outcome::UserError);
            }
        }
    };

    match absolute.to_str() {
        Some(s) if s.len() <= MAX_FIELD_LEN => Ok(s.to_string()),
        _ => {
            println!("Error: Invalid filename length while converting to absolute path");
            Err(Outcome::UserError)
        }
    }
}

fn unknown_response(status: u8) -> Outcome {
    println!("c> UNKNOWN RESPONSE FROM SERVER: {}", status);

    Outcome::Error
}

fn client_error(verb: &str, e: PeerdexError) -> Outcome {
    println!("c> {} CLIENT ERROR - {}", verb, e);

    Outcome::Error
}
