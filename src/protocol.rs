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
use std::fmt;
use std::net::IpAddr;

use bytes::{BufMut, BytesMut};

use nom::bytes::complete::{tag, take_while};
use nom::combinator::map_res;
use nom::multi::count;
use nom::number::complete::be_u8;
use nom::sequence::{terminated, tuple};
use nom::IResult;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{PeerdexError, PeerdexResult};

/// Upper bound on any user-supplied wire field.
pub const MAX_FIELD_LEN: usize = 255;

/// Upper bound on a single C-string read off a socket.
///
/// Well-formed fields never exceed `MAX_FIELD_LEN`; anything that keeps
/// growing past this is a malformed peer.
pub const MAX_WIRE_STRING: usize = 4096;

/// Request verbs, transmitted as the first C-string of every request.
///
/// The first eight travel client-to-directory. `GET_FILE` is peer-to-peer
/// only, and `GET_MULTIFILE` is accepted by both endpoints with different
/// bodies: the directory resolves it to a seeder list, a peer serves the
/// requested byte range.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Verb {
    Register,
    Unregister,
    Connect,
    Disconnect,
    Publish,
    Delete,
    ListUsers,
    ListContent,
    GetFile,
    GetMultifile,
}

impl Verb {
    pub fn as_wire(&self) -> &'static str {
        match self {
            Verb::Register => "REGISTER",
            Verb::Unregister => "UNREGISTER",
            Verb::Connect => "CONNECT",
            Verb::Disconnect => "DISCONNECT",
            Verb::Publish => "PUBLISH",
            Verb::Delete => "DELETE",
            Verb::ListUsers => "LIST_USERS",
            Verb::ListContent => "LIST_CONTENT",
            Verb::GetFile => "GET_FILE",
            Verb::GetMultifile => "GET_MULTIFILE",
        }
    }
}

impl TryFrom<&str> for Verb {
    type Error = PeerdexError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "REGISTER" => Ok(Verb::Register),
            "UNREGISTER" => Ok(Verb::Unregister),
            "CONNECT" => Ok(Verb::Connect),
            "DISCONNECT" => Ok(Verb::Disconnect),
            "PUBLISH" => Ok(Verb::Publish),
            "DELETE" => Ok(Verb::Delete),
            "LIST_USERS" => Ok(Verb::ListUsers),
            "LIST_CONTENT" => Ok(Verb::ListContent),
            "GET_FILE" => Ok(Verb::GetFile),
            "GET_MULTIFILE" => Ok(Verb::GetMultifile),
            other => Err(PeerdexError::UnknownVerb(other.to_string())),
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_wire())
    }
}

// Status bytes are verb-local: the same numeric value carries a different
// meaning per verb, so each verb gets its own enum.

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[repr(u8)]
pub enum RegisterStatus {
    Ok = 0,
    NameInUse = 1,
    Internal = 2,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[repr(u8)]
pub enum UnregisterStatus {
    Ok = 0,
    UnknownUser = 1,
    Internal = 2,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[repr(u8)]
pub enum ConnectStatus {
    Ok = 0,
    UnknownUser = 1,
    AlreadyConnected = 2,
    Internal = 3,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[repr(u8)]
pub enum DisconnectStatus {
    Ok = 0,
    UnknownUser = 1,
    NotConnected = 2,
    Internal = 3,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[repr(u8)]
pub enum PublishStatus {
    Ok = 0,
    UnknownUser = 1,
    NotConnected = 2,
    AlreadyPublished = 3,
    Internal = 4,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[repr(u8)]
pub enum DeleteStatus {
    Ok = 0,
    UnknownUser = 1,
    NotConnected = 2,
    NotPublished = 3,
    Internal = 4,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[repr(u8)]
pub enum ListUsersStatus {
    Ok = 0,
    UnknownUser = 1,
    NotConnected = 2,
    Internal = 3,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[repr(u8)]
pub enum ListContentStatus {
    Ok = 0,
    UnknownUser = 1,
    NotConnected = 2,
    UnknownTarget = 3,
    Internal = 4,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[repr(u8)]
pub enum SeederListStatus {
    Ok = 0,
    NoSeeders = 1,
    Internal = 2,
}

/// Status bytes of the peer-to-peer serving endpoint.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[repr(u8)]
pub enum PeerStatus {
    Ok = 0,
    MissingFile = 1,
    Refused = 2,
}

/// Append `s` followed by the NUL terminator.
pub fn put_cstr(buf: &mut BytesMut, s: &str) {
    buf.put_slice(s.as_bytes());
    buf.put_u8(0);
}

/// Common prefix of every directory request: verb, opaque timestamp, user.
///
/// The timestamp is whatever the time service produced; the directory reads
/// and discards it without interpretation.
pub struct RequestHeader<'a> {
    pub verb: Verb,
    pub ts: &'a str,
    pub user: &'a str,
}

impl<'a> RequestHeader<'a> {
    pub fn to_bytes(&self) -> BytesMut {
        let mut buf = BytesMut::new();

        put_cstr(&mut buf, self.verb.as_wire());
        put_cstr(&mut buf, self.ts);
        put_cstr(&mut buf, self.user);

        buf
    }
}

/// Peer request for a whole file.
pub struct FileRequest<'a> {
    pub path: &'a str,
}

impl<'a> FileRequest<'a> {
    pub fn to_bytes(&self) -> BytesMut {
        let mut buf = BytesMut::new();

        put_cstr(&mut buf, Verb::GetFile.as_wire());
        put_cstr(&mut buf, self.path);

        buf
    }
}

/// Peer request for one seeder's byte range of a file.
///
/// `seeder_id` and `total_seeders` travel as decimal C-strings; the serving
/// peer derives the range from them with the partition rule.
pub struct RangeRequest<'a> {
    pub path: &'a str,
    pub seeder_id: usize,
    pub total_seeders: usize,
}

impl<'a> RangeRequest<'a> {
    pub fn to_bytes(&self) -> BytesMut {
        let mut buf = BytesMut::new();

        put_cstr(&mut buf, Verb::GetMultifile.as_wire());
        put_cstr(&mut buf, self.path);
        put_cstr(&mut buf, &self.seeder_id.to_string());
        put_cstr(&mut buf, &self.total_seeders.to_string());

        buf
    }
}

/// One `LIST_USERS` reply entry: a currently connected user and the address
/// of its peer serving endpoint.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct UserEntry {
    pub name: String,
    pub ip: IpAddr,
    pub port: u16,
}

/// One directory `GET_MULTIFILE` reply entry.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct SeederEntry {
    pub ip: IpAddr,
    pub port: u16,
    pub path: String,
}

pub fn parse_cstring(input: &[u8]) -> IResult<&[u8], &str> {
    map_res(
        terminated(take_while(|b| b != 0), tag([0])),
        std::str::from_utf8,
    )(input)
}

fn parse_decimal<T: std::str::FromStr>(input: &[u8]) -> IResult<&[u8], T> {
    map_res(parse_cstring, |s: &str| s.parse::<T>())(input)
}

/// Parse the success tail of a `LIST_USERS` reply: decimal count, then one
/// `(name, ip, port)` triple per user.
pub fn parse_user_listing(input: &[u8]) -> IResult<&[u8], Vec<UserEntry>> {
    let (input, n) = parse_decimal::<usize>(input)?;

    let (input, entries) = count(
        tuple((
            parse_cstring,
            parse_decimal::<IpAddr>,
            parse_decimal::<u16>,
        )),
        n,
    )(input)?;

    Ok((
        input,
        entries
            .into_iter()
            .map(|(name, ip, port)| UserEntry {
                name: name.to_string(),
                ip,
                port,
            })
            .collect(),
    ))
}

/// Parse the success tail of a `LIST_CONTENT` reply: decimal count, then one
/// path per published entry.
pub fn parse_content_listing(input: &[u8]) -> IResult<&[u8], Vec<String>> {
    let (input, n) = parse_decimal::<usize>(input)?;

    let (input, paths) = count(parse_cstring, n)(input)?;

    Ok((input, paths.into_iter().map(str::to_string).collect()))
}

/// Parse the success tail of a directory `GET_MULTIFILE` reply.
///
/// Unlike the listing verbs the count is a single byte, capping the seeder
/// set at 255.
pub fn parse_seeder_listing(input: &[u8]) -> IResult<&[u8], Vec<SeederEntry>> {
    let (input, n) = be_u8(input)?;

    let (input, entries) = count(
        tuple((parse_decimal::<IpAddr>, parse_decimal::<u16>, parse_cstring)),
        n as usize,
    )(input)?;

    Ok((
        input,
        entries
            .into_iter()
            .map(|(ip, port, path)| SeederEntry {
                ip,
                port,
                path: path.to_string(),
            })
            .collect(),
    ))
}

/// Read one C-string off the socket, one byte at a time until NUL.
///
/// End of stream terminates the string the same way the NUL does, matching
/// the wire contract of readers on both sides.
pub async fn read_cstring<R>(r: &mut R) -> PeerdexResult<String>
where
    R: AsyncRead + Unpin,
{
    let mut data = Vec::new();

    loop {
        let b = match r.read_u8().await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        };

        if b == 0 {
            break;
        }

        if data.len() == MAX_WIRE_STRING {
            return Err(PeerdexError::MalformedPayload);
        }

        data.push(b);
    }

    Ok(String::from_utf8(data)?)
}

/// Write a single status byte.
pub async fn write_status<W>(w: &mut W, code: u8) -> PeerdexResult<()>
where
    W: AsyncWrite + Unpin,
{
    w.write_u8(code).await?;

    Ok(())
}

mod tests {
    #[allow(unused_imports)]
    use super::*;

    #[test]
    fn verb_wire_round_trip() {
        let verbs = [
            Verb::Register,
            Verb::Unregister,
            Verb::Connect,
            Verb::Disconnect,
            Verb::Publish,
            Verb::Delete,
            Verb::ListUsers,
            Verb::ListContent,
            Verb::GetFile,
            Verb::GetMultifile,
        ];

        for v in &verbs {
            assert_eq!(Verb::try_from(v.as_wire()).unwrap(), *v);
        }

        assert!(Verb::try_from("EXPUNGE").is_err());
    }

    #[test]
    fn cstring_framer_round_trip() {
        let samples = [
            "",
            "alice",
            "/data/big",
            "the x file",
            "año díasつき",
            "a string with several words and punctuation, even.",
        ];

        for s in &samples {
            let mut buf = BytesMut::new();
            put_cstr(&mut buf, s);

            let (rest, parsed) = parse_cstring(&buf).unwrap();

            assert_eq!(parsed, *s);
            assert!(rest.is_empty());
        }
    }

    #[test]
    #[rustfmt::skip]
    fn parse_valid_request_header() {
        let buf = RequestHeader {
            verb: Verb::Register,
            ts: "01/05/2025 10:30:00",
            user: "alice",
        }
        .to_bytes();

        assert_eq!(
            &buf[..],
            &[
                0x52, 0x45, 0x47, 0x49, 0x53, 0x54, 0x45, 0x52, 0x00, // REGISTER
                0x30, 0x31, 0x2f, 0x30, 0x35, 0x2f, 0x32, 0x30, 0x32,
                0x35, 0x20, 0x31, 0x30, 0x3a, 0x33, 0x30, 0x3a, 0x30,
                0x30, 0x00, // timestamp
                0x61, 0x6c, 0x69, 0x63, 0x65, 0x00, // alice
            ][..]
        );
    }

    #[test]
    #[rustfmt::skip]
    fn parse_valid_user_listing() {
        let payload: &[u8] = &[
            0x32, 0x00, // "2"
            0x61, 0x6c, 0x69, 0x63, 0x65, 0x00, // alice
            0x31, 0x30, 0x2e, 0x30, 0x2e, 0x30, 0x2e, 0x35, 0x00, // 10.0.0.5
            0x34, 0x30, 0x30, 0x30, 0x00, // 4000
            0x62, 0x6f, 0x62, 0x00, // bob
            0x31, 0x30, 0x2e, 0x30, 0x2e, 0x30, 0x2e, 0x36, 0x00, // 10.0.0.6
            0x35, 0x30, 0x30, 0x31, 0x00, // 5001
        ];

        let (rest, users) = parse_user_listing(payload).unwrap();

        assert!(rest.is_empty());
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].name, "alice");
        assert_eq!(users[0].ip, "10.0.0.5".parse::<IpAddr>().unwrap());
        assert_eq!(users[0].port, 4000);
        assert_eq!(users[1].name, "bob");
        assert_eq!(users[1].port, 5001);
    }

    #[test]
    #[rustfmt::skip]
    fn parse_valid_content_listing() {
        let payload: &[u8] = &[
            0x31, 0x00, // "1"
            0x2f, 0x74, 0x6d, 0x70, 0x2f, 0x78, 0x00, // /tmp/x
        ];

        let (rest, files) = parse_content_listing(payload).unwrap();

        assert!(rest.is_empty());
        assert_eq!(files, vec!["/tmp/x".to_string()]);
    }

    #[test]
    #[rustfmt::skip]
    fn parse_valid_seeder_listing() {
        let payload: &[u8] = &[
            0x02, // one-byte count
            0x31, 0x32, 0x37, 0x2e, 0x30, 0x2e, 0x30, 0x2e, 0x31, 0x00, // 127.0.0.1
            0x39, 0x30, 0x30, 0x30, 0x00, // 9000
            0x2f, 0x64, 0x61, 0x74, 0x61, 0x2f, 0x62, 0x69, 0x67, 0x00, // /data/big
            0x31, 0x32, 0x37, 0x2e, 0x30, 0x2e, 0x30, 0x2e, 0x31, 0x00, // 127.0.0.1
            0x39, 0x30, 0x30, 0x31, 0x00, // 9001
            0x2f, 0x64, 0x61, 0x74, 0x61, 0x2f, 0x62, 0x69, 0x67, 0x00, // /data/big
        ];

        let (rest, seeders) = parse_seeder_listing(payload).unwrap();

        assert!(rest.is_empty());
        assert_eq!(seeders.len(), 2);
        assert_eq!(seeders[0].port, 9000);
        assert_eq!(seeders[1].port, 9001);
        assert_eq!(seeders[0].path, "/data/big");
    }

    #[test]
    fn parse_truncated_listing_fails() {
        // Count promises two users but only one triple follows.
        let mut buf = BytesMut::new();
        put_cstr(&mut buf, "2");
        put_cstr(&mut buf, "alice");
        put_cstr(&mut buf, "10.0.0.5");
        put_cstr(&mut buf, "4000");

        assert!(parse_user_listing(&buf).is_err());
    }

    #[tokio::test]
    async fn read_cstring_sequence() {
        let mut cursor = std::io::Cursor::new(b"GET_FILE\0/tmp/x\0".to_vec());

        assert_eq!(read_cstring(&mut cursor).await.unwrap(), "GET_FILE");
        assert_eq!(read_cstring(&mut cursor).await.unwrap(), "/tmp/x");
        // End of stream reads as an empty string.
        assert_eq!(read_cstring(&mut cursor).await.unwrap(), "");
    }

    #[tokio::test]
    async fn read_cstring_rejects_runaway() {
        let mut cursor = std::io::Cursor::new(vec![0x61u8; MAX_WIRE_STRING + 1]);

        assert!(matches!(
            read_cstring(&mut cursor).await,
            Err(PeerdexError::MalformedPayload)
        ));
    }

    #[tokio::test]
    async fn range_request_layout() {
        let buf = RangeRequest {
            path: "/data/big",
            seeder_id: 1,
            total_seeders: 2,
        }
        .to_bytes();

        let mut cursor = std::io::Cursor::new(buf.to_vec());

        assert_eq!(read_cstring(&mut cursor).await.unwrap(), "GET_MULTIFILE");
        assert_eq!(read_cstring(&mut cursor).await.unwrap(), "/data/big");
        assert_eq!(read_cstring(&mut cursor).await.unwrap(), "1");
        assert_eq!(read_cstring(&mut cursor).await.unwrap(), "2");
    }
}
