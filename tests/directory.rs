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

use std::io::Write;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use peerdex::directory::DirectoryServer;
use peerdex::protocol::{
    parse_content_listing, parse_seeder_listing, parse_user_listing, put_cstr, RequestHeader,
    Verb,
};
use peerdex::rpc::{Client, Outcome};
use peerdex::store::Directory;
use peerdex::timestamp::LocalClock;

async fn spawn_directory() -> SocketAddr {
    let store = Arc::new(Directory::new());

    let mut server = DirectoryServer::bind(("127.0.0.1", 0), store)
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();

    tokio::spawn(async move { server.up().await });

    addr
}

/// One raw exchange against the directory, returning the status byte and
/// whatever payload followed it.
async fn raw_exchange(
    addr: SocketAddr,
    verb: Verb,
    user: &str,
    extra: &[&str],
) -> (u8, Vec<u8>) {
    let mut buf = RequestHeader {
        verb,
        ts: "01/05/2025 10:30:00",
        user,
    }
    .to_bytes();

    for field in extra {
        put_cstr(&mut buf, field);
    }

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(&buf).await.unwrap();

    let status = stream.read_u8().await.unwrap();

    let mut rest = Vec::new();
    stream.read_to_end(&mut rest).await.unwrap();

    (status, rest)
}

async fn raw_status(addr: SocketAddr, verb: Verb, user: &str, extra: &[&str]) -> u8 {
    raw_exchange(addr, verb, user, extra).await.0
}

#[tokio::test]
async fn duplicate_register_status_codes() {
    let addr = spawn_directory().await;

    assert_eq!(raw_status(addr, Verb::Register, "alice", &[]).await, 0);
    assert_eq!(raw_status(addr, Verb::Register, "alice", &[]).await, 1);
}

#[tokio::test]
async fn connect_before_register_rejected() {
    let addr = spawn_directory().await;

    assert_eq!(
        raw_status(addr, Verb::Connect, "charlie", &["4000"]).await,
        1
    );
}

#[tokio::test]
async fn connect_twice_rejected() {
    let addr = spawn_directory().await;

    raw_status(addr, Verb::Register, "u", &[]).await;

    assert_eq!(raw_status(addr, Verb::Connect, "u", &["4000"]).await, 0);
    assert_eq!(raw_status(addr, Verb::Connect, "u", &["4001"]).await, 2);
}

#[tokio::test]
async fn connect_with_bad_port_is_internal_failure() {
    let addr = spawn_directory().await;

    raw_status(addr, Verb::Register, "u", &[]).await;

    assert_eq!(
        raw_status(addr, Verb::Connect, "u", &["not-a-port"]).await,
        3
    );
}

#[tokio::test]
async fn publish_status_code_sequence() {
    let addr = spawn_directory().await;

    // Unknown user, then no session, then success, then duplicate.
    assert_eq!(
        raw_status(addr, Verb::Publish, "u", &["/data/x", "d"]).await,
        1
    );

    raw_status(addr, Verb::Register, "u", &[]).await;
    assert_eq!(
        raw_status(addr, Verb::Publish, "u", &["/data/x", "d"]).await,
        2
    );

    raw_status(addr, Verb::Connect, "u", &["4000"]).await;
    assert_eq!(
        raw_status(addr, Verb::Publish, "u", &["/data/x", "d"]).await,
        0
    );
    assert_eq!(
        raw_status(addr, Verb::Publish, "u", &["/data/x", "d2"]).await,
        3
    );
}

#[tokio::test]
async fn list_users_reports_connected_only() {
    let addr = spawn_directory().await;

    for user in &["a", "b", "c"] {
        raw_status(addr, Verb::Register, user, &[]).await;
    }
    raw_status(addr, Verb::Connect, "a", &["4000"]).await;
    raw_status(addr, Verb::Connect, "b", &["4001"]).await;

    let (status, payload) = raw_exchange(addr, Verb::ListUsers, "a", &[]).await;
    assert_eq!(status, 0);

    let (_, users) = parse_user_listing(&payload).unwrap();

    let mut names: Vec<&str> = users.iter().map(|u| u.name.as_str()).collect();
    names.sort();

    assert_eq!(names, vec!["a", "b"]);

    for u in &users {
        assert_eq!(u.ip, "127.0.0.1".parse::<std::net::IpAddr>().unwrap());
    }
}

#[tokio::test]
async fn content_listing_of_disconnected_target() {
    let addr = spawn_directory().await;

    raw_status(addr, Verb::Register, "u1", &[]).await;
    raw_status(addr, Verb::Connect, "u1", &["4000"]).await;
    raw_status(addr, Verb::Publish, "u1", &["/tmp/x", "the x file"]).await;
    raw_status(addr, Verb::Disconnect, "u1", &[]).await;

    raw_status(addr, Verb::Register, "u2", &[]).await;
    raw_status(addr, Verb::Connect, "u2", &["4001"]).await;

    let (status, payload) = raw_exchange(addr, Verb::ListContent, "u2", &["u1"]).await;
    assert_eq!(status, 0);

    let (_, paths) = parse_content_listing(&payload).unwrap();
    assert_eq!(paths, vec!["/tmp/x".to_string()]);
}

#[tokio::test]
async fn unregister_cascades_to_content() {
    let addr = spawn_directory().await;

    raw_status(addr, Verb::Register, "u1", &[]).await;
    raw_status(addr, Verb::Connect, "u1", &["4000"]).await;
    raw_status(addr, Verb::Publish, "u1", &["/tmp/x", "d"]).await;

    raw_status(addr, Verb::Register, "u2", &[]).await;
    raw_status(addr, Verb::Connect, "u2", &["4001"]).await;

    assert_eq!(raw_status(addr, Verb::Unregister, "u1", &[]).await, 0);

    // Target is gone entirely.
    assert_eq!(
        raw_status(addr, Verb::ListContent, "u2", &["u1"]).await,
        3
    );
}

#[tokio::test]
async fn seeder_listing_for_published_path() {
    let addr = spawn_directory().await;

    for &(user, port) in &[("a", "4000"), ("b", "4001")] {
        raw_status(addr, Verb::Register, user, &[]).await;
        raw_status(addr, Verb::Connect, user, &[port]).await;
        raw_status(addr, Verb::Publish, user, &["/data/big", "d"]).await;
    }

    let (status, payload) = raw_exchange(addr, Verb::GetMultifile, "a", &["/data/big"]).await;
    assert_eq!(status, 0);

    let (_, seeders) = parse_seeder_listing(&payload).unwrap();

    let mut ports: Vec<u16> = seeders.iter().map(|s| s.port).collect();
    ports.sort_unstable();

    assert_eq!(ports, vec![4000, 4001]);
    assert!(seeders.iter().all(|s| s.path == "/data/big"));

    // Nobody publishes this one.
    assert_eq!(
        raw_status(addr, Verb::GetMultifile, "a", &["/data/nothing"]).await,
        1
    );
}

#[tokio::test]
async fn stub_scenario_register_publish_list() {
    let addr = spawn_directory().await;

    let mut client = Client::new(addr, Box::new(LocalClock), None);

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"the x file contents").unwrap();
    let path = file.path().to_str().unwrap().to_string();

    assert_eq!(client.register("bob").await, Outcome::Ok);
    assert_eq!(client.register("bob").await, Outcome::UserError);

    assert_eq!(client.connect("bob").await, Outcome::Ok);
    assert_eq!(client.publish(&path, "the x file").await, Outcome::Ok);
    assert_eq!(
        client.publish(&path, "again").await,
        Outcome::UserError
    );

    assert_eq!(client.list_users().await, Outcome::Ok);
    assert_eq!(client.list_content("bob").await, Outcome::Ok);

    assert_eq!(client.delete(&path).await, Outcome::Ok);
    assert_eq!(client.delete(&path).await, Outcome::UserError);

    assert_eq!(client.disconnect("bob").await, Outcome::Ok);
    assert_eq!(client.connected_user(), None);
}

#[tokio::test]
async fn stub_requires_session_locally() {
    let addr = spawn_directory().await;

    let mut client = Client::new(addr, Box::new(LocalClock), None);

    client.register("solo").await;

    // Rejected before any bytes are sent.
    assert_eq!(client.list_users().await, Outcome::UserError);
    assert_eq!(
        client.get_multifile("/data/big", "/tmp/out").await,
        Outcome::UserError
    );
}

#[tokio::test]
async fn session_survives_client_restart_after_disconnect() {
    let addr = spawn_directory().await;

    {
        let mut client = Client::new(addr, Box::new(LocalClock), None);

        client.register("phoenix").await;
        assert_eq!(client.connect("phoenix").await, Outcome::Ok);

        // What the shell does on a termination signal.
        client.shutdown().await;
    }

    let mut client = Client::new(addr, Box::new(LocalClock), None);

    assert_eq!(client.connect("phoenix").await, Outcome::Ok);
    client.shutdown().await;
}
