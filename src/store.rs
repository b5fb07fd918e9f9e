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

use std::collections::HashMap;
use std::net::IpAddr;

use tokio::sync::Mutex;

use crate::protocol::{
    ConnectStatus, DeleteStatus, DisconnectStatus, ListContentStatus, ListUsersStatus,
    PublishStatus, RegisterStatus, SeederListStatus, UnregisterStatus,
};

/// Address at which a connected user accepts inbound peer requests.
///
/// The IP is the one the directory observed on the accepted socket; the port
/// is the listening port the client advertised in its CONNECT request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub ip: IpAddr,
    pub port: u16,
}

#[derive(Debug, Default)]
struct UserRecord {
    /// Present iff the user currently holds a session.
    session: Option<Session>,

    /// Published file path to description.
    ///
    /// Entries survive disconnect; only UNREGISTER drops them.
    published: HashMap<String, String>,
}

/// One `LIST_USERS` result row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectedUser {
    pub name: String,
    pub ip: IpAddr,
    pub port: u16,
}

/// One directory `GET_MULTIFILE` result row: a connected peer publishing the
/// requested path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seeder {
    pub ip: IpAddr,
    pub port: u16,
    pub path: String,
}

/// The directory's authoritative user/session/publication table.
///
/// A single exclusive lock serializes every operation. Each verb is one
/// self-contained critical section of in-memory work; request bytes are read
/// and response bytes written with the lock released, so no operation blocks
/// the table on network I/O.
pub struct Directory {
    users: Mutex<HashMap<String, UserRecord>>,
}

impl Directory {
    pub fn new() -> Self {
        Self {
            users: Mutex::new(HashMap::new()),
        }
    }

    pub async fn register(&self, name: &str) -> RegisterStatus {
        let mut users = self.users.lock().await;

        if users.contains_key(name) {
            return RegisterStatus::NameInUse;
        }

        users.insert(name.to_string(), UserRecord::default());

        RegisterStatus::Ok
    }

    /// Removes the user record entirely, session and publications included.
    pub async fn unregister(&self, name: &str) -> UnregisterStatus {
        let mut users = self.users.lock().await;

        match users.remove(name) {
            Some(_) => UnregisterStatus::Ok,
            None => UnregisterStatus::UnknownUser,
        }
    }

    pub async fn connect(&self, name: &str, ip: IpAddr, port: u16) -> ConnectStatus {
        let mut users = self.users.lock().await;

        let record = match users.get_mut(name) {
            Some(r) => r,
            None => return ConnectStatus::UnknownUser,
        };

        if record.session.is_some() {
            return ConnectStatus::AlreadyConnected;
        }

        record.session = Some(Session { ip, port });

        ConnectStatus::Ok
    }

    /// Ends the session. Published content is left in place.
    pub async fn disconnect(&self, name: &str) -> DisconnectStatus {
        let mut users = self.users.lock().await;

        let record = match users.get_mut(name) {
            Some(r) => r,
            None => return DisconnectStatus::UnknownUser,
        };

        if record.session.take().is_none() {
            return DisconnectStatus::NotConnected;
        }

        DisconnectStatus::Ok
    }

    pub async fn publish(&self, name: &str, path: &str, description: &str) -> PublishStatus {
        let mut users = self.users.lock().await;

        let record = match users.get_mut(name) {
            Some(r) => r,
            None => return PublishStatus::UnknownUser,
        };

        if record.session.is_none() {
            return PublishStatus::NotConnected;
        }

        if record.published.contains_key(path) {
            return PublishStatus::AlreadyPublished;
        }

        record
            .published
            .insert(path.to_string(), description.to_string());

        PublishStatus::Ok
    }

    pub async fn delete(&self, name: &str, path: &str) -> DeleteStatus {
        let mut users = self.users.lock().await;

        let record = match users.get_mut(name) {
            Some(r) => r,
            None => return DeleteStatus::UnknownUser,
        };

        if record.session.is_none() {
            return DeleteStatus::NotConnected;
        }

        match record.published.remove(path) {
            Some(_) => DeleteStatus::Ok,
            None => DeleteStatus::NotPublished,
        }
    }

    /// Every currently connected user, the caller included. No ordering is
    /// guaranteed.
    pub async fn list_users(&self, caller: &str) -> Result<Vec<ConnectedUser>, ListUsersStatus> {
        let users = self.users.lock().await;

        let record = match users.get(caller) {
            Some(r) => r,
            None => return Err(ListUsersStatus::UnknownUser),
        };

        if record.session.is_none() {
            return Err(ListUsersStatus::NotConnected);
        }

        Ok(users
            .iter()
            .filter_map(|(name, r)| {
                r.session.as_ref().map(|s| ConnectedUser {
                    name: name.clone(),
                    ip: s.ip,
                    port: s.port,
                })
            })
            .collect())
    }

    /// The target's published paths. The target need not be connected.
    pub async fn list_content(
        &self,
        caller: &str,
        target: &str,
    ) -> Result<Vec<String>, ListContentStatus> {
        let users = self.users.lock().await;

        let record = match users.get(caller) {
            Some(r) => r,
            None => return Err(ListContentStatus::UnknownUser),
        };

        if record.session.is_none() {
            return Err(ListContentStatus::NotConnected);
        }

        let target = match users.get(target) {
            Some(r) => r,
            None => return Err(ListContentStatus::UnknownTarget),
        };

        Ok(target.published.keys().cloned().collect())
    }

    /// Connected peers publishing `path`, capped at 255 because the reply
    /// carries the count in a single byte.
    pub async fn seeders(&self, path: &str) -> Result<Vec<Seeder>, SeederListStatus> {
        let users = self.users.lock().await;

        let seeders: Vec<Seeder> = users
            .values()
            .filter(|r| r.published.contains_key(path))
            .filter_map(|r| {
                r.session.as_ref().map(|s| Seeder {
                    ip: s.ip,
                    port: s.port,
                    path: path.to_string(),
                })
            })
            .take(255)
            .collect();

        if seeders.is_empty() {
            return Err(SeederListStatus::NoSeeders);
        }

        Ok(seeders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip() -> IpAddr {
        "10.0.0.5".parse().unwrap()
    }

    #[tokio::test]
    async fn register_enforces_name_uniqueness() {
        let d = Directory::new();

        assert_eq!(d.register("alice").await, RegisterStatus::Ok);
        assert_eq!(d.register("alice").await, RegisterStatus::NameInUse);
    }

    #[tokio::test]
    async fn publish_requires_session() {
        let d = Directory::new();

        d.register("u").await;

        assert_eq!(
            d.publish("u", "/tmp/x", "the x file").await,
            PublishStatus::NotConnected
        );
    }

    #[tokio::test]
    async fn duplicate_publish_rejected() {
        let d = Directory::new();

        d.register("u").await;
        d.connect("u", ip(), 4000).await;

        assert_eq!(d.publish("u", "/tmp/x", "d").await, PublishStatus::Ok);
        assert_eq!(
            d.publish("u", "/tmp/x", "d2").await,
            PublishStatus::AlreadyPublished
        );
    }

    #[tokio::test]
    async fn list_users_returns_only_connected() {
        let d = Directory::new();

        for name in &["a", "b", "c"] {
            d.register(name).await;
        }
        d.connect("a", ip(), 4000).await;
        d.connect("b", ip(), 4001).await;

        let mut names: Vec<String> = d
            .list_users("a")
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.name)
            .collect();
        names.sort();

        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn list_users_requires_caller_session() {
        let d = Directory::new();

        d.register("a").await;

        assert_eq!(d.list_users("a").await, Err(ListUsersStatus::NotConnected));
        assert_eq!(d.list_users("z").await, Err(ListUsersStatus::UnknownUser));
    }

    #[tokio::test]
    async fn content_survives_disconnect() {
        let d = Directory::new();

        d.register("u1").await;
        d.connect("u1", ip(), 4000).await;
        d.publish("u1", "/tmp/x", "d").await;
        d.disconnect("u1").await;

        d.register("u2").await;
        d.connect("u2", ip(), 4001).await;

        assert_eq!(
            d.list_content("u2", "u1").await.unwrap(),
            vec!["/tmp/x".to_string()]
        );
    }

    #[tokio::test]
    async fn unregister_cascades() {
        let d = Directory::new();

        d.register("u1").await;
        d.connect("u1", ip(), 4000).await;
        d.publish("u1", "/tmp/x", "d").await;

        d.register("u2").await;
        d.connect("u2", ip(), 4001).await;

        assert_eq!(d.unregister("u1").await, UnregisterStatus::Ok);
        assert_eq!(
            d.list_content("u2", "u1").await,
            Err(ListContentStatus::UnknownTarget)
        );
    }

    #[tokio::test]
    async fn disconnect_requires_session() {
        let d = Directory::new();

        d.register("u").await;

        assert_eq!(d.disconnect("u").await, DisconnectStatus::NotConnected);
        assert_eq!(d.disconnect("ghost").await, DisconnectStatus::UnknownUser);

        d.connect("u", ip(), 4000).await;
        assert_eq!(d.disconnect("u").await, DisconnectStatus::Ok);
    }

    #[tokio::test]
    async fn concurrent_connect_admits_exactly_one() {
        use std::sync::Arc;

        let d = Arc::new(Directory::new());
        d.register("u").await;

        let d1 = d.clone();
        let d2 = d.clone();
        let (a, b) = tokio::join!(
            tokio::spawn(async move { d1.connect("u", "10.0.0.5".parse().unwrap(), 4000).await }),
            tokio::spawn(async move { d2.connect("u", "10.0.0.6".parse().unwrap(), 4001).await }),
        );

        let results = [a.unwrap(), b.unwrap()];

        assert_eq!(
            results
                .iter()
                .filter(|s| **s == ConnectStatus::Ok)
                .count(),
            1
        );
        assert_eq!(
            results
                .iter()
                .filter(|s| **s == ConnectStatus::AlreadyConnected)
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn seeders_are_connected_publishers_only() {
        let d = Directory::new();

        d.register("a").await;
        d.connect("a", ip(), 4000).await;
        d.publish("a", "/data/big", "d").await;

        d.register("b").await;
        d.connect("b", ip(), 4001).await;
        d.publish("b", "/data/big", "d").await;
        d.disconnect("b").await;

        let seeders = d.seeders("/data/big").await.unwrap();

        assert_eq!(seeders.len(), 1);
        assert_eq!(seeders[0].port, 4000);

        assert_eq!(
            d.seeders("/data/other").await,
            Err(SeederListStatus::NoSeeders)
        );
    }
}
