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

#[macro_use]
extern crate log;

use std::net::IpAddr;
use std::sync::Arc;

use clap::Parser;

use peerdex::directory::DirectoryServer;
use peerdex::store::Directory;

/// Directory server for the peerdex file-sharing network.
#[derive(Parser, Debug)]
#[clap(name = "peerdexd")]
struct Args {
    /// Address to bind the directory listener to
    #[clap(short = 's', value_parser)]
    server: IpAddr,

    /// Port to listen on
    #[clap(short = 'p', value_parser = clap::value_parser!(u16).range(1024..))]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = Args::parse();

    let store = Arc::new(Directory::new());

    let mut server = DirectoryServer::bind((args.server, args.port), store).await?;

    info!("Directory bound (addr = {}:{})", args.server, args.port);

    server.up().await?;

    Ok(())
}
