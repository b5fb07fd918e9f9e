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

use std::net::{IpAddr, SocketAddr};

use clap::Parser;

use peerdex::config::Config;
use peerdex::rpc::Client;
use peerdex::{shell, timestamp};

/// Interactive client for the peerdex file-sharing network.
#[derive(Parser, Debug)]
#[clap(name = "peerdex")]
struct Args {
    /// Directory server address
    #[clap(short = 's', value_parser)]
    server: IpAddr,

    /// Directory server port
    #[clap(short = 'p', value_parser = clap::value_parser!(u16).range(1024..))]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = Args::parse();

    let config = Config::load()?;

    let clock = timestamp::from_config(&config.time_service);

    let client = Client::new(
        SocketAddr::new(args.server, args.port),
        clock,
        config.transfer.segment_dir,
    );

    shell::run(client).await?;

    Ok(())
}
