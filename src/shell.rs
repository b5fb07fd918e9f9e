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

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::select;

use crate::error::PeerdexResult;
use crate::rpc::Client;

/// Interactive command loop.
///
/// Runs until QUIT, end of input, or a termination signal. Whatever the
/// exit path, a held session is closed with a quiet best-effort DISCONNECT
/// so the directory does not keep a dead endpoint on its books.
pub async fn run(mut client: Client) -> PeerdexResult<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        prompt()?;

        select! {
            _ = shutdown_signal() => break,
            line = lines.next_line() => {
                match line? {
                    Some(line) => {
                        if !dispatch(&mut client, &line).await {
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }

    client.shutdown().await;

    println!();
    println!("+++ FINISHED +++");

    Ok(())
}

fn prompt() -> PeerdexResult<()> {
    print!("c> ");
    std::io::stdout().flush()?;

    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut term = match signal(SignalKind::terminate()) {
            Ok(term) => term,
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };

        select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = term.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

/// Parse and run one command line. Returns false when the loop should end.
async fn dispatch(client: &mut Client, line: &str) -> bool {
    let tokens: Vec<&str> = line.split_whitespace().collect();

    let verb = match tokens.first() {
        Some(v) => v.to_uppercase(),
        None => return true,
    };

    match verb.as_str() {
        "REGISTER" => {
            if tokens.len() == 2 {
                client.register(tokens[1]).await;
            } else {
                println!("Syntax error. Usage: REGISTER <userName>");
            }
        }

        "UNREGISTER" => {
            if tokens.len() == 2 {
                client.unregister(tokens[1]).await;
            } else {
                println!("Syntax error. Usage: UNREGISTER <userName>");
            }
        }

        "CONNECT" => {
            if tokens.len() == 2 {
                client.connect(tokens[1]).await;
            } else {
                println!("Syntax error. Usage: CONNECT <userName>");
            }
        }

        "DISCONNECT" => {
            if tokens.len() == 2 {
                client.disconnect(tokens[1]).await;
            } else {
                println!("Syntax error. Usage: DISCONNECT <userName>");
            }
        }

        "PUBLISH" => {
            if tokens.len() >= 3 {
                let description = tokens[2..].join(" ");
                client.publish(tokens[1], &description).await;
            } else {
                println!("Syntax error. Usage: PUBLISH <fileName> <description>");
            }
        }

        "DELETE" => {
            if tokens.len() == 2 {
                client.delete(tokens[1]).await;
            } else {
                println!("Syntax error. Usage: DELETE <fileName>");
            }
        }

        "LIST_USERS" => {
            if tokens.len() == 1 {
                client.list_users().await;
            } else {
                println!("Syntax error. Use: LIST_USERS");
            }
        }

        "LIST_CONTENT" => match tokens.len() {
            // Without an argument, list the current user's own content.
            1 => match client.connected_user().map(str::to_string) {
                Some(user) => {
                    client.list_content(&user).await;
                }
                None => println!("c> LIST_CONTENT FAIL, USER NOT CONNECTED"),
            },
            2 => {
                client.list_content(tokens[1]).await;
            }
            _ => println!("Syntax error. Usage: LIST_CONTENT <userName>"),
        },

        "GET_FILE" => {
            if tokens.len() == 4 {
                client.get_file(tokens[1], tokens[2], tokens[3]).await;
            } else {
                println!(
                    "Syntax error. Usage: GET_FILE <userName> <remote_fileName> <local_fileName>"
                );
            }
        }

        "GET_MULTIFILE" => {
            if tokens.len() == 3 {
                client.get_multifile(tokens[1], tokens[2]).await;
            } else {
                println!(
                    "Syntax error. Usage: GET_MULTIFILE <remote_fileName> <local_fileName>"
                );
            }
        }

        "HELP" => {
            println!("Commands:");
            println!("\tREGISTER <userName>");
            println!("\tUNREGISTER <userName>");
            println!("\tCONNECT <userName>");
            println!("\tDISCONNECT <userName>");
            println!("\tPUBLISH <fileName> <description>");
            println!("\tDELETE <fileName>");
            println!("\tLIST_USERS");
            println!("\tLIST_CONTENT <userName>");
            println!("\tGET_FILE <userName> <remote_fileName> <local_fileName>");
            println!("\tGET_MULTIFILE <remote_fileName> <local_fileName>");
            println!("\tQUIT");
        }

        "QUIT" => {
            if tokens.len() == 1 {
                return false;
            }

            println!("Syntax error. Use: QUIT");
        }

        other => println!("Error: command {} not valid.", other),
    }

    true
}
