//! Interactive console on standard input.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::console::commands::parse_line;
use crate::console::dispatch::{execute, render, CommandOutput};
use crate::orchestrator::Orchestrator;

/// Read commands from stdin until `exit`, end of input, or `shutdown`.
///
/// `exit` cancels `shutdown` so the rest of the process winds down too.
/// End of input only stops the console.
pub async fn run_console(orchestrator: Arc<Orchestrator>, shutdown: CancellationToken) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    info!("console ready; type help for commands");

    loop {
        let line = tokio::select! {
            () = shutdown.cancelled() => break,
            next = lines.next_line() => match next {
                Ok(Some(line)) => line,
                Ok(None) => {
                    debug!("stdin closed; console stopped");
                    break;
                }
                Err(err) => {
                    warn!(%err, "failed to read stdin; console stopped");
                    break;
                }
            },
        };

        let command = match parse_line(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(err) => {
                eprintln!("{err}");
                continue;
            }
        };

        match execute(&orchestrator, command).await {
            Ok(output) => {
                for text in render(&output) {
                    println!("{text}");
                }
                if output == CommandOutput::Exit {
                    shutdown.cancel();
                    break;
                }
            }
            Err(err) => eprintln!("error: {err}"),
        }
    }
}
