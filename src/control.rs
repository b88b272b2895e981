// src/control.rs

//! Interactive control while watching: Ctrl-C, plus optional stdin commands.

use std::io::BufRead;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::engine::PauseLatch;

/// A command typed on stdin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    TogglePause,
    Quit,
    Help,
}

/// Parse one stdin line. Blank lines are ignored.
pub fn parse_command(line: &str) -> Option<Control> {
    match line.trim().to_lowercase().as_str() {
        "" => None,
        "p" | "pause" => Some(Control::TogglePause),
        "q" | "quit" | "exit" => Some(Control::Quit),
        _ => Some(Control::Help),
    }
}

/// Read stdin lines on a plain thread.
///
/// A blocking read inside the Tokio blocking pool would keep the runtime
/// from shutting down until the next newline.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    let spawned = std::thread::Builder::new()
        .name("tdaemon-stdin".to_string())
        .spawn(move || forward_lines(std::io::stdin().lock(), &tx));
    if let Err(err) = spawned {
        warn!("could not read commands from stdin: {err}");
    }
    rx
}

/// Send each line of `reader` to `tx` until EOF, a read error or a closed
/// receiver.
fn forward_lines(reader: impl BufRead, tx: &mpsc::UnboundedSender<String>) {
    for line in reader.lines() {
        let Ok(line) = line else { break };
        if tx.send(line).is_err() {
            break;
        }
    }
}

/// Block until Ctrl-C or a `q` command; `p` toggles `latch` meanwhile.
pub async fn wait_for_exit(latch: PauseLatch, interactive: bool) {
    let mut lines = if interactive {
        info!("commands: p = pause/resume, q = quit");
        Some(spawn_stdin_reader())
    } else {
        None
    };

    loop {
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                match res {
                    Ok(()) => info!("interrupt received; shutting down"),
                    Err(e) => warn!("failed to listen for Ctrl+C: {e}"),
                }
                return;
            }
            Some(line) = next_line(&mut lines) => {
                match parse_command(&line) {
                    Some(Control::TogglePause) => {
                        latch.toggle();
                    }
                    Some(Control::Quit) => {
                        info!("quit requested; shutting down");
                        return;
                    }
                    Some(Control::Help) => info!("commands: p = pause/resume, q = quit"),
                    None => {}
                }
            }
        }
    }
}

async fn next_line(lines: &mut Option<mpsc::UnboundedReceiver<String>>) -> Option<String> {
    match lines {
        Some(rx) => {
            let line = rx.recv().await;
            if line.is_none() {
                // stdin closed; keep waiting on Ctrl-C only.
                *lines = None;
            }
            line
        }
        None => std::future::pending().await,
    }
}
