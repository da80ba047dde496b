//! Control-channel session adapter
//!
//! Carries already-decoded [`Event`]s and [`Command`]s between switch
//! control sessions and the engine as newline-delimited JSON over a Unix
//! socket. One connection is one switch's control session: the first event
//! must be `SwitchConnected`, and closing the socket synthesizes a
//! `SwitchDisconnected`. This is only the boundary transport; no protocol
//! codec lives here.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream, unix::OwnedWriteHalf};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::{debug, info, warn};

use crate::fdb::SwitchId;
use crate::messaging::{Command, CommandRouter, Event};

/// Accept switch control sessions on a Unix socket until the process
/// shuts down.
pub async fn serve(
    socket_path: PathBuf,
    events: UnboundedSender<Event>,
    commands: CommandRouter,
) -> Result<()> {
    // A stale socket from a previous run would fail the bind
    remove_stale_socket(&socket_path);

    let listener = UnixListener::bind(&socket_path)
        .with_context(|| format!("Failed to bind control socket {}", socket_path.display()))?;
    info!(socket = %socket_path.display(), "Listening for switch sessions");

    loop {
        let (stream, _) = listener
            .accept()
            .await
            .context("Control socket accept failed")?;
        tokio::spawn(handle_session(stream, events.clone(), commands.clone()));
    }
}

fn remove_stale_socket(path: &Path) {
    if path.exists() {
        let _ = std::fs::remove_file(path);
    }
}

/// One switch control session: decode inbound JSON lines into events,
/// ship the switch's commands back as JSON lines, and synthesize the
/// disconnect when the peer goes away.
async fn handle_session(
    stream: UnixStream,
    events: UnboundedSender<Event>,
    commands: CommandRouter,
) {
    let (read, write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();
    let mut write = Some(write);
    let mut session_switch: Option<SwitchId> = None;

    while let Ok(Some(line)) = lines.next_line().await {
        let event: Event = match serde_json::from_str(&line) {
            Ok(event) => event,
            Err(error) => {
                warn!(%error, "Ignoring malformed event");
                continue;
            }
        };

        if let Event::SwitchConnected { switch } = event {
            match session_switch {
                None => {
                    let (tx, rx) = unbounded_channel();
                    commands.register(switch, tx);
                    session_switch = Some(switch);
                    if let Some(write) = write.take() {
                        tokio::spawn(write_commands(write, rx));
                    }
                }
                Some(session_switch) if session_switch != switch => {
                    warn!(
                        session_switch,
                        switch, "Ignoring connect for a different switch on an open session"
                    );
                    continue;
                }
                Some(_) => {}
            }
        }

        if events.send(event).is_err() {
            // Engine is gone; nothing left to feed
            break;
        }
    }

    if let Some(switch) = session_switch {
        debug!(switch, "Session closed");
        commands.unregister(switch);
        let _ = events.send(Event::SwitchDisconnected { switch });
    }
}

async fn write_commands(mut write: OwnedWriteHalf, mut rx: UnboundedReceiver<Command>) {
    // Ends when the session is unregistered (sender dropped) or the peer
    // stops reading
    while let Some(command) = rx.recv().await {
        let mut line = match serde_json::to_string(&command) {
            Ok(line) => line,
            Err(error) => {
                warn!(%error, "Failed to encode command");
                continue;
            }
        };
        line.push('\n');
        if write.write_all(line.as_bytes()).await.is_err() {
            break;
        }
    }
}
