//! TCP control surface on the soft-AP.
//!
//! Serves one NDJSON client at a time on [`CONTROL_PORT`]. The listener
//! only exists while the engine reports the surface as serving; when the
//! radio leaves the control plane the listener and client are dropped, and
//! they come back once the access point is up again.

use std::io::{ErrorKind, Read, Write};
use std::net::{Ipv4Addr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, SyncSender};
use std::thread;
use std::time::Duration;

use deauther::comm::{parse_command, LineReader};
use deauther::defaults::CONTROL_PORT;
use deauther::protocol::{HostCommand, MsgBuffer};

/// Mirrors `AttackEngine::surface()`; written by the control loop.
pub static SERVING: AtomicBool = AtomicBool::new(false);

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Traffic from the control loop to the surface thread.
pub enum Outbound {
    Line(MsgBuffer),
    /// Acknowledged once every earlier line has been handed to the
    /// client socket, or dropped because there is no client.
    Flush(SyncSender<()>),
}

struct Session {
    stream: TcpStream,
    reader: LineReader,
}

pub fn surface_thread(cmd_tx: SyncSender<HostCommand>, out_rx: Receiver<Outbound>) {
    log::info!("Control surface thread started");
    let mut listener: Option<TcpListener> = None;
    let mut client: Option<Session> = None;

    loop {
        if !SERVING.load(Ordering::Acquire) {
            if listener.take().is_some() {
                log::info!("Control surface closed");
            }
            client = None;
            // Nobody to deliver to
            discard_pending(&out_rx);
            thread::sleep(POLL_INTERVAL);
            continue;
        }

        if listener.is_none() {
            listener = bind();
        }

        if let Some(ref l) = listener {
            match l.accept() {
                Ok((stream, peer)) => {
                    if stream.set_nonblocking(true).is_ok() {
                        log::info!("Control client connected: {}", peer);
                        client = Some(Session {
                            stream,
                            reader: LineReader::new(),
                        });
                    }
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => {}
                Err(e) => log::warn!("Control surface accept failed: {}", e),
            }
        }

        if let Some(ref mut session) = client {
            if !service(session, &cmd_tx, &out_rx) {
                log::info!("Control client disconnected");
                client = None;
            }
        } else {
            discard_pending(&out_rx);
        }

        thread::sleep(POLL_INTERVAL);
    }
}

/// Drop queued lines, releasing anyone waiting on a flush.
fn discard_pending(out_rx: &Receiver<Outbound>) {
    while let Ok(out) = out_rx.try_recv() {
        if let Outbound::Flush(ack) = out {
            let _ = ack.try_send(());
        }
    }
}

fn bind() -> Option<TcpListener> {
    let listener = match TcpListener::bind((Ipv4Addr::UNSPECIFIED, CONTROL_PORT)) {
        Ok(l) => l,
        Err(e) => {
            log::warn!("Control surface bind failed: {}", e);
            return None;
        }
    };
    if let Err(e) = listener.set_nonblocking(true) {
        log::warn!("Control surface nonblocking failed: {}", e);
        return None;
    }
    log::info!("Control surface listening on port {}", CONTROL_PORT);
    Some(listener)
}

/// Read pending commands and flush pending output. Returns false once the
/// client is gone.
fn service(session: &mut Session, cmd_tx: &SyncSender<HostCommand>, out_rx: &Receiver<Outbound>) -> bool {
    let mut buf = [0u8; 128];
    loop {
        match session.stream.read(&mut buf) {
            Ok(0) => return false,
            Ok(n) => {
                for &byte in &buf[..n] {
                    if let Some(line) = session.reader.feed(byte) {
                        match parse_command(line) {
                            Some(cmd) => {
                                let _ = cmd_tx.try_send(cmd);
                            }
                            None => log::warn!("Ignoring malformed command"),
                        }
                    }
                }
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => break,
            Err(_) => return false,
        }
    }

    while let Ok(out) = out_rx.try_recv() {
        match out {
            Outbound::Line(msg) => {
                if session.stream.write_all(&msg).is_err() {
                    return false;
                }
            }
            Outbound::Flush(ack) => {
                let _ = session.stream.flush();
                let _ = ack.try_send(());
            }
        }
    }
    true
}
