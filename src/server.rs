//! The WebSocket transport: a `ChromeDebug` worker accepting connections
//! and one pump thread per client.
//!
//! Connection threads interleave socket reads (under a short timeout) with
//! draining the session's outbound queue, so events produced by traced
//! threads reach the client without a dedicated writer thread. The worker
//! never blocks on the traced program; it only blocks on transport I/O.

use std::io;
use std::net::{TcpListener, TcpStream};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tungstenite::{Message, WebSocket};

use crate::agent::Agent;
use crate::session::Session;
use crate::tracing::WORKER_THREAD_NAME;

/// Poll interval for interleaving reads with queued outbound events.
const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Binds the configured endpoint and spawns the accept worker.
pub(crate) fn spawn(agent: Arc<Agent>) -> io::Result<JoinHandle<()>> {
    let listener = TcpListener::bind(agent.config().bind_addr.as_str())?;
    thread::Builder::new()
        .name(WORKER_THREAD_NAME.to_string())
        .spawn(move || serve(&agent, &listener))
}

fn serve(agent: &Arc<Agent>, listener: &TcpListener) {
    match listener.local_addr() {
        Ok(addr) => {
            log::info!("navigate to chrome://devtools/devtools.html?ws={addr}");
        }
        Err(err) => log::debug!("listener address unavailable: {err}"),
    }
    let mut connection_id = 0u64;
    for stream in listener.incoming() {
        let stream = match stream {
            Ok(stream) => stream,
            Err(err) => {
                log::error!("accept failed: {err}");
                continue;
            }
        };
        connection_id += 1;
        let agent = agent.clone();
        let name = format!("{WORKER_THREAD_NAME}-{connection_id}");
        let spawned = thread::Builder::new().name(name).spawn(move || {
            if let Err(err) = connection(&agent, stream) {
                log::debug!("connection closed: {err}");
            }
        });
        if let Err(err) = spawned {
            log::error!("could not spawn connection thread: {err}");
        }
    }
}

fn connection(agent: &Arc<Agent>, stream: TcpStream) -> tungstenite::Result<()> {
    let mut ws = match tungstenite::accept(stream) {
        Ok(ws) => ws,
        Err(err) => {
            log::debug!("websocket handshake failed: {err}");
            return Ok(());
        }
    };
    ws.get_ref().set_read_timeout(Some(READ_TIMEOUT))?;

    let (outgoing, queued) = mpsc::channel();
    let session = Arc::new(Session::new(outgoing));
    agent.broker().register(session.clone());
    log::debug!("session {} connected", session.id());

    let result = pump(agent, &session, &mut ws, &queued);

    agent.broker().unregister(&session);
    log::debug!("session {} disconnected", session.id());
    let _ = ws.close(None);
    result
}

fn pump(
    agent: &Arc<Agent>,
    session: &Arc<Session>,
    ws: &mut WebSocket<TcpStream>,
    queued: &mpsc::Receiver<String>,
) -> tungstenite::Result<()> {
    loop {
        while let Ok(frame) = queued.try_recv() {
            ws.send(Message::Text(frame))?;
        }
        match ws.read() {
            Ok(Message::Text(text)) => {
                if let Some(response) = session.handle_message(agent, &text) {
                    // Through the queue, behind any events the dispatch
                    // produced; the drain above sends them in order.
                    session.send_raw(response);
                }
            }
            Ok(Message::Close(_)) => return Ok(()),
            Ok(_) => {}
            Err(tungstenite::Error::Io(err))
                if matches!(
                    err.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                ) => {}
            Err(
                tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed,
            ) => return Ok(()),
            Err(err) => return Err(err),
        }
    }
}
