//! Blocking JSON GET shared by every outbound lookup.

use serde::de::DeserializeOwned;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

const USER_AGENT: &str = concat!("device-probe/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HttpError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("HTTP status {0}")]
    Status(u16),
    #[error("invalid JSON body: {0}")]
    Decode(String),
}

impl From<ureq::Error> for HttpError {
    fn from(e: ureq::Error) -> Self {
        match e {
            ureq::Error::Status(code, _) => Self::Status(code),
            ureq::Error::Transport(t) => Self::Transport(t.to_string()),
        }
    }
}

/// Resolve `netloc` on a side thread, giving up at `deadline`.
///
/// The agent timeout does not cover the system resolver, so name lookup gets
/// its own bound. A lookup that is abandoned keeps running on its thread until
/// the resolver returns.
fn resolve_until(netloc: &str, deadline: Instant) -> io::Result<Vec<SocketAddr>> {
    let remaining = deadline.saturating_duration_since(Instant::now());
    if remaining.is_zero() {
        return Err(io::Error::new(io::ErrorKind::TimedOut, format!("resolving {}", netloc)));
    }

    let (tx, rx) = mpsc::channel();
    let target = netloc.to_string();
    thread::spawn(move || {
        let _ = tx.send(target.to_socket_addrs().map(|addrs| addrs.collect::<Vec<_>>()));
    });

    match rx.recv_timeout(remaining) {
        Ok(addrs) => addrs,
        Err(RecvTimeoutError::Timeout) => Err(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("resolving {} timed out", netloc),
        )),
        Err(RecvTimeoutError::Disconnected) => Err(io::Error::other(format!("resolving {} failed", netloc))),
    }
}

/// GET `url` and decode the body as JSON.
///
/// The agent is built per call with `budget` as its overall timeout and a
/// resolver bounded by the same deadline, so the call returns within the
/// budget even if the caller has already stopped waiting for it.
pub fn get_json<T: DeserializeOwned>(url: &str, budget: Duration) -> Result<T, HttpError> {
    let deadline = Instant::now() + budget;
    let agent = ureq::AgentBuilder::new()
        .timeout(budget)
        .resolver(move |netloc: &str| resolve_until(netloc, deadline))
        .user_agent(USER_AGENT)
        .build();

    let response = agent.get(url).call()?;
    response
        .into_json()
        .map_err(|e| HttpError::Decode(e.to_string()))
}
