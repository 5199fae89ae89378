//! Per-connection session state.
//!
//! ```text
//! Connecting ──activate──▶ Active ──close──▶ Closed
//!                            │
//!                            └──heartbeat──▶ TimedOut ──▶ Closed
//! ```
//!
//! A session never owns the socket. It holds the sending half of an
//! unbounded channel; the connection's writer task drains the other half.

use tokio::sync::mpsc::UnboundedSender;

use crate::player::SessionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Active,
    TimedOut,
    Closed,
}

/// What the writer task puts on the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Text(String),
    Ping,
    Close,
}

#[derive(Debug)]
pub struct Session {
    id: SessionId,
    state: SessionState,
    missed_pings: u32,
    tx: UnboundedSender<Outbound>,
}

impl Session {
    pub fn new(id: SessionId, tx: UnboundedSender<Outbound>) -> Self {
        Self {
            id,
            state: SessionState::Connecting,
            missed_pings: 0,
            tx,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }

    pub fn missed_pings(&self) -> u32 {
        self.missed_pings
    }

    /// Connecting → Active. Returns false from any other state.
    pub fn activate(&mut self) -> bool {
        if self.state != SessionState::Connecting {
            return false;
        }
        self.state = SessionState::Active;
        true
    }

    /// Any inbound frame proves the peer is alive.
    pub fn note_traffic(&mut self) {
        self.missed_pings = 0;
    }

    /// Count one unanswered ping and send the next.
    pub fn ping(&mut self) {
        self.missed_pings += 1;
        self.send(Outbound::Ping);
    }

    pub fn time_out(&mut self) {
        if self.state == SessionState::Active || self.state == SessionState::Connecting {
            self.state = SessionState::TimedOut;
        }
    }

    /// Ask the writer to close the socket. Later sends are dropped.
    pub fn close(&mut self) {
        if self.state != SessionState::Closed {
            self.send(Outbound::Close);
            self.state = SessionState::Closed;
        }
    }

    /// Queue a frame. Returns false once the writer is gone or the
    /// session is closed; callers skip such sessions.
    pub fn send(&self, frame: Outbound) -> bool {
        if self.state == SessionState::Closed {
            return false;
        }
        self.tx.send(frame).is_ok()
    }

    pub fn send_text(&self, text: impl Into<String>) -> bool {
        self.send(Outbound::Text(text.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn lifecycle() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut s = Session::new(7, tx);
        assert_eq!(s.state(), SessionState::Connecting);
        assert!(s.activate());
        assert!(!s.activate());
        assert!(s.is_active());

        s.ping();
        s.ping();
        assert_eq!(s.missed_pings(), 2);
        s.note_traffic();
        assert_eq!(s.missed_pings(), 0);

        s.time_out();
        assert_eq!(s.state(), SessionState::TimedOut);
        s.close();
        assert!(!s.send_text("late"));

        assert_eq!(rx.try_recv().unwrap(), Outbound::Ping);
        assert_eq!(rx.try_recv().unwrap(), Outbound::Ping);
        assert_eq!(rx.try_recv().unwrap(), Outbound::Close);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn dropped_writer_fails_sends() {
        let (tx, rx) = mpsc::unbounded_channel();
        let s = Session::new(1, tx);
        drop(rx);
        assert!(!s.send_text("hello"));
    }
}
