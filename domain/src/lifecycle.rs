//! Lifecycle states for the client bootstrap and for socket sessions.
//!
//! ```text
//! NotStarted → Starting → AwaitingListen → SocketConnecting → Authenticating → Ready
//!      └──────────┴─────────────┴──────────────────┴─────────────────┴──────────┴──→ Failed | Closed
//! ```
//!
//! `Failed` and `Closed` are terminal.

use std::fmt;

/// Phase of the client bootstrap state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BootstrapPhase {
    NotStarted,
    Starting,
    AwaitingListen,
    SocketConnecting,
    Authenticating,
    Ready,
    Closed,
    Failed,
}

impl BootstrapPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, BootstrapPhase::Closed | BootstrapPhase::Failed)
    }

    /// Whether waiters for readiness can stop waiting.
    pub fn is_settled(self) -> bool {
        matches!(self, BootstrapPhase::Ready) || self.is_terminal()
    }

    /// Whether `self → next` is a legal transition.
    pub fn can_advance_to(self, next: BootstrapPhase) -> bool {
        use BootstrapPhase::*;

        if self.is_terminal() {
            return false;
        }
        matches!(
            (self, next),
            (NotStarted, Starting)
                | (Starting, AwaitingListen)
                | (AwaitingListen, SocketConnecting)
                | (SocketConnecting, Authenticating)
                | (Authenticating, Ready)
                | (_, Failed)
                | (_, Closed)
        )
    }
}

impl fmt::Display for BootstrapPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BootstrapPhase::NotStarted => "not-started",
            BootstrapPhase::Starting => "starting",
            BootstrapPhase::AwaitingListen => "awaiting-listen",
            BootstrapPhase::SocketConnecting => "socket-connecting",
            BootstrapPhase::Authenticating => "authenticating",
            BootstrapPhase::Ready => "ready",
            BootstrapPhase::Closed => "closed",
            BootstrapPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// State of a single socket session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connected,
    Authenticated,
    Closed,
}

impl SessionState {
    pub fn is_closed(self) -> bool {
        self == SessionState::Closed
    }
}
