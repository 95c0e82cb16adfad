//! WebSocket server
//!
//! Two listeners share one [`AppState`]: the disciple listener feeds the
//! session manager, the optional admin listener feeds the command dispatcher.

pub mod http;
pub mod protocol;
pub mod websocket;

pub use http::{run, serve, AppState};
pub use protocol::Envelope;

/// Which side of the protocol a listener serves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Disciple,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disciple => "disciple",
            Self::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
