use seqatlas_core::ServerMsg;

/// Event delivered from the channel thread to the UI loop.
#[derive(Debug, Clone)]
pub struct Incoming {
    pub endpoint: String,
    pub kind: IncomingKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IncomingKind {
    Connected,
    Disconnected,
    Reconnecting { attempt: u32 },
    GaveUp,
    Message(ServerMsg),
    Error(String),
}

impl Incoming {
    pub fn connected(endpoint: String) -> Self {
        Self {
            endpoint,
            kind: IncomingKind::Connected,
        }
    }

    pub fn disconnected(endpoint: String) -> Self {
        Self {
            endpoint,
            kind: IncomingKind::Disconnected,
        }
    }

    pub fn reconnecting(endpoint: String, attempt: u32) -> Self {
        Self {
            endpoint,
            kind: IncomingKind::Reconnecting { attempt },
        }
    }

    pub fn gave_up(endpoint: String) -> Self {
        Self {
            endpoint,
            kind: IncomingKind::GaveUp,
        }
    }

    pub fn message(endpoint: String, msg: ServerMsg) -> Self {
        Self {
            endpoint,
            kind: IncomingKind::Message(msg),
        }
    }

    pub fn error(endpoint: String, msg: String) -> Self {
        Self {
            endpoint,
            kind: IncomingKind::Error(msg),
        }
    }
}
