use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use crate::message::Message;
use crate::network::Connection;

/// A decoded message paired with the connection it arrived on.
///
/// On the accepting side `owner` is a shared handle to the originating
/// connection, used to tell clients apart (per-sender output files, log
/// lines). On the initiating side the only connection is implicit, so
/// `owner` is `None`.
#[derive(Clone)]
pub struct OwnedMessage {
    pub owner: Option<Arc<Connection>>,
    pub message: Message,
}

impl OwnedMessage {
    pub fn new(owner: Option<Arc<Connection>>, message: Message) -> OwnedMessage {
        OwnedMessage { owner, message }
    }

    /// Stable id of the sending connection, if one is attached.
    pub fn sender_id(&self) -> Option<Uuid> {
        self.owner.as_ref().map(|connection| connection.id())
    }
}

impl fmt::Debug for OwnedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnedMessage")
            .field("sender", &self.sender_id())
            .field("message", &self.message)
            .finish()
    }
}
