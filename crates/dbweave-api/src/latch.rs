//! Session-expired latch shared by the GraphQL client and the event socket.
//!
//! Once tripped, every request short-circuits with
//! [`Error::SessionExpired`](crate::Error::SessionExpired) and the socket
//! stops reconnecting, until the latch is explicitly cleared (typically
//! after a successful re-authentication).

use tokio::sync::watch;

/// Cloneable handle to a single boolean "session expired" flag.
#[derive(Debug, Clone)]
pub struct SessionExpiredLatch {
    tx: watch::Sender<bool>,
}

impl SessionExpiredLatch {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// Mark the session as expired. Returns `true` if this call tripped it.
    pub fn trip(&self) -> bool {
        let tripped = self.tx.send_if_modified(|expired| {
            let changed = !*expired;
            *expired = true;
            changed
        });
        if tripped {
            tracing::warn!("session expired, blocking further requests");
        }
        tripped
    }

    /// Re-open the latch.
    pub fn clear(&self) {
        self.tx.send_if_modified(|expired| std::mem::replace(expired, false));
    }

    pub fn is_tripped(&self) -> bool {
        *self.tx.borrow()
    }

    /// Watch the latch state.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for SessionExpiredLatch {
    fn default() -> Self {
        Self::new()
    }
}
