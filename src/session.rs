//! Liveness sessions for dynamic registrations.
//!
//! A registrant keeps a [`LivenessSession`] for as long as it wants its
//! analyzers to stay in the tree. The aggregator holds the matching
//! [`SessionWatch`] and removes the registration once the session ends,
//! either explicitly or by being dropped.

use tokio::sync::watch;

/// Owner side of a liveness session.
#[derive(Debug)]
pub struct LivenessSession {
    id: String,
    alive: watch::Sender<bool>,
}

/// Observer side, resolved when the session ends.
#[derive(Debug, Clone)]
pub struct SessionWatch {
    id: String,
    alive: watch::Receiver<bool>,
}

impl LivenessSession {
    /// Open a session and return it with its watch.
    pub fn new(id: impl Into<String>) -> (Self, SessionWatch) {
        let id = id.into();
        let (tx, rx) = watch::channel(true);
        (
            Self {
                id: id.clone(),
                alive: tx,
            },
            SessionWatch { id, alive: rx },
        )
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// End the session now. Dropping it has the same effect.
    pub fn end(self) {}
}

impl Drop for LivenessSession {
    fn drop(&mut self) {
        let _ = self.alive.send(false);
    }
}

impl SessionWatch {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// True once the session has ended.
    pub fn is_ended(&self) -> bool {
        !*self.alive.borrow()
    }

    /// Wait until the session ends.
    pub async fn ended(mut self) {
        // An error means the sender is gone, which also ends the session.
        let _ = self.alive.wait_for(|alive| !alive).await;
    }
}
