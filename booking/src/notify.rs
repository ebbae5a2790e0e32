//! Notification delivery to connected clients.
//!
//! The registry is lifecycle-scoped: constructed once at service start and
//! injected into whatever produces events. Delivery to a live session is
//! fire-and-forget (no acknowledgement, no retry). Without a live session
//! the envelope is parked with a TTL and replayed at most once when the
//! key connects. Only the most recent undelivered envelope per key is
//! retained; a newer event overwrites an older parked one.

use std::collections::HashMap;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;

/// Payload pushed over the client channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub key: String,
    pub result_code: String,
    pub description: String,
}

struct Parked {
    envelope: Envelope,
    expires_at_ms: u64,
}

pub struct Notifier {
    ttl_ms: u64,
    live: Mutex<HashMap<String, mpsc::Sender<Envelope>>>,
    parked: Mutex<HashMap<String, Parked>>,
}

impl Notifier {
    pub fn new(ttl_ms: u64) -> Self {
        Self {
            ttl_ms,
            live: Mutex::new(HashMap::new()),
            parked: Mutex::new(HashMap::new()),
        }
    }

    /// Register a session under `key` and replay at most one parked
    /// envelope. A previous session under the same key is displaced.
    pub fn connect(&self, key: &str, now_ms: u64) -> mpsc::Receiver<Envelope> {
        let (tx, rx) = mpsc::channel(16);

        if let Some(p) = self.parked.lock().remove(key) {
            if now_ms < p.expires_at_ms {
                let _ = tx.try_send(p.envelope);
                debug!(key, "parked envelope replayed on connect");
            }
        }

        self.live.lock().insert(key.to_string(), tx);
        rx
    }

    pub fn disconnect(&self, key: &str) {
        self.live.lock().remove(key);
    }

    /// Deliver to the live session if one exists, otherwise park with TTL.
    pub fn push(&self, key: &str, envelope: Envelope, now_ms: u64) {
        let sent = {
            let mut live = self.live.lock();
            match live.get(key) {
                Some(tx) => match tx.try_send(envelope.clone()) {
                    Ok(()) => true,
                    Err(_) => {
                        // Dead or saturated session; drop the registration.
                        live.remove(key);
                        false
                    }
                },
                None => false,
            }
        };

        if !sent {
            debug!(key, "no live session; envelope parked");
            self.parked.lock().insert(
                key.to_string(),
                Parked {
                    envelope,
                    expires_at_ms: now_ms + self.ttl_ms,
                },
            );
        }
    }

    pub fn purge_expired(&self, now_ms: u64) -> usize {
        let mut parked = self.parked.lock();
        let before = parked.len();
        parked.retain(|_, p| now_ms < p.expires_at_ms);
        before - parked.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(code: &str) -> Envelope {
        Envelope {
            key: "order-1".to_string(),
            result_code: code.to_string(),
            description: String::new(),
        }
    }

    #[tokio::test]
    async fn live_session_receives_immediately() {
        let notifier = Notifier::new(5_000);
        let mut rx = notifier.connect("order-1", 0);

        notifier.push("order-1", env("PAID"), 100);

        assert_eq!(rx.try_recv().unwrap().result_code, "PAID");
    }

    #[tokio::test]
    async fn offline_push_is_parked_and_replayed_once() {
        let notifier = Notifier::new(5_000);
        notifier.push("order-1", env("EXPIRED"), 100);

        let mut rx = notifier.connect("order-1", 200);
        assert_eq!(rx.try_recv().unwrap().result_code, "EXPIRED");

        // A second connect finds nothing; replay deleted the envelope.
        notifier.disconnect("order-1");
        let mut rx2 = notifier.connect("order-1", 300);
        assert!(rx2.try_recv().is_err());
    }

    #[tokio::test]
    async fn newer_parked_envelope_overwrites_older() {
        let notifier = Notifier::new(5_000);
        notifier.push("order-1", env("PAID"), 100);
        notifier.push("order-1", env("EXPIRED"), 200);

        let mut rx = notifier.connect("order-1", 300);
        assert_eq!(rx.try_recv().unwrap().result_code, "EXPIRED");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn parked_envelope_expires() {
        let notifier = Notifier::new(1_000);
        notifier.push("order-1", env("PAID"), 100);

        let mut rx = notifier.connect("order-1", 2_000);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn dead_session_falls_back_to_parking() {
        let notifier = Notifier::new(5_000);
        let rx = notifier.connect("order-1", 0);
        drop(rx);

        notifier.push("order-1", env("PAID"), 100);

        let mut rx = notifier.connect("order-1", 200);
        assert_eq!(rx.try_recv().unwrap().result_code, "PAID");
    }

    #[tokio::test]
    async fn purge_drops_expired_parked_envelopes() {
        let notifier = Notifier::new(1_000);
        notifier.push("order-1", env("PAID"), 100);
        notifier.push("order-2", env("PAID"), 100);

        assert_eq!(notifier.purge_expired(5_000), 2);
    }
}
