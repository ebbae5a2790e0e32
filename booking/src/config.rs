#[derive(Clone, Debug)]
pub struct BookingConfig {
    /// Database connection string.
    pub database_url: String,

    // =========================
    // Collaborators
    // =========================
    /// Payment gateway base url and the shared secret that signs
    /// `amount|bill_code` on every QR request.
    pub paygate_url: String,
    pub paygate_secret: String,

    /// Catalog collaborator base url (price rules in, slot sync out).
    pub catalog_url: String,

    // =========================
    // Listen addresses
    // =========================
    /// Client push channel (WebSocket).
    pub push_listen_addr: String,
    /// Gateway notification feed (WebSocket).
    pub feed_listen_addr: String,
    /// Booking command channel (WebSocket).
    pub booking_listen_addr: String,

    // =========================
    // Reservation lifecycle
    // =========================
    /// How long an unpaid reservation holds its buckets before the
    /// expiry watcher reverts it.
    pub reservation_timeout_ms: u64,

    /// Added on top of the timeout window for the pending-transaction
    /// TTL, so the watcher always finds the record it must compensate.
    pub pending_ttl_margin_ms: u64,

    /// Cadence of the past-bucket lock sweep.
    pub sweep_interval_ms: u64,

    /// How long an undelivered notification is parked for replay.
    pub notify_ttl_ms: u64,

    /// Bucket width of the availability grid, in minutes.
    pub bucket_minutes: u32,
}

impl BookingConfig {
    pub fn from_env() -> Self {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://booking_dev.db".to_string());
        let paygate_url = std::env::var("PAYGATE_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:9301".to_string());
        let paygate_secret =
            std::env::var("PAYGATE_SECRET").unwrap_or_else(|_| "dev-secret".to_string());
        let catalog_url = std::env::var("CATALOG_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:9302".to_string());

        Self {
            database_url,
            paygate_url,
            paygate_secret,
            catalog_url,

            push_listen_addr: "127.0.0.1:9310".to_string(),
            feed_listen_addr: "127.0.0.1:9311".to_string(),
            booking_listen_addr: "127.0.0.1:9312".to_string(),

            // Lifecycle defaults: a 5 minute payment window, swept every
            // 30 minutes, with a 1 minute pending-record margin.
            reservation_timeout_ms: 300_000,
            pending_ttl_margin_ms: 60_000,
            sweep_interval_ms: 1_800_000,
            notify_ttl_ms: 300_000,
            bucket_minutes: 30,
        }
    }

    /// TTL for pending transactions. Structurally longer than the timeout
    /// window: the expiry watcher must never miss the record it needs.
    pub fn pending_ttl_ms(&self) -> u64 {
        self.reservation_timeout_ms + self.pending_ttl_margin_ms
    }
}
