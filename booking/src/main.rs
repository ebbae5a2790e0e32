use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;

use adapters::catalog::CatalogClient;
use adapters::paygate::PayGateClient;
use booking::{
    config::BookingConfig,
    expiry::{ExpiryWatcher, expiry_channel, run_lock_sweep},
    gateway::{PaymentGateway, SlotMirror},
    notify::Notifier,
    order::store::OrderStore,
    order::store_sqlx::SqlxOrderStore,
    outbox::{CompensationWorker, outbox_channel},
    pending::PendingStore,
    reserve::ReservationCoordinator,
    settle::SettlementProcessor,
    ws::{run_booking_server, run_push_server, run_settlement_feed},
};
use common::logger::init_logger;
use grid::pricing::PricingSource;
use grid::store::GridStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logger("booking");

    tracing::info!("Starting booking service...");

    let cfg = BookingConfig::from_env();

    let catalog = Arc::new(CatalogClient::new(cfg.catalog_url.clone())?);
    let paygate = Arc::new(PayGateClient::new(
        cfg.paygate_url.clone(),
        cfg.paygate_secret.clone(),
    )?);

    let grids = Arc::new(GridStore::new(
        catalog.clone() as Arc<dyn PricingSource>,
        cfg.bucket_minutes,
    ));
    let orders: Arc<dyn OrderStore> = Arc::new(SqlxOrderStore::new(&cfg.database_url).await?);
    let pending = Arc::new(PendingStore::new());
    let notify = Arc::new(Notifier::new(cfg.notify_ttl_ms));

    // Failed compensating calls are retried off the request path.
    let (outbox, outbox_rx) = outbox_channel(1_024);
    let comp_worker =
        CompensationWorker::new(grids.clone(), catalog.clone() as Arc<dyn SlotMirror>);
    tokio::spawn(comp_worker.run(outbox_rx));

    // Expiry watcher: one task owns every reservation deadline.
    let (expiry_handle, expiry_rx) = expiry_channel(1_024);
    let watcher = ExpiryWatcher::new(
        grids.clone(),
        orders.clone(),
        pending.clone(),
        catalog.clone() as Arc<dyn SlotMirror>,
        notify.clone(),
        outbox.clone(),
    );
    tokio::spawn(watcher.run(expiry_rx));

    tokio::spawn(run_lock_sweep(
        grids.clone(),
        pending.clone(),
        notify.clone(),
        Duration::from_millis(cfg.sweep_interval_ms),
    ));

    let coordinator = Arc::new(ReservationCoordinator::new(
        grids,
        orders.clone(),
        paygate as Arc<dyn PaymentGateway>,
        catalog as Arc<dyn SlotMirror>,
        pending.clone(),
        expiry_handle,
        outbox,
        cfg.reservation_timeout_ms,
        cfg.pending_ttl_ms(),
    ));
    let settlement = Arc::new(SettlementProcessor::new(pending, orders, notify.clone()));

    let push_listener = TcpListener::bind(&cfg.push_listen_addr).await?;
    let feed_listener = TcpListener::bind(&cfg.feed_listen_addr).await?;
    let booking_listener = TcpListener::bind(&cfg.booking_listen_addr).await?;

    tokio::spawn(async move {
        if let Err(e) = run_push_server(push_listener, notify).await {
            tracing::error!(error = ?e, "push server failed");
        }
    });
    tokio::spawn(async move {
        if let Err(e) = run_settlement_feed(feed_listener, settlement).await {
            tracing::error!(error = ?e, "settlement feed failed");
        }
    });
    tokio::spawn(async move {
        if let Err(e) = run_booking_server(booking_listener, coordinator).await {
            tracing::error!(error = ?e, "booking server failed");
        }
    });

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    Ok(())
}
