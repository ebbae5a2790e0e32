//! WebSocket surfaces of the service.
//!
//! Three persistent-connection endpoints:
//! - the client push channel (first frame = correlation key, envelopes out),
//! - the gateway notification feed (payment confirmations in, acks out),
//! - the booking command channel (reserve/cancel requests in, tickets out).
//!
//! Every frame is a JSON text message. Malformed frames are discarded
//! with a warning; a connection error ends only that session.

use std::str::FromStr;
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use adapters::paygate::types::PaymentNotification;
use common::time::now_ms;
use grid::types::RateClass;

use crate::error::BookingError;
use crate::notify::Notifier;
use crate::reserve::{ReservationCoordinator, ReserveRequest};
use crate::settle::SettlementProcessor;

// ---------------------------------------------------------------------
// Client push channel
// ---------------------------------------------------------------------

/// Push server loop. The first text frame a client sends is its
/// correlation key; afterwards envelopes for that key are forwarded as
/// JSON frames, with at most one parked envelope replayed on connect.
pub async fn run_push_server(
    listener: TcpListener,
    notify: Arc<Notifier>,
) -> anyhow::Result<()> {
    info!(addr = %listener.local_addr()?, "push server listening");

    loop {
        let (stream, peer) = listener.accept().await?;
        let notify = notify.clone();

        tokio::spawn(async move {
            if let Err(e) = serve_push(stream, notify).await {
                warn!(error = ?e, %peer, "push session ended with error");
            }
        });
    }
}

async fn serve_push(stream: TcpStream, notify: Arc<Notifier>) -> anyhow::Result<()> {
    let ws = accept_async(stream).await?;
    let (mut write, mut read) = ws.split();

    let key = loop {
        match read.next().await {
            Some(Ok(msg)) if msg.is_text() => break msg.to_text()?.trim().to_string(),
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(e.into()),
            None => return Ok(()),
        }
    };

    let mut rx = notify.connect(&key, now_ms());
    debug!(%key, "push session registered");

    loop {
        tokio::select! {
            envelope = rx.recv() => {
                match envelope {
                    Some(env) => {
                        let text = serde_json::to_string(&env)?;
                        write.send(Message::Text(text.into())).await?;
                    }
                    None => break,
                }
            }
            frame = read.next() => {
                match frame {
                    // Frames beyond the key are ignored; the channel is
                    // one-way after connect.
                    Some(Ok(_)) => {}
                    _ => break,
                }
            }
        }
    }

    notify.disconnect(&key);
    debug!(%key, "push session closed");
    Ok(())
}

// ---------------------------------------------------------------------
// Gateway notification feed
// ---------------------------------------------------------------------

/// Inbound payment confirmations. Replayed frames are safe: settlement
/// is idempotent per bill code.
pub async fn run_settlement_feed(
    listener: TcpListener,
    settle: Arc<SettlementProcessor>,
) -> anyhow::Result<()> {
    info!(addr = %listener.local_addr()?, "settlement feed listening");

    loop {
        let (stream, peer) = listener.accept().await?;
        let settle = settle.clone();

        tokio::spawn(async move {
            if let Err(e) = serve_feed(stream, settle).await {
                warn!(error = ?e, %peer, "settlement feed session ended with error");
            }
        });
    }
}

async fn serve_feed(stream: TcpStream, settle: Arc<SettlementProcessor>) -> anyhow::Result<()> {
    let ws = accept_async(stream).await?;
    let (mut write, mut read) = ws.split();

    while let Some(msg) = read.next().await {
        let msg = msg?;
        if !msg.is_text() {
            continue;
        }

        let n: PaymentNotification = match serde_json::from_str(msg.to_text()?) {
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "malformed payment notification discarded");
                continue;
            }
        };

        let reply = match settle.settle(&n, now_ms()).await {
            Ok(()) => serde_json::json!({ "billCode": n.bill_code, "code": "OK" }),
            Err(e) => {
                error!(error = %e, code = e.code(), bill_code = %n.bill_code, "settlement failed");
                serde_json::json!({
                    "billCode": n.bill_code,
                    "code": e.code(),
                    "message": e.to_string(),
                })
            }
        };

        write.send(Message::Text(reply.to_string().into())).await?;
    }

    Ok(())
}

// ---------------------------------------------------------------------
// Booking command channel
// ---------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
enum ClientCommand {
    Reserve(ReserveDto),
    #[serde(rename_all = "camelCase")]
    Cancel { order_id: String },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReserveDto {
    court_id: u64,
    date: String,
    buckets: Vec<String>,
    customer_name: String,
    customer_phone: String,
    rate: String,
}

impl ReserveDto {
    fn into_request(self) -> Result<ReserveRequest, BookingError> {
        let date = chrono::NaiveDate::parse_from_str(&self.date, "%Y-%m-%d")
            .map_err(|e| BookingError::Validation(format!("bad date '{}': {}", self.date, e)))?;

        let mut bucket_starts = Vec::with_capacity(self.buckets.len());
        for b in &self.buckets {
            bucket_starts.push(
                chrono::NaiveTime::parse_from_str(b, "%H:%M")
                    .map_err(|e| BookingError::Validation(format!("bad bucket '{b}': {e}")))?,
            );
        }

        let rate = RateClass::from_str(&self.rate)
            .map_err(|e| BookingError::Validation(e.to_string()))?;

        Ok(ReserveRequest {
            court_id: self.court_id,
            date,
            bucket_starts,
            customer_name: self.customer_name,
            customer_phone: self.customer_phone,
            rate,
        })
    }
}

/// Booking requests over a persistent connection; every frame gets a
/// reply carrying either a ticket or a structured error code.
pub async fn run_booking_server(
    listener: TcpListener,
    coordinator: Arc<ReservationCoordinator>,
) -> anyhow::Result<()> {
    info!(addr = %listener.local_addr()?, "booking server listening");

    loop {
        let (stream, peer) = listener.accept().await?;
        let coordinator = coordinator.clone();

        tokio::spawn(async move {
            if let Err(e) = serve_booking(stream, coordinator).await {
                warn!(error = ?e, %peer, "booking session ended with error");
            }
        });
    }
}

async fn serve_booking(
    stream: TcpStream,
    coordinator: Arc<ReservationCoordinator>,
) -> anyhow::Result<()> {
    let ws = accept_async(stream).await?;
    let (mut write, mut read) = ws.split();

    while let Some(msg) = read.next().await {
        let msg = msg?;
        if !msg.is_text() {
            continue;
        }

        let cmd: ClientCommand = match serde_json::from_str(msg.to_text()?) {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "malformed booking command discarded");
                continue;
            }
        };

        let reply = match handle_command(&coordinator, cmd).await {
            Ok(v) => v,
            Err(e) => serde_json::json!({
                "code": e.code(),
                "retryable": e.retryable(),
                "message": e.to_string(),
            }),
        };

        write.send(Message::Text(reply.to_string().into())).await?;
    }

    Ok(())
}

async fn handle_command(
    coordinator: &ReservationCoordinator,
    cmd: ClientCommand,
) -> Result<serde_json::Value, BookingError> {
    match cmd {
        ClientCommand::Reserve(dto) => {
            let req = dto.into_request()?;
            let ticket = coordinator.reserve(req, now_ms()).await?;
            Ok(serde_json::json!({
                "code": "OK",
                "orderId": ticket.order.order_id.to_string(),
                "billCode": ticket.order.bill_code,
                "amount": ticket.order.amount,
                "qrCode": ticket.qr_code,
            }))
        }
        ClientCommand::Cancel { order_id } => {
            let order_id = uuid::Uuid::parse_str(&order_id)
                .map_err(|e| BookingError::Validation(format!("bad order id: {e}")))?;
            let order = coordinator.cancel(order_id, now_ms()).await?;
            Ok(serde_json::json!({
                "code": "OK",
                "orderId": order.order_id.to_string(),
                "status": order.status.to_string(),
            }))
        }
    }
}
