
use std::time::Duration;

use tokio::time::{advance, sleep};

use booking::expiry::sweep_pass;
use booking::order::model::OrderStatus;
use common::time::now_ms;
use grid::types::BucketStatus;
use mock_collab::*;

/// Drive virtual time past a deadline and let every woken task finish.
async fn advance_and_settle_tasks(ms: u64) {
    advance(Duration::from_millis(ms)).await;
    sleep(Duration::from_millis(10)).await;
}

#[tokio::test(start_paused = true)]
async fn unpaid_reservation_expires_and_reverts() {
    let (h, rx) = harness();
    spawn_watcher(&h, rx);

    let ticket = h
        .coordinator
        .reserve(reserve_request(&[hm(10, 0), hm(10, 30)]), now_ms())
        .await
        .unwrap();
    let order_id = ticket.order.order_id;

    advance_and_settle_tasks(TIMEOUT_MS + 1_000).await;

    assert_eq!(h.orders.status_of(&order_id), Some(OrderStatus::Expired));
    assert!(h.pending.get(&ticket.order.bill_code, now_ms()).is_none());

    let grid = h.grids.get_or_build(grid_key(), now_ms()).await.unwrap();
    assert_eq!(
        grid.bucket(hm(10, 0)).unwrap().status,
        BucketStatus::Available
    );
    assert_eq!(
        grid.bucket(hm(10, 30)).unwrap().status,
        BucketStatus::Available
    );

    assert_eq!(
        h.mirror.statuses(),
        vec!["Booked".to_string(), "Available".to_string()]
    );

    // The client was offline: the envelope was parked and replays exactly
    // once on connect.
    let mut push_rx = h.notify.connect(&order_id.to_string(), now_ms());
    assert_eq!(push_rx.try_recv().unwrap().result_code, "EXPIRED");

    h.notify.disconnect(&order_id.to_string());
    let mut push_rx = h.notify.connect(&order_id.to_string(), now_ms());
    assert!(push_rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn settlement_beats_the_timer_and_the_watcher_is_a_noop() {
    let (h, rx) = harness();
    spawn_watcher(&h, rx);

    let ticket = h
        .coordinator
        .reserve(reserve_request(&[hm(10, 0)]), now_ms())
        .await
        .unwrap();

    h.settlement
        .settle(
            &paid_notification(&ticket.order.bill_code, ticket.order.amount),
            now_ms(),
        )
        .await
        .unwrap();

    // The watcher still fires; the missing pending record makes it a no-op.
    advance_and_settle_tasks(TIMEOUT_MS + 1_000).await;

    assert_eq!(
        h.orders.status_of(&ticket.order.order_id),
        Some(OrderStatus::Paid)
    );

    let grid = h.grids.get_or_build(grid_key(), now_ms()).await.unwrap();
    assert_eq!(grid.bucket(hm(10, 0)).unwrap().status, BucketStatus::Booked);

    assert_eq!(h.orders.ledger.lock().len(), 1);
    assert_eq!(h.mirror.statuses(), vec!["Booked".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn deadlines_fire_independently() {
    let (h, rx) = harness();
    spawn_watcher(&h, rx);

    let first = h
        .coordinator
        .reserve(reserve_request(&[hm(9, 0)]), now_ms())
        .await
        .unwrap();

    advance_and_settle_tasks(60_000).await;

    let second = h
        .coordinator
        .reserve(reserve_request(&[hm(10, 0)]), now_ms())
        .await
        .unwrap();

    // Past the first deadline, before the second.
    advance_and_settle_tasks(TIMEOUT_MS - 60_000 + 1_000).await;

    assert_eq!(
        h.orders.status_of(&first.order.order_id),
        Some(OrderStatus::Expired)
    );
    assert_eq!(
        h.orders.status_of(&second.order.order_id),
        Some(OrderStatus::AwaitingPayment)
    );

    advance_and_settle_tasks(60_000).await;

    assert_eq!(
        h.orders.status_of(&second.order.order_id),
        Some(OrderStatus::Expired)
    );
}

#[tokio::test]
async fn sweep_locks_every_elapsed_bucket() {
    let (h, _rx) = harness();

    h.coordinator
        .reserve(reserve_request(&[hm(10, 0), hm(10, 30)]), now_ms())
        .await
        .unwrap();

    // Noon on the grid's date: all six 09:00-12:00 buckets have elapsed,
    // the booked ones included.
    let (locked, _purged) = sweep_pass(
        &h.grids,
        &h.pending,
        &h.notify,
        test_date(),
        hm(12, 0),
        now_ms(),
    )
    .await;
    assert_eq!(locked, 6);

    let grid = h.grids.get_or_build(grid_key(), now_ms()).await.unwrap();
    assert!(
        grid.buckets
            .iter()
            .all(|b| b.status == BucketStatus::Locked)
    );

    // A second pass finds nothing left to lock.
    let (locked, _purged) = sweep_pass(
        &h.grids,
        &h.pending,
        &h.notify,
        test_date(),
        hm(12, 0),
        now_ms(),
    )
    .await;
    assert_eq!(locked, 0);
}

#[tokio::test]
async fn sweep_only_touches_grids_for_the_given_date() {
    let (h, _rx) = harness();

    h.coordinator
        .reserve(reserve_request(&[hm(10, 0)]), now_ms())
        .await
        .unwrap();

    let other_date = test_date().succ_opt().unwrap();
    let (locked, _purged) = sweep_pass(
        &h.grids,
        &h.pending,
        &h.notify,
        other_date,
        hm(23, 0),
        now_ms(),
    )
    .await;

    assert_eq!(locked, 0);

    let grid = h.grids.get_or_build(grid_key(), now_ms()).await.unwrap();
    assert_eq!(grid.bucket(hm(10, 0)).unwrap().status, BucketStatus::Booked);
}
