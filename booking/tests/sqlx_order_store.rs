use chrono::{NaiveDate, NaiveTime};
use uuid::Uuid;

use booking::order::model::{LedgerEntry, Order, OrderStatus};
use booking::order::store::OrderStore;
use booking::order::store_sqlx::SqlxOrderStore;
use grid::types::RateClass;

/// Isolated in-memory DB per test. The unique name prevents interference
/// during parallel execution; `cache=shared` lets every pooled connection
/// see the same in-memory DB.
async fn setup_store() -> SqlxOrderStore {
    let conn = format!("sqlite:file:{}?mode=memory&cache=shared", Uuid::new_v4());
    SqlxOrderStore::new(&conn).await.expect("connect sqlite memory db")
}

fn hm(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn mk_order() -> Order {
    Order {
        order_id: Uuid::new_v4(),
        court_id: 7,
        date: NaiveDate::from_ymd_opt(2025, 6, 9).unwrap(),
        bucket_starts: vec![hm(10, 0), hm(10, 30)],
        customer_name: "Lina".to_string(),
        customer_phone: "0400 000 000".to_string(),
        rate: RateClass::Daily,
        amount: 12_000,
        bill_code: "bill-1".to_string(),
        status: OrderStatus::AwaitingPayment,
        created_at_ms: 1_700_000_000_000,
        settled_at_ms: None,
    }
}

#[tokio::test]
async fn order_round_trips_through_sqlite() {
    let store = setup_store().await;
    let order = mk_order();

    store.save(&order).await.unwrap();
    let loaded = store.fetch_by_id(&order.order_id).await.unwrap().unwrap();

    assert_eq!(loaded.order_id, order.order_id);
    assert_eq!(loaded.court_id, 7);
    assert_eq!(loaded.date, order.date);
    assert_eq!(loaded.bucket_starts, vec![hm(10, 0), hm(10, 30)]);
    assert_eq!(loaded.customer_name, "Lina");
    assert_eq!(loaded.rate, RateClass::Daily);
    assert_eq!(loaded.amount, 12_000);
    assert_eq!(loaded.bill_code, "bill-1");
    assert_eq!(loaded.status, OrderStatus::AwaitingPayment);
    assert_eq!(loaded.created_at_ms, 1_700_000_000_000);
    assert_eq!(loaded.settled_at_ms, None);
}

#[tokio::test]
async fn save_upserts_status_transitions() {
    let store = setup_store().await;
    let mut order = mk_order();

    store.save(&order).await.unwrap();

    order.transition(OrderStatus::Paid).unwrap();
    order.settled_at_ms = Some(1_700_000_120_000);
    store.save(&order).await.unwrap();

    let loaded = store.fetch_by_id(&order.order_id).await.unwrap().unwrap();
    assert_eq!(loaded.status, OrderStatus::Paid);
    assert_eq!(loaded.settled_at_ms, Some(1_700_000_120_000));
}

#[tokio::test]
async fn missing_order_is_none() {
    let store = setup_store().await;
    assert!(store.fetch_by_id(&Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn ledger_appends_and_queries_per_order() {
    let store = setup_store().await;
    let order = mk_order();
    let other = mk_order();

    store.save(&order).await.unwrap();
    store.save(&other).await.unwrap();

    store
        .append_ledger(&LedgerEntry {
            entry_id: Uuid::new_v4(),
            order_id: order.order_id,
            amount: 12_000,
            external_ref: "ext-1".to_string(),
            recorded_at_ms: 10,
        })
        .await
        .unwrap();
    store
        .append_ledger(&LedgerEntry {
            entry_id: Uuid::new_v4(),
            order_id: other.order_id,
            amount: 9_000,
            external_ref: "ext-2".to_string(),
            recorded_at_ms: 20,
        })
        .await
        .unwrap();

    let entries = store.ledger_for(&order.order_id).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].amount, 12_000);
    assert_eq!(entries[0].external_ref, "ext-1");
}
