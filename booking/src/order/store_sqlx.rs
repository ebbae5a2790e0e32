//! SQLite-backed implementation of the `OrderStore` trait.
//!
//! Orders survive restarts so a crashed process does not lose paid or
//! expired history; the reservation path itself operates on the in-memory
//! grid and pending stores and only persists through this store.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use grid::types::RateClass;

use crate::order::model::{LedgerEntry, Order, OrderId, OrderStatus};
use crate::order::store::OrderStore;

const TIME_FMT: &str = "%H:%M";

pub struct SqlxOrderStore {
    pool: SqlitePool,
}

impl SqlxOrderStore {
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect and ensure the schema exists.
    pub async fn new(path: &str) -> anyhow::Result<Self> {
        let pool = SqlitePool::connect(path).await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS orders (
                order_id TEXT PRIMARY KEY,
                court_id INTEGER NOT NULL,
                date TEXT NOT NULL,
                bucket_starts_json TEXT NOT NULL,

                customer_name TEXT NOT NULL,
                customer_phone TEXT NOT NULL,
                rate TEXT NOT NULL,

                amount INTEGER NOT NULL,
                bill_code TEXT NOT NULL,

                status TEXT NOT NULL,
                created_at_ms INTEGER NOT NULL,
                settled_at_ms INTEGER
            );
        "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ledger (
                entry_id TEXT PRIMARY KEY,
                order_id TEXT NOT NULL,
                amount INTEGER NOT NULL,
                external_ref TEXT NOT NULL,
                recorded_at_ms INTEGER NOT NULL
            );
        "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(r#"CREATE INDEX IF NOT EXISTS idx_orders_bill ON orders(bill_code);"#)
            .execute(&pool)
            .await?;

        sqlx::query(r#"CREATE INDEX IF NOT EXISTS idx_ledger_order ON ledger(order_id);"#)
            .execute(&pool)
            .await?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl OrderStore for SqlxOrderStore {
    async fn save(&self, order: &Order) -> anyhow::Result<()> {
        let starts: Vec<String> = order
            .bucket_starts
            .iter()
            .map(|t| t.format(TIME_FMT).to_string())
            .collect();
        let starts_json = serde_json::to_string(&starts)?;

        sqlx::query(
            r#"
            INSERT INTO orders (
                order_id, court_id, date, bucket_starts_json,
                customer_name, customer_phone, rate,
                amount, bill_code,
                status, created_at_ms, settled_at_ms
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(order_id) DO UPDATE SET
                court_id = excluded.court_id,
                date = excluded.date,
                bucket_starts_json = excluded.bucket_starts_json,
                customer_name = excluded.customer_name,
                customer_phone = excluded.customer_phone,
                rate = excluded.rate,
                amount = excluded.amount,
                bill_code = excluded.bill_code,
                status = excluded.status,
                created_at_ms = excluded.created_at_ms,
                settled_at_ms = excluded.settled_at_ms;
        "#,
        )
        .bind(order.order_id.to_string())
        .bind(order.court_id as i64)
        .bind(order.date.to_string())
        .bind(starts_json)
        .bind(&order.customer_name)
        .bind(&order.customer_phone)
        .bind(order.rate.to_string())
        .bind(order.amount as i64)
        .bind(&order.bill_code)
        .bind(order.status.to_string())
        .bind(order.created_at_ms as i64)
        .bind(order.settled_at_ms.map(|v| v as i64))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn fetch_by_id(&self, order_id: &OrderId) -> anyhow::Result<Option<Order>> {
        let row = sqlx::query("SELECT * FROM orders WHERE order_id = ?")
            .bind(order_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(row_to_order(&row)?)),
            None => Ok(None),
        }
    }

    async fn append_ledger(&self, entry: &LedgerEntry) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO ledger (entry_id, order_id, amount, external_ref, recorded_at_ms)
            VALUES (?, ?, ?, ?, ?)
        "#,
        )
        .bind(entry.entry_id.to_string())
        .bind(entry.order_id.to_string())
        .bind(entry.amount as i64)
        .bind(&entry.external_ref)
        .bind(entry.recorded_at_ms as i64)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn ledger_for(&self, order_id: &OrderId) -> anyhow::Result<Vec<LedgerEntry>> {
        let rows = sqlx::query(
            "SELECT * FROM ledger WHERE order_id = ? ORDER BY recorded_at_ms",
        )
        .bind(order_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let entry_id_str: String = row.get("entry_id");
            let order_id_str: String = row.get("order_id");

            entries.push(LedgerEntry {
                entry_id: Uuid::parse_str(&entry_id_str)?,
                order_id: Uuid::parse_str(&order_id_str)?,
                amount: row.get::<i64, _>("amount") as u64,
                external_ref: row.get("external_ref"),
                recorded_at_ms: row.get::<i64, _>("recorded_at_ms") as u64,
            });
        }

        Ok(entries)
    }
}

fn row_to_order(row: &SqliteRow) -> anyhow::Result<Order> {
    let order_id_str: String = row.get("order_id");
    let date_str: String = row.get("date");
    let starts_json: String = row.get("bucket_starts_json");

    let starts_raw: Vec<String> = serde_json::from_str(&starts_json)
        .map_err(|e| anyhow::anyhow!("Invalid bucket list JSON '{}': {}", starts_json, e))?;
    let mut bucket_starts = Vec::with_capacity(starts_raw.len());
    for s in &starts_raw {
        bucket_starts.push(
            NaiveTime::parse_from_str(s, TIME_FMT)
                .map_err(|e| anyhow::anyhow!("Invalid bucket start '{}': {}", s, e))?,
        );
    }

    let rate_str: String = row.get("rate");
    let status_str: String = row.get("status");

    Ok(Order {
        order_id: Uuid::parse_str(&order_id_str)?,
        court_id: row.get::<i64, _>("court_id") as u64,
        date: NaiveDate::parse_from_str(&date_str, "%Y-%m-%d")
            .map_err(|e| anyhow::anyhow!("Invalid date '{}': {}", date_str, e))?,
        bucket_starts,
        customer_name: row.get("customer_name"),
        customer_phone: row.get("customer_phone"),
        rate: RateClass::from_str(&rate_str)
            .map_err(|e| anyhow::anyhow!("Invalid rate '{}': {}", rate_str, e))?,
        amount: row.get::<i64, _>("amount") as u64,
        bill_code: row.get("bill_code"),
        status: OrderStatus::from_str(&status_str)
            .map_err(|e| anyhow::anyhow!("Invalid order status '{}': {}", status_str, e))?,
        created_at_ms: row.get::<i64, _>("created_at_ms") as u64,
        settled_at_ms: row.get::<Option<i64>, _>("settled_at_ms").map(|v| v as u64),
    })
}
