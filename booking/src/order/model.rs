use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveTime};
use uuid::Uuid;

use grid::types::{CourtId, RateClass};

use crate::error::BookingError;

pub type OrderId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Created,
    AwaitingPayment,
    Paid,
    Expired,
    Cancelled,
}

impl OrderStatus {
    /// Legal lifecycle edges. `Paid`, `Expired` and `Cancelled` are
    /// terminal; everything not listed here is rejected.
    pub fn can_transition(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Created, AwaitingPayment)
                | (Created, Paid)
                | (AwaitingPayment, Paid)
                | (AwaitingPayment, Expired)
                | (AwaitingPayment, Cancelled)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Paid | OrderStatus::Expired | OrderStatus::Cancelled
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::Created => "Created",
            OrderStatus::AwaitingPayment => "AwaitingPayment",
            OrderStatus::Paid => "Paid",
            OrderStatus::Expired => "Expired",
            OrderStatus::Cancelled => "Cancelled",
        };
        f.write_str(s)
    }
}

impl FromStr for OrderStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Created" => Ok(OrderStatus::Created),
            "AwaitingPayment" => Ok(OrderStatus::AwaitingPayment),
            "Paid" => Ok(OrderStatus::Paid),
            "Expired" => Ok(OrderStatus::Expired),
            "Cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(anyhow::anyhow!("Invalid OrderStatus value: {}", other)),
        }
    }
}

/// A reservation and its payment lifecycle. Orders are never deleted,
/// only status-transitioned.
#[derive(Debug, Clone)]
pub struct Order {
    pub order_id: OrderId,

    // What was booked
    pub court_id: CourtId,
    pub date: NaiveDate,
    pub bucket_starts: Vec<NaiveTime>,

    // Who booked it
    pub customer_name: String,
    pub customer_phone: String,
    pub rate: RateClass,

    // Money
    pub amount: u64,
    pub bill_code: String,

    // Lifecycle
    pub status: OrderStatus,
    pub created_at_ms: u64,
    pub settled_at_ms: Option<u64>,
}

impl Order {
    pub fn transition(&mut self, next: OrderStatus) -> Result<(), BookingError> {
        if !self.status.can_transition(next) {
            return Err(BookingError::IllegalTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}

/// One settled payment, appended exactly once per settlement.
#[derive(Debug, Clone)]
pub struct LedgerEntry {
    pub entry_id: Uuid,
    pub order_id: OrderId,
    pub amount: u64,
    pub external_ref: String,
    pub recorded_at_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(status: OrderStatus) -> Order {
        Order {
            order_id: Uuid::new_v4(),
            court_id: 3,
            date: NaiveDate::from_ymd_opt(2025, 6, 9).unwrap(),
            bucket_starts: vec![NaiveTime::from_hms_opt(10, 0, 0).unwrap()],
            customer_name: "Lina".to_string(),
            customer_phone: "0400".to_string(),
            rate: RateClass::Regular,
            amount: 8_000,
            bill_code: "b-1".to_string(),
            status,
            created_at_ms: 0,
            settled_at_ms: None,
        }
    }

    #[test]
    fn lifecycle_edges_are_accepted() {
        let mut o = order(OrderStatus::Created);
        o.transition(OrderStatus::AwaitingPayment).unwrap();
        o.transition(OrderStatus::Paid).unwrap();
        assert!(o.status.is_terminal());
    }

    #[test]
    fn paid_is_terminal() {
        let mut o = order(OrderStatus::Paid);
        let err = o.transition(OrderStatus::AwaitingPayment).unwrap_err();
        assert!(matches!(err, BookingError::IllegalTransition { .. }));
        assert_eq!(o.status, OrderStatus::Paid);
    }

    #[test]
    fn expired_cannot_be_paid() {
        let mut o = order(OrderStatus::Expired);
        assert!(o.transition(OrderStatus::Paid).is_err());
    }

    #[test]
    fn cancellation_only_from_awaiting_payment() {
        assert!(
            order(OrderStatus::AwaitingPayment)
                .transition(OrderStatus::Cancelled)
                .is_ok()
        );
        assert!(
            order(OrderStatus::Created)
                .transition(OrderStatus::Cancelled)
                .is_err()
        );
        assert!(
            order(OrderStatus::Paid)
                .transition(OrderStatus::Cancelled)
                .is_err()
        );
    }

    #[test]
    fn status_round_trips_through_strings() {
        for s in [
            OrderStatus::Created,
            OrderStatus::AwaitingPayment,
            OrderStatus::Paid,
            OrderStatus::Expired,
            OrderStatus::Cancelled,
        ] {
            assert_eq!(s.to_string().parse::<OrderStatus>().unwrap(), s);
        }
        assert!("Settled".parse::<OrderStatus>().is_err());
    }
}
