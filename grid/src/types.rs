use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};

pub type CourtId = u64;

/// Cache key for one court's availability on one calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridKey {
    pub court_id: CourtId,
    pub date: NaiveDate,
}

impl GridKey {
    pub fn new(court_id: CourtId, date: NaiveDate) -> Self {
        Self { court_id, date }
    }
}

impl fmt::Display for GridKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "court {} @ {}", self.court_id, self.date)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketStatus {
    Available,
    Booked,
    Locked,
}

impl fmt::Display for BucketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BucketStatus::Available => "Available",
            BucketStatus::Booked => "Booked",
            BucketStatus::Locked => "Locked",
        };
        f.write_str(s)
    }
}

impl FromStr for BucketStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Available" => Ok(BucketStatus::Available),
            "Booked" => Ok(BucketStatus::Booked),
            "Locked" => Ok(BucketStatus::Locked),
            other => Err(anyhow::anyhow!("Invalid BucketStatus value: {}", other)),
        }
    }
}

/// Which of the three configured prices an order is charged at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateClass {
    Regular,
    Daily,
    Student,
}

impl fmt::Display for RateClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RateClass::Regular => "Regular",
            RateClass::Daily => "Daily",
            RateClass::Student => "Student",
        };
        f.write_str(s)
    }
}

impl FromStr for RateClass {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Regular" => Ok(RateClass::Regular),
            "Daily" => Ok(RateClass::Daily),
            "Student" => Ok(RateClass::Student),
            other => Err(anyhow::anyhow!("Invalid RateClass value: {}", other)),
        }
    }
}

/// Calendar classification used to select a pricing regime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayKind {
    Weekday,
    Weekend,
}

pub fn day_kind(date: NaiveDate) -> DayKind {
    match date.weekday() {
        Weekday::Sat | Weekday::Sun => DayKind::Weekend,
        _ => DayKind::Weekday,
    }
}

/// One configured pricing interval for a court.
///
/// `day_kind: None` means the rule applies on every day of the week.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceRule {
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub day_kind: Option<DayKind>,
    pub regular_price: u64,
    pub daily_price: u64,
    pub student_price: u64,
}

/// Atomic unit of reservation: one fixed-width interval within a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeBucket {
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub regular_price: u64,
    pub daily_price: u64,
    pub student_price: u64,
    pub status: BucketStatus,
}

impl TimeBucket {
    pub fn price_for(&self, rate: RateClass) -> u64 {
        match rate {
            RateClass::Regular => self.regular_price,
            RateClass::Daily => self.daily_price,
            RateClass::Student => self.student_price,
        }
    }
}

/// Ordered bucket sequence for one (court, date).
///
/// Invariant: buckets are sorted by start, contiguous within each
/// configured interval, and never overlap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayGrid {
    pub key: GridKey,
    pub buckets: Vec<TimeBucket>,
}

impl DayGrid {
    pub fn bucket(&self, start: NaiveTime) -> Option<&TimeBucket> {
        self.buckets.iter().find(|b| b.start == start)
    }

    pub fn bucket_mut(&mut self, start: NaiveTime) -> Option<&mut TimeBucket> {
        self.buckets.iter_mut().find(|b| b.start == start)
    }
}
