//! Shared availability state, one cached grid per (court, date).
//!
//! The store is the only owner of bucket status. Every mutation for a key
//! runs under that key's async mutex, so check-and-book is a single
//! critical section: two requests racing for the same bucket cannot both
//! observe it `Available`. Cached grids expire at end of day and are
//! rebuilt from the pricing source on the next read.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::builder::build_day_grid;
use crate::error::GridError;
use crate::pricing::PricingSource;
use crate::types::{BucketStatus, DayGrid, GridKey, TimeBucket};

struct Slot {
    grid: Option<DayGrid>,
    expires_at_ms: u64,
}

pub struct GridStore {
    pricing: Arc<dyn PricingSource>,
    granularity_min: u32,
    slots: Mutex<HashMap<GridKey, Arc<tokio::sync::Mutex<Slot>>>>,
}

impl GridStore {
    pub fn new(pricing: Arc<dyn PricingSource>, granularity_min: u32) -> Self {
        Self {
            pricing,
            granularity_min,
            slots: Mutex::new(HashMap::new()),
        }
    }

    fn slot_handle(&self, key: GridKey) -> Arc<tokio::sync::Mutex<Slot>> {
        self.slots
            .lock()
            .entry(key)
            .or_insert_with(|| {
                Arc::new(tokio::sync::Mutex::new(Slot {
                    grid: None,
                    expires_at_ms: 0,
                }))
            })
            .clone()
    }

    /// Must be called with the slot's mutex held.
    async fn built<'a>(
        &self,
        slot: &'a mut Slot,
        key: GridKey,
        now_ms: u64,
    ) -> Result<&'a mut DayGrid, GridError> {
        if slot.grid.is_none() || now_ms >= slot.expires_at_ms {
            let rules = self.pricing.price_rules(key.court_id, key.date).await?;
            let grid = build_day_grid(key, &rules, self.granularity_min)?;

            debug!(%key, buckets = grid.buckets.len(), "availability grid built");

            slot.expires_at_ms = end_of_day_ms(key.date);
            slot.grid = Some(grid);
        }

        slot.grid.as_mut().ok_or(GridError::NoPricing { key })
    }

    /// Cached grid for `key`, rebuilt when absent or past its end-of-day
    /// expiry. Returns a snapshot; status mutation goes through the
    /// operations below.
    pub async fn get_or_build(&self, key: GridKey, now_ms: u64) -> Result<DayGrid, GridError> {
        let handle = self.slot_handle(key);
        let mut slot = handle.lock().await;
        let grid = self.built(&mut slot, key, now_ms).await?;
        Ok(grid.clone())
    }

    /// Atomic check-and-book: either every requested bucket flips
    /// `Available` -> `Booked`, or nothing changes and the first offending
    /// bucket is reported.
    #[instrument(skip(self, starts), target = "grid", fields(key = %key, requested = starts.len()))]
    pub async fn try_reserve(
        &self,
        key: GridKey,
        starts: &[NaiveTime],
        now_ms: u64,
    ) -> Result<Vec<TimeBucket>, GridError> {
        let handle = self.slot_handle(key);
        let mut slot = handle.lock().await;
        let grid = self.built(&mut slot, key, now_ms).await?;

        for &start in starts {
            match grid.bucket(start) {
                None => return Err(GridError::UnknownBucket { start }),
                Some(b) if b.status != BucketStatus::Available => {
                    return Err(GridError::BucketUnavailable { start });
                }
                Some(_) => {}
            }
        }

        let mut booked = Vec::with_capacity(starts.len());
        for &start in starts {
            if let Some(b) = grid.bucket_mut(start) {
                b.status = BucketStatus::Booked;
                booked.push(*b);
            }
        }

        debug!(booked = booked.len(), "buckets booked");
        Ok(booked)
    }

    /// Compensation: flip `Booked` -> `Available` for the given starts.
    ///
    /// `Locked` buckets stay locked (a swept hold is not reopened) and
    /// starts that no longer resolve are skipped, so a late revert after
    /// the sweep cannot corrupt the grid.
    pub async fn release(
        &self,
        key: GridKey,
        starts: &[NaiveTime],
        now_ms: u64,
    ) -> Result<usize, GridError> {
        let handle = self.slot_handle(key);
        let mut slot = handle.lock().await;
        let grid = self.built(&mut slot, key, now_ms).await?;

        let mut released = 0usize;
        for &start in starts {
            match grid.bucket_mut(start) {
                Some(b) if b.status == BucketStatus::Booked => {
                    b.status = BucketStatus::Available;
                    released += 1;
                }
                Some(b) => {
                    warn!(%key, %start, status = %b.status, "release skipped bucket not in Booked state");
                }
                None => {
                    warn!(%key, %start, "release skipped unknown bucket");
                }
            }
        }

        info!(%key, released, "buckets released");
        Ok(released)
    }

    /// Sweep primitive: every bucket whose end time has passed becomes
    /// `Locked`, regardless of prior status. Acts only on grids already in
    /// the cache; an uncached day has nothing worth locking.
    pub async fn lock_elapsed(&self, key: GridKey, now: NaiveTime) -> usize {
        let handle = self.slots.lock().get(&key).cloned();
        let Some(handle) = handle else {
            return 0;
        };

        let mut slot = handle.lock().await;
        let Some(grid) = slot.grid.as_mut() else {
            return 0;
        };

        let mut locked = 0usize;
        for b in grid.buckets.iter_mut() {
            if b.end <= now && b.status != BucketStatus::Locked {
                b.status = BucketStatus::Locked;
                locked += 1;
            }
        }

        if locked > 0 {
            info!(%key, locked, "elapsed buckets locked");
        }
        locked
    }

    /// Cached keys for `date`; the periodic sweep iterates these.
    pub fn keys_for(&self, date: NaiveDate) -> Vec<GridKey> {
        self.slots
            .lock()
            .keys()
            .filter(|k| k.date == date)
            .copied()
            .collect()
    }
}

/// First millisecond of the following day (UTC): the cache expiry point.
pub fn end_of_day_ms(date: NaiveDate) -> u64 {
    match date.succ_opt().and_then(|d| d.and_hms_opt(0, 0, 0)) {
        Some(dt) => dt.and_utc().timestamp_millis() as u64,
        None => u64::MAX,
    }
}
