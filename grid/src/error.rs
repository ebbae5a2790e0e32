use chrono::NaiveTime;
use thiserror::Error;

use crate::types::GridKey;

#[derive(Error, Debug)]
pub enum GridError {
    #[error("no price rules resolve for {key}")]
    NoPricing { key: GridKey },

    #[error("price rules overlap at {start} for {key}")]
    OverlappingRules { key: GridKey, start: NaiveTime },

    #[error("invalid price rule for {key}: {reason}")]
    InvalidRule { key: GridKey, reason: String },

    #[error("bucket starting {start} is not available")]
    BucketUnavailable { start: NaiveTime },

    #[error("no bucket starts at {start}")]
    UnknownBucket { start: NaiveTime },

    #[error(transparent)]
    Pricing(#[from] anyhow::Error),
}
