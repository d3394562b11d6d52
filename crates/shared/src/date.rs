use time::OffsetDateTime;

/// Current unix time in seconds.
pub fn unix_now() -> u64 {
    OffsetDateTime::now_utc().unix_timestamp().max(0) as u64
}
