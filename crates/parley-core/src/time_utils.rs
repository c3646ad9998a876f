/// Wall-clock seconds since the Unix epoch, with sub-second precision.
///
/// Tracker events carry float timestamps, so every conversation clock reads
/// through this helper.
pub fn current_unix_timestamp_f64() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

/// Returns true when `earlier` lies at least `gap_seconds` before `now`.
///
/// The boundary is inclusive: a gap of exactly `gap_seconds` counts.
pub fn elapsed_at_least(now: f64, earlier: f64, gap_seconds: f64) -> bool {
    now - earlier >= gap_seconds
}
