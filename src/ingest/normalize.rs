//! Timestamp normalization
//!
//! OpenTSDB timestamps are ambiguous: clients send seconds or
//! milliseconds with no unit field. The unit is resolved with
//! OpenTSDB's `SECOND_MASK` bit heuristic, after missing timestamps
//! are filled with the current wall clock. After normalization every
//! row carries a non-zero millisecond epoch timestamp.

use crate::ingest::row::Row;

/// All bits above bit 31 except the sign bit
///
/// A timestamp with none of these bits set fits an unsigned 32-bit
/// range and is interpreted as seconds; any of them set means the
/// value is already milliseconds. See
/// <http://opentsdb.net/docs/javadoc/net/opentsdb/core/Const.html#SECOND_MASK>
pub const SECOND_MASK: i64 = 0x7FFF_FFFF_0000_0000;

/// Fill missing timestamps with the current time in whole seconds
///
/// The filled value is deliberately second-resolution so the
/// subsequent unit conversion promotes it to milliseconds like any
/// other second-resolution input.
pub fn fill_missing_timestamps(rows: &mut [Row], now_secs: i64) {
    for row in rows.iter_mut() {
        if row.timestamp == 0 {
            row.timestamp = now_secs;
        }
    }
}

/// Convert second-resolution timestamps to milliseconds in place
///
/// Wrapping multiply: extreme negative values near `i64::MIN` have no
/// mask bit set (the sign bit is outside the mask) and would otherwise
/// overflow. The heuristic is bit arithmetic, not range validation, so
/// such values wrap identically in every build profile.
pub fn convert_to_millis(rows: &mut [Row]) {
    for row in rows.iter_mut() {
        if row.timestamp & SECOND_MASK == 0 {
            row.timestamp = row.timestamp.wrapping_mul(1_000);
        }
    }
}

/// Normalize all timestamps in the batch to non-zero millisecond epochs
pub fn normalize_timestamps(rows: &mut [Row], now_secs: i64) {
    fill_missing_timestamps(rows, now_secs);
    convert_to_millis(rows);
}

/// Current wall-clock time in whole seconds since epoch
pub fn now_secs() -> i64 {
    chrono::Utc::now().timestamp()
}
