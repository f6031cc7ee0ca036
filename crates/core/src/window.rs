//! Modification window for delivery-quantity corrections.

use chrono::{DateTime, Duration, Utc};

/// Delivery quantities stay editable for 45 minutes after `date_sortie`.
pub const MODIFICATION_WINDOW_MINUTES: i64 = 45;

/// True iff `now` is within the modification window measured from
/// `date_sortie`. The boundary is inclusive: exactly 45.0 minutes elapsed
/// is still permitted.
pub fn can_modify(date_sortie: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now - date_sortie <= Duration::minutes(MODIFICATION_WINDOW_MINUTES)
}

/// Whole minutes elapsed since `date_sortie`, for error reporting.
pub fn elapsed_minutes(date_sortie: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - date_sortie).num_minutes()
}
