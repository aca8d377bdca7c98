//! Output formatting for CLI display.

use jiff::Timestamp;
use jiff::tz::TimeZone;
use uuid::Uuid;

use woof::model::{Transaction, TransactionKind};

/// First eight characters of an id, enough to refer to it.
pub(super) fn short_id(id: Uuid) -> String {
    id.to_string()[..8].to_string()
}

/// Meters under a kilometer, kilometers with two decimals above.
pub(super) fn format_distance(meters: f64) -> String {
    if meters < 1000.0 {
        format!("{meters:.0} m")
    } else {
        format!("{:.2} km", meters / 1000.0)
    }
}

pub(super) fn format_duration(seconds: u64) -> String {
    let (h, m, s) = (seconds / 3600, seconds / 60 % 60, seconds % 60);
    if h > 0 {
        format!("{h}h {m:02}m {s:02}s")
    } else if m > 0 {
        format!("{m}m {s:02}s")
    } else {
        format!("{s}s")
    }
}

/// A timestamp in the local time zone, to the minute.
pub(super) fn format_time(ts: Timestamp) -> String {
    ts.to_zoned(TimeZone::system())
        .strftime("%Y-%m-%d %H:%M")
        .to_string()
}

/// One-line description of a ledger entry.
pub(super) fn format_transaction(t: &Transaction) -> String {
    let detail = match t.kind {
        TransactionKind::WalkEarn => "walk bonus".to_string(),
        TransactionKind::DropCollect => match t.meta["drop_type"].as_str() {
            Some(kind) => format!("{kind} bone drop"),
            None => "bone drop".to_string(),
        },
        TransactionKind::StoreRedeem => match t.meta["deal_title"].as_str() {
            Some(title) => format!("redeemed {title}"),
            None => "redeemed".to_string(),
        },
    };
    format!("{:+}  {detail}", t.amount)
}
