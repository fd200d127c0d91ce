//! Date-scoped order number allocation.
//!
//! Order numbers look like `ORD-20250301-0042`: a fixed prefix, the calendar
//! day, and a 4-digit sequence that restarts at 0001 each day. The read here
//! is only an optimistic estimate — the unique index on `orders.order_number`
//! is the authority, and the creation transaction retries allocation with a
//! fresh read when an insert loses the race.

use chrono::NaiveDate;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder};

use crate::entities::order::{self, Entity as OrderEntity};
use crate::errors::ServiceError;

/// Highest sequence representable per day. Exceeding it is a fatal
/// configuration problem, never a silent wrap-around.
pub const MAX_SEQUENCE: u32 = 9999;

/// Bounded retries for the allocate/insert race in the creation transaction.
pub const MAX_ALLOCATION_ATTEMPTS: u32 = 5;

/// `ORD-YYYYMMDD-` prefix shared by all orders of a calendar day.
pub fn day_prefix(date: NaiveDate) -> String {
    format!("ORD-{}-", date.format("%Y%m%d"))
}

/// Render a full order number for a day and sequence.
pub fn format_number(date: NaiveDate, sequence: u32) -> String {
    format!("{}{:04}", day_prefix(date), sequence)
}

/// Extract the numeric suffix of an order number belonging to `prefix`.
pub fn parse_sequence(order_number: &str, prefix: &str) -> Option<u32> {
    order_number
        .strip_prefix(prefix)
        .filter(|suffix| suffix.len() == 4)
        .and_then(|suffix| suffix.parse().ok())
}

/// Read the greatest existing number for `date` and propose the next one.
///
/// Returns 0001 for the first order of the day. The result may collide under
/// concurrency; callers insert under the unique constraint and re-run this on
/// conflict.
pub async fn next_number<C: ConnectionTrait>(
    conn: &C,
    date: NaiveDate,
) -> Result<String, ServiceError> {
    let prefix = day_prefix(date);

    let last = OrderEntity::find()
        .filter(order::Column::OrderNumber.starts_with(&prefix))
        .order_by_desc(order::Column::OrderNumber)
        .one(conn)
        .await?;

    let last_sequence = match last {
        Some(ref order) => parse_sequence(&order.order_number, &prefix).ok_or_else(|| {
            ServiceError::InternalError(format!(
                "malformed order number in store: {}",
                order.order_number
            ))
        })?,
        None => 0,
    };

    if last_sequence >= MAX_SEQUENCE {
        return Err(ServiceError::SequenceExhausted(prefix));
    }

    Ok(format_number(date, last_sequence + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn formats_zero_padded_sequence() {
        assert_eq!(format_number(day(2025, 3, 1), 1), "ORD-20250301-0001");
        assert_eq!(format_number(day(2025, 3, 1), 42), "ORD-20250301-0042");
        assert_eq!(format_number(day(2025, 12, 31), 9999), "ORD-20251231-9999");
    }

    #[test]
    fn parses_sequence_under_matching_prefix() {
        let prefix = day_prefix(day(2025, 3, 1));
        assert_eq!(parse_sequence("ORD-20250301-0007", &prefix), Some(7));
        assert_eq!(parse_sequence("ORD-20250301-9999", &prefix), Some(9999));
    }

    #[test]
    fn rejects_foreign_or_malformed_numbers() {
        let prefix = day_prefix(day(2025, 3, 1));
        // different day
        assert_eq!(parse_sequence("ORD-20250302-0001", &prefix), None);
        // missing padding
        assert_eq!(parse_sequence("ORD-20250301-17", &prefix), None);
        // trailing garbage
        assert_eq!(parse_sequence("ORD-20250301-00012", &prefix), None);
        assert_eq!(parse_sequence("garbage", &prefix), None);
    }

    #[test]
    fn day_prefix_sorts_numbers_lexicographically_by_sequence() {
        // The greatest-by-string read relies on fixed-width suffixes.
        let a = format_number(day(2025, 3, 1), 2);
        let b = format_number(day(2025, 3, 1), 10);
        assert!(b > a);
    }
}
