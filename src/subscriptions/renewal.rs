use time::{Date, Duration, Month, OffsetDateTime};

use super::repo_types::Frequency;

/// Start date plus one billing period. Month-based periods clamp the day to
/// the end of the target month, so Jan 31 renews on the last day of February.
/// `None` only when the result falls outside the representable date range.
pub fn compute_renewal_date(start: OffsetDateTime, frequency: Frequency) -> Option<OffsetDateTime> {
    match frequency {
        Frequency::Daily => start.checked_add(Duration::days(1)),
        Frequency::Weekly => start.checked_add(Duration::weeks(1)),
        Frequency::Monthly => add_months(start, 1),
        Frequency::Quarterly => add_months(start, 3),
        Frequency::Yearly => add_months(start, 12),
    }
}

fn add_months(start: OffsetDateTime, months: i32) -> Option<OffsetDateTime> {
    let index = start.year() * 12 + i32::from(u8::from(start.month())) - 1 + months;
    let year = index.div_euclid(12);
    let month = Month::try_from(u8::try_from(index.rem_euclid(12) + 1).ok()?).ok()?;
    let day = start.day().min(time::util::days_in_year_month(year, month));
    let date = Date::from_calendar_date(year, month, day).ok()?;
    Some(start.replace_date(date))
}
