use anyhow::Context;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::Date;

const ISO_DATE: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// Parse a caller-supplied `YYYY-MM-DD` bound. Invalid input is fatal and
/// must be rejected before any log scanning begins.
pub fn parse_date(value: &str) -> anyhow::Result<Date> {
    Date::parse(value, ISO_DATE)
        .with_context(|| format!("invalid date '{value}': expected YYYY-MM-DD"))
}

/// Truncate a raw timestamp string to its calendar date. Lenient: anything
/// that does not start with a valid `YYYY-MM-DD` prefix yields `None`.
pub fn timestamp_date(value: &str) -> Option<Date> {
    let head = value.get(..10)?;
    Date::parse(head, ISO_DATE).ok()
}

/// Inclusive calendar-date window. An absent bound is unbounded on that
/// side; an action with no date is never in-window.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateWindow {
    pub since: Option<Date>,
    pub until: Option<Date>,
}

impl DateWindow {
    pub fn new(since: Option<Date>, until: Option<Date>) -> Self {
        DateWindow { since, until }
    }

    pub fn contains(&self, date: Option<Date>) -> bool {
        let Some(d) = date else { return false };
        if self.since.is_some_and(|s| d < s) {
            return false;
        }
        if self.until.is_some_and(|u| d > u) {
            return false;
        }
        true
    }
}
