//! Calendar helpers: third Friday of a month and business-day stepping

use chrono::{Datelike, Duration, NaiveDate, Weekday};

/// All Fridays in the given month
fn fridays_in_month(year: i32, month: u32) -> Vec<NaiveDate> {
    let Some(mut day) = NaiveDate::from_ymd_opt(year, month, 1) else {
        return Vec::new();
    };

    let mut fridays = Vec::with_capacity(5);
    while day.month() == month {
        if day.weekday() == Weekday::Fri {
            fridays.push(day);
        }
        day += Duration::days(1);
    }
    fridays
}

/// Third Friday of the month, or the last Friday if there are fewer than three
pub fn third_friday(year: i32, month: u32) -> Option<NaiveDate> {
    let fridays = fridays_in_month(year, month);
    fridays.get(2).or_else(|| fridays.last()).copied()
}

pub fn is_third_friday(date: NaiveDate) -> bool {
    third_friday(date.year(), date.month()) == Some(date)
}

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Most recent weekday strictly before `date`.
///
/// Exchange holidays are not known here; the data client reports those as
/// unavailable.
pub fn previous_business_day(date: NaiveDate) -> NaiveDate {
    let mut day = date - Duration::days(1);
    while is_weekend(day) {
        day -= Duration::days(1);
    }
    day
}
