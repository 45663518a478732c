//! Annual recurrence of birthdays.
//!
//! Everything in here is a pure function of a birthday and a reference date
//! ("today"). Nothing is cached; callers recompute on every query.
//!
//! Leap-day birthdays (02-29) fall on 02-28 in years without a Feb 29. This
//! applies uniformly: [`project_to_year`], [`next_occurrence`] and
//! [`is_today`] all agree on it, so `days_until(b, today) == 0` holds exactly
//! when `is_today(b, today)` does.

use chrono::{Datelike, NaiveDate};

use crate::birthday::Birthday;
use crate::error::{Error, Result};

/// Any leap year; used to check whether a month/day exists at all.
pub const LEAP_YEAR: i32 = 2000;

pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || (year % 400 == 0)
}

pub fn days_of_month(month: u32, year: i32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => 0,
    }
}

/// The date `month`/`day` falls on in `year`.
///
/// Feb 29 maps to Feb 28 in non-leap years. Any other impossible combination
/// is an [`ErrorKind::InvalidDate`](crate::error::ErrorKind::InvalidDate).
pub fn project_to_year(month: u32, day: u32, year: i32) -> Result<NaiveDate> {
    if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
        return Ok(date);
    }

    if month == 2 && day == 29 {
        NaiveDate::from_ymd_opt(year, 2, 28).ok_or_else(|| Error::invalid_date(month, day, year))
    } else {
        Err(Error::invalid_date(month, day, year))
    }
}

/// Earliest occurrence of `birthday` on or after `today`.
pub fn next_occurrence(birthday: &Birthday, today: NaiveDate) -> Result<NaiveDate> {
    let this_year = project_to_year(birthday.month, birthday.day, today.year())?;

    if this_year >= today {
        Ok(this_year)
    } else {
        project_to_year(birthday.month, birthday.day, today.year() + 1)
    }
}

/// Days from `today` to the next occurrence, `0` if it is today.
pub fn days_until(birthday: &Birthday, today: NaiveDate) -> Result<i64> {
    next_occurrence(birthday, today).map(|next| next.signed_duration_since(today).num_days())
}

pub fn is_today(birthday: &Birthday, today: NaiveDate) -> bool {
    project_to_year(birthday.month, birthday.day, today.year())
        .map(|date| date == today)
        .unwrap_or(false)
}

/// The birthday coming up soonest, counting today's as soonest of all.
///
/// Ties resolve to the earlier element of `birthdays`. Records with an
/// impossible month/day are skipped.
pub fn next_upcoming<'a, I>(birthdays: I, today: NaiveDate) -> Option<&'a Birthday>
where
    I: IntoIterator<Item = &'a Birthday>,
{
    birthdays
        .into_iter()
        .filter_map(|birthday| match days_until(birthday, today) {
            Ok(days) => Some((days, birthday)),
            Err(e) => {
                log::warn!("Skipping birthday '{}' ({}): {}", birthday.name, birthday.uid, e);
                None
            }
        })
        .filter(|(days, _)| *days >= 0)
        // `min_by_key` keeps the first of several equal minima
        .min_by_key(|(days, _)| *days)
        .map(|(_, birthday)| birthday)
}

/// Age in completed years on `today`, if the birth year is known.
pub fn current_age(birthday: &Birthday, today: NaiveDate) -> Option<u32> {
    let year = birthday.year?;
    let mut age = today.year() - year;

    if (today.month(), today.day()) < (birthday.month, birthday.day) {
        age -= 1;
    }

    u32::try_from(age).ok()
}

/// Whether a reminder is due for `birthday` on `today`.
pub fn due_for_notification(
    birthday: &Birthday,
    today: NaiveDate,
    notify_on_day: bool,
    notify_week_before: bool,
) -> Result<bool> {
    let days = days_until(birthday, today)?;

    Ok((days == 0 && notify_on_day) || (days == 7 && notify_week_before))
}
