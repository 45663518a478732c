use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use std::collections::HashSet;

use crate::birthday::{Birthday, Uid};
use crate::config::Preferences;
use crate::error::{Error, ErrorKind, Result};
use crate::occurrence::{days_until, due_for_notification, next_occurrence};

pub const APP_NAME: &str = "birthday-tracker";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reminder {
    pub birthday: Birthday,
    pub days_until: i64,
    /// Age reached on the upcoming birthday, if the birth year is known.
    pub turning: Option<i32>,
}

impl Reminder {
    fn new(birthday: &Birthday, today: NaiveDate) -> Result<Self> {
        let next = next_occurrence(birthday, today)?;
        let turning = birthday
            .year
            .map(|year| next.year() - year)
            .filter(|age| *age > 0);

        Ok(Reminder {
            birthday: birthday.clone(),
            days_until: days_until(birthday, today)?,
            turning,
        })
    }

    pub fn title(&self) -> String {
        match self.days_until {
            0 => format!("{}'s birthday is today!", self.birthday.name),
            1 => format!("{}'s birthday is tomorrow!", self.birthday.name),
            n => format!("{}'s birthday is in {} days!", self.birthday.name, n),
        }
    }

    pub fn body(&self) -> String {
        let wish = "Don't forget to wish them a happy birthday!";
        match self.turning {
            Some(age) => format!("Turning {}. {}", age, wish),
            None => wish.to_owned(),
        }
    }

    /// Stable per birthday, so a later reminder replaces an earlier one.
    pub fn id(&self) -> u32 {
        self.birthday.uid.short_id()
    }
}

/// Reminders due on `today` according to the user's preferences.
/// Records with an impossible date are skipped.
pub fn scan<'a, I>(birthdays: I, preferences: &Preferences, today: NaiveDate) -> Vec<Reminder>
where
    I: IntoIterator<Item = &'a Birthday>,
{
    birthdays
        .into_iter()
        .filter_map(|birthday| {
            let due = due_for_notification(
                birthday,
                today,
                preferences.notify_day_of,
                preferences.notify_week_before,
            )
            .and_then(|due| due.then(|| Reminder::new(birthday, today)).transpose());

            match due {
                Ok(reminder) => reminder,
                Err(e) => {
                    log::warn!(
                        "Skipping birthday '{}' ({}): {}",
                        birthday.name,
                        birthday.uid,
                        e
                    );
                    None
                }
            }
        })
        .inspect(|r| log::debug!("Reminder due: {}", r.title()))
        .collect()
}

pub trait Notifier {
    fn notify(&mut self, reminder: &Reminder) -> Result<()>;
}

/// Posts reminders to the desktop notification service.
#[derive(Default)]
pub struct DesktopNotifier;

impl Notifier for DesktopNotifier {
    fn notify(&mut self, reminder: &Reminder) -> Result<()> {
        let mut n = notify_rust::Notification::new();
        n.appname(APP_NAME)
            .summary(&reminder.title())
            .body(&reminder.body());

        #[cfg(all(unix, not(target_os = "macos")))]
        n.id(reminder.id());

        n.show().map(|_| ()).map_err(|e| {
            Error::new(
                ErrorKind::Notification,
                &format!("Could not show '{}': {}", reminder.title(), e),
            )
        })
    }
}

/// Remembers which birthdays were already announced today.
#[derive(Debug, Default)]
pub struct ReminderLog {
    date: Option<NaiveDate>,
    sent: HashSet<Uid>,
}

impl ReminderLog {
    /// Records `reminder` as sent on `today`; false if it already was.
    pub fn mark(&mut self, reminder: &Reminder, today: NaiveDate) -> bool {
        if self.date != Some(today) {
            self.date = Some(today);
            self.sent.clear();
        }
        self.sent.insert(reminder.birthday.uid.clone())
    }

    pub fn forget(&mut self, reminder: &Reminder) {
        self.sent.remove(&reminder.birthday.uid);
    }
}

/// Scans `birthdays` and hands every reminder not yet sent today to
/// `notifier`. Returns the number of reminders delivered.
pub fn notify_due<'a, I>(
    birthdays: I,
    preferences: &Preferences,
    today: NaiveDate,
    notifier: &mut impl Notifier,
    sent: &mut ReminderLog,
) -> usize
where
    I: IntoIterator<Item = &'a Birthday>,
{
    let mut delivered = 0;

    for reminder in scan(birthdays, preferences, today) {
        if !sent.mark(&reminder, today) {
            continue;
        }

        match notifier.notify(&reminder) {
            Ok(()) => {
                log::info!("Sent reminder '{}'", reminder.title());
                delivered += 1;
            }
            Err(e) => {
                log::warn!("{}", e);
                sent.forget(&reminder);
            }
        }
    }

    delivered
}

/// Time from `now` until the next `check_time`, today if still ahead,
/// otherwise tomorrow.
pub fn duration_until_next_check(now: NaiveDateTime, check_time: NaiveTime) -> Duration {
    let today = now.date().and_time(check_time);

    if today > now {
        today - now
    } else {
        (now.date() + Duration::days(1)).and_time(check_time) - now
    }
}
